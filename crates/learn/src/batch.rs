use chrono::{DateTime, Utc};

use qirsh_core::{Field, Transaction, TransactionType};
use qirsh_store::keywords::{self, KeywordMapping, LearnedSource};
use qirsh_store::vendors::{self, VendorFallbackEntry};
use qirsh_store::KeyValueStore;

/// Summary of a bulk learning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LearningResult {
    pub vendors_learned: usize,
    pub keywords_learned: usize,
    pub conflicts: Vec<String>,
}

/// Minimum transactions a vendor needs before its classification counts.
pub const MIN_GROUP_SIZE: usize = 2;

#[derive(Debug, Clone)]
struct VendorClassification {
    vendor: String,
    kind: TransactionType,
    category: String,
    subcategory: Option<String>,
    count: usize,
}

/// Learn vendor classifications from a batch of already-classified
/// transactions (a CSV import). Vendors are grouped under a normalized key,
/// the plurality classification of each group wins, and the result is merged
/// into the vendor fallback table and keyword bank. One group's problems
/// never abort the rest of the batch.
pub fn batch_learn(
    store: &dyn KeyValueStore,
    transactions: &[Transaction],
    now: DateTime<Utc>,
) -> LearningResult {
    let mut result = LearningResult::default();
    if transactions.is_empty() {
        return result;
    }

    let classifications = compute_dominant_classifications(transactions);
    result.vendors_learned =
        update_vendor_fallbacks(store, &classifications, &mut result.conflicts, now);
    result.keywords_learned = update_keyword_bank(store, &classifications, now);

    tracing::info!(
        vendors = result.vendors_learned,
        keywords = result.keywords_learned,
        conflicts = result.conflicts.len(),
        "batch learning pass complete"
    );
    result
}

/// Lowercased, stripped of everything but Latin alphanumerics and Arabic
/// letters, capped at 50 chars. Blank keys mean the transaction is unusable
/// for vendor learning.
pub fn normalize_vendor_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || ('\u{0600}'..='\u{06FF}').contains(c))
        .take(50)
        .collect()
}

fn compute_dominant_classifications(transactions: &[Transaction]) -> Vec<VendorClassification> {
    // Group preserving first-seen order so plurality ties break
    // deterministically toward the earliest combination.
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<&Transaction>> =
        std::collections::HashMap::new();
    for txn in transactions {
        let Some(name) = txn.vendor_or_title() else {
            continue;
        };
        let key = normalize_vendor_key(name);
        if key.is_empty() {
            continue;
        }
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(txn);
    }

    let mut classifications = Vec::new();
    for vendor in order {
        let txns = &groups[&vendor];
        if txns.len() < MIN_GROUP_SIZE {
            continue;
        }

        let mut combos: Vec<(TransactionType, String, Option<String>, usize)> = Vec::new();
        for txn in txns {
            let (Some(kind), Some(category)) = (txn.kind, txn.category.as_deref()) else {
                continue;
            };
            let subcategory = txn.subcategory.clone();
            match combos
                .iter_mut()
                .find(|(k, c, s, _)| *k == kind && c == category && *s == subcategory)
            {
                Some(combo) => combo.3 += 1,
                None => combos.push((kind, category.to_string(), subcategory, 1)),
            }
        }

        let mut dominant: Option<&(TransactionType, String, Option<String>, usize)> = None;
        for combo in &combos {
            if dominant.map_or(true, |d| combo.3 > d.3) {
                dominant = Some(combo);
            }
        }
        if let Some((kind, category, subcategory, count)) = dominant {
            classifications.push(VendorClassification {
                vendor: vendor.clone(),
                kind: *kind,
                category: category.clone(),
                subcategory: subcategory.clone(),
                count: *count,
            });
        }
    }
    classifications
}

fn confidence_for_count(count: usize) -> f64 {
    if count >= 5 {
        0.9
    } else if count >= 3 {
        0.7
    } else {
        0.5
    }
}

fn update_vendor_fallbacks(
    store: &dyn KeyValueStore,
    classifications: &[VendorClassification],
    conflicts: &mut Vec<String>,
    now: DateTime<Utc>,
) -> usize {
    let mut map = vendors::load_fallbacks(store);
    let mut learned = 0;

    for cls in classifications {
        let confidence = confidence_for_count(cls.count);
        if let Some(existing) = map.get(&cls.vendor) {
            if existing.user {
                conflicts.push(format!("{}: kept user-defined mapping", cls.vendor));
                continue;
            }
            if existing.confidence.is_some_and(|c| c >= confidence) {
                conflicts.push(format!(
                    "{}: kept existing higher-confidence mapping",
                    cls.vendor
                ));
                continue;
            }
        }
        map.insert(
            cls.vendor.clone(),
            VendorFallbackEntry {
                kind: cls.kind,
                category: cls.category.clone(),
                subcategory: cls.subcategory.clone().unwrap_or_default(),
                user: false,
                source: Some(LearnedSource::CsvImport),
                confidence: Some(confidence),
                sample_count: Some(cls.count as u32),
                learned_at: Some(now),
            },
        );
        learned += 1;
    }

    vendors::save_fallbacks(store, &map);
    learned
}

fn update_keyword_bank(
    store: &dyn KeyValueStore,
    classifications: &[VendorClassification],
    now: DateTime<Utc>,
) -> usize {
    let mut learned = 0;
    for cls in classifications {
        let mut mappings = vec![KeywordMapping {
            field: Field::Category,
            value: cls.category.clone(),
        }];
        if let Some(subcategory) = cls.subcategory.as_deref() {
            if !subcategory.is_empty() {
                mappings.push(KeywordMapping {
                    field: Field::Subcategory,
                    value: subcategory.to_string(),
                });
            }
        }
        let merge = keywords::merge_mappings(
            store,
            &cls.vendor,
            &mappings,
            LearnedSource::CsvImport,
            cls.count as u32,
            now,
        );
        learned += if merge.created { 1 } else { merge.mappings_added };
    }
    learned
}
