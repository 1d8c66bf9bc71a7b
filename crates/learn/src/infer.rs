use std::collections::BTreeMap;

use qirsh_core::{Field, TransactionType};
use qirsh_extract::extract_vendor_name;
use qirsh_store::vendors::{self, VendorFallbackEntry};
use qirsh_store::{keywords, seeds, KeyValueStore};

use crate::similarity::{soft_normalize, Similarity};

/// Tunables for vendor-fallback resolution.
#[derive(Debug, Clone, Copy)]
pub struct InferOptions {
    /// Minimum fuzzy similarity for a vendor-fallback hit.
    pub fuzzy_threshold: f64,
    /// Minimum key length for the substring fallback, in chars.
    pub substring_min_key_len: usize,
}

impl Default for InferOptions {
    fn default() -> Self {
        InferOptions {
            fuzzy_threshold: 0.70,
            substring_min_key_len: 4,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferredFields {
    pub fields: BTreeMap<Field, String>,
    /// The income default (Earnings/Benefits) was applied; it is a fallback,
    /// not a confident inference.
    pub income_default_applied: bool,
}

/// Fill unset transaction fields from the knowledge bases. Direct values in
/// `knowns` are never overwritten, and neither is an earlier inference.
pub fn infer_indirect_fields(
    store: &dyn KeyValueStore,
    text: &str,
    knowns: &BTreeMap<Field, String>,
    similarity: &dyn Similarity,
    options: &InferOptions,
) -> InferredFields {
    let known_vendor = knowns.get(&Field::Vendor).cloned();
    let raw_text = format!("{text} {}", known_vendor.as_deref().unwrap_or("")).to_lowercase();

    let mut inferred: BTreeMap<Field, String> = BTreeMap::new();
    let is_unset = |inferred: &BTreeMap<Field, String>, field: Field| {
        !inferred.contains_key(&field) && !knowns.contains_key(&field)
    };

    // Keyword bank: any keyword appearing in the text applies its mappings
    // to fields that are still unset.
    for entry in keywords::load_bank(store) {
        if !raw_text.contains(&entry.keyword.to_lowercase()) {
            continue;
        }
        for mapping in &entry.mappings {
            let value = mapping.value.trim();
            if value.is_empty() {
                continue;
            }
            if is_unset(&inferred, mapping.field) {
                inferred.insert(mapping.field, value.to_string());
            }
        }
    }

    // Flat type-keyword list, first match wins.
    if is_unset(&inferred, Field::Type) {
        for tk in seeds::load_type_keywords(store) {
            if raw_text.contains(&tk.keyword.to_lowercase()) {
                inferred.insert(Field::Type, tk.kind.as_str().to_string());
                break;
            }
        }
    }

    let needs_category = is_unset(&inferred, Field::Category);
    let needs_subcategory = is_unset(&inferred, Field::Subcategory);

    if needs_category || needs_subcategory {
        let vendor_text = known_vendor
            .or_else(|| extract_vendor_name(text))
            .unwrap_or_default();
        let fallback = find_closest_fallback(store, &vendor_text, similarity, options);

        let known_type = inferred
            .get(&Field::Type)
            .or_else(|| knowns.get(&Field::Type))
            .and_then(|t| t.parse::<TransactionType>().ok());

        if let Some((_, entry)) = fallback {
            // Only take the classification when its type agrees with what we
            // already know, or when nothing is known yet.
            if known_type.is_none() || known_type == Some(entry.kind) {
                if needs_category && !entry.category.is_empty() {
                    inferred.insert(Field::Category, entry.category.clone());
                }
                if needs_subcategory && !entry.subcategory.is_empty() {
                    inferred.insert(Field::Subcategory, entry.subcategory.clone());
                }
            }
        }
    }

    // Hard-coded default for income with no classification at all.
    let final_type = inferred
        .get(&Field::Type)
        .or_else(|| knowns.get(&Field::Type))
        .and_then(|t| t.parse::<TransactionType>().ok());
    let mut income_default_applied = false;
    if final_type == Some(TransactionType::Income)
        && is_unset(&inferred, Field::Category)
        && is_unset(&inferred, Field::Subcategory)
    {
        inferred.insert(Field::Category, "Earnings".to_string());
        inferred.insert(Field::Subcategory, "Benefits".to_string());
        income_default_applied = true;
        tracing::debug!("applied income default classification: Earnings > Benefits");
    }

    InferredFields {
        fields: inferred,
        income_default_applied,
    }
}

/// Resolve a vendor name against the fallback table: fuzzy matching first,
/// then whole-word substring containment.
pub fn find_closest_fallback(
    store: &dyn KeyValueStore,
    vendor_name: &str,
    similarity: &dyn Similarity,
    options: &InferOptions,
) -> Option<(String, VendorFallbackEntry)> {
    let input = soft_normalize(vendor_name);
    if input.trim().is_empty() {
        return None;
    }

    let fallbacks = vendors::load_fallbacks(store);
    if fallbacks.is_empty() {
        return None;
    }

    let mut best: Option<(f64, &String)> = None;
    for key in fallbacks.keys() {
        let score = similarity.score(&input, &soft_normalize(key));
        if best.map_or(true, |(b, _)| score > b) {
            best = Some((score, key));
        }
    }
    if let Some((score, key)) = best {
        if score >= options.fuzzy_threshold {
            tracing::debug!(vendor = %key, score, "fuzzy matched vendor fallback");
            return Some((key.clone(), fallbacks[key].clone()));
        }
    }

    for key in fallbacks.keys() {
        let normalized_key = soft_normalize(key);
        if normalized_key.chars().count() >= options.substring_min_key_len
            && contains_whole_word(&input, &normalized_key)
        {
            tracing::debug!(vendor = %key, "substring matched vendor fallback");
            return Some((key.clone(), fallbacks[key].clone()));
        }
    }

    None
}

/// Whether `needle` occurs in `haystack` bounded by non-alphanumeric
/// characters (or the string edges) on both sides.
fn contains_whole_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    for (pos, _) in haystack.match_indices(needle) {
        let before_ok = haystack[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[pos + needle.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::NormalizedLevenshtein;
    use chrono::{DateTime, Utc};
    use qirsh_store::keywords::{KeywordMapping, LearnedSource};
    use qirsh_store::seeds::{SeedData, TypeKeyword};
    use qirsh_store::{keys, save_json, MemoryStore};
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    fn fallback_entry(
        kind: TransactionType,
        category: &str,
        subcategory: &str,
    ) -> VendorFallbackEntry {
        VendorFallbackEntry {
            kind,
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            user: false,
            source: None,
            confidence: None,
            sample_count: None,
            learned_at: None,
        }
    }

    fn store_with_type_keywords() -> MemoryStore {
        let store = MemoryStore::new();
        qirsh_store::seeds::initialize_defaults(
            &store,
            &SeedData {
                vendor_fallbacks: BTreeMap::new(),
                type_keywords: SeedData::builtin_type_keywords(),
            },
        );
        store
    }

    fn infer(store: &MemoryStore, text: &str, knowns: &BTreeMap<Field, String>) -> InferredFields {
        infer_indirect_fields(
            store,
            text,
            knowns,
            &NormalizedLevenshtein,
            &InferOptions::default(),
        )
    }

    #[test]
    fn keyword_bank_fills_unset_fields_only() {
        let store = store_with_type_keywords();
        qirsh_store::keywords::merge_mappings(
            &store,
            "netflix",
            &[
                KeywordMapping {
                    field: Field::Category,
                    value: "Entertainment".into(),
                },
                KeywordMapping {
                    field: Field::Subcategory,
                    value: "Streaming".into(),
                },
            ],
            LearnedSource::Manual,
            1,
            now(),
        );

        let mut knowns = BTreeMap::new();
        knowns.insert(Field::Category, "Bills".to_string());
        let out = infer(&store, "Payment to NETFLIX completed", &knowns);
        // Category is known and stays untouched; subcategory is inferred.
        assert!(!out.fields.contains_key(&Field::Category));
        assert_eq!(out.fields[&Field::Subcategory], "Streaming");
    }

    #[test]
    fn type_keywords_first_match_wins() {
        let store = store_with_type_keywords();
        let out = infer(&store, "POS purchase completed", &BTreeMap::new());
        assert_eq!(out.fields[&Field::Type], "expense");
    }

    #[test]
    fn custom_type_keyword_list_is_honored() {
        let store = MemoryStore::new();
        save_json(
            &store,
            keys::TYPE_KEYWORDS,
            &vec![TypeKeyword {
                keyword: "standing order".into(),
                kind: TransactionType::Transfer,
            }],
        );
        let out = infer(&store, "Standing order executed", &BTreeMap::new());
        assert_eq!(out.fields[&Field::Type], "transfer");
    }

    #[test]
    fn vendor_fallback_fuzzy_match_fills_classification() {
        let store = store_with_type_keywords();
        let mut fallbacks = BTreeMap::new();
        fallbacks.insert(
            "Carrefour".to_string(),
            fallback_entry(TransactionType::Expense, "Food", "Groceries"),
        );
        qirsh_store::vendors::save_fallbacks(&store, &fallbacks);

        let mut knowns = BTreeMap::new();
        knowns.insert(Field::Vendor, "Carrefou".to_string()); // one letter off
        let out = infer(&store, "Purchase completed", &knowns);
        assert_eq!(out.fields[&Field::Category], "Food");
        assert_eq!(out.fields[&Field::Subcategory], "Groceries");
    }

    #[test]
    fn vendor_fallback_substring_requires_whole_word() {
        let store = store_with_type_keywords();
        let mut fallbacks = BTreeMap::new();
        fallbacks.insert(
            "noon".to_string(),
            fallback_entry(TransactionType::Expense, "Shopping", "Online"),
        );
        qirsh_store::vendors::save_fallbacks(&store, &fallbacks);

        // "noon" inside "afternoon" is not a whole word; no match.
        let mut knowns = BTreeMap::new();
        knowns.insert(Field::Vendor, "afternoon tea house".to_string());
        let out = infer(&store, "Paid", &knowns);
        assert!(!out.fields.contains_key(&Field::Category));

        let mut knowns = BTreeMap::new();
        knowns.insert(Field::Vendor, "noon marketplace riyadh".to_string());
        let out = infer(&store, "Paid", &knowns);
        assert_eq!(out.fields[&Field::Category], "Shopping");
    }

    #[test]
    fn fallback_type_disagreement_is_rejected() {
        let store = store_with_type_keywords();
        let mut fallbacks = BTreeMap::new();
        fallbacks.insert(
            "Carrefour".to_string(),
            fallback_entry(TransactionType::Expense, "Food", "Groceries"),
        );
        qirsh_store::vendors::save_fallbacks(&store, &fallbacks);

        let mut knowns = BTreeMap::new();
        knowns.insert(Field::Vendor, "Carrefour".to_string());
        knowns.insert(Field::Type, "income".to_string());
        let out = infer(&store, "received payment", &knowns);
        // The expense-typed fallback is refused for an income transaction;
        // the income default takes over instead.
        assert_eq!(out.fields[&Field::Category], "Earnings");
        assert!(out.income_default_applied);
    }

    #[test]
    fn income_default_applies_when_nothing_classified() {
        let store = store_with_type_keywords();
        let out = infer(&store, "Salary credited to your account", &BTreeMap::new());
        assert_eq!(out.fields[&Field::Type], "income");
        assert_eq!(out.fields[&Field::Category], "Earnings");
        assert_eq!(out.fields[&Field::Subcategory], "Benefits");
        assert!(out.income_default_applied);
    }

    #[test]
    fn income_default_skipped_when_category_known() {
        let store = store_with_type_keywords();
        let mut knowns = BTreeMap::new();
        knowns.insert(Field::Category, "Earnings".to_string());
        let out = infer(&store, "Salary credited", &knowns);
        assert!(!out.income_default_applied);
        assert!(!out.fields.contains_key(&Field::Category));
    }

    #[test]
    fn empty_vendor_name_never_matches_fallbacks() {
        let store = store_with_type_keywords();
        let mut fallbacks = BTreeMap::new();
        fallbacks.insert(
            "Carrefour".to_string(),
            fallback_entry(TransactionType::Expense, "Food", "Groceries"),
        );
        qirsh_store::vendors::save_fallbacks(&store, &fallbacks);
        assert!(find_closest_fallback(
            &store,
            "   ",
            &NormalizedLevenshtein,
            &InferOptions::default()
        )
        .is_none());
    }
}
