use std::collections::BTreeMap;

use qirsh_core::{Field, Transaction};
use qirsh_store::keywords::KeywordEntry;

// Blend weights for the overall score. Fixed design constants, not learned.
pub const FIELD_WEIGHT: f64 = 0.5;
pub const TEMPLATE_WEIGHT: f64 = 0.3;
pub const KEYWORD_WEIGHT: f64 = 0.2;

// Per-source keyword scores. These mirror observed product behavior and are
// tunable, not principled.
pub const VENDOR_MAP_HIT: f64 = 0.8;
pub const KEYWORD_CLASS_HIT: f64 = 0.7;
pub const FROM_ACCOUNT_MAP_HIT: f64 = 0.8;

/// Fraction of the eight canonical fields present in direct, inferred, or
/// default values.
pub fn field_confidence(
    direct: &BTreeMap<Field, String>,
    inferred: &BTreeMap<Field, String>,
    defaults: &BTreeMap<Field, String>,
) -> f64 {
    let filled = Field::CANONICAL
        .iter()
        .filter(|f| direct.contains_key(f) || inferred.contains_key(f) || defaults.contains_key(f))
        .count();
    filled as f64 / Field::CANONICAL.len() as f64
}

/// Template-match signal. With an empty template bank there was nothing to
/// match against, so the score is exactly zero regardless of the flag.
pub fn template_confidence(matched: f64, total_templates: usize) -> f64 {
    if total_templates == 0 {
        return 0.0;
    }
    matched
}

/// Mean across the knowledge-base sources that actually fired; sources with
/// no hit are excluded from the average rather than scored as zero.
pub fn keyword_confidence(
    transaction: &Transaction,
    keyword_bank: &[KeywordEntry],
    vendor_map: &BTreeMap<String, String>,
    from_account_map: &BTreeMap<String, String>,
) -> f64 {
    let mut total = 0.0;
    let mut sources = 0u32;

    if let Some(vendor) = transaction.vendor.as_deref() {
        // The bank keys on single keywords; use the vendor's first token.
        if let Some(first_token) = vendor.to_lowercase().split_whitespace().next() {
            if let Some(entry) = keyword_bank.iter().find(|e| e.keyword == first_token) {
                if !entry.mappings.is_empty() {
                    let agreeing = entry
                        .mappings
                        .iter()
                        .filter(|m| {
                            transaction.field_text(m.field).as_deref() == Some(m.value.as_str())
                        })
                        .count();
                    if agreeing > 0 {
                        total += agreeing as f64 / entry.mappings.len() as f64;
                        sources += 1;
                    }
                }
            }
        }

        if vendor_map.values().any(|v| v == vendor) {
            total += VENDOR_MAP_HIT;
            sources += 1;
        }
    }

    if transaction.category.is_some() || transaction.subcategory.is_some() {
        let class_hit = keyword_bank.iter().any(|entry| {
            entry.mappings.iter().any(|m| {
                (m.field == Field::Category
                    && transaction.category.as_deref() == Some(m.value.as_str()))
                    || (m.field == Field::Subcategory
                        && transaction.subcategory.as_deref() == Some(m.value.as_str()))
            })
        });
        if class_hit {
            total += KEYWORD_CLASS_HIT;
            sources += 1;
        }
    }

    if let Some(account) = transaction.from_account.as_deref() {
        if from_account_map.values().any(|v| v == account) {
            total += FROM_ACCOUNT_MAP_HIT;
            sources += 1;
        }
    }

    if sources > 0 {
        total / sources as f64
    } else {
        0.0
    }
}

pub fn overall_confidence(field_score: f64, template_score: f64, keyword_score: f64) -> f64 {
    field_score * FIELD_WEIGHT + template_score * TEMPLATE_WEIGHT + keyword_score * KEYWORD_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use qirsh_core::{TransactionSource, TransactionType};
    use qirsh_store::keywords::{KeywordMapping, LearnedSource};

    fn map(pairs: &[(Field, &str)]) -> BTreeMap<Field, String> {
        pairs
            .iter()
            .map(|(f, v)| (*f, v.to_string()))
            .collect()
    }

    fn entry(keyword: &str, mappings: &[(Field, &str)]) -> KeywordEntry {
        KeywordEntry {
            keyword: keyword.to_string(),
            mappings: mappings
                .iter()
                .map(|(f, v)| KeywordMapping {
                    field: *f,
                    value: v.to_string(),
                })
                .collect(),
            last_updated: Some(Utc::now()),
            mapping_count: Some(1),
            source: LearnedSource::SmsLearn,
        }
    }

    #[test]
    fn field_score_counts_all_three_layers() {
        let direct = map(&[(Field::Amount, "150"), (Field::Currency, "SAR")]);
        let inferred = map(&[(Field::Category, "Food")]);
        let defaults = map(&[(Field::Type, "expense")]);
        assert_eq!(field_confidence(&direct, &inferred, &defaults), 0.5);
    }

    #[test]
    fn field_score_does_not_double_count() {
        let direct = map(&[(Field::Amount, "150")]);
        let inferred = map(&[(Field::Amount, "150")]);
        assert_eq!(
            field_confidence(&direct, &inferred, &BTreeMap::new()),
            1.0 / 8.0
        );
    }

    #[test]
    fn template_score_is_zero_with_empty_bank() {
        assert_eq!(template_confidence(1.0, 0), 0.0);
        assert_eq!(template_confidence(1.0, 3), 1.0);
        assert_eq!(template_confidence(0.0, 3), 0.0);
    }

    #[test]
    fn overall_formula() {
        let c = overall_confidence(1.0, 0.5, 0.25);
        assert!((c - 0.825).abs() < 1e-9);
    }

    fn base_transaction() -> Transaction {
        let mut tx = Transaction::new(TransactionSource::SmartPaste);
        tx.vendor = Some("Netflix".to_string());
        tx.category = Some("Entertainment".to_string());
        tx.subcategory = Some("Streaming".to_string());
        tx.kind = Some(TransactionType::Expense);
        tx
    }

    #[test]
    fn keyword_score_zero_when_no_source_fires() {
        let tx = base_transaction();
        assert_eq!(
            keyword_confidence(&tx, &[], &BTreeMap::new(), &BTreeMap::new()),
            0.0
        );
    }

    #[test]
    fn keyword_entry_scaled_by_agreeing_mappings() {
        let tx = base_transaction();
        let bank = vec![entry(
            "netflix",
            &[
                (Field::Category, "Entertainment"),
                (Field::Subcategory, "Cinema"), // disagrees
            ],
        )];
        // Sources: keyword entry (1/2 agree = 0.5) and the category class
        // hit (0.7) — mean is 0.6.
        let score = keyword_confidence(&tx, &bank, &BTreeMap::new(), &BTreeMap::new());
        assert!((score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn vendor_map_hit_scores_fixed_point_eight() {
        let tx = base_transaction();
        let mut vendor_map = BTreeMap::new();
        vendor_map.insert("NETFLIX.COM".to_string(), "Netflix".to_string());
        let score = keyword_confidence(&tx, &[], &vendor_map, &BTreeMap::new());
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn from_account_map_hit_scores_fixed_point_eight() {
        let mut tx = base_transaction();
        tx.vendor = None;
        tx.category = None;
        tx.subcategory = None;
        tx.from_account = Some("Main Checking".to_string());
        let mut account_map = BTreeMap::new();
        account_map.insert("****1234".to_string(), "Main Checking".to_string());
        let score = keyword_confidence(&tx, &[], &BTreeMap::new(), &account_map);
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn non_matching_sources_are_excluded_from_the_mean() {
        let mut tx = base_transaction();
        tx.from_account = Some("Unmapped".to_string());
        let mut vendor_map = BTreeMap::new();
        vendor_map.insert("raw".to_string(), "Netflix".to_string());
        let bank = vec![entry("netflix", &[(Field::Category, "Entertainment")])];
        // Keyword entry: 1/1 = 1.0; vendor map: 0.8; class hit: 0.7.
        // The from-account map does not fire and is not averaged in.
        let score = keyword_confidence(&tx, &bank, &vendor_map, &BTreeMap::new());
        assert!((score - (1.0 + 0.8 + 0.7) / 3.0).abs() < 1e-9);
    }
}
