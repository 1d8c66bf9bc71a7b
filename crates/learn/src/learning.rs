use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use qirsh_core::{Field, Transaction};
use qirsh_extract::{extract_template, normalize_structure, ExtractError};
use qirsh_store::keywords::{self, KeywordMapping, LearnedSource};
use qirsh_store::{templates, vendors, KeyValueStore};

/// What a single confirmed transaction taught the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnOutcome {
    pub template_key: String,
    pub template_created: bool,
    /// The extractor's view of the message agreed with the confirmed record.
    pub extraction_agreed: bool,
    pub keyword_mappings_added: usize,
    pub vendor_remapped: bool,
    pub from_account_cached: bool,
}

/// Learn from one confirmed transaction that originated from raw text.
///
/// Re-extracts the original message, registers (or widens) its template, and
/// compares the extracted placeholders against the user-confirmed fields:
/// agreement records a success outcome, disagreement a fallback. The keyword
/// bank, vendor remap, and template defaults are updated independently.
pub fn learn_from_confirmation(
    store: &dyn KeyValueStore,
    transaction: &Transaction,
    raw_message: &str,
    sender_hint: Option<&str>,
    now: DateTime<Utc>,
) -> Result<LearnOutcome, ExtractError> {
    let extracted = extract_template(raw_message)?;
    let normalized = normalize_structure(&extracted.template);

    let fields: BTreeSet<String> = extracted.placeholders.keys().cloned().collect();
    let account = extracted.placeholders.get("account").map(String::as_str);
    let upserted = templates::upsert(
        store,
        &normalized.hash,
        &normalized.structure,
        &fields,
        raw_message,
        sender_hint,
        account,
        now,
    );

    let agreed = placeholders_agree(&extracted.placeholders, transaction);
    templates::record_outcome(store, &upserted.key, agreed, now);
    tracing::debug!(
        key = %upserted.key,
        agreed,
        "recorded template outcome from confirmed transaction"
    );

    // Keyword bank: the extracted vendor keyword learns the confirmed
    // vendor/category/subcategory. Add-only; other fields keep theirs.
    let mut mappings_added = 0;
    let extracted_vendor = extracted.placeholders.get("vendor").map(String::as_str);
    if let Some(keyword) = extracted_vendor {
        let mut mappings = Vec::new();
        if let Some(vendor) = transaction.vendor.as_deref() {
            mappings.push(KeywordMapping {
                field: Field::Vendor,
                value: vendor.to_string(),
            });
        }
        if let Some(category) = transaction.category.as_deref() {
            mappings.push(KeywordMapping {
                field: Field::Category,
                value: category.to_string(),
            });
        }
        if let Some(subcategory) = transaction.subcategory.as_deref() {
            mappings.push(KeywordMapping {
                field: Field::Subcategory,
                value: subcategory.to_string(),
            });
        }
        let result =
            keywords::merge_mappings(store, keyword, &mappings, LearnedSource::SmsLearn, 1, now);
        mappings_added = result.mappings_added;
    }

    // The user corrected the vendor: remember the remap for next time.
    let mut vendor_remapped = false;
    if let (Some(extracted_vendor), Some(confirmed)) =
        (extracted_vendor, transaction.vendor.as_deref())
    {
        if !extracted_vendor.trim().is_empty()
            && !extracted_vendor.trim().eq_ignore_ascii_case(confirmed.trim())
        {
            vendors::record_vendor_remap(store, extracted_vendor, confirmed);
            vendor_remapped = true;
        }
    }

    // Cache the confirmed account as the template default for future
    // matches of the same shape.
    let mut from_account_cached = false;
    if let Some(from_account) = transaction.from_account.as_deref() {
        let bank = templates::load_bank(store);
        let missing_default = bank
            .get(&upserted.key)
            .map(|t| !t.default_values.contains_key(Field::FromAccount.as_str()))
            .unwrap_or(false);
        if missing_default {
            templates::set_default_value(
                store,
                &upserted.key,
                Field::FromAccount.as_str(),
                from_account,
            );
            from_account_cached = true;
        }
    }

    Ok(LearnOutcome {
        template_key: upserted.key,
        template_created: upserted.created,
        extraction_agreed: agreed,
        keyword_mappings_added: mappings_added,
        vendor_remapped,
        from_account_cached,
    })
}

/// Compare extracted placeholder values against the confirmed transaction.
/// Only fields present on both sides are compared; all of them must agree.
fn placeholders_agree(
    placeholders: &std::collections::BTreeMap<String, String>,
    transaction: &Transaction,
) -> bool {
    if let (Some(extracted), Some(confirmed)) =
        (placeholders.get("vendor"), transaction.vendor.as_deref())
    {
        if !extracted.trim().eq_ignore_ascii_case(confirmed.trim()) {
            return false;
        }
    }

    if let (Some(extracted), Some(confirmed)) =
        (placeholders.get("currency"), transaction.currency.as_deref())
    {
        if !extracted.trim().eq_ignore_ascii_case(confirmed.trim()) {
            return false;
        }
    }

    if let (Some(extracted), Some(confirmed)) = (placeholders.get("amount"), transaction.amount) {
        match Decimal::from_str(&extracted.replace(',', "")) {
            Ok(value) if value == confirmed => {}
            _ => return false,
        }
    }

    if let (Some(extracted), Some(confirmed)) =
        (placeholders.get("account"), transaction.from_account.as_deref())
    {
        // The placeholder is a masked fragment like "****1234"; agreement
        // means the confirmed account carries the same trailing digits.
        let digits: String = extracted.chars().filter(char::is_ascii_digit).collect();
        if !digits.is_empty() && !confirmed.contains(&digits) && extracted.trim() != confirmed.trim()
        {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use qirsh_core::TransactionSource;
    use qirsh_store::MemoryStore;

    const RAW: &str = "Purchase of SAR 150.00 at CARREFOUR on 15/01/2024 from account ****1234";

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    fn confirmed() -> Transaction {
        let mut tx = Transaction::new(TransactionSource::SmartPaste);
        tx.amount = Some(Decimal::from_str("150.00").unwrap());
        tx.currency = Some("SAR".to_string());
        tx.vendor = Some("CARREFOUR".to_string());
        tx.category = Some("Food".to_string());
        tx.subcategory = Some("Groceries".to_string());
        tx.from_account = Some("Main ****1234".to_string());
        tx
    }

    #[test]
    fn agreement_records_success_and_creates_template() {
        let store = MemoryStore::new();
        let out =
            learn_from_confirmation(&store, &confirmed(), RAW, Some("ALRAJHI"), now()).unwrap();
        assert!(out.template_created);
        assert!(out.extraction_agreed);
        assert!(out.template_key.starts_with("alrajhi:"));

        let bank = templates::load_bank(&store);
        let t = &bank[&out.template_key];
        assert_eq!(t.meta.success_count, 1);
        assert_eq!(t.meta.fallback_count, 0);
    }

    #[test]
    fn edited_amount_records_fallback() {
        let store = MemoryStore::new();
        let mut tx = confirmed();
        tx.amount = Some(Decimal::from_str("999.00").unwrap());
        let out = learn_from_confirmation(&store, &tx, RAW, None, now()).unwrap();
        assert!(!out.extraction_agreed);
        let bank = templates::load_bank(&store);
        assert_eq!(bank[&out.template_key].meta.fallback_count, 1);
    }

    #[test]
    fn vendor_edit_persists_a_remap() {
        let store = MemoryStore::new();
        let mut tx = confirmed();
        tx.vendor = Some("Carrefour Hypermarket".to_string());
        let out = learn_from_confirmation(&store, &tx, RAW, None, now()).unwrap();
        assert!(out.vendor_remapped);
        let map = vendors::load_vendor_map(&store);
        assert_eq!(map["CARREFOUR"], "Carrefour Hypermarket");
    }

    #[test]
    fn unedited_vendor_records_no_remap() {
        let store = MemoryStore::new();
        let out = learn_from_confirmation(&store, &confirmed(), RAW, None, now()).unwrap();
        assert!(!out.vendor_remapped);
        assert!(vendors::load_vendor_map(&store).is_empty());
    }

    #[test]
    fn keyword_bank_learns_classification_under_extracted_vendor() {
        let store = MemoryStore::new();
        learn_from_confirmation(&store, &confirmed(), RAW, None, now()).unwrap();
        let bank = keywords::load_bank(&store);
        let entry = bank.iter().find(|e| e.keyword == "carrefour").unwrap();
        assert!(entry
            .mappings
            .iter()
            .any(|m| m.field == Field::Category && m.value == "Food"));
        assert!(entry
            .mappings
            .iter()
            .any(|m| m.field == Field::Subcategory && m.value == "Groceries"));
    }

    #[test]
    fn repeated_learning_merges_instead_of_clobbering() {
        let store = MemoryStore::new();
        learn_from_confirmation(&store, &confirmed(), RAW, None, now()).unwrap();
        let mut tx = confirmed();
        tx.category = Some("Shopping".to_string()); // would clobber
        learn_from_confirmation(&store, &tx, RAW, None, now()).unwrap();

        let bank = keywords::load_bank(&store);
        let entry = bank.iter().find(|e| e.keyword == "carrefour").unwrap();
        let categories: Vec<_> = entry
            .mappings
            .iter()
            .filter(|m| m.field == Field::Category)
            .collect();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].value, "Food");
    }

    #[test]
    fn from_account_default_cached_once() {
        let store = MemoryStore::new();
        let out = learn_from_confirmation(&store, &confirmed(), RAW, None, now()).unwrap();
        assert!(out.from_account_cached);

        let mut tx = confirmed();
        tx.from_account = Some("Other Account".to_string());
        let out = learn_from_confirmation(&store, &tx, RAW, None, now()).unwrap();
        // The default already exists; it is not replaced.
        assert!(!out.from_account_cached);
        let bank = templates::load_bank(&store);
        assert_eq!(
            bank[&out.template_key].default_values["fromAccount"],
            "Main ****1234"
        );
    }

    #[test]
    fn empty_raw_message_is_an_error() {
        let store = MemoryStore::new();
        let err = learn_from_confirmation(&store, &confirmed(), "  ", None, now());
        assert_eq!(err, Err(ExtractError::EmptyInput));
    }

    #[test]
    fn vacuous_agreement_when_no_fields_overlap() {
        let store = MemoryStore::new();
        let tx = Transaction::new(TransactionSource::SmartPaste);
        let out = learn_from_confirmation(&store, &tx, RAW, None, now()).unwrap();
        assert!(out.extraction_agreed);
    }
}
