use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;

use qirsh_core::{Field, Transaction, TransactionSource, TransactionType};
use qirsh_extract::{extract_template, normalize_date, normalize_structure};
use qirsh_learn::confidence;
use qirsh_learn::infer::infer_indirect_fields;
use qirsh_store::{keywords, templates, vendors, KeyValueStore};

use crate::types::{Origin, ParseStatus, ParsedMessage, ParsedTransactionResult};
use crate::{Engine, EngineError};

impl<S: KeyValueStore> Engine<S> {
    /// Parse raw financial text into a suggested transaction with a blended
    /// confidence score. The caller shows the result for review; nothing is
    /// learned until the user confirms it.
    pub fn parse_text(
        &self,
        text: &str,
        sender_hint: Option<&str>,
    ) -> Result<ParsedTransactionResult, EngineError> {
        let now = Utc::now();
        let extracted = extract_template(text)?;
        let normalized = normalize_structure(&extracted.template);

        // Counted before any registration so a first-ever message scores
        // zero on the template signal.
        let total_templates = templates::load_bank(&self.store).len();

        let account_placeholder = extracted.placeholders.get("account").cloned();
        let matched = templates::lookup(
            &self.store,
            &normalized.hash,
            sender_hint,
            account_placeholder.as_deref(),
            now,
        );

        let vendor_map = vendors::load_vendor_map(&self.store);
        let account_map = vendors::load_from_account_map(&self.store);

        // Direct fields from placeholders, with learned remaps applied.
        let mut direct: BTreeMap<Field, String> = BTreeMap::new();
        if let Some(amount) = extracted.placeholders.get("amount") {
            direct.insert(Field::Amount, amount.clone());
        }
        if let Some(currency) = extracted.placeholders.get("currency") {
            direct.insert(Field::Currency, currency.clone());
        }
        let parsed_date = extracted.placeholders.get("date").and_then(|raw| {
            let date = normalize_date(raw);
            if date.is_none() {
                tracing::debug!(raw, "extracted date did not normalize; leaving unset");
            }
            date
        });
        if let Some(date) = parsed_date {
            direct.insert(Field::Date, date.format("%Y-%m-%d").to_string());
        }
        if let Some(vendor) = extracted.placeholders.get("vendor") {
            let canonical = vendor_map.get(vendor).unwrap_or(vendor).clone();
            direct.insert(Field::Vendor, canonical);
        }
        if let Some(account) = account_placeholder.as_ref() {
            let canonical = account_map.get(account).unwrap_or(account).clone();
            direct.insert(Field::FromAccount, canonical);
        }

        // Cached defaults from the matched template. A recorded field with
        // no placeholder value in this message stays unset.
        let mut defaults: BTreeMap<Field, String> = BTreeMap::new();
        if let Some((_, template)) = matched.as_ref() {
            for (name, value) in &template.default_values {
                if let Some(field) = field_from_name(name) {
                    if !direct.contains_key(&field) {
                        defaults.insert(field, value.clone());
                    }
                }
            }
            for name in &template.fields {
                if !extracted.placeholders.contains_key(name) {
                    tracing::warn!(field = %name, "template field has no value in this message");
                }
            }
        }

        let inferred =
            infer_indirect_fields(&self.store, text, &direct, &self.similarity, &self.config.infer);

        let pick = |field: Field| -> Option<String> {
            direct
                .get(&field)
                .or_else(|| inferred.fields.get(&field))
                .or_else(|| defaults.get(&field))
                .cloned()
        };

        let mut transaction = Transaction::new(TransactionSource::SmartPaste);
        transaction.amount = pick(Field::Amount).and_then(|a| parse_amount(&a));
        transaction.currency = pick(Field::Currency);
        transaction.date = parsed_date;
        transaction.kind = Some(
            pick(Field::Type)
                .and_then(|t| TransactionType::from_str(&t).ok())
                .unwrap_or(TransactionType::Expense),
        );
        transaction.category = pick(Field::Category);
        transaction.subcategory = pick(Field::Subcategory);
        transaction.vendor = pick(Field::Vendor);
        transaction.from_account =
            pick(Field::FromAccount).or_else(|| sender_hint.map(str::to_string));

        let field_score = confidence::field_confidence(&direct, &inferred.fields, &defaults);
        let template_score = confidence::template_confidence(
            if matched.is_some() { 1.0 } else { 0.0 },
            total_templates,
        );
        let keyword_bank = keywords::load_bank(&self.store);
        let keyword_score =
            confidence::keyword_confidence(&transaction, &keyword_bank, &vendor_map, &account_map);
        let overall = confidence::overall_confidence(field_score, template_score, keyword_score);

        let origin = if matched.is_some() {
            Origin::Template
        } else if direct.is_empty() {
            Origin::Fallback
        } else {
            Origin::Structure
        };

        // First sighting of a message shape registers it as a candidate.
        if matched.is_none() {
            let fields = extracted.placeholders.keys().cloned().collect();
            templates::upsert(
                &self.store,
                &normalized.hash,
                &normalized.structure,
                &fields,
                text,
                sender_hint,
                account_placeholder.as_deref(),
                now,
            );
        }

        Ok(ParsedTransactionResult {
            transaction,
            confidence: overall,
            origin,
            status: ParseStatus::from_confidence(overall),
            parsed: ParsedMessage {
                template: extracted.template,
                structure_hash: normalized.hash,
                matched: matched.is_some(),
                direct_fields: direct,
                inferred_fields: inferred.fields,
                default_values: defaults,
                income_default_applied: inferred.income_default_applied,
            },
        })
    }
}

fn field_from_name(name: &str) -> Option<Field> {
    match name {
        "amount" => Some(Field::Amount),
        "currency" => Some(Field::Currency),
        "date" => Some(Field::Date),
        "type" => Some(Field::Type),
        "category" => Some(Field::Category),
        "subcategory" => Some(Field::Subcategory),
        "vendor" => Some(Field::Vendor),
        "account" | "fromAccount" => Some(Field::FromAccount),
        _ => None,
    }
}

/// Parse an extracted amount string, accepting both thousands-grouped and
/// European decimal-comma forms.
fn parse_amount(s: &str) -> Option<Decimal> {
    let t = s.trim();
    let decimal_comma = t.matches(',').count() == 1
        && !t.contains('.')
        && t.rsplit(',').next().is_some_and(|frac| frac.len() <= 2);
    let cleaned = if decimal_comma {
        t.replace(',', ".")
    } else {
        t.replace(',', "")
    };
    Decimal::from_str(&cleaned).ok()
}
