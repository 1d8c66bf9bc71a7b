use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use qirsh_core::Field;

use crate::kv::KeyValueStore;
use crate::{keys, load_json_or_default, save_json};

/// Provenance of a learned entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LearnedSource {
    Manual,
    SmsLearn,
    CsvImport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeywordMapping {
    pub field: Field,
    pub value: String,
}

/// A keyword with the field hints it implies. Entries are merged, never
/// overwritten: a field that already has a mapping keeps it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeywordEntry {
    pub keyword: String,
    pub mappings: Vec<KeywordMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_count: Option<u32>,
    pub source: LearnedSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeResult {
    pub created: bool,
    pub mappings_added: usize,
}

pub fn load_bank(store: &dyn KeyValueStore) -> Vec<KeywordEntry> {
    load_json_or_default(store, keys::KEYWORD_BANK)
}

pub fn save_bank(store: &dyn KeyValueStore, bank: &[KeywordEntry]) {
    save_json(store, keys::KEYWORD_BANK, &bank);
}

/// Add-only merge of field mappings under a keyword. New keywords create an
/// entry; existing keywords gain only mappings for fields they do not map
/// yet. `sample_count` accumulates into the entry's mapping count.
pub fn merge_mappings(
    store: &dyn KeyValueStore,
    keyword: &str,
    mappings: &[KeywordMapping],
    source: LearnedSource,
    sample_count: u32,
    now: DateTime<Utc>,
) -> MergeResult {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() || mappings.is_empty() {
        return MergeResult {
            created: false,
            mappings_added: 0,
        };
    }

    let mut bank = load_bank(store);
    let result = match bank.iter_mut().find(|e| e.keyword == keyword) {
        Some(existing) => {
            let mut added = 0;
            for mapping in mappings {
                let already_mapped = existing.mappings.iter().any(|m| m.field == mapping.field);
                if !already_mapped {
                    existing.mappings.push(mapping.clone());
                    added += 1;
                }
            }
            existing.last_updated = Some(now);
            existing.mapping_count = Some(existing.mapping_count.unwrap_or(0) + sample_count);
            MergeResult {
                created: false,
                mappings_added: added,
            }
        }
        None => {
            bank.push(KeywordEntry {
                keyword,
                mappings: mappings.to_vec(),
                last_updated: Some(now),
                mapping_count: Some(sample_count),
                source,
            });
            MergeResult {
                created: true,
                mappings_added: mappings.len(),
            }
        }
    };

    save_bank(store, &bank);
    result
}

/// Remove a keyword entry, case-insensitively.
pub fn delete_keyword(store: &dyn KeyValueStore, keyword: &str) {
    let lower = keyword.to_lowercase();
    let mut bank = load_bank(store);
    bank.retain(|e| e.keyword.to_lowercase() != lower);
    save_bank(store, &bank);
}
