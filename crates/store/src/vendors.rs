use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use qirsh_core::TransactionType;

use crate::keywords::LearnedSource;
use crate::kv::KeyValueStore;
use crate::{keys, load_json_or_default, save_json};

/// Default classification for a known vendor. Entries marked `user` are
/// authoritative and must never be overwritten by automated learning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VendorFallbackEntry {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    pub subcategory: String,
    #[serde(default)]
    pub user: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<LearnedSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learned_at: Option<DateTime<Utc>>,
}

pub fn load_fallbacks(store: &dyn KeyValueStore) -> BTreeMap<String, VendorFallbackEntry> {
    load_json_or_default(store, keys::VENDOR_FALLBACKS)
}

pub fn save_fallbacks(store: &dyn KeyValueStore, map: &BTreeMap<String, VendorFallbackEntry>) {
    save_json(store, keys::VENDOR_FALLBACKS, map);
}

/// Add a user-authored vendor mapping. Blank names are rejected and an
/// existing entry is left untouched.
pub fn add_user_vendor(
    store: &dyn KeyValueStore,
    name: &str,
    kind: TransactionType,
    category: &str,
    subcategory: &str,
) {
    let name = name.trim();
    if name.is_empty() {
        return;
    }
    let mut map = load_fallbacks(store);
    if map.contains_key(name) {
        return;
    }
    map.insert(
        name.to_string(),
        VendorFallbackEntry {
            kind,
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            user: true,
            source: Some(LearnedSource::Manual),
            confidence: None,
            sample_count: None,
            learned_at: None,
        },
    );
    save_fallbacks(store, &map);
}

/// Extracted vendor name → the canonical name the user corrected it to.
pub fn load_vendor_map(store: &dyn KeyValueStore) -> BTreeMap<String, String> {
    load_json_or_default(store, keys::VENDOR_MAP)
}

pub fn record_vendor_remap(store: &dyn KeyValueStore, extracted: &str, confirmed: &str) {
    let extracted = extracted.trim();
    let confirmed = confirmed.trim();
    if extracted.is_empty() || confirmed.is_empty() || extracted == confirmed {
        return;
    }
    let mut map = load_vendor_map(store);
    map.insert(extracted.to_string(), confirmed.to_string());
    save_json(store, keys::VENDOR_MAP, &map);
}

/// Raw account label → the account name the user mapped it to.
pub fn load_from_account_map(store: &dyn KeyValueStore) -> BTreeMap<String, String> {
    load_json_or_default(store, keys::FROM_ACCOUNT_MAP)
}

pub fn record_from_account_remap(store: &dyn KeyValueStore, raw: &str, confirmed: &str) {
    let raw = raw.trim();
    let confirmed = confirmed.trim();
    if raw.is_empty() || confirmed.is_empty() {
        return;
    }
    let mut map = load_from_account_map(store);
    map.insert(raw.to_string(), confirmed.to_string());
    save_json(store, keys::FROM_ACCOUNT_MAP, &map);
}
