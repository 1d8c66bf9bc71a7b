pub mod keys;
pub mod keywords;
pub mod kv;
pub mod seeds;
pub mod templates;
pub mod vendors;

pub use keywords::{KeywordEntry, KeywordMapping, LearnedSource, MergeResult};
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use seeds::{SeedData, TypeKeyword};
pub use templates::{Template, TemplateMeta, TemplateStatus, UpsertOutcome};
pub use vendors::VendorFallbackEntry;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Read a JSON blob from the store, recovering to the default value when the
/// persisted state is missing or malformed. Corrupt user data must never
/// block the feature, so parse failures are logged and swallowed.
pub fn load_json_or_default<T: DeserializeOwned + Default>(
    store: &dyn KeyValueStore,
    key: &str,
) -> T {
    match store.get(key) {
        None => T::default(),
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, %err, "malformed persisted state, using defaults");
                T::default()
            }
        },
    }
}

pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => store.set(key, &raw),
        Err(err) => tracing::warn!(key, %err, "failed to serialize state"),
    }
}
