use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::kv::KeyValueStore;
use crate::{keys, load_json_or_default, save_json};

/// Bucket used when neither a sender nor an account is known.
pub const UNKNOWN_SCOPE: &str = "__unknown__";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStatus {
    Candidate,
    Learning,
    Ready,
    Deprecated,
}

impl TemplateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateStatus::Candidate => "candidate",
            TemplateStatus::Learning => "learning",
            TemplateStatus::Ready => "ready",
            TemplateStatus::Deprecated => "deprecated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMeta {
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: u32,
    pub success_count: u32,
    pub fallback_count: u32,
    /// Lifecycle score 0–100, recomputed by the learning pipeline.
    pub confidence_score: f64,
    pub status: TemplateStatus,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl TemplateMeta {
    fn fresh(now: DateTime<Utc>) -> Self {
        TemplateMeta {
            created_at: now,
            last_used_at: None,
            usage_count: 0,
            success_count: 0,
            fallback_count: 0,
            confidence_score: 50.0,
            status: TemplateStatus::Candidate,
            last_failure_at: None,
        }
    }
}

/// A recognized message shape with its usage telemetry and cached defaults.
/// Records are never hard-deleted, only marked deprecated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub template: String,
    pub fields: BTreeSet<String>,
    pub default_values: BTreeMap<String, String>,
    pub raw_sample: String,
    pub meta: TemplateMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Bank key the record lives under (`scope:hash`).
    pub key: String,
    /// Deterministic short hash of the structure.
    pub id: String,
    pub created: bool,
}

pub fn load_bank(store: &dyn KeyValueStore) -> BTreeMap<String, Template> {
    load_json_or_default(store, keys::TEMPLATES)
}

pub fn save_bank(store: &dyn KeyValueStore, bank: &BTreeMap<String, Template>) {
    save_json(store, keys::TEMPLATES, bank);
}

fn normalize_scope_part(part: Option<&str>) -> Option<String> {
    part.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

/// Templates are scoped per sender when one is known, so two institutions can
/// reuse the same literal wording without colliding.
pub fn scope_key(sender: Option<&str>, account: Option<&str>) -> String {
    normalize_scope_part(sender)
        .or_else(|| normalize_scope_part(account))
        .unwrap_or_else(|| UNKNOWN_SCOPE.to_string())
}

fn bank_key(scope: &str, hash: &str) -> String {
    format!("{scope}:{hash}")
}

fn short_structure_id(structure: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(structure.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Look up a template by structure hash, trying the specific sender/account
/// scope first and the unknown bucket second. A hit counts as a usage: the
/// telemetry is updated and persisted before the record is returned.
pub fn lookup(
    store: &dyn KeyValueStore,
    hash: &str,
    sender: Option<&str>,
    account: Option<&str>,
    now: DateTime<Utc>,
) -> Option<(String, Template)> {
    let mut bank = load_bank(store);
    let specific = bank_key(&scope_key(sender, account), hash);
    let fallback = bank_key(UNKNOWN_SCOPE, hash);
    let key = if bank.contains_key(&specific) {
        specific
    } else if bank.contains_key(&fallback) {
        fallback
    } else {
        return None;
    };

    let template = bank.get_mut(&key)?;
    template.meta.usage_count += 1;
    template.meta.last_used_at = Some(now);
    let found = template.clone();
    save_bank(store, &bank);
    Some((key, found))
}

/// Insert or widen a template record. An existing record has its field set
/// unioned (never narrowed) and its raw sample replaced; a new record starts
/// with zeroed telemetry as a candidate.
pub fn upsert(
    store: &dyn KeyValueStore,
    hash: &str,
    structure: &str,
    fields: &BTreeSet<String>,
    raw_sample: &str,
    sender: Option<&str>,
    account: Option<&str>,
    now: DateTime<Utc>,
) -> UpsertOutcome {
    let mut bank = load_bank(store);
    let key = bank_key(&scope_key(sender, account), hash);
    let id = short_structure_id(structure);

    let created = match bank.get_mut(&key) {
        Some(existing) => {
            existing.fields.extend(fields.iter().cloned());
            if !raw_sample.is_empty() {
                existing.raw_sample = raw_sample.to_string();
            }
            false
        }
        None => {
            bank.insert(
                key.clone(),
                Template {
                    id: id.clone(),
                    template: structure.to_string(),
                    fields: fields.clone(),
                    default_values: BTreeMap::new(),
                    raw_sample: raw_sample.to_string(),
                    meta: TemplateMeta::fresh(now),
                },
            );
            true
        }
    };

    save_bank(store, &bank);
    UpsertOutcome { key, id, created }
}

/// Record the outcome of a confirmed learning event against a template.
pub fn record_outcome(
    store: &dyn KeyValueStore,
    key: &str,
    success: bool,
    now: DateTime<Utc>,
) -> bool {
    let mut bank = load_bank(store);
    let Some(template) = bank.get_mut(key) else {
        return false;
    };
    if success {
        template.meta.success_count += 1;
    } else {
        template.meta.fallback_count += 1;
        template.meta.last_failure_at = Some(now);
    }
    save_bank(store, &bank);
    true
}

/// Cache a default field value on a template for future matches.
pub fn set_default_value(store: &dyn KeyValueStore, key: &str, field: &str, value: &str) {
    let mut bank = load_bank(store);
    if let Some(template) = bank.get_mut(key) {
        template
            .default_values
            .insert(field.to_string(), value.to_string());
        save_bank(store, &bank);
    }
}

/// Templates not used (or, if never used, not created) within the threshold.
/// Housekeeping tooling only; the hot path never calls this.
pub fn get_stale(
    store: &dyn KeyValueStore,
    threshold_days: i64,
    now: DateTime<Utc>,
) -> Vec<(String, Template)> {
    let cutoff = now - Duration::days(threshold_days);
    load_bank(store)
        .into_iter()
        .filter(|(_, t)| t.meta.last_used_at.unwrap_or(t.meta.created_at) < cutoff)
        .collect()
}
