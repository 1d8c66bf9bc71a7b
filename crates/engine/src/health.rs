use std::collections::BTreeMap;

use chrono::Utc;

use qirsh_learn::lifecycle;
use qirsh_store::templates::{self, Template, TemplateStatus};
use qirsh_store::KeyValueStore;

use crate::Engine;

/// One template with its recomputed lifecycle assessment.
#[derive(Debug, Clone)]
pub struct TemplateHealthEntry {
    pub key: String,
    pub template: Template,
    pub score: f64,
    pub status: TemplateStatus,
    pub recommendation: String,
}

/// Read-only introspection over the template bank, for developer tooling.
#[derive(Debug, Clone, Default)]
pub struct TemplateHealth {
    pub templates: Vec<TemplateHealthEntry>,
    /// Bank keys of templates unused past the staleness threshold.
    pub stale_templates: Vec<String>,
    pub status_counts: BTreeMap<&'static str, usize>,
}

impl<S: KeyValueStore> Engine<S> {
    pub fn template_health(&self) -> TemplateHealth {
        let now = Utc::now();
        let bank = templates::load_bank(&self.store);

        let mut entries = Vec::with_capacity(bank.len());
        let mut status_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for (key, template) in bank {
            let result = lifecycle::compute_template_confidence(&template, now);
            *status_counts.entry(result.status.as_str()).or_insert(0) += 1;
            entries.push(TemplateHealthEntry {
                key,
                template,
                score: result.score,
                status: result.status,
                recommendation: result.recommendation,
            });
        }

        let stale_templates = templates::get_stale(&self.store, self.config.stale_after_days, now)
            .into_iter()
            .map(|(key, _)| key)
            .collect();

        TemplateHealth {
            templates: entries,
            stale_templates,
            status_counts,
        }
    }
}
