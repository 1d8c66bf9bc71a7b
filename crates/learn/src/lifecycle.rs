use chrono::{DateTime, Utc};

use qirsh_store::templates::{self, Template, TemplateStatus};
use qirsh_store::KeyValueStore;

pub const READY_SCORE: f64 = 80.0;
pub const LEARNING_SCORE: f64 = 50.0;
pub const MIN_USAGE_FOR_READY: u32 = 5;
pub const MIN_USAGE_FOR_EVALUATION: u32 = 3;

const RECENCY_PENALTY_MAX: f64 = 10.0;
const RECENCY_WINDOW_DAYS: f64 = 7.0;

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleResult {
    /// 0–100.
    pub score: f64,
    pub status: TemplateStatus,
    pub recommendation: String,
}

/// Recompute a template's lifecycle score and status from its telemetry.
///
/// Below the evaluation threshold the template stays a candidate at the
/// neutral score. Otherwise the success rate is penalized by up to ten
/// points for a failure in the last seven days, decaying linearly to zero
/// across the window.
pub fn compute_template_confidence(template: &Template, now: DateTime<Utc>) -> LifecycleResult {
    let meta = &template.meta;
    let usage = meta.usage_count;

    if usage < MIN_USAGE_FOR_EVALUATION {
        return LifecycleResult {
            score: 50.0,
            status: TemplateStatus::Candidate,
            recommendation: format!(
                "Needs {} more uses to evaluate",
                MIN_USAGE_FOR_EVALUATION - usage
            ),
        };
    }

    let total = meta.success_count + meta.fallback_count;
    let success_rate = if total > 0 {
        meta.success_count as f64 / total as f64 * 100.0
    } else {
        50.0
    };

    let mut recency_penalty = 0.0;
    if let Some(failure_at) = meta.last_failure_at {
        let days_since = (now - failure_at).num_seconds() as f64 / 86_400.0;
        if days_since >= 0.0 && days_since < RECENCY_WINDOW_DAYS {
            recency_penalty = RECENCY_PENALTY_MAX * (1.0 - days_since / RECENCY_WINDOW_DAYS);
        }
    }

    let score = (success_rate - recency_penalty).clamp(0.0, 100.0);

    let (status, recommendation) = if score >= READY_SCORE && usage >= MIN_USAGE_FOR_READY {
        (
            TemplateStatus::Ready,
            "Template is reliable and ready for auto-apply".to_string(),
        )
    } else if score >= LEARNING_SCORE {
        (
            TemplateStatus::Learning,
            "Template needs more successful uses or manual review".to_string(),
        )
    } else {
        (
            TemplateStatus::Deprecated,
            "Template has too many failures, consider retraining".to_string(),
        )
    };

    LifecycleResult {
        score,
        status,
        recommendation,
    }
}

/// Whether a template is trustworthy enough to apply without review.
pub fn should_auto_apply(template: &Template, now: DateTime<Utc>) -> bool {
    let result = compute_template_confidence(template, now);
    result.status == TemplateStatus::Ready && result.score >= READY_SCORE
}

/// Housekeeping pass: persist the recomputed score and status on every
/// template record. Returns how many records changed.
pub fn refresh_lifecycles(store: &dyn KeyValueStore, now: DateTime<Utc>) -> usize {
    let mut bank = templates::load_bank(store);
    let mut changed = 0;
    for template in bank.values_mut() {
        let result = compute_template_confidence(template, now);
        if template.meta.confidence_score != result.score || template.meta.status != result.status
        {
            template.meta.confidence_score = result.score;
            template.meta.status = result.status;
            changed += 1;
        }
    }
    if changed > 0 {
        templates::save_bank(store, &bank);
    }
    changed
}
