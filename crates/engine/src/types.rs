use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use qirsh_core::{Field, Transaction};

/// How the suggested transaction was produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// The message matched a known template.
    Template,
    /// Fields came from structural extraction alone.
    Structure,
    /// An external model produced the fields (reserved for hosts that run one).
    Ml,
    /// Nothing substantial was extracted; the result is mostly defaults.
    Fallback,
}

/// Review-queue banding for a parse result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    Success,
    Partial,
    Failed,
}

impl ParseStatus {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            ParseStatus::Success
        } else if confidence >= 0.4 {
            ParseStatus::Partial
        } else {
            ParseStatus::Failed
        }
    }
}

/// The extraction layers behind a parse result, kept separate so scoring and
/// learning can tell where each value came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMessage {
    pub template: String,
    pub structure_hash: String,
    /// An existing template matched this message's structure.
    pub matched: bool,
    pub direct_fields: BTreeMap<Field, String>,
    pub inferred_fields: BTreeMap<Field, String>,
    pub default_values: BTreeMap<Field, String>,
    pub income_default_applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransactionResult {
    pub transaction: Transaction,
    /// Blended extraction confidence in [0, 1].
    pub confidence: f64,
    pub origin: Origin,
    pub status: ParseStatus,
    pub parsed: ParsedMessage,
}

/// The host's transaction store. The engine pushes confirmed records through
/// this collaborator; it owns none of the transaction persistence itself.
pub trait TransactionSink {
    fn upsert(&mut self, transaction: &Transaction, is_new: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_banding() {
        assert_eq!(ParseStatus::from_confidence(0.95), ParseStatus::Success);
        assert_eq!(ParseStatus::from_confidence(0.8), ParseStatus::Success);
        assert_eq!(ParseStatus::from_confidence(0.5), ParseStatus::Partial);
        assert_eq!(ParseStatus::from_confidence(0.4), ParseStatus::Partial);
        assert_eq!(ParseStatus::from_confidence(0.1), ParseStatus::Failed);
    }
}
