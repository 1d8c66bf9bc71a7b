pub mod health;
pub mod parse;
pub mod types;

use chrono::Utc;
use thiserror::Error;

use qirsh_extract::ExtractError;
use qirsh_learn::infer::InferOptions;
use qirsh_learn::similarity::NormalizedLevenshtein;
use qirsh_learn::{batch_learn, learn_from_confirmation};
use qirsh_store::seeds;
use qirsh_store::KeyValueStore;

pub use health::{TemplateHealth, TemplateHealthEntry};
pub use qirsh_core::{Field, Transaction, TransactionSource, TransactionType};
pub use qirsh_learn::{LearnOutcome, LearningResult};
pub use qirsh_store::{JsonFileStore, MemoryStore, SeedData};
pub use types::{Origin, ParseStatus, ParsedMessage, ParsedTransactionResult, TransactionSink};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Engine tunables. The defaults mirror shipped behavior; hosts rarely need
/// to change them.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub infer: InferOptions,
    /// Days of disuse after which a template counts as stale.
    pub stale_after_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            infer: InferOptions::default(),
            stale_after_days: 90,
        }
    }
}

/// The structured-extraction engine. All state lives behind the injected
/// key-value store; constructing one is cheap and tests can hold isolated
/// instances. Callers serialize concurrent use — the engine does no locking
/// of its own.
pub struct Engine<S: KeyValueStore> {
    store: S,
    config: EngineConfig,
    similarity: NormalizedLevenshtein,
}

impl<S: KeyValueStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Engine {
            store,
            config,
            similarity: NormalizedLevenshtein,
        }
    }

    /// The injected persistence collaborator, for host-side inspection.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Write the host-supplied seed datasets where no state exists yet.
    pub fn initialize_defaults(&self, seed: &SeedData) {
        seeds::initialize_defaults(&self.store, seed);
    }

    /// Run the learning pipeline for one confirmed transaction and hand the
    /// record to the host's transaction store. Learning only happens when
    /// the transaction originated from raw text.
    pub fn confirm_transaction(
        &self,
        transaction: &Transaction,
        raw_message: Option<&str>,
        sender_hint: Option<&str>,
        is_new: bool,
        sink: &mut dyn TransactionSink,
    ) -> Result<Option<LearnOutcome>, EngineError> {
        sink.upsert(transaction, is_new);
        match raw_message {
            Some(raw) => {
                let outcome =
                    learn_from_confirmation(&self.store, transaction, raw, sender_hint, Utc::now())?;
                Ok(Some(outcome))
            }
            None => Ok(None),
        }
    }

    /// Bulk learning over classified transactions (CSV import).
    pub fn batch_learn(&self, transactions: &[Transaction]) -> LearningResult {
        batch_learn(&self.store, transactions, Utc::now())
    }

    /// Housekeeping: persist recomputed lifecycle scores and statuses across
    /// the template bank. Not part of the hot path.
    pub fn refresh_template_lifecycles(&self) -> usize {
        qirsh_learn::lifecycle::refresh_lifecycles(&self.store, Utc::now())
    }
}
