pub mod batch;
pub mod confidence;
pub mod csv;
pub mod infer;
pub mod learning;
pub mod lifecycle;
pub mod similarity;

pub use batch::{batch_learn, LearningResult};
pub use confidence::{
    field_confidence, keyword_confidence, overall_confidence, template_confidence,
};
pub use infer::{infer_indirect_fields, InferOptions, InferredFields};
pub use learning::{learn_from_confirmation, LearnOutcome};
pub use lifecycle::{compute_template_confidence, should_auto_apply, LifecycleResult};
pub use similarity::{NormalizedLevenshtein, Similarity};
