//! Grounded question answering over engineering standards, regulations
//! and drawings.
//!
//! A question is fanned out across passage collections, answered by a
//! chat model from the fused passages, and the citations the model names
//! are reconciled against canonical records. Answers that admit they
//! found nothing, and cite nothing resolvable, are regenerated from the
//! model's background knowledge.

pub mod citation;
pub mod confidence;
pub mod config;
pub mod domain;
pub mod fallback;
pub mod fusion;
pub mod generator;
pub mod orchestrator;
pub mod records;
pub mod search;
pub mod session;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use citation::{reconcile, Reconciliation};
pub use config::{load_qa_config, QaConfig};
pub use generator::{AnswerGenerator, GenerationMode, GenerationSettings, LlmAnswerGenerator};
pub use orchestrator::Orchestrator;
pub use records::{CanonicalRecord, RecordKind, RecordLookup, ResolvedReferences, SqliteRecordStore};
pub use search::{local::LocalCollectionClient, SearchClient};
pub use session::{InMemorySessionStore, SessionStore};
pub use types::{AnswerMode, Candidate, CandidateMetadata, FailureKind, FinalAnswer, RetrievedSet};
