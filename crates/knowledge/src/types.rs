//! Core types for retrieval, reconciliation and answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fixed metadata schema carried by every retrieved passage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetadata {
    /// File the passage was chunked from
    #[serde(default)]
    pub source_file: String,

    /// Position of the passage within its file
    #[serde(default)]
    pub chunk_index: u32,

    /// Total passages produced from the file
    #[serde(default)]
    pub chunk_count: u32,

    /// Standard number the file belongs to, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_number: Option<String>,

    /// Open extension map for backend-specific keys
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One retrieved passage, prior to fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub content: String,
    pub collection_id: String,
    /// Normalized to [0, 1], higher is more relevant
    pub relevance_score: f32,
    pub metadata: CandidateMetadata,
}

impl Candidate {
    pub fn new(
        content: impl Into<String>,
        collection_id: impl Into<String>,
        relevance_score: f32,
        metadata: CandidateMetadata,
    ) -> Self {
        Self {
            content: content.into(),
            collection_id: collection_id.into(),
            relevance_score,
            metadata,
        }
    }
}

/// Fused, deduplicated and thresholded candidates, best first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedSet {
    candidates: Vec<Candidate>,
}

impl RetrievedSet {
    /// Wrap candidates that already satisfy the ordering, dedup and
    /// threshold invariants.
    pub(crate) fn from_ordered(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    /// Mean relevance score, 0.0 when empty.
    pub fn mean_score(&self) -> f32 {
        if self.candidates.is_empty() {
            return 0.0;
        }
        let total: f32 = self.candidates.iter().map(|c| c.relevance_score).sum();
        total / self.candidates.len() as f32
    }

    /// Pair every candidate with its 1-based index within its collection.
    pub fn with_collection_indices(&self) -> Vec<(usize, &Candidate)> {
        let mut counters: BTreeMap<&str, usize> = BTreeMap::new();
        self.candidates
            .iter()
            .map(|candidate| {
                let counter = counters.entry(candidate.collection_id.as_str()).or_insert(0);
                *counter += 1;
                (*counter, candidate)
            })
            .collect()
    }
}

/// Classes of recoverable failure the pipeline absorbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A collection search or record lookup failed or timed out
    BackendUnavailable,
    /// The answer generator failed or returned no content
    GenerationFailure,
    /// A citation block was present but unparseable
    MalformedCitationBlock,
    /// A reference resolved to several equally plausible records
    AmbiguousReferenceMatch,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackendUnavailable => "backend_unavailable",
            Self::GenerationFailure => "generation_failure",
            Self::MalformedCitationBlock => "malformed_citation_block",
            Self::AmbiguousReferenceMatch => "ambiguous_reference_match",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the final answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    Grounded,
    NoContext,
    Degraded,
}

impl AnswerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grounded => "grounded",
            Self::NoContext => "no_context",
            Self::Degraded => "degraded",
        }
    }
}

/// A passage that supported the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub collection_id: String,
    pub source_file: String,
    pub chunk_index: u32,
    pub relevance_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_number: Option<String>,
}

impl From<&Candidate> for SourceRef {
    fn from(candidate: &Candidate) -> Self {
        Self {
            collection_id: candidate.collection_id.clone(),
            source_file: candidate.metadata.source_file.clone(),
            chunk_index: candidate.metadata.chunk_index,
            relevance_score: candidate.relevance_score,
            standard_number: candidate.metadata.standard_number.clone(),
        }
    }
}

/// The response handed back to callers of `Orchestrator::answer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub question: String,
    /// Answer text including the reference appendix
    pub answer: String,
    pub references: crate::records::ResolvedReferences,
    pub sources: Vec<SourceRef>,
    pub confidence_score: f32,
    pub has_definitive_answer: bool,
    pub suggestions: Vec<String>,
    pub mode: AnswerMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<FailureKind>,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(collection: &str, score: f32) -> Candidate {
        Candidate::new("text", collection, score, CandidateMetadata::default())
    }

    #[test]
    fn test_metadata_extension_keys_round_trip_through_flatten() {
        let raw = r#"{"source_file":"GB50010.pdf","chunk_index":3,"chunk_count":9,"standard_number":"GB 50010","page":12}"#;
        let metadata: CandidateMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(metadata.source_file, "GB50010.pdf");
        assert_eq!(metadata.standard_number.as_deref(), Some("GB 50010"));
        assert_eq!(metadata.extra.get("page"), Some(&serde_json::json!(12)));
    }

    #[test]
    fn test_metadata_defaults_when_keys_missing() {
        let metadata: CandidateMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(metadata.chunk_index, 0);
        assert!(metadata.standard_number.is_none());
    }

    #[test]
    fn test_mean_score() {
        assert_eq!(RetrievedSet::empty().mean_score(), 0.0);
        let set = RetrievedSet::from_ordered(vec![candidate("a", 0.8), candidate("b", 0.4)]);
        assert!((set.mean_score() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_collection_relative_indices() {
        let set = RetrievedSet::from_ordered(vec![
            candidate("standards", 0.9),
            candidate("drawings", 0.8),
            candidate("standards", 0.7),
        ]);
        let indices: Vec<usize> = set
            .with_collection_indices()
            .into_iter()
            .map(|(i, _)| i)
            .collect();
        assert_eq!(indices, vec![1, 1, 2]);
    }

    #[test]
    fn test_mode_serialization() {
        let json = serde_json::to_string(&AnswerMode::NoContext).unwrap();
        assert_eq!(json, "\"no_context\"");
        assert_eq!(FailureKind::GenerationFailure.to_string(), "generation_failure");
    }
}
