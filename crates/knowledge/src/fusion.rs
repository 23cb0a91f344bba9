//! Query fan-out and candidate fusion.
//!
//! Every (query variant, collection) pair is searched concurrently. Results
//! are merged into a single [`RetrievedSet`] that is ordered by score,
//! free of duplicate passages and above the similarity threshold.

use crate::config::QaConfig;
use crate::domain::{enhance_question, identify_domain};
use crate::search::SearchClient;
use crate::types::{Candidate, FailureKind, RetrievedSet};
use futures::future::join_all;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Duration;

/// Characters of content that make up the dedup fingerprint.
pub const FINGERPRINT_PREFIX_CHARS: usize = 100;

/// Parameters of one fan-out.
#[derive(Debug, Clone)]
pub struct FusionParams {
    pub collections: Vec<String>,
    pub per_query_limit: usize,
    pub similarity_threshold: f32,
    pub max_candidates: usize,
    pub timeout: Duration,
}

impl From<&QaConfig> for FusionParams {
    fn from(config: &QaConfig) -> Self {
        Self {
            collections: config.collections.clone(),
            per_query_limit: config.per_query_limit,
            similarity_threshold: config.similarity_threshold,
            max_candidates: config.max_candidates(),
            timeout: config.search_timeout(),
        }
    }
}

/// Build the query variants for a question.
///
/// The domain-enhanced question comes first, followed by the queries of the
/// first expansion whose trigger matches the raw question. Duplicates are
/// dropped, keeping the first occurrence.
pub fn query_variants(question: &str, config: &QaConfig) -> Vec<String> {
    let domain = identify_domain(question, &config.domains);
    let mut variants = vec![enhance_question(question, domain)];

    let lower = question.to_lowercase();
    if let Some(expansion) = config.query_expansions.iter().find(|e| e.matches(&lower)) {
        variants.extend(expansion.queries.iter().cloned());
    }

    let mut seen = HashSet::new();
    variants.retain(|v| seen.insert(v.clone()));
    variants
}

/// Stable fingerprint of a passage's leading characters.
pub fn fingerprint(content: &str) -> String {
    let prefix: String = content.chars().take(FINGERPRINT_PREFIX_CHARS).collect();
    let digest = Sha256::digest(prefix.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Merge candidate batches (in discovery order) into a retrieved set.
///
/// Stable sort by descending score, keep the first occurrence of each
/// fingerprint, drop anything below `threshold`, then truncate.
pub fn merge_candidates(
    batches: Vec<Vec<Candidate>>,
    threshold: f32,
    max_candidates: usize,
) -> RetrievedSet {
    let mut merged: Vec<Candidate> = batches.into_iter().flatten().collect();
    merged.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
    });

    let mut seen = HashSet::new();
    let fused: Vec<Candidate> = merged
        .into_iter()
        .filter(|c| seen.insert(fingerprint(&c.content)))
        .filter(|c| c.relevance_score >= threshold)
        .take(max_candidates)
        .collect();

    RetrievedSet::from_ordered(fused)
}

/// Fan `variants` out across every collection and fuse the results.
///
/// A failed or timed-out call contributes no candidates; it never aborts
/// the other calls.
pub async fn fuse(
    client: &dyn SearchClient,
    question: &str,
    variants: &[String],
    params: &FusionParams,
) -> RetrievedSet {
    let calls = variants.iter().flat_map(move |variant| {
        params.collections.iter().map(move |collection| {
            search_one(client, variant, collection, params.per_query_limit, params.timeout)
        })
    });

    let batches = join_all(calls).await;
    let raw_count: usize = batches.iter().map(Vec::len).sum();

    let fused = merge_candidates(batches, params.similarity_threshold, params.max_candidates);

    if fused.is_empty() {
        tracing::info!(
            "No candidates at or above threshold {:.2} for question: {}",
            params.similarity_threshold,
            question
        );
    } else {
        tracing::info!(
            "Fused {} candidates from {} raw results ({} variants x {} collections)",
            fused.len(),
            raw_count,
            variants.len(),
            params.collections.len()
        );
        tracing::debug!(
            "Fused scores: {:?}",
            fused.iter().map(|c| c.relevance_score).collect::<Vec<_>>()
        );
    }

    fused
}

async fn search_one(
    client: &dyn SearchClient,
    query: &str,
    collection_id: &str,
    limit: usize,
    timeout: Duration,
) -> Vec<Candidate> {
    match tokio::time::timeout(timeout, client.search(query, collection_id, limit)).await {
        Ok(Ok(candidates)) => candidates,
        Ok(Err(e)) => {
            tracing::warn!(
                failure = %FailureKind::BackendUnavailable,
                "Search of '{}' failed: {}",
                collection_id,
                e
            );
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(
                failure = %FailureKind::BackendUnavailable,
                "Search of '{}' timed out after {:?}",
                collection_id,
                timeout
            );
            Vec::new()
        }
    }
}
