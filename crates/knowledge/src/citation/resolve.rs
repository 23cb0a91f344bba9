//! Resolution of reference strings to canonical records.

use crate::config::ReferenceCaps;
use crate::records::{CanonicalRecord, RecordKind, RecordLookup, ResolvedReferences};
use crate::types::FailureKind;
use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

static STANDARD_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(GB/T|GB|JGJ/T|JGJ|JG/T|JGT|CJJ|DBJ|DB)\s*-?\s*(\d+(?:\.\d+)?)")
        .expect("standard key regex is valid")
});

/// How a reference string matched a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    Exact,
    Partial,
    Unmatched,
}

/// One reference string and the record it resolved to, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub reference_text: String,
    pub kind: RecordKind,
    pub matched_record: Option<CanonicalRecord>,
    pub match_confidence: MatchConfidence,
}

/// A reference awaiting resolution against one record class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRequest {
    pub kind: RecordKind,
    pub text: String,
}

impl ReferenceRequest {
    pub fn new(kind: RecordKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Strip whitespace, hyphens and title brackets, then lowercase.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '－' | '—' | '–' | '《' | '》'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Compare a reference with a record's name and number.
pub fn match_confidence(reference: &str, record: &CanonicalRecord) -> MatchConfidence {
    let reference = normalize(reference);
    if reference.is_empty() {
        return MatchConfidence::Unmatched;
    }

    let keys: Vec<String> = std::iter::once(normalize(&record.canonical_name))
        .chain(record.identifying_number.as_deref().map(normalize))
        .filter(|k| !k.is_empty())
        .collect();

    if keys.iter().any(|k| *k == reference) {
        MatchConfidence::Exact
    } else if keys
        .iter()
        .any(|k| k.contains(reference.as_str()) || reference.contains(k.as_str()))
    {
        MatchConfidence::Partial
    } else {
        MatchConfidence::Unmatched
    }
}

/// Prefix plus code of a standard number, e.g. `GB 50010` for `GB50010-2010`.
pub fn standard_search_key(reference: &str) -> Option<String> {
    let caps = STANDARD_KEY_RE.captures(reference.trim())?;
    Some(format!("{} {}", &caps[1], &caps[2]))
}

async fn lookup_once(
    lookup: &dyn RecordLookup,
    name: &str,
    kind: RecordKind,
    limit: usize,
    timeout: Duration,
) -> Vec<CanonicalRecord> {
    match tokio::time::timeout(timeout, lookup.find_by_name(name, kind, limit)).await {
        Ok(Ok(records)) => records,
        Ok(Err(e)) => {
            tracing::warn!(
                failure = %FailureKind::BackendUnavailable,
                "Lookup of {} '{}' failed: {}",
                kind,
                name,
                e
            );
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(
                failure = %FailureKind::BackendUnavailable,
                "Lookup of {} '{}' timed out",
                kind,
                name
            );
            Vec::new()
        }
    }
}

/// Resolve one reference; several records may match.
async fn resolve_one(
    lookup: &dyn RecordLookup,
    request: &ReferenceRequest,
    limit: usize,
    timeout: Duration,
) -> Vec<ResolvedReference> {
    let mut matched = matching_records(
        &request.text,
        lookup_once(lookup, &request.text, request.kind, limit, timeout).await,
    );

    // Retry with the bare "PREFIX CODE" form when formatting differs
    if matched.is_empty() && request.kind == RecordKind::Standard {
        if let Some(key) = standard_search_key(&request.text).filter(|k| *k != request.text) {
            matched = matching_records(
                &request.text,
                lookup_once(lookup, &key, request.kind, limit, timeout).await,
            );
        }
    }

    if matched.is_empty() {
        tracing::debug!("No {} record matches '{}'", request.kind, request.text);
        return vec![ResolvedReference {
            reference_text: request.text.clone(),
            kind: request.kind,
            matched_record: None,
            match_confidence: MatchConfidence::Unmatched,
        }];
    }

    let best = matched[0].1;
    let tied = matched.iter().filter(|(_, c)| *c == best).count();
    if tied > 1 {
        tracing::debug!(
            failure = %FailureKind::AmbiguousReferenceMatch,
            "'{}' matches {} {} records equally, keeping all",
            request.text,
            tied,
            request.kind
        );
    }

    matched
        .into_iter()
        .map(|(record, confidence)| ResolvedReference {
            reference_text: request.text.clone(),
            kind: request.kind,
            matched_record: Some(record),
            match_confidence: confidence,
        })
        .collect()
}

/// Keep records that match exactly or partially, exact first.
fn matching_records(
    reference: &str,
    records: Vec<CanonicalRecord>,
) -> Vec<(CanonicalRecord, MatchConfidence)> {
    let mut matched: Vec<(CanonicalRecord, MatchConfidence)> = records
        .into_iter()
        .map(|r| {
            let confidence = match_confidence(reference, &r);
            (r, confidence)
        })
        .filter(|(_, c)| *c != MatchConfidence::Unmatched)
        .collect();
    matched.sort_by_key(|(_, c)| *c);
    matched
}

/// Resolve every request concurrently, then dedup by id and cap per class.
pub async fn resolve_references(
    lookup: &dyn RecordLookup,
    requests: &[ReferenceRequest],
    limit: usize,
    caps: ReferenceCaps,
    timeout: Duration,
) -> (Vec<ResolvedReference>, ResolvedReferences) {
    let resolved: Vec<ResolvedReference> = join_all(
        requests
            .iter()
            .map(|request| resolve_one(lookup, request, limit, timeout)),
    )
    .await
    .into_iter()
    .flatten()
    .collect();

    let references = collect_records(&resolved, caps);
    (resolved, references)
}

/// Group matched records by class, first occurrence per id, within caps.
pub fn collect_records(resolved: &[ResolvedReference], caps: ReferenceCaps) -> ResolvedReferences {
    let mut references = ResolvedReferences::default();
    let mut seen: HashSet<(RecordKind, String)> = HashSet::new();

    for reference in resolved {
        let Some(ref record) = reference.matched_record else {
            continue;
        };

        let (bucket, cap) = match reference.kind {
            RecordKind::Standard => (&mut references.standards, caps.standards),
            RecordKind::Regulation => (&mut references.regulations, caps.regulations),
            RecordKind::Drawing => (&mut references.drawings, caps.drawings),
        };

        if bucket.len() >= cap || !seen.insert((reference.kind, record.id.clone())) {
            continue;
        }
        bucket.push(record.clone());
    }

    references
}
