//! Property tests for fusion, reference caps and appendix rewriting.

use crate::citation::appendix::{rewrite_answer, APPENDIX_MARKER};
use crate::citation::resolve::{collect_records, MatchConfidence, ResolvedReference};
use crate::config::ReferenceCaps;
use crate::fusion::{fingerprint, merge_candidates};
use crate::records::{CanonicalRecord, RecordKind, ResolvedReferences};
use crate::types::{Candidate, CandidateMetadata};
use proptest::prelude::*;
use std::collections::HashSet;

/// Batches drawn from a small pool of passages so duplicates are common.
/// `chunk_index` records the global discovery position.
fn arb_batches() -> impl Strategy<Value = Vec<Vec<Candidate>>> {
    proptest::collection::vec(
        proptest::collection::vec((0usize..6, 0u8..=10), 0..8),
        1..5,
    )
    .prop_map(|batches| {
        let mut position = 0u32;
        batches
            .into_iter()
            .map(|batch| {
                batch
                    .into_iter()
                    .map(|(passage, tenths)| {
                        let metadata = CandidateMetadata {
                            chunk_index: position,
                            ..CandidateMetadata::default()
                        };
                        position += 1;
                        Candidate::new(
                            format!("第{}段落内容", passage),
                            "c",
                            tenths as f32 / 10.0,
                            metadata,
                        )
                    })
                    .collect()
            })
            .collect()
    })
}

fn arb_kind() -> impl Strategy<Value = RecordKind> {
    prop_oneof![
        Just(RecordKind::Standard),
        Just(RecordKind::Regulation),
        Just(RecordKind::Drawing),
    ]
}

fn arb_resolved() -> impl Strategy<Value = Vec<ResolvedReference>> {
    proptest::collection::vec((arb_kind(), 0u8..8, any::<bool>()), 0..30).prop_map(|refs| {
        refs.into_iter()
            .map(|(kind, id, matched)| ResolvedReference {
                reference_text: format!("ref-{}", id),
                kind,
                matched_record: matched.then(|| CanonicalRecord {
                    id: id.to_string(),
                    kind,
                    canonical_name: format!("记录{}", id),
                    identifying_number: None,
                    status: None,
                    resource_url: None,
                }),
                match_confidence: if matched {
                    MatchConfidence::Partial
                } else {
                    MatchConfidence::Unmatched
                },
            })
            .collect()
    })
}

fn arb_references() -> impl Strategy<Value = ResolvedReferences> {
    arb_resolved().prop_map(|resolved| collect_records(&resolved, ReferenceCaps::default()))
}

mod prop_fusion {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn fused_set_is_unique_thresholded_sorted_and_stable(
            batches in arb_batches(),
            threshold_tenths in 0u8..=10,
            max_candidates in 1usize..20,
        ) {
            let threshold = threshold_tenths as f32 / 10.0;
            let set = merge_candidates(batches, threshold, max_candidates);

            prop_assert!(set.len() <= max_candidates);

            let mut seen = HashSet::new();
            for candidate in set.iter() {
                prop_assert!(seen.insert(fingerprint(&candidate.content)));
                prop_assert!(candidate.relevance_score >= threshold);
            }

            for pair in set.candidates().windows(2) {
                prop_assert!(pair[0].relevance_score >= pair[1].relevance_score);
                if pair[0].relevance_score == pair[1].relevance_score {
                    prop_assert!(pair[0].metadata.chunk_index < pair[1].metadata.chunk_index);
                }
            }
        }
    }
}

mod prop_references {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn caps_hold_and_ids_are_unique_per_class(resolved in arb_resolved()) {
            let caps = ReferenceCaps::default();
            let references = collect_records(&resolved, caps);

            prop_assert!(references.standards.len() <= caps.standards);
            prop_assert!(references.regulations.len() <= caps.regulations);
            prop_assert!(references.drawings.len() <= caps.drawings);

            for records in [&references.standards, &references.regulations, &references.drawings] {
                let ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
                prop_assert_eq!(ids.len(), records.len());
            }
        }

        #[test]
        fn rewrite_is_idempotent(
            body in "[\\PC\\n]{0,120}",
            references in arb_references(),
        ) {
            let once = rewrite_answer(&body, &references);
            let twice = rewrite_answer(&once, &references);

            prop_assert_eq!(&once, &twice);
            prop_assert!(once.matches(APPENDIX_MARKER).count() <= 1);
        }
    }
}
