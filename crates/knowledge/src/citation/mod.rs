//! Citation reconciliation.
//!
//! Reads the citation block an answer carries, resolves every named
//! reference against the record store and rewrites the answer with an
//! appendix listing the records that were found.

pub mod appendix;
pub mod classify;
pub mod extract;
pub mod resolve;

pub use appendix::{render_appendix, rewrite_answer, strip_appendix, APPENDIX_MARKER};
pub use classify::{is_regulation, split_documents};
pub use extract::{extract_citations, CitationBlock, ExtractedCitations, ExtractionMode};
pub use resolve::{
    match_confidence, normalize, resolve_references, MatchConfidence, ReferenceRequest,
    ResolvedReference,
};

use crate::config::QaConfig;
use crate::records::{RecordKind, RecordLookup, ResolvedReferences};
use crate::types::FailureKind;
use std::collections::HashSet;

/// Outcome of reconciling one answer.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub citations: ExtractedCitations,
    pub resolved: Vec<ResolvedReference>,
    pub references: ResolvedReferences,
    /// Answer text with a fresh appendix
    pub rewritten: String,
}

/// Turn a citation block into lookup requests.
///
/// Other documents that read as legal instruments join the regulations;
/// the remainder are looked up as drawings. Duplicates per class are
/// dropped.
pub fn build_requests(block: &CitationBlock, config: &QaConfig) -> Vec<ReferenceRequest> {
    let (reclassified, documents) = split_documents(
        &block.documents,
        &config.regulation_markers,
        &config.regulation_exclusions,
    );

    let grouped: [(RecordKind, Vec<&String>); 3] = [
        (RecordKind::Standard, block.standards.iter().collect()),
        (
            RecordKind::Regulation,
            block.regulations.iter().chain(&reclassified).collect(),
        ),
        (
            RecordKind::Drawing,
            block.drawings.iter().chain(&documents).collect(),
        ),
    ];

    let mut seen = HashSet::new();
    grouped
        .into_iter()
        .flat_map(|(kind, refs)| refs.into_iter().map(move |r| (kind, r)))
        .filter(|(kind, r)| seen.insert((*kind, r.as_str())))
        .map(|(kind, r)| ReferenceRequest::new(kind, r.as_str()))
        .collect()
}

/// Extract, resolve and rewrite.
pub async fn reconcile(
    lookup: &dyn RecordLookup,
    answer_text: &str,
    config: &QaConfig,
) -> Reconciliation {
    let body = strip_appendix(answer_text);
    let citations = extract_citations(body);

    if citations.mode.is_degraded() {
        tracing::warn!(
            failure = %FailureKind::MalformedCitationBlock,
            "Citation block {}, scanned {} bare standard numbers",
            citations.mode.as_str(),
            citations.block.standards.len()
        );
    }

    let requests = build_requests(&citations.block, config);
    let (resolved, references) = resolve_references(
        lookup,
        &requests,
        config.lookup_limit,
        config.caps,
        config.search_timeout(),
    )
    .await;

    tracing::info!(
        "Resolved {} of {} references ({} standards, {} regulations, {} drawings)",
        resolved.iter().filter(|r| r.matched_record.is_some()).count(),
        requests.len(),
        references.standards.len(),
        references.regulations.len(),
        references.drawings.len()
    );

    let rewritten = rewrite_answer(answer_text, &references);

    Reconciliation {
        citations,
        resolved,
        references,
        rewritten,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SqliteRecordStore;

    fn store() -> SqliteRecordStore {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        store
            .insert(RecordKind::Standard, "混凝土结构设计规范", Some("GB 50010-2010"), Some("现行"), None)
            .unwrap();
        store
            .insert(RecordKind::Regulation, "建设工程质量管理条例", None, Some("现行"), None)
            .unwrap();
        store
            .insert(RecordKind::Drawing, "基础平面布置图", Some("结施-01"), None, None)
            .unwrap();
        store
    }

    #[test]
    fn test_build_requests_reclassifies_and_dedups() {
        let block = CitationBlock {
            standards: vec!["GB 50010".to_string(), "GB 50010".to_string()],
            regulations: vec!["建设工程质量管理条例".to_string()],
            drawings: vec!["结施-01".to_string()],
            documents: vec![
                "建设工程质量管理条例".to_string(),
                "施工组织设计".to_string(),
            ],
        };

        let requests = build_requests(&block, &QaConfig::default());
        assert_eq!(
            requests,
            vec![
                ReferenceRequest::new(RecordKind::Standard, "GB 50010"),
                ReferenceRequest::new(RecordKind::Regulation, "建设工程质量管理条例"),
                ReferenceRequest::new(RecordKind::Drawing, "结施-01"),
                ReferenceRequest::new(RecordKind::Drawing, "施工组织设计"),
            ]
        );
    }

    #[tokio::test]
    async fn test_reconcile_structured_block() {
        let store = store();
        let answer = "保护层厚度应符合规定。\n\n[使用标准: GB 50010-2010]\n[使用法规: 无]\n[使用图纸: 结施-01]\n[参考文档: 建设工程质量管理条例]";

        let outcome = reconcile(&store, answer, &QaConfig::default()).await;

        assert_eq!(outcome.citations.mode, ExtractionMode::Structured);
        assert_eq!(outcome.references.total(), 3);
        assert_eq!(outcome.references.regulations[0].canonical_name, "建设工程质量管理条例");
        assert!(outcome.rewritten.starts_with(answer));
        assert!(outcome.rewritten.contains(APPENDIX_MARKER));
    }

    #[tokio::test]
    async fn test_reconcile_missing_block_scans_text() {
        let store = store();
        let answer = "按 GB 50010-2010 第 8.2.1 条执行。";

        let outcome = reconcile(&store, answer, &QaConfig::default()).await;

        assert_eq!(outcome.citations.mode, ExtractionMode::MissingBlock);
        assert_eq!(outcome.references.standards.len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_nothing_resolved_leaves_text() {
        let store = store();
        let answer = "[使用标准: 无]\n[使用法规: 无]\n[使用图纸: 无]\n[参考文档: 无]";

        let outcome = reconcile(&store, answer, &QaConfig::default()).await;

        assert!(outcome.references.is_empty());
        assert_eq!(outcome.rewritten, answer);
    }
}
