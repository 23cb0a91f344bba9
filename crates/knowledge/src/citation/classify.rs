//! Regulation reclassification of "other document" references.

/// True when the reference names a legal or administrative instrument.
///
/// Requires at least one marker term and none of the exclusion phrases,
/// so a technical standard whose title mentions "规定" stays a document.
pub fn is_regulation(reference: &str, markers: &[String], exclusions: &[String]) -> bool {
    markers.iter().any(|m| reference.contains(m.as_str()))
        && !exclusions.iter().any(|e| reference.contains(e.as_str()))
}

/// Split other-document references into (regulations, remaining documents).
pub fn split_documents(
    documents: &[String],
    markers: &[String],
    exclusions: &[String],
) -> (Vec<String>, Vec<String>) {
    documents
        .iter()
        .cloned()
        .partition(|doc| is_regulation(doc, markers, exclusions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QaConfig;

    #[test]
    fn test_legal_marker_reclassifies() {
        let config = QaConfig::default();
        assert!(is_regulation(
            "建设工程质量管理条例",
            &config.regulation_markers,
            &config.regulation_exclusions
        ));
        assert!(is_regulation(
            "建筑工程施工许可管理办法",
            &config.regulation_markers,
            &config.regulation_exclusions
        ));
    }

    #[test]
    fn test_exclusion_phrase_wins() {
        let config = QaConfig::default();
        assert!(!is_regulation(
            "建筑施工扣件式钢管脚手架安全技术规范",
            &config.regulation_markers,
            &config.regulation_exclusions
        ));
        assert!(!is_regulation(
            "满足设计规范规定的要求",
            &config.regulation_markers,
            &config.regulation_exclusions
        ));
    }

    #[test]
    fn test_no_marker_stays_document() {
        let config = QaConfig::default();
        let docs = vec!["施工组织设计".to_string(), "安全生产许可证条例".to_string()];
        let (regulations, others) =
            split_documents(&docs, &config.regulation_markers, &config.regulation_exclusions);

        assert_eq!(regulations, vec!["安全生产许可证条例".to_string()]);
        assert_eq!(others, vec!["施工组织设计".to_string()]);
    }
}
