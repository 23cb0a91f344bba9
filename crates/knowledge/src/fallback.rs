//! Decides when a grounded answer should be replaced by a no-context one.

use crate::citation::ExtractedCitations;
use crate::config::NoGroundingPattern;

/// Index of the first pattern the text matches.
pub fn matched_pattern(text: &str, patterns: &[NoGroundingPattern]) -> Option<usize> {
    patterns.iter().position(|p| p.matches(text))
}

/// Fall back only when the answer admits missing grounding and no
/// reference resolved.
///
/// A citation block that declares no standard counts as an admission,
/// however the empty field is spelled.
pub fn should_fall_back(
    text: &str,
    citations: &ExtractedCitations,
    resolved_total: usize,
    patterns: &[NoGroundingPattern],
) -> bool {
    if resolved_total > 0 {
        return false;
    }

    if citations.standards_declared_none {
        tracing::info!("Citation block declares no standard and nothing resolved");
        return true;
    }

    match matched_pattern(text, patterns) {
        Some(index) => {
            tracing::info!(
                "Answer matched no-grounding pattern {:?} with no resolved references",
                patterns[index].all_of
            );
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::extract_citations;
    use crate::config::QaConfig;

    fn falls_back(text: &str, resolved_total: usize, patterns: &[NoGroundingPattern]) -> bool {
        should_fall_back(text, &extract_citations(text), resolved_total, patterns)
    }

    #[test]
    fn test_phrase_without_references_falls_back() {
        let patterns = QaConfig::default().no_grounding_patterns;
        assert!(falls_back("根据提供的文档，未检索到相关条文。", 0, &patterns));
    }

    #[test]
    fn test_resolved_references_block_fallback() {
        let patterns = QaConfig::default().no_grounding_patterns;
        assert!(!falls_back("未找到完全匹配的条文，但 GB 50010 规定……", 1, &patterns));
    }

    #[test]
    fn test_no_phrase_no_fallback() {
        let patterns = QaConfig::default().no_grounding_patterns;
        assert!(!falls_back("保护层厚度不应小于 20mm。", 0, &patterns));
    }

    #[test]
    fn test_pair_requires_both_parts() {
        let patterns = vec![NoGroundingPattern::pair("文档中主要涉及", "但未包含")];
        assert!(!falls_back("文档中主要涉及脚手架搭设", 0, &patterns));
        assert!(falls_back("文档中主要涉及脚手架搭设，但未包含拆除要求", 0, &patterns));
    }

    #[test]
    fn test_declared_no_standard_falls_back_in_any_spelling() {
        let patterns = QaConfig::default().no_grounding_patterns;
        for field in ["[使用标准: 无]", "[使用标准：无]", "[使用标准:无]", "[使用标准: none]"] {
            let text = format!(
                "保温层厚度宜按节能计算确定。\n\n{}\n[使用法规: 无]\n[使用图纸: 无]\n[参考文档: 无]",
                field
            );
            assert!(falls_back(&text, 0, &patterns), "{}", field);
            assert!(!falls_back(&text, 1, &patterns), "{}", field);
        }
    }

    #[test]
    fn test_cited_standard_without_phrase_is_kept() {
        let patterns = QaConfig::default().no_grounding_patterns;
        let text = "保护层厚度不应小于 20mm。\n\n[使用标准: GB 50010]\n[使用法规: 无]";
        assert!(!falls_back(text, 0, &patterns));
    }

    #[test]
    fn test_empty_pattern_table_never_falls_back() {
        assert!(!falls_back("未找到", 0, &[]));
    }
}
