//! Reference appendix rendering.

use crate::records::{CanonicalRecord, ResolvedReferences};

/// First two lines of every appendix.
pub const APPENDIX_MARKER: &str = "---\n📎 **参考依据**";

const STANDARDS_HEADING: &str = "📋 相关国家标准";
const REGULATIONS_HEADING: &str = "⚖️ 相关法律法规";
const DRAWINGS_HEADING: &str = "📐 相关工程图纸";

/// Render the appendix; `None` when there is nothing to list.
pub fn render_appendix(references: &ResolvedReferences) -> Option<String> {
    if references.is_empty() {
        return None;
    }

    let mut out = String::from(APPENDIX_MARKER);
    render_section(&mut out, STANDARDS_HEADING, &references.standards, true);
    render_section(&mut out, REGULATIONS_HEADING, &references.regulations, false);
    render_section(&mut out, DRAWINGS_HEADING, &references.drawings, false);
    Some(out)
}

fn render_section(out: &mut String, heading: &str, records: &[CanonicalRecord], numbered: bool) {
    if records.is_empty() {
        return;
    }

    out.push_str("\n\n");
    out.push_str(heading);
    for record in records {
        out.push('\n');
        match record.identifying_number {
            Some(ref number) if numbered && !number.is_empty() => {
                out.push_str(&format!("• **{}** {}", number, record.canonical_name));
            }
            _ => out.push_str(&format!("• **{}**", record.canonical_name)),
        }
        if let Some(ref status) = record.status {
            out.push_str(&format!("\n  状态: {}", status));
        }
        if let Some(ref url) = record.resource_url {
            out.push_str(&format!("\n  [查看文档]({})", url));
        }
    }
}

/// Text before any previous appendix.
pub fn strip_appendix(text: &str) -> &str {
    match text.find(APPENDIX_MARKER) {
        Some(pos) => &text[..pos],
        None => text,
    }
}

/// Replace any previous appendix with one for `references`.
pub fn rewrite_answer(text: &str, references: &ResolvedReferences) -> String {
    let body = strip_appendix(text).trim_end();
    match render_appendix(references) {
        Some(appendix) => format!("{}\n\n{}", body, appendix),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RecordKind;

    fn references() -> ResolvedReferences {
        ResolvedReferences {
            standards: vec![CanonicalRecord {
                id: "1".to_string(),
                kind: RecordKind::Standard,
                canonical_name: "混凝土结构设计规范".to_string(),
                identifying_number: Some("GB 50010-2010".to_string()),
                status: Some("现行".to_string()),
                resource_url: Some("https://example.org/gb50010.pdf".to_string()),
            }],
            regulations: Vec::new(),
            drawings: vec![CanonicalRecord {
                id: "9".to_string(),
                kind: RecordKind::Drawing,
                canonical_name: "基础平面布置图".to_string(),
                identifying_number: Some("结施-01".to_string()),
                status: None,
                resource_url: None,
            }],
        }
    }

    #[test]
    fn test_render_sections_in_order_and_skip_empty() {
        let appendix = render_appendix(&references()).unwrap();

        assert!(appendix.starts_with(APPENDIX_MARKER));
        assert!(appendix.contains("• **GB 50010-2010** 混凝土结构设计规范\n  状态: 现行\n  [查看文档](https://example.org/gb50010.pdf)"));
        assert!(appendix.contains("• **基础平面布置图**"));
        assert!(!appendix.contains(REGULATIONS_HEADING));
        assert!(appendix.find(STANDARDS_HEADING) < appendix.find(DRAWINGS_HEADING));
    }

    #[test]
    fn test_no_records_no_appendix() {
        assert!(render_appendix(&ResolvedReferences::default()).is_none());
        assert_eq!(
            rewrite_answer("答案正文\n\n", &ResolvedReferences::default()),
            "答案正文"
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let refs = references();
        let once = rewrite_answer("保护层厚度不应小于 20mm。", &refs);
        let twice = rewrite_answer(&once, &refs);

        assert_eq!(once, twice);
        assert_eq!(once.matches(APPENDIX_MARKER).count(), 1);
    }

    #[test]
    fn test_rewrite_replaces_stale_appendix() {
        let stale = format!("正文\n\n{}\n\n📋 相关国家标准\n• **GB 1** 旧", APPENDIX_MARKER);
        let rewritten = rewrite_answer(&stale, &references());
        assert!(!rewritten.contains("GB 1**"));
        assert!(rewritten.starts_with("正文\n\n---"));
    }
}
