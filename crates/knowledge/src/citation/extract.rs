//! Citation block extraction.
//!
//! The generator ends its answer with four bracketed fields:
//!
//! ```text
//! [使用标准: GB 50010-2010, JGJ 130]
//! [使用法规: 无]
//! [使用图纸: 结施-01]
//! [参考文档: 建设工程质量管理条例]
//! ```
//!
//! The block starts at the first of the four field labels, whatever order
//! the fields come in. Answers without a block, or with a field whose
//! closing bracket is missing, fall back to scanning the whole text for
//! bare standard numbers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

const STANDARDS_LABEL: &str = "使用标准";
const REGULATIONS_LABEL: &str = "使用法规";
const DRAWINGS_LABEL: &str = "使用图纸";
const DOCUMENTS_LABEL: &str = "参考文档";

const FIELD_LABELS: [&str; 4] = [STANDARDS_LABEL, REGULATIONS_LABEL, DRAWINGS_LABEL, DOCUMENTS_LABEL];

const LIST_SEPARATORS: &[char] = &[',', '，', '、', ';', '；'];

static BARE_STANDARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(GB/T|GB|JGJ/T|JGJ|JG/T|JGT|CJJ|DBJ|DB)\s*-?\s*\d+(?:\.\d+)?(?:\s*-\s*\d+)?(?:\s*-\s*\d{4})?",
    )
    .expect("bare standard regex is valid")
});

/// The four typed reference lists named by an answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationBlock {
    pub standards: Vec<String>,
    pub regulations: Vec<String>,
    pub drawings: Vec<String>,
    pub documents: Vec<String>,
}

impl CitationBlock {
    pub fn is_empty(&self) -> bool {
        self.standards.is_empty()
            && self.regulations.is_empty()
            && self.drawings.is_empty()
            && self.documents.is_empty()
    }
}

/// How the references were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Parsed from a well-formed citation block
    Structured,
    /// No block present; bare standard numbers scanned from the text
    MissingBlock,
    /// Block present but unparseable; bare standard numbers scanned
    MalformedBlock,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::MissingBlock => "missing",
            Self::MalformedBlock => "malformed",
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Structured)
    }
}

/// Result of extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedCitations {
    pub block: CitationBlock,
    pub mode: ExtractionMode,
    /// A well-formed block whose standards field is present and empty
    pub standards_declared_none: bool,
}

/// Extract the citation block from answer text.
pub fn extract_citations(text: &str) -> ExtractedCitations {
    let Some(start) = block_start(text) else {
        return ExtractedCitations {
            block: scan_bare_standards(text),
            mode: ExtractionMode::MissingBlock,
            standards_declared_none: false,
        };
    };

    let block_text = &text[start..];
    match parse_block(block_text) {
        Some(block) => ExtractedCitations {
            standards_declared_none: block.standards.is_empty()
                && block_text.contains(&format!("[{}", STANDARDS_LABEL)),
            block,
            mode: ExtractionMode::Structured,
        },
        None => ExtractedCitations {
            block: scan_bare_standards(text),
            mode: ExtractionMode::MalformedBlock,
            standards_declared_none: false,
        },
    }
}

/// Byte offset of the earliest field label.
fn block_start(text: &str) -> Option<usize> {
    FIELD_LABELS
        .iter()
        .filter_map(|label| text.find(&format!("[{}", label)))
        .min()
}

/// Parse all four fields; `None` when any present field is malformed.
fn parse_block(block: &str) -> Option<CitationBlock> {
    Some(CitationBlock {
        standards: parse_field(block, STANDARDS_LABEL)?,
        regulations: parse_field(block, REGULATIONS_LABEL)?,
        drawings: parse_field(block, DRAWINGS_LABEL)?,
        documents: parse_field(block, DOCUMENTS_LABEL)?,
    })
}

/// A missing field reads as empty; a field without separator or closing
/// bracket on its line is malformed.
fn parse_field(block: &str, label: &str) -> Option<Vec<String>> {
    let opening = format!("[{}", label);
    let Some(pos) = block.find(&opening) else {
        return Some(Vec::new());
    };

    let rest = block[pos + opening.len()..].trim_start_matches([' ', '\t']);
    let rest = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix('：'))?;

    let line = rest.split('\n').next().unwrap_or_default();
    let close = line.find(']')?;

    Some(parse_list(&line[..close]))
}

fn is_sentinel(value: &str) -> bool {
    value.is_empty() || value == "无" || value.eq_ignore_ascii_case("none")
}

/// Split a field value into trimmed, non-empty, non-sentinel entries.
pub fn parse_list(value: &str) -> Vec<String> {
    let value = value.trim();
    if is_sentinel(value) {
        return Vec::new();
    }

    value
        .split(LIST_SEPARATORS)
        .map(str::trim)
        .filter(|token| !is_sentinel(token))
        .map(str::to_string)
        .collect()
}

/// Degraded extraction: every distinct bare standard number in the text.
pub fn scan_bare_standards(text: &str) -> CitationBlock {
    let mut seen = HashSet::new();
    let standards = BARE_STANDARD_RE
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| seen.insert(s.clone()))
        .collect();

    CitationBlock {
        standards,
        ..CitationBlock::default()
    }
}
