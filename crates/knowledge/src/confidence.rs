//! Confidence score, definitive-answer flag and follow-up suggestions.

use crate::domain::DomainMatch;
use crate::types::RetrievedSet;
use regex::Regex;
use std::sync::LazyLock;

static REGULATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(GB|JGJ|CJJ|JGT|DBJ)\s*[\s\-]*\d+").expect("regulation regex is valid")
});

static CLAUSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").expect("clause regex is valid"));

static MEASUREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:\.\d+)?\s*(mm|cm|m|MPa|kN|℃|%)").expect("measurement regex is valid")
});

const MAX_GROUNDED_SUGGESTIONS: usize = 4;
const MAX_GENERAL_SUGGESTIONS: usize = 5;

const GENERIC_SUGGESTIONS: &[&str] = &[
    "您可以询问相关的施工验收标准",
    "建议了解质量控制的关键要点",
    "可以查询安全技术规范要求",
];

const CONTENT_SUGGESTIONS: &[(&str, &str)] = &[
    ("保护层", "您可以询问保护层厚度的检测方法和验收标准"),
    ("强度", "建议了解强度试验的具体要求和标准"),
    ("间距", "可以查询间距测量的验收方法"),
];

const GENERAL_SUGGESTIONS: &[&str] = &[
    "建议上传相关规范文档以获得更准确的答案",
    "可以尝试使用更具体的技术术语重新提问",
];

/// Score a grounded answer from retrieval quality and citation density.
///
/// `0.5 × mean score` plus bounded bonuses for standard numbers, clause
/// numbers and measurements, clamped to `[0, 1]`.
pub fn grounded_confidence(retrieved: &RetrievedSet, text: &str) -> f32 {
    let regulations = REGULATION_RE.find_iter(text).count() as f32;
    let clauses = CLAUSE_RE.find_iter(text).count() as f32;
    let measurements = MEASUREMENT_RE.find_iter(text).count() as f32;

    let score = retrieved.mean_score() * 0.5
        + (regulations * 0.15).min(0.3)
        + (clauses * 0.1).min(0.15)
        + (measurements * 0.05).min(0.1);

    score.clamp(0.0, 1.0)
}

/// True when the text commits to an answer without hedging.
pub fn has_definitive_answer(text: &str, definitive: &[String], uncertain: &[String]) -> bool {
    definitive.iter().any(|p| text.contains(p.as_str()))
        && !uncertain.iter().any(|p| text.contains(p.as_str()))
}

/// Follow-ups for a grounded answer.
pub fn grounded_suggestions(domain: DomainMatch<'_>, text: &str) -> Vec<String> {
    let mut suggestions: Vec<String> = match domain.config() {
        Some(config) if !config.suggestions.is_empty() => config.suggestions.clone(),
        _ => GENERIC_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
    };

    suggestions.extend(
        CONTENT_SUGGESTIONS
            .iter()
            .filter(|(term, _)| text.contains(term))
            .map(|(_, suggestion)| suggestion.to_string()),
    );

    let regulations = domain.regulations();
    if !regulations.is_empty() {
        let related: Vec<&str> = regulations.iter().take(2).map(String::as_str).collect();
        suggestions.push(format!("建议查阅相关规范：{}", related.join("、")));
    }

    suggestions.truncate(MAX_GROUNDED_SUGGESTIONS);
    suggestions
}

/// Follow-ups for an answer given without retrieved context.
pub fn general_suggestions(domain: DomainMatch<'_>) -> Vec<String> {
    let mut suggestions: Vec<String> = GENERAL_SUGGESTIONS.iter().map(|s| s.to_string()).collect();

    let mut regulations = domain.regulations().iter();
    if let Some(first) = regulations.next() {
        suggestions.push(format!("建议查阅{}", first));
    }
    if let Some(second) = regulations.next() {
        suggestions.push(format!("可参考{}", second));
    }

    suggestions.truncate(MAX_GENERAL_SUGGESTIONS);
    suggestions
}
