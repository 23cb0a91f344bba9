//! Retrieval and reconciliation configuration.
//!
//! Loaded from `.citewise/qa.yaml`. Every field has a default, so a missing
//! file or a partial file is valid. Lookup tables given in YAML replace the
//! built-in tables wholesale.

use citewise_core::config::STATE_DIR;
use citewise_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-type ceilings on resolved records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceCaps {
    pub standards: usize,
    pub regulations: usize,
    pub drawings: usize,
}

impl Default for ReferenceCaps {
    fn default() -> Self {
        Self {
            standards: 3,
            regulations: 2,
            drawings: 3,
        }
    }
}

/// A trigger predicate plus the literal queries it adds.
///
/// The predicate holds when every `allOf` term occurs in the question and,
/// if `anyOf` is non-empty, at least one `anyOf` term occurs too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExpansion {
    #[serde(default)]
    pub all_of: Vec<String>,
    #[serde(default)]
    pub any_of: Vec<String>,
    pub queries: Vec<String>,
}

impl QueryExpansion {
    pub fn matches(&self, question: &str) -> bool {
        if self.all_of.is_empty() && self.any_of.is_empty() {
            return false;
        }
        self.all_of.iter().all(|term| question.contains(term.as_str()))
            && (self.any_of.is_empty()
                || self.any_of.iter().any(|term| question.contains(term.as_str())))
    }
}

/// A no-grounding pattern: matches when every phrase occurs in the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoGroundingPattern {
    pub all_of: Vec<String>,
}

impl NoGroundingPattern {
    pub fn phrase(phrase: &str) -> Self {
        Self {
            all_of: vec![phrase.to_string()],
        }
    }

    pub fn pair(first: &str, second: &str) -> Self {
        Self {
            all_of: vec![first.to_string(), second.to_string()],
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        !self.all_of.is_empty() && self.all_of.iter().all(|p| text.contains(p.as_str()))
    }
}

/// An engineering domain with its trigger keywords and related standards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineeringDomain {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub regulations: Vec<String>,
    /// Appended to the question to steer retrieval
    #[serde(default)]
    pub hint: Option<String>,
    /// Follow-up questions offered after a grounded answer
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Configuration of the question-answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QaConfig {
    /// Collections searched on every question, in order
    pub collections: Vec<String>,

    /// Results requested per (query variant, collection) call
    pub per_query_limit: usize,

    /// Size cap of the fused set; defaults to twice `per_query_limit`
    pub max_candidates: Option<usize>,

    /// Minimum relevance score a candidate must reach
    pub similarity_threshold: f32,

    /// Divisor in `max(0, 1 - distance / scale)` for distance-scored backends
    pub distance_scale: f32,

    pub search_timeout_secs: u64,
    pub generation_timeout_secs: u64,

    /// Records requested per reference lookup
    pub lookup_limit: usize,

    pub caps: ReferenceCaps,

    /// History messages sent to the generator
    pub history_window: usize,

    /// History messages retained per session
    pub history_retention: usize,

    /// Confidence reported for no-context answers
    pub no_context_confidence: f32,

    pub temperature: f32,
    /// Sampling temperature when answering from background knowledge
    pub no_context_temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,

    pub query_expansions: Vec<QueryExpansion>,
    pub no_grounding_patterns: Vec<NoGroundingPattern>,
    pub regulation_markers: Vec<String>,
    pub regulation_exclusions: Vec<String>,
    pub domains: Vec<EngineeringDomain>,
    pub definitive_phrases: Vec<String>,
    pub uncertain_phrases: Vec<String>,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            collections: strings(&["technical-standards", "legal-regulations", "project-drawings"]),
            per_query_limit: 15,
            max_candidates: None,
            similarity_threshold: 0.24,
            distance_scale: 2.0,
            search_timeout_secs: 10,
            generation_timeout_secs: 60,
            lookup_limit: 3,
            caps: ReferenceCaps::default(),
            history_window: 6,
            history_retention: 10,
            no_context_confidence: 0.7,
            temperature: 0.1,
            no_context_temperature: 0.3,
            top_p: 0.9,
            max_tokens: 2000,
            query_expansions: default_query_expansions(),
            no_grounding_patterns: default_no_grounding_patterns(),
            regulation_markers: strings(&[
                "办法",
                "条例",
                "暂行规定",
                "规定",
                "管理办法",
                "实施细则",
            ]),
            regulation_exclusions: strings(&[
                "技术规范",
                "技术规程",
                "设计规范",
                "施工规范",
                "验收规范",
                "验收标准",
                "技术标准",
                "统一标准",
                "规定值",
                "规定的",
                "按规定",
            ]),
            domains: default_domains(),
            definitive_phrases: strings(&[
                "应符合",
                "不应小于",
                "不应大于",
                "必须",
                "规定为",
                "标准要求",
                "规范规定",
                "明确规定",
            ]),
            uncertain_phrases: strings(&[
                "无法确定",
                "不确定",
                "可能",
                "大概",
                "似乎",
                "建议咨询",
                "需要进一步",
                "信息不足",
                "无法找到",
                "不清楚",
                "没有相关",
                "未找到",
            ]),
        }
    }
}

impl QaConfig {
    /// Effective cap on the fused candidate set.
    pub fn max_candidates(&self) -> usize {
        self.max_candidates
            .unwrap_or(self.per_query_limit.saturating_mul(2))
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Reject values the pipeline cannot honour.
    pub fn validate(&self) -> AppResult<()> {
        if self.collections.is_empty() {
            return Err(AppError::Config(
                "qa.yaml: at least one collection is required".to_string(),
            ));
        }
        if self.per_query_limit == 0 {
            return Err(AppError::Config(
                "qa.yaml: perQueryLimit must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(AppError::Config(format!(
                "qa.yaml: similarityThreshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.distance_scale <= 0.0 {
            return Err(AppError::Config(
                "qa.yaml: distanceScale must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.no_context_confidence) {
            return Err(AppError::Config(format!(
                "qa.yaml: noContextConfidence must be within [0, 1], got {}",
                self.no_context_confidence
            )));
        }
        if self.search_timeout_secs == 0 || self.generation_timeout_secs == 0 {
            return Err(AppError::Config(
                "qa.yaml: timeouts must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn default_query_expansions() -> Vec<QueryExpansion> {
    vec![
        QueryExpansion {
            all_of: strings(&["应急厕所", "距离"]),
            any_of: Vec::new(),
            queries: strings(&[
                "应急厕所设置要求",
                "6.1.6 应急厕所",
                "应急避难场所厕所设置",
                "GB 21734 应急厕所",
                "篷宿区厕所距离",
            ]),
        },
        QueryExpansion {
            all_of: strings(&["厕所"]),
            any_of: strings(&["间距", "距离"]),
            queries: strings(&["应急厕所设置要求", "厕所布局要求"]),
        },
    ]
}

fn default_no_grounding_patterns() -> Vec<NoGroundingPattern> {
    let mut patterns: Vec<NoGroundingPattern> = [
        "未检索到",
        "未找到",
        "没有找到",
        "无法找到",
        "不能找到",
        "建议补充提供",
        "建议查阅",
        "需要查阅",
        "根据提供的规范文档内容，未",
    ]
    .iter()
    .map(|p| NoGroundingPattern::phrase(p))
    .collect();

    patterns.extend([
        NoGroundingPattern::pair("文档中主要涉及", "但未包含"),
        NoGroundingPattern::pair("文档中主要涉及", "但未明确提及"),
        NoGroundingPattern::pair("文档中主要涉及", "未包含"),
        NoGroundingPattern::pair("根据提供的", "未检索到"),
    ]);
    patterns
}

fn default_domains() -> Vec<EngineeringDomain> {
    let domain = |name: &str,
                  keywords: &[&str],
                  regulations: &[&str],
                  hint: &str,
                  suggestions: &[&str]| EngineeringDomain {
        name: name.to_string(),
        keywords: strings(keywords),
        regulations: strings(regulations),
        hint: Some(hint.to_string()),
        suggestions: strings(suggestions),
    };

    vec![
        domain(
            "混凝土",
            &["强度等级", "配合比", "保护层", "钢筋", "浇筑", "养护", "抗压强度"],
            &["GB 50010", "GB 50204", "JGJ 55"],
            "请结合混凝土结构设计规范和施工验收规范",
            &[
                "您可以进一步询问不同强度等级混凝土的具体要求",
                "建议了解混凝土施工质量验收标准",
                "可以查询混凝土养护的具体规定",
            ],
        ),
        domain(
            "钢结构",
            &["焊接", "螺栓连接", "防腐涂装", "变形", "承载力", "稳定性"],
            &["GB 50017", "GB 50205", "JGJ 81"],
            "请结合钢结构设计标准和施工质量验收规范",
            &[
                "建议了解钢结构焊接质量验收标准",
                "可以询问钢结构防腐涂装要求",
                "您可以查询钢结构连接的技术规定",
            ],
        ),
        domain(
            "脚手架",
            &["立杆", "横杆", "连墙件", "剪刀撑", "安全网", "荷载"],
            &["GB 51210", "JGJ 130", "JGJ 162"],
            "请参考建筑施工脚手架安全技术统一标准",
            &[
                "建议了解脚手架搭设的安全技术规范",
                "可以询问脚手架验收的具体标准",
                "您可以查询不同高度脚手架的要求差异",
            ],
        ),
        domain(
            "地基基础",
            &["承载力", "沉降", "桩基", "地基处理", "基坑支护"],
            &["GB 50007", "GB 50202", "JGJ 94"],
            "请参考建筑地基基础设计规范和施工验收规范",
            &[
                "建议了解地基承载力的检测方法",
                "可以询问桩基施工质量控制要点",
                "您可以查询基坑支护的安全要求",
            ],
        ),
        domain(
            "防水工程",
            &["防水材料", "防水层", "渗漏", "防水卷材", "防水涂料"],
            &["GB 50208", "GB 50207", "JGJ 298"],
            "请结合建筑防水工程技术规范",
            &[],
        ),
        domain(
            "保温工程",
            &["保温材料", "导热系数", "保温层", "热桥", "节能"],
            &["GB 50176", "JGJ 144", "JGJ 26"],
            "请参考建筑节能与保温工程相关标准",
            &[],
        ),
    ]
}

/// Path of the pipeline configuration file.
pub fn get_qa_config_path(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("qa.yaml")
}

/// Directory holding one sub-directory per passage collection.
pub fn get_collections_dir(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("collections")
}

/// JSONL file backing one passage collection.
pub fn get_collection_path(workspace: &Path, collection_id: &str) -> PathBuf {
    get_collections_dir(workspace)
        .join(collection_id)
        .join("passages.jsonl")
}

/// SQLite database of canonical standards, regulations and drawings.
pub fn get_records_path(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("records.sqlite")
}

/// Load the pipeline configuration, falling back to defaults when absent.
pub fn load_qa_config(workspace: &Path) -> AppResult<QaConfig> {
    let config_path = get_qa_config_path(workspace);

    if !config_path.exists() {
        tracing::debug!("No qa.yaml at {:?}, using defaults", config_path);
        return Ok(QaConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Config(format!("Failed to read {:?}: {}", config_path, e))
    })?;

    let config: QaConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse {:?}: {}", config_path, e))
    })?;

    config.validate()?;

    tracing::debug!(
        "Loaded qa config: {} collections, threshold {}",
        config.collections.len(),
        config.similarity_threshold
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_qa_config(temp.path()).unwrap();

        assert_eq!(config.per_query_limit, 15);
        assert_eq!(config.max_candidates(), 30);
        assert_eq!(config.caps, ReferenceCaps::default());
        assert_eq!(config.collections.len(), 3);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = get_qa_config_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"
collections: [technical-standards]
similarityThreshold: 0.3
caps:
  regulations: 4
regulationMarkers: ["条例"]
"#,
        )
        .unwrap();

        let config = load_qa_config(temp.path()).unwrap();
        assert_eq!(config.collections, vec!["technical-standards".to_string()]);
        assert!((config.similarity_threshold - 0.3).abs() < 1e-6);
        assert_eq!(config.caps.regulations, 4);
        assert_eq!(config.caps.standards, 3);
        assert_eq!(config.regulation_markers, vec!["条例".to_string()]);
        assert!(!config.domains.is_empty());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let temp = TempDir::new().unwrap();
        let path = get_qa_config_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "similarityThreshold: 1.5\n").unwrap();

        assert!(load_qa_config(temp.path()).is_err());
    }

    #[test]
    fn test_query_expansion_predicate() {
        let expansions = default_query_expansions();
        assert!(expansions[0].matches("应急厕所之间的距离是多少"));
        assert!(!expansions[0].matches("厕所间距"));
        assert!(expansions[1].matches("厕所间距"));
        assert!(!expansions[1].matches("厕所面积"));
    }

    #[test]
    fn test_no_grounding_pair_requires_both_phrases() {
        let pattern = NoGroundingPattern::pair("文档中主要涉及", "但未包含");
        assert!(pattern.matches("文档中主要涉及混凝土，但未包含该数值"));
        assert!(!pattern.matches("文档中主要涉及混凝土"));
    }

    #[test]
    fn test_collection_paths() {
        let root = Path::new("/ws");
        assert_eq!(
            get_collection_path(root, "technical-standards"),
            PathBuf::from("/ws/.citewise/collections/technical-standards/passages.jsonl")
        );
        assert_eq!(
            get_records_path(root),
            PathBuf::from("/ws/.citewise/records.sqlite")
        );
    }
}
