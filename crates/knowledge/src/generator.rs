//! Answer generation through a chat model.

use crate::config::QaConfig;
use crate::domain::DomainMatch;
use crate::types::RetrievedSet;
use async_trait::async_trait;
use citewise_core::{AppError, AppResult};
use citewise_llm::{ChatMessage, LlmClient, LlmRequest};
use citewise_prompt::{build_prompt, resolve_prompt, GROUNDED_ANSWER_PROMPT, NO_CONTEXT_ANSWER_PROMPT};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Characters of each passage shown to the model.
const MAX_PASSAGE_CHARS: usize = 800;

/// Whether the model answers from retrieved passages or from its own knowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Grounded,
    NoContext,
}

impl GenerationMode {
    pub fn prompt_id(&self) -> &'static str {
        match self {
            Self::Grounded => GROUNDED_ANSWER_PROMPT,
            Self::NoContext => NO_CONTEXT_ANSWER_PROMPT,
        }
    }
}

/// Everything the generator sees for one answer.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub question: &'a str,
    pub domain: DomainMatch<'a>,
    pub passages: &'a RetrievedSet,
    pub history: &'a [ChatMessage],
    pub mode: GenerationMode,
}

/// Raw model output.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    /// Confidence reported by the backend, if it reports one
    pub confidence: Option<f32>,
}

impl GeneratedAnswer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }
}

/// Produces answer text for a question.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Fails on backend errors, timeouts and empty output.
    async fn generate(&self, request: GenerationRequest<'_>) -> AppResult<GeneratedAnswer>;
}

/// Sampling parameters and the per-call timeout.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub no_context_temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl From<&QaConfig> for GenerationSettings {
    fn from(config: &QaConfig) -> Self {
        Self {
            temperature: config.temperature,
            no_context_temperature: config.no_context_temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            timeout: config.generation_timeout(),
        }
    }
}

/// Generator backed by an [`LlmClient`] and the answer prompts.
pub struct LlmAnswerGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    workspace: PathBuf,
    settings: GenerationSettings,
}

impl LlmAnswerGenerator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        workspace: impl Into<PathBuf>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            workspace: workspace.into(),
            settings,
        }
    }

    fn build_request(&self, request: &GenerationRequest<'_>) -> AppResult<LlmRequest> {
        let definition = resolve_prompt(&self.workspace, request.mode.prompt_id())?;

        let mut variables = HashMap::new();
        variables.insert("question".to_string(), request.question.to_string());
        variables.insert("domain".to_string(), request.domain.name().to_string());
        variables.insert(
            "regulations".to_string(),
            request.domain.regulations().join(", "),
        );
        if request.mode == GenerationMode::Grounded {
            variables.insert("context".to_string(), render_context(request.passages));
        }

        let built = build_prompt(&definition, variables)?;

        let temperature = match request.mode {
            GenerationMode::Grounded => self.settings.temperature,
            GenerationMode::NoContext => self.settings.no_context_temperature,
        };

        let mut llm_request = LlmRequest::new(built.user, &self.model)
            .with_history(request.history.to_vec())
            .with_temperature(temperature)
            .with_top_p(self.settings.top_p)
            .with_max_tokens(self.settings.max_tokens);
        if let Some(system) = built.system {
            llm_request = llm_request.with_system(system);
        }

        Ok(llm_request)
    }
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> AppResult<GeneratedAnswer> {
        let llm_request = self.build_request(&request)?;

        tracing::debug!(
            "Generating {:?} answer with {} ({} passages, {} history messages)",
            request.mode,
            self.client.provider_name(),
            request.passages.len(),
            request.history.len()
        );

        let response = tokio::time::timeout(self.settings.timeout, self.client.complete(&llm_request))
            .await
            .map_err(|_| {
                AppError::Llm(format!(
                    "Generation timed out after {}s",
                    self.settings.timeout.as_secs()
                ))
            })??;

        if response.content.trim().is_empty() {
            return Err(AppError::Llm("Model returned an empty answer".to_string()));
        }

        tracing::debug!(
            "Token usage: {} prompt, {} completion",
            response.usage.prompt_tokens,
            response.usage.completion_tokens
        );

        Ok(GeneratedAnswer::new(response.content))
    }
}

/// Render passages with their global and collection-relative positions.
pub fn render_context(passages: &RetrievedSet) -> String {
    if passages.is_empty() {
        return "未找到相关的规范或图纸信息。".to_string();
    }

    passages
        .with_collection_indices()
        .into_iter()
        .enumerate()
        .map(|(i, (collection_index, candidate))| {
            let metadata = &candidate.metadata;
            let section = metadata
                .extra
                .get("section")
                .and_then(|v| v.as_str())
                .unwrap_or("未指定");

            format!(
                "【文档 {}】{} #{}\n文件名: {}\n规范编号: {}\n章节: {}\n相关度: {:.2}\n文档内容:\n{}",
                i + 1,
                candidate.collection_id,
                collection_index,
                metadata.source_file,
                metadata.standard_number.as_deref().unwrap_or("未指定"),
                section,
                candidate.relevance_score,
                truncate_chars(&candidate.content, MAX_PASSAGE_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QaConfig;
    use crate::domain::identify_domain;
    use crate::types::{Candidate, CandidateMetadata};
    use citewise_llm::{ChatRole, LlmResponse, LlmUsage};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct RecordingClient {
        reply: String,
        seen: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait]
    impl LlmClient for RecordingClient {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(LlmResponse {
                content: self.reply.clone(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            })
        }
    }

    fn passages() -> RetrievedSet {
        let metadata = CandidateMetadata {
            source_file: "GB50010.pdf".to_string(),
            standard_number: Some("GB 50010-2010".to_string()),
            ..CandidateMetadata::default()
        };
        RetrievedSet::from_ordered(vec![
            Candidate::new("保护层厚度不应小于钢筋公称直径", "technical-standards", 0.42, metadata),
            Candidate::new("结施-01 说明", "project-drawings", 0.31, CandidateMetadata::default()),
            Candidate::new("箍筋保护层", "technical-standards", 0.30, CandidateMetadata::default()),
        ])
    }

    #[test]
    fn test_render_context_indices() {
        let context = render_context(&passages());

        assert!(context.contains("【文档 1】technical-standards #1"));
        assert!(context.contains("【文档 2】project-drawings #1"));
        assert!(context.contains("【文档 3】technical-standards #2"));
        assert!(context.contains("规范编号: GB 50010-2010"));
        assert!(context.contains("相关度: 0.42"));
    }

    #[test]
    fn test_truncate_chars() {
        let long = "字".repeat(MAX_PASSAGE_CHARS + 5);
        let truncated = truncate_chars(&long, MAX_PASSAGE_CHARS);
        assert_eq!(truncated.chars().count(), MAX_PASSAGE_CHARS + 3);
        assert_eq!(truncate_chars("短文本", MAX_PASSAGE_CHARS), "短文本");
    }

    #[tokio::test]
    async fn test_grounded_request_carries_prompt_and_history() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(RecordingClient {
            reply: "答案".to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let config = QaConfig::default();
        let generator = LlmAnswerGenerator::new(
            client.clone(),
            "deepseek-chat",
            temp.path(),
            GenerationSettings::from(&config),
        );

        let history = vec![ChatMessage::user("上一个问题"), ChatMessage::assistant("上一个回答")];
        let set = passages();
        let answer = generator
            .generate(GenerationRequest {
                question: "保护层厚度",
                domain: identify_domain("保护层厚度", &config.domains),
                passages: &set,
                history: &history,
                mode: GenerationMode::Grounded,
            })
            .await
            .unwrap();

        assert_eq!(answer.text, "答案");
        assert!(answer.confidence.is_none());

        let seen = client.seen.lock().unwrap();
        let messages = seen[0].to_messages();
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[0].content.contains("[使用标准"));
        assert_eq!(messages[1].content, "上一个问题");
        assert!(messages[3].content.contains("【工程领域】混凝土"));
        assert!(messages[3].content.contains("GB 50010, GB 50204"));
        assert!(messages[3].content.contains("【文档 1】"));
        assert_eq!(seen[0].temperature, Some(0.1));
    }

    #[tokio::test]
    async fn test_no_context_uses_domain_system_prompt() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(RecordingClient {
            reply: "答案".to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let config = QaConfig::default();
        let generator = LlmAnswerGenerator::new(
            client.clone(),
            "deepseek-chat",
            temp.path(),
            GenerationSettings::from(&config),
        );

        let empty = RetrievedSet::empty();
        generator
            .generate(GenerationRequest {
                question: "立杆间距",
                domain: identify_domain("立杆间距", &config.domains),
                passages: &empty,
                history: &[],
                mode: GenerationMode::NoContext,
            })
            .await
            .unwrap();

        let seen = client.seen.lock().unwrap();
        let system = seen[0].system.as_deref().unwrap();
        assert!(system.contains("脚手架领域"));
        assert!(!seen[0].prompt.contains("【检索到的文档】"));
        assert_eq!(seen[0].temperature, Some(0.3));
    }

    #[tokio::test]
    async fn test_empty_output_is_error() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(RecordingClient {
            reply: "  \n".to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let config = QaConfig::default();
        let generator =
            LlmAnswerGenerator::new(client, "m", temp.path(), GenerationSettings::from(&config));

        let empty = RetrievedSet::empty();
        let result = generator
            .generate(GenerationRequest {
                question: "q",
                domain: identify_domain("q", &config.domains),
                passages: &empty,
                history: &[],
                mode: GenerationMode::NoContext,
            })
            .await;

        assert!(matches!(result, Err(AppError::Llm(_))));
    }
}
