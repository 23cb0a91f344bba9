//! The answer pipeline: retrieve, generate, reconcile, gate, record.

use crate::citation::reconcile;
use crate::confidence::{
    general_suggestions, grounded_confidence, grounded_suggestions, has_definitive_answer,
};
use crate::config::QaConfig;
use crate::domain::{identify_domain, DomainMatch};
use crate::fallback::should_fall_back;
use crate::fusion::{fuse, query_variants, FusionParams};
use crate::generator::{AnswerGenerator, GenerationMode, GenerationRequest};
use crate::records::{RecordLookup, ResolvedReferences};
use crate::search::SearchClient;
use crate::session::{history_window, SessionLocks, SessionStore};
use crate::types::{AnswerMode, FailureKind, FinalAnswer, RetrievedSet, SourceRef};
use chrono::Utc;
use citewise_core::{AppError, AppResult};
use citewise_llm::ChatMessage;
use std::sync::Arc;
use tracing::Instrument;

const DEGRADED_SUGGESTIONS: &[&str] = &["请检查网络连接", "尝试重新表述问题", "稍后重试"];

/// Answer text, references and scores before they are stamped with the
/// question and session.
struct Outcome {
    answer: String,
    references: ResolvedReferences,
    sources: Vec<SourceRef>,
    confidence_score: f32,
    has_definitive_answer: bool,
    suggestions: Vec<String>,
    mode: AnswerMode,
    degraded: Option<FailureKind>,
}

impl Outcome {
    fn degraded(error: &AppError) -> Self {
        Self {
            answer: format!(
                "抱歉，处理您的问题时出现错误。这可能是由于：\n1. 网络连接问题\n2. 模型服务暂时不可用\n3. 系统内部错误\n\n具体错误信息：{}\n\n建议您稍后重试，或者尝试换个表述方式提问。",
                error
            ),
            references: ResolvedReferences::default(),
            sources: Vec::new(),
            confidence_score: 0.0,
            has_definitive_answer: false,
            suggestions: DEGRADED_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
            mode: AnswerMode::Degraded,
            degraded: Some(FailureKind::GenerationFailure),
        }
    }
}

/// Drives one question through the pipeline.
///
/// Every boundary is injected, so the orchestrator holds no global state
/// and any backend can be swapped for a fake in tests.
pub struct Orchestrator {
    config: QaConfig,
    search: Arc<dyn SearchClient>,
    generator: Arc<dyn AnswerGenerator>,
    lookup: Arc<dyn RecordLookup>,
    sessions: Arc<dyn SessionStore>,
    locks: SessionLocks,
}

impl Orchestrator {
    pub fn new(
        config: QaConfig,
        search: Arc<dyn SearchClient>,
        generator: Arc<dyn AnswerGenerator>,
        lookup: Arc<dyn RecordLookup>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            search,
            generator,
            lookup,
            sessions,
            locks: SessionLocks::new(),
        }
    }

    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    /// Fan the question out across every configured collection.
    pub async fn retrieve(&self, question: &str) -> RetrievedSet {
        let variants = query_variants(question, &self.config);
        tracing::debug!("Query variants: {:?}", variants);

        let params = FusionParams::from(&self.config);
        fuse(self.search.as_ref(), question, &variants, &params).await
    }

    /// Answer a question within a session.
    ///
    /// A missing session id starts a new session. Recoverable failures
    /// degrade the answer instead of failing the call.
    pub async fn answer(&self, question: &str, session_id: Option<&str>) -> AppResult<FinalAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Knowledge("Question must not be empty".to_string()));
        }

        let session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let span = tracing::info_span!("answer", session_id = %session_id);
        self.answer_in_session(question, session_id)
            .instrument(span)
            .await
    }

    async fn answer_in_session(&self, question: &str, session_id: String) -> AppResult<FinalAnswer> {
        let _guard = self.locks.acquire(&session_id).await;

        let history = self.sessions.history(&session_id).await;
        let window = history_window(&history, self.config.history_window);
        let domain = identify_domain(question, &self.config.domains);
        tracing::info!("Answering in domain '{}': {}", domain.name(), question);

        let retrieved = self.retrieve(question).await;

        let outcome = if retrieved.is_empty() {
            tracing::info!("No grounding available, answering without context");
            self.answer_without_context(question, domain, window).await
        } else {
            self.answer_grounded(question, domain, window, &retrieved).await
        };

        self.sessions
            .append(
                &session_id,
                [
                    ChatMessage::user(question),
                    ChatMessage::assistant(outcome.answer.clone()),
                ],
                self.config.history_retention,
            )
            .await;

        tracing::info!(
            "Answered in {} mode, confidence {:.2}, {} references",
            outcome.mode.as_str(),
            outcome.confidence_score,
            outcome.references.total()
        );

        Ok(FinalAnswer {
            question: question.to_string(),
            answer: outcome.answer,
            references: outcome.references,
            sources: outcome.sources,
            confidence_score: outcome.confidence_score,
            has_definitive_answer: outcome.has_definitive_answer,
            suggestions: outcome.suggestions,
            mode: outcome.mode,
            degraded: outcome.degraded,
            session_id,
            timestamp: Utc::now(),
        })
    }

    async fn answer_grounded(
        &self,
        question: &str,
        domain: DomainMatch<'_>,
        history: &[ChatMessage],
        retrieved: &RetrievedSet,
    ) -> Outcome {
        let request = GenerationRequest {
            question,
            domain,
            passages: retrieved,
            history,
            mode: GenerationMode::Grounded,
        };

        let generated = match self.generator.generate(request).await {
            Ok(generated) => generated,
            Err(e) => {
                tracing::error!(failure = %FailureKind::GenerationFailure, "Generation failed: {}", e);
                return Outcome::degraded(&e);
            }
        };

        let reconciliation = reconcile(self.lookup.as_ref(), &generated.text, &self.config).await;

        if should_fall_back(
            &generated.text,
            &reconciliation.citations,
            reconciliation.references.total(),
            &self.config.no_grounding_patterns,
        ) {
            tracing::info!("Grounded answer rejected, regenerating without context");
            return self.answer_without_context(question, domain, history).await;
        }

        let confidence_score = generated
            .confidence
            .unwrap_or_else(|| grounded_confidence(retrieved, &generated.text));

        Outcome {
            has_definitive_answer: has_definitive_answer(
                &generated.text,
                &self.config.definitive_phrases,
                &self.config.uncertain_phrases,
            ),
            suggestions: grounded_suggestions(domain, &generated.text),
            answer: reconciliation.rewritten,
            references: reconciliation.references,
            sources: retrieved.iter().map(SourceRef::from).collect(),
            confidence_score,
            mode: AnswerMode::Grounded,
            degraded: None,
        }
    }

    async fn answer_without_context(
        &self,
        question: &str,
        domain: DomainMatch<'_>,
        history: &[ChatMessage],
    ) -> Outcome {
        let empty = RetrievedSet::empty();
        let request = GenerationRequest {
            question,
            domain,
            passages: &empty,
            history,
            mode: GenerationMode::NoContext,
        };

        let generated = match self.generator.generate(request).await {
            Ok(generated) => generated,
            Err(e) => {
                tracing::error!(failure = %FailureKind::GenerationFailure, "Generation failed: {}", e);
                return Outcome::degraded(&e);
            }
        };

        let reconciliation = reconcile(self.lookup.as_ref(), &generated.text, &self.config).await;

        Outcome {
            answer: reconciliation.rewritten,
            references: reconciliation.references,
            sources: Vec::new(),
            confidence_score: generated
                .confidence
                .unwrap_or(self.config.no_context_confidence),
            has_definitive_answer: true,
            suggestions: general_suggestions(domain),
            mode: AnswerMode::NoContext,
            degraded: None,
        }
    }
}
