//! Ask command handler.
//!
//! Runs a question through the full answer pipeline.

use citewise_core::{config::AppConfig, AppError, AppResult};
use citewise_knowledge::{
    config::{get_collections_dir, get_records_path},
    load_qa_config, FinalAnswer, GenerationSettings, InMemorySessionStore, LlmAnswerGenerator,
    LocalCollectionClient, Orchestrator, QaConfig, SqliteRecordStore,
};
use citewise_llm::{create_client, LlmClient};
use citewise_prompt::list_prompts;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Ask a question grounded in the workspace collections
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Session identifier; history is kept per session
    #[arg(short, long)]
    pub session: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self
            .get_question()?
            .ok_or_else(|| AppError::Config("No question provided".to_string()))?;

        let qa = load_qa_config(&config.workspace)?;
        qa.validate()?;

        let client = create_llm_client(config)?;
        let orchestrator = build_orchestrator(config, qa, client)?;

        let answer = orchestrator
            .answer(&question, self.session.as_deref())
            .await?;

        if self.json {
            let json = serde_json::to_string_pretty(&answer)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            print_answer(&answer);
        }

        Ok(())
    }

    fn get_question(&self) -> AppResult<Option<String>> {
        if let Some(ref question) = self.question {
            return Ok(Some(question.clone()));
        }
        match self.file {
            Some(ref path) => Ok(Some(std::fs::read_to_string(path)?)),
            None => Ok(None),
        }
    }
}

/// Create the chat client for the configured provider.
pub fn create_llm_client(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let provider_config = config.get_provider_config(&config.provider);
    let endpoint = provider_config.as_ref().and_then(|pc| pc.endpoint());
    let timeout = provider_config
        .as_ref()
        .and_then(|pc| pc.timeout())
        .map(Duration::from_secs);
    let api_key = config.resolve_api_key(&config.provider);

    create_client(&config.provider, endpoint, api_key.as_deref(), timeout).map_err(AppError::Config)
}

/// Wire the workspace's collections, record store and session store.
pub fn build_orchestrator(
    config: &AppConfig,
    qa: QaConfig,
    client: Arc<dyn LlmClient>,
) -> AppResult<Orchestrator> {
    let search = LocalCollectionClient::new(get_collections_dir(&config.workspace), qa.distance_scale);
    let records = SqliteRecordStore::open(&get_records_path(&config.workspace))?;

    let overrides = list_prompts(&config.workspace)?;
    if !overrides.is_empty() {
        tracing::debug!("Prompt overrides: {}", overrides.join(", "));
    }

    let generator = LlmAnswerGenerator::new(
        client,
        config.model.clone(),
        config.workspace.clone(),
        GenerationSettings::from(&qa),
    );

    Ok(Orchestrator::new(
        qa,
        Arc::new(search),
        Arc::new(generator),
        Arc::new(records),
        Arc::new(InMemorySessionStore::new()),
    ))
}

fn print_answer(answer: &FinalAnswer) {
    println!("{}", answer.answer);
    println!();
    println!(
        "confidence: {:.2}  mode: {}  session: {}",
        answer.confidence_score,
        answer.mode.as_str(),
        answer.session_id
    );

    if !answer.suggestions.is_empty() {
        println!();
        for suggestion in &answer.suggestions {
            println!("  → {}", suggestion);
        }
    }
}
