//! Search command handler.
//!
//! Shows the fused passages a question retrieves, without generating.

use citewise_core::{config::AppConfig, AppError, AppResult};
use citewise_knowledge::{
    config::get_collections_dir,
    fusion::{fuse, query_variants, FusionParams},
    load_qa_config, LocalCollectionClient,
};
use clap::Args;

/// Show the fused candidate set for a query
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Collection to search (repeatable; default: all configured)
    #[arg(short = 'C', long = "collection")]
    pub collections: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let qa = load_qa_config(&config.workspace)?;
        qa.validate()?;

        let mut params = FusionParams::from(&qa);
        if !self.collections.is_empty() {
            params.collections = self.collections.clone();
        }

        let variants = query_variants(&self.query, &qa);
        let client = LocalCollectionClient::new(get_collections_dir(&config.workspace), qa.distance_scale);
        let fused = fuse(&client, &self.query, &variants, &params).await;

        if self.json {
            let output = serde_json::json!({
                "query": self.query,
                "variants": variants,
                "collections": params.collections,
                "candidates": fused.candidates(),
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
            return Ok(());
        }

        if fused.is_empty() {
            println!(
                "No passages at or above threshold {:.2}",
                qa.similarity_threshold
            );
            return Ok(());
        }

        println!("Query variants:");
        for variant in &variants {
            println!("  - {}", variant);
        }
        println!();

        for (i, (collection_index, candidate)) in fused.with_collection_indices().into_iter().enumerate() {
            let preview: String = candidate.content.chars().take(120).collect();
            println!(
                "{}. [{:.3}] {} #{} ({}, chunk {})",
                i + 1,
                candidate.relevance_score,
                candidate.collection_id,
                collection_index,
                candidate.metadata.source_file,
                candidate.metadata.chunk_index
            );
            println!("   {}", preview.replace('\n', " "));
        }

        Ok(())
    }
}
