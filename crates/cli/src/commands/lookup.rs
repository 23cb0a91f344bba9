//! Lookup command handler.
//!
//! Queries the canonical record store directly.

use citewise_core::{config::AppConfig, AppError, AppResult};
use citewise_knowledge::{config::get_records_path, RecordKind, RecordLookup, SqliteRecordStore};
use clap::Args;

/// Find canonical standards, regulations or drawings by name
#[derive(Args, Debug)]
pub struct LookupCommand {
    /// Name or number to search for
    pub name: String,

    /// Record class: standard, regulation or drawing
    #[arg(short, long, default_value = "standard")]
    pub kind: String,

    /// Maximum records to return
    #[arg(short = 'n', long, default_value = "3")]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl LookupCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing lookup command");

        let kind = RecordKind::parse(&self.kind).ok_or_else(|| {
            AppError::Config(format!(
                "Unknown record kind: {}. Supported: standard, regulation, drawing",
                self.kind
            ))
        })?;

        let store = SqliteRecordStore::open(&get_records_path(&config.workspace))?;
        let records = store.find_by_name(&self.name, kind, self.limit).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&records)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
            return Ok(());
        }

        if records.is_empty() {
            println!("No {} records match '{}'", kind, self.name);
            return Ok(());
        }

        for record in &records {
            match record.identifying_number {
                Some(ref number) => println!("{}  {}", number, record.canonical_name),
                None => println!("{}", record.canonical_name),
            }
            if let Some(ref status) = record.status {
                println!("  状态: {}", status);
            }
            if let Some(ref url) = record.resource_url {
                println!("  {}", url);
            }
        }

        Ok(())
    }
}
