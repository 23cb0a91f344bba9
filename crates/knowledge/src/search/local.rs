//! JSON Lines passage collections searched with trigram embeddings.

use super::embedding::{squared_l2_distance, TrigramEmbedder};
use super::{similarity_from_distance, SearchClient};
use crate::types::{Candidate, CandidateMetadata};
use citewise_core::{AppError, AppResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One line of `passages.jsonl`.
#[derive(Debug, Deserialize)]
struct PassageRecord {
    content: String,
    #[serde(default)]
    metadata: CandidateMetadata,
}

#[derive(Debug)]
struct IndexedPassage {
    content: String,
    metadata: CandidateMetadata,
    embedding: Vec<f32>,
}

/// Search client over `<root>/<collection_id>/passages.jsonl` files.
///
/// Collections are read and embedded on first use and cached for the
/// lifetime of the client.
pub struct LocalCollectionClient {
    root: PathBuf,
    embedder: TrigramEmbedder,
    distance_scale: f32,
    cache: RwLock<HashMap<String, Arc<Vec<IndexedPassage>>>>,
}

impl LocalCollectionClient {
    pub fn new(root: impl Into<PathBuf>, distance_scale: f32) -> Self {
        Self {
            root: root.into(),
            embedder: TrigramEmbedder::default(),
            distance_scale,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn collection_path(&self, collection_id: &str) -> PathBuf {
        self.root.join(collection_id).join("passages.jsonl")
    }

    async fn collection(&self, collection_id: &str) -> AppResult<Arc<Vec<IndexedPassage>>> {
        if let Some(passages) = self.cache.read().await.get(collection_id) {
            return Ok(Arc::clone(passages));
        }

        let mut cache = self.cache.write().await;
        if let Some(passages) = cache.get(collection_id) {
            return Ok(Arc::clone(passages));
        }

        let path = self.collection_path(collection_id);
        let passages = Arc::new(self.load(&path).await?);
        tracing::info!(
            "Loaded collection '{}' ({} passages)",
            collection_id,
            passages.len()
        );
        cache.insert(collection_id.to_string(), Arc::clone(&passages));
        Ok(passages)
    }

    async fn load(&self, path: &Path) -> AppResult<Vec<IndexedPassage>> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Search(format!("Failed to read collection {:?}: {}", path, e))
        })?;

        let mut passages = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PassageRecord>(line) {
                Ok(record) => {
                    let embedding = self.embedder.embed(&record.content);
                    passages.push(IndexedPassage {
                        content: record.content,
                        metadata: record.metadata,
                        embedding,
                    });
                }
                Err(e) => {
                    tracing::warn!("Skipping {:?} line {}: {}", path, line_no + 1, e);
                }
            }
        }

        Ok(passages)
    }
}

#[async_trait::async_trait]
impl SearchClient for LocalCollectionClient {
    async fn search(
        &self,
        query: &str,
        collection_id: &str,
        limit: usize,
    ) -> AppResult<Vec<Candidate>> {
        let passages = self.collection(collection_id).await?;
        let query_embedding = self.embedder.embed(query);

        let mut scored: Vec<(f32, &IndexedPassage)> = passages
            .iter()
            .map(|p| {
                let distance = squared_l2_distance(&query_embedding, &p.embedding);
                (similarity_from_distance(distance, self.distance_scale), p)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        tracing::debug!(
            "Collection '{}' scores: {:?}",
            collection_id,
            scored.iter().map(|(s, _)| *s).collect::<Vec<_>>()
        );

        Ok(scored
            .into_iter()
            .map(|(score, p)| {
                Candidate::new(p.content.clone(), collection_id, score, p.metadata.clone())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_collection(root: &Path, id: &str, lines: &[&str]) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("passages.jsonl"), lines.join("\n")).unwrap();
    }

    #[tokio::test]
    async fn test_search_ranks_related_passage_first() {
        let temp = TempDir::new().unwrap();
        write_collection(
            temp.path(),
            "technical-standards",
            &[
                r#"{"content":"脚手架连墙件应从底层第一步纵向水平杆处开始设置","metadata":{"source_file":"JGJ130.pdf","chunk_index":4,"chunk_count":20}}"#,
                r#"{"content":"混凝土保护层厚度不应小于钢筋的公称直径","metadata":{"source_file":"GB50010.pdf","chunk_index":7,"chunk_count":30,"standard_number":"GB 50010-2010"}}"#,
            ],
        );

        let client = LocalCollectionClient::new(temp.path(), 2.0);
        let results = client
            .search("混凝土保护层厚度", "technical-standards", 5)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].metadata.source_file, "GB50010.pdf");
        assert_eq!(results[0].collection_id, "technical-standards");
        assert!(results[0].relevance_score > results[1].relevance_score);
        assert!(results.iter().all(|c| (0.0..=1.0).contains(&c.relevance_score)));
    }

    #[tokio::test]
    async fn test_limit_and_bad_lines() {
        let temp = TempDir::new().unwrap();
        write_collection(
            temp.path(),
            "drawings",
            &[
                r#"{"content":"结施-01 基础平面布置图"}"#,
                "not json",
                r#"{"content":"结施-02 基础详图"}"#,
            ],
        );

        let client = LocalCollectionClient::new(temp.path(), 2.0);
        let results = client.search("基础", "drawings", 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_collection_is_error() {
        let temp = TempDir::new().unwrap();
        let client = LocalCollectionClient::new(temp.path(), 2.0);
        assert!(client.search("q", "absent", 5).await.is_err());
    }
}
