//! Collection search boundary.
//!
//! A [`SearchClient`] answers one query against one named collection. The
//! fusion engine fans calls out concurrently, so implementations must be
//! safe to share across tasks.

pub mod embedding;
pub mod local;

pub use embedding::TrigramEmbedder;
pub use local::LocalCollectionClient;

use crate::types::Candidate;
use citewise_core::AppResult;

/// Searches a named collection of passages.
#[async_trait::async_trait]
pub trait SearchClient: Send + Sync {
    /// Return up to `limit` candidates, best first, with scores in [0, 1].
    async fn search(
        &self,
        query: &str,
        collection_id: &str,
        limit: usize,
    ) -> AppResult<Vec<Candidate>>;
}

/// Convert a backend distance into a similarity in [0, 1].
pub fn similarity_from_distance(distance: f32, scale: f32) -> f32 {
    (1.0 - distance / scale).clamp(0.0, 1.0)
}
