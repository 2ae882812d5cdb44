//! Query-time lookup against the active index.

use std::sync::Arc;

use docchat_core::models::ScoredChunk;
use tracing::debug;

use crate::embedding::embed_query;
use crate::error::{ChatError, Stage};
use crate::indexer::Indexer;

/// Embeds queries with the indexer's embedder and searches its current
/// index. Has no side effects.
pub struct Retriever {
    indexer: Arc<Indexer>,
}

impl Retriever {
    pub fn new(indexer: Arc<Indexer>) -> Self {
        Self { indexer }
    }

    /// The `k` chunks nearest to `query`, nearest first.
    ///
    /// An index that was never built yields an empty list without calling
    /// the embedding service.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, ChatError> {
        let index = self.indexer.snapshot();
        if index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed_query(self.indexer.embedder().as_ref(), query)
            .await
            .map_err(|e| ChatError::EmbeddingService {
                stage: Stage::Retrieve,
                source: e,
            })?;

        // A provider that changed models since the last upload returns
        // vectors the index cannot compare against.
        let hits = index
            .search(&query_vec, k)
            .map_err(|e| ChatError::EmbeddingService {
                stage: Stage::Retrieve,
                source: e.into(),
            })?;
        debug!(k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}
