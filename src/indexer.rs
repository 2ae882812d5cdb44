//! Builds the vector index from chunks.
//!
//! Every rebuild embeds the full chunk set in batches and constructs a new
//! [`VectorIndex`]. The new index replaces the old one with a single
//! `Arc` swap under a write lock, so a reader holding the previous
//! `Arc` keeps a consistent view and later readers see only the new one.
//! If any batch fails, nothing is swapped.

use std::sync::{Arc, PoisonError, RwLock};

use docchat_core::index::VectorIndex;
use docchat_core::models::Chunk;
use serde::Serialize;
use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::error::ChatError;

/// Counts describing a successful rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub dims: usize,
    pub batches: usize,
}

/// Owner of the active [`VectorIndex`].
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    current: RwLock<Arc<VectorIndex>>,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
            current: RwLock::new(Arc::new(VectorIndex::empty())),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// The active index. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<VectorIndex> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Embed `chunks` and replace the active index.
    ///
    /// On error the previously active index is left untouched.
    pub async fn rebuild(&self, chunks: Vec<Chunk>) -> Result<IndexStats, ChatError> {
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        let mut batches = 0usize;

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .map_err(|e| ChatError::IndexBuild(format!("embedding failed: {:#}", e)))?;
            if vectors.len() != texts.len() {
                return Err(ChatError::IndexBuild(format!(
                    "embedding service returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                )));
            }
            embeddings.extend(vectors);
            batches += 1;
            debug!(batch = batches, embedded = embeddings.len(), "embedded batch");
        }

        let index =
            VectorIndex::build(chunks, embeddings).map_err(|e| ChatError::IndexBuild(e.to_string()))?;
        let stats = IndexStats {
            chunks: index.len(),
            dims: index.dims(),
            batches,
        };

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(index);
        info!(
            chunks = stats.chunks,
            dims = stats.dims,
            model = self.embedder.model_name(),
            "index rebuilt"
        );
        Ok(stats)
    }
}
