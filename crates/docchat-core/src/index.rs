//! Brute-force in-memory vector index.
//!
//! Entries are kept in insertion order. Search scores every entry by cosine
//! distance and stable-sorts, so equal distances keep insertion order.
//! An index is built once from a full set of chunks and never updated in
//! place; callers rebuild and swap.

use thiserror::Error;

use crate::embedding::cosine_distance;
use crate::models::{Chunk, IndexEntry, ScoredChunk};

/// Reasons an index cannot be built or searched with the given inputs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("got {vectors} embeddings for {chunks} chunks")]
    CountMismatch { chunks: usize, vectors: usize },
    #[error("embedding {position} has {found} dimensions, expected {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        found: usize,
    },
    #[error("embedding {position} is empty")]
    EmptyVector { position: usize },
    #[error("query has {found} dimensions, index has {expected}")]
    QueryDimensionMismatch { expected: usize, found: usize },
}

/// Similarity-searchable set of [`IndexEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dims: usize,
}

impl VectorIndex {
    /// An index with no entries. Every search returns nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Pair each chunk with its embedding.
    ///
    /// All vectors must be non-empty and share one dimensionality, and there
    /// must be exactly one per chunk.
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::CountMismatch {
                chunks: chunks.len(),
                vectors: embeddings.len(),
            });
        }

        let dims = embeddings.first().map(|v| v.len()).unwrap_or(0);
        for (position, v) in embeddings.iter().enumerate() {
            if v.is_empty() {
                return Err(IndexError::EmptyVector { position });
            }
            if v.len() != dims {
                return Err(IndexError::DimensionMismatch {
                    position,
                    expected: dims,
                    found: v.len(),
                });
            }
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        Ok(Self { entries, dims })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimensionality, `0` for an empty index.
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Return the `k` entries closest to `query`, nearest first.
    ///
    /// A non-empty index rejects a query whose length differs from
    /// [`dims`](Self::dims).
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(IndexError::QueryDimensionMismatch {
                expected: self.dims,
                found: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_distance(query, &e.embedding)))
            .collect();
        // `sort_by` is stable: ties stay in insertion order.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                distance,
            })
            .collect())
    }
}
