//! Shared search types and errors.

use crate::chunking::ChunkId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while building or querying the indices.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A configuration value was outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A vector's dimension did not match the index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was built with
        expected: usize,
        /// Dimension of the offending vector
        actual: usize,
    },
    /// Embedding the query failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] crate::error::EmbeddingError),
    /// Loading artifacts from the store failed.
    #[error("storage error: {0}")]
    Store(#[from] crate::storage::StoreError),
    /// A persisted artifact was malformed or internally inconsistent.
    #[error("corrupt artifact: {0}")]
    CorruptArtifact(String),
}

/// Checks that a vector's dimension matches the index dimension.
pub(crate) fn validate_dimension(expected: usize, actual: usize) -> Result<(), SearchError> {
    if expected == actual {
        Ok(())
    } else {
        Err(SearchError::DimensionMismatch { expected, actual })
    }
}

/// Which retrieval leg(s) surfaced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Found only by the dense (semantic) leg
    Dense,
    /// Found only by the sparse (keyword) leg
    Sparse,
    /// Found by both legs
    Hybrid,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Provenance::Dense => "dense",
            Provenance::Sparse => "sparse",
            Provenance::Hybrid => "hybrid",
        };
        f.write_str(label)
    }
}

/// One ranked search hit with full display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Chunk identifier
    pub chunk_id: ChunkId,
    /// Final score (fused RRF score, or rerank composite when reranked)
    pub score: f32,
    /// Cosine similarity from the dense leg, if it surfaced this chunk
    pub dense_score: Option<f32>,
    /// BM25 score from the sparse leg, if it surfaced this chunk
    pub sparse_score: Option<f32>,
    /// Which leg(s) found this chunk
    pub provenance: Provenance,
    /// Chunk text
    pub text: String,
    /// Parent document slug
    pub source_id: String,
    /// Parent document title
    pub source_title: String,
    /// Heading trail, if the chunk came from a titled section
    pub section_path: Option<String>,
    /// Topic labels
    pub tags: Vec<String>,
    /// Deep link: "/{source_id}{url_fragment}"
    pub url: String,
}
