//! Error types for embedding and pipeline operations.
//!
//! Search and storage errors live with their modules ([`crate::search::types`]
//! and [`crate::storage`]); this module holds the errors shared across the
//! embedding seam and the indexing pipeline.

use thiserror::Error;

/// Errors that can occur while requesting embeddings from a provider.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// The provider failed to produce embeddings (network, model, quota).
    #[error("embedding provider error: {0}")]
    Provider(String),
    /// The provider returned the wrong number of vectors for a batch.
    #[error("provider returned {actual} vectors for {expected} inputs")]
    BatchShape {
        /// Number of input texts in the batch
        expected: usize,
        /// Number of vectors actually returned
        actual: usize,
    },
}

/// Errors that can abort an indexing pipeline run.
///
/// A failed run never publishes anything: the store swap happens only after
/// every step has succeeded, so prior artifacts stay readable.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An embedding batch failed mid-run; the whole rebuild is aborted.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Index construction failed (dimension mismatch, invalid config).
    #[error("index error: {0}")]
    Index(#[from] crate::search::types::SearchError),
    /// Publishing the artifact set failed.
    #[error("storage error: {0}")]
    Store(#[from] crate::storage::StoreError),
}
