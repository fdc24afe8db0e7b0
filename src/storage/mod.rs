//! Artifact store abstraction for persisting index builds.
//!
//! The pipeline publishes a complete artifact set (chunks, both indices, and
//! the summary) and the serving layer loads one. Stores are a capability
//! interface, not a base class: a backend implements [`ArtifactStore`] and is
//! selected at runtime from [`StoreConfig`] via [`create_store`].
//!
//! Publish is atomic per store. Readers observe either the full prior set or
//! the full next set, never a mix.

mod fs;
mod memory;

pub use fs::FsArtifactStore;
pub use memory::InMemoryArtifactStore;

use crate::chunking::Chunk;
use crate::config::StoreConfig;
use crate::indexing::IndexSummary;
use crate::search::dense::DenseIndex;
use crate::search::sparse::SparseIndex;
use async_trait::async_trait;
use thiserror::Error;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No published artifact set (or a piece of one) exists.
    #[error("artifact not found: {0}")]
    NotFound(String),
    /// Underlying I/O failed.
    #[error("io error: {0}")]
    Io(String),
    /// An artifact could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(err.to_string()),
            _ => StoreError::Io(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// One complete index build, published and loaded as a unit.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub chunks: Vec<Chunk>,
    pub dense: DenseIndex,
    pub sparse: SparseIndex,
    pub summary: IndexSummary,
}

/// Capability interface for artifact persistence.
///
/// `load_*` methods return [`StoreError::NotFound`] when nothing has been
/// published yet; callers decide whether that is fatal.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Loads the published chunk corpus.
    async fn load_chunks(&self) -> Result<Vec<Chunk>, StoreError>;

    /// Loads the published dense index.
    async fn load_dense_index(&self) -> Result<DenseIndex, StoreError>;

    /// Loads the published sparse index.
    async fn load_sparse_index(&self) -> Result<SparseIndex, StoreError>;

    /// Loads the published index summary.
    async fn load_summary(&self) -> Result<IndexSummary, StoreError>;

    /// Atomically replaces the published artifact set.
    async fn publish(&self, artifacts: ArtifactSet) -> Result<(), StoreError>;

    /// Verifies the backend is reachable and usable.
    async fn health_check(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: ArtifactStore + ?Sized> ArtifactStore for Box<T> {
    async fn load_chunks(&self) -> Result<Vec<Chunk>, StoreError> {
        (**self).load_chunks().await
    }

    async fn load_dense_index(&self) -> Result<DenseIndex, StoreError> {
        (**self).load_dense_index().await
    }

    async fn load_sparse_index(&self) -> Result<SparseIndex, StoreError> {
        (**self).load_sparse_index().await
    }

    async fn load_summary(&self) -> Result<IndexSummary, StoreError> {
        (**self).load_summary().await
    }

    async fn publish(&self, artifacts: ArtifactSet) -> Result<(), StoreError> {
        (**self).publish(artifacts).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        (**self).health_check().await
    }
}

/// Builds the store selected by configuration.
pub fn create_store(config: &StoreConfig) -> Box<dyn ArtifactStore> {
    match config {
        StoreConfig::Memory => Box::new(InMemoryArtifactStore::new()),
        StoreConfig::Filesystem { data_dir } => Box::new(FsArtifactStore::new(data_dir.clone())),
    }
}
