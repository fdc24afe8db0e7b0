//! In-memory artifact store.

use super::{ArtifactSet, ArtifactStore, StoreError};
use crate::chunking::Chunk;
use crate::indexing::IndexSummary;
use crate::search::dense::DenseIndex;
use crate::search::sparse::SparseIndex;
use async_trait::async_trait;
use std::sync::Mutex;

/// Single-slot store holding the last published artifact set in memory.
///
/// Publish swaps the slot under a mutex, so it has the same all-or-nothing
/// visibility as the filesystem store. Used in tests and for ephemeral
/// deployments that rebuild on startup.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    slot: Mutex<Option<ArtifactSet>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_published<T>(
        &self,
        artifact: &str,
        f: impl FnOnce(&ArtifactSet) -> T,
    ) -> Result<T, StoreError> {
        let slot = self
            .slot
            .lock()
            .map_err(|e| StoreError::Io(format!("store mutex poisoned: {}", e)))?;
        match slot.as_ref() {
            Some(set) => Ok(f(set)),
            None => Err(StoreError::NotFound(artifact.to_string())),
        }
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn load_chunks(&self) -> Result<Vec<Chunk>, StoreError> {
        self.with_published("chunks", |set| set.chunks.clone())
    }

    async fn load_dense_index(&self) -> Result<DenseIndex, StoreError> {
        self.with_published("dense index", |set| set.dense.clone())
    }

    async fn load_sparse_index(&self) -> Result<SparseIndex, StoreError> {
        self.with_published("sparse index", |set| set.sparse.clone())
    }

    async fn load_summary(&self) -> Result<IndexSummary, StoreError> {
        self.with_published("summary", |set| set.summary.clone())
    }

    async fn publish(&self, artifacts: ArtifactSet) -> Result<(), StoreError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| StoreError::Io(format!("store mutex poisoned: {}", e)))?;
        *slot = Some(artifacts);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
