//! Filesystem artifact store.
//!
//! Every publish writes a complete artifact set into its own `set-<stamp>/`
//! directory, then repoints the `current` symlink at it by renaming a fresh
//! link over the old one. The rename is atomic, so there is never a moment
//! without a readable published set: a crash mid-publish leaves the link on
//! the prior set, and each load resolves the link once and reads all of its
//! files from that resolved directory. The prior set directory is kept until
//! the next publish so a reader that resolved the link just before a swap
//! still finds every file.

use super::{ArtifactSet, ArtifactStore, StoreError};
use crate::chunking::Chunk;
use crate::indexing::IndexSummary;
use crate::search::dense::{DenseIndex, DenseIndexMeta};
use crate::search::sparse::SparseIndex;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

const CURRENT_LINK: &str = "current";
const SET_PREFIX: &str = "set-";

const CHUNKS_FILE: &str = "chunks.json";
const EMBEDDINGS_FILE: &str = "embeddings.bin";
const DENSE_META_FILE: &str = "dense_meta.json";
const SPARSE_FILE: &str = "sparse_index.json";
const SUMMARY_FILE: &str = "index_summary.json";

/// Artifact store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    data_dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn current_link(&self) -> PathBuf {
        self.data_dir.join(CURRENT_LINK)
    }

    /// Resolves the `current` link to the set directory it points at.
    async fn resolve_current(&self) -> Result<PathBuf, StoreError> {
        let link = self.current_link();
        match fs::read_link(&link).await {
            Ok(target) => Ok(self.data_dir.join(target)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(link.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_set_file(set_dir: &Path, file: &str) -> Result<Vec<u8>, StoreError> {
        let path = set_dir.join(file);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: serde::Serialize>(
        dir: &Path,
        file: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        fs::write(dir.join(file), bytes).await?;
        Ok(())
    }

    async fn write_set(set_dir: &Path, artifacts: &ArtifactSet) -> Result<(), StoreError> {
        let (embedding_bytes, dense_meta) = artifacts.dense.to_artifact_parts();
        Self::write_json(set_dir, CHUNKS_FILE, &artifacts.chunks).await?;
        fs::write(set_dir.join(EMBEDDINGS_FILE), &embedding_bytes).await?;
        Self::write_json(set_dir, DENSE_META_FILE, &dense_meta).await?;
        Self::write_json(set_dir, SPARSE_FILE, &artifacts.sparse).await?;
        Self::write_json(set_dir, SUMMARY_FILE, &artifacts.summary).await?;
        Ok(())
    }

    /// Best-effort removal of set directories not in `keep`.
    async fn prune_stale_sets(&self, keep: &[OsString]) {
        let Ok(mut entries) = fs::read_dir(&self.data_dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let is_set = name.to_string_lossy().starts_with(SET_PREFIX);
            if is_set && !keep.contains(&name) {
                let _ = fs::remove_dir_all(entry.path()).await;
            }
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn load_chunks(&self) -> Result<Vec<Chunk>, StoreError> {
        let set_dir = self.resolve_current().await?;
        let bytes = Self::read_set_file(&set_dir, CHUNKS_FILE).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn load_dense_index(&self) -> Result<DenseIndex, StoreError> {
        // Resolve once so both files come from the same set even when a
        // publish lands between the two reads.
        let set_dir = self.resolve_current().await?;
        let bytes = Self::read_set_file(&set_dir, EMBEDDINGS_FILE).await?;
        let meta_bytes = Self::read_set_file(&set_dir, DENSE_META_FILE).await?;
        let meta: DenseIndexMeta = serde_json::from_slice(&meta_bytes)?;
        DenseIndex::from_artifact_parts(&bytes, meta)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn load_sparse_index(&self) -> Result<SparseIndex, StoreError> {
        let set_dir = self.resolve_current().await?;
        let bytes = Self::read_set_file(&set_dir, SPARSE_FILE).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn load_summary(&self) -> Result<IndexSummary, StoreError> {
        let set_dir = self.resolve_current().await?;
        let bytes = Self::read_set_file(&set_dir, SUMMARY_FILE).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn publish(&self, artifacts: ArtifactSet) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir).await?;

        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let set_name = format!("{}{}", SET_PREFIX, stamp);
        let set_dir = self.data_dir.join(&set_name);
        fs::create_dir_all(&set_dir).await?;
        if let Err(e) = Self::write_set(&set_dir, &artifacts).await {
            let _ = fs::remove_dir_all(&set_dir).await;
            return Err(e);
        }

        let prior = fs::read_link(self.current_link()).await.ok();

        // Swap the pointer: create a fresh link to the new set, then rename
        // it over `current`. The rename replaces the old link atomically, so
        // the pointer always resolves to a complete set.
        let tmp_link = self.data_dir.join(format!(".current-{}", stamp));
        if let Err(e) = fs::symlink(&set_name, &tmp_link).await {
            let _ = fs::remove_dir_all(&set_dir).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp_link, self.current_link()).await {
            let _ = fs::remove_file(&tmp_link).await;
            let _ = fs::remove_dir_all(&set_dir).await;
            return Err(e.into());
        }

        // Keep the prior set for readers mid-load; drop anything older.
        let mut keep = vec![OsString::from(&set_name)];
        if let Some(prior) = prior {
            keep.push(prior.into_os_string());
        }
        self.prune_stale_sets(&keep).await;

        info!(
            chunk_count = artifacts.summary.chunk_count,
            set = %set_name,
            "published artifact set"
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkId;
    use crate::config::ChunkerConfig;
    use tempfile::TempDir;

    fn sample_set() -> ArtifactSet {
        let chunk = Chunk {
            id: ChunkId::derive("post", 0, "Some text about search."),
            text: "Some text about search.".to_string(),
            source_id: "post".to_string(),
            source_title: "Post".to_string(),
            section_path: None,
            tags: vec!["search".to_string()],
            url_fragment: String::new(),
            position: 0,
            token_count: 5,
            date: "1700000000".to_string(),
        };
        let mut dense = DenseIndex::new(4).unwrap();
        dense
            .add(chunk.id.clone(), &[0.1, 0.2, 0.3, 0.4], chunk.tags.clone())
            .unwrap();
        let sparse = SparseIndex::fit(&[chunk.text.clone()]);
        let mut summary = IndexSummary::empty("test", 4, ChunkerConfig::default());
        summary.chunk_count = 1;
        summary.document_count = 1;
        ArtifactSet {
            chunks: vec![chunk],
            dense,
            sparse,
            summary,
        }
    }

    async fn set_dirs(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(SET_PREFIX) {
                names.push(name);
            }
        }
        names.sort();
        names
    }

    #[tokio::test]
    async fn loads_fail_before_first_publish() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf());
        assert!(matches!(store.load_chunks().await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn publish_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf());
        store.publish(sample_set()).await.unwrap();

        let chunks = store.load_chunks().await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source_id, "post");

        let dense = store.load_dense_index().await.unwrap();
        assert_eq!(dense.dimension(), 4);
        assert_eq!(dense.len(), 1);

        let sparse = store.load_sparse_index().await.unwrap();
        assert_eq!(sparse.doc_count(), 1);

        let summary = store.load_summary().await.unwrap();
        assert_eq!(summary.chunk_count, 1);
    }

    #[tokio::test]
    async fn current_is_a_symlink_into_a_set_directory() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf());
        store.publish(sample_set()).await.unwrap();

        let link = dir.path().join(CURRENT_LINK);
        let meta = fs::symlink_metadata(&link).await.unwrap();
        assert!(meta.file_type().is_symlink());

        let target = fs::read_link(&link).await.unwrap();
        assert!(target.to_string_lossy().starts_with(SET_PREFIX));
    }

    #[tokio::test]
    async fn prior_set_stays_intact_across_a_republish() {
        // A reader that resolved the link right before a swap must still
        // find a complete set behind its resolved path.
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf());
        store.publish(sample_set()).await.unwrap();
        let prior_target = fs::read_link(dir.path().join(CURRENT_LINK)).await.unwrap();

        let mut next = sample_set();
        next.summary.embedding_model = "next-model".to_string();
        store.publish(next).await.unwrap();

        let prior_dir = dir.path().join(&prior_target);
        for file in [CHUNKS_FILE, EMBEDDINGS_FILE, DENSE_META_FILE, SPARSE_FILE, SUMMARY_FILE] {
            assert!(
                fs::metadata(prior_dir.join(file)).await.is_ok(),
                "prior set lost {}",
                file
            );
        }

        // The pointer itself now serves the new set.
        assert_eq!(store.load_summary().await.unwrap().embedding_model, "next-model");
    }

    #[tokio::test]
    async fn republish_prunes_sets_older_than_the_prior_one() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf());

        for model in ["m1", "m2", "m3"] {
            let mut set = sample_set();
            set.summary.embedding_model = model.to_string();
            store.publish(set).await.unwrap();
        }

        assert_eq!(store.load_summary().await.unwrap().embedding_model, "m3");
        // Only the current and prior sets remain, no temp links.
        assert_eq!(set_dirs(dir.path()).await.len(), 2);
        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            assert!(
                name == CURRENT_LINK || name.starts_with(SET_PREFIX),
                "unexpected leftover {}",
                name
            );
        }
    }

    #[tokio::test]
    async fn artifact_files_have_the_documented_names() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf());
        store.publish(sample_set()).await.unwrap();

        for file in [CHUNKS_FILE, EMBEDDINGS_FILE, DENSE_META_FILE, SPARSE_FILE, SUMMARY_FILE] {
            let path = dir.path().join(CURRENT_LINK).join(file);
            assert!(fs::metadata(&path).await.is_ok(), "missing {}", file);
        }
    }

    #[tokio::test]
    async fn health_check_creates_the_data_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested").join("data");
        let store = FsArtifactStore::new(nested.clone());
        store.health_check().await.unwrap();
        assert!(fs::metadata(&nested).await.is_ok());
    }
}
