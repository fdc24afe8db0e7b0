//! Hybrid search engine.
//!
//! Owns the loaded chunk corpus and both indices, and serves queries: the
//! dense and sparse legs each retrieve `2 * top_k` candidates in parallel,
//! weighted RRF merges them, and an optional lexical rerank pass reorders the
//! final list. Everything here is immutable after construction; `search`
//! takes `&self` and concurrent queries share one engine behind an `Arc`.

use crate::chunking::{Chunk, ChunkId};
use crate::config::SearchConfig;
use crate::embedding::{validate_batch_shape, EmbeddingProvider};
use crate::indexing::IndexSummary;
use crate::search::dense::DenseIndex;
use crate::search::fusion::fuse;
use crate::search::rerank::rerank;
use crate::search::sparse::{SparseIndex, SPARSE_SCHEMA_VERSION};
use crate::search::types::{validate_dimension, Provenance, SearchError, SearchResult};
use crate::storage::ArtifactStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Query engine over one published artifact set.
pub struct HybridSearchEngine {
    chunks: Vec<Chunk>,
    by_id: HashMap<ChunkId, usize>,
    dense: DenseIndex,
    sparse: SparseIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    config: SearchConfig,
    summary: IndexSummary,
}

impl std::fmt::Debug for HybridSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearchEngine").finish_non_exhaustive()
    }
}

impl HybridSearchEngine {
    /// Assembles an engine from loaded artifacts, verifying that they are
    /// mutually consistent and match the embedding provider.
    ///
    /// The provider's dimension must equal the index dimension; serving
    /// queries embedded by a different model would silently return garbage,
    /// so a mismatch is fatal here rather than detectable later.
    pub fn from_artifacts(
        chunks: Vec<Chunk>,
        dense: DenseIndex,
        sparse: SparseIndex,
        summary: IndexSummary,
        embedder: Arc<dyn EmbeddingProvider>,
        config: SearchConfig,
    ) -> Result<Self, SearchError> {
        validate_config(&config)?;
        validate_dimension(dense.dimension(), embedder.dimension())?;

        if sparse.schema_version != SPARSE_SCHEMA_VERSION {
            return Err(SearchError::CorruptArtifact(format!(
                "sparse index schema version {} (supported: {})",
                sparse.schema_version, SPARSE_SCHEMA_VERSION
            )));
        }
        if dense.len() != chunks.len() || sparse.doc_count() != chunks.len() {
            return Err(SearchError::CorruptArtifact(format!(
                "{} chunks but {} dense rows and {} sparse documents",
                chunks.len(),
                dense.len(),
                sparse.doc_count()
            )));
        }

        let mut by_id = HashMap::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            if by_id.insert(chunk.id.clone(), i).is_some() {
                return Err(SearchError::CorruptArtifact(format!(
                    "duplicate chunk id {}",
                    chunk.id
                )));
            }
        }

        info!(
            chunk_count = chunks.len(),
            dimension = dense.dimension(),
            model = embedder.model_id(),
            "search engine ready"
        );

        Ok(Self {
            chunks,
            by_id,
            dense,
            sparse,
            embedder,
            config,
            summary,
        })
    }

    /// Loads the published artifact set from a store and assembles an engine.
    pub async fn load<S: ArtifactStore + ?Sized>(
        store: &S,
        embedder: Arc<dyn EmbeddingProvider>,
        config: SearchConfig,
    ) -> Result<Self, SearchError> {
        let chunks = store.load_chunks().await?;
        let dense = store.load_dense_index().await?;
        let sparse = store.load_sparse_index().await?;
        let summary = store.load_summary().await?;
        Self::from_artifacts(chunks, dense, sparse, summary, embedder, config)
    }

    /// Manifest of the loaded artifact set.
    pub fn summary(&self) -> &IndexSummary {
        &self.summary
    }

    /// Number of chunks in the loaded corpus.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True when the corpus is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Runs one hybrid query.
    ///
    /// Both retrieval legs fetch `2 * top_k` candidates concurrently, RRF
    /// fuses them, and when `apply_rerank` is set the lexical rerank pass
    /// reorders the fused list. An empty query, `top_k == 0`, an empty
    /// corpus, or a tag filter matching nothing all return an empty list;
    /// having no results is an answer, not a failure.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        tag_filter: Option<&[String]>,
        apply_rerank: bool,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() || top_k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }
        // An empty filter list means "no filter", not "match nothing".
        let tag_filter = tag_filter.filter(|tags| !tags.is_empty());

        let fetch = top_k * 2;
        let (dense_leg, sparse_leg) = tokio::join!(
            self.dense_leg(query, fetch, tag_filter),
            async { self.sparse_leg(query, fetch, tag_filter) },
        );
        let dense_leg = dense_leg?;
        debug!(
            dense = dense_leg.len(),
            sparse = sparse_leg.len(),
            "retrieval legs complete"
        );

        let dense_ids: Vec<ChunkId> = dense_leg.iter().map(|(id, _)| id.clone()).collect();
        let sparse_ids: Vec<ChunkId> = sparse_leg.iter().map(|(id, _)| id.clone()).collect();
        let dense_scores: HashMap<ChunkId, f32> = dense_leg.into_iter().collect();
        let sparse_scores: HashMap<ChunkId, f32> = sparse_leg.into_iter().collect();

        let mut fused = fuse(&dense_ids, &sparse_ids, self.config.alpha, self.config.rrf_k);
        fused.truncate(top_k);

        let mut results: Vec<SearchResult> = fused
            .into_iter()
            .filter_map(|candidate| {
                let index = *self.by_id.get(&candidate.chunk_id)?;
                let chunk = &self.chunks[index];
                let provenance = match (candidate.dense, candidate.sparse) {
                    (true, true) => Provenance::Hybrid,
                    (true, false) => Provenance::Dense,
                    _ => Provenance::Sparse,
                };
                Some(SearchResult {
                    chunk_id: candidate.chunk_id.clone(),
                    score: candidate.score,
                    dense_score: dense_scores.get(&candidate.chunk_id).copied(),
                    sparse_score: sparse_scores.get(&candidate.chunk_id).copied(),
                    provenance,
                    text: chunk.text.clone(),
                    source_id: chunk.source_id.clone(),
                    source_title: chunk.source_title.clone(),
                    section_path: chunk.section_path.clone(),
                    tags: chunk.tags.clone(),
                    url: format!("/{}{}", chunk.source_id, chunk.url_fragment),
                })
            })
            .collect();

        if apply_rerank && !results.is_empty() {
            rerank(query, &mut results, self.config.rerank, top_k);
        }

        Ok(results)
    }

    /// Dense leg: embed the query, then score against the vector index.
    async fn dense_leg(
        &self,
        query: &str,
        fetch: usize,
        tag_filter: Option<&[String]>,
    ) -> Result<Vec<(ChunkId, f32)>, SearchError> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        validate_batch_shape(1, vectors.len())?;
        let query_vector = &vectors[0];
        self.dense.search(query_vector, fetch, tag_filter)
    }

    /// Sparse leg: BM25 over the corpus, tag filter applied to the ranked
    /// list. Over-fetches so the filter does not starve the leg.
    fn sparse_leg(
        &self,
        query: &str,
        fetch: usize,
        tag_filter: Option<&[String]>,
    ) -> Vec<(ChunkId, f32)> {
        let ranked = self.sparse.search(query, fetch * 2);
        let mut out = Vec::new();
        for (doc_index, score) in ranked {
            let chunk = &self.chunks[doc_index];
            if let Some(wanted) = tag_filter {
                if !wanted.iter().any(|t| chunk.tags.contains(t)) {
                    continue;
                }
            }
            out.push((chunk.id.clone(), score));
            if out.len() >= fetch {
                break;
            }
        }
        out
    }
}

fn validate_config(config: &SearchConfig) -> Result<(), SearchError> {
    if !(0.0..=1.0).contains(&config.alpha) {
        return Err(SearchError::InvalidConfig(format!(
            "alpha must be in [0, 1], got {}",
            config.alpha
        )));
    }
    if config.rrf_k <= 0.0 {
        return Err(SearchError::InvalidConfig(format!(
            "rrf_k must be positive, got {}",
            config.rrf_k
        )));
    }
    Ok(())
}
