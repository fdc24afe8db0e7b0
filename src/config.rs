//! Tuning defaults for chunking, fusion, and reranking.
//!
//! All values here are configurable defaults rather than hardcoded law: the
//! RRF constant and the rerank weight split in particular are empirical and
//! callers may override them on [`SearchConfig`].

use crate::search::rerank::RerankWeights;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Maximum estimated tokens per chunk.
///
/// Sections above this budget are split at sentence boundaries. The estimate
/// uses [`CHARS_PER_TOKEN_ESTIMATE`], not a real tokenizer.
pub const MAX_CHUNK_TOKENS: usize = 512;

/// Trailing sentence overlap carried into the next chunk, in estimated tokens.
pub const OVERLAP_TOKENS: usize = 50;

/// Approximate characters per token for English prose.
pub const CHARS_PER_TOKEN_ESTIMATE: usize = 4;

/// Default weight placed on the dense (semantic) leg during fusion.
pub const DEFAULT_ALPHA: f32 = 0.7;

/// Standard RRF k parameter from the original RRF paper (Cormack, Clarke,
/// and Buettcher, SIGIR 2009). Larger values flatten the rank curve.
pub const RRF_K: f32 = 60.0;

/// Default number of chunk texts sent to the embedding provider per batch.
pub const EMBEDDING_BATCH_SIZE: usize = 32;

/// Default cap on concurrently in-flight embedding batches.
pub const MAX_IN_FLIGHT_BATCHES: usize = 4;

/// Chunking parameters. Recorded in the index summary so a rebuild with
/// different settings is visible to the serving layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum estimated tokens per chunk
    pub max_tokens: usize,
    /// Sentence overlap budget between adjacent chunks, in estimated tokens
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: MAX_CHUNK_TOKENS,
            overlap_tokens: OVERLAP_TOKENS,
        }
    }
}

/// Query-time fusion and rerank parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Relative trust in semantic vs keyword matching: the dense list is
    /// weighted `alpha`, the sparse list `1 - alpha`.
    pub alpha: f32,
    /// RRF rank-discount constant
    pub rrf_k: f32,
    /// Weight split for the optional lexical-overlap rerank pass
    pub rerank: RerankWeights,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            rrf_k: RRF_K,
            rerank: RerankWeights::default(),
        }
    }
}

/// Full configuration for an indexing run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrievalConfig {
    /// Chunking parameters
    pub chunker: ChunkerConfig,
    /// Query-time parameters (persisted alongside for the serving layer)
    pub search: SearchConfig,
    /// Embedding batch parameters
    pub embedding: EmbeddingBatchConfig,
}

/// Batching parameters for the embedding step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingBatchConfig {
    /// Texts per request to the provider
    pub batch_size: usize,
    /// Maximum concurrently in-flight batches
    pub max_in_flight: usize,
}

impl Default for EmbeddingBatchConfig {
    fn default() -> Self {
        Self {
            batch_size: EMBEDDING_BATCH_SIZE,
            max_in_flight: MAX_IN_FLIGHT_BATCHES,
        }
    }
}

/// Artifact store selection.
///
/// The store is a strategy chosen by configuration, not a compile-time
/// decision: see [`crate::storage::create_store`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Ephemeral single-slot store, used for tests and previews
    Memory,
    /// Filesystem store with atomic directory swap on publish
    Filesystem {
        /// Root directory holding the `current/` artifact set
        data_dir: PathBuf,
    },
}
