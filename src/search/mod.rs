//! Hybrid search: dense cosine retrieval, BM25 keyword retrieval, weighted
//! RRF fusion, and an optional lexical rerank pass.

pub mod dense;
pub mod engine;
pub mod fusion;
pub mod rerank;
pub mod sparse;
pub mod types;

pub use dense::{DenseIndex, DenseIndexMeta};
pub use engine::HybridSearchEngine;
pub use rerank::RerankWeights;
pub use sparse::SparseIndex;
pub use types::{Provenance, SearchError, SearchResult};
