//! # Lodestone
//!
//! Retrieval core for long-form content: turns markdown documents into
//! retrievable chunks, builds sparse (BM25) and dense (vector) indices over
//! them, and serves hybrid queries fused with Reciprocal Rank Fusion.
//!
//! ## Modules
//!
//! - [`chunking`] - Markdown section chunking (H2/H3 hierarchy, sentence packing)
//! - [`search`] - Hybrid search (dense cosine + BM25 keyword + RRF fusion + rerank)
//! - [`indexing`] - Full-rebuild indexing pipeline and index summary manifest
//! - [`storage`] - Artifact store trait with filesystem and in-memory backends
//! - [`embedding`] - Embedding provider abstraction (the model lives elsewhere)
//! - [`config`] - Tuning defaults for chunking, fusion, and reranking
//! - [`error`] - Error types for embedding and pipeline operations
//!
//! The crate owns everything between raw document text and a ranked result
//! list. HTTP serving, markdown rendering, and the embedding model itself are
//! the caller's concern: the model is consumed through
//! [`embedding::EmbeddingProvider`].

pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexing;
pub mod search;
pub mod storage;
pub mod test_utils;
