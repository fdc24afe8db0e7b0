//! Indexing pipeline and the index summary manifest.

mod pipeline;

pub use pipeline::IndexingPipeline;

use crate::config::ChunkerConfig;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Per-document entry in the index summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub source_id: String,
    pub title: String,
    pub chunk_count: usize,
}

/// Manifest describing a published artifact set.
///
/// The serving layer reads this to answer "what is indexed" without loading
/// the indices themselves, and the engine sanity-checks it against the
/// artifacts on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSummary {
    /// Build time, seconds since the Unix epoch
    pub created_at: u64,
    pub document_count: usize,
    pub chunk_count: usize,
    /// Model identifier the embeddings were produced with
    pub embedding_model: String,
    pub embedding_dimension: usize,
    /// Chunking parameters the corpus was built with
    pub chunking: ChunkerConfig,
    /// All distinct tags in the corpus, sorted
    pub tags: Vec<String>,
    /// One entry per indexed document, sorted by `source_id`
    pub documents: Vec<DocumentSummary>,
}

impl IndexSummary {
    /// Summary for an empty but valid index.
    pub fn empty(embedding_model: &str, embedding_dimension: usize, chunking: ChunkerConfig) -> Self {
        Self {
            created_at: unix_now(),
            document_count: 0,
            chunk_count: 0,
            embedding_model: embedding_model.to_string(),
            embedding_dimension,
            chunking,
            tags: Vec::new(),
            documents: Vec::new(),
        }
    }
}

/// Current time as seconds since the Unix epoch.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_has_zero_counts() {
        let summary = IndexSummary::empty("test-model", 8, ChunkerConfig::default());
        assert_eq!(summary.document_count, 0);
        assert_eq!(summary.chunk_count, 0);
        assert_eq!(summary.embedding_model, "test-model");
        assert!(summary.tags.is_empty());
    }

    #[test]
    fn summary_round_trips_through_json() {
        let summary = IndexSummary {
            created_at: 1_700_000_000,
            document_count: 2,
            chunk_count: 9,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_dimension: 384,
            chunking: ChunkerConfig::default(),
            tags: vec!["rust".to_string(), "search".to_string()],
            documents: vec![DocumentSummary {
                source_id: "a-post".to_string(),
                title: "A Post".to_string(),
                chunk_count: 4,
            }],
        };
        let json = serde_json::to_vec(&summary).unwrap();
        let restored: IndexSummary = serde_json::from_slice(&json).unwrap();
        assert_eq!(restored.chunk_count, 9);
        assert_eq!(restored.documents.len(), 1);
    }
}
