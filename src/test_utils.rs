//! Deterministic embedding providers for tests.
//!
//! Real embedding models are the caller's concern; tests exercise the
//! retrieval machinery with providers whose output is cheap and fully
//! reproducible.

use crate::embedding::EmbeddingProvider;
use crate::error::EmbeddingError;
use async_trait::async_trait;
use std::collections::HashMap;

/// Bag-of-words hashing embedder.
///
/// Each whitespace token is hashed (FNV-1a, stable across platforms) into one
/// of `dimension` buckets and counted. Texts sharing words get similar
/// vectors, which is enough signal for ranking assertions without a model.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            vector[fnv1a(token) as usize % self.dimension] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_id(&self) -> &str {
        "hash-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100_0000_01b3);
    }
    hash
}

/// Embedder returning canned vectors keyed by exact text.
///
/// Lets a test pin the geometry of the dense space: which chunk is near
/// which query is decided by the fixture, not by hashing accidents. Unknown
/// texts get the fallback vector.
#[derive(Debug, Clone)]
pub struct FixtureEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl FixtureEmbedder {
    pub fn new(dimension: usize) -> Self {
        let mut fallback = vec![0.0; dimension];
        fallback[dimension - 1] = 1.0;
        Self {
            dimension,
            vectors: HashMap::new(),
            fallback,
        }
    }

    /// Registers the vector returned for an exact text.
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimension);
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for FixtureEmbedder {
    fn model_id(&self) -> &str {
        "fixture-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| self.fallback.clone()))
            .collect())
    }
}

/// Embedder that fails every call, for pipeline abort tests.
#[derive(Debug, Clone)]
pub struct FailingEmbedder {
    dimension: usize,
}

impl FailingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_id(&self) -> &str {
        "failing-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Provider("synthetic failure".to_string()))
    }
}
