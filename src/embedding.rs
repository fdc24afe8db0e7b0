//! Embedding provider abstraction.
//!
//! The core never runs a model itself. Vectorization is an external
//! capability consumed through [`EmbeddingProvider`]: the pipeline sends
//! chunk texts in fixed-size batches, the engine sends single queries.
//! Implementations may be local inference or a remote API, but must be
//! deterministic for identical input at a given model version, because chunk
//! ids and their embeddings are persisted together and reloaded wholesale.

use crate::error::EmbeddingError;
use async_trait::async_trait;

/// Batched text-to-vector provider.
///
/// # Contract
///
/// - `embed` returns exactly one vector per input text, in input order.
/// - Every vector has length [`dimension`](EmbeddingProvider::dimension),
///   fixed for the life of the provider.
/// - Identical input yields identical output at a given model version.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier recorded in the index summary
    /// (e.g. "all-MiniLM-L6-v2").
    fn model_id(&self) -> &str;

    /// Output vector dimension.
    fn dimension(&self) -> usize;

    /// Embeds a batch of texts, preserving input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Checks that a provider honored the one-vector-per-text contract.
pub(crate) fn validate_batch_shape(
    expected: usize,
    actual: usize,
) -> Result<(), EmbeddingError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EmbeddingError::BatchShape { expected, actual })
    }
}
