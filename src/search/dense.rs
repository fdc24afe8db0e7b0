//! Dense vector index.
//!
//! A flat row-major matrix of embeddings searched by exact scan. Every vector
//! is L2-normalized on insert and queries are normalized on entry, so cosine
//! similarity reduces to a dot product. At blog-corpus scale the exact scan is
//! both simpler and faster to load than an approximate structure, and it never
//! misses a neighbor.
//!
//! Tag filtering happens before scoring: rows whose tag set misses the filter
//! are skipped entirely, so `top_k` counts only eligible rows.

use crate::chunking::ChunkId;
use crate::search::types::{validate_dimension, SearchError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-row metadata kept alongside the embedding matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMetadata {
    /// Topic labels of the chunk, matched by the query-time tag filter
    pub tags: Vec<String>,
}

/// Sidecar metadata persisted next to the raw embedding bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseIndexMeta {
    /// Embedding dimension of every row
    pub dimension: usize,
    /// Chunk id per row, in insert order
    pub chunk_ids: Vec<ChunkId>,
    /// Row metadata, parallel to `chunk_ids`
    pub metadata: Vec<RowMetadata>,
}

/// Exact-scan cosine similarity index.
#[derive(Debug, Clone)]
pub struct DenseIndex {
    dimension: usize,
    /// Row-major, L2-normalized, `len = rows * dimension`
    data: Vec<f32>,
    chunk_ids: Vec<ChunkId>,
    metadata: Vec<RowMetadata>,
}

impl DenseIndex {
    /// Creates an empty index for vectors of the given dimension.
    pub fn new(dimension: usize) -> Result<Self, SearchError> {
        if dimension == 0 {
            return Err(SearchError::InvalidConfig(
                "embedding dimension must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
            chunk_ids: Vec::new(),
            metadata: Vec::new(),
        })
    }

    /// Embedding dimension of every row.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.chunk_ids.len()
    }

    /// True when no vectors have been added.
    pub fn is_empty(&self) -> bool {
        self.chunk_ids.is_empty()
    }

    /// Appends one vector. The stored copy is L2-normalized.
    ///
    /// Returns [`SearchError::DimensionMismatch`] when the vector's length
    /// differs from the index dimension.
    pub fn add(
        &mut self,
        chunk_id: ChunkId,
        vector: &[f32],
        tags: Vec<String>,
    ) -> Result<(), SearchError> {
        validate_dimension(self.dimension, vector.len())?;

        let start = self.data.len();
        self.data.extend_from_slice(vector);
        normalize(&mut self.data[start..]);

        self.chunk_ids.push(chunk_id);
        self.metadata.push(RowMetadata { tags });
        Ok(())
    }

    /// Returns up to `top_k` most similar rows, best first.
    ///
    /// When `tag_filter` is given, only rows sharing at least one tag with the
    /// filter are scored. There is no similarity floor; low-similarity rows
    /// still rank when nothing better exists. Ties keep insert order.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        tag_filter: Option<&[String]>,
    ) -> Result<Vec<(ChunkId, f32)>, SearchError> {
        validate_dimension(self.dimension, query.len())?;
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .filter(|&row| match tag_filter {
                Some(wanted) => {
                    let tags = &self.metadata[row].tags;
                    wanted.iter().any(|t| tags.contains(t))
                }
                None => true,
            })
            .map(|row| {
                let offset = row * self.dimension;
                let stored = &self.data[offset..offset + self.dimension];
                (row, dot(&query, stored))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        debug!(candidates = scored.len(), top_k, "dense search");
        Ok(scored
            .into_iter()
            .map(|(row, score)| (self.chunk_ids[row].clone(), score))
            .collect())
    }

    /// Splits the index into raw little-endian f32 bytes plus sidecar
    /// metadata, the shape the artifact store persists.
    pub fn to_artifact_parts(&self) -> (Vec<u8>, DenseIndexMeta) {
        let mut bytes = Vec::with_capacity(self.data.len() * 4);
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let meta = DenseIndexMeta {
            dimension: self.dimension,
            chunk_ids: self.chunk_ids.clone(),
            metadata: self.metadata.clone(),
        };
        (bytes, meta)
    }

    /// Reassembles an index from persisted parts, verifying that the byte
    /// length, dimension, and row counts are mutually consistent.
    pub fn from_artifact_parts(bytes: &[u8], meta: DenseIndexMeta) -> Result<Self, SearchError> {
        if meta.dimension == 0 {
            return Err(SearchError::CorruptArtifact(
                "embedding dimension is zero".to_string(),
            ));
        }
        if bytes.len() % 4 != 0 {
            return Err(SearchError::CorruptArtifact(format!(
                "embedding byte length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let float_count = bytes.len() / 4;
        if float_count % meta.dimension != 0 {
            return Err(SearchError::CorruptArtifact(format!(
                "{} floats do not divide into rows of dimension {}",
                float_count, meta.dimension
            )));
        }
        let rows = float_count / meta.dimension;
        if rows != meta.chunk_ids.len() || rows != meta.metadata.len() {
            return Err(SearchError::CorruptArtifact(format!(
                "{} embedding rows but {} chunk ids and {} metadata rows",
                rows,
                meta.chunk_ids.len(),
                meta.metadata.len()
            )));
        }

        let data = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self {
            dimension: meta.dimension,
            data,
            chunk_ids: meta.chunk_ids,
            metadata: meta.metadata,
        })
    }
}

/// L2-normalizes a vector in place. Zero vectors are left untouched rather
/// than divided by zero.
fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
