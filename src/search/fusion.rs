//! Weighted Reciprocal Rank Fusion.
//!
//! Merges the dense and sparse candidate lists on rank alone. RRF needs no
//! score calibration between the two legs, which matters because cosine
//! similarities and BM25 scores live on incomparable scales. Each appearance
//! contributes `weight / (k + rank + 1)` with 0-based ranks; the dense list
//! carries weight `alpha` and the sparse list `1 - alpha`.

use crate::chunking::ChunkId;
use std::collections::HashMap;

/// A chunk after fusion, with flags recording which legs surfaced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub chunk_id: ChunkId,
    /// Accumulated RRF score
    pub score: f32,
    /// Present in the dense candidate list
    pub dense: bool,
    /// Present in the sparse candidate list
    pub sparse: bool,
}

/// Fuses two ranked id lists into one, best first.
///
/// Ties keep first-seen order (dense list first, then sparse), and the sort
/// is stable, so fusion output is deterministic for identical inputs.
pub fn fuse(
    dense: &[ChunkId],
    sparse: &[ChunkId],
    alpha: f32,
    rrf_k: f32,
) -> Vec<FusedCandidate> {
    let mut by_id: HashMap<ChunkId, usize> = HashMap::new();
    let mut candidates: Vec<FusedCandidate> = Vec::new();

    let mut accumulate = |chunk_id: &ChunkId, rank: usize, weight: f32, is_dense: bool| {
        let contribution = weight / (rrf_k + rank as f32 + 1.0);
        let slot = *by_id.entry(chunk_id.clone()).or_insert_with(|| {
            candidates.push(FusedCandidate {
                chunk_id: chunk_id.clone(),
                score: 0.0,
                dense: false,
                sparse: false,
            });
            candidates.len() - 1
        });
        let candidate = &mut candidates[slot];
        candidate.score += contribution;
        if is_dense {
            candidate.dense = true;
        } else {
            candidate.sparse = true;
        }
    };

    for (rank, chunk_id) in dense.iter().enumerate() {
        accumulate(chunk_id, rank, alpha, true);
    }
    for (rank, chunk_id) in sparse.iter().enumerate() {
        accumulate(chunk_id, rank, 1.0 - alpha, false);
    }

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    candidates
}
