//! Lexical-overlap rerank pass.
//!
//! A lightweight second-stage scorer over the fused candidate list. Each
//! result's score becomes a weighted blend of its fused RRF score and the
//! fraction of query terms appearing in its text, document title, and section
//! path. Tokenization here is deliberately naive (lowercase whitespace split,
//! no stopwords); this is a tie-breaking nudge toward lexically on-topic
//! results, not a retrieval stage of its own.

use crate::search::types::SearchResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Weight split for the rerank blend. The four weights sum to 1.0 at the
/// defaults but are not required to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankWeights {
    /// Weight on the fused RRF score
    pub fused: f32,
    /// Weight on query-term overlap with the chunk text
    pub text: f32,
    /// Weight on query-term overlap with the document title
    pub title: f32,
    /// Weight on query-term overlap with the section path
    pub section: f32,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            fused: 0.4,
            text: 0.3,
            title: 0.2,
            section: 0.1,
        }
    }
}

/// Rescores `results` in place and re-sorts best first, truncating to
/// `top_k`.
///
/// A query with no whitespace-delimited terms leaves scores untouched. The
/// sort is stable, so equal rerank scores keep their fused order.
pub fn rerank(query: &str, results: &mut Vec<SearchResult>, weights: RerankWeights, top_k: usize) {
    let lowered = query.to_lowercase();
    let query_terms: HashSet<&str> = lowered.split_whitespace().collect();

    if !query_terms.is_empty() {
        for result in results.iter_mut() {
            let text_overlap = overlap(&query_terms, &result.text);
            let title_overlap = overlap(&query_terms, &result.source_title);
            let section_overlap = result
                .section_path
                .as_deref()
                .map(|path| overlap(&query_terms, path))
                .unwrap_or(0.0);

            result.score = result.score * weights.fused
                + text_overlap * weights.text
                + title_overlap * weights.title
                + section_overlap * weights.section;
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    }

    results.truncate(top_k);
}

/// Fraction of query terms present in `field` under lowercase whitespace
/// tokenization.
fn overlap(query_terms: &HashSet<&str>, field: &str) -> f32 {
    let lowered = field.to_lowercase();
    let field_terms: HashSet<&str> = lowered.split_whitespace().collect();
    let shared = query_terms.intersection(&field_terms).count();
    shared as f32 / query_terms.len() as f32
}
