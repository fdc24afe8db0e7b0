//! BM25 keyword index.
//!
//! The sparse half of hybrid search. Built once over the chunk corpus at
//! indexing time and persisted as versioned JSON; query-time scoring is a
//! linear scan over per-document term frequencies, which is plenty for a
//! corpus of blog-sized documents.
//!
//! Tokenization is intentionally simple: lowercase, word characters only,
//! a fixed English stopword list, and tokens of three or more characters.
//! The same tokenizer runs at fit and query time; mixing tokenizers would
//! silently break term matching.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;
use tracing::info;

/// Schema version written into persisted sparse indices. Bump on any change
/// to tokenization or the serialized layout; readers reject other versions.
pub const SPARSE_SCHEMA_VERSION: u32 = 1;

/// Term frequency saturation parameter.
pub const BM25_K1: f32 = 1.5;

/// Document length normalization parameter.
pub const BM25_B: f32 = 0.75;

static STOPWORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();

fn stopwords() -> &'static HashSet<&'static str> {
    STOPWORDS.get_or_init(|| {
        [
            "the", "is", "at", "which", "on", "and", "a", "an", "as", "are", "was", "were", "be",
            "have", "has", "had", "do", "does", "did", "will", "would", "could", "should", "may",
            "might", "must", "can", "this", "that", "these", "those", "i", "you", "he", "she",
            "it", "we", "they", "what", "who", "when", "where", "why", "how", "all", "each",
            "every", "both", "few", "more", "most", "other", "some", "such", "only", "own",
            "same", "so", "than", "too", "very", "just", "in", "of", "to", "for", "with", "by",
            "from", "about",
        ]
        .into_iter()
        .collect()
    })
}

/// Lowercases, splits on word boundaries, and drops stopwords and tokens
/// shorter than three characters.
fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in lower.chars() {
        if c.is_alphanumeric() || c == '_' {
            current.push(c);
        } else if !current.is_empty() {
            push_token(&mut tokens, std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        push_token(&mut tokens, current);
    }

    tokens
}

fn push_token(tokens: &mut Vec<String>, token: String) {
    if token.chars().count() > 2 && !stopwords().contains(token.as_str()) {
        tokens.push(token);
    }
}

/// BM25 index over a chunk corpus.
///
/// Document indices refer to positions in the corpus the index was fit on;
/// the caller maps them back to chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseIndex {
    /// Serialized layout version, checked on load
    pub schema_version: u32,
    k1: f32,
    b: f32,
    doc_lengths: Vec<u32>,
    avgdl: f32,
    doc_term_freqs: Vec<HashMap<String, u32>>,
    idf: HashMap<String, f32>,
    doc_count: usize,
    vocabulary: BTreeSet<String>,
}

impl SparseIndex {
    /// Builds the index over a corpus, computing per-document term
    /// frequencies, document frequencies, and IDF for every term.
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let doc_count = documents.len();
        let mut doc_lengths = Vec::with_capacity(doc_count);
        let mut doc_term_freqs = Vec::with_capacity(doc_count);
        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        let mut vocabulary = BTreeSet::new();

        for doc in documents {
            let tokens = tokenize(doc.as_ref());
            doc_lengths.push(tokens.len() as u32);

            let mut term_freq: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *term_freq.entry(token).or_insert(0) += 1;
            }
            for term in term_freq.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
                vocabulary.insert(term.clone());
            }
            doc_term_freqs.push(term_freq);
        }

        let avgdl = if doc_lengths.is_empty() {
            0.0
        } else {
            doc_lengths.iter().sum::<u32>() as f32 / doc_lengths.len() as f32
        };

        let idf = doc_freq
            .into_iter()
            .map(|(term, df)| (term, idf_value(df, doc_count)))
            .collect();

        info!(
            doc_count,
            vocabulary_size = vocabulary.len(),
            avgdl,
            "fit sparse index"
        );

        Self {
            schema_version: SPARSE_SCHEMA_VERSION,
            k1: BM25_K1,
            b: BM25_B,
            doc_lengths,
            avgdl,
            doc_term_freqs,
            idf,
            doc_count,
            vocabulary,
        }
    }

    /// Number of documents the index was fit on.
    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    /// Number of distinct indexed terms.
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// BM25 score of `query` against one document. Zero when no query term
    /// appears in the document.
    pub fn score(&self, query: &str, doc_index: usize) -> f32 {
        let query_tokens = tokenize(query);
        self.score_tokens(&query_tokens, doc_index)
    }

    fn score_tokens(&self, query_tokens: &[String], doc_index: usize) -> f32 {
        let doc_len = self.doc_lengths[doc_index] as f32;
        let term_freqs = &self.doc_term_freqs[doc_index];

        let mut score = 0.0;
        for token in query_tokens {
            let Some(&idf) = self.idf.get(token) else {
                continue;
            };
            let Some(&freq) = term_freqs.get(token) else {
                continue;
            };
            let freq = freq as f32;
            let numerator = freq * (self.k1 + 1.0);
            let denominator = freq + self.k1 * (1.0 - self.b + self.b * doc_len / self.avgdl);
            score += idf * numerator / denominator;
        }
        score
    }

    /// Returns up to `top_k` documents with positive BM25 score, best first.
    ///
    /// Scoring walks the corpus in document order and the sort is stable, so
    /// ties keep corpus order and identical queries return identical lists.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(usize, f32)> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = (0..self.doc_count)
            .filter_map(|i| {
                let score = self.score_tokens(&query_tokens, i);
                (score > 0.0).then_some((i, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

/// Robertson-Sparck Jones IDF with the +1 shift that keeps values positive
/// even for terms appearing in most documents.
fn idf_value(doc_freq: u32, total_docs: usize) -> f32 {
    let df = doc_freq as f32;
    let n = total_docs as f32;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}
