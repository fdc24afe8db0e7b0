//! Core document and chunk types.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of leading characters of chunk text mixed into the id hash.
const ID_PREFIX_CHARS: usize = 50;

/// Stable chunk identifier.
///
/// Deterministic function of (source document id, position, content prefix):
/// the first 16 hex characters of a SHA-256 over
/// `"{source_id}:{position}:{prefix}"`. The same input always yields the
/// same id, which makes ids the join key across the sparse and dense indices
/// and keeps persisted artifacts stable across rebuilds of unchanged content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    /// Derives the id for a chunk from its identity-bearing parts.
    pub fn derive(source_id: &str, position: usize, text: &str) -> Self {
        let prefix: String = text.chars().take(ID_PREFIX_CHARS).collect();
        let digest = Sha256::digest(format!("{}:{}:{}", source_id, position, prefix).as_bytes());
        let hex = format!("{:x}", digest);
        Self(hex[..16].to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A retrievable unit of text derived from one document section.
///
/// Invariants: every chunk belongs to exactly one source document,
/// `position` is unique within a document, and `id` is unique within the
/// whole corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier, the join key across both indices
    pub id: ChunkId,
    /// UTF-8 content, non-empty after trimming
    pub text: String,
    /// Slug of the parent document
    pub source_id: String,
    /// Title of the parent document
    pub source_title: String,
    /// Heading trail (e.g. "Setup > Install"); `None` for pre-heading intros
    pub section_path: Option<String>,
    /// Topic labels inherited from the parent document
    pub tags: Vec<String>,
    /// URL fragment derived from the section path ("#setup-install", or empty)
    pub url_fragment: String,
    /// 0-based order within the document; stable sort key on score ties
    pub position: usize,
    /// Approximate size estimate, used only for chunk-size budgeting
    pub token_count: usize,
    /// Publication date of the parent document (passed through verbatim)
    pub date: String,
}

/// A raw document handed to the pipeline by the caller.
///
/// The core does not care how documents are authored or stored; the serving
/// layer supplies text plus whatever metadata it has, and the pipeline fills
/// in defaults for anything missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// URL slug identifying the document
    pub source_id: String,
    /// Raw markdown text
    pub text: String,
    /// Author-supplied metadata, possibly incomplete
    pub metadata: DocumentMetadata,
}

/// Document metadata as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Document title; defaults to a titlecased form of the slug
    pub title: Option<String>,
    /// Topic labels; defaults to empty
    #[serde(default)]
    pub tags: Vec<String>,
    /// Category; defaults to "general"
    pub category: Option<String>,
    /// Publication date; defaults to the indexing timestamp
    pub date: Option<String>,
}

impl DocumentMetadata {
    /// Fills in defaults, yielding metadata with every field populated.
    ///
    /// `fallback_date` is whatever the pipeline uses for documents without a
    /// date (the indexing timestamp, formatted as seconds since the epoch).
    pub fn normalized(&self, source_id: &str, fallback_date: &str) -> NormalizedMetadata {
        NormalizedMetadata {
            title: self
                .title
                .clone()
                .unwrap_or_else(|| title_from_slug(source_id)),
            tags: self.tags.clone(),
            category: self
                .category
                .clone()
                .unwrap_or_else(|| "general".to_string()),
            date: self.date.clone().unwrap_or_else(|| fallback_date.to_string()),
        }
    }
}

/// Metadata after defaulting; every field is concrete.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMetadata {
    pub title: String,
    pub tags: Vec<String>,
    pub category: String,
    pub date: String,
}

/// Derives a display title from a slug: "hybrid-search-notes" becomes
/// "Hybrid Search Notes".
fn title_from_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
