//! Markdown section chunking.
//!
//! Documents are split at H2 boundaries, then recursively at H3 boundaries
//! within each H2 section, so every chunk carries a heading trail
//! (`section_path`) usable for URL fragments and as a rerank signal. Content
//! before the first H2 becomes an "introduction" section with no path.
//!
//! Each section is then size-bounded: sections within the token budget become
//! one chunk; larger sections are split at sentence boundaries and packed
//! greedily, carrying a fixed-size trailing overlap of sentences into the
//! next chunk for context continuity. Fenced code blocks are atomic units and
//! are never split, even when that produces an oversized chunk.
//!
//! Chunking is deterministic: the same document and parameters always yield
//! byte-identical chunk boundaries and ids.

mod types;

pub use types::{Chunk, ChunkId, DocumentMetadata, NormalizedMetadata, SourceDocument};

use crate::config::{ChunkerConfig, CHARS_PER_TOKEN_ESTIMATE};
use tracing::debug;

/// Estimates the token count of a text with the fixed chars-per-token
/// heuristic. Used only for chunk-size budgeting, never for scoring.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / CHARS_PER_TOKEN_ESTIMATE
}

/// A heading-delimited slice of a document, before size bounding.
struct Section {
    /// Heading trail; `None` for the pre-heading introduction
    path: Option<String>,
    text: String,
}

/// Splits markdown documents into size-bounded chunks along section
/// boundaries.
#[derive(Debug, Clone)]
pub struct MarkdownChunker {
    config: ChunkerConfig,
}

impl MarkdownChunker {
    /// Creates a chunker with the given size parameters.
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Returns the chunking parameters in use.
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Chunks one document into an ordered sequence of chunks.
    ///
    /// `meta` must already be normalized (see
    /// [`DocumentMetadata::normalized`]); the chunker copies title, tags, and
    /// date onto every chunk. `position` increases monotonically in document
    /// order of emission and is unique within the document.
    pub fn chunk_document(&self, doc: &SourceDocument, meta: &NormalizedMetadata) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for section in split_sections(&doc.text) {
            let position = chunks.len();
            self.chunk_section(
                &section.text,
                section.path.as_deref(),
                doc,
                meta,
                position,
                &mut chunks,
            );
        }

        debug!(
            source_id = %doc.source_id,
            chunk_count = chunks.len(),
            "chunked document"
        );
        chunks
    }

    /// Size-bounds one section, appending its chunks to `out`.
    fn chunk_section(
        &self,
        text: &str,
        path: Option<&str>,
        doc: &SourceDocument,
        meta: &NormalizedMetadata,
        base_position: usize,
        out: &mut Vec<Chunk>,
    ) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        if estimate_tokens(text) <= self.config.max_tokens {
            out.push(self.make_chunk(text, path, doc, meta, base_position));
            return;
        }

        // Over budget: split at sentence boundaries (code fences atomic) and
        // pack greedily, carrying a trailing sentence overlap forward.
        let sentences = split_sentences(text);
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;
        let mut emitted = 0usize;

        for sentence in sentences {
            let sentence_tokens = estimate_tokens(&sentence);

            if current_tokens + sentence_tokens <= self.config.max_tokens {
                current.push(sentence);
                current_tokens += sentence_tokens;
                continue;
            }

            if !current.is_empty() {
                out.push(self.make_chunk(
                    &current.join(" "),
                    path,
                    doc,
                    meta,
                    base_position + emitted,
                ));
                emitted += 1;
            }

            if self.config.overlap_tokens > 0 && !current.is_empty() {
                let mut overlap: Vec<String> = Vec::new();
                let mut overlap_tokens = 0usize;
                for sent in current.iter().rev() {
                    let tokens = estimate_tokens(sent);
                    if overlap_tokens + tokens <= self.config.overlap_tokens {
                        overlap.insert(0, sent.clone());
                        overlap_tokens += tokens;
                    } else {
                        break;
                    }
                }
                current_tokens = overlap_tokens + sentence_tokens;
                current = overlap;
                current.push(sentence);
            } else {
                current_tokens = sentence_tokens;
                current = vec![sentence];
            }
        }

        if !current.is_empty() {
            out.push(self.make_chunk(
                &current.join(" "),
                path,
                doc,
                meta,
                base_position + emitted,
            ));
        }
    }

    fn make_chunk(
        &self,
        text: &str,
        path: Option<&str>,
        doc: &SourceDocument,
        meta: &NormalizedMetadata,
        position: usize,
    ) -> Chunk {
        Chunk {
            id: ChunkId::derive(&doc.source_id, position, text),
            text: text.to_string(),
            source_id: doc.source_id.clone(),
            source_title: meta.title.clone(),
            section_path: path.map(str::to_string),
            tags: meta.tags.clone(),
            url_fragment: path.map(slug_fragment).unwrap_or_default(),
            position,
            token_count: estimate_tokens(text),
            date: meta.date.clone(),
        }
    }
}

impl Default for MarkdownChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

/// Splits a document at H2 boundaries, then at H3 boundaries within each H2
/// section. An H3 appearing before any H2 stays inline in the introduction.
fn split_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current_h2: Option<String> = None;
    let mut current_path: Option<String> = None;
    let mut buf = String::new();

    let mut flush = |path: Option<String>, buf: &mut String| {
        if !buf.trim().is_empty() {
            sections.push(Section {
                path,
                text: std::mem::take(buf),
            });
        } else {
            buf.clear();
        }
    };

    for line in text.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            flush(current_path.take(), &mut buf);
            let heading = heading.trim().to_string();
            current_path = Some(heading.clone());
            current_h2 = Some(heading);
        } else if let Some(heading) = line.strip_prefix("### ") {
            match &current_h2 {
                Some(h2) => {
                    flush(current_path.take(), &mut buf);
                    current_path = Some(format!("{} > {}", h2, heading.trim()));
                }
                None => {
                    buf.push_str(line);
                    buf.push('\n');
                }
            }
        } else {
            buf.push_str(line);
            buf.push('\n');
        }
    }
    flush(current_path, &mut buf);

    sections
}

/// Splits section text into sentence units, treating fenced code blocks as
/// single atomic units that are never split.
fn split_sentences(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("```") {
        let (before, fenced) = rest.split_at(start);
        split_prose(before, &mut units);

        match fenced[3..].find("```") {
            Some(end) => {
                let fence_len = 3 + end + 3;
                units.push(fenced[..fence_len].to_string());
                rest = &fenced[fence_len..];
            }
            None => {
                // Unterminated fence: the remainder is one atomic unit.
                units.push(fenced.to_string());
                rest = "";
            }
        }
    }
    split_prose(rest, &mut units);

    units
}

/// Splits prose at a sentence terminator followed by whitespace, dropping the
/// separating whitespace and keeping the terminator with its sentence.
fn split_prose(text: &str, out: &mut Vec<String>) {
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let ends_sentence = matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|&(_, next)| next.is_whitespace());
        if ends_sentence {
            let sentence = text[start..i + c.len_utf8()].trim();
            if !sentence.is_empty() {
                out.push(sentence.to_string());
            }
            while chars.peek().is_some_and(|&(_, next)| next.is_whitespace()) {
                chars.next();
            }
            start = chars.peek().map_or(text.len(), |&(next_start, _)| next_start);
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
}

/// Converts a section path to a URL fragment:
/// "Setup > Install" becomes "#setup-install".
fn slug_fragment(path: &str) -> String {
    let mut slug = String::new();
    let mut pending_separator = false;

    for c in path.to_lowercase().chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_separator {
                slug.push('-');
                pending_separator = false;
            }
            slug.push(c);
        } else if (c.is_whitespace() || c == '-') && !slug.is_empty() {
            pending_separator = true;
        }
        // Other punctuation (">", "&", ...) is dropped entirely.
    }

    format!("#{}", slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_doc(text: &str) -> (SourceDocument, NormalizedMetadata) {
        let doc = SourceDocument {
            source_id: "test-post".to_string(),
            text: text.to_string(),
            metadata: DocumentMetadata::default(),
        };
        let meta = doc.metadata.normalized("test-post", "1700000000");
        (doc, meta)
    }

    fn chunk(text: &str) -> Vec<Chunk> {
        let (doc, meta) = make_doc(text);
        MarkdownChunker::default().chunk_document(&doc, &meta)
    }

    #[test]
    fn intro_before_first_heading_has_no_section_path() {
        let chunks = chunk("Some intro text.\n\n## First Section\n\nBody text.");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section_path, None);
        assert_eq!(chunks[0].url_fragment, "");
        assert_eq!(chunks[1].section_path, Some("First Section".to_string()));
        assert_eq!(chunks[1].url_fragment, "#first-section");
    }

    #[test]
    fn h3_sections_nest_under_their_h2() {
        let text = "## Setup\n\nOverview.\n\n### Install\n\nRun the installer.\n\n### Verify\n\nCheck the version.";
        let chunks = chunk(text);
        let paths: Vec<Option<String>> = chunks.iter().map(|c| c.section_path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                Some("Setup".to_string()),
                Some("Setup > Install".to_string()),
                Some("Setup > Verify".to_string()),
            ]
        );
        assert_eq!(chunks[1].url_fragment, "#setup-install");
    }

    #[test]
    fn h3_before_any_h2_stays_in_the_intro() {
        let chunks = chunk("### Orphan\n\nIntro body.\n\n## Real Section\n\nBody.");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section_path, None);
        assert!(chunks[0].text.contains("### Orphan"));
    }

    #[test]
    fn positions_are_contiguous_from_zero() {
        let text = "Intro.\n\n## A\n\nBody A.\n\n## B\n\nBody B.\n\n### B1\n\nBody B1.";
        let chunks = chunk(text);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.position, i);
        }
    }

    #[test]
    fn empty_sections_yield_no_chunks() {
        let chunks = chunk("## Empty\n\n\n\n## Full\n\nSome content here.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_path, Some("Full".to_string()));
    }

    #[test]
    fn whitespace_only_document_yields_no_chunks() {
        assert!(chunk("   \n\n  \n").is_empty());
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "## Section\n\nFirst sentence. Second sentence. Third sentence.";
        let a = chunk(text);
        let b = chunk(text);
        assert_eq!(a, b);
    }

    #[test]
    fn oversized_sections_split_at_sentence_boundaries() {
        // 40 sentences of ~120 chars each, far beyond a 64-token budget.
        let sentence = "This sentence is long enough to contribute a meaningful number of estimated tokens to the running chunk total. ";
        let body: String = sentence.repeat(40);
        let text = format!("## Big\n\n{}", body);

        let chunker = MarkdownChunker::new(ChunkerConfig {
            max_tokens: 64,
            overlap_tokens: 10,
        });
        let (doc, meta) = make_doc(&text);
        let chunks = chunker.chunk_document(&doc, &meta);

        assert!(chunks.len() > 1, "expected the section to split");
        for c in &chunks {
            assert!(
                c.token_count <= 64 + 8,
                "chunk exceeds budget: {} tokens",
                c.token_count
            );
            assert_eq!(c.section_path, Some("Big".to_string()));
        }
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.position, i);
        }
    }

    #[test]
    fn adjacent_chunks_share_overlap_sentences() {
        let sentence = "Overlap test sentence number one two three four five six seven eight nine ten eleven twelve. ";
        let body: String = sentence.repeat(30);
        let chunker = MarkdownChunker::new(ChunkerConfig {
            max_tokens: 64,
            overlap_tokens: 30,
        });
        let (doc, meta) = make_doc(&format!("## S\n\n{}", body));
        let chunks = chunker.chunk_document(&doc, &meta);
        assert!(chunks.len() > 1);

        // The second chunk starts with trailing sentences of the first.
        let first_tail = chunks[0]
            .text
            .rsplit(". ")
            .next()
            .unwrap()
            .trim_end_matches('.');
        assert!(
            chunks[1].text.contains(first_tail),
            "expected overlap between adjacent chunks"
        );
    }

    #[test]
    fn code_fence_is_never_split() {
        let code_line = "let value = some_function_with_a_descriptive_name(argument_one, argument_two);\n";
        let block = format!("```rust\n{}```", code_line.repeat(60));
        let text = format!("## Code\n\nShort intro. {}", block);

        let chunker = MarkdownChunker::new(ChunkerConfig {
            max_tokens: 64,
            overlap_tokens: 0,
        });
        let (doc, meta) = make_doc(&text);
        let chunks = chunker.chunk_document(&doc, &meta);

        // The fence exceeds the budget but must be emitted whole.
        let with_fence: Vec<_> = chunks.iter().filter(|c| c.text.contains("```")).collect();
        assert_eq!(with_fence.len(), 1);
        assert_eq!(with_fence[0].text.matches("```").count(), 2);
        assert!(with_fence[0].token_count > 64);
    }

    #[test]
    fn section_count_adds_up() {
        let text = "Intro one. Intro two.\n\n## A\n\nBody A.\n\n## B\n\nBody B.";
        let chunks = chunk(text);
        let sections = split_sections(text);
        let per_section: usize = sections
            .iter()
            .map(|s| if s.text.trim().is_empty() { 0 } else { 1 })
            .sum();
        assert_eq!(chunks.len(), per_section);
    }

    #[test]
    fn slug_fragment_strips_punctuation() {
        assert_eq!(slug_fragment("Setup > Install"), "#setup-install");
        assert_eq!(slug_fragment("What's New?"), "#whats-new");
        assert_eq!(slug_fragment("A - B"), "#a-b");
    }

    #[test]
    fn split_prose_keeps_terminators() {
        let mut out = Vec::new();
        split_prose("One. Two! Three? Four", &mut out);
        assert_eq!(out, vec!["One.", "Two!", "Three?", "Four"]);
    }

    #[test]
    fn split_sentences_keeps_fences_atomic() {
        let text = "Before the code. ```\nfn main() {}\n``` After the code.";
        let units = split_sentences(text);
        assert!(units.contains(&"Before the code.".to_string()));
        assert!(units.iter().any(|u| u.starts_with("```") && u.ends_with("```")));
        assert!(units.contains(&"After the code.".to_string()));
    }
}
