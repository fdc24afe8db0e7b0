//! Full-rebuild indexing pipeline.
//!
//! Every run rebuilds the whole artifact set from scratch: normalize
//! metadata, chunk, embed, fit BM25, publish. There is no incremental path;
//! at this corpus scale a rebuild is cheap and sidesteps all index
//! consistency questions. A failed run publishes nothing, so the previously
//! published set keeps serving.

use super::{unix_now, DocumentSummary, IndexSummary};
use crate::chunking::{Chunk, MarkdownChunker, SourceDocument};
use crate::config::RetrievalConfig;
use crate::embedding::{validate_batch_shape, EmbeddingProvider};
use crate::error::{EmbeddingError, PipelineError};
use crate::search::dense::DenseIndex;
use crate::search::sparse::SparseIndex;
use crate::storage::{ArtifactSet, ArtifactStore};
use futures::StreamExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Rebuilds and publishes the artifact set for a document corpus.
pub struct IndexingPipeline<S: ArtifactStore> {
    chunker: MarkdownChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: S,
    config: RetrievalConfig,
}

impl<S: ArtifactStore> IndexingPipeline<S> {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: S, config: RetrievalConfig) -> Self {
        Self {
            chunker: MarkdownChunker::new(config.chunker),
            embedder,
            store,
            config,
        }
    }

    /// The store this pipeline publishes to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one full rebuild over `documents` and publishes the result.
    ///
    /// An empty corpus is not an error: it publishes an empty but valid
    /// artifact set, with a warning. Any embedding or index failure aborts
    /// the run before publish.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn run(&self, documents: Vec<SourceDocument>) -> Result<IndexSummary, PipelineError> {
        let fallback_date = unix_now().to_string();

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut doc_summaries: Vec<DocumentSummary> = Vec::new();
        for doc in &documents {
            let meta = doc.metadata.normalized(&doc.source_id, &fallback_date);
            let doc_chunks = self.chunker.chunk_document(doc, &meta);
            doc_summaries.push(DocumentSummary {
                source_id: doc.source_id.clone(),
                title: meta.title,
                chunk_count: doc_chunks.len(),
            });
            chunks.extend(doc_chunks);
        }
        doc_summaries.sort_by(|a, b| a.source_id.cmp(&b.source_id));

        if chunks.is_empty() {
            warn!("corpus produced no chunks, publishing an empty index");
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let dense = self.embed_corpus(&chunks, &texts).await?;
        let sparse = SparseIndex::fit(&texts);

        let tags: BTreeSet<String> = chunks.iter().flat_map(|c| c.tags.iter().cloned()).collect();
        let summary = IndexSummary {
            created_at: unix_now(),
            document_count: documents.len(),
            chunk_count: chunks.len(),
            embedding_model: self.embedder.model_id().to_string(),
            embedding_dimension: self.embedder.dimension(),
            chunking: self.config.chunker,
            tags: tags.into_iter().collect(),
            documents: doc_summaries,
        };

        self.store
            .publish(ArtifactSet {
                chunks,
                dense,
                sparse,
                summary: summary.clone(),
            })
            .await?;

        info!(
            documents = summary.document_count,
            chunks = summary.chunk_count,
            model = %summary.embedding_model,
            "index build published"
        );
        Ok(summary)
    }

    /// Embeds every chunk in fixed-size batches with a bounded number of
    /// batches in flight. Output order matches chunk order regardless of
    /// completion order, so row `i` of the dense index is chunk `i`.
    async fn embed_corpus(
        &self,
        chunks: &[Chunk],
        texts: &[String],
    ) -> Result<DenseIndex, PipelineError> {
        let batch_size = self.config.embedding.batch_size.max(1);
        let max_in_flight = self.config.embedding.max_in_flight.max(1);

        let batches: Vec<Vec<String>> = texts.chunks(batch_size).map(|b| b.to_vec()).collect();
        let mut stream = futures::stream::iter(batches.into_iter().map(|batch| {
            let embedder = Arc::clone(&self.embedder);
            async move {
                let vectors = embedder.embed(&batch).await?;
                validate_batch_shape(batch.len(), vectors.len())?;
                Ok::<_, EmbeddingError>(vectors)
            }
        }))
        .buffered(max_in_flight);

        let mut dense = DenseIndex::new(self.embedder.dimension()).map_err(PipelineError::Index)?;
        let mut row = 0usize;
        while let Some(result) = stream.next().await {
            for vector in result? {
                let chunk = &chunks[row];
                dense
                    .add(chunk.id.clone(), &vector, chunk.tags.clone())
                    .map_err(PipelineError::Index)?;
                row += 1;
            }
        }
        Ok(dense)
    }
}
