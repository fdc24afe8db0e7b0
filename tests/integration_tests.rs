//! End-to-end tests: pipeline build, publish, engine load, query.

use lodestone::chunking::{DocumentMetadata, SourceDocument};
use lodestone::config::{RetrievalConfig, SearchConfig, StoreConfig};
use lodestone::indexing::IndexingPipeline;
use lodestone::search::{HybridSearchEngine, Provenance};
use lodestone::storage::{create_store, ArtifactStore, FsArtifactStore, InMemoryArtifactStore};
use lodestone::test_utils::{FixtureEmbedder, HashEmbedder};
use std::sync::Arc;
use tempfile::TempDir;

fn doc(slug: &str, text: &str, tags: &[&str]) -> SourceDocument {
    SourceDocument {
        source_id: slug.to_string(),
        text: text.to_string(),
        metadata: DocumentMetadata {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        },
    }
}

fn blog_corpus() -> Vec<SourceDocument> {
    vec![
        doc(
            "rust-ownership",
            "Intro about memory.\n\n## Ownership\n\nOwnership and borrowing keep Rust memory safe without a garbage collector.\n\n## Lifetimes\n\nLifetimes describe how long references stay valid.",
            &["rust"],
        ),
        doc(
            "hybrid-search",
            "## Why Hybrid\n\nDense embeddings capture meaning while keyword matching catches exact terms.\n\n## Fusion\n\nReciprocal rank fusion merges both candidate lists.",
            &["search", "rust"],
        ),
        doc(
            "sourdough-basics",
            "## Starter\n\nFeed the sourdough starter with flour and water every day.\n\n## Baking\n\nBake the loaf in a hot dutch oven.",
            &["cooking"],
        ),
    ]
}

#[tokio::test]
async fn pipeline_build_then_search_finds_relevant_chunks() {
    let embedder = Arc::new(HashEmbedder::new(32));
    let pipeline = IndexingPipeline::new(
        embedder.clone(),
        InMemoryArtifactStore::new(),
        RetrievalConfig::default(),
    );
    let summary = pipeline.run(blog_corpus()).await.unwrap();
    assert_eq!(summary.document_count, 3);
    assert!(summary.chunk_count >= 6);

    let engine = HybridSearchEngine::load(pipeline.store(), embedder, SearchConfig::default())
        .await
        .unwrap();
    let results = engine
        .search("sourdough starter flour", 3, None, true)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].source_id, "sourdough-basics");
    assert_eq!(results[0].url, "/sourdough-basics#starter");
}

#[tokio::test]
async fn tag_filter_restricts_results_to_tagged_documents() {
    let embedder = Arc::new(HashEmbedder::new(32));
    let pipeline = IndexingPipeline::new(
        embedder.clone(),
        InMemoryArtifactStore::new(),
        RetrievalConfig::default(),
    );
    pipeline.run(blog_corpus()).await.unwrap();
    let engine = HybridSearchEngine::load(pipeline.store(), embedder, SearchConfig::default())
        .await
        .unwrap();

    let filter = vec!["cooking".to_string()];
    let results = engine
        .search("baking bread rust", 5, Some(&filter), false)
        .await
        .unwrap();
    assert!(!results.is_empty());
    for r in &results {
        assert_eq!(r.source_id, "sourdough-basics");
    }

    let none = engine
        .search("baking bread", 5, Some(&["gardening".to_string()]), false)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn single_tagged_chunk_is_the_only_filtered_result_at_any_top_k() {
    let embedder = Arc::new(HashEmbedder::new(32));
    let pipeline = IndexingPipeline::new(
        embedder.clone(),
        InMemoryArtifactStore::new(),
        RetrievalConfig::default(),
    );
    let docs: Vec<SourceDocument> = (0..5)
        .map(|i| {
            let tags: &[&str] = if i == 2 { &["x"] } else { &[] };
            doc(
                &format!("post-{}", i),
                &format!("Shared searchable words plus unique token number {}.", i),
                tags,
            )
        })
        .collect();
    pipeline.run(docs).await.unwrap();
    let engine = HybridSearchEngine::load(pipeline.store(), embedder, SearchConfig::default())
        .await
        .unwrap();

    let filter = vec!["x".to_string()];
    for top_k in [1, 3, 10] {
        let results = engine
            .search("shared searchable words", top_k, Some(&filter), false)
            .await
            .unwrap();
        assert_eq!(results.len(), 1, "top_k = {}", top_k);
        assert_eq!(results[0].source_id, "post-2");
        assert!(results[0].tags.contains(&"x".to_string()));
    }
}

#[tokio::test]
async fn keyword_only_match_surfaces_with_sparse_provenance() {
    // Geometry pinned by fixture: the dense leg ranks the two generic
    // documents closest to the query, leaving the keyword document outside
    // its candidate list entirely. A keyword-leaning alpha lets the sparse
    // leg carry it to the top.
    let doc_a = "Dense retrieval compares vector geometry for ranking.";
    let doc_b = "Ranking quality depends on careful evaluation metrics.";
    let doc_c = "Flumoxite crystals appear nowhere else in this corpus.";
    let query = "flumoxite";

    let embedder = Arc::new(
        FixtureEmbedder::new(4)
            .with_vector(doc_a, vec![1.0, 0.0, 0.0, 0.0])
            .with_vector(doc_b, vec![0.9, 0.1, 0.0, 0.0])
            .with_vector(doc_c, vec![0.0, 0.0, 1.0, 0.0])
            .with_vector(query, vec![1.0, 0.0, 0.0, 0.0]),
    );
    let pipeline = IndexingPipeline::new(
        embedder.clone(),
        InMemoryArtifactStore::new(),
        RetrievalConfig::default(),
    );
    pipeline
        .run(vec![doc("a", doc_a, &[]), doc("b", doc_b, &[]), doc("c", doc_c, &[])])
        .await
        .unwrap();

    let config = SearchConfig {
        alpha: 0.3,
        ..Default::default()
    };
    let engine = HybridSearchEngine::load(pipeline.store(), embedder, config)
        .await
        .unwrap();

    let results = engine.search(query, 1, None, false).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source_id, "c");
    assert_eq!(results[0].provenance, Provenance::Sparse);
    assert!(results[0].sparse_score.is_some());
    assert!(results[0].dense_score.is_none());
}

#[tokio::test]
async fn chunks_found_by_both_legs_are_hybrid() {
    let embedder = Arc::new(HashEmbedder::new(32));
    let pipeline = IndexingPipeline::new(
        embedder.clone(),
        InMemoryArtifactStore::new(),
        RetrievalConfig::default(),
    );
    pipeline.run(blog_corpus()).await.unwrap();
    let engine = HybridSearchEngine::load(pipeline.store(), embedder, SearchConfig::default())
        .await
        .unwrap();

    // Query words appear verbatim in the ownership chunk, so both legs
    // surface it.
    let results = engine
        .search("ownership borrowing garbage collector", 3, None, false)
        .await
        .unwrap();
    let top = &results[0];
    assert_eq!(top.source_id, "rust-ownership");
    assert_eq!(top.provenance, Provenance::Hybrid);
    assert!(top.dense_score.is_some());
    assert!(top.sparse_score.is_some());
}

#[tokio::test]
async fn filesystem_store_round_trips_identically() {
    let dir = TempDir::new().unwrap();
    let embedder = Arc::new(HashEmbedder::new(32));
    let pipeline = IndexingPipeline::new(
        embedder.clone(),
        FsArtifactStore::new(dir.path().to_path_buf()),
        RetrievalConfig::default(),
    );
    pipeline.run(blog_corpus()).await.unwrap();

    // Two independent loads from disk answer a probe identically.
    let first = HybridSearchEngine::load(pipeline.store(), embedder.clone(), SearchConfig::default())
        .await
        .unwrap();
    let second = HybridSearchEngine::load(pipeline.store(), embedder, SearchConfig::default())
        .await
        .unwrap();

    let probe = "reciprocal rank fusion";
    let a = first.search(probe, 5, None, true).await.unwrap();
    let b = second.search(probe, 5, None, true).await.unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.chunk_id, y.chunk_id);
        assert!((x.score - y.score).abs() < 1e-6);
    }
    assert_eq!(a[0].source_id, "hybrid-search");
}

#[tokio::test]
async fn republish_replaces_the_served_corpus() {
    let dir = TempDir::new().unwrap();
    let embedder = Arc::new(HashEmbedder::new(32));
    let pipeline = IndexingPipeline::new(
        embedder.clone(),
        FsArtifactStore::new(dir.path().to_path_buf()),
        RetrievalConfig::default(),
    );

    pipeline.run(blog_corpus()).await.unwrap();
    let old_engine =
        HybridSearchEngine::load(pipeline.store(), embedder.clone(), SearchConfig::default())
            .await
            .unwrap();

    // Rebuild with a single new document.
    pipeline
        .run(vec![doc("only-doc", "Fresh content about telescopes and lenses.", &[])])
        .await
        .unwrap();

    // The old engine keeps serving its loaded snapshot.
    assert_eq!(old_engine.summary().document_count, 3);

    let new_engine = HybridSearchEngine::load(pipeline.store(), embedder, SearchConfig::default())
        .await
        .unwrap();
    assert_eq!(new_engine.summary().document_count, 1);
    let results = new_engine.search("telescopes", 3, None, false).await.unwrap();
    assert_eq!(results[0].source_id, "only-doc");
}

#[tokio::test]
async fn store_is_selected_from_configuration() {
    let dir = TempDir::new().unwrap();
    let embedder = Arc::new(HashEmbedder::new(16));

    for config in [
        StoreConfig::Memory,
        StoreConfig::Filesystem {
            data_dir: dir.path().to_path_buf(),
        },
    ] {
        let store = create_store(&config);
        store.health_check().await.unwrap();

        let pipeline = IndexingPipeline::new(embedder.clone(), store, RetrievalConfig::default());
        pipeline
            .run(vec![doc("hello", "A short hello world post.", &[])])
            .await
            .unwrap();
        assert_eq!(pipeline.store().load_summary().await.unwrap().document_count, 1);
    }
}
