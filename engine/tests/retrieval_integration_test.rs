//! Integration tests for the retrieval subsystem
//!
//! Exercises the persisted index end to end: bootstrap, ingestion,
//! deduplication, reload, dimension checks and concurrent access.

mod common;

use std::sync::Arc;

use common::{test_config, FixedDimensionFactory, ScriptedFactory};
use fleet_engine::retrieval::{Document, IngestReport, Metadata, RetrievalIndex, PLACEHOLDER_TEXT};
use fleet_engine::Fleet;
use sdk::errors::EngineError;
use serde_json::json;

fn corpus() -> Vec<Document> {
    vec![
        Document::new("Tokio is an asynchronous runtime for the Rust programming language.")
            .with_metadata("source", json!("tokio.md")),
        Document::new("Serde is a framework for serializing and deserializing Rust data structures.")
            .with_metadata("source", json!("serde.md")),
        Document::new("Clap parses command line arguments into strongly typed structs.")
            .with_metadata("source", json!("clap.md")),
    ]
}

fn scripted_fleet(dir: &std::path::Path) -> Fleet {
    Fleet::new(test_config(dir), Arc::new(ScriptedFactory::new())).unwrap()
}

#[tokio::test]
async fn test_load_bootstraps_placeholder_index() {
    let dir = tempfile::tempdir().unwrap();
    let fleet = scripted_fleet(dir.path());
    let retrieval = fleet.retrieval();

    assert!(!retrieval.is_initialized());
    assert!(retrieval.search("anything", None, None).await.is_empty());

    retrieval.load().await.unwrap();

    assert_eq!(retrieval.len(), 1);
    assert!(RetrievalIndex::file_path(retrieval.index_dir()).exists());
    let hits = retrieval.search("welcome", Some(5), None).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, PLACEHOLDER_TEXT);
}

#[tokio::test]
async fn test_ingest_persists_and_reloads_with_same_ranking() {
    let dir = tempfile::tempdir().unwrap();

    let before = {
        let fleet = scripted_fleet(dir.path());
        let report = fleet.retrieval().ingest(corpus()).await.unwrap();
        assert_eq!(report.documents, 3);
        assert_eq!(report.chunks, 3);
        assert_eq!(report.added, 3);
        assert_eq!(fleet.retrieval().len(), 4);
        fleet.retrieval().search("asynchronous rust runtime", Some(3), None).await
    };
    assert_eq!(before.len(), 3);
    assert!(before[0].text.contains("Tokio"));

    let fleet = scripted_fleet(dir.path());
    fleet.retrieval().load().await.unwrap();
    assert_eq!(fleet.retrieval().len(), 4);

    let after = fleet
        .retrieval()
        .search("asynchronous rust runtime", Some(3), None)
        .await;
    let texts = |hits: &[fleet_engine::retrieval::SearchHit]| {
        hits.iter().map(|h| h.text.clone()).collect::<Vec<_>>()
    };
    assert_eq!(texts(&before), texts(&after));
    for (a, b) in before.iter().zip(after.iter()) {
        assert!((a.score - b.score).abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_empty_ingest_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let fleet = scripted_fleet(dir.path());
    let retrieval = fleet.retrieval();

    // Uninitialized: nothing is created on disk
    let report = retrieval.ingest(Vec::new()).await.unwrap();
    assert_eq!(report, IngestReport::default());
    assert!(!retrieval.index_dir().exists());

    retrieval.ingest(corpus()).await.unwrap();
    let path = RetrievalIndex::file_path(retrieval.index_dir());
    let bytes = std::fs::read(&path).unwrap();
    let size = retrieval.len();

    let report = retrieval.ingest(Vec::new()).await.unwrap();
    assert_eq!(report, IngestReport::default());
    assert_eq!(retrieval.len(), size);
    assert_eq!(std::fs::read(&path).unwrap(), bytes);
}

#[tokio::test]
async fn test_reingest_skips_duplicate_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let fleet = scripted_fleet(dir.path());
    let retrieval = fleet.retrieval();

    retrieval.ingest(corpus()).await.unwrap();
    let size = retrieval.len();

    let report = retrieval.ingest(corpus()).await.unwrap();
    assert_eq!(report.chunks, 3);
    assert_eq!(report.added, 0);
    assert_eq!(report.duplicates, 3);
    assert_eq!(retrieval.len(), size);

    // Same text under different metadata is a distinct chunk
    let report = retrieval
        .ingest(vec![Document::new(
            "Tokio is an asynchronous runtime for the Rust programming language.",
        )
        .with_metadata("source", json!("mirror.md"))])
        .await
        .unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(retrieval.len(), size + 1);
}

#[tokio::test]
async fn test_long_document_is_chunked_with_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let fleet = scripted_fleet(dir.path());

    // chunk_size 200, overlap 20: windows start at 0, 180, 360
    let text = "abcdefghij".repeat(45);
    let report = fleet
        .retrieval()
        .ingest(vec![Document::new(text)])
        .await
        .unwrap();
    assert_eq!(report.chunks, 3);
}

#[tokio::test]
async fn test_search_filter_restricts_results() {
    let dir = tempfile::tempdir().unwrap();
    let fleet = scripted_fleet(dir.path());
    fleet.retrieval().ingest(corpus()).await.unwrap();

    let filter = Metadata::from([("source".to_string(), json!("serde.md"))]);
    let hits = fleet
        .retrieval()
        .search("rust", Some(10), Some(&filter))
        .await;

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.get("source"), Some(&json!("serde.md")));

    let filter = Metadata::from([("source".to_string(), json!("missing.md"))]);
    assert!(fleet
        .retrieval()
        .search("rust", Some(10), Some(&filter))
        .await
        .is_empty());
}

#[tokio::test]
async fn test_wrong_dimension_embedding_leaves_index_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = {
        let fleet = scripted_fleet(dir.path());
        fleet.retrieval().ingest(corpus()).await.unwrap();
        RetrievalIndex::file_path(fleet.retrieval().index_dir())
    };
    let bytes = std::fs::read(&path).unwrap();

    let fleet = Fleet::new(
        test_config(dir.path()),
        Arc::new(FixedDimensionFactory { dimension: 32 }),
    )
    .unwrap();
    fleet.retrieval().load().await.unwrap();
    let size = fleet.retrieval().len();

    let err = fleet
        .retrieval()
        .ingest(vec![Document::new("another document")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::DimensionMismatch {
            expected: 64,
            actual: 32
        }
    ));
    assert_eq!(fleet.retrieval().len(), size);
    assert_eq!(std::fs::read(&path).unwrap(), bytes);

    // Query embeddings of the wrong size degrade to no results
    assert!(fleet.retrieval().search("tokio", None, None).await.is_empty());
}

#[tokio::test]
async fn test_load_rejects_index_of_other_dimension() {
    let dir = tempfile::tempdir().unwrap();
    {
        let fleet = scripted_fleet(dir.path());
        fleet.retrieval().load().await.unwrap();
    }

    let mut config = test_config(dir.path());
    config.retrieval.embedding_dim = 32;
    let fleet = Fleet::new(config, Arc::new(ScriptedFactory::new())).unwrap();

    let err = fleet.retrieval().load().await.unwrap_err();
    assert!(matches!(err, EngineError::DimensionMismatch { .. }));
    assert!(!fleet.retrieval().is_initialized());
}

#[tokio::test]
async fn test_load_fails_on_directory_without_index_file() {
    let dir = tempfile::tempdir().unwrap();
    let fleet = scripted_fleet(dir.path());
    std::fs::create_dir_all(fleet.retrieval().index_dir()).unwrap();

    let err = fleet.retrieval().load().await.unwrap_err();
    assert!(matches!(err, EngineError::Serialization(_)));
}

#[tokio::test]
async fn test_persist_uninitialized_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let fleet = scripted_fleet(dir.path());

    fleet.retrieval().persist().await.unwrap();
    assert!(!fleet.retrieval().index_dir().exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingest_and_search() {
    let dir = tempfile::tempdir().unwrap();
    let fleet = scripted_fleet(dir.path());
    let retrieval = Arc::clone(fleet.retrieval());
    retrieval.load().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let retrieval = Arc::clone(&retrieval);
        handles.push(tokio::spawn(async move {
            retrieval
                .ingest(vec![Document::new(format!("document number {} about crews", i))])
                .await
                .map(|report| report.added)
        }));
    }

    let mut searches = Vec::new();
    for _ in 0..8 {
        let retrieval = Arc::clone(&retrieval);
        searches.push(tokio::spawn(async move {
            retrieval.search("crews", Some(20), None).await.len()
        }));
    }

    let mut added = 0;
    for handle in handles {
        added += handle.await.unwrap().unwrap();
    }
    for search in searches {
        let hits = search.await.unwrap();
        assert!((1..=9).contains(&hits));
    }

    assert_eq!(added, 8);
    assert_eq!(retrieval.len(), 9);

    let reloaded = scripted_fleet(dir.path());
    reloaded.retrieval().load().await.unwrap();
    assert_eq!(reloaded.retrieval().len(), 9);
}
