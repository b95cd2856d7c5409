//! Orchestrator integration tests against in-memory mock collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use pharmakon_common::{PharmakonError, Result};
use pharmakon_ingestion::embedding::Embedder;
use pharmakon_ingestion::indexer::{build_or_update_index, IndexerConfig};
use pharmakon_ingestion::models::PubMedRecord;
use pharmakon_ingestion::store::{VectorRecord, VectorStore};

/// Deterministic fake embedder: vector = [len, len, len] for each text.
struct MockEmbedder {
    calls: AtomicUsize,
}

impl MockEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| vec![t.len() as f32; 3])
            .collect())
    }

    fn dim(&self) -> usize {
        3
    }
}

/// In-memory store keyed by collection -> id, replace-on-write like the
/// real backends.
#[derive(Default)]
struct MockStore {
    collections: Mutex<HashMap<String, HashMap<String, VectorRecord>>>,
    upsert_calls: AtomicUsize,
    fail_upserts: bool,
}

impl MockStore {
    fn ids(&self, collection: &str) -> Vec<String> {
        let guard = self.collections.lock().unwrap();
        let mut ids: Vec<String> = guard
            .get(collection)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorStore for MockStore {
    async fn recreate(&self, collection: &str) -> Result<()> {
        // Deleting a missing collection is fine; then start fresh.
        let _ = self.delete_collection(collection).await?;
        self.collections
            .lock()
            .unwrap()
            .insert(collection.to_string(), HashMap::new());
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .remove(collection)
            .is_some())
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        if self.fail_upserts {
            return Err(PharmakonError::ExternalService("upsert refused".to_string()));
        }
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.collections.lock().unwrap();
        let coll = guard.entry(collection.to_string()).or_default();
        for r in records {
            coll.insert(r.id.clone(), r.clone());
        }
        Ok(())
    }
}

fn record(pmid: Option<&str>, abstract_text: &str) -> PubMedRecord {
    PubMedRecord {
        pmid: pmid.map(str::to_string),
        title: "Drug interaction evidence".to_string(),
        abstract_text: abstract_text.to_string(),
        source_file: "pubmed24n0001.xml".to_string(),
    }
}

fn cfg() -> IndexerConfig {
    IndexerConfig {
        collection: "test_evidence".to_string(),
        batch_size: 4,
        chunk_size: 50,
        chunk_overlap: 10,
        min_abstract_len: 20,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_deterministic_ids_and_metadata() {
    let records = vec![record(
        Some("12345"),
        "Ibuprofen reduces prostaglandin synthesis and may interact with anticoagulants in elderly patients.",
    )];
    let embedder = MockEmbedder::new();
    let store = MockStore::default();

    let summary = build_or_update_index(&records, &embedder, &store, &cfg())
        .await
        .unwrap();

    assert_eq!(summary.records_seen, 1);
    assert_eq!(summary.records_skipped, 0);
    assert!(summary.chunks_indexed >= 2);

    let ids = store.ids("test_evidence");
    assert_eq!(ids[0], "12345_c0");
    assert_eq!(ids[1], "12345_c1");

    let guard = store.collections.lock().unwrap();
    let first = &guard["test_evidence"]["12345_c0"];
    assert_eq!(first.metadata.pmid.as_deref(), Some("12345"));
    assert_eq!(first.metadata.source, "pubmed24n0001.xml");
    assert_eq!(first.metadata.chunk_index, 0);
    assert!(first.metadata.chunk_end > first.metadata.chunk_start);
    assert_eq!(first.vector.len(), 3);
}

#[tokio::test]
async fn test_records_without_pmid_get_row_based_ids() {
    let records = vec![
        record(None, "First abstract, long enough to pass the minimum body length filter."),
        record(None, "Second abstract, also long enough to pass the minimum length filter."),
    ];
    let embedder = MockEmbedder::new();
    let store = MockStore::default();

    build_or_update_index(&records, &embedder, &store, &cfg())
        .await
        .unwrap();

    let ids = store.ids("test_evidence");
    assert!(ids.iter().any(|i| i.starts_with("no_id_0_c")));
    assert!(ids.iter().any(|i| i.starts_with("no_id_1_c")));
}

#[tokio::test]
async fn test_short_abstracts_are_never_chunked_or_upserted() {
    let records = vec![
        record(Some("1"), "too short"),
        record(Some("2"), ""),
        record(
            Some("3"),
            "This abstract clears the minimum length and must be the only one indexed.",
        ),
    ];
    let embedder = MockEmbedder::new();
    let store = MockStore::default();

    let summary = build_or_update_index(&records, &embedder, &store, &cfg())
        .await
        .unwrap();

    assert_eq!(summary.records_seen, 3);
    assert_eq!(summary.records_skipped, 2);
    assert!(store.ids("test_evidence").iter().all(|i| i.starts_with("3_c")));
}

#[tokio::test]
async fn test_incremental_reruns_are_idempotent() {
    let records = vec![
        record(Some("10"), "Warfarin dosing is sensitive to CYP2C9 interactions with common NSAIDs."),
        record(Some("11"), "Acetaminophen overdose depletes glutathione and injures the liver parenchyma."),
    ];
    let embedder = MockEmbedder::new();
    let store = MockStore::default();
    let cfg = cfg();

    build_or_update_index(&records, &embedder, &store, &cfg)
        .await
        .unwrap();
    let first_ids = store.ids("test_evidence");
    let first_len = store.len("test_evidence");

    build_or_update_index(&records, &embedder, &store, &cfg)
        .await
        .unwrap();

    assert_eq!(store.ids("test_evidence"), first_ids);
    assert_eq!(store.len("test_evidence"), first_len);
}

#[tokio::test]
async fn test_rebuild_against_missing_target_succeeds() {
    let records = vec![record(
        Some("7"),
        "A sufficiently long abstract describing a drug-drug interaction mechanism.",
    )];
    let embedder = MockEmbedder::new();
    let store = MockStore::default();
    let mut cfg = cfg();
    cfg.rebuild = true;

    // Nothing was ever created under this name; rebuild must not raise.
    let summary = build_or_update_index(&records, &embedder, &store, &cfg)
        .await
        .unwrap();
    assert!(summary.chunks_indexed > 0);
}

#[tokio::test]
async fn test_rebuild_discards_previous_contents() {
    let embedder = MockEmbedder::new();
    let store = MockStore::default();
    let mut cfg = cfg();

    let old = vec![record(Some("old"), "Old corpus entry, long enough to be chunked and indexed.")];
    build_or_update_index(&old, &embedder, &store, &cfg)
        .await
        .unwrap();
    assert!(store.ids("test_evidence").iter().any(|i| i.starts_with("old_c")));

    cfg.rebuild = true;
    let new = vec![record(Some("new"), "New corpus entry, long enough to be chunked and indexed.")];
    build_or_update_index(&new, &embedder, &store, &cfg)
        .await
        .unwrap();

    let ids = store.ids("test_evidence");
    assert!(ids.iter().all(|i| i.starts_with("new_c")));
}

#[tokio::test]
async fn test_batching_bounds_external_calls() {
    // 1 chunk per record (short abstracts, large chunk_size), 10 records,
    // batch_size 4 => ceil(10/4) = 3 embed calls and 3 upserts.
    let records: Vec<PubMedRecord> = (0..10)
        .map(|i| {
            record(
                Some(&format!("{i}")),
                "One chunk worth of abstract text for batching arithmetic.",
            )
        })
        .collect();
    let embedder = MockEmbedder::new();
    let store = MockStore::default();
    let cfg = IndexerConfig {
        collection: "test_evidence".to_string(),
        batch_size: 4,
        chunk_size: 800,
        chunk_overlap: 100,
        min_abstract_len: 20,
        ..Default::default()
    };

    let summary = build_or_update_index(&records, &embedder, &store, &cfg)
        .await
        .unwrap();

    assert_eq!(summary.chunks_indexed, 10);
    assert_eq!(summary.flushes, 3);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.upsert_calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.len("test_evidence"), 10);
}

#[tokio::test]
async fn test_limit_caps_records_processed() {
    let records: Vec<PubMedRecord> = (0..8)
        .map(|i| {
            record(
                Some(&format!("{i}")),
                "One chunk worth of abstract text for the limit check.",
            )
        })
        .collect();
    let embedder = MockEmbedder::new();
    let store = MockStore::default();
    let cfg = IndexerConfig {
        collection: "test_evidence".to_string(),
        limit: Some(3),
        min_abstract_len: 20,
        ..Default::default()
    };

    let summary = build_or_update_index(&records, &embedder, &store, &cfg)
        .await
        .unwrap();
    assert_eq!(summary.records_seen, 3);
    assert_eq!(store.len("test_evidence"), 3);
}

#[tokio::test]
async fn test_limit_counts_only_indexable_records() {
    // Short abstracts are filtered out before the limit applies, so they
    // must not consume the limit budget.
    let records = vec![
        record(Some("1"), "too short"),
        record(Some("2"), "also short"),
        record(
            Some("3"),
            "The only abstract long enough to survive the length filter.",
        ),
    ];
    let embedder = MockEmbedder::new();
    let store = MockStore::default();
    let cfg = IndexerConfig {
        collection: "test_evidence".to_string(),
        limit: Some(2),
        min_abstract_len: 20,
        ..Default::default()
    };

    let summary = build_or_update_index(&records, &embedder, &store, &cfg)
        .await
        .unwrap();

    assert_eq!(summary.records_skipped, 2);
    let ids = store.ids("test_evidence");
    assert!(!ids.is_empty());
    assert!(ids.iter().all(|i| i.starts_with("3_c")));
}

#[tokio::test]
async fn test_no_id_rows_numbered_after_length_filter() {
    // A skipped short record must not shift the row numbering of later
    // pmid-less records.
    let records = vec![
        record(Some("1"), "too short"),
        record(None, "A pmid-less abstract long enough to be chunked and indexed."),
    ];
    let embedder = MockEmbedder::new();
    let store = MockStore::default();

    build_or_update_index(&records, &embedder, &store, &cfg())
        .await
        .unwrap();

    let ids = store.ids("test_evidence");
    assert!(ids.iter().all(|i| i.starts_with("no_id_0_c")));
}

#[tokio::test]
async fn test_upsert_failure_aborts_without_retry() {
    let records = vec![record(
        Some("9"),
        "An abstract long enough to produce at least one indexable chunk.",
    )];
    let embedder = MockEmbedder::new();
    let store = MockStore {
        fail_upserts: true,
        ..Default::default()
    };

    let err = build_or_update_index(&records, &embedder, &store, &cfg())
        .await
        .unwrap_err();
    assert!(matches!(err, PharmakonError::ExternalService(_)));
    // Exactly one embed attempt; nothing retried.
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_chunk_parameters_fail_before_any_network_call() {
    let records = vec![record(Some("1"), "Long enough abstract to reach the chunker call site.")];
    let embedder = MockEmbedder::new();
    let store = MockStore::default();
    let cfg = IndexerConfig {
        chunk_size: 100,
        chunk_overlap: 100,
        min_abstract_len: 20,
        ..Default::default()
    };

    let err = build_or_update_index(&records, &embedder, &store, &cfg)
        .await
        .unwrap_err();
    assert!(matches!(err, PharmakonError::InvalidArgument(_)));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.upsert_calls.load(Ordering::SeqCst), 0);
}
