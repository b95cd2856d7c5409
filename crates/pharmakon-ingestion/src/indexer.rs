//! Indexing orchestrator: chunk -> embed -> upsert, in bounded batches.
//!
//! Drives records through the chunker, accumulates `(id, text, metadata)`
//! entries, and flushes each full batch with one embedding call followed by
//! one vector-store upsert. External calls are bounded by
//! `ceil(total_chunks / batch_size)`; peak memory is one batch of texts plus
//! one batch of vectors.
//!
//! IDs are deterministic (`{pmid | no_id_{row}}_c{chunk_index}`), so
//! incremental re-runs over the same records converge to the same store
//! state instead of appending duplicates. Flush failures propagate and abort
//! the run; batches already flushed stay in the store (at-least-once).

use tracing::{debug, info, instrument};

use pharmakon_common::Result;

use crate::chunker::chunk_text;
use crate::embedding::Embedder;
use crate::models::{ChunkMetadata, IndexEntry, PubMedRecord};
use crate::store::{VectorRecord, VectorStore};

/// Ingestion parameters for one indexing run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IndexerConfig {
    /// Target collection (Lance table) or namespace (hosted index).
    pub collection: String,
    /// Chunks per embed/upsert round trip.
    pub batch_size: usize,
    /// Chunker window, in characters.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Records whose abstract is at or below this length are not indexed.
    pub min_abstract_len: usize,
    /// Destroy and recreate the target before writing.
    pub rebuild: bool,
    /// Cap on indexable records, applied after the length filter, for testing.
    pub limit: Option<usize>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            collection: "pubmed_evidence".to_string(),
            batch_size: 100,
            chunk_size: 800,
            chunk_overlap: 100,
            min_abstract_len: 20,
            rebuild: false,
            limit: None,
        }
    }
}

/// Outcome of one indexing run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IndexSummary {
    pub records_seen: usize,
    pub records_skipped: usize,
    pub chunks_indexed: usize,
    pub flushes: usize,
    pub duration_ms: u64,
}

/// Run the full chunk -> embed -> upsert pass over `records`.
///
/// Character counts below use `chars().count()`, matching the chunker's
/// character-offset model.
#[instrument(skip(records, embedder, store), fields(collection = %cfg.collection, rebuild = cfg.rebuild))]
pub async fn build_or_update_index(
    records: &[PubMedRecord],
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    cfg: &IndexerConfig,
) -> Result<IndexSummary> {
    let t0 = std::time::Instant::now();

    if cfg.rebuild {
        store.recreate(&cfg.collection).await?;
    }

    info!(
        total = records.len(),
        limit = cfg.limit,
        batch_size = cfg.batch_size,
        "Starting chunking -> embedding -> upsert"
    );

    let mut summary = IndexSummary::default();
    let mut batch: Vec<IndexEntry> = Vec::with_capacity(cfg.batch_size);
    // Position among indexable records: short abstracts are filtered out
    // before the limit or the no-pmid row numbering see them.
    let mut row_idx = 0usize;

    for record in records {
        if cfg.limit.is_some_and(|limit| row_idx >= limit) {
            break;
        }
        summary.records_seen += 1;

        if record.abstract_text.chars().count() <= cfg.min_abstract_len {
            summary.records_skipped += 1;
            continue;
        }

        let base_id = record
            .pmid
            .clone()
            .unwrap_or_else(|| format!("no_id_{row_idx}"));
        row_idx += 1;

        let chunks = chunk_text(&record.abstract_text, cfg.chunk_size, cfg.chunk_overlap)?;
        for (chunk_idx, chunk) in chunks.into_iter().enumerate() {
            batch.push(IndexEntry {
                id: format!("{base_id}_c{chunk_idx}"),
                text: chunk.text,
                metadata: ChunkMetadata {
                    pmid: record.pmid.clone(),
                    title: record.title.clone(),
                    source: record.source_file.clone(),
                    chunk_index: chunk_idx,
                    chunk_start: chunk.start,
                    chunk_end: chunk.end,
                },
            });

            if batch.len() >= cfg.batch_size {
                summary.chunks_indexed += flush(&mut batch, embedder, store, &cfg.collection).await?;
                summary.flushes += 1;
            }
        }
    }

    // Remainder flush (0 to batch_size - 1 entries).
    if !batch.is_empty() {
        let n = flush(&mut batch, embedder, store, &cfg.collection).await?;
        summary.chunks_indexed += n;
        summary.flushes += 1;
        debug!(n, "Final partial batch flushed");
    }

    summary.duration_ms = t0.elapsed().as_millis() as u64;

    info!(
        records = summary.records_seen,
        skipped = summary.records_skipped,
        chunks = summary.chunks_indexed,
        flushes = summary.flushes,
        duration_ms = summary.duration_ms,
        "Indexing complete"
    );
    Ok(summary)
}

/// One embed-then-upsert round trip for the pending batch; clears it and
/// returns the number of chunks written.
async fn flush(
    batch: &mut Vec<IndexEntry>,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    collection: &str,
) -> Result<usize> {
    if batch.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = batch.iter().map(|e| e.text.clone()).collect();
    let vectors = embedder.embed(&texts).await?;
    if vectors.len() != batch.len() {
        return Err(pharmakon_common::PharmakonError::ExternalService(format!(
            "embedder returned {} vectors for {} texts",
            vectors.len(),
            batch.len()
        )));
    }

    let records: Vec<VectorRecord> = batch
        .drain(..)
        .zip(vectors)
        .map(|(entry, vector)| VectorRecord {
            id: entry.id,
            text: entry.text,
            vector,
            metadata: entry.metadata,
        })
        .collect();

    store.upsert(collection, &records).await?;
    Ok(records.len())
}
