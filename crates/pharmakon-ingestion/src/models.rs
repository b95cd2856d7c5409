//! Data models for the ingestion pipeline.

use serde::{Deserialize, Serialize};

/// One extracted bibliographic record: title + abstract + provenance.
/// Immutable once created; consumed exactly once per ingestion pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubMedRecord {
    pub pmid: Option<String>,
    pub title: String,
    pub abstract_text: String,
    /// Name of the XML file the record came from.
    pub source_file: String,
}

/// A bounded substring of a record's abstract, sized for embedding.
///
/// `start`/`end` are character offsets into the trimmed abstract, recorded
/// before the chunk's own trim. `0 <= start < end <= len`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Provenance carried alongside each indexed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub pmid: Option<String>,
    pub title: String,
    pub source: String,
    pub chunk_index: usize,
    pub chunk_start: usize,
    pub chunk_end: usize,
}

/// One pending entry in the current index batch, before embedding.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}
