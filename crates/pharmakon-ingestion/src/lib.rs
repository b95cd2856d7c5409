//! pharmakon-ingestion — corpus preparation pipeline.
//!
//! - Streaming PubMed XML extraction into flat records
//! - Character chunking with overlap and boundary snapping
//! - Embedding client (opaque remote service)
//! - Vector store backends (local LanceDB, hosted namespaced index)
//! - Batched indexing orchestrator

pub mod chunker;
pub mod embedding;
pub mod extract;
pub mod indexer;
pub mod models;
pub mod store;
