//! Vector store abstraction.
//!
//! Two concrete backends sit behind one trait so the orchestrator has a
//! single chunk-batch-flush loop: a local persistent LanceDB collection keyed
//! by name, and a hosted namespaced index reachable by host URL. The store is
//! expected to treat a write to an existing ID as a replace; the orchestrator
//! relies on that for idempotent incremental ingestion but does not enforce it.

pub mod hosted;
pub mod lance;

use async_trait::async_trait;

use pharmakon_common::Result;

use crate::models::ChunkMetadata;

/// One embedded chunk ready for upsert.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Destroy and recreate the target collection. Deleting a collection
    /// that does not exist is not a failure for this operation.
    async fn recreate(&self, collection: &str) -> Result<()>;

    /// Delete the collection. Returns whether it existed.
    async fn delete_collection(&self, collection: &str) -> Result<bool>;

    /// Write a batch, replacing any records with the same IDs. Creates the
    /// collection lazily if needed.
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()>;
}
