//! Local persistent vector store backed by LanceDB.
//!
//! Each collection is one Lance table: chunk id, text, provenance columns,
//! and a fixed-size embedding column. Upsert uses `merge_insert` keyed on
//! `id`, so re-running ingestion over the same records overwrites in place.

use std::path::Path;
use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::connection::Connection;
use tracing::{debug, info};

use pharmakon_common::{PharmakonError, Result};

use super::{VectorRecord, VectorStore};

/// LanceDB-backed store rooted at a local directory.
#[derive(Clone)]
pub struct LanceStore {
    conn: Connection,
    dim: usize,
}

impl LanceStore {
    /// Open or create a Lance database at `path`.
    pub async fn open(path: impl AsRef<Path>, dim: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }
        let conn = lancedb::connect(&path.to_string_lossy())
            .execute()
            .await
            .map_err(store_err)?;
        Ok(Self { conn, dim })
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("pmid", DataType::Utf8, true),
            Field::new("title", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int64, false),
            Field::new("chunk_start", DataType::Int64, false),
            Field::new("chunk_end", DataType::Int64, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.dim as i32,
                ),
                true,
            ),
        ]))
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let tables = self
            .conn
            .table_names()
            .execute()
            .await
            .map_err(store_err)?;
        Ok(tables.contains(&name.to_string()))
    }

    /// Create the table with an empty batch; LanceDB needs a schema up front.
    async fn create_table(&self, name: &str) -> Result<()> {
        let schema = self.schema();
        let empty = arrow_array::RecordBatchIterator::new(vec![], schema);
        self.conn
            .create_table(name, empty)
            .execute()
            .await
            .map_err(store_err)?;
        debug!(collection = name, "Lance table created");
        Ok(())
    }

    async fn ensure_table(&self, name: &str) -> Result<()> {
        if !self.table_exists(name).await? {
            self.create_table(name).await?;
        }
        Ok(())
    }

    fn batch_to_record(&self, records: &[VectorRecord]) -> Result<RecordBatch> {
        let mut flat = Vec::with_capacity(records.len() * self.dim);
        for r in records {
            if r.vector.len() != self.dim {
                return Err(PharmakonError::ExternalService(format!(
                    "embedding dimension mismatch for id {}: expected {}, got {}",
                    r.id,
                    self.dim,
                    r.vector.len()
                )));
            }
            flat.extend_from_slice(&r.vector);
        }

        let embedding = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, false)),
            self.dim as i32,
            Arc::new(Float32Array::from(flat)),
            None,
        )
        .map_err(|e| PharmakonError::ExternalService(format!("arrow error: {e}")))?;

        let id = StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()));
        let text = StringArray::from_iter_values(records.iter().map(|r| r.text.as_str()));
        let pmid = StringArray::from(
            records
                .iter()
                .map(|r| r.metadata.pmid.as_deref())
                .collect::<Vec<_>>(),
        );
        let title = StringArray::from_iter_values(records.iter().map(|r| r.metadata.title.as_str()));
        let source =
            StringArray::from_iter_values(records.iter().map(|r| r.metadata.source.as_str()));
        let chunk_index = Int64Array::from_iter_values(
            records.iter().map(|r| r.metadata.chunk_index as i64),
        );
        let chunk_start = Int64Array::from_iter_values(
            records.iter().map(|r| r.metadata.chunk_start as i64),
        );
        let chunk_end =
            Int64Array::from_iter_values(records.iter().map(|r| r.metadata.chunk_end as i64));

        RecordBatch::try_new(
            self.schema(),
            vec![
                Arc::new(id) as Arc<dyn Array>,
                Arc::new(text),
                Arc::new(pmid),
                Arc::new(title),
                Arc::new(source),
                Arc::new(chunk_index),
                Arc::new(chunk_start),
                Arc::new(chunk_end),
                Arc::new(embedding),
            ],
        )
        .map_err(|e| PharmakonError::ExternalService(format!("arrow error: {e}")))
    }

    /// Total rows in a collection (testing/observability).
    pub async fn count(&self, collection: &str) -> Result<usize> {
        if !self.table_exists(collection).await? {
            return Ok(0);
        }
        let table = self
            .conn
            .open_table(collection)
            .execute()
            .await
            .map_err(store_err)?;
        let n = table.count_rows(None).await.map_err(store_err)?;
        Ok(n)
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn recreate(&self, collection: &str) -> Result<()> {
        let existed = self.delete_collection(collection).await?;
        if existed {
            info!(collection, "Deleted existing collection to rebuild");
        } else {
            info!(collection, "Collection not found; building a fresh one");
        }
        self.create_table(collection).await
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        match self.conn.drop_table(collection, &[]).await {
            Ok(()) => Ok(true),
            Err(lancedb::Error::TableNotFound { .. }) => Ok(false),
            Err(e) => Err(store_err(e)),
        }
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.ensure_table(collection).await?;

        let batch = self.batch_to_record(records)?;
        let schema = batch.schema();
        let reader = Box::new(arrow_array::RecordBatchIterator::new(
            vec![Ok(batch)],
            schema,
        ));

        let table = self
            .conn
            .open_table(collection)
            .execute()
            .await
            .map_err(store_err)?;

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge.execute(reader).await.map_err(store_err)?;

        debug!(collection, n = records.len(), "Batch upserted");
        Ok(())
    }
}

fn store_err(e: lancedb::Error) -> PharmakonError {
    PharmakonError::ExternalService(format!("LanceDB error: {e}"))
}
