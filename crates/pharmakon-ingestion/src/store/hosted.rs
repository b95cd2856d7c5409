//! Hosted namespaced vector index reachable by host URL.
//!
//! Speaks the serverless-index JSON API: `POST /vectors/upsert` with a
//! namespace, `POST /vectors/delete` with `deleteAll` to purge a namespace,
//! and `POST /embed` when embedding is delegated to the store's own
//! inference endpoint. The API key comes from the environment and its
//! absence is a fatal precondition, raised before any work begins.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, instrument};

use pharmakon_common::{PharmakonError, Result};

use super::{VectorRecord, VectorStore};
use crate::embedding::Embedder;

/// Environment variable holding the hosted index API key.
pub const DEFAULT_API_KEY_ENV: &str = "PINECONE_API_KEY";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HostedIndexConfig {
    /// Index host URL, e.g. `https://my-index-abc123.svc.pinecone.io`.
    pub host: String,
    /// Namespace written to; the "collection" for this backend.
    pub namespace: String,
    /// Model used when embedding is delegated to the store.
    pub embed_model: String,
    /// Embedding dimensionality of the hosted model.
    pub dim: usize,
    /// Env var the API key is read from.
    pub api_key_env: String,
}

impl Default for HostedIndexConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            namespace: "default".to_string(),
            embed_model: "llama-text-embed-v2".to_string(),
            dim: 1024,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

/// Client for the hosted index. Construction resolves the credential so a
/// missing key aborts before any chunking or network traffic.
#[derive(Clone)]
pub struct HostedIndexStore {
    cfg: HostedIndexConfig,
    api_key: String,
    client: reqwest::Client,
}

impl HostedIndexStore {
    pub fn new(cfg: HostedIndexConfig) -> Result<Self> {
        if cfg.host.is_empty() {
            return Err(PharmakonError::PreconditionFailed(
                "hosted index host URL is not configured".to_string(),
            ));
        }
        let api_key = std::env::var(&cfg.api_key_env).map_err(|_| {
            PharmakonError::PreconditionFailed(format!(
                "missing hosted index API key: set {} before indexing",
                cfg.api_key_env
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self { cfg, api_key, client })
    }

    pub fn config(&self) -> &HostedIndexConfig {
        &self.cfg
    }

    /// Embedder that delegates to the store's inference endpoint.
    pub fn inference_embedder(&self) -> HostedEmbedder {
        HostedEmbedder {
            store: self.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.host.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let resp = self
            .client
            .post(self.url(path))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        Ok(resp)
    }
}

#[async_trait]
impl VectorStore for HostedIndexStore {
    async fn recreate(&self, collection: &str) -> Result<()> {
        // The hosted index exists independently of ingestion; rebuild means
        // purging the namespace. A namespace that never existed is fine.
        let existed = self.delete_collection(collection).await?;
        if existed {
            info!(namespace = collection, "Purged hosted namespace to rebuild");
        } else {
            info!(namespace = collection, "Hosted namespace not found; starting fresh");
        }
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        let body = json!({ "deleteAll": true, "namespace": collection });
        let resp = self.post("vectors/delete", body).await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !resp.status().is_success() {
            return Err(PharmakonError::ExternalService(format!(
                "hosted index delete failed: HTTP {}",
                resp.status()
            )));
        }
        Ok(true)
    }

    #[instrument(skip(self, records), fields(namespace = collection, n = records.len()))]
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let vectors: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                json!({
                    "id": r.id,
                    "values": r.vector,
                    "metadata": {
                        "pmid": r.metadata.pmid,
                        "title": r.metadata.title,
                        "source": r.metadata.source,
                        "chunk_index": r.metadata.chunk_index,
                        "chunk_start": r.metadata.chunk_start,
                        "chunk_end": r.metadata.chunk_end,
                        "text": r.text,
                    },
                })
            })
            .collect();

        let body = json!({ "vectors": vectors, "namespace": collection });
        let resp = self.post("vectors/upsert", body).await?;
        if !resp.status().is_success() {
            return Err(PharmakonError::ExternalService(format!(
                "hosted index upsert failed: HTTP {}",
                resp.status()
            )));
        }
        debug!("Hosted batch upserted");
        Ok(())
    }
}

/// Embedding delegated to the hosted store's inference endpoint.
pub struct HostedEmbedder {
    store: HostedIndexStore,
}

#[async_trait]
impl Embedder for HostedEmbedder {
    #[instrument(skip(self, texts), fields(n = texts.len(), model = %self.store.cfg.embed_model))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let body = json!({
            "model": self.store.cfg.embed_model,
            "inputs": texts,
            "parameters": { "input_type": "passage" },
        });
        let resp = self.store.post("embed", body).await?;
        if !resp.status().is_success() {
            return Err(PharmakonError::ExternalService(format!(
                "hosted inference embed failed: HTTP {}",
                resp.status()
            )));
        }
        let payload: serde_json::Value = resp.json().await?;
        let vectors = parse_inference_response(&payload)?;
        if vectors.len() != texts.len() {
            return Err(PharmakonError::ExternalService(format!(
                "hosted inference returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    fn dim(&self) -> usize {
        self.store.cfg.dim
    }
}

/// Parse the inference `{"data": [{"values": [..]}]}` shape, order-preserving.
fn parse_inference_response(resp: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = resp["data"].as_array().ok_or_else(|| {
        PharmakonError::ExternalService("inference response missing 'data' array".to_string())
    })?;
    data.iter()
        .map(|item| {
            item["values"]
                .as_array()
                .map(|vals| {
                    vals.iter()
                        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                        .collect::<Vec<f32>>()
                })
                .ok_or_else(|| {
                    PharmakonError::ExternalService(
                        "inference item missing 'values' array".to_string(),
                    )
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inference_values() {
        let resp = serde_json::json!({
            "data": [ { "values": [0.1, 0.2] }, { "values": [0.3, 0.4] } ]
        });
        let v = parse_inference_response(&resp).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[1], vec![0.3f32, 0.4f32]);
    }

    #[test]
    fn test_missing_api_key_is_a_precondition_failure() {
        let cfg = HostedIndexConfig {
            host: "https://example-index.svc.example.io".to_string(),
            api_key_env: "PHARMAKON_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HostedIndexStore::new(cfg),
            Err(PharmakonError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_missing_host_is_a_precondition_failure() {
        let cfg = HostedIndexConfig::default();
        assert!(matches!(
            HostedIndexStore::new(cfg),
            Err(PharmakonError::PreconditionFailed(_))
        ));
    }
}
