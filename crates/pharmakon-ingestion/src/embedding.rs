//! Embedding client — turns a batch of chunk texts into vectors.
//!
//! The embedding model is an opaque remote service: one order-preserving
//! vector per input text, dimensionality fixed by the configured model. The
//! HTTP client here speaks the OpenAI-compatible `/v1/embeddings` shape, which
//! covers OpenAI itself plus Groq/Together/Ollama-style endpoints. The hosted
//! vector index's own inference endpoint lives with that backend in
//! `store::hosted`.

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, instrument};

use pharmakon_common::{PharmakonError, Result};

/// Opaque embedding collaborator. One vector per input text, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Output dimensionality, fixed by the configured model.
    fn dim(&self) -> usize;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dim: usize,
    /// Base URL of an OpenAI-compatible endpoint, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dim: 1536,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
        }
    }
}

/// OpenAI-compatible embedding client.
pub struct HttpEmbeddingClient {
    cfg: EmbeddingConfig,
    client: reqwest::Client,
}

impl HttpEmbeddingClient {
    pub fn new(cfg: EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self { cfg, client })
    }
}

#[async_trait]
impl Embedder for HttpEmbeddingClient {
    #[instrument(skip(self, texts), fields(n = texts.len(), model = %self.cfg.model))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let body = serde_json::json!({
            "model": &self.cfg.model,
            "input": texts,
        });
        let url = format!("{}/embeddings", self.cfg.base_url.trim_end_matches('/'));

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let resp: serde_json::Value = req.send().await?.error_for_status()?.json().await?;
        let vectors = parse_embeddings_response(&resp)?;

        if vectors.len() != texts.len() {
            return Err(PharmakonError::ExternalService(format!(
                "embedding service returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        debug!(n = vectors.len(), "Batch embedded");
        Ok(vectors)
    }

    fn dim(&self) -> usize {
        self.cfg.dim
    }
}

/// Parse the `{"data": [{"index": i, "embedding": [..]}]}` response shape,
/// re-ordered by index so output order matches input order.
pub(crate) fn parse_embeddings_response(resp: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = resp["data"]
        .as_array()
        .context("embedding response missing 'data' array")?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (i, item) in data.iter().enumerate() {
        let idx = item["index"].as_u64().map(|v| v as usize).unwrap_or(i);
        let vec = item["embedding"]
            .as_array()
            .context("embedding item missing 'embedding' array")?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        indexed.push((idx, vec));
    }
    indexed.sort_by_key(|(idx, _)| *idx);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embeddings_reorders_by_index() {
        let resp = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [3.0, 4.0] },
                { "index": 0, "embedding": [1.0, 2.0] },
            ]
        });
        let vectors = parse_embeddings_response(&resp).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_parse_embeddings_missing_data_is_an_error() {
        let resp = serde_json::json!({ "error": "boom" });
        assert!(parse_embeddings_response(&resp).is_err());
    }
}
