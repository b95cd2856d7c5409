//! Configuration loading for Pharmakon.
//! Reads pharmakon.toml from the current directory or path in PHARMAKON_CONFIG env var.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub hosted: HostedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_pubmed_dir: String,
    #[serde(default = "default_records_file")]
    pub records_file: String,
    #[serde(default = "default_vocab_file")]
    pub vocab_file: String,
    #[serde(default = "default_lance_dir")]
    pub lance_dir: String,
}

fn default_raw_dir()      -> String { "./data/raw_pubmed".to_string() }
fn default_records_file() -> String { "./data/pubmed_records.jsonl".to_string() }
fn default_vocab_file()   -> String { "./data/drug_vocabulary.tsv".to_string() }
fn default_lance_dir()    -> String { "./data/lancedb".to_string() }

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_pubmed_dir: default_raw_dir(),
            records_file: default_records_file(),
            vocab_file: default_vocab_file(),
            lance_dir: default_lance_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_index_batch")]
    pub batch_size: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_min_abstract_len")]
    pub min_abstract_len: usize,
}

fn default_backend()          -> String { "lance".to_string() }
fn default_collection()       -> String { "pubmed_evidence".to_string() }
fn default_index_batch()      -> usize  { 100 }
fn default_chunk_size()       -> usize  { 800 }
fn default_chunk_overlap()    -> usize  { 100 }
fn default_min_abstract_len() -> usize  { 20 }

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            collection: default_collection(),
            batch_size: default_index_batch(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_abstract_len: default_min_abstract_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embed_model")]
    pub model: String,
    #[serde(default = "default_embed_dim")]
    pub dim: usize,
    #[serde(default = "default_embed_url")]
    pub base_url: String,
    #[serde(default = "default_embed_key_env")]
    pub api_key_env: String,
}

fn default_embed_model()   -> String { "text-embedding-3-small".to_string() }
fn default_embed_dim()     -> usize  { 1536 }
fn default_embed_url()     -> String { "https://api.openai.com/v1".to_string() }
fn default_embed_key_env() -> String { "OPENAI_API_KEY".to_string() }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embed_model(),
            dim: default_embed_dim(),
            base_url: default_embed_url(),
            api_key_env: default_embed_key_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_hosted_model")]
    pub embed_model: String,
    #[serde(default = "default_hosted_dim")]
    pub dim: usize,
    #[serde(default = "default_hosted_key_env")]
    pub api_key_env: String,
}

fn default_namespace()      -> String { "default".to_string() }
fn default_hosted_model()   -> String { "llama-text-embed-v2".to_string() }
fn default_hosted_dim()     -> usize  { 1024 }
fn default_hosted_key_env() -> String { "PINECONE_API_KEY".to_string() }

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            namespace: default_namespace(),
            embed_model: default_hosted_model(),
            dim: default_hosted_dim(),
            api_key_env: default_hosted_key_env(),
        }
    }
}

impl Config {
    /// Load configuration from pharmakon.toml.
    /// Checks PHARMAKON_CONFIG env var first, then current directory.
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("PHARMAKON_CONFIG")
            .unwrap_or_else(|_| "pharmakon.toml".to_string());

        if !Path::new(&path).exists() {
            tracing::debug!(path, "No config file found, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
