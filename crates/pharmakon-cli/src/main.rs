//! Pharmakon — drug interaction evidence pipeline.
//! Entry point for the command-line binary.

mod config;

use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use pharmakon_ingestion::embedding::{Embedder, EmbeddingConfig, HttpEmbeddingClient};
use pharmakon_ingestion::extract::{extract_corpus, load_records, write_records};
use pharmakon_ingestion::indexer::{build_or_update_index, IndexerConfig};
use pharmakon_ingestion::store::hosted::{HostedIndexConfig, HostedIndexStore};
use pharmakon_ingestion::store::lance::LanceStore;
use pharmakon_rag::intent::IntentFilter;
use pharmakon_rag::vocab::DrugVocabulary;

const USAGE: &str = "\
Usage: pharmakon <command>

Commands:
  extract                    Parse raw PubMed XML into the records file
  index [--rebuild] [--limit N] [--backend lance|hosted]
                             Chunk, embed and upsert records into the vector store
  check <query>              Screen a query and resolve drug mentions
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pharmakon=debug,info")),
        )
        .init();

    let config = config::Config::load()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("extract") => cmd_extract(&config),
        Some("index") => cmd_index(&config, &args[1..]).await,
        Some("check") => cmd_check(&config, &args[1..]),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

fn cmd_extract(config: &config::Config) -> anyhow::Result<()> {
    let raw_dir = Path::new(&config.paths.raw_pubmed_dir);
    info!(dir = %raw_dir.display(), "Extracting PubMed corpus");

    let (records, summary) = extract_corpus(raw_dir)?;
    write_records(&records, Path::new(&config.paths.records_file))?;

    info!(
        files = summary.files,
        records = summary.records,
        skipped = summary.skipped,
        out = %config.paths.records_file,
        "Extraction complete"
    );
    println!(
        "Extracted {} records from {} files ({} skipped) -> {}",
        summary.records, summary.files, summary.skipped, config.paths.records_file
    );
    Ok(())
}

async fn cmd_index(config: &config::Config, args: &[String]) -> anyhow::Result<()> {
    let mut cfg = IndexerConfig {
        collection: config.index.collection.clone(),
        batch_size: config.index.batch_size,
        chunk_size: config.index.chunk_size,
        chunk_overlap: config.index.chunk_overlap,
        min_abstract_len: config.index.min_abstract_len,
        ..Default::default()
    };

    let mut backend = config.index.backend.clone();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--rebuild" => cfg.rebuild = true,
            "--limit" => {
                let n = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--limit requires a value"))?;
                cfg.limit = Some(n.parse()?);
            }
            "--backend" => {
                backend = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--backend requires a value"))?
                    .clone();
            }
            other => anyhow::bail!("unknown index option: {other}"),
        }
    }

    let records = load_records(Path::new(&config.paths.records_file))?;
    info!(
        records = records.len(),
        backend = %backend,
        collection = %cfg.collection,
        rebuild = cfg.rebuild,
        "Indexing corpus"
    );

    let summary = match backend.as_str() {
        "lance" => {
            let embed_cfg = EmbeddingConfig {
                model: config.embedding.model.clone(),
                dim: config.embedding.dim,
                base_url: config.embedding.base_url.clone(),
                api_key: std::env::var(&config.embedding.api_key_env).ok(),
            };
            let embedder = HttpEmbeddingClient::new(embed_cfg)?;
            let store = LanceStore::open(&config.paths.lance_dir, embedder.dim()).await?;
            build_or_update_index(&records, &embedder, &store, &cfg).await?
        }
        "hosted" => {
            let store = HostedIndexStore::new(HostedIndexConfig {
                host: config.hosted.host.clone(),
                namespace: config.hosted.namespace.clone(),
                embed_model: config.hosted.embed_model.clone(),
                dim: config.hosted.dim,
                api_key_env: config.hosted.api_key_env.clone(),
            })?;
            let embedder = store.inference_embedder();
            // The namespace is the collection for this backend.
            cfg.collection = config.hosted.namespace.clone();
            build_or_update_index(&records, &embedder, &store, &cfg).await?
        }
        other => anyhow::bail!("unknown index backend: {other} (expected lance or hosted)"),
    };

    println!(
        "Indexed {} chunks from {} records ({} skipped) in {} flushes, {} ms",
        summary.chunks_indexed,
        summary.records_seen,
        summary.records_skipped,
        summary.flushes,
        summary.duration_ms
    );
    Ok(())
}

fn cmd_check(config: &config::Config, args: &[String]) -> anyhow::Result<()> {
    let query = args.join(" ");
    if query.trim().is_empty() {
        anyhow::bail!("check requires a query");
    }

    let filter = IntentFilter::with_defaults()?;
    let verdict = filter.validate(&query);
    if !verdict.valid {
        println!("{}", verdict.reason);
        return Ok(());
    }

    let vocab = DrugVocabulary::load(Path::new(&config.paths.vocab_file))?;
    let drugs = vocab.resolve(&query);
    if drugs.is_empty() {
        println!("No known drugs recognised in the query.");
    } else {
        println!("Recognised drugs: {}", drugs.join(", "));
    }
    Ok(())
}
