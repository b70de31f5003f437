use std::env;
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use passagedb_core::config::Config;
use passagedb_core::traits::Embedder;
use passagedb_core::types::Document;
use passagedb_embed::HashEmbedder;
use passagedb_engine::{ChunkStrategy, ChunkingConfig, Collection, CollectionConfig};
use passagedb_split::Language;
use passagedb_walk::walk;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {prog} <ingest|search|show|delete> [args...]");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn collection_config(config: &Config) -> anyhow::Result<CollectionConfig> {
    let embedding_dim: usize = config.get("collection.embedding_dim").unwrap_or(256);
    let strategy: String = config.get("collection.strategy").unwrap_or_else(|_| "sentence".to_string());
    let target_size: usize = config.get("collection.chunk_size").unwrap_or(1024);
    let chunking = match strategy.as_str() {
        "none" => None,
        "sentence" => Some(ChunkingConfig { target_size, strategy: ChunkStrategy::Sentence }),
        other => {
            let lang = match other.strip_prefix("code:") {
                Some("rust") => Language::Rust,
                Some("python") => Language::Python,
                Some("javascript") => Language::JavaScript,
                Some("go") => Language::Go,
                Some("c") => Language::C,
                _ => anyhow::bail!("unknown chunking strategy: {other}"),
            };
            Some(ChunkingConfig { target_size, strategy: ChunkStrategy::Code(lang) })
        }
    };
    Ok(CollectionConfig { embedding_dim, chunking })
}

async fn open_collection(config: &Config) -> anyhow::Result<Collection> {
    let dir: String = config.get("collection.dir").unwrap_or_else(|_| "./passagedb_data".to_string());
    // Relative collection dirs are anchored to the invocation directory.
    let root = passagedb_core::config::resolve_with_base(&env::current_dir()?, &dir);
    Ok(Collection::create(&root, collection_config(config)?).await?)
}

async fn run(cmd: &str, args: &[String], config: &Config) -> anyhow::Result<()> {
    match cmd {
        "ingest" => {
            let data_dir = args.first().map(PathBuf::from).unwrap_or_else(|| {
                let dir: String = config.get("data.raw_dir").unwrap_or_else(|_| "./data".to_string());
                PathBuf::from(dir)
            });
            let ignore = vec![".git".to_string(), "target".to_string(), "node_modules".to_string()];
            println!("Ingesting from {}", data_dir.display());

            let mut coll = open_collection(config).await?;
            let embedder = HashEmbedder::new(coll.config().embedding_dim);
            let records = walk(&data_dir, &ignore);
            let bar = ProgressBar::new(records.len() as u64);
            bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")?);

            let mut indexed = 0usize;
            for record in records {
                bar.inc(1);
                let Ok(content) = std::fs::read_to_string(&record.path) else {
                    tracing::warn!(path = %record.path.display(), "skipping unreadable or non-utf8 file");
                    continue;
                };
                let link = record.path.to_string_lossy().to_string();
                let mut doc = Document::new(link, content);
                doc.metadata = record.metadata();
                match coll.indexer().upsert(&doc, &embedder).await {
                    Ok(fragments) => {
                        indexed += 1;
                        bar.set_message(format!("{} ({fragments} fragments)", doc.link));
                    }
                    Err(e) => tracing::error!(link = %doc.link, error = %e, "upsert failed"),
                }
            }
            bar.finish_and_clear();
            println!("✅ Ingest complete ({indexed} documents)");
        }
        "search" => {
            let query = args.first().cloned().unwrap_or_else(|| {
                eprintln!("Usage: passagedb search \"<query>\" [limit]");
                std::process::exit(1)
            });
            let limit: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(10);

            let coll = open_collection(config).await?;
            let embedder = HashEmbedder::new(coll.config().embedding_dim);
            let query_vec = embedder
                .embed_batch(&[query.clone()])?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("embedder returned no query vector"))?;
            let results = coll.query_engine().search(&query, Some(&query_vec), limit).await?;
            for result in &results {
                println!("{}", serde_json::to_string(result)?);
            }
            if results.is_empty() {
                println!("(no results)");
            }
        }
        "show" => {
            let link = args.first().cloned().unwrap_or_else(|| {
                eprintln!("Usage: passagedb show <link>");
                std::process::exit(1)
            });
            let coll = open_collection(config).await?;
            println!("{}", coll.document_text(&link).await?);
        }
        "delete" => {
            let link = args.first().cloned().unwrap_or_else(|| {
                eprintln!("Usage: passagedb delete <link>");
                std::process::exit(1)
            });
            let mut coll = open_collection(config).await?;
            coll.indexer().delete(&link).await?;
            println!("✅ Deleted {link}");
        }
        _ => {
            eprintln!("Unknown command: {cmd}");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let (cmd, args) = parse_args();
    tokio::runtime::Runtime::new()?.block_on(run(&cmd, &args, &config))
}
