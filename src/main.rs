//! # Ingest CLI (`ingest`)
//!
//! Command-line front end for the upload ingestion pipeline.
//!
//! ## Usage
//!
//! ```bash
//! ingest --config ./config/ingest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ingest probe` | Check that content sniffing is available |
//! | `ingest files --assistant-id <id> <paths>...` | Ingest files into the assistant's index |
//! | `ingest search --assistant-id <id> "<query>"` | Similarity search over the assistant's index |
//!
//! The vector store endpoint is read from the environment variable named
//! by `[store].url_env` (default `VECTOR_STORE_URL`), e.g.
//! `sqlite://./data/vectors.db` or `memory://`.
//!
//! Record ids and search results go to stdout; logs and summaries go to
//! stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use assistant_ingest::accessor::StoreAccessor;
use assistant_ingest::config::{self, Config};
use assistant_ingest::ingest::{IngestContext, IngestPipeline};
use assistant_ingest::logging::init_logging;
use assistant_ingest::models::NamedStream;
use assistant_ingest::sniff::MimeSniffer;

const DEFAULT_CONFIG_PATH: &str = "./config/ingest.toml";

/// Ingest uploaded files into per-assistant vector indexes.
#[derive(Parser)]
#[command(name = "ingest", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ingest.toml`; built-in defaults are used when
    /// that file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the startup capability probe and report the sniffer backend.
    Probe,

    /// Ingest files and print one record id per line.
    Files {
        /// Assistant whose vector index receives the records.
        #[arg(long)]
        assistant_id: Option<String>,

        /// Files to ingest, processed in order.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Search an assistant's index by similarity to a query.
    Search {
        #[arg(long)]
        assistant_id: String,

        query: String,

        /// Maximum number of results.
        #[arg(long, default_value = "5")]
        limit: usize,
    },
}

fn resolve_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                config::load_config(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = resolve_config(cli.config.as_deref())?;
    init_logging(&cfg.logging)?;

    match cli.command {
        Commands::Probe => {
            let sniffer = MimeSniffer::probe()?;
            println!("content sniffing: ok ({})", sniffer.backend());
        }
        Commands::Files {
            assistant_id,
            paths,
        } => {
            let ctx = IngestContext { assistant_id };
            ctx.require_assistant_id()?;

            let accessor = Arc::new(StoreAccessor::from_config(&cfg)?);
            let pipeline = IngestPipeline::new(&cfg, accessor)?;

            let streams = paths
                .iter()
                .map(|path| {
                    NamedStream::open(path)
                        .with_context(|| format!("Failed to open {}", path.display()))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let ids = pipeline.batch(streams, &ctx).await?;
            for id in &ids {
                println!("{}", id);
            }
            eprintln!("Ingested {} file(s), {} record(s)", paths.len(), ids.len());
        }
        Commands::Search {
            assistant_id,
            query,
            limit,
        } => {
            let ctx = IngestContext::for_assistant(assistant_id);
            let assistant_id = ctx.require_assistant_id()?;

            let accessor = StoreAccessor::from_config(&cfg)?;
            let index = accessor.get(assistant_id).await?;
            let hits = index.similarity_search(&query, limit).await?;

            if hits.is_empty() {
                eprintln!("No results.");
            }
            for (rank, hit) in hits.iter().enumerate() {
                let snippet: String = hit.text.chars().take(160).collect();
                let label = match &hit.title {
                    Some(title) => format!("{} \"{}\"", hit.source, title),
                    None => hit.source.clone(),
                };
                println!(
                    "{}. [{:.3}] {} ({})\n    {}",
                    rank + 1,
                    hit.score,
                    label,
                    hit.id,
                    snippet.replace('\n', " ")
                );
            }
        }
    }

    Ok(())
}
