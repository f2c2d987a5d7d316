//! # Assistant Ingest
//!
//! Turns uploaded files into embedded, searchable chunks stored in a
//! vector index scoped to one assistant.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────┐   ┌────────┐   ┌─────────┐   ┌──────────────┐
//! │ NamedStream│──▶│ Blob │──▶│ Parser │──▶│ Chunker │──▶│ VectorIndex  │
//! │  (upload)  │   │+sniff│   │registry│   │1000/200 │   │ embed+store  │
//! └────────────┘   └──────┘   └────────┘   └─────────┘   └──────┬───────┘
//!                                                                │
//!                                           StoreAccessor (LRU per assistant id)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use assistant_ingest::accessor::StoreAccessor;
//! use assistant_ingest::config::Config;
//! use assistant_ingest::ingest::{IngestContext, IngestPipeline};
//! use assistant_ingest::models::NamedStream;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! let accessor = Arc::new(StoreAccessor::from_config(&config)?);
//! let pipeline = IngestPipeline::new(&config, accessor)?;
//!
//! let ctx = IngestContext::for_assistant("asst_123");
//! let ids = pipeline
//!     .invoke(NamedStream::from_bytes("notes.txt", "hello"), &ctx)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`sniff`] | Content-based MIME detection |
//! | [`blob`] | In-memory file wrapper |
//! | [`parse`] | MIME-dispatched document parsers |
//! | [`chunk`] | Overlapping text chunker |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store backends |
//! | [`accessor`] | Memoized per-assistant store handles |
//! | [`ingest`] | Pipeline orchestration |
//! | [`logging`] | Tracing subscriber setup |

pub mod accessor;
pub mod blob;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod parse;
pub mod sniff;
pub mod store;

pub use error::IngestError;
