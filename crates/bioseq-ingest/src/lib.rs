//! bioseq Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads CSV files of biological sequence records into a PostgreSQL table.
//!
//! # Pipeline
//!
//! - **Schema Manager** ([`schema`]): ensures the target table exists
//! - **Record Normalizer** ([`normalizer`]): raw CSV row to canonical record
//! - **Loader** ([`loader`]): one parameterized insert per record
//! - **Ingestion Orchestrator** ([`orchestrator`]): drives one file end to end
//! - **Directory Watcher** ([`watcher`]): ingests files as they appear
//!
//! # Column Variants
//!
//! - `standard`: 15 columns (sequence, origin, liability counts, format)
//! - `project`: 17 columns, the standard ones plus `Project_Name` and
//!   `Date_Created` (read from the `Project` and `DATE_CREATED` CSV columns)
//!
//! # Example
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//! use bioseq_ingest::{AppConfig, ColumnVariant, Ingestor, PgStoreProvider};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let provider = PgStoreProvider::new(config.database.clone())?;
//!     let ingestor = Ingestor::new(provider, Arc::new(config.ingest.clone()));
//!
//!     let summary = ingestor
//!         .ingest(Path::new("data/sequences.csv"), ColumnVariant::Standard)
//!         .await?;
//!     println!("inserted {} rows", summary.inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod schema;
pub mod watcher;

pub use config::{AppConfig, IngestConfig, MissingFieldPolicy, WatchConfig};
pub use db::{DbConfig, DbError, PgStoreProvider, SequenceStore, StoreProvider};
pub use error::{IngestError, MissingFieldError, NormalizeError};
pub use loader::RowOutcome;
pub use models::{CanonicalRecord, ColumnVariant, RawRecord};
pub use normalizer::Normalizer;
pub use orchestrator::{IngestSummary, Ingestor};
pub use schema::{SchemaAction, TableDefinition, TableMode};
pub use watcher::{DirectoryWatcher, FileHandler, IngestHandler, Subscription};
