//! Configuration management
//!
//! Built once at process start from the environment (and `.env`), then
//! adjusted by CLI flags and treated as read-only.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use bioseq_common::{env, BioseqError, Result};

use crate::db::DbConfig;
use crate::models::ColumnVariant;
use crate::schema::{self, TableDefinition, TableMode};

/// Default file ingested by both entry points before anything else.
pub const DEFAULT_INPUT_FILE: &str = "data/sequences.csv";

/// Default directory watched for new files.
pub const DEFAULT_WATCH_DIR: &str = "data/incoming";

/// Default extension of files picked up by the watcher.
pub const DEFAULT_FILE_EXTENSION: &str = "csv";

/// Default pause between a file appearing and its ingestion.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

/// What to do with a row whose required field is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// Count the row as rejected and continue
    #[default]
    SkipRow,
    /// Abort the file at the first such row
    AbortFile,
}

impl std::str::FromStr for MissingFieldPolicy {
    type Err = BioseqError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "skip_row" | "skip" => Ok(MissingFieldPolicy::SkipRow),
            "abort_file" | "abort" => Ok(MissingFieldPolicy::AbortFile),
            _ => Err(BioseqError::invalid_setting(
                "missing field policy",
                s,
                "expected 'skip_row' or 'abort_file'",
            )),
        }
    }
}

/// Full process configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DbConfig,
    pub ingest: IngestConfig,
    pub watch: WatchConfig,
}

/// Ingestion behaviour shared by both entry points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// File ingested once at startup
    pub input_file: PathBuf,
    pub schema: String,
    pub table: String,
    pub table_mode: TableMode,
    pub missing_field_policy: MissingFieldPolicy,
    /// Reject unparseable numeric/date values instead of storing null
    pub strict_values: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from(DEFAULT_INPUT_FILE),
            schema: schema::DEFAULT_SCHEMA.to_string(),
            table: schema::DEFAULT_TABLE.to_string(),
            table_mode: TableMode::default(),
            missing_field_policy: MissingFieldPolicy::default(),
            strict_values: false,
        }
    }
}

impl IngestConfig {
    /// Table definition for files of the given variant
    pub fn table_definition(&self, variant: ColumnVariant) -> Result<TableDefinition> {
        TableDefinition::new(&self.schema, &self.table, variant)
    }
}

/// Directory watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub dir: PathBuf,
    /// Extension without the leading dot, matched exactly
    pub extension: String,
    pub settle_delay_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_WATCH_DIR),
            extension: DEFAULT_FILE_EXTENSION.to_string(),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl WatchConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from the environment and defaults
    ///
    /// See [`DbConfig::from_env`] for the database variables. Ingestion:
    /// `BIOSEQ_INPUT_FILE`, `BIOSEQ_SCHEMA`, `BIOSEQ_TABLE`,
    /// `BIOSEQ_TABLE_MODE`, `BIOSEQ_MISSING_FIELD_POLICY`,
    /// `BIOSEQ_STRICT_VALUES`, `BIOSEQ_WATCH_DIR`, `BIOSEQ_FILE_EXTENSION`,
    /// `BIOSEQ_SETTLE_DELAY_MS`.
    pub fn from_env() -> Result<Self> {
        let ingest_defaults = IngestConfig::default();
        let watch_defaults = WatchConfig::default();

        let config = Self {
            database: DbConfig::from_env()?,
            ingest: IngestConfig {
                input_file: env::var("BIOSEQ_INPUT_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(ingest_defaults.input_file),
                schema: env::var("BIOSEQ_SCHEMA").unwrap_or(ingest_defaults.schema),
                table: env::var("BIOSEQ_TABLE").unwrap_or(ingest_defaults.table),
                table_mode: env::parse("BIOSEQ_TABLE_MODE")?
                    .unwrap_or(ingest_defaults.table_mode),
                missing_field_policy: env::parse("BIOSEQ_MISSING_FIELD_POLICY")?
                    .unwrap_or(ingest_defaults.missing_field_policy),
                strict_values: env::flag("BIOSEQ_STRICT_VALUES")?
                    .unwrap_or(ingest_defaults.strict_values),
            },
            watch: WatchConfig {
                dir: env::var("BIOSEQ_WATCH_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(watch_defaults.dir),
                extension: env::var("BIOSEQ_FILE_EXTENSION")
                    .unwrap_or(watch_defaults.extension),
                settle_delay_ms: env::parse("BIOSEQ_SETTLE_DELAY_MS")?
                    .unwrap_or(watch_defaults.settle_delay_ms),
            },
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.database
            .validate()
            .map_err(|e| BioseqError::config(e.to_string()))?;

        schema::validate_identifier("schema", &self.ingest.schema)?;
        schema::validate_identifier("table", &self.ingest.table)?;

        let extension = self.watch.extension.trim();
        if extension.is_empty() || extension.starts_with('.') {
            return Err(BioseqError::invalid_setting(
                "file extension",
                &self.watch.extension,
                "must be non-empty and given without the leading dot",
            ));
        }

        if self.ingest.table_mode == TableMode::Recreate {
            tracing::warn!(
                table = %self.ingest.table,
                "Table mode is 'recreate': existing rows are dropped on every run"
            );
        }

        Ok(())
    }
}
