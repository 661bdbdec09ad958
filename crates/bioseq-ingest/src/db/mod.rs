//! Store handle and connection provider
//!
//! Ingestion talks to the database through [`SequenceStore`], a single
//! connection-scoped handle, and obtains one per `ingest` call from a
//! [`StoreProvider`]. [`postgres`] holds the PostgreSQL implementation.

pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::CanonicalRecord;
use crate::schema::TableDefinition;

pub use postgres::{PgSequenceStore, PgStoreProvider};

/// Default database host
pub const DEFAULT_DB_HOST: &str = "localhost";

/// Default database port
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default database name
pub const DEFAULT_DB_NAME: &str = "postgres";

/// Default database user
pub const DEFAULT_DB_USER: &str = "postgres";

/// Default connection timeout in seconds
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Database operation errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Database configuration is invalid or missing
    #[error("Database configuration error: {0}. Check DATABASE_URL and DB_* settings.")]
    Config(String),

    #[error("Timed out after {0}s connecting to the database")]
    Timeout(u64),

    /// Statement refused by the store (constraint or type check)
    #[error("Statement rejected: {0}")]
    Rejected(String),

    #[error("Store handle already closed")]
    Closed,

    /// Existing table lacks columns the insert statement names
    #[error("Table {table} exists without columns: {}", missing.join(", "))]
    ShapeMismatch { table: String, missing: Vec<String> },
}

impl DbError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Connection parameters for the store
#[derive(Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Full connection URL; takes precedence over the individual fields
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub connect_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            database: DEFAULT_DB_NAME.to_string(),
            username: DEFAULT_DB_USER.to_string(),
            password: None,
            connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl DbConfig {
    /// Load connection settings from the environment
    ///
    /// - `DATABASE_URL`: full URL (wins over the rest)
    /// - `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`
    /// - `DB_CONNECT_TIMEOUT`: seconds
    pub fn from_env() -> bioseq_common::Result<Self> {
        use bioseq_common::env;

        let defaults = Self::default();
        Ok(Self {
            url: env::var("DATABASE_URL"),
            host: env::var("DB_HOST").unwrap_or(defaults.host),
            port: env::parse("DB_PORT")?.unwrap_or(defaults.port),
            database: env::var("DB_NAME").unwrap_or(defaults.database),
            username: env::var("DB_USER").unwrap_or(defaults.username),
            password: env::var("DB_PASSWORD"),
            connect_timeout_secs: env::parse("DB_CONNECT_TIMEOUT")?
                .unwrap_or(defaults.connect_timeout_secs),
        })
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.url.is_none() {
            if self.host.trim().is_empty() {
                return Err(DbError::config("database host cannot be empty"));
            }
            if self.database.trim().is_empty() {
                return Err(DbError::config("database name cannot be empty"));
            }
            if self.port == 0 {
                return Err(DbError::config("database port must be greater than 0"));
            }
        }

        if self.connect_timeout_secs == 0 {
            return Err(DbError::config("connect timeout must be greater than 0"));
        }

        Ok(())
    }
}

/// Connection-scoped handle onto the target store
///
/// Every statement commits on its own; a failed insert leaves no trace and
/// does not affect rows inserted before it.
#[async_trait]
pub trait SequenceStore: Send {
    /// Whether `table` exists, matched case-insensitively within its schema
    async fn table_exists(&mut self, table: &TableDefinition) -> DbResult<bool>;

    /// Lower-case column names of an existing `table`, in catalog order
    async fn table_columns(&mut self, table: &TableDefinition) -> DbResult<Vec<String>>;

    async fn create_table(&mut self, table: &TableDefinition) -> DbResult<()>;

    async fn drop_table(&mut self, table: &TableDefinition) -> DbResult<()>;

    /// Insert one record with all canonical fields bound positionally
    async fn insert_record(
        &mut self,
        table: &TableDefinition,
        record: &CanonicalRecord,
    ) -> DbResult<()>;

    /// Release the underlying connection. Later calls fail with [`DbError::Closed`].
    async fn close(&mut self) -> DbResult<()>;
}

/// Opens one [`SequenceStore`] per ingestion call
#[async_trait]
pub trait StoreProvider: Send + Sync {
    type Store: SequenceStore;

    async fn connect(&self) -> DbResult<Self::Store>;
}
