//! PostgreSQL store
//!
//! One `PgConnection` per handle, outside any explicit transaction, so each
//! statement is committed independently.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::{debug, info};

use super::{DbConfig, DbError, DbResult, SequenceStore, StoreProvider};
use crate::models::{CanonicalRecord, ColumnValue};
use crate::schema::TableDefinition;

/// Store handle over a single PostgreSQL connection
pub struct PgSequenceStore {
    conn: Option<PgConnection>,
}

impl PgSequenceStore {
    pub fn new(conn: PgConnection) -> Self {
        Self { conn: Some(conn) }
    }

    fn conn(&mut self) -> DbResult<&mut PgConnection> {
        self.conn.as_mut().ok_or(DbError::Closed)
    }
}

#[async_trait]
impl SequenceStore for PgSequenceStore {
    async fn table_exists(&mut self, table: &TableDefinition) -> DbResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
            "#,
        )
        .bind(table.schema_key())
        .bind(table.name_key())
        .fetch_one(&mut *self.conn()?)
        .await?;

        Ok(exists)
    }

    async fn table_columns(&mut self, table: &TableDefinition) -> DbResult<Vec<String>> {
        let columns = sqlx::query_scalar::<_, String>(
            r#"
            SELECT lower(column_name::text) FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(table.schema_key())
        .bind(table.name_key())
        .fetch_all(&mut *self.conn()?)
        .await?;

        Ok(columns)
    }

    async fn create_table(&mut self, table: &TableDefinition) -> DbResult<()> {
        let sql = table.create_sql();
        debug!(sql = %sql, "Creating table");
        sqlx::query(&sql).execute(&mut *self.conn()?).await?;
        Ok(())
    }

    async fn drop_table(&mut self, table: &TableDefinition) -> DbResult<()> {
        let sql = table.drop_sql();
        debug!(sql = %sql, "Dropping table");
        sqlx::query(&sql).execute(&mut *self.conn()?).await?;
        Ok(())
    }

    async fn insert_record(
        &mut self,
        table: &TableDefinition,
        record: &CanonicalRecord,
    ) -> DbResult<()> {
        let sql = table.insert_sql();
        let mut query = sqlx::query(&sql);

        for value in record.values(table.variant()) {
            query = match value {
                ColumnValue::Text(v) => query.bind(v),
                ColumnValue::Float(v) => query.bind(v),
                ColumnValue::Date(v) => query.bind(v),
            };
        }

        query.execute(&mut *self.conn()?).await?;
        Ok(())
    }

    async fn close(&mut self) -> DbResult<()> {
        match self.conn.take() {
            Some(conn) => {
                conn.close().await?;
                debug!("Database connection closed");
                Ok(())
            },
            None => Err(DbError::Closed),
        }
    }
}

/// Opens a fresh PostgreSQL connection for every ingestion call
#[derive(Debug, Clone)]
pub struct PgStoreProvider {
    config: DbConfig,
}

impl PgStoreProvider {
    pub fn new(config: DbConfig) -> DbResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn connect_options(&self) -> DbResult<PgConnectOptions> {
        let options = match self.config.url {
            Some(ref url) => PgConnectOptions::from_str(url)?,
            None => {
                let options = PgConnectOptions::new()
                    .host(&self.config.host)
                    .port(self.config.port)
                    .database(&self.config.database)
                    .username(&self.config.username);

                match self.config.password {
                    Some(ref password) => options.password(password),
                    None => options,
                }
            },
        };

        Ok(options.application_name("bioseq-ingest"))
    }
}

#[async_trait]
impl StoreProvider for PgStoreProvider {
    type Store = PgSequenceStore;

    async fn connect(&self) -> DbResult<PgSequenceStore> {
        let options = self.connect_options()?;
        let timeout = self.config.connect_timeout_secs;

        let conn = tokio::time::timeout(
            Duration::from_secs(timeout),
            PgConnection::connect_with(&options),
        )
        .await
        .map_err(|_| DbError::Timeout(timeout))??;

        info!(
            host = %options.get_host(),
            database = ?options.get_database(),
            "Database connection established"
        );

        Ok(PgSequenceStore::new(conn))
    }
}
