//! Common test utilities for bioseq-ingest integration tests
//!
//! - [`MemoryProvider`] / [`MemoryStore`]: an in-memory [`SequenceStore`] that
//!   enforces the `VARCHAR(255)` limit of the real table
//! - CSV fixture helpers writing into a [`tempfile::TempDir`]

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use bioseq_ingest::db::{DbError, DbResult, SequenceStore, StoreProvider};
use bioseq_ingest::models::{CanonicalRecord, ColumnValue, SqlType};
use bioseq_ingest::{IngestConfig, Ingestor, TableDefinition};

/// Header of a standard-variant file, with an ignored extra column
pub const STANDARD_HEADER: &str = "ID,id,seq,origin,Cys Cnt,Met Cnt,STOICHIOMETRY,Format,Isotype,Comment";

/// Header of a project-variant file
pub const PROJECT_HEADER: &str = "ID,id,seq,origin,Cys Cnt,Project,DATE_CREATED";

// ============================================================================
// In-memory store
// ============================================================================

/// Everything the store saw, shared between the provider and its handles
#[derive(Debug, Default)]
pub struct MemoryState {
    /// Rows per catalog key (`schema.table`, lower case)
    pub tables: HashMap<String, Vec<CanonicalRecord>>,
    /// Lower-case column names per catalog key
    pub columns: HashMap<String, Vec<String>>,
    pub connections: usize,
    pub closed: usize,
    pub creates: usize,
    pub drops: usize,
    pub insert_attempts: usize,
}

fn catalog_key(table: &TableDefinition) -> String {
    format!("{}.{}", table.schema_key(), table.name_key())
}

fn lower_case_columns(table: &TableDefinition) -> Vec<String> {
    table.column_names().into_iter().map(str::to_lowercase).collect()
}

pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    open: bool,
}

impl MemoryStore {
    fn check_open(&self) -> DbResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(DbError::Closed)
        }
    }
}

#[async_trait]
impl SequenceStore for MemoryStore {
    async fn table_exists(&mut self, table: &TableDefinition) -> DbResult<bool> {
        self.check_open()?;
        let state = self.state.lock().unwrap();
        Ok(state.tables.contains_key(&catalog_key(table)))
    }

    async fn table_columns(&mut self, table: &TableDefinition) -> DbResult<Vec<String>> {
        self.check_open()?;
        let state = self.state.lock().unwrap();
        Ok(state.columns.get(&catalog_key(table)).cloned().unwrap_or_default())
    }

    async fn create_table(&mut self, table: &TableDefinition) -> DbResult<()> {
        self.check_open()?;
        let mut state = self.state.lock().unwrap();
        state.creates += 1;
        let key = catalog_key(table);
        if !state.tables.contains_key(&key) {
            state.tables.insert(key.clone(), Vec::new());
            state.columns.insert(key, lower_case_columns(table));
        }
        Ok(())
    }

    async fn drop_table(&mut self, table: &TableDefinition) -> DbResult<()> {
        self.check_open()?;
        let mut state = self.state.lock().unwrap();
        state.drops += 1;
        state.tables.remove(&catalog_key(table));
        state.columns.remove(&catalog_key(table));
        Ok(())
    }

    async fn insert_record(
        &mut self,
        table: &TableDefinition,
        record: &CanonicalRecord,
    ) -> DbResult<()> {
        self.check_open()?;
        let mut state = self.state.lock().unwrap();
        state.insert_attempts += 1;

        let variant = table.variant();
        for (column, value) in variant.columns().zip(record.values(variant)) {
            if let (SqlType::Varchar, ColumnValue::Text(Some(text))) = (column.sql_type, value) {
                if text.chars().count() > SqlType::VARCHAR_LIMIT {
                    return Err(DbError::Rejected(format!(
                        "value too long for type character varying({}) in column {}",
                        SqlType::VARCHAR_LIMIT, column.store
                    )));
                }
            }
        }

        let key = catalog_key(table);
        if let Some(present) = state.columns.get(&key) {
            if let Some(absent) = lower_case_columns(table).into_iter().find(|c| !present.contains(c)) {
                return Err(DbError::Rejected(format!("column {absent} does not exist")));
            }
        }

        let rows = state
            .tables
            .get_mut(&key)
            .ok_or_else(|| DbError::Rejected(format!("relation {} does not exist", table.qualified_name())))?;
        rows.push(record.clone());
        Ok(())
    }

    async fn close(&mut self) -> DbResult<()> {
        self.check_open()?;
        self.open = false;
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Hands out [`MemoryStore`]s over one shared state
#[derive(Clone, Default)]
pub struct MemoryProvider {
    state: Arc<Mutex<MemoryState>>,
    refuse_connections: bool,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose `connect` always fails
    pub fn unreachable() -> Self {
        Self {
            refuse_connections: true,
            ..Self::default()
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    /// Rows stored in `table`, in insertion order
    pub fn rows(&self, table: &TableDefinition) -> Vec<CanonicalRecord> {
        self.state()
            .tables
            .get(&catalog_key(table))
            .cloned()
            .unwrap_or_default()
    }

    /// A fresh handle on the same state
    pub fn store(&self) -> MemoryStore {
        self.state().connections += 1;
        MemoryStore {
            state: Arc::clone(&self.state),
            open: true,
        }
    }
}

#[async_trait]
impl StoreProvider for MemoryProvider {
    type Store = MemoryStore;

    async fn connect(&self) -> DbResult<MemoryStore> {
        if self.refuse_connections {
            return Err(DbError::Timeout(1));
        }
        Ok(self.store())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Ingestor over a fresh in-memory store with default settings
pub fn memory_ingestor() -> (MemoryProvider, Ingestor<MemoryProvider>) {
    memory_ingestor_with(IngestConfig::default())
}

pub fn memory_ingestor_with(config: IngestConfig) -> (MemoryProvider, Ingestor<MemoryProvider>) {
    let provider = MemoryProvider::new();
    let ingestor = Ingestor::new(provider.clone(), Arc::new(config));
    (provider, ingestor)
}

/// Write `lines` joined by newlines into `dir/name`
pub fn write_csv(dir: &TempDir, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(&path, content).unwrap();
    path
}

/// Table the default config targets
pub fn default_table(variant: bioseq_ingest::ColumnVariant) -> TableDefinition {
    IngestConfig::default().table_definition(variant).unwrap()
}

pub fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap()
}
