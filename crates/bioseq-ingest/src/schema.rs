//! Target table definition and the schema manager
//!
//! [`ensure_table`] is idempotent in [`TableMode::CreateIfAbsent`]: it only
//! creates the table when the catalog does not already list it.
//! [`TableMode::Recreate`] drops and recreates on every call and therefore
//! discards previously ingested rows; it has to be selected explicitly.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use bioseq_common::BioseqError;

use crate::db::{DbError, DbResult, SequenceStore};
use crate::models::ColumnVariant;

/// Default schema holding the target table
pub const DEFAULT_SCHEMA: &str = "public";

/// Default target table name
pub const DEFAULT_TABLE: &str = "BioSequenceData";

/// What [`ensure_table`] does when it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TableMode {
    /// Create the table only when absent
    #[default]
    CreateIfAbsent,
    /// Drop and recreate the table on every run
    Recreate,
}

impl std::str::FromStr for TableMode {
    type Err = BioseqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "create_if_absent" | "create" => Ok(TableMode::CreateIfAbsent),
            "recreate" | "destructive_recreate" => Ok(TableMode::Recreate),
            _ => Err(BioseqError::invalid_setting(
                "table mode",
                s,
                "expected 'create_if_absent' or 'recreate'",
            )),
        }
    }
}

impl std::fmt::Display for TableMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableMode::CreateIfAbsent => f.write_str("create_if_absent"),
            TableMode::Recreate => f.write_str("recreate"),
        }
    }
}

/// Outcome of [`ensure_table`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaAction {
    AlreadyPresent,
    Created,
    Recreated,
}

/// Check that a schema or table name can be spliced into DDL unquoted
pub fn validate_identifier(kind: &str, name: &str) -> bioseq_common::Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') || name.len() > 63 {
        return Err(BioseqError::invalid_setting(
            kind,
            name,
            "must start with a letter or '_' and contain only ASCII letters, digits or '_'",
        ));
    }

    Ok(())
}

/// Shape and location of the target table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    schema: String,
    name: String,
    variant: ColumnVariant,
}

impl TableDefinition {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        variant: ColumnVariant,
    ) -> bioseq_common::Result<Self> {
        let schema = schema.into();
        let name = name.into();
        validate_identifier("schema", &schema)?;
        validate_identifier("table", &name)?;

        Ok(Self {
            schema,
            name,
            variant,
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self) -> ColumnVariant {
        self.variant
    }

    /// Schema name as stored in the catalog (unquoted names fold to lower case)
    pub fn schema_key(&self) -> String {
        self.schema.to_lowercase()
    }

    /// Table name as stored in the catalog
    pub fn name_key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Store column names in insertion order
    pub fn column_names(&self) -> Vec<&'static str> {
        self.variant.columns().map(|c| c.store).collect()
    }

    pub fn create_sql(&self) -> String {
        let columns = self
            .variant
            .columns()
            .map(|c| format!("    {} {}", c.store, c.sql_type.ddl()))
            .collect::<Vec<_>>()
            .join(",\n");

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.qualified_name(),
            columns
        )
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.qualified_name())
    }

    /// Parameterized insert with one positional placeholder per column
    pub fn insert_sql(&self) -> String {
        let names = self.column_names();
        let placeholders = (1..=names.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_name(),
            names.join(", "),
            placeholders
        )
    }
}

/// Fail when an existing table lacks a column the insert statement names
///
/// Extra columns are fine; they stay NULL for rows of a narrower variant.
async fn check_shape<S>(store: &mut S, table: &TableDefinition) -> DbResult<()>
where
    S: SequenceStore + ?Sized,
{
    let present = store.table_columns(table).await?;
    let missing: Vec<String> = table
        .column_names()
        .into_iter()
        .map(str::to_lowercase)
        .filter(|name| !present.contains(name))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    Err(DbError::ShapeMismatch {
        table: table.qualified_name(),
        missing,
    })
}

/// Make sure the target table exists according to `mode`
///
/// In [`TableMode::CreateIfAbsent`] an existing table must carry every
/// column of `table`'s variant, otherwise [`DbError::ShapeMismatch`].
pub async fn ensure_table<S>(
    store: &mut S,
    table: &TableDefinition,
    mode: TableMode,
) -> DbResult<SchemaAction>
where
    S: SequenceStore + ?Sized,
{
    match mode {
        TableMode::CreateIfAbsent => {
            if store.table_exists(table).await? {
                check_shape(store, table).await?;
                info!(table = %table.qualified_name(), "Table present, no action");
                return Ok(SchemaAction::AlreadyPresent);
            }

            store.create_table(table).await?;
            info!(
                table = %table.qualified_name(),
                columns = table.variant().column_count(),
                "Table created"
            );
            Ok(SchemaAction::Created)
        },
        TableMode::Recreate => {
            warn!(
                table = %table.qualified_name(),
                "Recreating table, previously ingested rows are discarded"
            );
            store.drop_table(table).await?;
            store.create_table(table).await?;
            info!(table = %table.qualified_name(), "Table recreated");
            Ok(SchemaAction::Recreated)
        },
    }
}
