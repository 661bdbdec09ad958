//! Per-record loader
//!
//! Inserts one canonical record at a time. A store error is logged and
//! reported as [`RowOutcome::Failed`]; it never aborts the batch.

use serde::Serialize;
use tracing::{debug, error};

use crate::db::{DbError, SequenceStore};
use crate::error::NormalizeError;
use crate::models::CanonicalRecord;
use crate::schema::TableDefinition;

/// What happened to one CSV row
#[derive(Debug)]
pub enum RowOutcome {
    Inserted,
    /// No row index; never handed to the loader
    Dropped,
    /// Failed normalization (missing or invalid field)
    Rejected(NormalizeError),
    /// The store refused the insert
    Failed(DbError),
}

impl RowOutcome {
    pub fn kind(&self) -> RowOutcomeKind {
        match self {
            RowOutcome::Inserted => RowOutcomeKind::Inserted,
            RowOutcome::Dropped => RowOutcomeKind::Dropped,
            RowOutcome::Rejected(_) => RowOutcomeKind::Rejected,
            RowOutcome::Failed(_) => RowOutcomeKind::Failed,
        }
    }
}

/// Payload-free form of [`RowOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcomeKind {
    Inserted,
    Dropped,
    Rejected,
    Failed,
}

/// Insert one record, isolating any failure to this row
pub async fn insert_one<S>(
    store: &mut S,
    table: &TableDefinition,
    record: &CanonicalRecord,
    line: u64,
) -> RowOutcome
where
    S: SequenceStore + ?Sized,
{
    match store.insert_record(table, record).await {
        Ok(()) => {
            debug!(line, sequence_id = %record.sequence_id, "Row inserted");
            RowOutcome::Inserted
        },
        Err(e) => {
            error!(
                line,
                sequence_id = %record.sequence_id,
                table = %table.qualified_name(),
                error = %e,
                "Failed to insert row"
            );
            RowOutcome::Failed(e)
        },
    }
}
