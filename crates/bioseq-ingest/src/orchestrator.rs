//! Ingestion orchestrator
//!
//! Drives one CSV file end to end:
//!
//! 1. Acquire a store handle from the provider
//! 2. Ensure the target table
//! 3. Open the file and check its structure (headers, row shape)
//! 4. Normalize and load each row in file order
//! 5. Release the handle, also when a step fails
//! 6. Report an [`IngestSummary`]
//!
//! Phases: `Idle -> SchemaEnsured -> Streaming(row) -> Done | Failed`, kept
//! in the `phase` field of the `ingest` span. Only a file-level
//! [`IngestError`] ends in `Failed`; row failures are counted.

use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, field, info, info_span, warn, Instrument, Span};

use crate::config::{IngestConfig, MissingFieldPolicy};
use crate::db::{SequenceStore, StoreProvider};
use crate::error::{IngestError, NormalizeError};
use crate::loader::{self, RowOutcome};
use crate::models::{ColumnVariant, RawRecord};
use crate::normalizer::{Normalized, Normalizer};
use crate::schema::{self, SchemaAction, TableDefinition};

/// Where an ingestion run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum IngestPhase {
    Idle,
    SchemaEnsured,
    Streaming { row: u64 },
    Done,
    Failed,
}

/// Record `phase` on the current `ingest` span
fn enter_phase(phase: IngestPhase) {
    Span::current().record("phase", field::debug(phase));
}

/// Counts for one ingested file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub path: PathBuf,
    pub variant: ColumnVariant,
    pub schema_action: SchemaAction,
    /// Data rows read from the file
    pub attempted: u64,
    pub inserted: u64,
    /// Rows without a row index
    pub dropped: u64,
    /// Rows with a missing or invalid field
    pub rejected: u64,
    /// Rows the store refused
    pub failed: u64,
    pub elapsed_ms: u64,
}

impl IngestSummary {
    fn new(path: &Path, variant: ColumnVariant, schema_action: SchemaAction) -> Self {
        Self {
            path: path.to_path_buf(),
            variant,
            schema_action,
            attempted: 0,
            inserted: 0,
            dropped: 0,
            rejected: 0,
            failed: 0,
            elapsed_ms: 0,
        }
    }

    /// Fold one row outcome into the counts
    pub fn record(&mut self, outcome: &RowOutcome) {
        self.attempted += 1;
        match outcome {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::Dropped => self.dropped += 1,
            RowOutcome::Rejected(_) => self.rejected += 1,
            RowOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Every row with a row index made it into the store
    pub fn is_clean(&self) -> bool {
        self.rejected == 0 && self.failed == 0
    }
}

/// CSV file restricted to the recognized columns of one variant
///
/// Opening validates the header and scans every row once for structural
/// errors, so a malformed file is rejected before anything is inserted.
/// Rows are not retained by the scan.
#[derive(Debug)]
pub struct CsvSource {
    path: PathBuf,
    /// `(header position, column name)` of each recognized column present
    columns: Vec<(usize, &'static str)>,
    rows: u64,
}

impl CsvSource {
    pub fn open(path: &Path, variant: ColumnVariant) -> Result<Self, IngestError> {
        let mut reader = csv_reader(path)?;
        let headers = reader
            .headers()
            .map_err(|e| IngestError::from_csv(path, e))?
            .clone();

        let header_names: Vec<&str> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}'))
            .collect();

        let missing: Vec<String> = variant
            .required_headers()
            .into_iter()
            .filter(|required| !header_names.contains(required))
            .map(str::to_string)
            .collect();

        if !missing.is_empty() {
            return Err(IngestError::MissingColumns {
                path: path.to_path_buf(),
                columns: missing,
            });
        }

        let columns: Vec<(usize, &'static str)> = variant
            .recognized_columns()
            .into_iter()
            .filter_map(|name| {
                header_names
                    .iter()
                    .position(|h| *h == name)
                    .map(|idx| (idx, name))
            })
            .collect();

        let ignored = header_names.len() - columns.len();
        if ignored > 0 {
            debug!(path = %path.display(), ignored, "Ignoring unrecognized columns");
        }

        let mut rows = 0;
        let mut record = csv::StringRecord::new();
        loop {
            match reader.read_record(&mut record) {
                Ok(true) => rows += 1,
                Ok(false) => break,
                Err(e) => return Err(IngestError::from_csv(path, e)),
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            rows,
        })
    }

    /// Number of data rows found by the structural scan
    pub fn row_count(&self) -> u64 {
        self.rows
    }

    /// Names of the recognized columns present in the header
    pub fn columns(&self) -> Vec<&'static str> {
        self.columns.iter().map(|(_, name)| *name).collect()
    }

    /// Stream rows in file order
    pub fn records(&self) -> Result<RecordReader<'_>, IngestError> {
        Ok(RecordReader {
            source: self,
            reader: csv_reader(&self.path)?,
            record: csv::StringRecord::new(),
        })
    }
}

/// Streaming row reader over a [`CsvSource`]
pub struct RecordReader<'a> {
    source: &'a CsvSource,
    reader: csv::Reader<File>,
    record: csv::StringRecord,
}

impl RecordReader<'_> {
    pub fn next_record(&mut self) -> Result<Option<RawRecord>, IngestError> {
        let has_row = self
            .reader
            .read_record(&mut self.record)
            .map_err(|e| IngestError::from_csv(&self.source.path, e))?;

        if !has_row {
            return Ok(None);
        }

        let line = self.record.position().map(|p| p.line()).unwrap_or_default();
        let mut raw = RawRecord::new(line);
        for (idx, name) in &self.source.columns {
            if let Some(value) = self.record.get(*idx) {
                raw.insert(*name, value);
            }
        }

        Ok(Some(raw))
    }
}

fn csv_reader(path: &Path) -> Result<csv::Reader<File>, IngestError> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_path(path)
        .map_err(|e| IngestError::from_csv(path, e))
}

/// Runs ingestion of single files against a store provider
pub struct Ingestor<P> {
    provider: P,
    config: Arc<IngestConfig>,
}

impl<P: StoreProvider> Ingestor<P> {
    pub fn new(provider: P, config: Arc<IngestConfig>) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest one CSV file
    pub async fn ingest(
        &self,
        path: &Path,
        variant: ColumnVariant,
    ) -> Result<IngestSummary, IngestError> {
        let span = info_span!(
            "ingest",
            path = %path.display(),
            %variant,
            phase = field::Empty
        );
        self.ingest_inner(path, variant).instrument(span).await
    }

    async fn ingest_inner(
        &self,
        path: &Path,
        variant: ColumnVariant,
    ) -> Result<IngestSummary, IngestError> {
        let started = Instant::now();
        let table = self
            .config
            .table_definition(variant)
            .map_err(IngestError::Config)?;

        info!(table = %table.qualified_name(), "Starting ingestion");

        let mut store = self
            .provider
            .connect()
            .await
            .map_err(IngestError::Connect)?;

        enter_phase(IngestPhase::Idle);
        let result = self.run(&mut store, path, &table).await;

        if let Err(e) = store.close().await {
            warn!(error = %e, "Failed to close store connection");
        }

        match result {
            Ok(mut summary) => {
                enter_phase(IngestPhase::Done);
                summary.elapsed_ms = started.elapsed().as_millis() as u64;
                info!(
                    attempted = summary.attempted,
                    inserted = summary.inserted,
                    dropped = summary.dropped,
                    rejected = summary.rejected,
                    failed = summary.failed,
                    elapsed_ms = summary.elapsed_ms,
                    "Ingestion complete"
                );
                Ok(summary)
            },
            Err(e) => {
                // phase still names the failing step here
                error!(error = %e, "Ingestion failed");
                enter_phase(IngestPhase::Failed);
                Err(e)
            },
        }
    }

    async fn run<S>(
        &self,
        store: &mut S,
        path: &Path,
        table: &TableDefinition,
    ) -> Result<IngestSummary, IngestError>
    where
        S: SequenceStore + ?Sized,
    {
        let action = schema::ensure_table(store, table, self.config.table_mode)
            .await
            .map_err(IngestError::Schema)?;
        enter_phase(IngestPhase::SchemaEnsured);

        let source = CsvSource::open(path, table.variant())?;
        info!(
            rows = source.row_count(),
            columns = source.columns().len(),
            "File structure validated"
        );

        let normalizer =
            Normalizer::new(table.variant()).with_strict_values(self.config.strict_values);
        let mut summary = IngestSummary::new(path, table.variant(), action);
        let mut rows = source.records()?;
        let mut row = 0;

        while let Some(raw) = rows.next_record()? {
            row += 1;
            enter_phase(IngestPhase::Streaming { row });

            let outcome = match normalizer.normalize(&raw) {
                Ok(Normalized::Record(record)) => {
                    loader::insert_one(store, table, &record, raw.line()).await
                },
                Ok(Normalized::Dropped) => {
                    debug!(line = raw.line(), "Row dropped, no row index");
                    RowOutcome::Dropped
                },
                Err(NormalizeError::MissingField(missing))
                    if self.config.missing_field_policy == MissingFieldPolicy::AbortFile =>
                {
                    return Err(IngestError::RowRejected {
                        path: path.to_path_buf(),
                        line: raw.line(),
                        source: missing,
                    });
                },
                Err(e) => {
                    warn!(line = raw.line(), error = %e, "Row rejected");
                    RowOutcome::Rejected(e)
                },
            };

            summary.record(&outcome);
        }

        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::db::DbError;
    use std::io::Write;

    fn csv_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_source_keeps_recognized_columns_only() {
        let file = csv_file("Comment,ID,id,seq,origin,Cys Cnt,Project\nx,1,a,ACGT,human,2,P\n");
        let source = CsvSource::open(file.path(), ColumnVariant::Standard).unwrap();

        assert_eq!(source.row_count(), 1);
        assert_eq!(source.columns(), vec!["ID", "id", "seq", "origin", "Cys Cnt"]);

        let mut rows = source.records().unwrap();
        let raw = rows.next_record().unwrap().unwrap();
        assert_eq!(raw.line(), 2);
        assert_eq!(raw.len(), 5);
        assert_eq!(raw.get("Cys Cnt"), Some("2"));
        assert_eq!(raw.get("Comment"), None);
        assert!(rows.next_record().unwrap().is_none());
    }

    #[test]
    fn test_source_header_only() {
        let file = csv_file("ID,id,seq,origin\n");
        let source = CsvSource::open(file.path(), ColumnVariant::Project).unwrap();
        assert_eq!(source.row_count(), 0);
        assert!(source.records().unwrap().next_record().unwrap().is_none());
    }

    #[test]
    fn test_source_strips_byte_order_mark() {
        let file = csv_file("\u{feff}ID,id,seq,origin\n1,a,ACGT,human\n");
        let source = CsvSource::open(file.path(), ColumnVariant::Standard).unwrap();
        assert_eq!(source.columns()[0], "ID");
    }

    #[test]
    fn test_source_rejects_ragged_rows() {
        let file = csv_file("ID,id,seq,origin\n1,a,ACGT,human\n2,b\n");
        let err = CsvSource::open(file.path(), ColumnVariant::Standard).unwrap_err();
        assert!(matches!(err, IngestError::Malformed { line: 3, .. }));
    }

    #[test]
    fn test_source_lists_every_missing_column() {
        let file = csv_file("ID,seq\n1,ACGT\n");
        let err = CsvSource::open(file.path(), ColumnVariant::Standard).unwrap_err();
        match err {
            IngestError::MissingColumns { columns, .. } => {
                assert_eq!(columns, vec!["id", "origin"]);
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let mut summary = IngestSummary::new(
            Path::new("a.csv"),
            ColumnVariant::Standard,
            SchemaAction::Created,
        );
        summary.record(&RowOutcome::Inserted);
        summary.record(&RowOutcome::Inserted);
        summary.record(&RowOutcome::Dropped);
        assert!(summary.is_clean());

        summary.record(&RowOutcome::Failed(DbError::Closed));
        assert_eq!(summary.attempted, 4);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_clean());
    }
}
