//! Schema manager and loader tests against the in-memory store

use bioseq_ingest::db::{DbError, SequenceStore};
use bioseq_ingest::loader::{self, RowOutcome, RowOutcomeKind};
use bioseq_ingest::schema::{self, SchemaAction, TableMode};
use bioseq_ingest::{CanonicalRecord, ColumnVariant};

mod common;
use common::{default_table, MemoryProvider};

fn record(sequence_id: &str) -> CanonicalRecord {
    CanonicalRecord {
        sequence_id: sequence_id.to_string(),
        sequence: "ACGT".to_string(),
        origin: "human".to_string(),
        ..Default::default()
    }
}

// ============================================================================
// Schema manager
// ============================================================================

#[tokio::test]
async fn test_ensure_table_is_idempotent() {
    let provider = MemoryProvider::new();
    let mut store = provider.store();
    let table = default_table(ColumnVariant::Standard);

    let first = schema::ensure_table(&mut store, &table, TableMode::CreateIfAbsent)
        .await
        .unwrap();
    let second = schema::ensure_table(&mut store, &table, TableMode::CreateIfAbsent)
        .await
        .unwrap();

    assert_eq!(first, SchemaAction::Created);
    assert_eq!(second, SchemaAction::AlreadyPresent);
    assert_eq!(provider.state().creates, 1);
    assert_eq!(table.column_names().len(), 15);
}

#[tokio::test]
async fn test_table_lookup_ignores_case() {
    let provider = MemoryProvider::new();
    let mut store = provider.store();

    let table = default_table(ColumnVariant::Standard);
    store.create_table(&table).await.unwrap();

    let lower = bioseq_ingest::TableDefinition::new(
        "PUBLIC",
        "biosequencedata",
        ColumnVariant::Standard,
    )
    .unwrap();
    let action = schema::ensure_table(&mut store, &lower, TableMode::CreateIfAbsent)
        .await
        .unwrap();

    assert_eq!(action, SchemaAction::AlreadyPresent);
}

#[tokio::test]
async fn test_existing_table_missing_variant_columns_is_fatal() {
    let provider = MemoryProvider::new();
    let mut store = provider.store();

    let standard = default_table(ColumnVariant::Standard);
    schema::ensure_table(&mut store, &standard, TableMode::CreateIfAbsent)
        .await
        .unwrap();

    let project = default_table(ColumnVariant::Project);
    let err = schema::ensure_table(&mut store, &project, TableMode::CreateIfAbsent)
        .await
        .unwrap_err();

    match err {
        DbError::ShapeMismatch { table, missing } => {
            assert_eq!(table, "public.BioSequenceData");
            assert_eq!(missing, vec!["project_name", "date_created"]);
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(provider.state().creates, 1);
}

#[tokio::test]
async fn test_wider_existing_table_is_accepted() {
    let provider = MemoryProvider::new();
    let mut store = provider.store();

    let project = default_table(ColumnVariant::Project);
    schema::ensure_table(&mut store, &project, TableMode::CreateIfAbsent)
        .await
        .unwrap();

    let standard = default_table(ColumnVariant::Standard);
    let action = schema::ensure_table(&mut store, &standard, TableMode::CreateIfAbsent)
        .await
        .unwrap();

    assert_eq!(action, SchemaAction::AlreadyPresent);
    let outcome = loader::insert_one(&mut store, &standard, &record("seq-1"), 2).await;
    assert_eq!(outcome.kind(), RowOutcomeKind::Inserted);
}

#[tokio::test]
async fn test_recreate_drops_existing_rows() {
    let provider = MemoryProvider::new();
    let mut store = provider.store();
    let table = default_table(ColumnVariant::Project);

    schema::ensure_table(&mut store, &table, TableMode::CreateIfAbsent)
        .await
        .unwrap();
    store.insert_record(&table, &record("seq-1")).await.unwrap();

    let action = schema::ensure_table(&mut store, &table, TableMode::Recreate)
        .await
        .unwrap();

    assert_eq!(action, SchemaAction::Recreated);
    assert!(provider.rows(&table).is_empty());
}

// ============================================================================
// Loader
// ============================================================================

#[tokio::test]
async fn test_insert_one_appends_row() {
    let provider = MemoryProvider::new();
    let mut store = provider.store();
    let table = default_table(ColumnVariant::Standard);
    store.create_table(&table).await.unwrap();

    let outcome = loader::insert_one(&mut store, &table, &record("seq-1"), 2).await;

    assert_eq!(outcome.kind(), RowOutcomeKind::Inserted);
    assert_eq!(provider.rows(&table), vec![record("seq-1")]);
}

#[tokio::test]
async fn test_insert_one_reports_store_failure() {
    let provider = MemoryProvider::new();
    let mut store = provider.store();
    let table = default_table(ColumnVariant::Standard);
    store.create_table(&table).await.unwrap();

    let outcome = loader::insert_one(&mut store, &table, &record(&"x".repeat(256)), 2).await;
    assert!(matches!(outcome, RowOutcome::Failed(DbError::Rejected(_))));

    // Exactly at the limit is accepted
    let outcome = loader::insert_one(&mut store, &table, &record(&"x".repeat(255)), 3).await;
    assert_eq!(outcome.kind(), RowOutcomeKind::Inserted);
    assert_eq!(provider.rows(&table).len(), 1);
}

#[tokio::test]
async fn test_closed_store_fails_rows() {
    let provider = MemoryProvider::new();
    let mut store = provider.store();
    let table = default_table(ColumnVariant::Standard);
    store.create_table(&table).await.unwrap();
    store.close().await.unwrap();

    let outcome = loader::insert_one(&mut store, &table, &record("seq-1"), 2).await;
    assert!(matches!(outcome, RowOutcome::Failed(DbError::Closed)));
    assert!(matches!(store.close().await, Err(DbError::Closed)));
}
