//! Batch loader behaviour against an in-memory table store

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{actual_status_xml, MemoryStore, Op};
use fias_loader::extractor::{ExtractError, RowExtractor};
use fias_loader::loader::{BatchLoader, LoadStrategy, BATCH_CAPACITY};
use fias_loader::schema::{IngestRow, RecordSchema, SchemaKey, SchemaRegistry, Value};
use fias_loader::{ErrorKind, IngestError};

const THRESHOLD: u64 = 1_000;
const SMALL: u64 = 10;
const LARGE: u64 = 5_000;

fn status_schema() -> RecordSchema {
    *SchemaRegistry::fias().get(SchemaKey::ActualStatus).unwrap()
}

fn rows(schema: &RecordSchema, count: usize) -> Vec<IngestRow> {
    (0..count)
        .map(|id| {
            schema.row_from_attributes(&[
                ("ACTSTATID", id.to_string().into()),
                ("NAME", format!("status {id}").into()),
            ])
        })
        .collect()
}

fn stream(rows: Vec<IngestRow>) -> impl Iterator<Item = Result<IngestRow, ExtractError>> + Send {
    rows.into_iter().map(Ok)
}

fn ids(rows: &[IngestRow]) -> Vec<i64> {
    rows.iter()
        .map(|row| match row.get("actstatid") {
            Some(Value::Integer(id)) => *id,
            other => panic!("unexpected id {other:?}"),
        })
        .collect()
}

#[tokio::test]
async fn test_flush_boundaries() {
    let schema = status_schema();
    let cases = [(5_000, 1), (5_001, 2), (9_999, 2), (10_000, 2)];

    for (count, expected_inserts) in cases {
        let mut store = MemoryStore::with_table(schema.table, Vec::new());
        let loader = BatchLoader::new(THRESHOLD);

        let report = loader
            .load(&mut store, &schema, SMALL, stream(rows(&schema, count)))
            .await
            .unwrap();

        assert_eq!(report.rows, count as u64);
        assert_eq!(report.inserts, expected_inserts, "{count} rows");
        assert_eq!(store.insert_sizes().len(), expected_inserts);
        assert!(store.insert_sizes().iter().all(|size| *size <= BATCH_CAPACITY));

        // No duplicated or dropped rows, in source order
        let loaded = store.rows(schema.table).unwrap();
        assert_eq!(ids(&loaded), (0..count as i64).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_insert_sizes_follow_capacity() {
    let schema = status_schema();
    let mut store = MemoryStore::with_table(schema.table, Vec::new());

    BatchLoader::new(THRESHOLD)
        .load(&mut store, &schema, SMALL, stream(rows(&schema, 12_345)))
        .await
        .unwrap();

    assert_eq!(store.insert_sizes(), vec![5_000, 5_000, 2_345]);
}

#[tokio::test]
async fn test_empty_stream_truncates_without_inserting() {
    let schema = status_schema();
    let mut store = MemoryStore::with_table(schema.table, rows(&schema, 3));

    let report = BatchLoader::new(THRESHOLD)
        .load(&mut store, &schema, SMALL, stream(Vec::new()))
        .await
        .unwrap();

    assert_eq!(report.rows, 0);
    assert_eq!(report.inserts, 0);
    assert_eq!(store.ops(), vec![Op::Truncate(schema.table.to_string())]);
    assert_eq!(store.count(schema.table), Some(0));
}

#[tokio::test]
async fn test_small_file_truncates_in_place() {
    let schema = status_schema();
    let mut store = MemoryStore::with_table(schema.table, rows(&schema, 7));

    let report = BatchLoader::new(THRESHOLD)
        .load(&mut store, &schema, THRESHOLD, stream(rows(&schema, 4)))
        .await
        .unwrap();

    assert_eq!(report.strategy, LoadStrategy::Truncate);
    assert_eq!(store.ops()[0], Op::Truncate(schema.table.to_string()));
    assert_eq!(store.count(schema.table), Some(4));
    assert!(!store.has_table("temp_actual_status"));
}

#[tokio::test]
async fn test_large_file_swaps_without_exposing_partial_table() {
    let schema = status_schema();
    let store = MemoryStore::with_table(schema.table, rows(&schema, 7));
    store.watch(schema.table);
    let mut writer = store.clone();

    let report = BatchLoader::new(THRESHOLD)
        .load(&mut writer, &schema, LARGE, stream(rows(&schema, 12_000)))
        .await
        .unwrap();

    assert_eq!(
        report.strategy,
        LoadStrategy::Shadow {
            shadow: "temp_actual_status".to_string()
        }
    );
    assert_eq!(store.count(schema.table), Some(12_000));
    assert!(!store.has_table("temp_actual_status"));

    // Every observation is either the old full table or the new full table
    let samples = store.samples();
    let swap_at = samples.iter().position(|seen| *seen == Some(12_000)).unwrap();
    assert!(samples[..swap_at].iter().all(|seen| *seen == Some(7)));
    assert!(samples[swap_at..].iter().all(|seen| *seen == Some(12_000)));

    let ops = store.ops();
    assert!(matches!(ops.first(), Some(Op::CreateShadow { .. })));
    assert!(matches!(ops.last(), Some(Op::Swap { .. })));
    assert!(ops.iter().all(|op| !matches!(op, Op::Truncate(_))));
}

#[tokio::test]
async fn test_swap_happens_on_exact_multiple_of_batch() {
    let schema = status_schema();
    let mut store = MemoryStore::with_table(schema.table, rows(&schema, 1));

    let report = BatchLoader::new(THRESHOLD)
        .load(&mut store, &schema, LARGE, stream(rows(&schema, 2 * BATCH_CAPACITY)))
        .await
        .unwrap();

    assert_eq!(report.inserts, 2);
    assert_eq!(store.count(schema.table), Some(2 * BATCH_CAPACITY));
    assert!(matches!(store.ops().last(), Some(Op::Swap { .. })));
}

#[tokio::test]
async fn test_size_at_threshold_truncates() {
    let schema = status_schema();
    let mut store = MemoryStore::with_table(schema.table, Vec::new());

    let report = BatchLoader::new(THRESHOLD)
        .load(&mut store, &schema, THRESHOLD, stream(rows(&schema, 1)))
        .await
        .unwrap();
    assert_eq!(report.strategy, LoadStrategy::Truncate);

    let report = BatchLoader::new(THRESHOLD)
        .load(&mut store, &schema, THRESHOLD + 1, stream(rows(&schema, 1)))
        .await
        .unwrap();
    assert!(matches!(report.strategy, LoadStrategy::Shadow { .. }));
}

/// 6000 good rows followed by a broken element
fn broken_document() -> String {
    let mut xml = actual_status_xml(6_000);
    xml.truncate(xml.len() - "</ActualStatuses>\n".len());
    xml.push_str("  <ActualStatus ACTSTATID=\"6000\" NAME=\"unterminated />\n</ActualStatuses>\n");
    xml
}

#[tokio::test]
async fn test_decode_failure_on_shadow_leaves_target_untouched() {
    let schema = status_schema();
    let store = MemoryStore::with_table(schema.table, rows(&schema, 7));
    store.watch(schema.table);
    let mut writer = store.clone();

    let xml = broken_document();
    let err = BatchLoader::new(THRESHOLD)
        .load(&mut writer, &schema, LARGE, RowExtractor::new(xml.as_bytes(), &schema))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(store.count(schema.table), Some(7));
    assert!(!store.has_table("temp_actual_status"));
    assert!(store.samples().iter().all(|seen| *seen == Some(7)));
    assert_eq!(
        store.ops().last(),
        Some(&Op::Drop("temp_actual_status".to_string()))
    );
}

#[tokio::test]
async fn test_truncated_document_on_shadow_leaves_target_untouched() {
    let schema = status_schema();
    let store = MemoryStore::with_table(schema.table, rows(&schema, 100));
    store.watch(schema.table);
    let mut writer = store.clone();

    // Cut off between elements: every row decodes, the root never closes
    let mut xml = actual_status_xml(6_000);
    xml.truncate(xml.len() - "</ActualStatuses>\n".len());

    let err = BatchLoader::new(THRESHOLD)
        .load(&mut writer, &schema, LARGE, RowExtractor::new(xml.as_bytes(), &schema))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(matches!(
        err,
        IngestError::Decode(ExtractError::Truncated { .. })
    ));
    assert_eq!(store.count(schema.table), Some(100));
    assert!(!store.has_table("temp_actual_status"));
    assert!(store.samples().iter().all(|seen| *seen == Some(100)));
    assert!(store.ops().iter().all(|op| !matches!(op, Op::Swap { .. })));
    assert_eq!(
        store.ops().last(),
        Some(&Op::Drop("temp_actual_status".to_string()))
    );
}

#[tokio::test]
async fn test_storage_failure_on_shadow_drops_shadow() {
    let schema = status_schema();
    let mut store = MemoryStore::with_table(schema.table, rows(&schema, 7));
    store.fail_inserts_after(1);

    let err = BatchLoader::new(THRESHOLD)
        .load(&mut store, &schema, LARGE, stream(rows(&schema, 8_000)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(store.count(schema.table), Some(7));
    assert!(!store.has_table("temp_actual_status"));
}

#[tokio::test]
async fn test_decode_failure_on_small_table_leaves_it_truncated() {
    let schema = status_schema();
    let mut store = MemoryStore::with_table(schema.table, rows(&schema, 7));

    let xml = broken_document();
    let err = BatchLoader::new(THRESHOLD)
        .load(&mut store, &schema, SMALL, RowExtractor::new(xml.as_bytes(), &schema))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);

    // Old rows are gone; only the batch flushed before the failure remains
    let remaining = store.rows(schema.table).unwrap();
    assert_eq!(remaining.len(), BATCH_CAPACITY);
    assert_eq!(ids(&remaining)[..3], [0, 1, 2]);
}

#[tokio::test]
async fn test_missing_target_fails_before_inserting() {
    let schema = status_schema();
    let mut store = MemoryStore::default();

    let err = BatchLoader::new(THRESHOLD)
        .load(&mut store, &schema, SMALL, stream(rows(&schema, 3)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(store.insert_sizes().is_empty());
}
