mod common;

use common::{properties, FakeRows, MemoryObjectStore};
use property_core::config::ExportSettings;
use property_core::core::{ExportError, ExportPipeline, ExportTarget, SchemaName};
use property_core::services::PropertyRepository;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

const PAGE: u32 = 3;

fn pipeline(
    source: Arc<FakeRows>,
    store: Arc<MemoryObjectStore>,
) -> ExportPipeline<FakeRows> {
    let repository = PropertyRepository::new(source, SchemaName::parse("staging").unwrap());
    let settings = ExportSettings {
        page_size: PAGE,
        prefix: "models".to_string(),
    };
    ExportPipeline::new(repository, store, &settings, 600)
}

async fn export_rows(n: i64) -> (Option<String>, Arc<FakeRows>, Arc<MemoryObjectStore>) {
    let source = Arc::new(FakeRows::new(properties(n)));
    let store = Arc::new(MemoryObjectStore::default());

    let url = pipeline(Arc::clone(&source), Arc::clone(&store))
        .export(ExportTarget::Named(format!("job-{}", n)))
        .await
        .unwrap();

    (url, source, store)
}

fn data_ids(contents: &str) -> Vec<i64> {
    contents
        .split("\r\n")
        .skip(1)
        .filter(|line| !line.is_empty())
        .map(|line| line.split(';').next().unwrap().parse().unwrap())
        .collect()
}

#[tokio::test]
async fn test_empty_table_exports_nothing() {
    let (url, source, store) = export_rows(0).await;

    assert!(url.is_none());
    assert_eq!(store.upload_count(), 0);
    assert_eq!(source.count_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.page_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_every_row_exported_exactly_once() {
    for n in [1, PAGE as i64, PAGE as i64 + 1, 2 * PAGE as i64] {
        let (url, source, store) = export_rows(n).await;

        let path = format!("models/job-{}.csv", n);
        assert_eq!(
            url.as_deref(),
            Some(format!("memory://exports/{}?expires=600", path).as_str())
        );

        let contents = store.contents(&path).unwrap();
        let header_lines = contents
            .split("\r\n")
            .filter(|line| line.starts_with("id;title;"))
            .count();
        assert_eq!(header_lines, 1, "header written once for n={}", n);

        let ids = data_ids(&contents);
        assert_eq!(ids.len(), n as usize, "row count for n={}", n);
        let unique: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len(), "duplicate rows for n={}", n);
        assert_eq!(unique, (1..=n).collect::<HashSet<_>>());

        // The count is snapshotted once per job
        assert_eq!(source.count_calls.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_inactive_rows_are_not_exported() {
    let mut rows = properties(5);
    rows[0].is_active = false;
    rows[3].is_active = false;
    let source = Arc::new(FakeRows::new(rows));
    let store = Arc::new(MemoryObjectStore::default());

    pipeline(source, Arc::clone(&store))
        .export(ExportTarget::Named("active".to_string()))
        .await
        .unwrap();

    let ids = data_ids(&store.contents("models/active.csv").unwrap());
    assert_eq!(ids, vec![2, 3, 5]);
}

#[tokio::test]
async fn test_missing_values_render_as_empty_fields() {
    let mut rows = properties(1);
    rows[0].number = None;
    rows[0].title = "Loft; top floor".to_string();
    let source = Arc::new(FakeRows::new(rows));
    let store = Arc::new(MemoryObjectStore::default());

    pipeline(source, Arc::clone(&store))
        .export(ExportTarget::Named("fields".to_string()))
        .await
        .unwrap();

    let contents = store.contents("models/fields.csv").unwrap();
    let line = contents.split("\r\n").nth(1).unwrap();
    assert!(line.starts_with("1;|Loft; top floor|;"));
    assert!(line.contains(";apartment;;Victor Konder;"));
}

#[tokio::test]
async fn test_dated_target_path() {
    let source = Arc::new(FakeRows::new(properties(2)));
    let store = Arc::new(MemoryObjectStore::default());

    let url = pipeline(source, Arc::clone(&store))
        .export(ExportTarget::Dated)
        .await
        .unwrap()
        .unwrap();

    let uploads = store.uploads.lock().unwrap();
    let path = uploads.keys().next().unwrap();
    let segments: Vec<&str> = path.split('/').collect();

    assert_eq!(segments.len(), 5);
    assert_eq!(segments[0], "models");
    assert_eq!(segments[1].len(), 4);
    assert_eq!(segments[2].len(), 2);
    assert_eq!(segments[3].len(), 2);
    assert!(segments[4].ends_with(".csv"));
    assert!(url.contains(path.as_str()));
}

#[tokio::test]
async fn test_invalid_name_is_rejected_before_any_work() {
    let source = Arc::new(FakeRows::new(properties(2)));
    let store = Arc::new(MemoryObjectStore::default());

    let err = pipeline(Arc::clone(&source), Arc::clone(&store))
        .export(ExportTarget::Named("../escape".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::InvalidName(_)));
    assert_eq!(source.count_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.upload_count(), 0);
}

#[tokio::test]
async fn test_unavailable_store_aborts_without_upload() {
    let source = Arc::new(FakeRows::new(properties(4)));
    source.set_failing(true);
    let store = Arc::new(MemoryObjectStore::default());

    let err = pipeline(source, Arc::clone(&store))
        .export(ExportTarget::Named("down".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Repository(_)));
    assert_eq!(store.upload_count(), 0);
}
