use ingest_core::store::{BatchItem, BatchItemBody, ContentKind, Store};
use ingest_core::{ingest, ingest_batch, BatchOptions, IngestInput, IngestOptions};

#[test]
fn ingest_text_persists_content_and_entities() {
    let store = Store::open_in_memory().unwrap();
    let result = ingest(
        store,
        IngestInput::Text("Acme Corp was founded in Berlin on 2020-01-01.".to_string()),
        &IngestOptions::default(),
    );

    assert!(result.success);
    assert_eq!(result.kind, ContentKind::Text);
    assert!(!result.entity_ids.is_empty());
}

#[test]
fn ingest_json_bytes_are_detected_and_entities_disabled() {
    let store = Store::open_in_memory().unwrap();
    let opts = IngestOptions { extract_entities: false, ..IngestOptions::default() };
    let result = ingest(
        store,
        IngestInput::Bytes(br#"{"company": "Acme Corp"}"#.to_vec()),
        &opts,
    );

    assert!(result.success);
    assert_eq!(result.kind, ContentKind::Json);
    assert!(result.entity_ids.is_empty());
}

#[test]
fn ingest_oversized_input_fails_without_panicking() {
    let store = Store::open_in_memory().unwrap();
    let opts = IngestOptions { max_file_size: 4, ..IngestOptions::default() };
    let result = ingest(store, IngestInput::Text("far too long for the limit".to_string()), &opts);

    assert!(!result.success);
    assert!(result.error.is_some());
}

#[test]
fn ingest_batch_processes_every_item_against_one_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ingest.sqlite3");

    let items = vec![
        BatchItem {
            id: "a".to_string(),
            body: BatchItemBody::Text("Acme Corp announced a product on 2021-05-04.".to_string()),
            kind: None,
            priority: 5,
        },
        BatchItem {
            id: "b".to_string(),
            body: BatchItemBody::Text(String::new()),
            kind: None,
            priority: 0,
        },
        BatchItem {
            id: "c".to_string(),
            body: BatchItemBody::Text("Beta LLC opened a second office.".to_string()),
            kind: None,
            priority: 1,
        },
    ];

    let opts = BatchOptions { dynamic_concurrency: false, ..BatchOptions::with_cores(3) };
    let result = ingest_batch(&db_path, items, &opts);

    assert_eq!(result.job.items_total, 3);
    assert_eq!(result.item_results.len(), 3);

    let store = Store::open(&db_path, "WAL", "INCREMENTAL").unwrap();
    let hits = store.search_content("Acme", 10).unwrap();
    assert!(!hits.is_empty());
}
