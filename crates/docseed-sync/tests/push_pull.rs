use std::path::{Path, PathBuf};

use docseed_core::{CollectionTable, Error};
use docseed_store::{InMemoryStore, Store};
use docseed_sync::{
    PullOptions, PushOptions, pull, pull_from_store, pull_to_stream, pull_to_stream_from_store,
    push, push_collections, push_file, push_to_store,
};
use serde_json::json;

fn fixture(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../docseed-resolve/tests/fixtures")
        .join(path)
}

fn memory_uri() -> String {
    format!("memory://sync_{}", uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn push_file_inserts_resolved_collections() {
    let uri = memory_uri();
    let report = push_file(&uri, &fixture("music/parent.yaml"), &PushOptions::default())
        .await
        .expect("push");

    assert!(!report.dropped);
    assert_eq!(report.documents_total(), 3);
    assert_eq!(report.collections[0].collection, "people");
    assert_eq!(report.collections[1].collection, "bands");

    let table = pull(&uri, &PullOptions::default()).await.expect("pull");
    assert_eq!(table.names().collect::<Vec<_>>(), ["people", "bands"]);

    let people = table.get("people").expect("people");
    assert_eq!(people[0]["_id"], "john");
    assert_eq!(people[0]["instrument"], "guitar");
    assert_eq!(people[0]["label"], "fixtures:on");
    assert_eq!(people[1]["instrument"], "bass");
    assert_eq!(table.get("bands").expect("bands")[0]["formed"], 1960);
}

#[tokio::test]
async fn drop_database_replaces_previous_content() {
    let uri = memory_uri();
    let raw = json!({"things": [{"n": 1}, {"n": 2}]});

    push(&uri, &raw, None, &PushOptions::default())
        .await
        .expect("first push");
    push(&uri, &raw, None, &PushOptions::default())
        .await
        .expect("second push");
    let table = pull(&uri, &PullOptions::default()).await.expect("pull");
    assert_eq!(table.get("things").expect("things").len(), 4);

    let report = push(&uri, &raw, None, &PushOptions { drop_database: true })
        .await
        .expect("drop push");
    assert!(report.dropped);
    let table = pull(&uri, &PullOptions::default()).await.expect("pull");
    assert_eq!(table.get("things").expect("things").len(), 2);
}

#[tokio::test]
async fn pull_filters_by_collection_and_query() {
    let store = InMemoryStore::new();
    let raw = json!({
        "people": [
            {"name": "Ada", "age": 36},
            {"name": "Grace", "age": 85}
        ],
        "bands": [{"name": "The Beatles"}]
    });
    push_to_store(&store, &raw, None, &PushOptions::default())
        .await
        .expect("push");

    let options = PullOptions {
        collection: Some("people".to_string()),
        query: Some(json!({"age": {"$gt": 40}})),
    };
    let table = pull_from_store(&store, &options).await.expect("pull");
    assert_eq!(table.len(), 1);
    let people = table.get("people").expect("people");
    assert_eq!(people.len(), 1);
    assert_eq!(people[0]["name"], "Grace");

    let missing = PullOptions {
        collection: Some("nobody".to_string()),
        query: None,
    };
    let table = pull_from_store(&store, &missing).await.expect("pull");
    assert_eq!(table.get("nobody").map(<[_]>::len), Some(0));
}

#[tokio::test]
async fn streamed_export_matches_materialized_export() {
    let uri = memory_uri();
    push_file(&uri, &fixture("music/parent.yaml"), &PushOptions::default())
        .await
        .expect("push");

    let mut sink = Vec::new();
    let bytes = pull_to_stream(&uri, &mut sink, &PullOptions::default())
        .await
        .expect("stream");

    let table = pull(&uri, &PullOptions::default()).await.expect("pull");
    let expected = serde_json::to_vec(&table).expect("serialize");
    assert_eq!(sink, expected);
    assert_eq!(bytes, expected.len() as u64);

    let parsed: CollectionTable = serde_json::from_slice(&sink).expect("parse");
    assert_eq!(parsed, table);
}

async fn seeded_people() -> InMemoryStore {
    let store = InMemoryStore::new();
    let raw = json!({
        "people": [
            {"_id": "ada", "age": 36},
            {"_id": "grace", "age": 85},
            {"_id": "alan", "age": 41}
        ],
        "bands": [{"_id": "beatles", "age": 64}]
    });
    push_to_store(&store, &raw, None, &PushOptions::default())
        .await
        .expect("seed");
    store
}

#[tokio::test]
async fn streamed_filtered_export_matches_materialized_export() {
    let store = seeded_people().await;
    let options = PullOptions {
        collection: Some("people".to_string()),
        query: Some(json!({"age": {"$gt": 40}})),
    };

    let mut sink = Vec::new();
    let bytes = pull_to_stream_from_store(&store, &mut sink, &options)
        .await
        .expect("stream");
    let table = pull_from_store(&store, &options).await.expect("pull");

    assert_eq!(sink, serde_json::to_vec(&table).expect("serialize"));
    assert_eq!(bytes, sink.len() as u64);
    assert_eq!(
        String::from_utf8(sink).expect("utf8"),
        r#"{"people":[{"_id":"grace","age":85},{"_id":"alan","age":41}]}"#
    );

    let query_only = PullOptions {
        collection: None,
        query: Some(json!({"age": {"$gte": 64}})),
    };
    let mut sink = Vec::new();
    pull_to_stream_from_store(&store, &mut sink, &query_only)
        .await
        .expect("stream");
    let table = pull_from_store(&store, &query_only).await.expect("pull");
    assert_eq!(sink, serde_json::to_vec(&table).expect("serialize"));
    assert_eq!(table.get("people").map(<[_]>::len), Some(1));
    assert_eq!(table.get("bands").map(<[_]>::len), Some(1));
}

#[tokio::test]
async fn streaming_a_missing_collection_writes_an_empty_array() {
    let store = seeded_people().await;
    let options = PullOptions {
        collection: Some("nobody".to_string()),
        query: None,
    };

    let mut sink = Vec::new();
    pull_to_stream_from_store(&store, &mut sink, &options)
        .await
        .expect("stream");
    assert_eq!(String::from_utf8(sink.clone()).expect("utf8"), r#"{"nobody":[]}"#);

    let table = pull_from_store(&store, &options).await.expect("pull");
    assert_eq!(sink, serde_json::to_vec(&table).expect("serialize"));
}

#[tokio::test]
async fn failing_insert_keeps_earlier_collections() {
    let store = InMemoryStore::new();
    let raw = json!({
        "first": [{"_id": 1}],
        "second": [{"_id": 7}, {"_id": 7}],
        "third": [{"_id": 3}]
    });

    let err = push_to_store(&store, &raw, None, &PushOptions::default())
        .await
        .expect_err("duplicate key");
    assert!(matches!(err, Error::Store(_)));
    assert_eq!(store.list_collections().await.expect("list"), ["first"]);
}

#[tokio::test]
async fn resolution_failure_leaves_store_untouched() {
    let store = InMemoryStore::new();
    push_to_store(&store, &json!({"keep": [{"v": 1}]}), None, &PushOptions::default())
        .await
        .expect("seed");

    let broken = json!({"things": [{"$extend": "ghost"}]});
    let err = push_to_store(&store, &broken, None, &PushOptions { drop_database: true })
        .await
        .expect_err("unknown fragment");
    assert!(matches!(err, Error::UnknownFragment(name) if name == "ghost"));
    assert_eq!(store.find_all("keep", None).await.expect("find").len(), 1);
}

#[tokio::test]
async fn empty_collections_are_reported_but_not_created() {
    let store = InMemoryStore::new();
    let mut table = CollectionTable::new();
    table.insert("empty", Vec::new());
    table.insert("full", vec![json!({"v": 1})]);

    let report = push_collections(&store, table, &PushOptions::default())
        .await
        .expect("push");
    assert_eq!(report.collections.len(), 2);
    assert_eq!(report.collections[0].documents, 0);
    assert_eq!(store.list_collections().await.expect("list"), ["full"]);
}
