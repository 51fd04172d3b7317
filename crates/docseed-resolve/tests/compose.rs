use std::path::PathBuf;

use docseed_core::Error;
use docseed_resolve::{compose, load_document, prepare, prepare_file};
use serde_json::json;

fn fixture(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

#[test]
fn required_fragments_populate_collections() {
    let table = prepare_file(&fixture("music/parent.yaml")).expect("prepare parent");

    assert_eq!(table.names().collect::<Vec<_>>(), vec!["people", "bands"]);

    let people = table.get("people").expect("people");
    assert_eq!(people.len(), 2);
    assert_eq!(
        people[0],
        json!({
            "active": true,
            "source": "fixtures",
            "label": "fixtures:on",
            "kind": "person",
            "instrument": "guitar",
            "_id": "john",
            "name": "John Lennon"
        })
    );
    assert_eq!(people[1]["_id"], json!("paul"));
    assert_eq!(people[1]["instrument"], json!("bass"));

    let bands = table.get("bands").expect("bands");
    assert_eq!(bands[0]["_id"], json!("beatles"));
    assert_eq!(bands[0]["formed"], json!(1960));
    assert_eq!(bands[0]["members"], json!(["john", "paul"]));
}

#[test]
fn composition_splices_definitions_at_the_directive() {
    let path = fixture("music/parent.yaml");
    let raw = load_document(&path).expect("load parent");
    let composed = compose(&raw, &path).expect("compose");

    let keys: Vec<&String> = composed.as_object().expect("object").keys().collect();
    assert_eq!(keys, ["$entity", "$person", "$band", "people", "bands"]);
}

#[test]
fn local_keys_win_and_later_requires_override_earlier() {
    let table = prepare_file(&fixture("collide/root.yaml")).expect("prepare root");

    assert_eq!(table.get("local"), Some(&[json!({"from": "b"})][..]));
    assert_eq!(table.get("owned"), Some(&[json!({"v": "root"})][..]));
    assert_eq!(table.get("only_a"), Some(&[json!({"v": "a"})][..]));
}

#[test]
fn circular_requires_are_rejected() {
    let err = prepare_file(&fixture("cycle/one.yaml")).expect_err("cycle");
    match err {
        Error::Compose { message, .. } => assert!(message.contains("circular"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn missing_required_file_names_the_path() {
    let err = prepare_file(&fixture("broken/missing.yaml")).expect_err("missing");
    match err {
        Error::Compose { path, .. } => {
            let path = path.expect("path");
            assert!(path.ends_with("nope.yaml"), "{}", path.display());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unparsable_required_file_is_a_compose_error() {
    let err = prepare_file(&fixture("broken/bad_syntax.yaml")).expect_err("invalid");
    assert!(matches!(err, Error::Compose { .. }), "{err:?}");
}

#[test]
fn require_without_source_path_is_rejected() {
    let raw = json!({"$require": "shared/fragments.yaml", "things": []});
    let err = prepare(&raw, None).expect_err("no source");
    assert!(matches!(err, Error::Compose { path: None, .. }));
}

#[test]
fn documents_without_require_need_no_source_path() {
    let raw = json!({
        "$test": {"a": 1, "b": 2},
        "things": [{"$extend": "test", "b": 3}]
    });
    let table = prepare(&raw, None).expect("prepare");
    assert_eq!(table.get("things"), Some(&[json!({"a": 1, "b": 3})][..]));
    assert!(table.get("$test").is_none());
}

#[test]
fn requires_resolve_relative_to_a_temp_directory() {
    let dir = std::env::temp_dir().join(format!("docseed_compose_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(dir.join("nested")).expect("create temp dir");
    std::fs::write(dir.join("root.json"), r#"{"$require": "nested/child.json", "items": [{"$extend": "item"}]}"#)
        .expect("write root");
    std::fs::write(dir.join("nested/child.json"), r#"{"$item": {"ok": true}}"#).expect("write child");

    let table = prepare_file(&dir.join("root.json")).expect("prepare");
    assert_eq!(table.get("items"), Some(&[json!({"ok": true})][..]));

    std::fs::remove_dir_all(&dir).ok();
}
