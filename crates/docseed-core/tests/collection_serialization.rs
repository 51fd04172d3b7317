use docseed_core::CollectionTable;
use serde_json::json;

#[test]
fn serializes_collections_in_insertion_order() {
    let mut table = CollectionTable::new();
    table.insert("zebras", vec![json!({"_id": 1, "stripes": true})]);
    table.insert("apes", Vec::new());
    table.insert("moths", vec![json!({"b": 2, "a": 1})]);

    let json = serde_json::to_string(&table).expect("serialize table");
    assert_eq!(
        json,
        r#"{"zebras":[{"_id":1,"stripes":true}],"apes":[],"moths":[{"b":2,"a":1}]}"#
    );
}

#[test]
fn replacing_a_collection_keeps_its_position() {
    let mut table = CollectionTable::new();
    table.insert("first", Vec::new());
    table.insert("second", Vec::new());
    table.insert("first", vec![json!({"x": 1})]);

    assert_eq!(table.names().collect::<Vec<_>>(), vec!["first", "second"]);
    assert_eq!(table.document_count(), 1);
}

#[test]
fn deserializes_from_json_object() {
    let table: CollectionTable =
        serde_json::from_str(r#"{"people":[{"name":"Ada"}],"bands":[]}"#).expect("parse");
    assert_eq!(table.len(), 2);
    assert_eq!(table.get("people").map(<[_]>::len), Some(1));
    assert!(table.get("bands").is_some_and(<[_]>::is_empty));
}
