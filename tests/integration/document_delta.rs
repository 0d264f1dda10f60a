#![allow(missing_docs)]

use std::sync::Arc;

use orientorm::query::ChangeKind;
use orientorm::schema::{ClassSchema, ContainerKind, FieldDef, FieldType};
use orientorm::tracking::{Document, Selection};
use orientorm::{OrmConfig, QueryBuilder, RecordId, Schema, Statement, Value};
use serde_json::json;

fn schema() -> Arc<dyn Schema> {
    Arc::new(
        ClassSchema::new("User")
            .field("name", FieldDef::new(FieldType::String).required())
            .field("age", FieldDef::new(FieldType::Integer))
            .field("status", FieldDef::new(FieldType::String).default_value("active"))
            .field("tags", FieldDef::new(FieldType::List(Box::new(FieldType::String))))
            .field("labels", FieldDef::new(FieldType::Set(Box::new(FieldType::String))))
            .field("attrs", FieldDef::new(FieldType::Map(Box::new(FieldType::String))))
            .field("friends", FieldDef::new(FieldType::List(Box::new(FieldType::Embedded))))
            .field("address", FieldDef::new(FieldType::Embedded)),
    )
}

fn loaded() -> Document {
    loaded_with(None)
}

fn loaded_with(selection: Option<Selection>) -> Document {
    let record = Value::from(json!({
        "@rid": "#5:1",
        "@version": 2,
        "name": "ann",
        "age": 30,
        "tags": ["a"],
        "labels": ["x"],
        "attrs": {"color": "blue", "size": "m"},
        "friends": [{"name": "bob"}, {"name": "cid"}],
        "address": {"city": "Oslo", "zip": "0150"}
    }));
    Document::hydrate(schema(), record.into_map().unwrap_or_default(), selection)
        .expect("hydrates")
}

fn update_text(doc: &mut Document) -> Option<String> {
    doc.to_update()
        .expect("update builds")
        .map(|stmt| QueryBuilder::default().compile(&stmt).expect("compiles").text)
}

#[test]
fn push_adds_only_the_new_value() {
    let mut doc = loaded();
    doc.list_mut("tags").expect("list").push(["b"]).expect("push");
    let delta = doc.delta();
    assert_eq!(delta.rid, Some(RecordId::new(5, 1)));
    assert_eq!(delta.ops.len(), 1);
    assert_eq!(delta.ops[0].kind, ChangeKind::Add);
    assert_eq!(delta.ops[0].value, Value::from("b"));
    assert_eq!(
        update_text(&mut doc).as_deref(),
        Some(r#"UPDATE #5:1 ADD tags = ["b"] RETURN AFTER @this"#)
    );
}

#[test]
fn several_pushes_accumulate_into_one_add() {
    let mut doc = loaded();
    {
        let mut tags = doc.list_mut("tags").expect("list");
        tags.push(["b"]).expect("push");
        tags.push(["c"]).expect("push");
    }
    let delta = doc.delta();
    assert_eq!(delta.ops.len(), 1);
    assert_eq!(delta.ops[0].value, Value::from(vec!["b", "c"]));
}

#[test]
fn splice_rewrites_the_whole_list() {
    let mut doc = loaded();
    {
        let mut tags = doc.list_mut("tags").expect("list");
        tags.push(["b"]).expect("push");
        tags.splice(0, 1, ["z"]).expect("splice");
    }
    let delta = doc.delta();
    assert_eq!(delta.ops.len(), 1);
    assert_eq!(delta.ops[0].kind, ChangeKind::Set);
    assert_eq!(delta.ops[0].value, Value::from(vec!["z", "b"]));
}

#[test]
fn pull_of_scalars_removes_incrementally() {
    let mut doc = loaded();
    doc.list_mut("tags").expect("list").pull(["a"]).expect("pull");
    assert_eq!(
        update_text(&mut doc).as_deref(),
        Some(r#"UPDATE #5:1 REMOVE tags = "a" RETURN AFTER @this"#)
    );
}

#[test]
fn pull_of_documents_falls_back_to_set() {
    let mut doc = loaded();
    doc.list_mut("friends")
        .expect("list")
        .pull([Value::from(json!({"name": "bob"}))])
        .expect("pull");
    let delta = doc.delta();
    assert!(delta.has(ChangeKind::Set, "friends"));
    assert!(!delta.has(ChangeKind::Remove, "friends"));
}

#[test]
fn pull_of_documents_stays_incremental_without_the_quirk() {
    let mut doc = loaded().with_dialect(OrmConfig::strict_dialect().dialect);
    doc.list_mut("friends")
        .expect("list")
        .pull([Value::from(json!({"name": "bob"}))])
        .expect("pull");
    assert!(doc.delta().has(ChangeKind::Remove, "friends"));
}

#[test]
fn set_typed_push_skips_present_values() {
    let mut doc = loaded();
    let len = doc
        .list_mut("labels")
        .expect("set")
        .push(["x", "y", "y"])
        .expect("push");
    assert_eq!(len, 2);
    let delta = doc.delta();
    assert_eq!(delta.ops[0].kind, ChangeKind::Add);
    assert_eq!(delta.ops[0].value, Value::from("y"));
}

#[test]
fn map_put_and_remove_become_separate_clauses() {
    let mut doc = loaded();
    {
        let mut attrs = doc.map_mut("attrs").expect("map");
        attrs.put("color", "red").expect("put");
        assert_eq!(attrs.remove(["size"]), 1);
    }
    let delta = doc.delta();
    assert!(delta.has(ChangeKind::Put, "attrs"));
    assert!(delta.has(ChangeKind::Remove, "attrs"));
    assert_eq!(
        update_text(&mut doc).as_deref(),
        Some(r#"UPDATE #5:1 REMOVE attrs = "size" SET attrs.color = "red" RETURN AFTER @this"#)
    );
}

#[test]
fn removing_a_freshly_put_key_does_not_write_it_back() {
    let mut doc = loaded();
    {
        let mut attrs = doc.map_mut("attrs").expect("map");
        attrs.put("extra", "v").expect("put");
        assert_eq!(attrs.remove(["extra"]), 1);
    }
    let delta = doc.delta();
    assert!(!delta.has(ChangeKind::Put, "attrs"));
    assert_eq!(
        update_text(&mut doc).as_deref(),
        Some(r#"UPDATE #5:1 REMOVE attrs = "extra" RETURN AFTER @this"#)
    );
}

#[test]
fn putting_a_removed_key_cancels_the_removal() {
    let mut doc = loaded();
    {
        let mut attrs = doc.map_mut("attrs").expect("map");
        assert_eq!(attrs.remove(["size"]), 1);
        attrs.put("size", "l").expect("put");
    }
    assert_eq!(
        update_text(&mut doc).as_deref(),
        Some(r#"UPDATE #5:1 SET attrs.size = "l" RETURN AFTER @this"#)
    );
}

#[test]
fn element_write_after_push_rewrites_the_list() {
    let mut doc = loaded();
    doc.list_mut("tags").expect("list").push(["b"]).expect("push");
    doc.set("tags.0", "z").expect("set");
    assert_eq!(doc.get("tags"), Some(&Value::from(vec!["z", "b"])));
    let delta = doc.delta();
    assert_eq!(delta.ops.len(), 1);
    assert_eq!(delta.ops[0].kind, ChangeKind::Set);
    assert_eq!(
        update_text(&mut doc).as_deref(),
        Some(r#"UPDATE #5:1 SET tags = ["z", "b"] RETURN AFTER @this"#)
    );
}

#[test]
fn dirty_entries_carry_the_container_shape() {
    let mut doc = loaded();
    doc.list_mut("labels").expect("set").push(["y"]).expect("push");
    doc.set("age", 31).expect("set");
    let dirty = doc.dirty();
    let shapes: Vec<_> = dirty.iter().map(|entry| (entry.path.as_str(), entry.container)).collect();
    assert_eq!(
        shapes,
        vec![("age", None), ("labels", Some(ContainerKind::Set))]
    );
}

#[test]
fn assigning_a_container_supersedes_its_atomics() {
    let mut doc = loaded();
    doc.list_mut("tags").expect("list").push(["b"]).expect("push");
    doc.set("tags", vec!["q"]).expect("set");
    let delta = doc.delta();
    assert_eq!(delta.ops.len(), 1);
    assert_eq!(delta.ops[0].kind, ChangeKind::Set);
    assert_eq!(delta.ops[0].value, Value::from(vec!["q"]));
}

#[test]
fn nested_change_collapses_into_the_modified_parent() {
    let mut doc = loaded();
    doc.set("address", json!({"city": "Bergen"})).expect("set");
    doc.set("address.zip", "5003").expect("set");
    let dirty = doc.dirty();
    assert_eq!(dirty.len(), 1);
    assert_eq!(dirty[0].path, "address");
    assert_eq!(
        dirty[0].value,
        Some(Value::from(json!({"city": "Bergen", "zip": "5003"})))
    );
}

#[test]
fn nested_path_alone_is_set_directly() {
    let mut doc = loaded();
    doc.set("address.city", "Bergen").expect("set");
    assert_eq!(
        update_text(&mut doc).as_deref(),
        Some(r#"UPDATE #5:1 SET address.city = "Bergen" RETURN AFTER @this"#)
    );
}

#[test]
fn unset_renders_a_null_set() {
    let mut doc = loaded();
    doc.unset("age");
    let delta = doc.delta();
    assert_eq!(delta.ops[0].kind, ChangeKind::Set);
    assert_eq!(delta.ops[0].value, Value::Null);
    assert_eq!(
        update_text(&mut doc).as_deref(),
        Some("UPDATE #5:1 SET age = null RETURN AFTER @this")
    );
}

#[test]
fn unchanged_document_has_no_update() {
    let mut doc = loaded();
    doc.set("name", "ann").expect("set");
    assert!(update_text(&mut doc).is_none());
}

#[test]
fn casting_happens_on_assignment() {
    let mut doc = loaded();
    doc.set("age", "31").expect("set");
    assert_eq!(doc.get("age"), Some(&Value::Int(31)));
    let err = doc.set("age", "old").unwrap_err();
    assert_eq!(err.code(), "CastError");
}

#[test]
fn defaults_fill_only_selected_paths() {
    assert_eq!(loaded().get("status"), Some(&Value::from("active")));

    let doc = loaded_with(Some(Selection::exclude(["status"])));
    assert!(doc.get("status").is_none());
    assert!(!doc.is_selected("status"));
    assert!(doc.is_selected("name"));
}

#[test]
fn new_document_inserts_every_value() {
    let mut doc = Document::new(schema());
    doc.set("name", "ann").expect("set").set("age", 30).expect("set");
    let sql = QueryBuilder::default()
        .compile(&doc.to_insert())
        .expect("compiles");
    assert_eq!(
        sql.text,
        r#"INSERT INTO User SET age = 30, name = "ann", status = "active" RETURN @rid"#
    );
    assert!(doc.to_update().is_err());
}

#[test]
fn delete_addresses_the_record_id() {
    let doc = loaded();
    let stmt = doc.to_delete().expect("delete");
    let sql = QueryBuilder::default().compile(&stmt).expect("compiles");
    assert_eq!(sql.text, "DELETE FROM User RETURN BEFORE WHERE @rid = :qp0");
    assert_eq!(sql.params.get("qp0"), Some(&Value::Link(RecordId::new(5, 1))));
    assert!(stmt.schema().is_some());
}

#[test]
fn reset_forgets_pending_changes() {
    let mut doc = loaded();
    doc.list_mut("tags").expect("list").push(["b"]).expect("push");
    doc.set("age", 40).expect("set");
    assert!(doc.has_modifications());
    doc.reset();
    assert!(!doc.has_modifications());
    assert!(doc.delta().is_empty());
    assert_eq!(doc.get("age"), Some(&Value::Int(40)));
}

#[test]
fn validation_reports_missing_required_fields() {
    let mut doc = loaded();
    doc.set("name", "").expect("set");
    let err = doc.validate().unwrap_err();
    assert_eq!(err.code(), "ValidationError");
}
