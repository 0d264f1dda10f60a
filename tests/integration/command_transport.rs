#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Once};

use orientorm::query::ddl::ClassDef;
use orientorm::schema::{ClassSchema, FieldDef, FieldType};
use orientorm::transport::CallKind;
use orientorm::{
    Conditional, Connection, Document, MemoryTransport, OrmConfig, OrmError, Schema,
    SelectStatement, Statement, Sql, Value,
};
use serde_json::{json, Map as JsonMap};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("orientorm=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_test_writer()
            .try_init();
    });
}

fn schema() -> Arc<dyn Schema> {
    Arc::new(
        ClassSchema::new("User")
            .field("name", FieldDef::new(FieldType::String).required())
            .field("tags", FieldDef::new(FieldType::List(Box::new(FieldType::String))))
            .field("friends", FieldDef::new(FieldType::List(Box::new(FieldType::Embedded)))),
    )
}

fn record(value: serde_json::Value) -> BTreeMap<String, Value> {
    Value::from(value).into_map().unwrap_or_default()
}

#[tokio::test]
async fn new_document_save_inserts_and_takes_the_record_id() {
    init_tracing();
    let conn = Connection::<MemoryTransport>::default();
    conn.transport().push_json(json!({"@rid": "#12:4"}));

    let mut doc = Document::new(schema());
    doc.set("name", "ann").expect("set");
    assert_eq!(doc.save(&conn).await.expect("saved"), 1);

    assert!(!doc.is_new());
    assert_eq!(doc.rid().map(|rid| rid.to_string()).as_deref(), Some("#12:4"));
    assert!(!doc.has_modifications());

    let calls = conn.transport().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, CallKind::Query);
    assert_eq!(calls[0].text, r#"INSERT INTO User SET name = "ann" RETURN @rid"#);
}

#[tokio::test]
async fn loaded_document_save_sends_the_delta() {
    init_tracing();
    let conn = Connection::<MemoryTransport>::default();
    let mut doc = Document::hydrate(
        schema(),
        record(json!({"@rid": "#5:1", "name": "ann", "tags": ["a"]})),
        None,
    )
    .expect("hydrates");

    doc.list_mut("tags").expect("list").push(["b"]).expect("push");
    assert_eq!(doc.save(&conn).await.expect("saved"), 1);
    assert_eq!(
        conn.transport().texts(),
        vec![r#"UPDATE #5:1 ADD tags = ["b"] RETURN AFTER @this"#]
    );

    assert_eq!(doc.save(&conn).await.expect("saved"), 0);
    assert_eq!(conn.transport().calls().len(), 1);
}

#[tokio::test]
async fn save_follows_the_connection_dialect() {
    init_tracing();
    let record = || record(json!({"@rid": "#5:1", "name": "ann", "friends": [{"n": 1}, {"n": 2}]}));

    let conn = Connection::new(MemoryTransport::new(), OrmConfig::strict_dialect());
    let mut doc = Document::hydrate(schema(), record(), None).expect("hydrates");
    doc.list_mut("friends")
        .expect("list")
        .pull([Value::from(json!({"n": 1}))])
        .expect("pull");
    doc.save(&conn).await.expect("saved");
    assert_eq!(
        conn.transport().texts(),
        vec![r#"UPDATE #5:1 REMOVE friends = {"n": 1} RETURN AFTER @this"#]
    );

    let conn = Connection::<MemoryTransport>::default();
    let mut doc = Document::hydrate(schema(), record(), None).expect("hydrates");
    doc.list_mut("friends")
        .expect("list")
        .pull([Value::from(json!({"n": 1}))])
        .expect("pull");
    doc.save(&conn).await.expect("saved");
    assert_eq!(
        conn.transport().texts(),
        vec![r#"UPDATE #5:1 SET friends = [{"n": 2}] RETURN AFTER @this"#]
    );
}

#[tokio::test]
async fn invalid_document_is_not_sent() {
    let conn = Connection::<MemoryTransport>::default();
    let mut doc = Document::new(schema());
    let err = doc.save(&conn).await.unwrap_err();
    assert_eq!(err.code(), "ValidationError");
    assert!(conn.transport().calls().is_empty());
    assert!(doc.is_new());
}

#[tokio::test]
async fn failed_save_keeps_pending_changes() {
    let conn = Connection::<MemoryTransport>::default();
    conn.transport()
        .push_error(OrmError::invalid_argument("connection reset"));
    let mut doc = Document::hydrate(
        schema(),
        record(json!({"@rid": "#5:1", "name": "ann"})),
        None,
    )
    .expect("hydrates");
    doc.set("name", "bob").expect("set");

    assert!(doc.save(&conn).await.is_err());
    assert!(doc.is_direct_modified("name"));
}

#[tokio::test]
async fn remove_deletes_by_record_id() {
    let conn = Connection::<MemoryTransport>::default();
    let doc = Document::hydrate(
        schema(),
        record(json!({"@rid": "#5:1", "name": "ann"})),
        None,
    )
    .expect("hydrates");
    doc.remove(&conn).await.expect("removed");

    let calls = conn.transport().calls();
    assert_eq!(calls[0].kind, CallKind::Execute);
    assert_eq!(calls[0].text, "DELETE FROM User RETURN BEFORE WHERE @rid = :qp0");
    assert_eq!(calls[0].options.params_json()["qp0"], json!("#5:1"));
}

#[tokio::test]
async fn execute_runs_entries_in_order() {
    init_tracing();
    let conn = Connection::<MemoryTransport>::default();
    let mut command = conn.create_command();
    command
        .insert("User", record(json!({"name": "ann"})), JsonMap::new())
        .delete("User", record(json!({"name": "bob"})), JsonMap::new())
        .add_text("");
    assert_eq!(command.len(), 3);
    assert_eq!(command.execute(JsonMap::new()).await.expect("runs"), 2);
    assert_eq!(
        conn.transport().texts(),
        vec![
            r#"INSERT INTO User SET name = "ann""#.to_string(),
            "DELETE FROM User WHERE name = :qp0".to_string(),
        ]
    );
}

#[tokio::test]
async fn bound_values_and_options_reach_the_transport() {
    let conn = Connection::<MemoryTransport>::default();
    let mut command = conn.command(Sql::new("SELECT FROM User WHERE name = :name", BTreeMap::new()));
    command.bind_value("name", "ann", 0);
    let overrides = json!({"fetchPlan": "*:1"}).as_object().cloned().unwrap_or_default();
    command.all(overrides).await.expect("rows");

    let call = &conn.transport().calls()[0];
    assert_eq!(call.options.params.get("name"), Some(&Value::from("ann")));
    assert_eq!(call.options.extra.get("fetchPlan"), Some(&json!("*:1")));
}

#[tokio::test]
async fn one_keeps_only_the_first_row() {
    let conn = Connection::<MemoryTransport>::default();
    conn.transport()
        .push_json(json!([{"name": "ann"}, {"name": "bob"}]));
    let mut stmt = SelectStatement::new();
    stmt.from("User");
    let row = conn.command(stmt).one(JsonMap::new()).await.expect("row");
    assert_eq!(row.map(|row| row["name"].clone()), Some(json!("ann")));
}

#[tokio::test]
async fn column_defaults_to_the_first_plain_field() {
    let conn = Connection::<MemoryTransport>::default();
    conn.transport().push_json(json!([
        {"@rid": "#5:1", "name": "ann"},
        {"@rid": "#5:2", "name": "bob"}
    ]));
    let mut stmt = SelectStatement::with_fields(["name"]);
    stmt.from("User");
    let names = conn
        .command(stmt)
        .column(None, JsonMap::new())
        .await
        .expect("column");
    assert_eq!(names, vec![json!("ann"), json!("bob")]);
}

#[tokio::test]
async fn scalar_of_an_empty_result_is_none() {
    let conn = Connection::<MemoryTransport>::default();
    let mut stmt = SelectStatement::with_fields(["count(*)"]);
    stmt.from("User").where_(("age", "$gt", 3));
    assert!(conn
        .command(stmt)
        .scalar(JsonMap::new())
        .await
        .expect("scalar")
        .is_none());
}

#[tokio::test]
async fn transport_errors_propagate() {
    let conn = Connection::<MemoryTransport>::default();
    conn.transport()
        .push_error(OrmError::invalid_argument("server gone"));
    let mut stmt = SelectStatement::new();
    stmt.from("User");
    let err = conn.command(stmt).all(JsonMap::new()).await.unwrap_err();
    assert_eq!(err.code(), "InvalidArgument");
}

#[tokio::test]
async fn builder_errors_surface_before_the_transport() {
    let conn = Connection::<MemoryTransport>::default();
    let mut stmt = SelectStatement::new();
    stmt.from("User").where_(("age", "~", 3));
    let err = conn.command(stmt).all(JsonMap::new()).await.unwrap_err();
    assert_eq!(err.code(), "InvalidOperator");
    assert!(conn.transport().calls().is_empty());
}

#[tokio::test]
async fn ddl_commands_run_each_statement() {
    let conn = Connection::<MemoryTransport>::default();
    let mut command = conn.create_command();
    command.create_class(&ClassDef::new("User").extends("V"));
    command.execute(JsonMap::new()).await.expect("runs");
    command.rename_class("User", "Person");
    command.execute(JsonMap::new()).await.expect("runs");
    assert_eq!(
        conn.transport().texts(),
        vec!["CREATE CLASS User EXTENDS V", "ALTER CLASS User NAME Person"]
    );
}

#[tokio::test]
async fn statement_transforms_apply_to_every_row() {
    let conn = Connection::<MemoryTransport>::default();
    conn.transport().push_json(json!([{"n": 1}, {"n": 2}]));
    let mut stmt = SelectStatement::new();
    stmt.from("User").transform(|mut row| {
        let doubled = row.get("n").and_then(|n| n.as_i64()).unwrap_or(0) * 2;
        row.insert("n".into(), json!(doubled));
        row
    });
    let values = conn
        .command(stmt)
        .column(Some("n"), JsonMap::new())
        .await
        .expect("column");
    assert_eq!(values, vec![json!(2), json!(4)]);
}

#[tokio::test]
async fn connection_reads_its_config_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "param_prefix = \"p\"").expect("write");
    let conn = Connection::from_config_file(MemoryTransport::new(), file.path()).expect("config");
    assert_eq!(conn.config().param_prefix, "p");

    let mut stmt = SelectStatement::new();
    stmt.from("User").where_(("age", 3));
    conn.command(stmt).all(JsonMap::new()).await.expect("rows");
    assert_eq!(conn.transport().texts(), vec!["SELECT * FROM User WHERE age = :p0"]);
}
