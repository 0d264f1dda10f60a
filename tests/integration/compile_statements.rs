#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;

use orientorm::query::ddl::{Attribute, ClassDef, IndexDef, PropertyDef};
use orientorm::query::{LockMode, TraverseStrategy};
use orientorm::schema::{ClassSchema, FieldDef, FieldType};
use orientorm::{
    Condition, Conditional, DeleteStatement, InsertStatement, OrmConfig, QueryBuilder,
    Schema, SelectStatement, Sql, Statement, TraverseStatement, UpdateStatement, Value,
};
use serde_json::{json, Map as JsonMap};

fn compile<S: Statement>(stmt: &S) -> Sql {
    QueryBuilder::default().compile(stmt).expect("compiles")
}

fn params(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

fn conditions(value: serde_json::Value) -> BTreeMap<String, Value> {
    Value::from(value).into_map().unwrap_or_default()
}

fn user_schema() -> Arc<dyn Schema> {
    Arc::new(
        ClassSchema::new("User")
            .field("name", FieldDef::new(FieldType::String))
            .field("age", FieldDef::new(FieldType::Integer))
            .field("tags", FieldDef::new(FieldType::List(Box::new(FieldType::String)))),
    )
}

#[test]
fn select_with_or_binds_params_in_order() {
    let mut stmt = SelectStatement::with_fields(["name", "age"]);
    stmt.from("User")
        .where_(("age", "$gte", 18))
        .or(("age", "$lt", 12));
    let sql = compile(&stmt);
    assert_eq!(sql.text, "SELECT name, age FROM User WHERE age >= :qp0 OR age < :qp1");
    assert_eq!(sql.params, params(&[("qp0", Value::Int(18)), ("qp1", Value::Int(12))]));
}

#[test]
fn nested_group_is_parenthesized() {
    let mut stmt = SelectStatement::new();
    stmt.from("User").where_(("name", "ann")).where_group(|g| {
        g.where_(("age", "$lt", 18)).or_where(("age", "$gt", 65));
    });
    let sql = compile(&stmt);
    assert_eq!(
        sql.text,
        "SELECT * FROM User WHERE name = :qp0 AND (age < :qp1 OR age > :qp2)"
    );
    assert_eq!(sql.params.get("qp0"), Some(&Value::from("ann")));
    assert_eq!(sql.params.get("qp2"), Some(&Value::Int(65)));
}

#[test]
fn empty_group_is_dropped() {
    let mut stmt = SelectStatement::new();
    stmt.from("User").where_(("name", "ann")).where_group(|_| {});
    assert_eq!(compile(&stmt).text, "SELECT * FROM User WHERE name = :qp0");
}

#[test]
fn or_key_in_a_condition_map_builds_a_group() {
    let mut stmt = SelectStatement::new();
    stmt.from("User")
        .where_(json!({"active": true}))
        .where_(json!({"$or": [{"age": {"$lt": 18}}, {"age": {"$gt": 65}}]}));
    assert_eq!(
        compile(&stmt).text,
        "SELECT * FROM User WHERE active = :qp0 AND (age < :qp1 OR age > :qp2)"
    );
}

#[test]
fn in_subquery_shares_the_param_registry() {
    let mut stmt = SelectStatement::with_fields(["name"]);
    stmt.from("User")
        .where_(("age", "$gt", 20))
        .where_subquery("@rid", "$in", |q| {
            q.select(["out"])?
                .from("Follows")
                .where_(("active", true));
            Ok(())
        });
    let sql = compile(&stmt);
    assert_eq!(
        sql.text,
        "SELECT name FROM User WHERE age > :qp0 AND @rid IN (SELECT out FROM Follows WHERE active = :qp1)"
    );
    assert_eq!(sql.params.get("qp1"), Some(&Value::Bool(true)));
}

#[test]
fn subquery_with_a_basic_operator_is_rejected() {
    let mut stmt = SelectStatement::new();
    stmt.from("User").where_subquery("@rid", "$gt", |q| {
        q.select(["@rid"])?.from("User");
        Ok(())
    });
    let err = QueryBuilder::default().compile(&stmt).unwrap_err();
    assert_eq!(err.code(), "UnsupportedSubquery");
}

#[test]
fn first_builder_error_wins() {
    let mut stmt = SelectStatement::new();
    stmt.from("User")
        .where_(("age", "$between", 3))
        .where_(("age", "$btw", vec![1]));
    let err = QueryBuilder::default().compile(&stmt).unwrap_err();
    assert_eq!(err.code(), "InvalidOperator");
}

#[test]
fn between_and_in_bind_every_element() {
    let mut stmt = SelectStatement::new();
    stmt.from("User")
        .where_(("age", "$btw", vec![18, 30]))
        .where_(("name", "$in", vec!["ann", "bob"]));
    let sql = compile(&stmt);
    assert_eq!(
        sql.text,
        "SELECT * FROM User WHERE age BETWEEN :qp0 AND :qp1 AND name IN [:qp2, :qp3]"
    );
    assert_eq!(sql.params.len(), 4);
}

#[test]
fn null_comparisons_render_is_null() {
    let mut stmt = SelectStatement::new();
    stmt.from("User")
        .where_(("deleted", Value::Null))
        .where_(("email", "$ne", Value::Null));
    let sql = compile(&stmt);
    assert_eq!(
        sql.text,
        "SELECT * FROM User WHERE deleted IS NULL AND email IS NOT NULL"
    );
    assert!(sql.params.is_empty());
}

#[test]
fn raw_fragments_carry_their_params() {
    let mut stmt = SelectStatement::new();
    stmt.from("User")
        .where_raw("name.toLowerCase() = :name", [("name", "ann")])
        .where_(("age", 30));
    let sql = compile(&stmt);
    assert_eq!(
        sql.text,
        "SELECT * FROM User WHERE name.toLowerCase() = :name AND age = :qp1"
    );
    assert_eq!(sql.params.get("name"), Some(&Value::from("ann")));
}

#[test]
fn select_renders_every_clause_in_order() {
    let mut stmt = SelectStatement::with_fields(["name", "count(*)"]);
    stmt.from("User")
        .let_("friends", "out('Follows')")
        .where_(("age", "$gte", 18))
        .group(["name", "age"])
        .order("name", "desc")
        .skip(5)
        .limit(10)
        .fetch("friends", 1)
        .timeout(250)
        .lock(LockMode::Record)
        .parallel(true);
    assert_eq!(
        compile(&stmt).text,
        "SELECT name, count(*) FROM User LET $friends = out('Follows') WHERE age >= :qp0 \
         GROUP BY name ORDER BY name DESC SKIP 5 LIMIT 10 FETCHPLAN friends:1 TIMEOUT 250 \
         LOCK record PARALLEL"
    );
}

#[test]
fn several_record_ids_form_a_bracketed_source() {
    let mut stmt = SelectStatement::new();
    stmt.from_targets(["#5:1", "#5:2"]);
    assert_eq!(compile(&stmt).text, "SELECT * FROM [#5:1, #5:2]");

    let mut mixed = SelectStatement::new();
    mixed.from_targets(["User", "#5:2"]);
    assert_eq!(compile(&mixed).text, "SELECT * FROM User");
}

#[test]
fn subquery_source_and_let_are_parenthesized() {
    let mut inner = SelectStatement::new();
    inner.from("User").where_(("age", "$gt", 30));
    let mut friends = SelectStatement::with_fields(["out"]);
    friends.from("Follows");

    let mut stmt = SelectStatement::with_fields(["name"]);
    stmt.from(inner).let_("f", friends).where_(("name", "ann"));
    assert_eq!(
        compile(&stmt).text,
        "SELECT name FROM (SELECT * FROM User WHERE age > :qp0) LET $f = (SELECT out FROM Follows) \
         WHERE name = :qp1"
    );
}

#[test]
fn projection_params_are_inlined() {
    let mut stmt = SelectStatement::new();
    stmt.select(["name", "age + :bonus"]).from("User").param("bonus", 2);
    assert_eq!(compile(&stmt).text, "SELECT name, age + 2 FROM User");
}

#[test]
fn insert_renders_set_and_return() {
    let mut stmt = InsertStatement::new();
    stmt.into_target("User")
        .set([("name", Value::from("ann")), ("age", Value::Int(30))])
        .return_("@rid");
    assert_eq!(
        compile(&stmt).text,
        r#"INSERT INTO User SET name = "ann", age = 30 RETURN @rid"#
    );
}

#[test]
fn insert_without_values_renders_only_the_target() {
    let mut stmt = InsertStatement::new();
    stmt.into_target("User");
    assert_eq!(compile(&stmt).text, "INSERT INTO User");
}

#[test]
fn update_renders_change_clauses_in_order() {
    let mut stmt = UpdateStatement::new("User");
    stmt.set([("name", "ann")])
        .increment([("visits", 1)])
        .add([("tags", "new")])
        .remove([("tags", "old")])
        .put("attrs", [("color", "red")])
        .return_("after", Some("@this"))
        .where_(("age", "$gt", 18))
        .limit(1);
    assert_eq!(
        compile(&stmt).text,
        r#"UPDATE User SET name = "ann" INCREMENT visits = 1 ADD tags = "new" REMOVE tags = "old" SET attrs.color = "red" RETURN AFTER @this WHERE age > :qp0 LIMIT 1"#
    );
}

#[test]
fn put_renders_natively_without_the_dialect_workaround() {
    let mut stmt = UpdateStatement::new("#5:1");
    stmt.put("attrs", [("color", "red")]);
    let sql = QueryBuilder::new(OrmConfig::strict_dialect())
        .compile(&stmt)
        .expect("compiles");
    assert_eq!(sql.text, r#"UPDATE #5:1 PUT attrs = "color", "red""#);
}

#[test]
fn content_suppresses_incremental_changes() {
    let mut stmt = UpdateStatement::new("#5:1");
    stmt.set([("name", "ann")]).merge(json!({"a": 1})).content(json!({"b": 2}));
    assert_eq!(compile(&stmt).text, r#"UPDATE #5:1 CONTENT {"b": 2}"#);

    let mut merge = UpdateStatement::new("#5:1");
    merge.increment([("visits", 1)]).merge(json!({"a": 1}));
    assert_eq!(compile(&merge).text, r#"UPDATE #5:1 MERGE {"a": 1}"#);
}

#[test]
fn update_with_several_record_ids() {
    let mut stmt = UpdateStatement::with_targets(["#5:1", "#5:2"]);
    stmt.set([("seen", true)]).upsert(true);
    assert_eq!(compile(&stmt).text, "UPDATE [#5:1, #5:2] SET seen = true UPSERT");
}

#[test]
fn schema_casts_change_values_and_conditions() {
    let builder = QueryBuilder::default();
    let update = builder.update(
        user_schema(),
        conditions(json!({"name": "ann"})),
        conditions(json!({"age": "31", "$add": {"tags": 7}})),
        JsonMap::new(),
    );
    assert_eq!(
        builder.compile(&update).expect("compiles").text,
        r#"UPDATE User SET age = 31 ADD tags = ["7"] WHERE name = :qp0"#
    );

    let mut select = builder.select(
        user_schema(),
        conditions(json!({"age": "40"})),
        ["name"],
        JsonMap::new(),
    );
    select.limit(1);
    let sql = builder.compile(&select).expect("compiles");
    assert_eq!(sql.params.get("qp0"), Some(&Value::Int(40)));
}

#[test]
fn builder_moves_rid_conditions_to_the_target() {
    let builder = QueryBuilder::default();
    let select = builder.select(
        "User",
        conditions(json!({"@rid": "#5:1"})),
        Vec::<&str>::new(),
        JsonMap::new(),
    );
    assert_eq!(builder.compile(&select).expect("compiles").text, "SELECT * FROM #5:1");

    let update = builder.update(
        "User",
        conditions(json!({"@rid": "#5:1"})),
        conditions(json!({"name": "ann"})),
        JsonMap::new(),
    );
    assert_eq!(
        builder.compile(&update).expect("compiles").text,
        r#"UPDATE #5:1 SET name = "ann""#
    );
}

#[test]
fn delete_renders_lock_return_and_where() {
    let mut stmt = DeleteStatement::new();
    stmt.from("User")
        .lock(LockMode::Record)
        .return_("before", None)
        .where_(("age", "$lt", 10))
        .limit(3);
    assert_eq!(
        compile(&stmt).text,
        "DELETE FROM User LOCK record RETURN BEFORE WHERE age < :qp0 LIMIT 3"
    );
}

#[test]
fn traverse_renders_while_and_strategy() {
    let mut stmt = TraverseStatement::new(["out('Follows')"]);
    stmt.from("#9:0")
        .while_(("$depth", "$lte", 3))
        .limit(20)
        .strategy(TraverseStrategy::BreadthFirst);
    assert_eq!(
        compile(&stmt).text,
        "TRAVERSE out('Follows') FROM #9:0 WHILE $depth <= :qp0 LIMIT 20 STRATEGY BREADTH_FIRST"
    );
}

#[test]
fn caller_params_are_never_overwritten() {
    let mut stmt = SelectStatement::new();
    stmt.from("User").where_(("age", 30));
    let sql = QueryBuilder::default()
        .compile_with(&stmt, params(&[("qp0", Value::from("kept"))]))
        .expect("compiles");
    assert_eq!(sql.text, "SELECT * FROM User WHERE age = :qp1");
    assert_eq!(sql.params.get("qp0"), Some(&Value::from("kept")));
    assert_eq!(sql.params.get("qp1"), Some(&Value::Int(30)));
}

#[test]
fn statement_options_apply_by_name() {
    let mut stmt = SelectStatement::new();
    stmt.set_options(
        json!({"from": "User", "where": {"age": {"$gt": 3}}, "limit": 2, "fetch": "*:-1"})
            .as_object()
            .cloned()
            .unwrap_or_default(),
    );
    let sql = compile(&stmt);
    assert_eq!(sql.text, "SELECT * FROM User WHERE age > :qp0 LIMIT 2");
    assert_eq!(sql.options.extra.get("fetch"), Some(&json!("*:-1")));
}

#[test]
fn condition_helpers_group_members() {
    let mut stmt = SelectStatement::new();
    stmt.from("User").where_(Condition::any(vec![
        Condition::compare("name", "=", "ann"),
        Condition::compare("name", "=", "bob"),
    ]));
    assert_eq!(
        compile(&stmt).text,
        "SELECT * FROM User WHERE (name = :qp0 OR name = :qp1)"
    );
}

#[test]
fn ddl_statements() {
    let def = ClassDef::new("User")
        .extends("V")
        .property(PropertyDef::new("name", "STRING").attribute(Attribute::set("mandatory", "true")))
        .index(IndexDef::new("name_idx", "unique", ["name"]));
    let texts = QueryBuilder::default().create_class(&def);
    assert_eq!(texts[0], "CREATE CLASS User EXTENDS V");
    assert_eq!(
        texts[1..],
        [
            "CREATE PROPERTY User.name STRING".to_string(),
            "ALTER PROPERTY User.name MANDATORY true".to_string(),
            "CREATE INDEX User.name_idx ON User (name) UNIQUE".to_string(),
        ]
    );
}
