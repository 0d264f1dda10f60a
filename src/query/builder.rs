//! Class-level statement shortcuts, grammar selection, and DDL helpers.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::config::OrmConfig;
use crate::error::{OrmError, Result};
use crate::grammar::{grammar_for, literal, Grammar};
use crate::query::clauses::Conditional;
use crate::query::condition::Condition;
use crate::query::criteria::ChangeKind;
use crate::query::ddl::{self, Attribute, ClassDef, IndexDef, PropertyDef};
use crate::query::sql::Sql;
use crate::query::statement::{Statement, StatementKind};
use crate::query::{DeleteStatement, InsertStatement, Projection, SelectStatement, UpdateStatement};
use crate::schema::Schema;
use crate::value::Value;

/// Class addressed by a shortcut: a bare name or a schema carrying one.
#[derive(Clone, Debug)]
pub enum ClassRef {
    /// Class name; values pass through uncast.
    Name(String),
    /// Schema used for both the name and casting.
    Schema(Arc<dyn Schema>),
}

impl ClassRef {
    /// Wraps a concrete schema.
    pub fn schema<S: Schema + 'static>(schema: Arc<S>) -> Self {
        ClassRef::Schema(schema)
    }

    /// Class name.
    pub fn name(&self) -> &str {
        match self {
            ClassRef::Name(name) => name,
            ClassRef::Schema(schema) => schema.class_name(),
        }
    }

    fn attach<S: Statement>(&self, stmt: &mut S) {
        if let ClassRef::Schema(schema) = self {
            stmt.set_schema(Arc::clone(schema));
        }
    }
}

impl From<&str> for ClassRef {
    fn from(name: &str) -> Self {
        ClassRef::Name(name.to_string())
    }
}

impl From<String> for ClassRef {
    fn from(name: String) -> Self {
        ClassRef::Name(name)
    }
}

impl From<Arc<dyn Schema>> for ClassRef {
    fn from(schema: Arc<dyn Schema>) -> Self {
        ClassRef::Schema(schema)
    }
}

/// Compiles statements and builds pre-wired ones by class and conditions.
#[derive(Clone, Debug, Default)]
pub struct QueryBuilder {
    config: OrmConfig,
}

impl QueryBuilder {
    /// Builder using `config`.
    pub fn new(config: OrmConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    /// Grammar compiling statements of `kind`.
    pub fn new_grammar(&self, kind: StatementKind) -> &'static dyn Grammar {
        grammar_for(kind)
    }

    /// Compiles `stmt` with a fresh parameter map.
    pub fn compile<S: Statement + ?Sized>(&self, stmt: &S) -> Result<Sql> {
        self.compile_with(stmt, BTreeMap::new())
    }

    /// Compiles `stmt`; `params` are merged before placeholders are allocated.
    pub fn compile_with<S: Statement + ?Sized>(
        &self,
        stmt: &S,
        params: BTreeMap<String, Value>,
    ) -> Result<Sql> {
        self.new_grammar(stmt.kind())
            .compile(stmt.core(), &self.config, params)
    }

    /// Inline dialect literal of `value`.
    pub fn value_to_string(&self, value: &Value) -> String {
        literal::value_to_string(value)
    }

    /// `INSERT INTO class SET ...`
    pub fn insert(
        &self,
        class: impl Into<ClassRef>,
        record: BTreeMap<String, Value>,
        options: JsonMap<String, JsonValue>,
    ) -> InsertStatement {
        let class = class.into();
        let mut stmt = InsertStatement::new();
        class.attach(&mut stmt);
        stmt.into_target(class.name()).set(record).set_options(options);
        stmt
    }

    /// `UPDATE class ... WHERE conditions`.
    ///
    /// `@rid` in `conditions` becomes the direct target. Keys of `update`
    /// starting with `$` name change operations (`$set`, `$increment`, `$add`,
    /// `$remove`, `$put`, `$content`, `$merge`); other keys are set.
    pub fn update(
        &self,
        class: impl Into<ClassRef>,
        mut conditions: BTreeMap<String, Value>,
        update: BTreeMap<String, Value>,
        options: JsonMap<String, JsonValue>,
    ) -> UpdateStatement {
        let class = class.into();
        let target = conditions
            .remove("@rid")
            .map(|rid| rid.plain_text())
            .unwrap_or_else(|| class.name().to_string());
        let mut stmt = UpdateStatement::new(target);
        class.attach(&mut stmt);
        if !conditions.is_empty() {
            stmt.where_(Condition::from_map(conditions));
        }

        let (ops, plain): (BTreeMap<_, _>, BTreeMap<_, _>) =
            update.into_iter().partition(|(key, _)| key.starts_with('$'));
        if !plain.is_empty() {
            stmt.set(plain);
        }
        for (op, operand) in ops {
            apply_update_op(&mut stmt, &op, operand);
        }
        stmt.set_options(options);
        stmt
    }

    /// `DELETE FROM class WHERE conditions`
    pub fn delete(
        &self,
        class: impl Into<ClassRef>,
        conditions: BTreeMap<String, Value>,
        options: JsonMap<String, JsonValue>,
    ) -> DeleteStatement {
        let class = class.into();
        let mut stmt = DeleteStatement::new();
        class.attach(&mut stmt);
        stmt.from(class.name());
        if !conditions.is_empty() {
            stmt.where_(Condition::from_map(conditions));
        }
        stmt.set_options(options);
        stmt
    }

    /// `SELECT fields FROM class WHERE conditions`; `@rid` in `conditions`
    /// becomes the source.
    pub fn select<I, P>(
        &self,
        class: impl Into<ClassRef>,
        mut conditions: BTreeMap<String, Value>,
        fields: I,
        options: JsonMap<String, JsonValue>,
    ) -> SelectStatement
    where
        I: IntoIterator<Item = P>,
        P: Into<Projection>,
    {
        let class = class.into();
        let source = conditions
            .remove("@rid")
            .map(|rid| rid.plain_text())
            .unwrap_or_else(|| class.name().to_string());
        let mut stmt = SelectStatement::with_fields(fields);
        class.attach(&mut stmt);
        stmt.from(source);
        if !conditions.is_empty() {
            stmt.where_(Condition::from_map(conditions));
        }
        stmt.set_options(options);
        stmt
    }

    /// See [`ddl::create_class`].
    pub fn create_class(&self, def: &ClassDef) -> Vec<String> {
        ddl::create_class(def)
    }

    /// See [`ddl::alter_class`].
    pub fn alter_class(&self, class: &str, attributes: &[Attribute]) -> Vec<String> {
        ddl::alter_class(class, attributes)
    }

    /// See [`ddl::drop_class`].
    pub fn drop_class(&self, class: &str) -> Vec<String> {
        ddl::drop_class(class)
    }

    /// See [`ddl::truncate_class`].
    pub fn truncate_class(&self, class: &str) -> Vec<String> {
        ddl::truncate_class(class)
    }

    /// See [`ddl::create_property`].
    pub fn create_property(&self, class: &str, def: &PropertyDef) -> Vec<String> {
        ddl::create_property(class, def)
    }

    /// See [`ddl::alter_property`].
    pub fn alter_property(
        &self,
        class: &str,
        property: &str,
        attributes: &[Attribute],
    ) -> Vec<String> {
        ddl::alter_property(class, property, attributes)
    }

    /// See [`ddl::drop_property`].
    pub fn drop_property(&self, class: &str, property: &str) -> Vec<String> {
        ddl::drop_property(class, property)
    }

    /// See [`ddl::create_index`].
    pub fn create_index(&self, def: &IndexDef, class: Option<&str>) -> Vec<String> {
        ddl::create_index(def, class)
    }

    /// See [`ddl::drop_index`].
    pub fn drop_index(&self, name: &str, class: Option<&str>) -> Vec<String> {
        ddl::drop_index(name, class)
    }

    /// See [`ddl::rebuild_index`].
    pub fn rebuild_index(&self, name: Option<&str>, class: Option<&str>) -> Vec<String> {
        ddl::rebuild_index(name, class)
    }
}

fn apply_update_op(stmt: &mut UpdateStatement, op: &str, operand: Value) {
    match op {
        "$content" => {
            stmt.content(operand);
        }
        "$merge" => {
            stmt.merge(operand);
        }
        _ => match op.parse::<ChangeKind>() {
            Ok(kind) => match operand {
                Value::Map(changes) => {
                    stmt.change(kind, changes);
                }
                other => stmt.record_error(OrmError::invalid_argument(format!(
                    "{op} expects a map of changes, got {other}"
                ))),
            },
            Err(()) => stmt.record_error(OrmError::UnsupportedStatementOperation {
                kind: StatementKind::Update,
                clause: op.to_string(),
            }),
        },
    }
}
