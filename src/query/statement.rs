//! Statement kinds, shared builder state, and the root-statement factory.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::{OrmError, Result};
use crate::query::criteria::Criteria;
use crate::query::{
    DeleteStatement, InsertStatement, Projection, SelectStatement, TraverseStatement,
    UpdateStatement,
};
use crate::schema::Schema;
use crate::transport::Row;
use crate::value::Value;

/// Root statement kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// `SELECT`
    Select,
    /// `INSERT`
    Insert,
    /// `UPDATE`
    Update,
    /// `DELETE`
    Delete,
    /// `TRAVERSE`
    Traverse,
}

impl StatementKind {
    /// Leading keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Traverse => "TRAVERSE",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Post-processing step applied to every returned row.
#[derive(Clone)]
pub struct RowTransform(Arc<dyn Fn(Row) -> Row + Send + Sync>);

impl RowTransform {
    /// Wraps a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Row) -> Row + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Runs the transform.
    pub fn apply(&self, row: Row) -> Row {
        (self.0)(row)
    }
}

impl fmt::Debug for RowTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RowTransform(..)")
    }
}

/// Options carried from a statement into its compiled [`crate::query::Sql`].
#[derive(Clone, Debug, Default)]
pub struct StatementOptions {
    /// Row transforms, applied in order.
    pub transforms: Vec<RowTransform>,
    /// Opaque options forwarded to the transport.
    pub extra: BTreeMap<String, JsonValue>,
}

/// State shared by every statement kind.
#[derive(Debug, Default)]
pub struct StatementCore {
    /// Clauses.
    pub criteria: Criteria,
    /// Options passed through compilation.
    pub options: StatementOptions,
    /// Schema used to cast values at compile time.
    pub schema: Option<Arc<dyn Schema>>,
    /// First builder error; surfaced by compilation.
    pub error: Option<OrmError>,
}

/// Clause names accepted by [`Statement::set_option`]. A name from this list
/// that the active kind rejects is an error; other names are stored opaquely.
pub const CLAUSE_OPTIONS: &[&str] = &[
    "select", "traverse", "update", "into", "from", "let", "where", "while", "group", "order",
    "skip", "limit", "fetchPlan", "timeout", "lock", "parallel", "set", "increment", "add",
    "remove", "put", "content", "merge", "upsert", "return", "strategy",
];

/// Fluent statement builder.
///
/// Builder methods return `&mut Self`. A failing call records its error on the
/// statement and later calls become no-ops until compilation reports it.
pub trait Statement: fmt::Debug {
    /// Shared state.
    fn core(&self) -> &StatementCore;

    /// Mutable shared state.
    fn core_mut(&mut self) -> &mut StatementCore;

    /// Statement kind.
    fn kind(&self) -> StatementKind;

    /// Applies the clause named `name` from a loosely typed value. Returns
    /// `Ok(false)` when the kind has no such clause.
    fn apply_option(&mut self, name: &str, value: &JsonValue) -> Result<bool>;

    /// Clauses collected so far.
    fn criteria(&self) -> &Criteria {
        &self.core().criteria
    }

    /// Mutable clauses.
    fn criteria_mut(&mut self) -> &mut Criteria {
        &mut self.core_mut().criteria
    }

    /// Attached schema.
    fn schema(&self) -> Option<&Arc<dyn Schema>> {
        self.core().schema.as_ref()
    }

    /// Options carried into the compiled statement.
    fn options(&self) -> &StatementOptions {
        &self.core().options
    }

    /// Attaches a schema used for casting.
    fn set_schema(&mut self, schema: Arc<dyn Schema>) -> &mut Self {
        self.core_mut().schema = Some(schema);
        self
    }

    /// Adds named parameters referenced as `:name` by raw fragments.
    fn params<I, K, V>(&mut self, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let target = &mut self.core_mut().criteria.params;
        for (name, value) in params {
            target.insert(name.into(), value.into());
        }
        self
    }

    /// Adds one named parameter.
    fn param(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.core_mut()
            .criteria
            .params
            .insert(name.into(), value.into());
        self
    }

    /// Appends a row transform.
    fn transform<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Row) -> Row + Send + Sync + 'static,
    {
        self.core_mut().options.transforms.push(RowTransform::new(f));
        self
    }

    /// Applies a clause by name, or stores the value as an opaque option.
    fn set_option(&mut self, name: &str, value: JsonValue) -> &mut Self {
        if self.core().error.is_some() {
            return self;
        }
        match self.apply_option(name, &value) {
            Ok(true) => {}
            Ok(false) if CLAUSE_OPTIONS.contains(&name) => {
                let kind = self.kind();
                self.record_error(OrmError::UnsupportedStatementOperation {
                    kind,
                    clause: name.to_string(),
                });
            }
            Ok(false) => {
                self.core_mut().options.extra.insert(name.to_string(), value);
            }
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Applies every entry of `options` with [`Statement::set_option`].
    fn set_options(&mut self, options: serde_json::Map<String, JsonValue>) -> &mut Self {
        for (name, value) in options {
            self.set_option(&name, value);
        }
        self
    }

    /// Records a builder error; the first one wins.
    fn record_error(&mut self, err: OrmError) {
        let slot = &mut self.core_mut().error;
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    /// Fails with the recorded builder error, if any.
    fn check(&self) -> Result<()> {
        match &self.core().error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Any statement kind.
#[derive(Debug)]
pub enum AnyStatement {
    /// `SELECT`
    Select(SelectStatement),
    /// `INSERT`
    Insert(InsertStatement),
    /// `UPDATE`
    Update(UpdateStatement),
    /// `DELETE`
    Delete(DeleteStatement),
    /// `TRAVERSE`
    Traverse(TraverseStatement),
}

macro_rules! dispatch {
    ($self:expr, $stmt:ident => $body:expr) => {
        match $self {
            AnyStatement::Select($stmt) => $body,
            AnyStatement::Insert($stmt) => $body,
            AnyStatement::Update($stmt) => $body,
            AnyStatement::Delete($stmt) => $body,
            AnyStatement::Traverse($stmt) => $body,
        }
    };
}

impl Statement for AnyStatement {
    fn core(&self) -> &StatementCore {
        dispatch!(self, s => s.core())
    }

    fn core_mut(&mut self) -> &mut StatementCore {
        dispatch!(self, s => s.core_mut())
    }

    fn kind(&self) -> StatementKind {
        dispatch!(self, s => s.kind())
    }

    fn apply_option(&mut self, name: &str, value: &JsonValue) -> Result<bool> {
        dispatch!(self, s => s.apply_option(name, value))
    }
}

impl From<SelectStatement> for AnyStatement {
    fn from(s: SelectStatement) -> Self {
        AnyStatement::Select(s)
    }
}

impl From<InsertStatement> for AnyStatement {
    fn from(s: InsertStatement) -> Self {
        AnyStatement::Insert(s)
    }
}

impl From<UpdateStatement> for AnyStatement {
    fn from(s: UpdateStatement) -> Self {
        AnyStatement::Update(s)
    }
}

impl From<DeleteStatement> for AnyStatement {
    fn from(s: DeleteStatement) -> Self {
        AnyStatement::Delete(s)
    }
}

impl From<TraverseStatement> for AnyStatement {
    fn from(s: TraverseStatement) -> Self {
        AnyStatement::Traverse(s)
    }
}

/// Produces exactly one root statement.
#[derive(Debug, Default)]
pub struct Query {
    schema: Option<Arc<dyn Schema>>,
    statement: Option<AnyStatement>,
}

macro_rules! start_statement {
    ($self:ident, $variant:ident, $stmt:expr) => {{
        if let Some(existing) = &$self.statement {
            return Err(OrmError::StatementAlreadySet {
                existing: existing.kind(),
            });
        }
        let mut stmt = $stmt;
        if let Some(schema) = &$self.schema {
            stmt.set_schema(Arc::clone(schema));
        }
        match $self.statement.insert(AnyStatement::$variant(stmt)) {
            AnyStatement::$variant(stmt) => Ok(stmt),
            other => Err(OrmError::StatementAlreadySet {
                existing: other.kind(),
            }),
        }
    }};
}

impl Query {
    /// Empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Query whose statement casts through `schema`.
    pub fn with_schema(schema: Arc<dyn Schema>) -> Self {
        Self {
            schema: Some(schema),
            statement: None,
        }
    }

    /// Starts a `SELECT`.
    pub fn select<I, P>(&mut self, fields: I) -> Result<&mut SelectStatement>
    where
        I: IntoIterator<Item = P>,
        P: Into<Projection>,
    {
        start_statement!(self, Select, SelectStatement::with_fields(fields))
    }

    /// Starts an `INSERT`.
    pub fn insert(&mut self) -> Result<&mut InsertStatement> {
        start_statement!(self, Insert, InsertStatement::new())
    }

    /// Starts an `UPDATE` of `target`.
    pub fn update(&mut self, target: impl Into<String>) -> Result<&mut UpdateStatement> {
        start_statement!(self, Update, UpdateStatement::new(target))
    }

    /// Starts a `DELETE`.
    pub fn delete(&mut self) -> Result<&mut DeleteStatement> {
        start_statement!(self, Delete, DeleteStatement::new())
    }

    /// Starts a `TRAVERSE` of `fields`.
    pub fn traverse<I, S>(&mut self, fields: I) -> Result<&mut TraverseStatement>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        start_statement!(self, Traverse, TraverseStatement::new(fields))
    }

    /// Root statement, if started.
    pub fn statement(&self) -> Option<&AnyStatement> {
        self.statement.as_ref()
    }

    /// Consumes the query.
    pub fn into_statement(self) -> Option<AnyStatement> {
        self.statement
    }
}

pub(crate) fn json_strings(name: &str, value: &JsonValue) -> Result<Vec<String>> {
    match value {
        JsonValue::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| match item {
                JsonValue::String(s) => Ok(s.clone()),
                other => Err(OrmError::invalid_argument(format!(
                    "{name} expects strings, got {other}"
                ))),
            })
            .collect(),
        other => Err(OrmError::invalid_argument(format!(
            "{name} expects a string or a list of strings, got {other}"
        ))),
    }
}

pub(crate) fn json_str<'a>(name: &str, value: &'a JsonValue) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| OrmError::invalid_argument(format!("{name} expects a string, got {value}")))
}

pub(crate) fn json_u64(name: &str, value: &JsonValue) -> Result<u64> {
    value.as_u64().ok_or_else(|| {
        OrmError::invalid_argument(format!("{name} expects a non-negative integer, got {value}"))
    })
}

pub(crate) fn json_i64(name: &str, value: &JsonValue) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| OrmError::invalid_argument(format!("{name} expects an integer, got {value}")))
}

pub(crate) fn json_bool(name: &str, value: &JsonValue) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| OrmError::invalid_argument(format!("{name} expects a boolean, got {value}")))
}

pub(crate) fn json_map(name: &str, value: &JsonValue) -> Result<BTreeMap<String, Value>> {
    match Value::from(value.clone()) {
        Value::Map(map) => Ok(map),
        other => Err(OrmError::invalid_argument(format!(
            "{name} expects an object, got {other}"
        ))),
    }
}
