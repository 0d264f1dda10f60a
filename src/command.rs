#![forbid(unsafe_code)]

//! Execution layer: commands run compiled statements through a transport.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

use crate::config::OrmConfig;
use crate::error::Result;
use crate::query::ddl::{Attribute, ClassDef, IndexDef, PropertyDef};
use crate::query::{
    AnyStatement, ClassRef, DeleteStatement, InsertStatement, Projection, Query, QueryBuilder,
    RowTransform, SelectStatement, Sql, Statement, TraverseStatement, UpdateStatement,
};
use crate::schema::Schema;
use crate::transport::{ExecOptions, Row, Transport};
use crate::value::Value;

/// Compiles `stmt` after yielding once to the runtime.
pub async fn to_sql<S: Statement + ?Sized>(builder: &QueryBuilder, stmt: &S) -> Result<Sql> {
    tokio::task::yield_now().await;
    builder.compile(stmt)
}

/// One unit of work held by a [`Command`].
#[derive(Debug)]
pub enum CommandEntry {
    /// Statement compiled right before it runs.
    Statement(AnyStatement),
    /// Text with explicit parameters.
    Sql(Sql),
}

impl CommandEntry {
    async fn to_sql(&self, builder: &QueryBuilder) -> Result<Sql> {
        match self {
            CommandEntry::Statement(stmt) => to_sql(builder, stmt).await,
            CommandEntry::Sql(sql) => {
                tokio::task::yield_now().await;
                Ok(sql.clone())
            }
        }
    }
}

macro_rules! statement_entries {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CommandEntry {
                fn from(stmt: $ty) -> Self {
                    CommandEntry::Statement(AnyStatement::from(stmt))
                }
            }
        )*
    };
}

statement_entries!(
    SelectStatement,
    InsertStatement,
    UpdateStatement,
    DeleteStatement,
    TraverseStatement,
);

impl From<AnyStatement> for CommandEntry {
    fn from(stmt: AnyStatement) -> Self {
        CommandEntry::Statement(stmt)
    }
}

impl From<Sql> for CommandEntry {
    fn from(sql: Sql) -> Self {
        CommandEntry::Sql(sql)
    }
}

/// Ordered list of statements bound to a connection.
#[derive(Debug)]
pub struct Command<'c, T: Transport> {
    conn: &'c Connection<T>,
    entries: Vec<CommandEntry>,
}

impl<'c, T: Transport> Command<'c, T> {
    fn new(conn: &'c Connection<T>) -> Self {
        Self {
            conn,
            entries: Vec::new(),
        }
    }

    /// Appends a statement or raw text.
    pub fn add(&mut self, entry: impl Into<CommandEntry>) -> &mut Self {
        self.entries.push(entry.into());
        self
    }

    /// Appends raw text without parameters.
    pub fn add_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.add(Sql::new(text, BTreeMap::new()))
    }

    /// Replaces every entry with `entry`.
    pub fn set(&mut self, entry: impl Into<CommandEntry>) -> &mut Self {
        self.clear().add(entry)
    }

    /// Replaces every entry with the given texts.
    pub fn set_texts(&mut self, texts: Vec<String>) -> &mut Self {
        self.clear();
        for text in texts {
            self.add_text(text);
        }
        self
    }

    /// Drops every entry.
    pub fn clear(&mut self) -> &mut Self {
        self.entries.clear();
        self
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` without entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in execution order.
    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    /// Binds a named parameter on entry `index`; missing entries are ignored.
    pub fn bind_value(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        index: usize,
    ) -> &mut Self {
        match self.entries.get_mut(index) {
            Some(CommandEntry::Statement(stmt)) => {
                stmt.param(name, value);
            }
            Some(CommandEntry::Sql(sql)) => {
                sql.params.insert(name.into(), value.into());
            }
            None => {}
        }
        self
    }

    /// Binds every entry of `values` on entry `index`.
    pub fn bind_values(&mut self, values: BTreeMap<String, Value>, index: usize) -> &mut Self {
        for (name, value) in values {
            self.bind_value(name, value, index);
        }
        self
    }

    /// Appends an `INSERT` built by the connection's query builder.
    pub fn insert(
        &mut self,
        class: impl Into<ClassRef>,
        record: BTreeMap<String, Value>,
        options: JsonMap<String, JsonValue>,
    ) -> &mut Self {
        let stmt = self.conn.builder().insert(class, record, options);
        self.add(stmt)
    }

    /// Appends an `UPDATE` built by the connection's query builder.
    pub fn update(
        &mut self,
        class: impl Into<ClassRef>,
        conditions: BTreeMap<String, Value>,
        update: BTreeMap<String, Value>,
        options: JsonMap<String, JsonValue>,
    ) -> &mut Self {
        let stmt = self.conn.builder().update(class, conditions, update, options);
        self.add(stmt)
    }

    /// Appends a `DELETE` built by the connection's query builder.
    pub fn delete(
        &mut self,
        class: impl Into<ClassRef>,
        conditions: BTreeMap<String, Value>,
        options: JsonMap<String, JsonValue>,
    ) -> &mut Self {
        let stmt = self.conn.builder().delete(class, conditions, options);
        self.add(stmt)
    }

    /// Appends a `SELECT` built by the connection's query builder.
    pub fn select<I, P>(
        &mut self,
        class: impl Into<ClassRef>,
        conditions: BTreeMap<String, Value>,
        fields: I,
        options: JsonMap<String, JsonValue>,
    ) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Projection>,
    {
        let stmt = self.conn.builder().select(class, conditions, fields, options);
        self.add(stmt)
    }

    /// Replaces the entries with the statements creating `def`.
    pub fn create_class(&mut self, def: &ClassDef) -> &mut Self {
        let texts = self.conn.builder().create_class(def);
        self.set_texts(texts)
    }

    /// Replaces the entries with `ALTER CLASS` statements.
    pub fn alter_class(&mut self, class: &str, attributes: &[Attribute]) -> &mut Self {
        let texts = self.conn.builder().alter_class(class, attributes);
        self.set_texts(texts)
    }

    /// Replaces the entries with `ALTER CLASS class NAME new_name`.
    pub fn rename_class(&mut self, class: &str, new_name: &str) -> &mut Self {
        self.alter_class(class, &[Attribute::set("name", new_name)])
    }

    /// Replaces the entries with `DROP CLASS`.
    pub fn drop_class(&mut self, class: &str) -> &mut Self {
        let texts = self.conn.builder().drop_class(class);
        self.set_texts(texts)
    }

    /// Replaces the entries with `TRUNCATE CLASS`.
    pub fn truncate_class(&mut self, class: &str) -> &mut Self {
        let texts = self.conn.builder().truncate_class(class);
        self.set_texts(texts)
    }

    /// Replaces the entries with the statements creating `def` on `class`.
    pub fn create_property(&mut self, class: &str, def: &PropertyDef) -> &mut Self {
        let texts = self.conn.builder().create_property(class, def);
        self.set_texts(texts)
    }

    /// Replaces the entries with `ALTER PROPERTY` statements.
    pub fn alter_property(
        &mut self,
        class: &str,
        property: &str,
        attributes: &[Attribute],
    ) -> &mut Self {
        let texts = self.conn.builder().alter_property(class, property, attributes);
        self.set_texts(texts)
    }

    /// Replaces the entries with `ALTER PROPERTY class.property NAME new_name`.
    pub fn rename_property(&mut self, class: &str, property: &str, new_name: &str) -> &mut Self {
        self.alter_property(class, property, &[Attribute::set("name", new_name)])
    }

    /// Replaces the entries with `DROP PROPERTY`.
    pub fn drop_property(&mut self, class: &str, property: &str) -> &mut Self {
        let texts = self.conn.builder().drop_property(class, property);
        self.set_texts(texts)
    }

    /// Replaces the entries with `CREATE INDEX`.
    pub fn create_index(&mut self, def: &IndexDef, class: Option<&str>) -> &mut Self {
        let texts = self.conn.builder().create_index(def, class);
        self.set_texts(texts)
    }

    /// Replaces the entries with `DROP INDEX`.
    pub fn drop_index(&mut self, name: &str, class: Option<&str>) -> &mut Self {
        let texts = self.conn.builder().drop_index(name, class);
        self.set_texts(texts)
    }

    /// Replaces the entries with `REBUILD INDEX`.
    pub fn rebuild_index(&mut self, name: Option<&str>, class: Option<&str>) -> &mut Self {
        let texts = self.conn.builder().rebuild_index(name, class);
        self.set_texts(texts)
    }

    /// Runs every entry in order; entries compiling to empty text are
    /// skipped. Returns how many statements reached the transport.
    pub async fn execute(&self, options: JsonMap<String, JsonValue>) -> Result<usize> {
        let mut executed = 0;
        for entry in &self.entries {
            let sql = entry.to_sql(self.conn.builder()).await?;
            if sql.is_empty() {
                debug!("command.execute.skip");
                continue;
            }
            let exec = ExecOptions::from_sql(&sql, &options);
            debug!(text = %sql.text, params = exec.params.len(), "command.execute");
            self.conn.transport().execute(&sql.text, &exec).await?;
            executed += 1;
        }
        Ok(executed)
    }

    /// Runs the first entry as a query and returns every row.
    pub async fn all(&self, options: JsonMap<String, JsonValue>) -> Result<Vec<Row>> {
        self.query_rows(options, false).await
    }

    /// Runs the first entry as a query and returns the first row.
    pub async fn one(&self, options: JsonMap<String, JsonValue>) -> Result<Option<Row>> {
        Ok(self.query_rows(options, true).await?.into_iter().next())
    }

    /// First field of the first row whose name does not start with `@`; the
    /// whole row when it has no such field.
    pub async fn scalar(&self, options: JsonMap<String, JsonValue>) -> Result<Option<JsonValue>> {
        let Some(mut row) = self.query_rows(options, false).await?.into_iter().next() else {
            return Ok(None);
        };
        Ok(Some(match first_plain_field(&row) {
            Some(key) => row.remove(&key).unwrap_or(JsonValue::Null),
            None => JsonValue::Object(row),
        }))
    }

    /// Field `name` of every row. Without a name the first field of the
    /// first row not starting with `@` is used. Missing fields are `null`.
    pub async fn column(
        &self,
        name: Option<&str>,
        options: JsonMap<String, JsonValue>,
    ) -> Result<Vec<JsonValue>> {
        let rows = self.query_rows(options, false).await?;
        let mut key = name.map(str::to_string);
        Ok(rows
            .into_iter()
            .map(|mut row| {
                if key.is_none() {
                    key = first_plain_field(&row);
                }
                key.as_deref()
                    .and_then(|key| row.remove(key))
                    .unwrap_or(JsonValue::Null)
            })
            .collect())
    }

    async fn query_rows(&self, options: JsonMap<String, JsonValue>, one: bool) -> Result<Vec<Row>> {
        let Some(entry) = self.entries.first() else {
            debug!("command.query.empty");
            return Ok(Vec::new());
        };
        let sql = entry.to_sql(self.conn.builder()).await?;
        let exec = ExecOptions::from_sql(&sql, &options);
        debug!(text = %sql.text, params = exec.params.len(), one, "command.query");
        let mut rows = self.conn.transport().query(&sql.text, &exec).await?;
        if one {
            rows.truncate(1);
        }
        Ok(apply_transforms(rows, &sql.options.transforms))
    }
}

fn first_plain_field(row: &Row) -> Option<String> {
    row.keys().find(|key| !key.starts_with('@')).cloned()
}

fn apply_transforms(rows: Vec<Row>, transforms: &[RowTransform]) -> Vec<Row> {
    if transforms.is_empty() {
        return rows;
    }
    rows.into_iter()
        .map(|row| transforms.iter().fold(row, |row, t| t.apply(row)))
        .collect()
}

/// Query builder plus transport.
#[derive(Debug)]
pub struct Connection<T: Transport> {
    builder: QueryBuilder,
    transport: T,
}

impl<T: Transport> Connection<T> {
    /// Connection compiling with `config`.
    pub fn new(transport: T, config: OrmConfig) -> Self {
        Self {
            builder: QueryBuilder::new(config),
            transport,
        }
    }

    /// Connection configured from a TOML file.
    pub fn from_config_file(transport: T, path: impl AsRef<Path>) -> Result<Self> {
        let config = OrmConfig::load(path)?;
        Ok(Self::new(transport, config))
    }

    /// Query builder.
    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Active configuration.
    pub fn config(&self) -> &OrmConfig {
        self.builder.config()
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Empty command.
    pub fn create_command(&self) -> Command<'_, T> {
        Command::new(self)
    }

    /// Command holding `entry`.
    pub fn command(&self, entry: impl Into<CommandEntry>) -> Command<'_, T> {
        let mut command = Command::new(self);
        command.add(entry);
        command
    }

    /// Empty query.
    pub fn create_query(&self) -> Query {
        Query::new()
    }

    /// Empty query casting through `schema`.
    pub fn query_for(&self, schema: Arc<dyn Schema>) -> Query {
        Query::with_schema(schema)
    }
}

impl<T: Transport + Default> Default for Connection<T> {
    fn default() -> Self {
        Self::new(T::default(), OrmConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Conditional;
    use crate::transport::MemoryTransport;
    use serde_json::json;

    #[tokio::test]
    async fn execute_skips_empty_statements() {
        let conn = Connection::<MemoryTransport>::default();
        let mut command = conn.create_command();
        command
            .add(SelectStatement::new())
            .add_text("DELETE VERTEX #9:1");
        assert_eq!(command.execute(JsonMap::new()).await.expect("runs"), 1);
        assert_eq!(conn.transport().texts(), vec!["DELETE VERTEX #9:1"]);
    }

    #[tokio::test]
    async fn scalar_skips_record_attributes() {
        let conn = Connection::<MemoryTransport>::default();
        conn.transport()
            .push_json(json!({"@rid": "#1:1", "count": 3}));
        let mut stmt = SelectStatement::with_fields(["count(*)"]);
        stmt.from("User").where_(("active", true));
        let value = conn.command(stmt).scalar(JsonMap::new()).await.expect("scalar");
        assert_eq!(value, Some(json!(3)));
    }

    #[tokio::test]
    async fn transforms_run_per_row() {
        let conn = Connection::<MemoryTransport>::default();
        conn.transport()
            .push_json(json!([{"name": "ann"}, {"name": "bob"}]));
        let mut stmt = SelectStatement::new();
        stmt.from("User").transform(|mut row| {
            row.insert("seen".into(), json!(true));
            row
        });
        let rows = conn.command(stmt).all(JsonMap::new()).await.expect("rows");
        assert!(rows.iter().all(|row| row["seen"] == json!(true)));
        let calls = conn.transport().calls();
        assert_eq!(calls[0].text, "SELECT * FROM User");
    }

    #[tokio::test]
    async fn column_uses_first_plain_field() {
        let conn = Connection::<MemoryTransport>::default();
        conn.transport()
            .push_json(json!([{"@class": "User", "name": "ann"}, {"age": 3}]));
        let values = conn
            .command(Sql::from("SELECT name FROM User"))
            .column(None, JsonMap::new())
            .await
            .expect("column");
        assert_eq!(values, vec![json!("ann"), JsonValue::Null]);
    }
}
