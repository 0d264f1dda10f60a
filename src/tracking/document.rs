//! Change-tracked document.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, trace};

use crate::command::Connection;
use crate::config::Dialect;
use crate::error::{OrmError, Result, ValidationError};
use crate::query::{
    ChangeKind, Conditional, DeleteStatement, InsertStatement, Statement, UpdateStatement,
};
use crate::rid::RecordId;
use crate::schema::{ContainerKind, Schema};
use crate::tracking::atomics::{Atomics, ListAtomics, MapAtomics};
use crate::tracking::delta::{Delta, DeltaOp, DirtyEntry};
use crate::tracking::list::TrackedList;
use crate::tracking::map::TrackedMap;
use crate::tracking::paths::{ActivePaths, PathState};
use crate::transport::Transport;
use crate::value::Value;

/// Fields a document was loaded with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    fields: BTreeSet<String>,
    inclusive: bool,
}

impl Selection {
    /// Only `fields` were loaded.
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            inclusive: true,
        }
    }

    /// Everything except `fields` was loaded.
    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            inclusive: false,
        }
    }

    /// Returns `true` when `path`, one of its ancestors, or one of its
    /// descendants was loaded.
    pub fn contains(&self, path: &str) -> bool {
        if self.fields.contains(path) {
            return self.inclusive;
        }
        let dotted = format!("{path}.");
        let related = self
            .fields
            .iter()
            .any(|field| field.starts_with(&dotted) || dotted.starts_with(&format!("{field}.")));
        if related {
            self.inclusive
        } else {
            !self.inclusive
        }
    }
}

/// Document of one class whose mutations are tracked per path.
///
/// New documents persist with an `INSERT` of every value. Loaded documents
/// persist with an `UPDATE` carrying only the minimal delta: plain paths are
/// `SET`, tracked containers contribute their registered atomic operations.
#[derive(Clone, Debug)]
pub struct Document {
    schema: Arc<dyn Schema>,
    dialect: Dialect,
    rid: Option<RecordId>,
    values: BTreeMap<String, Value>,
    paths: ActivePaths,
    atomics: BTreeMap<String, Atomics>,
    selection: Option<Selection>,
    is_new: bool,
}

impl Document {
    /// New document with schema defaults applied.
    pub fn new(schema: Arc<dyn Schema>) -> Self {
        let mut doc = Self::blank(schema, true);
        for path in doc.schema.paths() {
            if let Some(value) = doc.schema.default_value(&path, true) {
                doc.values.insert(path.clone(), value);
                doc.paths.default_value(path);
            }
        }
        doc
    }

    /// Document loaded from storage. Values are cast through the schema;
    /// `@rid` sets the record id and other `@` attributes are dropped.
    /// Selected schema paths missing from `record` receive their defaults.
    pub fn hydrate(
        schema: Arc<dyn Schema>,
        record: BTreeMap<String, Value>,
        selection: Option<Selection>,
    ) -> Result<Self> {
        let mut doc = Self::blank(schema, false);
        doc.selection = selection;
        for (key, value) in record {
            if key == "@rid" {
                doc.rid = Some(parse_rid(&value)?);
                continue;
            }
            if key.starts_with('@') {
                continue;
            }
            let value = doc.schema.cast(&key, value)?;
            doc.values.insert(key.clone(), value);
            doc.paths.init(key);
        }
        for path in doc.schema.paths() {
            if doc.values.contains_key(&path) || !doc.is_selected(&path) {
                continue;
            }
            if let Some(value) = doc.schema.default_value(&path, true) {
                doc.values.insert(path.clone(), value);
                doc.paths.default_value(path);
            }
        }
        Ok(doc)
    }

    fn blank(schema: Arc<dyn Schema>, is_new: bool) -> Self {
        let mut paths = ActivePaths::new();
        for path in schema.required_paths() {
            paths.require(path);
        }
        Self {
            schema,
            dialect: Dialect::default(),
            rid: None,
            values: BTreeMap::new(),
            paths,
            atomics: BTreeMap::new(),
            selection: None,
            is_new,
        }
    }

    /// Uses `dialect` when taking the delta. [`Document::save`] replaces it
    /// with the dialect of the connection.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Class schema.
    pub fn schema(&self) -> &Arc<dyn Schema> {
        &self.schema
    }

    /// Class name.
    pub fn class_name(&self) -> &str {
        self.schema.class_name()
    }

    /// Record id, once stored.
    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    /// Returns `true` until the document is first persisted.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Path state machine.
    pub fn active_paths(&self) -> &ActivePaths {
        &self.paths
    }

    /// Value at a dotted `path`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        value_at(&self.values, path)
    }

    /// Top-level values.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Whole document as a map value.
    pub fn to_value(&self) -> Value {
        Value::Map(self.values.clone())
    }

    /// Assigns `value` at `path` after casting it through the schema.
    ///
    /// On a loaded document the path is marked modified only when the value
    /// actually changes. For dotted paths the shallowest ancestor that is
    /// already modified or currently null is marked instead.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let value = self.schema.cast(path, value.into())?;
        self.assign(path, Some(value));
        Ok(self)
    }

    /// Removes the value at `path`.
    pub fn unset(&mut self, path: &str) -> &mut Self {
        self.assign(path, None);
        self
    }

    fn assign(&mut self, path: &str, value: Option<Value>) {
        let to_mark = self.path_to_mark(path);
        if self.should_modify(&to_mark, path, value.as_ref()) {
            trace!(path, marked = %to_mark, "document.set.modify");
            self.mark_modified(&to_mark);
        }
        // A replaced container is written whole.
        if self.is_direct_modified(path) {
            if let Some(atomics) = self.atomics.get_mut(path) {
                atomics.set();
            }
        }
        // Element writes cannot be expressed next to pending atomics.
        for (container, atomics) in self.atomics.iter_mut() {
            let is_ancestor = path
                .strip_prefix(container.as_str())
                .is_some_and(|rest| rest.starts_with('.'));
            if is_ancestor && atomics.has_atomics() {
                trace!(path, container = %container, "document.set.collapse");
                atomics.set();
            }
        }
        write_value(&mut self.values, path, value);
    }

    fn path_to_mark(&self, path: &str) -> String {
        if !path.contains('.') {
            return path.to_string();
        }
        let mut prefix = String::with_capacity(path.len());
        for part in path.split('.') {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(part);
            if self.is_direct_modified(&prefix) || self.get(&prefix).is_some_and(Value::is_null) {
                return prefix;
            }
        }
        path.to_string()
    }

    fn should_modify(&self, to_mark: &str, path: &str, value: Option<&Value>) -> bool {
        if self.is_new {
            return true;
        }
        if self.is_direct_modified(to_mark) {
            return false;
        }
        let is_default = self.paths.is(path, PathState::Default);
        let Some(value) = value else {
            return !self.is_selected(path) || (!is_default && self.get(path).is_some());
        };
        if self.get(path) != Some(value) {
            return true;
        }
        // A default unset on the server and assigned the same value again.
        !value.is_null()
            && is_default
            && self.schema.default_value(path, false).as_ref() == Some(value)
    }

    /// Marks `path` modified.
    pub fn mark_modified(&mut self, path: &str) {
        self.paths.modify(path);
    }

    /// Returns `true` when `path` itself was marked modified.
    pub fn is_direct_modified(&self, path: &str) -> bool {
        self.paths.is(path, PathState::Modify)
    }

    /// Returns `true` when `path` or one of its descendants was modified.
    pub fn is_modified(&self, path: &str) -> bool {
        self.modified_paths().iter().any(|p| p == path)
    }

    /// Returns `true` when anything was modified.
    pub fn has_modifications(&self) -> bool {
        self.paths.some(PathState::Modify)
    }

    /// Modified paths with every ancestor, sorted.
    pub fn modified_paths(&self) -> Vec<String> {
        let mut all = BTreeSet::new();
        for path in self.paths.paths_in(PathState::Modify) {
            let mut prefix = String::with_capacity(path.len());
            for part in path.split('.') {
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(part);
                all.insert(prefix.clone());
            }
        }
        all.into_iter().collect()
    }

    /// Returns `true` when `path` was loaded from storage.
    pub fn is_init(&self, path: &str) -> bool {
        self.paths.is(path, PathState::Init)
    }

    /// Returns `true` when `path` was part of the loaded selection. Documents
    /// loaded without a selection have every path selected.
    pub fn is_selected(&self, path: &str) -> bool {
        self.selection
            .as_ref()
            .map_or(true, |selection| selection.contains(path))
    }

    /// Tracked view of the list at `path`; a missing list is created empty.
    pub fn list_mut(&mut self, path: &str) -> Result<TrackedList<'_>> {
        if self.get(path).is_none() {
            write_value(&mut self.values, path, Some(Value::List(Vec::new())));
        }
        let items = match value_at_mut(&mut self.values, path) {
            Some(Value::List(items)) => items,
            other => return Err(not_a_container(path, "list", other.as_deref())),
        };
        let slot = self
            .atomics
            .entry(path.to_string())
            .or_insert(Atomics::List(ListAtomics::Clean));
        if !matches!(slot, Atomics::List(_)) {
            *slot = Atomics::List(ListAtomics::Set);
        }
        let Atomics::List(atomics) = slot else {
            return Err(not_a_container(path, "list", None));
        };
        Ok(TrackedList {
            path: path.to_string(),
            items,
            atomics,
            paths: &mut self.paths,
            schema: Some(self.schema.as_ref()),
            set_mode: self.schema.container_kind(path) == Some(ContainerKind::Set),
        })
    }

    /// Tracked view of the map at `path`; a missing map is created empty.
    pub fn map_mut(&mut self, path: &str) -> Result<TrackedMap<'_>> {
        if self.get(path).is_none() {
            write_value(&mut self.values, path, Some(Value::Map(BTreeMap::new())));
        }
        let entries = match value_at_mut(&mut self.values, path) {
            Some(Value::Map(entries)) => entries,
            other => return Err(not_a_container(path, "map", other.as_deref())),
        };
        let slot = self
            .atomics
            .entry(path.to_string())
            .or_insert(Atomics::Map(MapAtomics::Clean));
        if !matches!(slot, Atomics::Map(_)) {
            *slot = Atomics::Map(MapAtomics::Set);
        }
        let Atomics::Map(atomics) = slot else {
            return Err(not_a_container(path, "map", None));
        };
        Ok(TrackedMap {
            path: path.to_string(),
            entries,
            atomics,
            paths: &mut self.paths,
            schema: Some(self.schema.as_ref()),
        })
    }

    /// Minimal set of modified paths: sorted, with every path below an
    /// already retained one dropped. A retained container that also has a
    /// dirty sub-path is collapsed to a whole-container write.
    pub fn dirty(&mut self) -> Vec<DirtyEntry> {
        let modified: Vec<String> = self
            .paths
            .paths_in(PathState::Modify)
            .map(str::to_string)
            .collect();
        let mut minimal: Vec<DirtyEntry> = Vec::with_capacity(modified.len());
        for path in &modified {
            let covering = minimal
                .iter()
                .find(|kept| path.starts_with(&format!("{}.", kept.path)))
                .map(|kept| kept.path.clone());
            match covering {
                Some(top) => {
                    if let Some(atomics) = self.atomics.get_mut(&top) {
                        if atomics.has_atomics() {
                            atomics.set();
                        }
                    }
                }
                None => minimal.push(DirtyEntry {
                    path: path.clone(),
                    value: self.get(path).cloned(),
                    container: self.schema.container_kind(path),
                }),
            }
        }
        debug!(
            class = self.class_name(),
            modified = modified.len(),
            retained = minimal.len(),
            "document.dirty"
        );
        minimal
    }

    /// Change operations persisting the current modifications.
    pub fn delta(&mut self) -> Delta {
        let dirty = self.dirty();
        let mut delta = Delta {
            rid: self.rid,
            ops: Vec::with_capacity(dirty.len()),
        };
        for entry in dirty {
            let value = entry.value.unwrap_or(Value::Null);
            match self.atomics.get(&entry.path) {
                Some(atomics) if !value.is_null() => {
                    for op in atomics.ops(&value, &self.dialect) {
                        delta.push(DeltaOp::from_atomic(&entry.path, op));
                    }
                }
                _ => delta.push(DeltaOp {
                    kind: ChangeKind::Set,
                    path: entry.path,
                    value,
                }),
            }
        }
        delta
    }

    /// Runs the schema validators of every relevant top-level path. Required
    /// paths are checked when selected or modified; loaded, modified, and
    /// defaulted paths always are.
    pub fn validate(&self) -> Result<()> {
        let mut paths: Vec<&str> = self
            .paths
            .paths_in(PathState::Require)
            .filter(|path| self.is_selected(path) || self.is_modified(path))
            .collect();
        paths.extend(self.paths.paths_in(PathState::Init));
        paths.extend(self.paths.paths_in(PathState::Modify));
        paths.extend(self.paths.paths_in(PathState::Default));

        let mut errors = ValidationError::default();
        for path in paths {
            if path.contains('.') || !self.schema.has_path(path) {
                continue;
            }
            let value = self.get(path).cloned().unwrap_or(Value::Null);
            if let Err(err) = self.schema.validate(path, &value) {
                errors.insert(err);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            debug!(class = self.class_name(), failed = errors.errors.len(), "document.validate.failed");
            Err(OrmError::Validation(errors))
        }
    }

    /// Forgets modifications and pending atomics, and re-requires the
    /// schema's required paths.
    pub fn reset(&mut self) {
        for atomics in self.atomics.values_mut() {
            *atomics = match atomics {
                Atomics::List(_) => Atomics::List(ListAtomics::Clean),
                Atomics::Map(_) => Atomics::Map(MapAtomics::Clean),
            };
        }
        self.paths.clear(PathState::Modify);
        for path in self.schema.required_paths() {
            self.paths.require(path);
        }
    }

    /// `INSERT INTO class SET ... RETURN @rid` of every value.
    pub fn to_insert(&self) -> InsertStatement {
        let mut stmt = InsertStatement::new();
        stmt.set_schema(Arc::clone(&self.schema));
        stmt.into_target(self.class_name())
            .set(self.values.clone())
            .return_("@rid");
        stmt
    }

    /// `UPDATE #rid ... RETURN AFTER @this` applying [`Document::delta`];
    /// `None` when nothing changed.
    pub fn to_update(&mut self) -> Result<Option<UpdateStatement>> {
        let delta = self.delta();
        if delta.is_empty() {
            return Ok(None);
        }
        let rid = self.rid.ok_or_else(|| missing_rid(self.class_name()))?;
        let mut stmt = UpdateStatement::new(rid.to_string());
        stmt.set_schema(Arc::clone(&self.schema));
        delta.apply(&mut stmt);
        stmt.return_("AFTER", Some("@this"));
        Ok(Some(stmt))
    }

    /// `DELETE FROM class RETURN BEFORE WHERE @rid = ...`.
    pub fn to_delete(&self) -> Result<DeleteStatement> {
        let rid = self.rid.ok_or_else(|| missing_rid(self.class_name()))?;
        let mut stmt = DeleteStatement::new();
        stmt.set_schema(Arc::clone(&self.schema));
        stmt.from(self.class_name())
            .return_("BEFORE", None)
            .where_(("@rid", Value::Link(rid)));
        Ok(stmt)
    }

    /// Validates and persists the document. Returns the number of affected
    /// records: 1 after an insert or an update, 0 when nothing changed.
    ///
    /// The document adopts the dialect of `conn`. Failures leave the tracked
    /// state untouched.
    pub async fn save<T: Transport>(&mut self, conn: &Connection<T>) -> Result<usize> {
        self.dialect = conn.config().dialect;
        self.validate()?;
        if self.is_new {
            let row = conn.command(self.to_insert()).one(JsonMap::new()).await?;
            let rid = match row.as_ref().and_then(|row| row.get("@rid")) {
                Some(JsonValue::String(text)) => text.parse::<RecordId>()?,
                Some(other) => return Err(OrmError::InvalidRecordId(other.to_string())),
                None => return Err(missing_rid(self.class_name())),
            };
            self.rid = Some(rid);
            self.reset();
            self.is_new = false;
            debug!(class = self.class_name(), rid = %rid, "document.persist.insert");
            return Ok(1);
        }
        match self.to_update()? {
            Some(stmt) => {
                conn.command(stmt).execute(JsonMap::new()).await?;
                self.reset();
                debug!(class = self.class_name(), rid = ?self.rid, "document.persist.update");
                Ok(1)
            }
            None => {
                self.reset();
                debug!(class = self.class_name(), "document.persist.skip");
                Ok(0)
            }
        }
    }

    /// Deletes the stored record.
    pub async fn remove<T: Transport>(&self, conn: &Connection<T>) -> Result<()> {
        let stmt = self.to_delete()?;
        conn.command(stmt).execute(JsonMap::new()).await?;
        debug!(class = self.class_name(), rid = ?self.rid, "document.persist.remove");
        Ok(())
    }
}

fn parse_rid(value: &Value) -> Result<RecordId> {
    match value {
        Value::Link(rid) => Ok(*rid),
        Value::String(text) => text.parse(),
        other => Err(OrmError::InvalidRecordId(other.plain_text())),
    }
}

fn missing_rid(class: &str) -> OrmError {
    OrmError::invalid_argument(format!("{class} document has no record id"))
}

fn not_a_container(path: &str, expected: &str, found: Option<&Value>) -> OrmError {
    let found = found.map_or("nothing", Value::type_name);
    OrmError::invalid_argument(format!("{path} holds {found}, expected a {expected}"))
}

fn value_at<'v>(values: &'v BTreeMap<String, Value>, path: &str) -> Option<&'v Value> {
    match path.split_once('.') {
        Some((head, rest)) => values.get(head)?.get_path(rest),
        None => values.get(path),
    }
}

fn value_at_mut<'v>(values: &'v mut BTreeMap<String, Value>, path: &str) -> Option<&'v mut Value> {
    let mut parts = path.split('.');
    let mut current = values.get_mut(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Map(map) => map.get_mut(part)?,
            Value::List(items) => items.get_mut(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Writes (or with `None` removes) the value at a dotted path, creating
/// intermediate maps and replacing scalars in the way.
fn write_value(values: &mut BTreeMap<String, Value>, path: &str, value: Option<Value>) {
    let parts: Vec<&str> = path.split('.').collect();
    write_in_map(values, &parts, value);
}

fn write_in_map(map: &mut BTreeMap<String, Value>, parts: &[&str], value: Option<Value>) {
    match parts {
        [] => {}
        [last] => match value {
            Some(value) => {
                map.insert((*last).to_string(), value);
            }
            None => {
                map.remove(*last);
            }
        },
        [head, rest @ ..] => {
            if value.is_none() && !map.contains_key(*head) {
                return;
            }
            let slot = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            write_in_value(slot, rest, value);
        }
    }
}

fn write_in_value(slot: &mut Value, parts: &[&str], value: Option<Value>) {
    if let (Value::List(items), Some((head, rest))) = (&mut *slot, parts.split_first()) {
        if let Some(item) = head.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            if rest.is_empty() {
                *item = value.unwrap_or(Value::Null);
            } else {
                write_in_value(item, rest, value);
            }
            return;
        }
    }
    if !matches!(slot, Value::Map(_)) {
        if value.is_none() {
            return;
        }
        *slot = Value::Map(BTreeMap::new());
    }
    if let Value::Map(map) = slot {
        write_in_map(map, parts, value);
    }
}
