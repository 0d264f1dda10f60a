use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::query::clauses::Conditional;
use crate::query::condition::Condition;
use crate::query::criteria::{
    Direction, LetValue, LockMode, OrderItem, Projection, ProjectionExpr, Source,
};
use crate::query::statement::{
    json_bool, json_i64, json_str, json_strings, json_u64, Statement, StatementCore,
    StatementKind,
};

/// `SELECT` builder.
#[derive(Debug)]
pub struct SelectStatement {
    core: StatementCore,
}

impl Default for SelectStatement {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectStatement {
    /// `SELECT *` with no source yet.
    pub fn new() -> Self {
        let mut core = StatementCore::default();
        core.criteria.select = Some(vec![Projection::from("*")]);
        Self { core }
    }

    /// `SELECT fields`; an empty list selects `*`.
    pub fn with_fields<I, P>(fields: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Projection>,
    {
        let mut stmt = Self::new();
        stmt.select(fields);
        stmt
    }

    /// Adds projections; the implicit `*` is replaced by the first explicit list.
    pub fn select<I, P>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Projection>,
    {
        let fields: Vec<Projection> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return self;
        }
        let current = self.core.criteria.select.get_or_insert_with(Vec::new);
        let only_star = current.len() == 1
            && matches!(&current[0], Projection { expr: ProjectionExpr::Field(f), alias: None } if f == "*");
        if only_star {
            current.clear();
        }
        current.extend(fields);
        self
    }

    /// Replaces the source list with a single source.
    pub fn from(&mut self, source: impl Into<Source>) -> &mut Self {
        self.core.criteria.from = Some(vec![source.into()]);
        self
    }

    /// Replaces the source list with several record ids or targets.
    pub fn from_targets<I, S>(&mut self, targets: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.core.criteria.from = Some(
            targets
                .into_iter()
                .map(|t| Source::Target(t.into()))
                .collect(),
        );
        self
    }

    /// `LET $name = value`; a later binding of the same name replaces it.
    pub fn let_(&mut self, name: impl Into<String>, value: impl Into<LetValue>) -> &mut Self {
        let name = name.into();
        let lets = self.core.criteria.lets.get_or_insert_with(Vec::new);
        let value = value.into();
        match lets.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => lets.push((name, value)),
        }
        self
    }

    /// `GROUP BY`
    pub fn group<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let group = self.core.criteria.group.get_or_insert_with(Vec::new);
        group.extend(fields.into_iter().map(Into::into));
        self
    }

    /// `ORDER BY property DIR`; unknown directions sort ascending.
    pub fn order(&mut self, property: impl Into<String>, direction: &str) -> &mut Self {
        self.core
            .criteria
            .order
            .get_or_insert_with(Vec::new)
            .push(OrderItem {
                property: property.into(),
                direction: Direction::parse_lenient(direction),
            });
        self
    }

    /// `SKIP`
    pub fn skip(&mut self, skip: u64) -> &mut Self {
        self.core.criteria.skip = Some(skip);
        self
    }

    /// `LIMIT`
    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.core.criteria.limit = Some(limit);
        self
    }

    /// Adds a `FETCHPLAN` entry.
    pub fn fetch(&mut self, path: impl Into<String>, depth: i64) -> &mut Self {
        let path = path.into();
        let plan = self.core.criteria.fetch_plan.get_or_insert_with(Vec::new);
        match plan.iter_mut().find(|(p, _)| *p == path) {
            Some(slot) => slot.1 = depth,
            None => plan.push((path, depth)),
        }
        self
    }

    /// `TIMEOUT` in milliseconds.
    pub fn timeout(&mut self, millis: u64) -> &mut Self {
        self.core.criteria.timeout = Some(millis);
        self
    }

    /// `LOCK`
    pub fn lock(&mut self, mode: LockMode) -> &mut Self {
        self.core.criteria.lock = Some(mode);
        self
    }

    /// `PARALLEL`
    pub fn parallel(&mut self, parallel: bool) -> &mut Self {
        self.core.criteria.parallel = Some(parallel);
        self
    }
}

impl Statement for SelectStatement {
    fn core(&self) -> &StatementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StatementCore {
        &mut self.core
    }

    fn kind(&self) -> StatementKind {
        StatementKind::Select
    }

    fn apply_option(&mut self, name: &str, value: &JsonValue) -> Result<bool> {
        match name {
            "select" => {
                self.select(json_strings(name, value)?);
            }
            "from" => {
                self.from(json_str(name, value)?);
            }
            "let" => {
                let map = value.as_object().ok_or_else(|| {
                    crate::error::OrmError::invalid_argument("let expects an object")
                })?;
                for (key, expr) in map {
                    self.let_(key.as_str(), json_str(name, expr)?);
                }
            }
            "where" => {
                self.where_(Condition::from(value.clone()));
            }
            "group" => {
                self.group(json_strings(name, value)?);
            }
            "order" => apply_order(self, value)?,
            "skip" => {
                self.skip(json_u64(name, value)?);
            }
            "limit" => {
                self.limit(json_i64(name, value)?);
            }
            "fetchPlan" => {
                let map = value.as_object().ok_or_else(|| {
                    crate::error::OrmError::invalid_argument("fetchPlan expects an object")
                })?;
                for (path, depth) in map {
                    self.fetch(path.as_str(), json_i64(name, depth)?);
                }
            }
            "timeout" => {
                self.timeout(json_u64(name, value)?);
            }
            "lock" => {
                self.lock(LockMode::parse_lenient(json_str(name, value)?));
            }
            "parallel" => {
                self.parallel(json_bool(name, value)?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl Conditional for SelectStatement {
    fn fresh() -> Self {
        Self::new()
    }
}

fn apply_order(stmt: &mut SelectStatement, value: &JsonValue) -> Result<()> {
    match value {
        JsonValue::Object(map) => {
            for (property, direction) in map {
                stmt.order(property.as_str(), direction.as_str().unwrap_or("ASC"));
            }
        }
        other => {
            for item in json_strings("order", other)? {
                let mut parts = item.split_whitespace();
                if let Some(property) = parts.next() {
                    stmt.order(property, parts.next().unwrap_or("ASC"));
                }
            }
        }
    }
    Ok(())
}
