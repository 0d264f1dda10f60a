use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::error::{OrmError, Result};
use crate::query::clauses::{change_set, Conditional};
use crate::query::condition::Condition;
use crate::query::criteria::{ChangeKind, LockMode, ReturnClause, Term};
use crate::query::statement::{
    json_bool, json_i64, json_map, json_str, json_u64, Statement, StatementCore, StatementKind,
};
use crate::value::Value;

/// `UPDATE` builder.
#[derive(Debug)]
pub struct UpdateStatement {
    core: StatementCore,
}

impl UpdateStatement {
    /// `UPDATE target`; the target is a class, cluster, or record id.
    pub fn new(target: impl Into<String>) -> Self {
        let mut core = StatementCore::default();
        core.criteria.update = Some(vec![target.into()]);
        Self { core }
    }

    /// `UPDATE [#1:1, #1:2]`
    pub fn with_targets<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut core = StatementCore::default();
        core.criteria.update = Some(targets.into_iter().map(Into::into).collect());
        Self { core }
    }

    /// Appends one `SET` group.
    pub fn set<I, K, V>(&mut self, changes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.push(ChangeKind::Set, changes)
    }

    /// `SET path = (sub-query)`
    pub fn set_term(&mut self, path: impl Into<String>, term: Term) -> &mut Self {
        self.core
            .criteria
            .push_change(ChangeKind::Set, vec![(path.into(), term)]);
        self
    }

    /// Appends one `INCREMENT` group.
    pub fn increment<I, K, V>(&mut self, changes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.push(ChangeKind::Increment, changes)
    }

    /// Appends one `ADD` group.
    pub fn add<I, K, V>(&mut self, changes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.push(ChangeKind::Add, changes)
    }

    /// Appends one `REMOVE` group.
    pub fn remove<I, K, V>(&mut self, changes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.push(ChangeKind::Remove, changes)
    }

    /// Puts `entries` into the map at `path`.
    pub fn put<I, K, V>(&mut self, path: impl Into<String>, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let entries: BTreeMap<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if entries.is_empty() {
            return self;
        }
        self.core.criteria.push_change(
            ChangeKind::Put,
            vec![(path.into(), Term::Value(Value::Map(entries)))],
        );
        self
    }

    /// Appends a change group of `kind` from loosely typed input.
    pub fn change(&mut self, kind: ChangeKind, changes: BTreeMap<String, Value>) -> &mut Self {
        if kind == ChangeKind::Put {
            for (path, entries) in changes {
                match entries {
                    Value::Map(entries) => {
                        self.put(path, entries);
                    }
                    other => self.record_error(OrmError::invalid_argument(format!(
                        "put on `{path}` expects a map of entries, got {other}"
                    ))),
                }
            }
            return self;
        }
        self.push(kind, changes)
    }

    /// `CONTENT {...}`; replaces the whole record. Expects a map.
    pub fn content(&mut self, document: impl Into<Value>) -> &mut Self {
        match document.into() {
            Value::Map(map) => self.core.criteria.content.get_or_insert_with(Vec::new).push(map),
            other => self.record_error(OrmError::invalid_argument(format!(
                "content expects a map, got {other}"
            ))),
        }
        self
    }

    /// `MERGE {...}`; merges into the record. Expects a map.
    pub fn merge(&mut self, document: impl Into<Value>) -> &mut Self {
        match document.into() {
            Value::Map(map) => self.core.criteria.merge.get_or_insert_with(Vec::new).push(map),
            other => self.record_error(OrmError::invalid_argument(format!(
                "merge expects a map, got {other}"
            ))),
        }
        self
    }

    /// `UPSERT`
    pub fn upsert(&mut self, upsert: bool) -> &mut Self {
        self.core.criteria.upsert = Some(upsert);
        self
    }

    /// `RETURN COUNT|BEFORE|AFTER [expression]`; the expression is kept only
    /// for `BEFORE` and `AFTER`.
    pub fn return_(&mut self, option: &str, expression: Option<&str>) -> &mut Self {
        match return_clause(option, expression, &["COUNT", "BEFORE", "AFTER"]) {
            Ok(clause) => self.core.criteria.returning = Some(clause),
            Err(err) => self.record_error(err),
        }
        self
    }

    /// `LOCK`
    pub fn lock(&mut self, mode: LockMode) -> &mut Self {
        self.core.criteria.lock = Some(mode);
        self
    }

    /// `LIMIT`
    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.core.criteria.limit = Some(limit);
        self
    }

    /// `TIMEOUT` in milliseconds.
    pub fn timeout(&mut self, millis: u64) -> &mut Self {
        self.core.criteria.timeout = Some(millis);
        self
    }

    fn push<I, K, V>(&mut self, kind: ChangeKind, changes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.core.criteria.push_change(kind, change_set(changes));
        self
    }
}

/// Validates a `RETURN` mode against `allowed`.
pub(crate) fn return_clause(
    option: &str,
    expression: Option<&str>,
    allowed: &[&str],
) -> Result<ReturnClause> {
    let option = option.trim().to_ascii_uppercase();
    if !allowed.contains(&option.as_str()) {
        return Err(OrmError::invalid_argument(format!(
            "RETURN expects one of {}, got {option}",
            allowed.join("|")
        )));
    }
    let expression = match option.as_str() {
        "BEFORE" | "AFTER" => expression.map(str::to_string),
        _ => None,
    };
    Ok(ReturnClause { option, expression })
}

/// Splits `"AFTER @this"` into a mode and an optional expression.
pub(crate) fn split_return(text: &str) -> (&str, Option<&str>) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((option, expression)) => (option, Some(expression.trim())),
        None => (text, None),
    }
}

impl Statement for UpdateStatement {
    fn core(&self) -> &StatementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StatementCore {
        &mut self.core
    }

    fn kind(&self) -> StatementKind {
        StatementKind::Update
    }

    fn apply_option(&mut self, name: &str, value: &JsonValue) -> Result<bool> {
        if let Ok(kind) = name.parse::<ChangeKind>() {
            if !name.starts_with('$') {
                self.change(kind, json_map(name, value)?);
                return Ok(true);
            }
        }
        match name {
            "content" => {
                self.content(json_map(name, value)?);
            }
            "merge" => {
                self.merge(json_map(name, value)?);
            }
            "upsert" => {
                self.upsert(json_bool(name, value)?);
            }
            "return" => {
                let (option, expression) = split_return(json_str(name, value)?);
                self.return_(option, expression);
            }
            "where" => {
                self.where_(Condition::from(value.clone()));
            }
            "lock" => {
                self.lock(LockMode::parse_lenient(json_str(name, value)?));
            }
            "limit" => {
                self.limit(json_i64(name, value)?);
            }
            "timeout" => {
                self.timeout(json_u64(name, value)?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl Conditional for UpdateStatement {
    fn fresh() -> Self {
        Self::with_targets(Vec::<String>::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_validates_mode_and_drops_expression_for_count() {
        let mut stmt = UpdateStatement::new("User");
        stmt.return_("after", Some("@this"));
        assert_eq!(
            stmt.criteria().returning,
            Some(ReturnClause {
                option: "AFTER".into(),
                expression: Some("@this".into())
            })
        );
        stmt.return_("count", Some("@rid"));
        assert_eq!(
            stmt.criteria().returning.as_ref().and_then(|r| r.expression.clone()),
            None
        );
        stmt.return_("everything", None);
        assert!(matches!(stmt.check(), Err(OrmError::InvalidArgument(_))));
    }

    #[test]
    fn content_requires_a_map() {
        let mut stmt = UpdateStatement::new("User");
        stmt.content(Value::from(3));
        assert!(stmt.check().is_err());
    }

    #[test]
    fn each_set_call_is_its_own_group() {
        let mut stmt = UpdateStatement::new("User");
        stmt.set([("a", 1)]).set([("b", 2)]).put("tags", [("x", true)]);
        assert_eq!(stmt.criteria().set.as_ref().map(Vec::len), Some(2));
        assert_eq!(stmt.criteria().put.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn split_return_separates_expression() {
        assert_eq!(split_return("AFTER @this"), ("AFTER", Some("@this")));
        assert_eq!(split_return("count"), ("count", None));
    }
}
