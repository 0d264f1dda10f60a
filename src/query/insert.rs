use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::query::clauses::change_set;
use crate::query::criteria::{ChangeKind, ReturnClause, Source, Term};
use crate::query::statement::{json_map, json_str, Statement, StatementCore, StatementKind};
use crate::value::Value;

/// `INSERT` builder. Has no where tree.
#[derive(Debug)]
pub struct InsertStatement {
    core: StatementCore,
}

impl Default for InsertStatement {
    fn default() -> Self {
        Self::new()
    }
}

impl InsertStatement {
    /// Bare `INSERT`.
    pub fn new() -> Self {
        let mut core = StatementCore::default();
        core.criteria.insert = true;
        Self { core }
    }

    /// `INTO target`
    pub fn into_target(&mut self, target: impl Into<String>) -> &mut Self {
        self.core.criteria.into = Some(vec![target.into()]);
        self
    }

    /// Appends one `SET` group.
    pub fn set<I, K, V>(&mut self, changes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.core
            .criteria
            .push_change(ChangeKind::Set, change_set(changes));
        self
    }

    /// `SET path = (sub-query)`
    pub fn set_term(&mut self, path: impl Into<String>, term: Term) -> &mut Self {
        self.core
            .criteria
            .push_change(ChangeKind::Set, vec![(path.into(), term)]);
        self
    }

    /// `FROM (sub-query)` as the inserted rows.
    pub fn from(&mut self, source: impl Into<Source>) -> &mut Self {
        self.core.criteria.from = Some(vec![source.into()]);
        self
    }

    /// `RETURN expression`
    pub fn return_(&mut self, expression: impl Into<String>) -> &mut Self {
        self.core.criteria.returning = Some(ReturnClause {
            option: expression.into(),
            expression: None,
        });
        self
    }
}

impl Statement for InsertStatement {
    fn core(&self) -> &StatementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StatementCore {
        &mut self.core
    }

    fn kind(&self) -> StatementKind {
        StatementKind::Insert
    }

    fn apply_option(&mut self, name: &str, value: &JsonValue) -> Result<bool> {
        match name {
            "into" => {
                self.into_target(json_str(name, value)?);
            }
            "set" => {
                self.set(json_map(name, value)?);
            }
            "from" => {
                self.from(json_str(name, value)?);
            }
            "return" => {
                self.return_(json_str(name, value)?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrmError;
    use serde_json::json;

    #[test]
    fn where_is_not_an_insert_clause() {
        let mut stmt = InsertStatement::new();
        stmt.into_target("User").set([("name", "ann")]);
        stmt.set_option("where", json!({"a": 1}));
        assert!(matches!(
            stmt.check(),
            Err(OrmError::UnsupportedStatementOperation {
                kind: StatementKind::Insert,
                ..
            })
        ));
        assert_eq!(stmt.criteria().set.as_ref().map(Vec::len), Some(1));
    }
}
