use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::query::clauses::Conditional;
use crate::query::condition::Condition;
use crate::query::criteria::{LockMode, Source};
use crate::query::statement::{
    json_i64, json_str, json_u64, Statement, StatementCore, StatementKind,
};
use crate::query::update::{return_clause, split_return};

/// `DELETE` builder.
#[derive(Debug)]
pub struct DeleteStatement {
    core: StatementCore,
}

impl Default for DeleteStatement {
    fn default() -> Self {
        Self::new()
    }
}

impl DeleteStatement {
    /// Bare `DELETE`.
    pub fn new() -> Self {
        let mut core = StatementCore::default();
        core.criteria.delete = true;
        Self { core }
    }

    /// `FROM source`
    pub fn from(&mut self, source: impl Into<Source>) -> &mut Self {
        self.core.criteria.from = Some(vec![source.into()]);
        self
    }

    /// `FROM [#1:1, #1:2]`
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

    /// `RETURN COUNT|BEFORE [expression]`
    pub fn return_(&mut self, option: &str, expression: Option<&str>) -> &mut Self {
        match return_clause(option, expression, &["COUNT", "BEFORE"]) {
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
}

impl Statement for DeleteStatement {
    fn core(&self) -> &StatementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StatementCore {
        &mut self.core
    }

    fn kind(&self) -> StatementKind {
        StatementKind::Delete
    }

    fn apply_option(&mut self, name: &str, value: &JsonValue) -> Result<bool> {
        match name {
            "from" => {
                self.from(json_str(name, value)?);
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

impl Conditional for DeleteStatement {
    fn fresh() -> Self {
        Self::new()
    }
}
