use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::query::clauses::Conditional;
use crate::query::condition::Condition;
use crate::query::criteria::{LetValue, Source, TraverseStrategy};
use crate::query::operator::Logic;
use crate::query::statement::{json_i64, json_str, json_strings, Statement, StatementCore, StatementKind};
use crate::value::Value;

/// `TRAVERSE` builder. Its condition tree compiles as `WHILE`.
#[derive(Debug)]
pub struct TraverseStatement {
    core: StatementCore,
}

impl TraverseStatement {
    /// `TRAVERSE fields`; an empty list traverses `*`.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            fields.push("*".to_string());
        }
        let mut core = StatementCore::default();
        core.criteria.traverse = Some(fields);
        Self { core }
    }

    /// `FROM source`
    pub fn from(&mut self, source: impl Into<Source>) -> &mut Self {
        self.core.criteria.from = Some(vec![source.into()]);
        self
    }

    /// `LET $name = value`
    pub fn let_(&mut self, name: impl Into<String>, value: impl Into<LetValue>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        let lets = self.core.criteria.lets.get_or_insert_with(Vec::new);
        match lets.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => lets.push((name, value)),
        }
        self
    }

    /// `WHILE` condition joined with `AND`.
    pub fn while_(&mut self, cond: impl Into<Condition>) -> &mut Self {
        self.push_condition(Logic::And, cond.into())
    }

    /// `WHILE` condition joined with `OR`.
    pub fn or_while(&mut self, cond: impl Into<Condition>) -> &mut Self {
        self.push_condition(Logic::Or, cond.into())
    }

    /// Verbatim `WHILE` fragment joined with `AND`.
    pub fn while_raw<I, K, V>(&mut self, sql: impl Into<String>, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.where_raw(sql, params)
    }

    /// Verbatim `WHILE` fragment joined with `OR`.
    pub fn or_while_raw<I, K, V>(&mut self, sql: impl Into<String>, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.or_where_raw(sql, params)
    }

    /// `LIMIT`
    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.core.criteria.limit = Some(limit);
        self
    }

    /// `STRATEGY`
    pub fn strategy(&mut self, strategy: TraverseStrategy) -> &mut Self {
        self.core.criteria.strategy = Some(strategy);
        self
    }
}

impl Statement for TraverseStatement {
    fn core(&self) -> &StatementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StatementCore {
        &mut self.core
    }

    fn kind(&self) -> StatementKind {
        StatementKind::Traverse
    }

    fn apply_option(&mut self, name: &str, value: &JsonValue) -> Result<bool> {
        match name {
            "traverse" => {
                let fields = json_strings(name, value)?;
                if !fields.is_empty() {
                    self.core.criteria.traverse = Some(fields);
                }
            }
            "from" => {
                self.from(json_str(name, value)?);
            }
            "while" | "where" => {
                self.while_(Condition::from(value.clone()));
            }
            "limit" => {
                self.limit(json_i64(name, value)?);
            }
            "strategy" => {
                self.strategy(TraverseStrategy::parse_lenient(json_str(name, value)?));
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl Conditional for TraverseStatement {
    fn fresh() -> Self {
        Self::new(Vec::<String>::new())
    }
}
