//! Loosely shaped where conditions accepted by the where-builders.

use std::collections::BTreeMap;

use crate::error::OrmError;
use crate::query::criteria::Term;
use crate::query::operator::Logic;
use crate::query::statement::AnyStatement;
use crate::value::Value;

/// Input of `where_`/`or_where` and friends, normalized into where clauses
/// when pushed onto a statement.
#[derive(Debug)]
pub enum Condition {
    /// `path op value`; `op` is parsed when the condition is pushed.
    Compare {
        /// Field path.
        path: String,
        /// Operator code (`$gt`) or symbol (`>`).
        op: String,
        /// Compared operand.
        value: Term,
    },
    /// Conditions sharing the connector of the call that pushes them.
    All(Vec<Condition>),
    /// Parenthesized group whose members are joined by `logic`.
    Group {
        /// Connector between members.
        logic: Logic,
        /// Members.
        members: Vec<Condition>,
    },
    /// Verbatim fragment with the params it references.
    Raw {
        /// Fragment text.
        sql: String,
        /// Params referenced by the fragment.
        params: BTreeMap<String, Value>,
    },
    /// Conversion failure surfaced when the condition is pushed.
    Invalid(OrmError),
}

impl Condition {
    /// `path op value`.
    pub fn compare(path: impl Into<String>, op: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Compare {
            path: path.into(),
            op: op.into(),
            value: Term::Value(value.into()),
        }
    }

    /// `path op (sub-query)`; only `IN`/`NOT IN` accept it.
    pub fn subquery(
        path: impl Into<String>,
        op: impl Into<String>,
        statement: impl Into<AnyStatement>,
    ) -> Self {
        Condition::Compare {
            path: path.into(),
            op: op.into(),
            value: Term::query(statement),
        }
    }

    /// Verbatim fragment.
    pub fn raw(sql: impl Into<String>) -> Self {
        Condition::Raw {
            sql: sql.into(),
            params: BTreeMap::new(),
        }
    }

    /// `(a OR b OR ...)`
    pub fn any(members: Vec<Condition>) -> Self {
        Condition::Group {
            logic: Logic::Or,
            members,
        }
    }

    /// `(a AND b AND ...)`
    pub fn all(members: Vec<Condition>) -> Self {
        Condition::Group {
            logic: Logic::And,
            members,
        }
    }

    /// Conditions for one `path: value` entry of a condition map.
    ///
    /// `{"$gt": 1, "$lt": 5}` yields one comparison per operator and
    /// `{"$or": [v1, v2]}` a group comparing the path against each value.
    pub fn for_path(path: impl Into<String>, value: Value) -> Self {
        let path = path.into();
        match value {
            Value::Map(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
                let mut items = Vec::with_capacity(ops.len());
                for (op, operand) in ops {
                    match Logic::from_key(&op) {
                        Some(logic) => {
                            let members = match operand {
                                Value::List(values) => values
                                    .into_iter()
                                    .map(|v| Condition::for_path(path.clone(), v))
                                    .collect(),
                                other => vec![Condition::for_path(path.clone(), other)],
                            };
                            items.push(Condition::Group { logic, members });
                        }
                        None => items.push(Condition::compare(path.clone(), op, operand)),
                    }
                }
                single_or_all(items)
            }
            other => Condition::compare(path, "$eq", other),
        }
    }

    /// Conditions for a whole condition map; entries are implicitly ANDed.
    pub fn from_map(map: BTreeMap<String, Value>) -> Self {
        let mut items = Vec::with_capacity(map.len());
        for (key, value) in map {
            match Logic::from_key(&key) {
                Some(logic) => {
                    let members = match value {
                        Value::List(values) => values.into_iter().map(Condition::from).collect(),
                        other => vec![Condition::from(other)],
                    };
                    items.push(Condition::Group { logic, members });
                }
                None => items.push(Condition::for_path(key, value)),
            }
        }
        single_or_all(items)
    }
}

fn single_or_all(mut items: Vec<Condition>) -> Condition {
    if items.len() == 1 {
        items.remove(0)
    } else {
        Condition::All(items)
    }
}

impl<P, V> From<(P, V)> for Condition
where
    P: Into<String>,
    V: Into<Value>,
{
    fn from((path, value): (P, V)) -> Self {
        Condition::for_path(path, value.into())
    }
}

impl<P, V> From<(P, &str, V)> for Condition
where
    P: Into<String>,
    V: Into<Value>,
{
    fn from((path, op, value): (P, &str, V)) -> Self {
        Condition::compare(path, op, value)
    }
}

impl From<Value> for Condition {
    fn from(value: Value) -> Self {
        match value {
            Value::Map(map) => Condition::from_map(map),
            Value::List(items) => Condition::all(items.into_iter().map(Condition::from).collect()),
            other => Condition::Invalid(OrmError::invalid_argument(format!(
                "condition must be a map, got {other}"
            ))),
        }
    }
}

impl From<BTreeMap<String, Value>> for Condition {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Condition::from_map(map)
    }
}

impl From<serde_json::Value> for Condition {
    fn from(value: serde_json::Value) -> Self {
        Condition::from(Value::from(value))
    }
}

impl From<Vec<Condition>> for Condition {
    fn from(members: Vec<Condition>) -> Self {
        Condition::all(members)
    }
}
