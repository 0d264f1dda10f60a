//! Where-family builder methods shared by the statement kinds that accept a
//! condition tree.

use std::collections::BTreeMap;

use crate::error::{OrmError, Result};
use crate::query::condition::Condition;
use crate::query::criteria::{ChangeSet, Term, WhereClause};
use crate::query::operator::{Logic, Operator, OperatorKind};
use crate::query::statement::{Query, Statement};
use crate::value::Value;

/// Statements carrying a where (or while) tree.
pub trait Conditional: Statement + Sized {
    /// Fresh statement of the same kind, used to collect nested groups.
    fn fresh() -> Self;

    /// Appends `cond` joined by `logic`. Errors are recorded on the statement.
    fn push_condition(&mut self, logic: Logic, cond: Condition) -> &mut Self {
        if self.core().error.is_some() {
            return self;
        }
        if let Err(err) = try_push(self, logic, cond) {
            self.record_error(err);
        }
        self
    }

    /// `AND` condition.
    fn where_(&mut self, cond: impl Into<Condition>) -> &mut Self {
        self.push_condition(Logic::And, cond.into())
    }

    /// `OR` condition.
    fn or_where(&mut self, cond: impl Into<Condition>) -> &mut Self {
        self.push_condition(Logic::Or, cond.into())
    }

    /// `AND` verbatim fragment binding `params`.
    fn where_raw<I, K, V>(&mut self, sql: impl Into<String>, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let cond = raw_condition(sql, params);
        self.push_condition(Logic::And, cond)
    }

    /// `OR` verbatim fragment binding `params`.
    fn or_where_raw<I, K, V>(&mut self, sql: impl Into<String>, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let cond = raw_condition(sql, params);
        self.push_condition(Logic::Or, cond)
    }

    /// `AND (...)` group built on a fresh statement of the same kind.
    fn where_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        self.push_group(Logic::And, build)
    }

    /// `OR (...)` group built on a fresh statement of the same kind.
    fn or_where_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        self.push_group(Logic::Or, build)
    }

    /// Attaches the where tree of a closure-built sub-statement as a group.
    fn push_group<F>(&mut self, logic: Logic, build: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        if self.core().error.is_some() {
            return self;
        }
        let mut sub = Self::fresh();
        build(&mut sub);
        if let Err(err) = attach_nested(self, logic, sub) {
            self.record_error(err);
        }
        self
    }

    /// `path op (sub-query)` where the sub-query is built by `build` on a
    /// fresh [`Query`]. Only `IN`/`NOT IN` accept a sub-query.
    fn where_subquery<F>(&mut self, path: impl Into<String>, op: &str, build: F) -> &mut Self
    where
        F: FnOnce(&mut Query) -> Result<()>,
    {
        if self.core().error.is_some() {
            return self;
        }
        let result = op.parse::<Operator>().and_then(|op| {
            if op.kind() != OperatorKind::In {
                return Err(OrmError::UnsupportedSubquery {
                    op: op.sql().to_string(),
                });
            }
            let mut query = Query::new();
            build(&mut query)?;
            let statement = query
                .into_statement()
                .ok_or_else(|| OrmError::invalid_argument("sub-query closure built no statement"))?;
            Ok(Condition::Compare {
                path: path.into(),
                op: op.code().to_string(),
                value: Term::Query(Box::new(statement)),
            })
        });
        match result {
            Ok(cond) => self.push_condition(Logic::And, cond),
            Err(err) => {
                self.record_error(err);
                self
            }
        }
    }

    /// Entries of a map are each joined with `OR`; a list becomes an `OR`
    /// group attached with `AND`.
    fn or(&mut self, cond: impl Into<Condition>) -> &mut Self {
        self.logic_where(Logic::Or, cond.into())
    }

    /// Entries of a map are each joined with `AND`; a list becomes an `AND`
    /// group attached with `AND`.
    fn and(&mut self, cond: impl Into<Condition>) -> &mut Self {
        self.logic_where(Logic::And, cond.into())
    }

    /// Shared body of [`Conditional::or`] and [`Conditional::and`].
    fn logic_where(&mut self, logic: Logic, cond: Condition) -> &mut Self {
        match cond {
            Condition::All(items) => {
                for item in items {
                    self.push_condition(logic, item);
                }
                self
            }
            Condition::Group { members, .. } => self.push_condition(
                Logic::And,
                Condition::Group {
                    logic,
                    members,
                },
            ),
            other => self.push_condition(logic, other),
        }
    }
}

/// Collects `(path, value)` pairs into one change group.
pub(crate) fn change_set<I, K, V>(changes: I) -> ChangeSet
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    changes
        .into_iter()
        .map(|(path, value)| (path.into(), Term::Value(value.into())))
        .collect()
}

fn raw_condition<I, K, V>(sql: impl Into<String>, params: I) -> Condition
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    Condition::Raw {
        sql: sql.into(),
        params: params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn try_push<S: Conditional>(stmt: &mut S, logic: Logic, cond: Condition) -> Result<()> {
    match cond {
        Condition::Compare { path, op, value } => {
            let op: Operator = op.parse()?;
            let clause = compare_clause(logic, path, op, value)?;
            stmt.criteria_mut().where_clauses.push(clause);
            Ok(())
        }
        Condition::All(items) => {
            for item in items {
                try_push(stmt, logic, item)?;
            }
            Ok(())
        }
        Condition::Group {
            logic: inner,
            members,
        } => {
            let mut sub = S::fresh();
            for member in members {
                let member = match member {
                    Condition::All(items) if items.len() > 1 => Condition::all(items),
                    other => other,
                };
                try_push(&mut sub, inner, member)?;
            }
            attach_nested(stmt, logic, sub)
        }
        Condition::Raw { sql, params } => {
            let criteria = stmt.criteria_mut();
            criteria.params.extend(params);
            criteria.where_clauses.push(WhereClause::Raw { logic, sql });
            Ok(())
        }
        Condition::Invalid(err) => Err(err),
    }
}

fn attach_nested<S: Conditional>(stmt: &mut S, logic: Logic, mut sub: S) -> Result<()> {
    sub.check()?;
    let criteria = std::mem::take(sub.criteria_mut());
    if criteria.where_clauses.is_empty() {
        return Ok(());
    }
    let parent = stmt.criteria_mut();
    for (name, value) in &criteria.params {
        parent.params.insert(name.clone(), value.clone());
    }
    parent.where_clauses.push(WhereClause::Nested {
        logic,
        criteria: Box::new(criteria),
    });
    Ok(())
}

fn compare_clause(logic: Logic, path: String, op: Operator, value: Term) -> Result<WhereClause> {
    let value = match value {
        Term::Query(statement) => {
            if op.kind() != OperatorKind::In {
                return Err(OrmError::UnsupportedSubquery {
                    op: op.sql().to_string(),
                });
            }
            return Ok(WhereClause::In {
                logic,
                path,
                op,
                value: Term::Query(statement),
            });
        }
        Term::Value(value) => value,
    };
    if value.is_null() {
        return Ok(WhereClause::Null {
            logic,
            path,
            op: op.for_null(),
        });
    }
    let clause = match op.kind() {
        OperatorKind::Null => WhereClause::Null { logic, path, op },
        OperatorKind::In => WhereClause::In {
            logic,
            path,
            op,
            value: Term::Value(value),
        },
        OperatorKind::Between => match value {
            Value::List(mut bounds) if bounds.len() == 2 => {
                let high = bounds.remove(1);
                let low = bounds.remove(0);
                WhereClause::Between {
                    logic,
                    path,
                    low,
                    high,
                }
            }
            other => {
                return Err(OrmError::invalid_argument(format!(
                    "BETWEEN on `{path}` expects exactly two bounds, got {other}"
                )))
            }
        },
        OperatorKind::Basic => {
            let value = match value {
                Value::List(mut items) if items.len() == 1 => items.remove(0),
                other => other,
            };
            WhereClause::Basic {
                logic,
                path,
                op,
                value,
            }
        }
    };
    Ok(clause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SelectStatement;

    fn select() -> SelectStatement {
        let mut stmt = SelectStatement::new();
        stmt.from("User");
        stmt
    }

    #[test]
    fn null_values_become_null_checks() {
        let mut stmt = select();
        stmt.where_(("name", "$ne", Value::Null))
            .where_(("age", Value::Null));
        let ops: Vec<_> = stmt
            .criteria()
            .where_clauses
            .iter()
            .map(|c| match c {
                WhereClause::Null { op, .. } => Some(*op),
                _ => None,
            })
            .collect();
        assert_eq!(ops, vec![Some(Operator::IsNot), Some(Operator::Is)]);
    }

    #[test]
    fn unknown_operator_is_recorded_and_later_calls_are_ignored() {
        let mut stmt = select();
        stmt.where_(("age", "$near", 3)).where_(("name", "x"));
        assert!(matches!(stmt.check(), Err(OrmError::InvalidOperator { .. })));
        assert!(stmt.criteria().where_clauses.is_empty());
    }

    #[test]
    fn sub_query_outside_in_is_rejected() {
        let mut stmt = select();
        stmt.where_subquery("friend", "$eq", |q| {
            q.select(["@rid"])?.from("User");
            Ok(())
        });
        assert!(matches!(
            stmt.check(),
            Err(OrmError::UnsupportedSubquery { ref op }) if op == "="
        ));

        let mut stmt = select();
        stmt.where_(Condition::subquery("friend", "$gt", SelectStatement::new()));
        assert!(matches!(stmt.check(), Err(OrmError::UnsupportedSubquery { .. })));
    }

    #[test]
    fn between_requires_two_bounds() {
        let mut stmt = select();
        stmt.where_(("age", "$btw", vec![1]));
        assert!(matches!(stmt.check(), Err(OrmError::InvalidArgument(_))));
    }

    #[test]
    fn empty_group_adds_nothing() {
        let mut stmt = select();
        stmt.where_group(|_| {});
        assert!(stmt.criteria().where_clauses.is_empty());
        assert!(stmt.check().is_ok());
    }
}
