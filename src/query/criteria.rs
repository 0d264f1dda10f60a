//! Plain clause record filled by statement builders and read by grammars.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::query::operator::{Logic, Operator};
use crate::query::sql::Sql;
use crate::query::statement::AnyStatement;
use crate::query::{DeleteStatement, InsertStatement, SelectStatement, TraverseStatement, UpdateStatement};
use crate::rid::RecordId;
use crate::value::Value;

/// Operand that is either a bound value or an embedded sub-query.
#[derive(Debug)]
pub enum Term {
    /// Scalar or container value.
    Value(Value),
    /// Statement compiled inline in parentheses.
    Query(Box<AnyStatement>),
}

impl Term {
    /// Wraps a value.
    pub fn value(value: impl Into<Value>) -> Self {
        Term::Value(value.into())
    }

    /// Wraps a sub-query.
    pub fn query(statement: impl Into<AnyStatement>) -> Self {
        Term::Query(Box::new(statement.into()))
    }
}

/// One entry of a where (or while) list.
#[derive(Debug)]
pub enum WhereClause {
    /// `path op :param`
    Basic {
        /// Connector to the previous clause.
        logic: Logic,
        /// Field path.
        path: String,
        /// Comparison operator.
        op: Operator,
        /// Compared value.
        value: Value,
    },
    /// `path IS [NOT] NULL`
    Null {
        /// Connector to the previous clause.
        logic: Logic,
        /// Field path.
        path: String,
        /// [`Operator::Is`] or [`Operator::IsNot`].
        op: Operator,
    },
    /// `path [NOT] IN [...]` or `path IN (sub-query)`
    In {
        /// Connector to the previous clause.
        logic: Logic,
        /// Field path.
        path: String,
        /// [`Operator::In`] or [`Operator::NotIn`].
        op: Operator,
        /// Candidate values or a sub-query.
        value: Term,
    },
    /// `path BETWEEN :low AND :high`
    Between {
        /// Connector to the previous clause.
        logic: Logic,
        /// Field path.
        path: String,
        /// Lower bound.
        low: Value,
        /// Upper bound.
        high: Value,
    },
    /// Parenthesized group built from a sub-statement's where list.
    Nested {
        /// Connector to the previous clause.
        logic: Logic,
        /// Criteria of the sub-statement.
        criteria: Box<Criteria>,
    },
    /// Verbatim text.
    Raw {
        /// Connector to the previous clause.
        logic: Logic,
        /// Inserted without casting or binding.
        sql: String,
    },
}

impl WhereClause {
    /// Connector to the previous clause.
    pub fn logic(&self) -> Logic {
        match self {
            WhereClause::Basic { logic, .. }
            | WhereClause::Null { logic, .. }
            | WhereClause::In { logic, .. }
            | WhereClause::Between { logic, .. }
            | WhereClause::Nested { logic, .. }
            | WhereClause::Raw { logic, .. } => *logic,
        }
    }
}

/// Projected expression.
#[derive(Debug)]
pub enum ProjectionExpr {
    /// Field name or expression text; `:name` tokens resolve against params.
    Field(String),
    /// Pre-compiled fragment whose params merge into the statement.
    Sql(Sql),
}

/// Entry of a `SELECT` list.
#[derive(Debug)]
pub struct Projection {
    /// Expression.
    pub expr: ProjectionExpr,
    /// Optional `AS` alias.
    pub alias: Option<String>,
}

impl Projection {
    /// Aliased expression (`expr AS alias`).
    pub fn aliased(expr: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            expr: ProjectionExpr::Field(expr.into()),
            alias: Some(alias.into()),
        }
    }

    /// Pre-compiled fragment, optionally aliased.
    pub fn sql(sql: Sql, alias: Option<&str>) -> Self {
        Self {
            expr: ProjectionExpr::Sql(sql),
            alias: alias.map(str::to_string),
        }
    }
}

impl From<&str> for Projection {
    fn from(expr: &str) -> Self {
        Self {
            expr: ProjectionExpr::Field(expr.to_string()),
            alias: None,
        }
    }
}

impl From<String> for Projection {
    fn from(expr: String) -> Self {
        Self {
            expr: ProjectionExpr::Field(expr),
            alias: None,
        }
    }
}

/// Target of `FROM`.
#[derive(Debug)]
pub enum Source {
    /// Class name, cluster, record id, or expression.
    Target(String),
    /// Sub-query.
    Query(Box<AnyStatement>),
}

impl From<&str> for Source {
    fn from(target: &str) -> Self {
        Source::Target(target.to_string())
    }
}

impl From<String> for Source {
    fn from(target: String) -> Self {
        Source::Target(target)
    }
}

impl From<RecordId> for Source {
    fn from(rid: RecordId) -> Self {
        Source::Target(rid.to_string())
    }
}

/// Value bound by `LET $name = ...`.
#[derive(Debug)]
pub enum LetValue {
    /// Expression text.
    Expr(String),
    /// Sub-query.
    Query(Box<AnyStatement>),
}

impl From<&str> for LetValue {
    fn from(expr: &str) -> Self {
        LetValue::Expr(expr.to_string())
    }
}

impl From<String> for LetValue {
    fn from(expr: String) -> Self {
        LetValue::Expr(expr)
    }
}

macro_rules! statement_operands {
    ($($stmt:ty),* $(,)?) => {
        $(
            impl From<$stmt> for Source {
                fn from(statement: $stmt) -> Self {
                    Source::Query(Box::new(AnyStatement::from(statement)))
                }
            }

            impl From<$stmt> for LetValue {
                fn from(statement: $stmt) -> Self {
                    LetValue::Query(Box::new(AnyStatement::from(statement)))
                }
            }
        )*
    };
}

statement_operands!(
    AnyStatement,
    SelectStatement,
    TraverseStatement,
    InsertStatement,
    UpdateStatement,
    DeleteStatement,
);

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Direction {
    /// Parses `asc`/`desc`, falling back to ascending.
    pub fn parse_lenient(text: &str) -> Direction {
        if text.trim().eq_ignore_ascii_case("desc") {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }

    /// Dialect keyword.
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Entry of `ORDER BY`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderItem {
    /// Sorted expression.
    pub property: String,
    /// Direction.
    pub direction: Direction,
}

/// `RETURN` clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReturnClause {
    /// Mode keyword (`COUNT`, `BEFORE`, `AFTER`) or expression for inserts.
    pub option: String,
    /// Projection applied to returned records.
    pub expression: Option<String>,
}

/// Record locking strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Database default.
    #[default]
    Default,
    /// Lock touched records.
    Record,
}

impl LockMode {
    /// Dialect keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            LockMode::Default => "default",
            LockMode::Record => "record",
        }
    }

    /// Parses `record`/`default`, falling back to the default lock.
    pub fn parse_lenient(text: &str) -> LockMode {
        if text.trim().eq_ignore_ascii_case("record") {
            LockMode::Record
        } else {
            LockMode::Default
        }
    }
}

/// Graph traversal order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TraverseStrategy {
    /// Depth first.
    #[default]
    DepthFirst,
    /// Breadth first.
    BreadthFirst,
}

impl TraverseStrategy {
    /// Dialect keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            TraverseStrategy::DepthFirst => "DEPTH_FIRST",
            TraverseStrategy::BreadthFirst => "BREADTH_FIRST",
        }
    }

    /// Parses the keyword, falling back to depth first.
    pub fn parse_lenient(text: &str) -> TraverseStrategy {
        if text.trim().eq_ignore_ascii_case("BREADTH_FIRST") {
            TraverseStrategy::BreadthFirst
        } else {
            TraverseStrategy::DepthFirst
        }
    }
}

/// Incremental change clause kinds of `UPDATE`/`INSERT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    /// `SET path = value`
    Set,
    /// `INCREMENT path = n`
    Increment,
    /// `ADD path = value`
    Add,
    /// `REMOVE path = value`
    Remove,
    /// `PUT path = key, value`
    Put,
}

impl ChangeKind {
    /// Clause name.
    pub fn name(self) -> &'static str {
        match self {
            ChangeKind::Set => "set",
            ChangeKind::Increment => "increment",
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
            ChangeKind::Put => "put",
        }
    }
}

impl FromStr for ChangeKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('$') {
            "set" => Ok(ChangeKind::Set),
            "increment" => Ok(ChangeKind::Increment),
            "add" => Ok(ChangeKind::Add),
            "remove" => Ok(ChangeKind::Remove),
            "put" => Ok(ChangeKind::Put),
            _ => Err(()),
        }
    }
}

/// One `{path: value}` group of a change clause, in insertion order.
pub type ChangeSet = Vec<(String, Term)>;

/// Clauses of one statement. Absent (`None`) clauses are skipped by grammars.
#[derive(Debug, Default)]
pub struct Criteria {
    /// `SELECT` projections.
    pub select: Option<Vec<Projection>>,
    /// `TRAVERSE` fields.
    pub traverse: Option<Vec<String>>,
    /// `INSERT` keyword.
    pub insert: bool,
    /// `DELETE` keyword.
    pub delete: bool,
    /// `UPDATE` targets.
    pub update: Option<Vec<String>>,
    /// `INTO` targets.
    pub into: Option<Vec<String>>,
    /// `FROM` sources.
    pub from: Option<Vec<Source>>,
    /// `LET` bindings in declaration order.
    pub lets: Option<Vec<(String, LetValue)>>,
    /// Where (or while) tree.
    pub where_clauses: Vec<WhereClause>,
    /// `GROUP BY` fields.
    pub group: Option<Vec<String>>,
    /// `ORDER BY` items.
    pub order: Option<Vec<OrderItem>>,
    /// `SKIP`
    pub skip: Option<u64>,
    /// `LIMIT`
    pub limit: Option<i64>,
    /// `FETCHPLAN` entries.
    pub fetch_plan: Option<Vec<(String, i64)>>,
    /// `TIMEOUT` in milliseconds.
    pub timeout: Option<u64>,
    /// `LOCK`
    pub lock: Option<LockMode>,
    /// `PARALLEL`
    pub parallel: Option<bool>,
    /// `STRATEGY`
    pub strategy: Option<TraverseStrategy>,
    /// `SET`
    pub set: Option<Vec<ChangeSet>>,
    /// `INCREMENT`
    pub increment: Option<Vec<ChangeSet>>,
    /// `ADD`
    pub add: Option<Vec<ChangeSet>>,
    /// `REMOVE`
    pub remove: Option<Vec<ChangeSet>>,
    /// `PUT`
    pub put: Option<Vec<ChangeSet>>,
    /// `CONTENT` documents, merged at compile time.
    pub content: Option<Vec<BTreeMap<String, Value>>>,
    /// `MERGE` documents, merged at compile time.
    pub merge: Option<Vec<BTreeMap<String, Value>>>,
    /// `UPSERT`
    pub upsert: Option<bool>,
    /// `RETURN`
    pub returning: Option<ReturnClause>,
    /// Named parameters supplied by the caller.
    pub params: BTreeMap<String, Value>,
}

impl Criteria {
    /// Change clause list of `kind`.
    pub fn changes(&self, kind: ChangeKind) -> Option<&Vec<ChangeSet>> {
        match kind {
            ChangeKind::Set => self.set.as_ref(),
            ChangeKind::Increment => self.increment.as_ref(),
            ChangeKind::Add => self.add.as_ref(),
            ChangeKind::Remove => self.remove.as_ref(),
            ChangeKind::Put => self.put.as_ref(),
        }
    }

    fn changes_slot(&mut self, kind: ChangeKind) -> &mut Option<Vec<ChangeSet>> {
        match kind {
            ChangeKind::Set => &mut self.set,
            ChangeKind::Increment => &mut self.increment,
            ChangeKind::Add => &mut self.add,
            ChangeKind::Remove => &mut self.remove,
            ChangeKind::Put => &mut self.put,
        }
    }

    /// Appends a change group; empty groups are ignored.
    pub fn push_change(&mut self, kind: ChangeKind, set: ChangeSet) {
        if set.is_empty() {
            return;
        }
        self.changes_slot(kind).get_or_insert_with(Vec::new).push(set);
    }

    /// Returns `true` when any incremental change clause is present.
    pub fn has_changes(&self) -> bool {
        [
            ChangeKind::Set,
            ChangeKind::Increment,
            ChangeKind::Add,
            ChangeKind::Remove,
            ChangeKind::Put,
        ]
        .into_iter()
        .any(|kind| self.changes(kind).is_some_and(|sets| !sets.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_change_keeps_groups_separate() {
        let mut criteria = Criteria::default();
        criteria.push_change(ChangeKind::Set, vec![("a".into(), Term::value(1))]);
        criteria.push_change(ChangeKind::Set, vec![("a".into(), Term::value(2))]);
        criteria.push_change(ChangeKind::Add, Vec::new());
        assert_eq!(criteria.set.as_ref().map(Vec::len), Some(2));
        assert!(criteria.add.is_none());
        assert!(criteria.has_changes());
    }

    #[test]
    fn lenient_keywords_fall_back_to_defaults() {
        assert_eq!(Direction::parse_lenient("DeSc"), Direction::Desc);
        assert_eq!(Direction::parse_lenient("sideways"), Direction::Asc);
        assert_eq!(LockMode::parse_lenient("record"), LockMode::Record);
        assert_eq!(LockMode::parse_lenient("table"), LockMode::Default);
        assert_eq!(
            TraverseStrategy::parse_lenient("breadth_first"),
            TraverseStrategy::BreadthFirst
        );
        assert_eq!("$increment".parse::<ChangeKind>(), Ok(ChangeKind::Increment));
    }
}
