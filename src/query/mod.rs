#![forbid(unsafe_code)]

//! Fluent statement builders and the clause record they fill.
//!
//! Builders collect clauses into a [`Criteria`]; a [`crate::grammar::Grammar`]
//! turns the criteria into dialect text. [`QueryBuilder`] wires both together
//! and adds class-level shortcuts and schema DDL helpers.

/// Class-level statement shortcuts and grammar selection.
pub mod builder;

/// Where-family methods shared by conditional statements.
pub mod clauses;

/// Loosely shaped where conditions.
pub mod condition;

/// Clause record of one statement.
pub mod criteria;

/// Schema definition statements (classes, properties, indexes).
pub mod ddl;

/// `DELETE` builder.
pub mod delete;

/// `INSERT` builder.
pub mod insert;

/// Comparison and logical operators.
pub mod operator;

/// `SELECT` builder.
pub mod select;

/// Compiled text and placeholder allocation.
pub mod sql;

/// Statement trait, shared builder state, and the root-statement factory.
pub mod statement;

/// `TRAVERSE` builder.
pub mod traverse;

/// `UPDATE` builder.
pub mod update;

pub use builder::{ClassRef, QueryBuilder};
pub use clauses::Conditional;
pub use condition::Condition;
pub use criteria::{
    ChangeKind, ChangeSet, Criteria, Direction, LetValue, LockMode, OrderItem, Projection,
    ProjectionExpr, ReturnClause, Source, Term, TraverseStrategy, WhereClause,
};
pub use delete::DeleteStatement;
pub use insert::InsertStatement;
pub use operator::{Logic, Operator, OperatorKind};
pub use select::SelectStatement;
pub use sql::{ParamRegistry, Sql};
pub use statement::{
    AnyStatement, Query, RowTransform, Statement, StatementCore, StatementKind, StatementOptions,
};
pub use traverse::TraverseStatement;
pub use update::UpdateStatement;
