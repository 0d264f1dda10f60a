//! Query compiler and change tracking for OrientDB-style document/graph
//! databases.
//!
//! Statements are built fluently, compiled per kind by a [`grammar`] into
//! dialect text with named parameters, and executed through a
//! [`transport::Transport`]. Documents track their own mutations and persist
//! the minimal delta as an `UPDATE`.

#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod error;
pub mod grammar;
pub mod query;
pub mod rid;
pub mod schema;
pub mod tracking;
pub mod transport;
pub mod value;

pub use command::{Command, CommandEntry, Connection};
pub use config::{Dialect, OrmConfig};
pub use error::{OrmError, Result};
pub use query::{
    Condition, Conditional, DeleteStatement, InsertStatement, Query, QueryBuilder,
    SelectStatement, Sql, Statement, TraverseStatement, UpdateStatement,
};
pub use rid::RecordId;
pub use schema::Schema;
pub use tracking::{Delta, Document};
pub use transport::{MemoryTransport, Transport};
pub use value::Value;
