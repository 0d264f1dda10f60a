#![forbid(unsafe_code)]

//! Schema collaborator consumed by the compiler and the change tracker.
//!
//! Statements and documents only ever talk to a [`Schema`] trait object. When
//! no schema is attached, values pass through uncast and no path is required.

use std::fmt;

use crate::error::{CastError, ValidatorError};
use crate::query::Operator;
use crate::value::Value;

/// In-memory class schema used by tests and ad-hoc models.
pub mod memory;

pub use memory::{ClassSchema, FieldDef, FieldType};

/// Shape of a container-typed path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    /// Ordered list allowing duplicates.
    List,
    /// List that ignores duplicate pushes.
    Set,
    /// String-keyed map.
    Map,
}

/// Provides per-path casting, defaults, and validation for one class.
pub trait Schema: Send + Sync + fmt::Debug {
    /// Database class name.
    fn class_name(&self) -> &str;

    /// Returns `true` when `path` names a declared field.
    fn has_path(&self, path: &str) -> bool;

    /// Declared top-level paths, in declaration order.
    fn paths(&self) -> Vec<String>;

    /// Casts a value assigned to `path`.
    fn cast(&self, path: &str, value: Value) -> Result<Value, CastError>;

    /// Casts a value compared against `path` with `op`.
    fn cast_for_query(&self, path: &str, op: Operator, value: Value) -> Result<Value, CastError>;

    /// Casts one element pushed into (or pulled from) the container at `path`.
    fn cast_item(&self, path: &str, value: Value) -> Result<Value, CastError> {
        let _ = path;
        Ok(value)
    }

    /// Returns the container shape of `path`, if it is a container.
    fn container_kind(&self, path: &str) -> Option<ContainerKind> {
        let _ = path;
        None
    }

    /// Returns `true` when `path` must be present.
    fn is_required(&self, path: &str) -> bool;

    /// All required paths.
    fn required_paths(&self) -> Vec<String>;

    /// Default value for `path`; `is_init` is set while a document is constructed.
    fn default_value(&self, path: &str, is_init: bool) -> Option<Value>;

    /// Runs the validators attached to `path`.
    fn validate(&self, path: &str, value: &Value) -> Result<(), ValidatorError>;
}
