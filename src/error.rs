#![forbid(unsafe_code)]

//! Error taxonomy shared by the query compiler, the change tracker, and the
//! command layer.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::config::ConfigError;
use crate::query::StatementKind;
use crate::value::Value;

/// Message templates used by validators. `{PATH}` and `{VALUE}` are
/// substituted when a [`ValidatorError`] is built.
pub mod messages {
    /// Fallback message for custom validators.
    pub const DEFAULT: &str = "Validator failed for path `{PATH}` with value `{VALUE}`";
    /// Required path is missing or empty.
    pub const REQUIRED: &str = "Path `{PATH}` is required.";
    /// Path must not be null.
    pub const NOT_NULL: &str = "Path `{PATH}` should be set.";
    /// Number below the allowed minimum.
    pub const NUMBER_MIN: &str =
        "Path `{PATH}` ({VALUE}) is less than minimum allowed value ({MIN}).";
    /// Number above the allowed maximum.
    pub const NUMBER_MAX: &str =
        "Path `{PATH}` ({VALUE}) is more than maximum allowed value ({MAX}).";
    /// String outside the enumerated set.
    pub const STRING_ENUM: &str = "`{VALUE}` is not a valid enum value for path `{PATH}`.";
    /// String shorter than the allowed minimum.
    pub const STRING_MIN: &str =
        "Path `{PATH}` ({VALUE}) length is less than minimum allowed value ({MIN}).";
    /// String longer than the allowed maximum.
    pub const STRING_MAX: &str =
        "Path `{PATH}` ({VALUE}) length is more than maximum allowed value ({MAX}).";

    /// Substitutes `{PATH}` and `{VALUE}` placeholders.
    pub fn format(template: &str, path: &str, value: &str) -> String {
        template.replace("{PATH}", path).replace("{VALUE}", value)
    }
}

/// Value rejected by a schema type during casting.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cast to {kind} failed for value `{value}` at path `{path}`")]
pub struct CastError {
    /// Target type name.
    pub kind: String,
    /// Rendered offending value.
    pub value: String,
    /// Path being cast.
    pub path: String,
}

impl CastError {
    /// Builds a cast error for `value` at `path`.
    pub fn new(kind: impl Into<String>, value: &Value, path: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.plain_text(),
            path: path.into(),
        }
    }
}

/// Single validator failure for one path.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidatorError {
    /// Path that failed validation.
    pub path: String,
    /// Validator name (`required`, `min`, `enum`, ...).
    pub kind: String,
    /// Rendered message.
    pub message: String,
    /// Offending value.
    pub value: Value,
}

impl ValidatorError {
    /// Builds a validator error from a message template.
    pub fn new(path: &str, kind: &str, template: &str, value: &Value) -> Self {
        Self {
            path: path.to_string(),
            kind: kind.to_string(),
            message: messages::format(template, path, &value.plain_text()),
            value: value.clone(),
        }
    }

    /// Replaces a `{MIN}`/`{MAX}` bound placeholder in the message.
    pub fn with_bound(mut self, placeholder: &str, bound: impl fmt::Display) -> Self {
        self.message = self.message.replace(placeholder, &bound.to_string());
        self
    }
}

/// Aggregated validation failures keyed by path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationError {
    /// Failures keyed by path.
    pub errors: BTreeMap<String, ValidatorError>,
}

impl ValidationError {
    /// Records a failure; the first failure for a path wins.
    pub fn insert(&mut self, err: ValidatorError) {
        self.errors.entry(err.path.clone()).or_insert(err);
    }

    /// Returns `true` when no failures were recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the failure recorded for `path`.
    pub fn get(&self, path: &str) -> Option<&ValidatorError> {
        self.errors.get(path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed")?;
        let mut sep = ": ";
        for err in self.errors.values() {
            write!(f, "{sep}{}", err.message)?;
            sep = ", ";
        }
        Ok(())
    }
}

impl StdError for ValidationError {}

/// Boxed transport failure, shared so errors stay cloneable.
pub type TransportError = Arc<dyn StdError + Send + Sync>;

/// Errors raised while building, compiling, tracking, or executing statements.
#[derive(Debug, Clone, Error)]
pub enum OrmError {
    /// Comparison operator is not recognized.
    #[error("invalid operator '{op}' in where clause")]
    InvalidOperator {
        /// Operator token as supplied.
        op: String,
    },
    /// Sub-query used as a value outside `IN`/`NOT IN`.
    #[error("sub-query as value is available for IN or NOT IN operators only (got {op})")]
    UnsupportedSubquery {
        /// Operator the sub-query was attached to.
        op: String,
    },
    /// The query already produced its root statement.
    #[error("query has a {existing} statement already")]
    StatementAlreadySet {
        /// Kind of the statement already present.
        existing: StatementKind,
    },
    /// Clause is not legal for the statement kind.
    #[error("{clause} is not supported by {kind} statements")]
    UnsupportedStatementOperation {
        /// Active statement kind.
        kind: StatementKind,
        /// Offending clause name.
        clause: String,
    },
    /// Schema rejected a value.
    #[error(transparent)]
    Cast(#[from] CastError),
    /// Document failed validation before persistence.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Builder argument was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Record id literal could not be parsed.
    #[error("invalid record id '{0}'")]
    InvalidRecordId(String),
    /// Transport layer failure, propagated unchanged.
    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),
    /// JSON conversion failure.
    #[error("serialization error: {0}")]
    Serialization(#[source] Arc<serde_json::Error>),
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(Arc<ConfigError>),
}

impl OrmError {
    /// Returns a stable machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            OrmError::InvalidOperator { .. } => "InvalidOperator",
            OrmError::UnsupportedSubquery { .. } => "UnsupportedSubquery",
            OrmError::StatementAlreadySet { .. } => "StatementAlreadySet",
            OrmError::UnsupportedStatementOperation { .. } => "UnsupportedStatementOperation",
            OrmError::Cast(_) => "CastError",
            OrmError::Validation(_) => "ValidationError",
            OrmError::InvalidArgument(_) => "InvalidArgument",
            OrmError::InvalidRecordId(_) => "InvalidRecordId",
            OrmError::Transport(_) => "Transport",
            OrmError::Serialization(_) => "Serialization",
            OrmError::Config(_) => "Config",
        }
    }

    /// Wraps an arbitrary transport failure.
    pub fn transport<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        OrmError::Transport(Arc::new(err))
    }

    /// Convenience constructor for malformed builder input.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        OrmError::InvalidArgument(msg.into())
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(Arc::new(err))
    }
}

impl From<ConfigError> for OrmError {
    fn from(err: ConfigError) -> Self {
        OrmError::Config(Arc::new(err))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OrmError>;
