//! Compiler configuration: parameter naming, fragment separator, and dialect
//! quirks. Loaded from TOML or built in code.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default placeholder prefix (`:qp0`, `:qp1`, ...).
pub const DEFAULT_PARAM_PREFIX: &str = "qp";
/// Default separator between compiled clause fragments.
pub const DEFAULT_SEPARATOR: &str = " ";

/// Workarounds for known defects of the target SQL dialect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dialect {
    /// Compile `PUT` change clauses as `SET path.key = value` assignments.
    pub put_as_nested_set: bool,
    /// Replace the whole list when pulled elements are embedded documents.
    pub structured_pull_as_set: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            put_as_nested_set: true,
            structured_pull_as_set: true,
        }
    }
}

impl Dialect {
    /// Dialect without any workaround, for backends that fixed the defects.
    pub fn strict() -> Self {
        Self {
            put_as_nested_set: false,
            structured_pull_as_set: false,
        }
    }
}

/// Options consumed by the query builder and grammars.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrmConfig {
    /// Prefix of generated placeholder names.
    pub param_prefix: String,
    /// Separator placed between clause fragments.
    pub separator: String,
    /// Dialect quirks.
    pub dialect: Dialect,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            param_prefix: DEFAULT_PARAM_PREFIX.to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
            dialect: Dialect::default(),
        }
    }
}

impl OrmConfig {
    /// Configuration targeting a backend without the known dialect defects.
    pub fn strict_dialect() -> Self {
        Self {
            dialect: Dialect::strict(),
            ..Self::default()
        }
    }

    /// Overrides the placeholder prefix.
    pub fn with_param_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.param_prefix = prefix.into();
        self
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: OrmConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: None,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: OrmConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that generated placeholders stay addressable as `:name` tokens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut chars = self.param_prefix.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ConfigError::InvalidPrefix {
                prefix: self.param_prefix.clone(),
            });
        }
        Ok(())
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Offending file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// TOML could not be parsed.
    #[error("failed to parse config{}: {source}", display_path(.path))]
    Parse {
        /// Offending file, when loaded from disk.
        path: Option<PathBuf>,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// Placeholder prefix is not an identifier.
    #[error("param_prefix '{prefix}' must start with a letter and contain only [A-Za-z0-9_]")]
    InvalidPrefix {
        /// Rejected prefix.
        prefix: String,
    },
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" {}", p.display()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_enable_dialect_workarounds() {
        let config = OrmConfig::default();
        assert_eq!(config.param_prefix, "qp");
        assert_eq!(config.separator, " ");
        assert!(config.dialect.put_as_nested_set);
        assert!(config.dialect.structured_pull_as_set);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = OrmConfig::from_toml_str(
            r#"
            param_prefix = "p"

            [dialect]
            put_as_nested_set = false
            "#,
        )
        .expect("config parses");
        assert_eq!(config.param_prefix, "p");
        assert_eq!(config.separator, " ");
        assert!(!config.dialect.put_as_nested_set);
        assert!(config.dialect.structured_pull_as_set);
    }

    #[test]
    fn rejects_prefix_that_is_not_an_identifier() {
        let err = OrmConfig::from_toml_str("param_prefix = \"1x\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPrefix { .. }));
    }

    #[test]
    fn load_reads_file_and_reports_missing_files() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "separator = \"  \"").expect("write config");
        let config = OrmConfig::load(file.path()).expect("load");
        assert_eq!(config.separator, "  ");

        let missing = file.path().with_extension("missing");
        let err = OrmConfig::load(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
