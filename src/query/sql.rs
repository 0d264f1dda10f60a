//! Compiled statement text and placeholder allocation.

use std::collections::BTreeMap;

use crate::query::statement::StatementOptions;
use crate::value::Value;

/// Compiled dialect text with its named parameters and carried-over options.
#[derive(Clone, Debug, Default)]
pub struct Sql {
    /// Statement text with `:name` placeholders.
    pub text: String,
    /// Parameter values keyed by placeholder name.
    pub params: BTreeMap<String, Value>,
    /// Options of the source statement (row transforms, extras).
    pub options: StatementOptions,
}

impl Sql {
    /// Raw text with explicit parameters.
    pub fn new(text: impl Into<String>, params: BTreeMap<String, Value>) -> Self {
        Self {
            text: text.into(),
            params,
            options: StatementOptions::default(),
        }
    }

    /// Returns `true` when compilation produced no text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<&str> for Sql {
    fn from(text: &str) -> Self {
        Sql::new(text, BTreeMap::new())
    }
}

impl From<String> for Sql {
    fn from(text: String) -> Self {
        Sql::new(text, BTreeMap::new())
    }
}

/// Allocates `:prefixN` placeholders for one compilation, shared with every
/// nested sub-statement so names never collide.
#[derive(Debug)]
pub struct ParamRegistry {
    prefix: String,
    params: BTreeMap<String, Value>,
    next: Option<usize>,
}

impl ParamRegistry {
    /// Empty registry generating names with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            params: BTreeMap::new(),
            next: None,
        }
    }

    /// Adds caller-supplied parameters without allocating names.
    pub fn merge(&mut self, params: &BTreeMap<String, Value>) {
        for (name, value) in params {
            self.params.insert(name.clone(), value.clone());
        }
    }

    /// Binds `value` to a fresh name and returns its `:name` token.
    ///
    /// The counter starts at the number of parameters present at the first
    /// bind and skips names the caller already supplied.
    pub fn bind(&mut self, value: Value) -> String {
        let mut index = *self.next.get_or_insert(self.params.len());
        let mut name = format!("{}{index}", self.prefix);
        while self.params.contains_key(&name) {
            index += 1;
            name = format!("{}{index}", self.prefix);
        }
        self.next = Some(index + 1);
        self.params.insert(name.clone(), value);
        format!(":{name}")
    }

    /// Value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Current parameters.
    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    /// Consumes the registry.
    pub fn into_params(self) -> BTreeMap<String, Value> {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_starts_after_supplied_params() {
        let mut registry = ParamRegistry::new("qp");
        let mut supplied = BTreeMap::new();
        supplied.insert("name".to_string(), Value::from("x"));
        registry.merge(&supplied);
        assert_eq!(registry.bind(Value::Int(1)), ":qp1");
        assert_eq!(registry.bind(Value::Int(2)), ":qp2");
        assert_eq!(registry.params().len(), 3);
    }

    #[test]
    fn bind_skips_names_already_taken() {
        let mut registry = ParamRegistry::new("qp");
        let mut supplied = BTreeMap::new();
        supplied.insert("qp1".to_string(), Value::from("taken"));
        registry.merge(&supplied);
        assert_eq!(registry.bind(Value::Int(1)), ":qp2");
        assert_eq!(registry.get("qp1"), Some(&Value::from("taken")));
    }
}
