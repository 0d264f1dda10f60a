//! Mutable view over a tracked map path of a document.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::schema::Schema;
use crate::tracking::atomics::MapAtomics;
use crate::tracking::paths::ActivePaths;
use crate::value::Value;

/// String-keyed map held by a document.
#[derive(Debug)]
pub struct TrackedMap<'a> {
    pub(crate) path: String,
    pub(crate) entries: &'a mut BTreeMap<String, Value>,
    pub(crate) atomics: &'a mut MapAtomics,
    pub(crate) paths: &'a mut ActivePaths,
    pub(crate) schema: Option<&'a dyn Schema>,
}

impl TrackedMap<'_> {
    /// Document path of the map.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns `true` when `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Current entries.
    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        self.entries
    }

    /// Stores `value` under `key`, cast to the item type.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = match self.schema {
            Some(schema) => schema.cast_item(&self.path, value.into())?,
            None => value.into(),
        };
        self.entries.insert(key.clone(), value.clone());
        self.atomics.put(key, value);
        self.paths.modify(self.path.clone());
        Ok(())
    }

    /// Stores every entry; stops at the first cast failure.
    pub fn put_all<I, K, V>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        entries
            .into_iter()
            .try_for_each(|(key, value)| self.put(key, value))
    }

    /// Removes the given keys. Returns how many were present.
    pub fn remove<I, K>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut removed = 0;
        for key in keys {
            let key = key.into();
            if self.entries.remove(&key).is_some() {
                self.atomics.remove(key);
                self.paths.modify(self.path.clone());
                removed += 1;
            }
        }
        removed
    }
}
