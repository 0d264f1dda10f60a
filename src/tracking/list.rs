//! Mutable view over a tracked list path of a document.

use std::cmp::Ordering;

use crate::error::{OrmError, Result};
use crate::schema::Schema;
use crate::tracking::atomics::ListAtomics;
use crate::tracking::paths::ActivePaths;
use crate::value::Value;

/// List held by a document. Every mutation marks the path modified and
/// registers the matching atomic operation.
///
/// Set-mode lists (embedded or link sets) skip values already present.
#[derive(Debug)]
pub struct TrackedList<'a> {
    pub(crate) path: String,
    pub(crate) items: &'a mut Vec<Value>,
    pub(crate) atomics: &'a mut ListAtomics,
    pub(crate) paths: &'a mut ActivePaths,
    pub(crate) schema: Option<&'a dyn Schema>,
    pub(crate) set_mode: bool,
}

impl TrackedList<'_> {
    /// Document path of the list.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when the list has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Current items.
    pub fn as_slice(&self) -> &[Value] {
        self.items
    }

    /// Returns `true` when `value` is an item.
    pub fn contains(&self, value: &Value) -> bool {
        self.items.contains(value)
    }

    /// Returns `true` when the set-mode duplicate rule applies.
    pub fn is_set(&self) -> bool {
        self.set_mode
    }

    /// Appends values and registers an `ADD` of exactly those values.
    /// Returns the new length.
    pub fn push<I, V>(&mut self, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = self.cast_all(values)?;
        let mut added = Vec::with_capacity(values.len());
        for value in values {
            if self.set_mode && (self.items.contains(&value) || added.contains(&value)) {
                continue;
            }
            added.push(value);
        }
        if !added.is_empty() {
            self.items.extend(added.iter().cloned());
            self.atomics.add(added);
            self.mark_modified();
        }
        Ok(self.items.len())
    }

    /// Removes the last item.
    pub fn pop(&mut self) -> Option<Value> {
        let popped = self.items.pop();
        if popped.is_some() {
            self.rewrite();
        }
        popped
    }

    /// Removes the first item.
    pub fn shift(&mut self) -> Option<Value> {
        if self.items.is_empty() {
            return None;
        }
        let shifted = self.items.remove(0);
        self.rewrite();
        Some(shifted)
    }

    /// Prepends values. Returns the new length.
    pub fn unshift<I, V>(&mut self, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = self.cast_all(values)?;
        if !values.is_empty() {
            self.items.splice(0..0, values);
            self.rewrite();
        }
        Ok(self.items.len())
    }

    /// Removes `delete_count` items at `start` and inserts `insert` there.
    /// Out-of-range bounds are clamped. Returns the removed items.
    pub fn splice<I, V>(&mut self, start: usize, delete_count: usize, insert: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let insert = self.cast_all(insert)?;
        let start = start.min(self.items.len());
        let end = start.saturating_add(delete_count).min(self.items.len());
        let removed: Vec<Value> = self.items.splice(start..end, insert).collect();
        self.rewrite();
        Ok(removed)
    }

    /// Sorts the items with `compare`.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.items.sort_by(compare);
        self.rewrite();
    }

    /// Replaces the item at `index`.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = self.cast(value.into())?;
        let len = self.items.len();
        let slot = self.items.get_mut(index).ok_or_else(|| {
            OrmError::invalid_argument(format!("index {index} out of bounds for list of {len}"))
        })?;
        *slot = value;
        self.rewrite();
        Ok(())
    }

    /// Removes every item equal to one of `values`. Returns how many items
    /// were removed.
    ///
    /// A `REMOVE` of the requested values is recorded. Whether embedded
    /// documents are removed incrementally is decided by the dialect when the
    /// delta is taken.
    pub fn pull<I, V>(&mut self, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = self.cast_all(values)?;
        let before = self.items.len();
        self.items.retain(|item| !values.contains(item));
        let removed = before - self.items.len();
        if removed == 0 {
            return Ok(0);
        }
        self.atomics.remove(values);
        self.mark_modified();
        Ok(removed)
    }

    fn rewrite(&mut self) {
        self.atomics.set();
        self.mark_modified();
    }

    fn mark_modified(&mut self) {
        self.paths.modify(self.path.clone());
    }

    fn cast(&self, value: Value) -> Result<Value> {
        match self.schema {
            Some(schema) => Ok(schema.cast_item(&self.path, value)?),
            None => Ok(value),
        }
    }

    fn cast_all<I, V>(&self, values: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        values
            .into_iter()
            .map(|value| self.cast(value.into()))
            .collect()
    }
}
