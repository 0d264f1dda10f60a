//! Pending atomic operations of tracked containers.
//!
//! A registry only remembers what happened since the last persist. `Set`
//! carries no payload: the whole current container is written when the delta
//! is taken, and once reached it absorbs every later operation.

use std::collections::BTreeMap;

use crate::config::Dialect;
use crate::query::ChangeKind;
use crate::value::Value;

/// One persisted change of a container path.
#[derive(Clone, Debug, PartialEq)]
pub struct AtomicOp {
    /// Change clause the operation compiles to.
    pub kind: ChangeKind,
    /// Operand.
    pub value: Value,
}

impl AtomicOp {
    fn new(kind: ChangeKind, value: Value) -> Self {
        Self { kind, value }
    }
}

/// Pending operations of a list.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ListAtomics {
    /// Nothing registered.
    #[default]
    Clean,
    /// Replace the whole list.
    Set,
    /// Append these values.
    Add(Vec<Value>),
    /// Remove these values.
    Remove(Vec<Value>),
}

impl ListAtomics {
    /// Replaces every pending operation with a whole-list write.
    pub fn set(&mut self) {
        *self = ListAtomics::Set;
    }

    /// Registers appended values. Mixing with any other pending operation
    /// collapses to [`ListAtomics::Set`].
    pub fn add(&mut self, values: Vec<Value>) {
        *self = match std::mem::take(self) {
            ListAtomics::Clean => ListAtomics::Add(values),
            ListAtomics::Add(mut pending) => {
                pending.extend(values);
                ListAtomics::Add(pending)
            }
            _ => ListAtomics::Set,
        };
    }

    /// Registers removed values. Mixing with any other pending operation
    /// collapses to [`ListAtomics::Set`].
    pub fn remove(&mut self, values: Vec<Value>) {
        *self = match std::mem::take(self) {
            ListAtomics::Clean => ListAtomics::Remove(values),
            ListAtomics::Remove(mut pending) => {
                pending.extend(values);
                ListAtomics::Remove(pending)
            }
            _ => ListAtomics::Set,
        };
    }

    /// Returns `true` when something is pending.
    pub fn has_atomics(&self) -> bool {
        !matches!(self, ListAtomics::Clean)
    }

    /// Operations to persist; a clean registry writes the whole list.
    ///
    /// With `structured_remove_as_set`, removing embedded documents writes
    /// the whole list instead.
    pub fn ops(&self, current: &[Value], structured_remove_as_set: bool) -> Vec<AtomicOp> {
        let whole = || Value::List(current.to_vec());
        let op = match self {
            ListAtomics::Clean | ListAtomics::Set => AtomicOp::new(ChangeKind::Set, whole()),
            ListAtomics::Add(values) => AtomicOp::new(ChangeKind::Add, single_or_list(values)),
            ListAtomics::Remove(values)
                if structured_remove_as_set && values.iter().any(Value::is_structured) =>
            {
                AtomicOp::new(ChangeKind::Set, whole())
            }
            ListAtomics::Remove(values) => {
                AtomicOp::new(ChangeKind::Remove, single_or_list(values))
            }
        };
        vec![op]
    }
}

/// Pending operations of a map.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum MapAtomics {
    /// Nothing registered.
    #[default]
    Clean,
    /// Replace the whole map.
    Set,
    /// Keyed puts and removed keys, accumulated independently.
    Pending {
        /// Last value put per key.
        put: BTreeMap<String, Value>,
        /// Removed keys in removal order.
        remove: Vec<String>,
    },
}

impl MapAtomics {
    /// Replaces every pending operation with a whole-map write.
    pub fn set(&mut self) {
        *self = MapAtomics::Set;
    }

    /// Registers `key = value`, cancelling an earlier removal of `key`.
    pub fn put(&mut self, key: String, value: Value) {
        if let Some((put, remove)) = self.pending() {
            remove.retain(|removed| *removed != key);
            put.insert(key, value);
        }
    }

    /// Registers a removed key, dropping any pending put of it.
    pub fn remove(&mut self, key: String) {
        if let Some((put, remove)) = self.pending() {
            put.remove(&key);
            if !remove.contains(&key) {
                remove.push(key);
            }
        }
    }

    fn pending(&mut self) -> Option<(&mut BTreeMap<String, Value>, &mut Vec<String>)> {
        if matches!(self, MapAtomics::Clean) {
            *self = MapAtomics::Pending {
                put: BTreeMap::new(),
                remove: Vec::new(),
            };
        }
        match self {
            MapAtomics::Pending { put, remove } => Some((put, remove)),
            _ => None,
        }
    }

    /// Returns `true` when something is pending.
    pub fn has_atomics(&self) -> bool {
        !matches!(self, MapAtomics::Clean)
    }

    /// Operations to persist; a clean registry writes the whole map.
    pub fn ops(&self, current: &BTreeMap<String, Value>) -> Vec<AtomicOp> {
        match self {
            MapAtomics::Clean | MapAtomics::Set => {
                vec![AtomicOp::new(ChangeKind::Set, Value::Map(current.clone()))]
            }
            MapAtomics::Pending { put, remove } => {
                let mut ops = Vec::with_capacity(2);
                if !put.is_empty() {
                    ops.push(AtomicOp::new(ChangeKind::Put, Value::Map(put.clone())));
                }
                if !remove.is_empty() {
                    let keys: Vec<Value> = remove.iter().cloned().map(Value::String).collect();
                    ops.push(AtomicOp::new(ChangeKind::Remove, single_or_list(&keys)));
                }
                ops
            }
        }
    }
}

/// Registry of one tracked container path.
#[derive(Clone, Debug, PartialEq)]
pub enum Atomics {
    /// List or set registry.
    List(ListAtomics),
    /// Map registry.
    Map(MapAtomics),
}

impl Atomics {
    /// Returns `true` when something is pending.
    pub fn has_atomics(&self) -> bool {
        match self {
            Atomics::List(list) => list.has_atomics(),
            Atomics::Map(map) => map.has_atomics(),
        }
    }

    /// Collapses pending operations to a whole-container write.
    pub fn set(&mut self) {
        match self {
            Atomics::List(list) => list.set(),
            Atomics::Map(map) => map.set(),
        }
    }

    /// Operations to persist against `current` in `dialect`. A value whose
    /// shape no longer matches the registry is written whole.
    pub fn ops(&self, current: &Value, dialect: &Dialect) -> Vec<AtomicOp> {
        match (self, current) {
            (Atomics::List(list), Value::List(items)) => {
                list.ops(items, dialect.structured_pull_as_set)
            }
            (Atomics::Map(map), Value::Map(entries)) => map.ops(entries),
            (_, other) => vec![AtomicOp::new(ChangeKind::Set, other.clone())],
        }
    }
}

fn single_or_list(values: &[Value]) -> Value {
    match values {
        [single] => single.clone(),
        many => Value::List(many.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_op_accumulates_and_mixing_collapses() {
        let mut atomics = ListAtomics::default();
        atomics.add(vec![Value::from(1)]);
        atomics.add(vec![Value::from(2)]);
        assert_eq!(atomics, ListAtomics::Add(vec![Value::from(1), Value::from(2)]));

        atomics.remove(vec![Value::from(1)]);
        assert_eq!(atomics, ListAtomics::Set);

        atomics.add(vec![Value::from(3)]);
        assert_eq!(atomics, ListAtomics::Set);
    }

    #[test]
    fn clean_list_persists_whole_value() {
        let current = vec![Value::from("a")];
        assert_eq!(
            ListAtomics::Clean.ops(&current, true),
            vec![AtomicOp::new(ChangeKind::Set, Value::from(vec!["a"]))]
        );
    }

    #[test]
    fn structured_remove_follows_the_dialect() {
        let doc = Value::from(serde_json::json!({"k": 1}));
        let current = vec![Value::from(serde_json::json!({"k": 2}))];
        let atomics = Atomics::List(ListAtomics::Remove(vec![doc.clone()]));
        assert_eq!(
            atomics.ops(&Value::List(current.clone()), &Dialect::default()),
            vec![AtomicOp::new(ChangeKind::Set, Value::List(current.clone()))]
        );
        assert_eq!(
            atomics.ops(&Value::List(current), &Dialect::strict()),
            vec![AtomicOp::new(ChangeKind::Remove, doc)]
        );
    }

    #[test]
    fn map_put_and_remove_accumulate_independently() {
        let mut atomics = MapAtomics::default();
        atomics.put("a".into(), Value::from(1));
        atomics.remove("b".into());
        atomics.put("a".into(), Value::from(2));
        let ops = atomics.ops(&BTreeMap::new());
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].kind, ChangeKind::Put);
        assert_eq!(
            ops[0].value,
            Value::Map(BTreeMap::from([("a".to_string(), Value::from(2))]))
        );
        assert_eq!(ops[1], AtomicOp::new(ChangeKind::Remove, Value::from("b")));

        atomics.set();
        atomics.put("c".into(), Value::from(3));
        assert_eq!(atomics, MapAtomics::Set);
    }

    #[test]
    fn map_put_and_remove_of_one_key_keep_only_the_last() {
        let mut atomics = MapAtomics::default();
        atomics.put("k".into(), Value::from(1));
        atomics.remove("k".into());
        assert_eq!(
            atomics.ops(&BTreeMap::new()),
            vec![AtomicOp::new(ChangeKind::Remove, Value::from("k"))]
        );

        atomics.put("k".into(), Value::from(2));
        assert_eq!(
            atomics.ops(&BTreeMap::new()),
            vec![AtomicOp::new(
                ChangeKind::Put,
                Value::Map(BTreeMap::from([("k".to_string(), Value::from(2))]))
            )]
        );
    }
}
