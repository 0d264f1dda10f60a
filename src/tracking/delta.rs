//! Minimal dirty paths and the change operations derived from them.

use crate::query::{ChangeKind, UpdateStatement};
use crate::rid::RecordId;
use crate::schema::ContainerKind;
use crate::tracking::atomics::AtomicOp;
use crate::value::Value;

/// One retained dirty path.
#[derive(Clone, Debug, PartialEq)]
pub struct DirtyEntry {
    /// Modified path.
    pub path: String,
    /// Current value; `None` once unset.
    pub value: Option<Value>,
    /// Container shape the schema declares for the path, if any.
    pub container: Option<ContainerKind>,
}

/// One change clause entry of a delta.
#[derive(Clone, Debug, PartialEq)]
pub struct DeltaOp {
    /// Change clause.
    pub kind: ChangeKind,
    /// Target path.
    pub path: String,
    /// Operand.
    pub value: Value,
}

impl DeltaOp {
    pub(crate) fn from_atomic(path: &str, op: AtomicOp) -> Self {
        Self {
            kind: op.kind,
            path: path.to_string(),
            value: op.value,
        }
    }
}

/// Persistence plan of one document: the record to update and the change
/// operations to apply to it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Delta {
    /// Record addressed by the update.
    pub rid: Option<RecordId>,
    /// Operations in dirty-path order.
    pub ops: Vec<DeltaOp>,
}

impl Delta {
    /// Returns `true` when nothing needs persisting.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns `true` when an op of `kind` targets `path`.
    pub fn has(&self, kind: ChangeKind, path: &str) -> bool {
        self.ops.iter().any(|op| op.kind == kind && op.path == path)
    }

    /// Operations of `kind`.
    pub fn ops_of(&self, kind: ChangeKind) -> impl Iterator<Item = &DeltaOp> + '_ {
        self.ops.iter().filter(move |op| op.kind == kind)
    }

    /// Pushes `op` unless a `SET` of the same path is already planned.
    pub(crate) fn push(&mut self, op: DeltaOp) {
        if self.has(ChangeKind::Set, &op.path) {
            return;
        }
        self.ops.push(op);
    }

    /// Adds one change group per kind to `stmt`. `PUT` entries become one
    /// group per path.
    pub fn apply(&self, stmt: &mut UpdateStatement) {
        let pairs = |kind| {
            self.ops_of(kind)
                .map(|op| (op.path.clone(), op.value.clone()))
                .collect::<Vec<_>>()
        };
        let set = pairs(ChangeKind::Set);
        if !set.is_empty() {
            stmt.set(set);
        }
        let increment = pairs(ChangeKind::Increment);
        if !increment.is_empty() {
            stmt.increment(increment);
        }
        let add = pairs(ChangeKind::Add);
        if !add.is_empty() {
            stmt.add(add);
        }
        let remove = pairs(ChangeKind::Remove);
        if !remove.is_empty() {
            stmt.remove(remove);
        }
        for op in self.ops_of(ChangeKind::Put) {
            let entries = op.value.as_map().cloned().unwrap_or_default();
            stmt.put(op.path.clone(), entries);
        }
    }
}
