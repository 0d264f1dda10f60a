#![forbid(unsafe_code)]

//! Change tracking for documents.
//!
//! A [`Document`] keeps a per-path state machine ([`ActivePaths`]) and one
//! atomic-operation registry per tracked container. Persisting reduces the
//! modified paths to a minimal, non-overlapping set and turns it into a
//! [`Delta`] that an `UPDATE` statement compiles.

/// Pending container operations.
pub mod atomics;
/// Dirty entries and change operations.
pub mod delta;
/// Tracked documents.
pub mod document;
/// Tracked list views.
pub mod list;
/// Tracked map views.
pub mod map;
/// Path state machine.
pub mod paths;

pub use atomics::{AtomicOp, Atomics, ListAtomics, MapAtomics};
pub use delta::{Delta, DeltaOp, DirtyEntry};
pub use document::{Document, Selection};
pub use list::TrackedList;
pub use map::TrackedMap;
pub use paths::{ActivePaths, PathState};
