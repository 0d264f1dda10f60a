//! Per-document path state machine.

use std::collections::BTreeMap;

/// State of one document path. A path is in at most one state at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathState {
    /// Must be present before persisting.
    Require,
    /// Changed since the last persist.
    Modify,
    /// Loaded from storage.
    Init,
    /// Filled from a schema default.
    Default,
}

/// Tracks which state each path is in.
#[derive(Clone, Debug, Default)]
pub struct ActivePaths {
    states: BTreeMap<String, PathState>,
}

impl ActivePaths {
    /// Empty machine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `path` into `state`.
    pub fn transition(&mut self, path: impl Into<String>, state: PathState) {
        self.states.insert(path.into(), state);
    }

    /// Moves `path` into [`PathState::Require`].
    pub fn require(&mut self, path: impl Into<String>) {
        self.transition(path, PathState::Require);
    }

    /// Moves `path` into [`PathState::Modify`].
    pub fn modify(&mut self, path: impl Into<String>) {
        self.transition(path, PathState::Modify);
    }

    /// Moves `path` into [`PathState::Init`].
    pub fn init(&mut self, path: impl Into<String>) {
        self.transition(path, PathState::Init);
    }

    /// Moves `path` into [`PathState::Default`].
    pub fn default_value(&mut self, path: impl Into<String>) {
        self.transition(path, PathState::Default);
    }

    /// Current state of `path`.
    pub fn state_of(&self, path: &str) -> Option<PathState> {
        self.states.get(path).copied()
    }

    /// Returns `true` when `path` is in `state`.
    pub fn is(&self, path: &str, state: PathState) -> bool {
        self.state_of(path) == Some(state)
    }

    /// Returns `true` when any path is in `state`.
    pub fn some(&self, state: PathState) -> bool {
        self.states.values().any(|s| *s == state)
    }

    /// Paths in `state`, sorted.
    pub fn paths_in(&self, state: PathState) -> impl Iterator<Item = &str> + '_ {
        self.states
            .iter()
            .filter(move |(_, s)| **s == state)
            .map(|(path, _)| path.as_str())
    }

    /// Forgets every path in `state`.
    pub fn clear(&mut self, state: PathState) {
        self.states.retain(|_, s| *s != state);
    }

    /// Forgets `path`.
    pub fn forget(&mut self, path: &str) {
        self.states.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hold_one_state() {
        let mut paths = ActivePaths::new();
        paths.require("name");
        paths.init("name");
        paths.modify("age");
        assert_eq!(paths.state_of("name"), Some(PathState::Init));
        assert!(!paths.some(PathState::Require));
        assert_eq!(paths.paths_in(PathState::Modify).collect::<Vec<_>>(), vec!["age"]);

        paths.clear(PathState::Modify);
        assert!(!paths.some(PathState::Modify));
        assert!(paths.is("name", PathState::Init));
    }
}
