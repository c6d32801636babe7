//! Static hierarchy tables and per-instance history for hierarchical machines.
//!
//! States are addressed by their declaration index. Generated code builds one
//! [`Hierarchy`] per machine type in a `static` and keeps a [`HistoryTracker`]
//! per instance.

/// How a composite state picks its child when it is re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryMode {
    /// Always enter the initial child.
    #[default]
    None,
    /// Resume the direct child that was active on exit.
    Shallow,
    /// Resume the leaf that was active on exit, at every nesting level.
    Deep,
}

/// Parent links, entry children and history modes of every state.
#[derive(Debug)]
pub struct Hierarchy {
    parents: &'static [Option<usize>],
    entry_children: &'static [Option<usize>],
    history: &'static [HistoryMode],
}

impl Hierarchy {
    /// All three tables are indexed by state and must have the same length.
    /// `entry_children[s]` is `Some` exactly when `s` is composite.
    pub const fn new(
        parents: &'static [Option<usize>],
        entry_children: &'static [Option<usize>],
        history: &'static [HistoryMode],
    ) -> Self {
        Self {
            parents,
            entry_children,
            history,
        }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn parent(&self, state: usize) -> Option<usize> {
        self.parents.get(state).copied().flatten()
    }

    pub fn is_composite(&self, state: usize) -> bool {
        matches!(self.entry_children.get(state), Some(Some(_)))
    }

    /// Whether `target` is `current` or one of its ancestors.
    pub fn is_in(&self, current: usize, target: usize) -> bool {
        self.ancestors_or_self(current).any(|state| state == target)
    }

    /// Path from the outermost ancestor down to `leaf`.
    pub fn active_path(&self, leaf: usize) -> Vec<usize> {
        let mut path: Vec<usize> = self.ancestors_or_self(leaf).collect();
        path.reverse();
        path
    }

    /// Deepest state that both endpoints of a transition stay inside.
    ///
    /// A transition from a state to itself leaves and re-enters it, so its
    /// scope is the parent. `None` means the transition crosses the root.
    pub fn transition_scope(&self, source: usize, target: usize) -> Option<usize> {
        if source == target {
            return self.parent(source);
        }
        self.ancestors_or_self(source)
            .find(|&candidate| self.is_in(target, candidate))
    }

    /// States exited when leaving `leaf` up to, not including, `scope`.
    /// Innermost first.
    pub fn exit_path(&self, leaf: usize, scope: Option<usize>) -> Vec<usize> {
        self.ancestors_or_self(leaf)
            .take_while(|&state| Some(state) != scope)
            .collect()
    }

    /// States entered when descending from below `scope` to `leaf`.
    /// Outermost first.
    pub fn entry_path(&self, scope: Option<usize>, leaf: usize) -> Vec<usize> {
        let mut path = self.exit_path(leaf, scope);
        path.reverse();
        path
    }

    /// Resolves `state` to the leaf that becomes active when it is entered.
    ///
    /// Deep history applies to every level below the composite that declares it.
    pub fn resolve_entry(&self, state: usize, history: &HistoryTracker) -> usize {
        let mut current = state;
        let mut deep = false;
        while let Some(Some(initial)) = self.entry_children.get(current).copied() {
            let mode = if deep {
                HistoryMode::Deep
            } else {
                self.history.get(current).copied().unwrap_or_default()
            };
            deep = mode == HistoryMode::Deep;
            current = match mode {
                HistoryMode::None => initial,
                HistoryMode::Shallow | HistoryMode::Deep => {
                    history.last_active(current).unwrap_or(initial)
                }
            };
        }
        current
    }

    fn ancestors_or_self(&self, state: usize) -> impl Iterator<Item = usize> + '_ {
        // Bounded by the table size so a malformed table cannot spin forever.
        std::iter::successors(Some(state), |&s| self.parent(s)).take(self.parents.len() + 1)
    }
}

/// Last active child of every composite, per machine instance.
#[derive(Debug, Clone, Default)]
pub struct HistoryTracker {
    last_active: Vec<Option<usize>>,
}

impl HistoryTracker {
    pub fn new(states: usize) -> Self {
        Self {
            last_active: vec![None; states],
        }
    }

    /// Records that `child` was active inside its parent when it was exited.
    pub fn record_exit(&mut self, hierarchy: &Hierarchy, child: usize) {
        if let Some(parent) = hierarchy.parent(child)
            && let Some(slot) = self.last_active.get_mut(parent)
        {
            *slot = Some(child);
        }
    }

    pub fn last_active(&self, composite: usize) -> Option<usize> {
        self.last_active.get(composite).copied().flatten()
    }

    pub fn clear(&mut self) {
        self.last_active.iter_mut().for_each(|slot| *slot = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0 Off, 1 On (composite, shallow), 2 Low, 3 High (composite, deep), 4 Warm, 5 Hot
    const PARENTS: &[Option<usize>] = &[None, None, Some(1), Some(1), Some(3), Some(3)];
    const ENTRY: &[Option<usize>] = &[None, Some(2), None, Some(4), None, None];
    const HISTORY: &[HistoryMode] = &[
        HistoryMode::None,
        HistoryMode::Shallow,
        HistoryMode::None,
        HistoryMode::Deep,
        HistoryMode::None,
        HistoryMode::None,
    ];

    static TREE: Hierarchy = Hierarchy::new(PARENTS, ENTRY, HISTORY);

    #[test]
    fn is_in_walks_ancestors() {
        assert!(TREE.is_in(5, 5));
        assert!(TREE.is_in(5, 3));
        assert!(TREE.is_in(5, 1));
        assert!(!TREE.is_in(5, 0));
        assert!(!TREE.is_in(1, 5));
    }

    #[test]
    fn active_path_is_outermost_first() {
        assert_eq!(TREE.active_path(5), vec![1, 3, 5]);
        assert_eq!(TREE.active_path(0), vec![0]);
    }

    #[test]
    fn scope_of_sibling_and_self_transitions() {
        assert_eq!(TREE.transition_scope(4, 5), Some(3));
        assert_eq!(TREE.transition_scope(2, 0), None);
        assert_eq!(TREE.transition_scope(3, 3), Some(1));
        assert_eq!(TREE.transition_scope(1, 4), Some(1));
    }

    #[test]
    fn exit_and_entry_paths() {
        assert_eq!(TREE.exit_path(5, None), vec![5, 3, 1]);
        assert_eq!(TREE.exit_path(5, Some(1)), vec![5, 3]);
        assert_eq!(TREE.entry_path(None, 4), vec![1, 3, 4]);
        assert_eq!(TREE.entry_path(Some(3), 4), vec![4]);
    }

    #[test]
    fn entry_without_history_uses_initial_children() {
        let history = HistoryTracker::new(TREE.len());
        assert_eq!(TREE.resolve_entry(1, &history), 2);
        assert_eq!(TREE.resolve_entry(3, &history), 4);
        assert_eq!(TREE.resolve_entry(0, &history), 0);
    }

    #[test]
    fn shallow_history_resumes_direct_child() {
        let mut history = HistoryTracker::new(TREE.len());
        for state in TREE.exit_path(5, None) {
            history.record_exit(&TREE, state);
        }
        // On is shallow: it resumes High, and High is deep so it resumes Hot.
        assert_eq!(TREE.resolve_entry(1, &history), 5);
    }

    #[test]
    fn deep_history_resumes_leaf() {
        let mut history = HistoryTracker::new(TREE.len());
        history.record_exit(&TREE, 5);
        assert_eq!(TREE.resolve_entry(3, &history), 5);
        history.clear();
        assert_eq!(TREE.resolve_entry(3, &history), 4);
    }
}
