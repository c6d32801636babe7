//! Rules for hierarchical (composite) states.

use super::{Outcome, Rule};
use crate::model::HistoryMode;

#[derive(Debug, Clone)]
pub struct HierarchyState<'a> {
    pub name: &'a str,
    pub parent: Option<&'a str>,
    pub initial: bool,
    pub history: HistoryMode,
}

/// Parent links and composite configuration of every declared state.
pub struct HierarchyFacts<'a> {
    pub states: &'a [HierarchyState<'a>],
}

impl<'a> HierarchyFacts<'a> {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|state| state.name == name)
    }

    fn children<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s HierarchyState<'a>> + 's {
        self.states
            .iter()
            .filter(move |state| state.parent == Some(name))
    }

    pub fn is_composite(&self, name: &str) -> bool {
        self.children(name).next().is_some()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Walks every parent chain, reporting each cycle once.
pub fn circular_hierarchy(cx: &HierarchyFacts<'_>) -> Vec<Outcome> {
    let mut marks = vec![Mark::Unvisited; cx.states.len()];
    let mut outcomes = Vec::new();

    for start in 0..cx.states.len() {
        let mut path = Vec::new();
        let mut current = Some(start);
        while let Some(index) = current {
            match marks[index] {
                Mark::Done => break,
                Mark::InProgress => {
                    if let Some(position) = path.iter().position(|&seen| seen == index) {
                        let mut cycle: Vec<&str> =
                            path[position..].iter().map(|&i: &usize| cx.states[i].name).collect();
                        cycle.push(cx.states[index].name);
                        outcomes.push(
                            Outcome::new(
                                Rule::CircularHierarchy,
                                format!("Circular hierarchy detected: {}.", cycle.join(" -> ")),
                            )
                            .about(cx.states[index].name),
                        );
                    }
                    break;
                }
                Mark::Unvisited => {
                    marks[index] = Mark::InProgress;
                    path.push(index);
                    current = cx.states[index].parent.and_then(|parent| cx.index_of(parent));
                }
            }
        }
        for index in path {
            marks[index] = Mark::Done;
        }
    }
    outcomes
}

/// Parent references that do not name a declared state.
pub fn orphan_substates(cx: &HierarchyFacts<'_>) -> Vec<Outcome> {
    cx.states
        .iter()
        .filter_map(|state| {
            let parent = state.parent?;
            if cx.index_of(parent).is_some() {
                return None;
            }
            Some(
                Outcome::new(
                    Rule::OrphanSubstate,
                    format!(
                        "State '{}' names parent '{parent}', which is not a declared state.",
                        state.name
                    ),
                )
                .about(state.name),
            )
        })
        .collect()
}

/// Every composite needs exactly one way to pick its entry child.
pub fn composite_entry(cx: &HierarchyFacts<'_>) -> Vec<Outcome> {
    let mut outcomes = Vec::new();
    for state in cx.states {
        if !cx.is_composite(state.name) {
            continue;
        }
        let initial: Vec<&str> = cx
            .children(state.name)
            .filter(|child| child.initial)
            .map(|child| child.name)
            .collect();
        match initial.len() {
            0 if state.history == HistoryMode::None => outcomes.push(
                Outcome::new(
                    Rule::InvalidHierarchyConfiguration,
                    format!(
                        "Composite state '{}' has no initial substate and no history mode. Mark one child with `initial` or set `history`.",
                        state.name
                    ),
                )
                .about(state.name),
            ),
            0 | 1 => {}
            _ => outcomes.push(
                Outcome::new(
                    Rule::MultipleInitialSubstates,
                    format!(
                        "Composite state '{}' has multiple initial substates: {}.",
                        state.name,
                        initial.join(", ")
                    ),
                )
                .about(state.name),
            ),
        }
    }
    outcomes
}

/// History only means something on a composite state.
pub fn history_on_leaf(cx: &HierarchyFacts<'_>) -> Vec<Outcome> {
    cx.states
        .iter()
        .filter(|state| state.history != HistoryMode::None && !cx.is_composite(state.name))
        .map(|state| {
            Outcome::new(
                Rule::InvalidHistoryConfiguration,
                format!(
                    "State '{}' configures history but has no substates; the setting has no effect.",
                    state.name
                ),
            )
            .about(state.name)
        })
        .collect()
}

/// Transitions whose target is a composite, resolved at runtime to a leaf.
pub struct CompositeTargets<'a> {
    pub hierarchy: &'a HierarchyFacts<'a>,
    pub transitions: &'a [(&'a str, &'a str)],
}

pub fn composite_targets(cx: &CompositeTargets<'_>) -> Vec<Outcome> {
    cx.transitions
        .iter()
        .filter(|(_, to)| cx.hierarchy.is_composite(to))
        .map(|(from, to)| {
            let resolution = match cx.hierarchy.index_of(to).map(|i| cx.hierarchy.states[i].history) {
                Some(HistoryMode::None) | None => "its initial substate",
                Some(HistoryMode::Shallow | HistoryMode::Deep) => "its history, else its initial substate",
            };
            Outcome::new(
                Rule::CompositeTransitionTarget,
                format!("Transition from '{from}' targets composite state '{to}'; entry resolves to {resolution}."),
            )
            .about(*to)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Severity;

    fn state<'a>(name: &'a str, parent: Option<&'a str>, initial: bool) -> HierarchyState<'a> {
        HierarchyState {
            name,
            parent,
            initial,
            history: HistoryMode::None,
        }
    }

    #[test]
    fn detects_cycles_once() {
        let states = [
            state("A", Some("B"), false),
            state("B", Some("C"), false),
            state("C", Some("A"), false),
            state("D", Some("A"), false),
        ];
        let outcomes = circular_hierarchy(&HierarchyFacts { states: &states });
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[0].message,
            "Circular hierarchy detected: A -> B -> C -> A."
        );
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let states = [state("A", Some("A"), false)];
        let outcomes = circular_hierarchy(&HierarchyFacts { states: &states });
        assert_eq!(outcomes.len(), 1);
    }

    #[test]
    fn orphan_parent() {
        let states = [state("A", Some("Ghost"), false)];
        let outcomes = orphan_substates(&HierarchyFacts { states: &states });
        assert_eq!(outcomes[0].rule, Rule::OrphanSubstate);
    }

    #[test]
    fn composite_entry_rules() {
        let states = [
            state("On", None, false),
            state("Low", Some("On"), false),
            state("High", Some("On"), false),
            state("Menu", None, false),
            state("First", Some("Menu"), true),
            state("Second", Some("Menu"), true),
        ];
        let outcomes = composite_entry(&HierarchyFacts { states: &states });
        let rules: Vec<_> = outcomes.iter().map(|o| o.rule).collect();
        assert_eq!(
            rules,
            vec![Rule::InvalidHierarchyConfiguration, Rule::MultipleInitialSubstates]
        );
    }

    #[test]
    fn history_substitutes_for_initial_child() {
        let mut on = state("On", None, false);
        on.history = HistoryMode::Shallow;
        let states = [on, state("Low", Some("On"), false)];
        assert!(composite_entry(&HierarchyFacts { states: &states }).is_empty());
    }

    #[test]
    fn history_on_leaf_warns() {
        let mut leaf = state("Leaf", None, false);
        leaf.history = HistoryMode::Deep;
        let states = [leaf];
        let outcomes = history_on_leaf(&HierarchyFacts { states: &states });
        assert_eq!(outcomes[0].severity, Severity::Warning);
    }

    #[test]
    fn composite_targets_are_informational() {
        let states = [
            state("Off", None, false),
            state("On", None, false),
            state("Low", Some("On"), true),
        ];
        let facts = HierarchyFacts { states: &states };
        let outcomes = composite_targets(&CompositeTargets {
            hierarchy: &facts,
            transitions: &[("Off", "On"), ("On", "Off")],
        });
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].severity, Severity::Info);
    }
}
