//! Rules about transition declarations and the state graph they form.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;

use super::{Outcome, Rule};

/// A transition whose `(from, trigger)` pair may already be registered.
pub struct DuplicateTransition<'a> {
    pub from: &'a str,
    pub trigger: &'a str,
    pub already_registered: bool,
}

pub fn duplicate_transition(cx: &DuplicateTransition<'_>) -> Vec<Outcome> {
    if !cx.already_registered {
        return Vec::new();
    }
    vec![Outcome::new(
        Rule::DuplicateTransition,
        format!(
            "Duplicate transition from state '{}' on trigger '{}'. Only the first one will be used by the generator.",
            cx.from, cx.trigger
        ),
    )]
}

/// An enum reference and whether it named a declared member.
pub struct EnumValue<'a> {
    pub value: &'a str,
    pub enum_name: &'a str,
    pub resolved: bool,
}

pub fn enum_value(cx: &EnumValue<'_>) -> Vec<Outcome> {
    if cx.resolved {
        return Vec::new();
    }
    vec![Outcome::new(
        Rule::InvalidEnumValue,
        format!(
            "Invalid enum value '{}' for enum type '{}'. Use a valid enum member.",
            cx.value, cx.enum_name
        ),
    )]
}

/// The state graph seen from the initial state.
///
/// `edges` holds declared transitions plus, for hierarchical machines, the
/// implicit parent-to-child and child-to-parent edges.
pub struct Reachability<'a> {
    pub states: &'a [String],
    pub initial: Option<&'a str>,
    pub edges: &'a [(String, String)],
}

pub fn unreachable_states(cx: &Reachability<'_>) -> Vec<Outcome> {
    let Some(initial) = cx.initial else {
        return Vec::new();
    };

    let mut graph = DiGraph::<&str, ()>::new();
    let nodes: Vec<NodeIndex> = cx.states.iter().map(|state| graph.add_node(state)).collect();
    let node_of = |name: &str| {
        cx.states
            .iter()
            .position(|state| state == name)
            .map(|index| nodes[index])
    };
    for (from, to) in cx.edges {
        if let (Some(from), Some(to)) = (node_of(from), node_of(to)) {
            graph.add_edge(from, to, ());
        }
    }

    let Some(start) = node_of(initial) else {
        return Vec::new();
    };
    let mut reached = vec![false; graph.node_count()];
    let mut bfs = Bfs::new(&graph, start);
    while let Some(node) = bfs.next(&graph) {
        reached[node.index()] = true;
    }

    cx.states
        .iter()
        .zip(reached)
        .filter(|(_, reached)| !reached)
        .map(|(state, _)| {
            Outcome::new(
                Rule::UnreachableState,
                format!("State '{state}' might be unreachable based on defined transitions."),
            )
            .about(state.as_str())
        })
        .collect()
}
