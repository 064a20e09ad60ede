//! Per-tick execution plans.
//!
//! A plan is the registered dependency graph plus the edges derived from declared access. For
//! every pair of declaring systems whose declarations conflict and that are not already
//! ordered (in either direction), an edge is added from the earlier registered system to the
//! later one. Because an edge is only added when no path exists the other way, derived edges
//! never close a cycle.
//!
//! ```text
//! registration order: Integrate, Render, Spawn
//!
//! registered:  Integrate ─► Render        declared:  Integrate  write(Position)
//!              Spawn                                 Spawn      write(Position)
//!                                                    Render     read(Position)
//!
//! plan:        Integrate ─► Render
//!                   │
//!                   └──► Spawn                 (Integrate ─► Spawn derived;
//!                                               Render ─► Spawn derived too)
//! ```
//!
//! Systems that declare nothing are left unconstrained.

use std::borrow::Cow;

use log::debug;

use crate::{
    ecs::system::AccessSet,
    tasks::{Graph, NodeId},
};

/// A graph ready to run for one tick.
pub(crate) struct Plan<'g> {
    graph: Cow<'g, Graph>,
    derived: usize,
}

impl<'g> Plan<'g> {
    /// Build the plan for `graph`, where `declared[i]` belongs to the node with index `i`.
    pub(crate) fn build(graph: &'g Graph, declared: &[Option<AccessSet>]) -> Self {
        debug_assert_eq!(graph.len(), declared.len());

        let declaring: Vec<(usize, &AccessSet)> = declared
            .iter()
            .enumerate()
            .filter_map(|(i, access)| access.as_ref().map(|access| (i, access)))
            .collect();

        if declaring.len() < 2 {
            return Self {
                graph: Cow::Borrowed(graph),
                derived: 0,
            };
        }

        let nodes: Vec<NodeId> = graph.nodes().collect();
        let mut graph = graph.clone();
        let mut derived = 0;

        for (position, &(i, first)) in declaring.iter().enumerate() {
            for &(j, second) in &declaring[position + 1..] {
                if !first.conflicts_with(second) {
                    continue;
                }

                let (from, to) = (nodes[i], nodes[j]);
                if graph.reaches(from, to) || graph.reaches(to, from) {
                    continue;
                }

                // Cannot close a cycle: `to` does not reach `from`.
                if graph.precede(from, to).unwrap_or(false) {
                    debug!(
                        "ordering {} before {} to separate conflicting access",
                        graph.name(from),
                        graph.name(to)
                    );
                    derived += 1;
                }
            }
        }

        Self {
            graph: Cow::Owned(graph),
            derived,
        }
    }

    #[inline]
    pub(crate) fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Number of edges added on top of the registered ones.
    #[inline]
    pub(crate) fn derived(&self) -> usize {
        self.derived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{component::Components, system::Declare};
    use rusty_ecs_macros::Component;

    #[derive(Component, Default)]
    struct Position;

    #[derive(Component, Default)]
    struct Velocity;

    fn components() -> Components {
        let mut components = Components::new();
        components.register::<Position>().unwrap();
        components.register::<Velocity>().unwrap();
        components
    }

    fn graph(n: usize) -> (Graph, Vec<NodeId>) {
        let mut graph = Graph::new();
        let nodes = (0..n).map(|i| graph.add_node(format!("s{i}"))).collect();
        (graph, nodes)
    }

    #[test]
    fn no_declarations_borrow_the_graph() {
        let (graph, _) = graph(3);

        let plan = Plan::build(&graph, &[None, None, None]);

        assert_eq!(plan.derived(), 0);
        assert!(matches!(plan.graph, Cow::Borrowed(_)));
    }

    #[test]
    fn conflicting_writers_are_ordered_by_registration() {
        // Given
        let components = components();
        let (graph, nodes) = graph(3);
        let write = Declare::new().write::<Position>().resolve(&components).ok();
        let read_other = Declare::new().read::<Velocity>().resolve(&components).ok();

        // When
        let plan = Plan::build(&graph, &[write.clone(), read_other, write]);

        // Then
        assert_eq!(plan.derived(), 1);
        assert!(plan.graph().has_edge(nodes[0], nodes[2]));
        assert!(plan.graph().successors(nodes[1]).is_empty());
    }

    #[test]
    fn existing_order_is_respected() {
        // Given - s1 already runs before s0
        let components = components();
        let (mut graph, nodes) = graph(2);
        graph.precede(nodes[1], nodes[0]).unwrap();
        let write = Declare::new().write::<Position>().resolve(&components).ok();

        // When
        let plan = Plan::build(&graph, &[write.clone(), write]);

        // Then - no edge added in the opposite direction
        assert_eq!(plan.derived(), 0);
        assert!(!plan.graph().has_edge(nodes[0], nodes[1]));
    }

    #[test]
    fn transitive_order_is_respected() {
        // Given - s0 -> s1 -> s2, s0 and s2 conflict
        let components = components();
        let (mut graph, nodes) = graph(3);
        graph.precede(nodes[0], nodes[1]).unwrap();
        graph.precede(nodes[1], nodes[2]).unwrap();
        let write = Declare::new().write::<Position>().resolve(&components).ok();

        // When
        let plan = Plan::build(&graph, &[write.clone(), None, write]);

        // Then
        assert_eq!(plan.derived(), 0);
    }

    #[test]
    fn readers_stay_parallel() {
        let components = components();
        let (graph, _) = graph(2);
        let read = Declare::new().read::<Position>().resolve(&components).ok();

        let plan = Plan::build(&graph, &[read.clone(), read]);

        assert_eq!(plan.derived(), 0);
    }
}
