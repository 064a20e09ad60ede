use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam::channel::unbounded;
use log::trace;

use super::executor::Executor;

/// Identifies a node within a single [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Get the index of this node, matching the position of its item passed to [`Graph::run`].
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An edge was rejected because `to` already reaches `from`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("edge {from} -> {to} would close a cycle")]
pub struct CycleError {
    pub from: String,
    pub to: String,
}

/// The first unit of work that failed during [`Graph::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure<E> {
    pub node: NodeId,
    pub error: E,
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    successors: Vec<NodeId>,
    predecessors: Vec<NodeId>,
}

/// A directed acyclic graph of named units of work.
///
/// Edges are checked as they are added so the graph can never hold a cycle. Running the graph
/// applies a work function to one item per node, dispatching each node to the executor only
/// after all of its predecessors have completed. Nodes without a path between them may run
/// concurrently.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id. Ids are dense and assigned in insertion order.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.into(),
            successors: Vec::new(),
            predecessors: Vec::new(),
        });
        id
    }

    /// Require `from` to complete before `to` starts.
    ///
    /// Returns `Ok(false)` when the edge already existed. Fails without modifying the graph
    /// when the edge would close a cycle, including the self edge `from == to`.
    pub fn precede(&mut self, from: NodeId, to: NodeId) -> Result<bool, CycleError> {
        if self.reaches(to, from) {
            return Err(CycleError {
                from: self.nodes[from.0].name.clone(),
                to: self.nodes[to.0].name.clone(),
            });
        }
        if self.has_edge(from, to) {
            return Ok(false);
        }

        self.nodes[from.0].successors.push(to);
        self.nodes[to.0].predecessors.push(from);
        Ok(true)
    }

    /// Check whether a direct edge `from -> to` exists.
    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.nodes[from.0].successors.contains(&to)
    }

    /// Check whether `to` is reachable from `from`. A node always reaches itself.
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![from];

        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if std::mem::replace(&mut seen[node.0], true) {
                continue;
            }
            stack.extend(self.nodes[node.0].successors.iter().copied());
        }

        false
    }

    /// All nodes in an order where every node follows its predecessors. Ties are broken by id.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut remaining: Vec<usize> = self.nodes.iter().map(|n| n.predecessors.len()).collect();
        let mut ready: Vec<NodeId> = (0..self.nodes.len())
            .rev()
            .filter(|&i| remaining[i] == 0)
            .map(NodeId)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop() {
            order.push(node);
            for next in &self.nodes[node.0].successors {
                remaining[next.0] -= 1;
                if remaining[next.0] == 0 {
                    // Keep the stack sorted descending so the lowest id pops first.
                    let at = ready.partition_point(|n| n.0 > next.0);
                    ready.insert(at, *next);
                }
            }
        }

        order
    }

    /// Every node id, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len()).map(NodeId)
    }

    #[inline]
    pub fn successors(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].successors
    }

    #[inline]
    pub fn predecessors(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].predecessors
    }

    #[inline]
    pub fn name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every node and edge.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Run `work` once on each item, where `items[i]` belongs to the node with index `i`.
    ///
    /// Blocks until the graph has completed. Nodes become ready when all of their predecessors
    /// succeeded and are then handed to the executor; the calling thread helps run queued work
    /// while it waits. After the first error no further nodes are dispatched, work already in
    /// flight drains, and the failure is returned. A panic in `work` is resumed on the calling
    /// thread once in-flight work has drained.
    ///
    /// # Panics
    ///
    /// Panics if `items` does not hold exactly one item per node.
    pub fn run<W, E, F>(
        &self,
        executor: &Executor,
        items: &mut [W],
        work: F,
    ) -> Result<(), Failure<E>>
    where
        W: Send,
        E: Send,
        F: Fn(&mut W) -> Result<(), E> + Sync,
    {
        assert_eq!(
            items.len(),
            self.nodes.len(),
            "graph run needs one item per node"
        );

        let mut slots: Vec<Option<&mut W>> = items.iter_mut().map(Some).collect();
        let mut remaining: Vec<usize> = self.nodes.iter().map(|n| n.predecessors.len()).collect();
        let mut ready: Vec<NodeId> = (0..self.nodes.len())
            .rev()
            .filter(|&i| remaining[i] == 0)
            .map(NodeId)
            .collect();

        let (tx, rx) = unbounded::<(NodeId, thread::Result<Result<(), E>>)>();
        let work = &work;

        executor.scope(|scope| {
            let mut in_flight = 0usize;
            let mut failure = None;
            let mut panicked = None;

            loop {
                if failure.is_none() && panicked.is_none() {
                    while let Some(node) = ready.pop() {
                        // Each node becomes ready exactly once because its counter only hits
                        // zero once.
                        let Some(item) = slots[node.0].take() else {
                            continue;
                        };
                        let tx = tx.clone();
                        trace!("dispatching {}", self.nodes[node.0].name);

                        scope.spawn(move || {
                            let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(item)));
                            let _ = tx.send((node, outcome));
                        });
                        in_flight += 1;
                    }
                }

                if in_flight == 0 {
                    break;
                }

                // `tx` is held by this frame, so the channel stays connected.
                let Some((node, outcome)) = scope.recv_helping(&rx) else {
                    break;
                };
                in_flight -= 1;

                match outcome {
                    Ok(Ok(())) => {
                        for next in &self.nodes[node.0].successors {
                            remaining[next.0] -= 1;
                            if remaining[next.0] == 0 {
                                ready.push(*next);
                            }
                        }
                    }
                    Ok(Err(error)) => {
                        if failure.is_none() && panicked.is_none() {
                            failure = Some(Failure { node, error });
                        }
                    }
                    Err(payload) => {
                        if panicked.is_none() {
                            panicked = Some(payload);
                        }
                    }
                }
            }

            if let Some(payload) = panicked {
                panic::resume_unwind(payload);
            }

            match failure {
                Some(failure) => Err(failure),
                None => Ok(()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn position(order: &[usize], node: usize) -> usize {
        order.iter().position(|&n| n == node).unwrap()
    }

    #[test]
    fn precede_rejects_cycles() {
        // Given
        let mut graph = Graph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");

        // When
        graph.precede(a, b).unwrap();
        graph.precede(b, c).unwrap();

        // Then
        assert_eq!(
            graph.precede(c, a),
            Err(CycleError {
                from: "c".into(),
                to: "a".into()
            })
        );
        assert!(graph.precede(a, a).is_err());
        assert!(!graph.has_edge(c, a));
    }

    #[test]
    fn precede_is_idempotent() {
        let mut graph = Graph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");

        assert_eq!(graph.precede(a, b), Ok(true));
        assert_eq!(graph.precede(a, b), Ok(false));
        assert_eq!(graph.successors(a), &[b]);
        assert_eq!(graph.predecessors(b), &[a]);
    }

    #[test]
    fn topological_order_follows_edges() {
        // Given - d -> b -> a, c unconstrained
        let mut graph = Graph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");
        let d = graph.add_node("d");
        graph.precede(d, b).unwrap();
        graph.precede(b, a).unwrap();

        // When
        let order = graph.topological_order();

        // Then
        assert_eq!(order, vec![c, d, b, a]);
    }

    #[test]
    fn run_visits_every_node_once() {
        // Given - a diamond
        let executor = Executor::new(4);
        let mut graph = Graph::new();
        let top = graph.add_node("top");
        let left = graph.add_node("left");
        let right = graph.add_node("right");
        let bottom = graph.add_node("bottom");
        graph.precede(top, left).unwrap();
        graph.precede(top, right).unwrap();
        graph.precede(left, bottom).unwrap();
        graph.precede(right, bottom).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut items: Vec<usize> = (0..graph.len()).collect();

        // When
        let result = graph.run(&executor, &mut items, |node: &mut usize| -> Result<(), ()> {
            log.lock().unwrap().push(*node);
            *node += 100;
            Ok(())
        });

        // Then
        assert_eq!(result, Ok(()));
        assert_eq!(items, vec![100, 101, 102, 103]);
        let order = log.lock().unwrap().clone();
        assert_eq!(order.len(), 4);
        assert!(position(&order, 0) < position(&order, 1));
        assert!(position(&order, 0) < position(&order, 2));
        assert!(position(&order, 1) < position(&order, 3));
        assert!(position(&order, 2) < position(&order, 3));
    }

    #[test]
    fn run_chain_observes_writes() {
        // Given - a chain where each node records what the previous one left behind
        let executor = Executor::new(3);
        let mut graph = Graph::new();
        let nodes: Vec<_> = (0..8).map(|i| graph.add_node(format!("n{i}"))).collect();
        for pair in nodes.windows(2) {
            graph.precede(pair[0], pair[1]).unwrap();
        }
        let shared = Arc::new(AtomicU32::new(0));
        let mut items: Vec<u32> = (0..8).collect();

        // When
        let result = graph.run(&executor, &mut items, |expected: &mut u32| {
            let seen = shared.fetch_add(1, Ordering::SeqCst);
            if seen == *expected { Ok(()) } else { Err(seen) }
        });

        // Then
        assert_eq!(result, Ok(()));
        assert_eq!(shared.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn run_unordered_nodes_overlap() {
        // Given - two independent nodes that rendezvous with each other
        let executor = Executor::new(2);
        let mut graph = Graph::new();
        graph.add_node("left");
        graph.add_node("right");
        let (tx, rx) = crossbeam::channel::bounded::<()>(0);
        let mut items = vec![Some(tx), None];

        // When - one sends on a rendezvous channel, the other receives
        let result = graph.run(&executor, &mut items, |item: &mut Option<_>| -> Result<(), ()> {
            match item.take() {
                Some(tx) => tx.send(()).map_err(|_| ()),
                None => rx
                    .recv_timeout(Duration::from_secs(5))
                    .map_err(|_| ()),
            }
        });

        // Then - only possible if both ran at the same time
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn run_stops_dispatch_after_failure() {
        // Given - a -> b, with a failing
        let executor = Executor::new(2);
        let mut graph = Graph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        graph.precede(a, b).unwrap();
        let ran = AtomicU32::new(0);
        let mut items = vec![true, false];

        // When
        let result = graph.run(&executor, &mut items, |fail: &mut bool| {
            ran.fetch_add(1, Ordering::SeqCst);
            if *fail { Err("broken") } else { Ok(()) }
        });

        // Then
        assert_eq!(
            result,
            Err(Failure {
                node: a,
                error: "broken"
            })
        );
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_resumes_panics() {
        let executor = Executor::new(2);
        let mut graph = Graph::new();
        graph.add_node("explodes");
        graph.add_node("fine");
        let mut items = vec![true, false];

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = graph.run(&executor, &mut items, |explode: &mut bool| -> Result<(), ()> {
                if *explode {
                    panic!("node exploded");
                }
                Ok(())
            });
        }));

        assert!(outcome.is_err());
    }

    #[test]
    fn run_supports_nested_scopes() {
        // Given - nodes that split their item across the same single-worker executor
        let executor = Executor::single_threaded();
        let mut graph = Graph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        graph.precede(a, b).unwrap();
        let mut items = vec![vec![1u32; 16], vec![2u32; 16]];

        // When
        let result = graph.run(&executor, &mut items, |values: &mut Vec<u32>| -> Result<(), ()> {
            executor.scope(|s| {
                for chunk in values.chunks_mut(4) {
                    s.spawn(move || chunk.iter_mut().for_each(|v| *v *= 3));
                }
            });
            Ok(())
        });

        // Then
        assert_eq!(result, Ok(()));
        assert_eq!(items[0], vec![3; 16]);
        assert_eq!(items[1], vec![6; 16]);
    }

    #[test]
    fn run_empty_graph() {
        let executor = Executor::single_threaded();
        let graph = Graph::new();
        let mut items: Vec<()> = Vec::new();

        let result = graph.run(&executor, &mut items, |_: &mut ()| -> Result<(), ()> { Ok(()) });

        assert_eq!(result, Ok(()));
    }
}
