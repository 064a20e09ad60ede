//! Task execution primitives that know nothing about entities or components.
//!
//! - [`Executor`]: a fixed-size worker pool fed over crossbeam channels, with scoped spawning
//!   of tasks that borrow from the caller's stack.
//! - [`Graph`]: a directed acyclic graph of named units of work, run to completion on an
//!   executor with every node dispatched only after its predecessors finished.

mod executor;
mod graph;

pub use executor::{Executor, ExecutorHandle, Scope, TaskError, TaskFuture};
pub use graph::{CycleError, Failure, Graph, NodeId};
