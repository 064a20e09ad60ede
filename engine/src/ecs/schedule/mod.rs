//! System registration and per-tick execution.
//!
//! The [`Scheduler`] owns one instance of every registered system and a dependency graph with
//! one node per system. Each [`Scheduler::run`] executes the whole graph exactly once:
//!
//! ```text
//!   Idle ──run()──► Scheduled ──plan built──► Running ──all systems done──► Completed
//!    ▲                  │                        │                              │
//!    └──── error ───────┴────────────────────────┘        register/precede/reset┘
//! ```
//!
//! # Ordering
//!
//! - **Explicit edges**: [`Scheduler::precede`] makes one system finish before another starts.
//! - **Derived edges**: systems that declare conflicting access are ordered by registration
//!   (see [`plan`]).
//! - Everything else may run concurrently on the worker pool.
//!
//! # Failure
//!
//! A system returning an error stops any further dispatch. Systems already running finish,
//! then the tick fails with [`Error::SystemFailed`]. A panicking system is handled the same way
//! except that the panic is resumed on the caller's thread.

pub mod plan;

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, trace, warn};

use crate::{
    ecs::{
        component::Components,
        entity::Table,
        error::{Error, Result},
        query::EntityQuery,
        system::{AccessSet, ComponentAccess, Context, Subflow, System},
    },
    tasks::{Executor, Graph, NodeId},
};

use plan::Plan;

/// Where the scheduler is within a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum State {
    /// Nothing has run since the last structural change, or the last tick failed.
    #[default]
    Idle,
    /// A tick was requested and its plan is being built.
    Scheduled,
    /// Systems are executing.
    Running,
    /// The last tick ran every system successfully.
    Completed,
}

struct Entry {
    system: Box<dyn System>,
    name: &'static str,
    node: NodeId,
}

/// A system paired with its resolved declaration for one tick.
struct Unit<'a> {
    system: &'a mut dyn System,
    name: &'static str,
    access: Option<&'a AccessSet>,
}

/// Registry of systems and the dependency graph that orders them.
#[derive(Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
    index: HashMap<TypeId, usize>,
    graph: Graph,
    state: State,
    tick: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `system` as the only instance of its type.
    ///
    /// Fails with [`Error::DuplicateSystemType`] if a system of the same type is registered.
    pub fn register<S: System>(&mut self, system: S) -> Result<()> {
        let type_id = TypeId::of::<S>();
        if self.index.contains_key(&type_id) {
            return Err(Error::DuplicateSystemType {
                system: type_name::<S>(),
            });
        }

        let name = system.name();
        let node = self.graph.add_node(name);
        self.index.insert(type_id, self.entries.len());
        self.entries.push(Entry {
            system: Box::new(system),
            name,
            node,
        });
        self.state = State::Idle;

        debug!("registered system {name}");
        Ok(())
    }

    /// Require `A` to finish before `B` starts on every tick.
    ///
    /// Fails with [`Error::UnknownSystemType`] naming whichever side is not registered, or with
    /// [`Error::CyclicDependency`] if `B` already runs before `A`. Repeating an edge is a no-op.
    pub fn precede<A: System, B: System>(&mut self) -> Result<()> {
        let from = self.node::<A>()?;
        let to = self.node::<B>()?;

        let added = self
            .graph
            .precede(from, to)
            .map_err(|cycle| Error::CyclicDependency {
                from: cycle.from,
                to: cycle.to,
            })?;
        if added {
            debug!(
                "ordered {} before {}",
                self.graph.name(from),
                self.graph.name(to)
            );
        }

        self.state = State::Idle;
        Ok(())
    }

    fn node<S: System>(&self) -> Result<NodeId> {
        self.index
            .get(&TypeId::of::<S>())
            .map(|&i| self.entries[i].node)
            .ok_or(Error::UnknownSystemType {
                system: type_name::<S>(),
            })
    }

    #[inline]
    pub fn contains<S: System>(&self) -> bool {
        self.index.contains_key(&TypeId::of::<S>())
    }

    /// Number of registered systems.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    /// Number of ticks completed successfully.
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Run every registered system once, blocking until all of them have finished.
    pub fn run(
        &mut self,
        components: &Components,
        table: &Table,
        executor: &Executor,
    ) -> Result<()> {
        self.state = State::Scheduled;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute(components, table, executor)
        }));

        match outcome {
            Ok(Ok(())) => {
                self.state = State::Completed;
                self.tick += 1;
                Ok(())
            }
            Ok(Err(err)) => {
                warn!("tick {} aborted: {err}", self.tick);
                self.state = State::Idle;
                Err(err)
            }
            Err(payload) => {
                warn!("tick {} aborted by a panicking system", self.tick);
                self.state = State::Idle;
                panic::resume_unwind(payload)
            }
        }
    }

    fn execute(
        &mut self,
        components: &Components,
        table: &Table,
        executor: &Executor,
    ) -> Result<()> {
        let declared = self
            .entries
            .iter()
            .map(|entry| {
                entry
                    .system
                    .access()
                    .map(|declare| declare.resolve(components))
                    .transpose()
            })
            .collect::<Result<Vec<_>>>()?;

        let plan = Plan::build(&self.graph, &declared);
        self.state = State::Running;
        trace!(
            "tick {} running {} system(s) with {} derived edge(s)",
            self.tick,
            self.entries.len(),
            plan.derived()
        );

        let tick = self.tick;
        let mut units: Vec<Unit<'_>> = self
            .entries
            .iter_mut()
            .zip(&declared)
            .map(|(entry, access)| Unit {
                system: entry.system.as_mut(),
                name: entry.name,
                access: access.as_ref(),
            })
            .collect();

        let result = plan.graph().run(executor, &mut units, |unit| {
            trace!("running {}", unit.name);
            let ctx = Context::new(
                ComponentAccess::new(components, unit.access),
                EntityQuery::new(table),
                Subflow::new(executor),
                tick,
            );
            unit.system.run(&ctx)
        });

        result.map_err(|failure| Error::SystemFailed {
            system: units[failure.node.index()].name,
            source: Box::new(failure.error),
        })
    }

    /// Drop every system and edge. The tick counter starts over.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.graph.clear();
        self.state = State::Idle;
        self.tick = 0;
    }
}
