//! Systems: the behaviors a world runs once per tick.
//!
//! # Overview
//!
//! A system is any `Send + 'static` type implementing [`System`]. It is registered once per
//! concrete type and receives a fresh [`Context`] each tick:
//!
//! ```rust,ignore
//! use rusty_ecs::ecs::{Context, Result, System};
//!
//! struct Movement {
//!     dt: f32,
//! }
//!
//! impl System for Movement {
//!     fn run(&mut self, ctx: &Context<'_>) -> Result<()> {
//!         let velocities = ctx.read::<Velocity>()?;
//!         let mut positions = ctx.write::<Position>()?;
//!         for entity in ctx.query().all().into_filter(|e| velocities.contains(*e)) {
//!             let velocity = velocities.get(entity)?;
//!             let position = positions.get_mut(entity)?;
//!             position.x += self.dt * velocity.x;
//!             position.y += self.dt * velocity.y;
//!         }
//!         Ok(())
//!     }
//! }
//! ```
//!
//! # The Context
//!
//! - [`ComponentAccess`]: read and write guards for component storages
//! - [`EntityQuery`]: snapshots of the live entities
//! - [`Subflow`]: splits the system's own work across the worker pool; every sub-task is
//!   joined before the system counts as complete
//!
//! # Declared Access
//!
//! By default systems are unconstrained: nothing stops two unordered systems from contending
//! on the same storage. Overriding [`System::access`] with a [`Declare`] lets the scheduler
//! keep conflicting systems apart, and makes the mediator reject any access the system did
//! not declare.

mod access;
mod declare;

use std::any::type_name;

pub use access::{ComponentAccess, Read, Write};
pub use declare::{AccessSet, Declare};

use crate::ecs::{Component, error::Result, query::EntityQuery};
use crate::tasks::{Executor, Scope};

/// A behavior run by the world once per tick.
pub trait System: Send + 'static {
    /// Run one tick of this system.
    ///
    /// Returning an error fails the whole tick once in-flight systems have finished.
    fn run(&mut self, ctx: &Context<'_>) -> Result<()>;

    /// The component types this system reads and writes, if it wants them enforced.
    fn access(&self) -> Option<Declare> {
        None
    }

    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// Everything a system can touch while it runs.
pub struct Context<'w> {
    access: ComponentAccess<'w>,
    query: EntityQuery<'w>,
    subflow: Subflow<'w>,
    tick: u64,
}

impl<'w> Context<'w> {
    pub(crate) fn new(
        access: ComponentAccess<'w>,
        query: EntityQuery<'w>,
        subflow: Subflow<'w>,
        tick: u64,
    ) -> Self {
        Self {
            access,
            query,
            subflow,
            tick,
        }
    }

    #[inline]
    pub fn access(&self) -> &ComponentAccess<'w> {
        &self.access
    }

    /// Shorthand for `ctx.access().read::<T>()`.
    #[inline]
    pub fn read<T: Component>(&self) -> Result<Read<'w, T>> {
        self.access.read::<T>()
    }

    /// Shorthand for `ctx.access().write::<T>()`.
    #[inline]
    pub fn write<T: Component>(&self) -> Result<Write<'w, T>> {
        self.access.write::<T>()
    }

    #[inline]
    pub fn query(&self) -> &EntityQuery<'w> {
        &self.query
    }

    #[inline]
    pub fn subflow(&self) -> &Subflow<'w> {
        &self.subflow
    }

    /// Number of ticks the world completed before this one.
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }
}

/// Nested parallel decomposition for a running system.
///
/// Work spawned in a subflow may borrow the system's locals and always completes before the
/// call that spawned it returns, and so before the system's dependents start.
pub struct Subflow<'w> {
    executor: &'w Executor,
}

impl<'w> Subflow<'w> {
    pub(crate) fn new(executor: &'w Executor) -> Self {
        Self { executor }
    }

    /// Spawn borrowing sub-tasks and wait for all of them.
    ///
    /// The calling worker helps run the sub-tasks while it waits. A panic in any sub-task is
    /// resumed here.
    pub fn scope<'s, F, R>(&'s self, f: F) -> R
    where
        F: FnOnce(&Scope<'s>) -> R,
    {
        self.executor.scope(f)
    }

    /// Run `f` over `data` in chunks of `chunk_size`, in parallel, and wait for all chunks.
    pub fn par_chunks_mut<T, F>(&self, data: &mut [T], chunk_size: usize, f: F)
    where
        T: Send,
        F: Fn(&mut [T]) + Sync,
    {
        let f = &f;
        self.scope(|s| {
            for chunk in data.chunks_mut(chunk_size.max(1)) {
                s.spawn(move || f(chunk));
            }
        });
    }

    /// Number of worker threads sub-tasks may be spread over.
    #[inline]
    pub fn workers(&self) -> usize {
        self.executor.size()
    }
}
