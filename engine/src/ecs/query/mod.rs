//! Entity queries.
//!
//! An [`EntityQuery`] is a view of the world's entity table handed to every running system.
//! Calling [`EntityQuery::all`] snapshots every live entity, in ascending id order, into an
//! owned [`EntitySet`] which can then be narrowed with predicates:
//!
//! ```rust,ignore
//! let velocities = ctx.read::<Velocity>()?;
//! let moving = ctx.query().all().into_filter(|e| velocities.contains(*e));
//! ```
//!
//! Sets never re-query the world, so they keep describing the moment they were taken.

mod set;

pub use set::EntitySet;

use crate::ecs::entity::{Entity, Table};

/// A read-only view of the live entities in a world.
pub struct EntityQuery<'w> {
    table: &'w Table,
}

impl<'w> EntityQuery<'w> {
    pub(crate) fn new(table: &'w Table) -> Self {
        Self { table }
    }

    /// Every live entity, in ascending id order.
    pub fn all(&self) -> EntitySet {
        EntitySet::from(self.table.iter().collect::<Vec<_>>())
    }

    /// Live entities matching `predicate`, without materializing the rest.
    pub fn filter(&self, mut predicate: impl FnMut(&Entity) -> bool) -> EntitySet {
        EntitySet::from(self.table.iter().filter(|e| predicate(e)).collect::<Vec<_>>())
    }

    /// Number of live entities.
    #[inline]
    pub fn count(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.table.is_alive(entity)
    }
}
