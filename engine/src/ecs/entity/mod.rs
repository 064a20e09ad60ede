//! Entity identity for the ECS.
//!
//! Entities are lightweight handles that tie components together. They carry no data of their
//! own: every component lives in a per-type storage keyed by the entity's [`Id`].
//!
//! # Architecture
//!
//! - **[`Entity`]**: A handle combining an [`Id`] and a [`Generation`]. The id is a dense slot
//!   index starting at 0, while the generation tracks how many times that slot was freed.
//!
//! - **[`Table`]**: The existence bitmap and generation counters for every slot. Creation takes
//!   the lowest free slot, growing the table by a fixed block when none is free.
//!
//! # Generation Tracking
//!
//! When an entity is destroyed its slot is immediately available again, but the slot's
//! generation is bumped. A handle retained past destruction no longer matches the table and is
//! rejected instead of silently aliasing the slot's new occupant:
//!
//! ```rust,ignore
//! let entity = table.alloc(); // 0v0
//! table.free(entity);
//! let reused = table.alloc(); // 0v1
//! assert!(!table.is_alive(entity));
//! ```

mod table;

use std::fmt;

pub use table::Table;

/// The generation of an entity slot. Starts at `FIRST` and is incremented each time the slot
/// is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u32);

impl Generation {
    /// The generation of a slot that has never been freed.
    pub(crate) const FIRST: Self = Self(0);

    /// The generation a slot moves to when it is freed. Wraps on overflow.
    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// The slot of an entity in the [`Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u32);

impl From<u32> for Id {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Id {
    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// An entity in the ECS.
///
/// The world holds at most one live entity for a given `id`. The `generation` tells whether
/// this handle still refers to that live entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    id: Id,
    generation: Generation,
}

impl Entity {
    /// A first-generation handle for slot `id`.
    #[inline]
    pub(crate) fn new(id: u32) -> Self {
        Self::new_with_generation(Id(id), Generation::FIRST)
    }

    #[inline]
    pub(crate) const fn new_with_generation(id: Id, generation: Generation) -> Self {
        Self { id, generation }
    }

    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The slot as a `usize`, for indexing per-slot vecs.
    #[inline]
    pub fn index(&self) -> usize {
        self.id.0 as usize
    }
}

/// Order by id, then generation.
impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.generation.cmp(&other.generation))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id.0, self.generation.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_orders_by_id_then_generation() {
        let a = Entity::new(1);
        let b = Entity::new_with_generation(Id(1), Generation::FIRST.next());
        let c = Entity::new(2);

        let mut entities = vec![c, b, a];
        entities.sort();

        assert_eq!(entities, vec![a, b, c]);
    }

    #[test]
    fn entity_display() {
        let entity = Entity::new_with_generation(Id(7), Generation(2));
        assert_eq!(entity.to_string(), "7v2");
        assert_eq!(entity.index(), 7);
    }
}
