//! Declared component access for systems.
//!
//! A system may declare up front which component types it reads and writes. The scheduler uses
//! the declarations to keep conflicting systems from running at the same time, and the access
//! mediator holds a declaring system to its word.
//!
//! Two declarations conflict if they cannot be held simultaneously, following Rust's aliasing
//! rules:
//! - Multiple readers of the same type are OK
//! - A writer conflicts with any other reader or writer of the same type
//!
//! ```rust,ignore
//! impl System for Integrate {
//!     fn access(&self) -> Option<Declare> {
//!         Some(Declare::new().read::<Velocity>().write::<Position>())
//!     }
//!     // ...
//! }
//! ```
//!
//! Write access implies read access to the same type.

use std::any::{TypeId, type_name};

use fixedbitset::FixedBitSet;

use crate::ecs::{
    Component,
    component::{Components, Id},
    error::Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Key {
    type_id: TypeId,
    name: &'static str,
}

impl Key {
    fn of<C: Component>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: type_name::<C>(),
        }
    }
}

/// The component types a system reads and writes, before they are resolved against a world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declare {
    reads: Vec<Key>,
    writes: Vec<Key>,
}

impl Declare {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare shared access to `C`.
    pub fn read<C: Component>(mut self) -> Self {
        self.reads.push(Key::of::<C>());
        self
    }

    /// Declare exclusive access to `C`.
    pub fn write<C: Component>(mut self) -> Self {
        self.writes.push(Key::of::<C>());
        self
    }

    /// Resolve the declared types to component ids.
    ///
    /// Fails with [`Error::UnknownComponentType`](crate::ecs::Error::UnknownComponentType) if a
    /// declared type is not registered.
    pub(crate) fn resolve(&self, components: &Components) -> Result<AccessSet> {
        let mut set = AccessSet::default();
        for key in &self.reads {
            let id = components.resolve_type(key.type_id, key.name)?;
            insert(&mut set.reads, id);
        }
        for key in &self.writes {
            let id = components.resolve_type(key.type_id, key.name)?;
            insert(&mut set.writes, id);
        }
        Ok(set)
    }
}

#[inline]
fn insert(bitset: &mut FixedBitSet, id: Id) {
    let index = id.index();
    bitset.grow(index + 1);
    bitset.insert(index);
}

/// A resolved declaration: one bit per component id for reads and for writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessSet {
    reads: FixedBitSet,
    writes: FixedBitSet,
}

impl AccessSet {
    /// Check whether the declaration covers reading `id`.
    #[inline]
    pub fn allows_read(&self, id: Id) -> bool {
        self.reads.contains(id.index()) || self.writes.contains(id.index())
    }

    /// Check whether the declaration covers writing `id`.
    #[inline]
    pub fn allows_write(&self, id: Id) -> bool {
        self.writes.contains(id.index())
    }

    /// Check whether two systems holding these sets may not run at the same time.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        !self.writes.is_disjoint(&other.writes)
            || !self.writes.is_disjoint(&other.reads)
            || !self.reads.is_disjoint(&other.writes)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.reads.is_clear() && self.writes.is_clear()
    }
}
