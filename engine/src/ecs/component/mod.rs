//! Component types and their registry.
//!
//! Components are the data attached to entities. Any `'static + Send + Sync` type can be a
//! component once it implements [`Component`], usually through the derive macro:
//!
//! ```ignore
//! use rusty_ecs_macros::Component;
//!
//! #[derive(Component, Default)]
//! struct Position { x: f32, y: f32 }
//!
//! world.register_component::<Position>()?;
//! ```
//!
//! Each world owns a [`Components`] registry. Registration assigns the type a dense [`Id`] and
//! creates its [`Storage`](crate::ecs::storage::Storage), guarded by its own lock so systems
//! running in parallel only contend on the types they share.

mod registry;

pub use registry::Components;

/// A component identifier: the registration index of a component type within one world.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u32);

impl Id {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The registration index, usable as a bit position or a `Vec` index.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for Id {
    #[inline]
    fn from(value: usize) -> Self {
        Self::new(value as u32)
    }
}

/// Data that can be attached to an entity.
///
/// A marker trait: the bounds let storages be shared across worker threads. Implement it with
/// `#[derive(Component)]`.
pub trait Component: 'static + Sized + Send + Sync {}
