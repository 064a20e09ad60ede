//! Dense, type-erased component storage.
//!
//! Every registered component type gets exactly one [`Storage<T>`]: a packed `Vec<T>` of
//! values, a parallel `Vec<Entity>` recording which entity owns each row, and a sparse
//! [`DynamicIndex`] mapping entity slots back to rows.
//!
//! ```text
//!  index (by entity id)      owners           values
//!  ┌────┬────┬────┬────┐    ┌──────┐        ┌──────────┐
//!  │ 2  │ -  │ 0  │ 1  │    │ e2v0 │ row 0  │ Pos{..}  │
//!  └────┴────┴────┴────┘    │ e3v0 │ row 1  │ Pos{..}  │
//!    e0   e1   e2   e3      │ e0v0 │ row 2  │ Pos{..}  │
//!                           └──────┘        └──────────┘
//! ```
//!
//! # Swap-remove
//!
//! Removing a component moves the last row into the hole and repoints the moved owner's index
//! entry, so the storage stays packed and removal is O(1). The price is that row order is not
//! stable: iteration order after a removal differs from insertion order.
//!
//! # Type erasure
//!
//! The world keeps storages of different types side by side as `Box<dyn AnyStorage>`. The
//! erased surface only carries what is needed without knowing `T`: membership, discarding an
//! entity's component when the entity is destroyed, and downcasting back to `Storage<T>`.

mod index;
mod row;

use std::any::{Any, type_name};
use std::ops;

use crate::ecs::{
    Component,
    entity::Entity,
    error::{Error, Result},
};

pub(crate) use index::DynamicIndex;
pub(crate) use row::Row;

/// Densely packed storage for every `T` component in a world.
pub struct Storage<T> {
    values: Vec<T>,
    owners: Vec<Entity>,
    index: DynamicIndex,
}

impl<T: Component> Storage<T> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            owners: Vec::new(),
            index: DynamicIndex::new(),
        }
    }

    /// Number of stored components.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The row holding `entity`'s component. The owner check rejects stale handles whose slot
    /// has been reused.
    #[inline]
    fn row(&self, entity: Entity) -> Option<Row> {
        let row = self.index.get(entity)?;
        (self.owners[row.index()] == entity).then_some(row)
    }

    /// Check whether `entity` has a `T`.
    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.row(entity).is_some()
    }

    /// Add a default `T` to `entity`.
    pub fn add(&mut self, entity: Entity) -> Result<&mut T>
    where
        T: Default,
    {
        self.insert(entity, T::default())
    }

    /// Add `value` to `entity`.
    ///
    /// Fails with [`Error::DuplicateComponent`] if the entity already has a `T`.
    pub fn insert(&mut self, entity: Entity, value: T) -> Result<&mut T> {
        if self.contains(entity) {
            return Err(Error::DuplicateComponent {
                entity,
                component: type_name::<T>(),
            });
        }

        // A previous owner of the slot that was never discarded.
        if let Some(stale) = self.index.get(entity) {
            self.swap_remove(stale);
        }

        let row = Row::new(self.values.len());
        self.values.push(value);
        self.owners.push(entity);
        self.index.insert(entity, row);
        Ok(&mut self.values[row.index()])
    }

    pub fn get(&self, entity: Entity) -> Result<&T> {
        match self.row(entity) {
            Some(row) => Ok(&self.values[row.index()]),
            None => Err(Self::missing(entity)),
        }
    }

    pub fn get_mut(&mut self, entity: Entity) -> Result<&mut T> {
        match self.row(entity) {
            Some(row) => Ok(&mut self.values[row.index()]),
            None => Err(Self::missing(entity)),
        }
    }

    /// Remove and return `entity`'s component, moving the last row into its place.
    pub fn remove(&mut self, entity: Entity) -> Result<T> {
        let row = self.row(entity).ok_or_else(|| Self::missing(entity))?;
        Ok(self.swap_remove(row))
    }

    fn swap_remove(&mut self, row: Row) -> T {
        let owner = self.owners.swap_remove(row.index());
        self.index.remove(owner);
        let value = self.values.swap_remove(row.index());

        // The last row now lives in the vacated one.
        if let Some(&moved) = self.owners.get(row.index()) {
            self.index.insert(moved, row);
        }

        value
    }

    fn missing(entity: Entity) -> Error {
        Error::MissingComponent {
            entity,
            component: type_name::<T>(),
        }
    }

    /// The component in dense row `index`.
    #[inline]
    pub fn get_by_index(&self, index: usize) -> Option<&T> {
        self.values.get(index)
    }

    #[inline]
    pub fn get_by_index_mut(&mut self, index: usize) -> Option<&mut T> {
        self.values.get_mut(index)
    }

    /// The entity owning dense row `index`.
    #[inline]
    pub fn entity_at(&self, index: usize) -> Option<Entity> {
        self.owners.get(index).copied()
    }

    /// Owners of every row, in row order.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.owners
    }

    /// Components in row order.
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    #[inline]
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.values.iter_mut()
    }

    /// Rows paired with their owning entity.
    pub fn entries(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.owners.iter().copied().zip(self.values.iter())
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
        self.owners.iter().copied().zip(self.values.iter_mut())
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.owners.clear();
        self.index.clear();
    }
}

impl<T: Component> Default for Storage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ops::Index<usize> for Storage<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        &self.values[index]
    }
}

impl<T: Component> ops::IndexMut<usize> for Storage<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.values[index]
    }
}

impl<'a, T: Component> IntoIterator for &'a Storage<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: Component> IntoIterator for &'a mut Storage<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// The type-erased face of a [`Storage<T>`].
pub trait AnyStorage: Send + Sync + 'static {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether `entity` has a component in this storage.
    fn has(&self, entity: Entity) -> bool;

    /// Drop `entity`'s component if it has one, returning whether it did.
    fn discard(&mut self, entity: Entity) -> bool;

    /// Name of the stored component type.
    fn type_name(&self) -> &'static str;

    fn clear(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyStorage for Storage<T> {
    #[inline]
    fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    fn has(&self, entity: Entity) -> bool {
        self.contains(entity)
    }

    fn discard(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_ok()
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn clear(&mut self) {
        Storage::clear(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
