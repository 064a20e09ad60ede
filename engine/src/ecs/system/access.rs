use std::any::type_name;
use std::ops::{Deref, DerefMut};

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};

use crate::ecs::{
    Component,
    component::Components,
    error::{Error, Mode, Result},
    storage::Storage,
    system::declare::AccessSet,
};

/// Shared access to every `T` in the world, held for as long as the guard lives.
pub struct Read<'w, T: Component> {
    storage: MappedRwLockReadGuard<'w, Storage<T>>,
}

impl<'w, T: Component> Deref for Read<'w, T> {
    type Target = Storage<T>;

    #[inline]
    fn deref(&self) -> &Storage<T> {
        &self.storage
    }
}

/// Exclusive access to every `T` in the world, held for as long as the guard lives.
pub struct Write<'w, T: Component> {
    storage: MappedRwLockWriteGuard<'w, Storage<T>>,
}

impl<'w, T: Component> Deref for Write<'w, T> {
    type Target = Storage<T>;

    #[inline]
    fn deref(&self) -> &Storage<T> {
        &self.storage
    }
}

impl<'w, T: Component> DerefMut for Write<'w, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Storage<T> {
        &mut self.storage
    }
}

/// Brokers a running system's access to component storages.
///
/// A fresh mediator is handed to every system invocation. Guards block while a conflicting
/// guard is held elsewhere, so two systems writing the same type never alias, but nothing
/// orders them either: use precedence edges or declared access for that. Taking guards on
/// the same pair of types in opposite orders from two unordered systems can deadlock.
///
/// Reads are reentrant: a system may take a second `read::<T>()` while holding one, even with
/// a writer waiting on `T`. A system must not ask for `T` while it holds a `Write<T>`, in
/// either mode; that call blocks forever.
///
/// If the system declared its access, the mediator refuses anything outside the declaration.
pub struct ComponentAccess<'w> {
    components: &'w Components,
    declared: Option<&'w AccessSet>,
}

impl<'w> ComponentAccess<'w> {
    pub(crate) fn new(components: &'w Components, declared: Option<&'w AccessSet>) -> Self {
        Self {
            components,
            declared,
        }
    }

    /// Shared access to `T`'s storage.
    pub fn read<T: Component>(&self) -> Result<Read<'w, T>> {
        self.check::<T>(Mode::Read)?;
        Ok(Read {
            storage: self.components.read::<T>()?,
        })
    }

    /// Exclusive access to `T`'s storage.
    pub fn write<T: Component>(&self) -> Result<Write<'w, T>> {
        self.check::<T>(Mode::Write)?;
        Ok(Write {
            storage: self.components.write::<T>()?,
        })
    }

    /// Check whether `T` is registered.
    #[inline]
    pub fn is_registered<T: Component>(&self) -> bool {
        self.components.contains::<T>()
    }

    fn check<T: Component>(&self, mode: Mode) -> Result<()> {
        let Some(declared) = self.declared else {
            return Ok(());
        };

        let id = self.components.resolve::<T>()?;
        let allowed = match mode {
            Mode::Read => declared.allows_read(id),
            Mode::Write => declared.allows_write(id),
        };

        if allowed {
            Ok(())
        } else {
            Err(Error::UndeclaredAccess {
                component: type_name::<T>(),
                mode,
            })
        }
    }
}
