use std::any::{TypeId, type_name};
use std::collections::HashMap;

use log::debug;
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::ecs::{
    component::{Component, Id},
    entity::Entity,
    error::{Error, Result},
    storage::{AnyStorage, Storage},
};

struct Slot {
    type_id: TypeId,
    name: &'static str,
    storage: RwLock<Box<dyn AnyStorage>>,
}

/// The component registry owned by a world.
///
/// Maps each registered type to its [`Id`] and its type-erased storage. Structural changes
/// (registration, cascading removal, clearing) need `&mut self`; typed access during a tick
/// goes through per-storage read/write locks so disjoint types never contend.
#[derive(Default)]
pub struct Components {
    slots: Vec<Slot>,
    by_type: HashMap<TypeId, Id>,
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `C` and create its empty storage.
    ///
    /// Fails with [`Error::DuplicateComponentType`] if `C` is already registered.
    pub fn register<C: Component>(&mut self) -> Result<Id> {
        let type_id = TypeId::of::<C>();
        if self.by_type.contains_key(&type_id) {
            return Err(Error::DuplicateComponentType {
                component: type_name::<C>(),
            });
        }

        let id = Id::from(self.slots.len());
        self.slots.push(Slot {
            type_id,
            name: type_name::<C>(),
            storage: RwLock::new(Box::new(Storage::<C>::new())),
        });
        self.by_type.insert(type_id, id);

        debug!("registered component {} as {:?}", type_name::<C>(), id);
        Ok(id)
    }

    /// The id of a registered `C`.
    #[inline]
    pub fn id<C: Component>(&self) -> Option<Id> {
        self.by_type.get(&TypeId::of::<C>()).copied()
    }

    /// The id of a registered `C`, or [`Error::UnknownComponentType`].
    #[inline]
    pub fn resolve<C: Component>(&self) -> Result<Id> {
        self.resolve_type(TypeId::of::<C>(), type_name::<C>())
    }

    /// Like [`Components::resolve`] for an erased type key. `name` is only used for the error.
    pub fn resolve_type(&self, type_id: TypeId, name: &'static str) -> Result<Id> {
        self.by_type
            .get(&type_id)
            .copied()
            .ok_or(Error::UnknownComponentType { component: name })
    }

    #[inline]
    pub fn contains<C: Component>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<C>())
    }

    /// Name of the component type registered as `id`.
    pub fn name(&self, id: Id) -> Option<&'static str> {
        self.slots.get(id.index()).map(|slot| slot.name)
    }

    /// Number of registered component types.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot<C: Component>(&self) -> Result<&Slot> {
        let id = self.resolve::<C>()?;
        Ok(&self.slots[id.index()])
    }

    /// Shared access to `C`'s storage, blocking while a writer holds it.
    ///
    /// Readers never queue behind a waiting writer, so a thread that already holds a read guard
    /// can take another one.
    pub fn read<C: Component>(&self) -> Result<MappedRwLockReadGuard<'_, Storage<C>>> {
        let slot = self.slot::<C>()?;
        Ok(RwLockReadGuard::map(slot.storage.read_recursive(), |storage| {
            downcast_ref::<C>(storage.as_ref())
        }))
    }

    /// Exclusive access to `C`'s storage, blocking while anyone else holds it.
    pub fn write<C: Component>(&self) -> Result<MappedRwLockWriteGuard<'_, Storage<C>>> {
        let slot = self.slot::<C>()?;
        Ok(RwLockWriteGuard::map(slot.storage.write(), |storage| {
            downcast_mut::<C>(storage.as_mut())
        }))
    }

    /// Exclusive access to `C`'s storage without locking.
    pub fn get_mut<C: Component>(&mut self) -> Result<&mut Storage<C>> {
        let id = self.resolve::<C>()?;
        let storage = self.slots[id.index()].storage.get_mut();
        Ok(downcast_mut::<C>(storage.as_mut()))
    }

    /// Drop every component `entity` owns, returning how many were removed.
    pub fn remove_all(&mut self, entity: Entity) -> usize {
        let mut removed = 0;
        for slot in &mut self.slots {
            if slot.storage.get_mut().discard(entity) {
                removed += 1;
            }
        }
        removed
    }

    /// Every registered type currently held by `entity`.
    pub fn types_of(&self, entity: Entity) -> Vec<&'static str> {
        self.slots
            .iter()
            .filter(|slot| slot.storage.read_recursive().has(entity))
            .map(|slot| slot.name)
            .collect()
    }

    /// Iterate over registered types as `(id, type id, name)`.
    pub fn iter(&self) -> impl Iterator<Item = (Id, TypeId, &'static str)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| (Id::from(index), slot.type_id, slot.name))
    }

    /// Forget every component type and drop every storage.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_type.clear();
    }
}

// Storages are only ever inserted under their own `TypeId`.
fn downcast_ref<C: Component>(storage: &dyn AnyStorage) -> &Storage<C> {
    storage
        .as_any()
        .downcast_ref::<Storage<C>>()
        .expect("component storage registered under a mismatched type")
}

fn downcast_mut<C: Component>(storage: &mut dyn AnyStorage) -> &mut Storage<C> {
    storage
        .as_any_mut()
        .downcast_mut::<Storage<C>>()
        .expect("component storage registered under a mismatched type")
}
