//! The World is the central container for all entities, components, and systems in the ECS.
//!
//! A `World` manages the lifecycle of entities and their component data, owns the registered
//! systems, and runs them once per call to [`World::run`].
//!
//! # Architecture
//!
//! The World coordinates several subsystems:
//! - **Entity Table**: existence bitmap and generations, lowest-free-slot reuse
//! - **Component Registry**: one dense storage per registered component type
//! - **Scheduler**: registered systems and their dependency graph
//! - **Executor**: the worker pool systems and their subflows run on
//!
//! Structural operations take `&mut self`, so nothing can create or destroy entities, register
//! types or systems, or reset the world while a tick is running.
//!
//! # Example
//!
//! ```ignore
//! use rusty_ecs::ecs::World;
//!
//! let mut world = World::new();
//! world.register_component::<Position>()?;
//! world.register_component::<Velocity>()?;
//!
//! let entity = world
//!     .create_entity()
//!     .add_component::<Position>()?
//!     .add_component::<Velocity>()?
//!     .build();
//!
//! world.register_system(Movement { dt: 1.0 })?;
//! world.run()?;
//!
//! world.destroy_entity(entity)?;
//! ```

mod builder;
mod config;

use std::any::type_name;

use log::debug;
use parking_lot::MappedRwLockReadGuard;

pub use builder::EntityBuilder;
pub use config::Config;

use crate::{
    ecs::{
        Component,
        component::Components,
        entity::{Entity, Table},
        error::{Error, Result},
        query::{EntityQuery, EntitySet},
        schedule::{Scheduler, State},
        storage::Storage,
        system::{ComponentAccess, Read, System},
    },
    tasks::Executor,
};

/// Shared access to one entity's component, held until the guard is dropped.
pub type Ref<'w, C> = MappedRwLockReadGuard<'w, C>;

/// The World is the central container for all entities, components, and systems.
///
/// Each world is isolated from other worlds: component and system registrations, entity ids
/// and the worker pool all belong to one world.
pub struct World {
    config: Config,
    entities: Table,
    components: Components,
    scheduler: Scheduler,
    executor: Executor,
}

impl World {
    /// Create a world with the default [`Config`].
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// # Panics
    ///
    /// Panics if `config.worker_threads` or `config.entity_block_size` is 0.
    pub fn with_config(config: Config) -> Self {
        debug!(
            "creating world with {} worker(s), entity blocks of {}",
            config.worker_threads, config.entity_block_size
        );
        Self {
            entities: Table::with_block_size(config.entity_block_size),
            components: Components::new(),
            scheduler: Scheduler::new(),
            executor: Executor::new(config.worker_threads),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register component type `C`.
    ///
    /// Fails with [`Error::DuplicateComponentType`] if `C` is already registered.
    pub fn register_component<C: Component>(&mut self) -> Result<()> {
        self.components.register::<C>().map(|_| ())
    }

    /// Check whether `C` is registered.
    #[inline]
    pub fn is_registered<C: Component>(&self) -> bool {
        self.components.contains::<C>()
    }

    /// Create a live entity in the lowest free slot and return a builder to add components.
    pub fn create_entity(&mut self) -> EntityBuilder<'_> {
        let entity = self.entities.alloc();
        EntityBuilder::new(self, entity)
    }

    /// Destroy `entity` and every component it owns. Its slot is free for reuse.
    ///
    /// Fails with [`Error::InvalidEntity`] if `entity` is not alive.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<()> {
        self.validate(entity)?;
        let removed = self.components.remove_all(entity);
        self.entities.free(entity);
        debug!("destroyed entity {entity} with {removed} component(s)");
        Ok(())
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    #[inline]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    fn validate(&self, entity: Entity) -> Result<()> {
        if self.entities.is_alive(entity) {
            Ok(())
        } else {
            Err(Error::InvalidEntity { entity })
        }
    }

    /// Add a default `C` to `entity`.
    pub fn add_component<C: Component + Default>(&mut self, entity: Entity) -> Result<&mut C> {
        self.validate(entity)?;
        self.components.get_mut::<C>()?.add(entity)
    }

    /// Add `value` to `entity`.
    pub fn insert_component<C: Component>(&mut self, entity: Entity, value: C) -> Result<&mut C> {
        self.validate(entity)?;
        self.components.get_mut::<C>()?.insert(entity, value)
    }

    /// Shared access to `entity`'s `C`.
    pub fn get_component<C: Component>(&self, entity: Entity) -> Result<Ref<'_, C>> {
        self.validate(entity)?;
        let storage = self.components.read::<C>()?;
        MappedRwLockReadGuard::try_map(storage, |storage| storage.get(entity).ok()).map_err(|_| {
            Error::MissingComponent {
                entity,
                component: type_name::<C>(),
            }
        })
    }

    /// Exclusive access to `entity`'s `C`.
    pub fn get_component_mut<C: Component>(&mut self, entity: Entity) -> Result<&mut C> {
        self.validate(entity)?;
        self.components.get_mut::<C>()?.get_mut(entity)
    }

    /// Check whether `entity` has a `C`.
    pub fn has_component<C: Component>(&self, entity: Entity) -> Result<bool> {
        self.validate(entity)?;
        Ok(self.components.read::<C>()?.contains(entity))
    }

    /// Remove and return `entity`'s `C`.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> Result<C> {
        self.validate(entity)?;
        self.components.get_mut::<C>()?.remove(entity)
    }

    /// Number of `C` components in the world.
    pub fn component_count<C: Component>(&self) -> Result<usize> {
        Ok(self.components.read::<C>()?.len())
    }

    /// Shared access to every `C`, indexable by dense row.
    pub fn storage<C: Component>(&self) -> Result<Read<'_, C>> {
        ComponentAccess::new(&self.components, None).read::<C>()
    }

    /// Exclusive access to every `C`, indexable by dense row.
    pub fn storage_mut<C: Component>(&mut self) -> Result<&mut Storage<C>> {
        self.components.get_mut::<C>()
    }

    /// A view of the live entities.
    #[inline]
    pub fn query(&self) -> EntityQuery<'_> {
        EntityQuery::new(&self.entities)
    }

    /// Snapshot of every live entity, in ascending id order.
    #[inline]
    pub fn entities(&self) -> EntitySet {
        self.query().all()
    }

    /// Register `system` as the only instance of its type.
    ///
    /// Fails with [`Error::DuplicateSystemType`] if a system of the same type is registered.
    pub fn register_system<S: System>(&mut self, system: S) -> Result<()> {
        self.scheduler.register(system)
    }

    /// Require system `A` to finish before system `B` starts on every tick.
    pub fn precede<A: System, B: System>(&mut self) -> Result<()> {
        self.scheduler.precede::<A, B>()
    }

    #[inline]
    pub fn has_system<S: System>(&self) -> bool {
        self.scheduler.contains::<S>()
    }

    #[inline]
    pub fn system_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Run one tick: every registered system once, blocking until all have finished.
    pub fn run(&mut self) -> Result<()> {
        let Self {
            entities,
            components,
            scheduler,
            executor,
            ..
        } = self;
        scheduler.run(components, entities, executor)
    }

    /// Number of ticks completed successfully since creation or the last reset.
    #[inline]
    pub fn tick(&self) -> u64 {
        self.scheduler.tick()
    }

    #[inline]
    pub fn schedule_state(&self) -> State {
        self.scheduler.state()
    }

    /// Drop every entity, component type and system. The worker pool is kept.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.components.clear();
        self.scheduler.clear();
        debug!("world reset");
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
