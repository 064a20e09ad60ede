use crate::ecs::{Component, entity::Entity, error::Result, world::World};

/// Chainable component setup for a freshly created entity.
///
/// The entity is already live when the builder is handed out, so dropping the builder without
/// calling [`EntityBuilder::build`] still leaves it in the world.
///
/// ```rust,ignore
/// let entity = world
///     .create_entity()
///     .add_component::<Position>()?
///     .with(Velocity { x: 1.0, y: 0.0 })?
///     .build();
/// ```
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    entity: Entity,
}

impl<'w> EntityBuilder<'w> {
    pub(crate) fn new(world: &'w mut World, entity: Entity) -> Self {
        Self { world, entity }
    }

    /// Add a default `C`.
    pub fn add_component<C: Component + Default>(self) -> Result<Self> {
        self.world.add_component::<C>(self.entity)?;
        Ok(self)
    }

    /// Add `value`.
    pub fn with<C: Component>(self, value: C) -> Result<Self> {
        self.world.insert_component(self.entity, value)?;
        Ok(self)
    }

    /// The entity being built.
    #[inline]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    #[inline]
    pub fn build(self) -> Entity {
        self.entity
    }
}
