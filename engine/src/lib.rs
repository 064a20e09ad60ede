//! An entity/component runtime with a dependency-graph system scheduler.
//!
//! Entities are lightweight handles that aggregate typed components stored densely per type.
//! Systems are registered once per type and run each tick over a worker pool, honoring
//! explicit precedence edges and edges derived from declared component access.
//!
//! ```rust,ignore
//! use rusty_ecs::ecs::{Component, Context, System, World, Result};
//!
//! #[derive(Component, Default)]
//! struct Health(u32);
//!
//! struct Regen;
//!
//! impl System for Regen {
//!     fn run(&mut self, ctx: &Context<'_>) -> Result<()> {
//!         let mut health = ctx.write::<Health>()?;
//!         for value in health.iter_mut() {
//!             value.0 += 1;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut world = World::new();
//! world.register_component::<Health>()?;
//! world.create_entity().add_component::<Health>()?.build();
//! world.register_system(Regen)?;
//! world.run()?;
//! ```

// Lets the derive macros name `::rusty_ecs` from inside this crate.
extern crate self as rusty_ecs;

pub mod ecs;
pub mod tasks;
