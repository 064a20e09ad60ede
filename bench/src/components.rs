//! Component types shared by the scenarios and the microbenchmarks.
//!
//! Sizes are pinned by a test so that throughput numbers stay comparable between runs.

use rusty_ecs::ecs::{Result, World};
use rusty_ecs_macros::Component;

// =============================================================================
// Transform Components
// =============================================================================

/// 3D position component (12 bytes).
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// 3D velocity component (12 bytes).
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// 3D acceleration component (12 bytes).
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct Acceleration {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// 4x4 transformation matrix (64 bytes).
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub matrix: [[f32; 4]; 4],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            matrix: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }
}

// =============================================================================
// Particle Components
// =============================================================================

/// Particle lifetime tracking.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct Lifetime {
    pub remaining: f32,
    pub total: f32,
}

/// RGBA color (16 bytes).
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Shared data component for storage microbenchmarks.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct Data {
    pub value: f64,
}

/// Register every transform component on `world`.
pub fn register_transform(world: &mut World) -> Result<()> {
    world.register_component::<Position>()?;
    world.register_component::<Velocity>()?;
    world.register_component::<Acceleration>()?;
    world.register_component::<Transform>()
}

/// Register every particle component on `world`.
pub fn register_particle(world: &mut World) -> Result<()> {
    world.register_component::<Position>()?;
    world.register_component::<Velocity>()?;
    world.register_component::<Lifetime>()?;
    world.register_component::<Color>()
}

// =============================================================================
// Component Size Reference
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn component_sizes_are_stable() {
        assert_eq!(size_of::<Position>(), 12);
        assert_eq!(size_of::<Velocity>(), 12);
        assert_eq!(size_of::<Acceleration>(), 12);
        assert_eq!(size_of::<Transform>(), 64);

        assert_eq!(size_of::<Lifetime>(), 8);
        assert_eq!(size_of::<Color>(), 16);

        assert_eq!(size_of::<Data>(), 8);
    }

    #[test]
    fn register_helpers_register_everything() {
        let mut world = World::new();

        register_transform(&mut world).unwrap();

        assert!(world.is_registered::<Position>());
        assert!(world.is_registered::<Transform>());
        assert!(!world.is_registered::<Lifetime>());
    }
}
