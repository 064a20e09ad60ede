//! Rigid-body integration over a large, stable population.
//!
//! Each tick integrates acceleration into velocity and velocity into position, clamps bodies to
//! a cube, and rebuilds every transform matrix in a subflow. No explicit edges are registered:
//! the chain is ordered purely by the access each system declares.

use crate::components::{self, Acceleration, Position, Transform, Velocity};
use crate::scenarios::Scenario;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rusty_ecs::ecs::{Config, Context, Declare, Entity, Result, System, World};

const BOUNDS: f32 = 1000.0;
const RESTITUTION: f32 = 0.8;

/// Knobs for [`PhysicsScenario`].
pub struct PhysicsConfig {
    /// Bodies spawned by `setup`.
    pub body_count: usize,
    /// Seconds advanced per tick.
    pub delta_time: f32,
    /// Seed for initial velocities.
    pub seed: u64,
    /// Size of the world's worker pool.
    pub executor_threads: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            body_count: 50_000,
            delta_time: 1.0 / 120.0,
            seed: 99999,
            executor_threads: 8,
        }
    }
}

/// `v += a * dt`.
struct IntegrateAcceleration {
    dt: f32,
}

impl System for IntegrateAcceleration {
    fn run(&mut self, ctx: &Context<'_>) -> Result<()> {
        let accelerations = ctx.read::<Acceleration>()?;
        let mut velocities = ctx.write::<Velocity>()?;
        for (entity, vel) in velocities.entries_mut() {
            let Ok(accel) = accelerations.get(entity) else {
                continue;
            };
            vel.x += accel.x * self.dt;
            vel.y += accel.y * self.dt;
            vel.z += accel.z * self.dt;
        }
        Ok(())
    }

    fn access(&self) -> Option<Declare> {
        Some(Declare::new().read::<Acceleration>().write::<Velocity>())
    }
}

/// `p += v * dt`.
struct IntegrateVelocity {
    dt: f32,
}

impl System for IntegrateVelocity {
    fn run(&mut self, ctx: &Context<'_>) -> Result<()> {
        let velocities = ctx.read::<Velocity>()?;
        let mut positions = ctx.write::<Position>()?;
        for (entity, pos) in positions.entries_mut() {
            let Ok(vel) = velocities.get(entity) else {
                continue;
            };
            pos.x += vel.x * self.dt;
            pos.y += vel.y * self.dt;
            pos.z += vel.z * self.dt;
        }
        Ok(())
    }

    fn access(&self) -> Option<Declare> {
        Some(Declare::new().read::<Velocity>().write::<Position>())
    }
}

/// Rebuilds each body's transform from its position, one subflow task per chunk of rows.
struct UpdateTransforms;

impl System for UpdateTransforms {
    fn run(&mut self, ctx: &Context<'_>) -> Result<()> {
        let positions = ctx.read::<Position>()?;
        let mut transforms = ctx.write::<Transform>()?;

        let owners = transforms.entities().to_vec();
        let chunk_size = (owners.len() / ctx.subflow().workers()).max(1024);
        let positions = &*positions;

        ctx.subflow().scope(|s| {
            let chunks = transforms
                .values_mut()
                .chunks_mut(chunk_size)
                .zip(owners.chunks(chunk_size));
            for (values, owners) in chunks {
                s.spawn(move || {
                    for (transform, &entity) in values.iter_mut().zip(owners) {
                        if let Ok(pos) = positions.get(entity) {
                            update_transform(transform, pos);
                        }
                    }
                });
            }
        });
        Ok(())
    }

    fn access(&self) -> Option<Declare> {
        Some(Declare::new().read::<Position>().write::<Transform>())
    }
}

fn update_transform(transform: &mut Transform, pos: &Position) {
    let m = &mut transform.matrix;
    for (row, offset) in [pos.x, pos.y, pos.z].into_iter().enumerate() {
        m[row][3] = offset;
    }

    // Keep the diagonal at unit length.
    let norm = (0..3).map(|i| m[i][i] * m[i][i]).sum::<f32>().sqrt();
    if norm > 0.0 {
        for i in 0..3 {
            m[i][i] /= norm;
        }
    }
}

/// Clamps bodies to `±BOUNDS` and reflects the offending velocity axis with some damping.
struct EnforceBoundaries;

impl System for EnforceBoundaries {
    fn run(&mut self, ctx: &Context<'_>) -> Result<()> {
        let mut positions = ctx.write::<Position>()?;
        let mut velocities = ctx.write::<Velocity>()?;
        for (entity, pos) in positions.entries_mut() {
            let Ok(vel) = velocities.get_mut(entity) else {
                continue;
            };
            if pos.x.abs() > BOUNDS {
                pos.x = pos.x.signum() * BOUNDS;
                vel.x *= -RESTITUTION;
            }
            if pos.y.abs() > BOUNDS {
                pos.y = pos.y.signum() * BOUNDS;
                vel.y *= -RESTITUTION;
            }
            if pos.z.abs() > BOUNDS {
                pos.z = pos.z.signum() * BOUNDS;
                vel.z *= -RESTITUTION;
            }
        }
        Ok(())
    }

    fn access(&self) -> Option<Declare> {
        Some(Declare::new().write::<Position>().write::<Velocity>())
    }
}

/// Fixed population of bodies stepped by four declared systems.
pub struct PhysicsScenario {
    config: PhysicsConfig,
    world: World,
    rng: ChaCha8Rng,
    bodies: Vec<Entity>,
}

impl PhysicsScenario {
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    pub fn with_config(config: PhysicsConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            world: World::with_config(
                Config::default().with_worker_threads(config.executor_threads),
            ),
            bodies: Vec::new(),
            config,
        }
    }

    fn spawn_body(&mut self) -> Result<Entity> {
        let pos = Position {
            x: self.rng.gen_range(-BOUNDS..BOUNDS),
            y: self.rng.gen_range(-BOUNDS..BOUNDS),
            z: self.rng.gen_range(-BOUNDS..BOUNDS),
        };
        let vel = Velocity {
            x: self.rng.gen_range(-10.0..10.0),
            y: self.rng.gen_range(-10.0..10.0),
            z: self.rng.gen_range(-10.0..10.0),
        };
        let accel = Acceleration {
            x: 0.0,
            y: -9.81, // Gravity
            z: 0.0,
        };

        Ok(self
            .world
            .create_entity()
            .with(pos)?
            .with(vel)?
            .with(accel)?
            .add_component::<Transform>()?
            .build())
    }

    /// Bodies currently alive.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// The simulated world.
    pub fn world(&self) -> &World {
        &self.world
    }
}

impl Default for PhysicsScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for PhysicsScenario {
    fn name(&self) -> &'static str {
        "physics"
    }

    fn description(&self) -> &'static str {
        "Declared-access integration chain with a parallel transform pass"
    }

    fn entity_count(&self) -> usize {
        self.config.body_count
    }

    fn setup(&mut self) -> Result<()> {
        components::register_transform(&mut self.world)?;

        self.bodies = Vec::with_capacity(self.config.body_count);
        for _ in 0..self.config.body_count {
            let entity = self.spawn_body()?;
            self.bodies.push(entity);
        }

        let dt = self.config.delta_time;
        self.world.register_system(IntegrateAcceleration { dt })?;
        self.world.register_system(IntegrateVelocity { dt })?;
        self.world.register_system(UpdateTransforms)?;
        self.world.register_system(EnforceBoundaries)
    }

    fn update(&mut self) -> Result<()> {
        self.world.run()
    }

    fn teardown(&mut self) -> Result<()> {
        for entity in self.bodies.drain(..) {
            self.world.destroy_entity(entity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> PhysicsScenario {
        PhysicsScenario::with_config(PhysicsConfig {
            body_count: 100,
            executor_threads: 2,
            ..Default::default()
        })
    }

    #[test]
    fn physics_scenario_setup() {
        let mut scenario = small();

        scenario.setup().unwrap();
        assert_eq!(scenario.body_count(), 100);
        assert_eq!(scenario.world().entity_count(), 100);
        assert_eq!(scenario.world().system_count(), 4);

        scenario.teardown().unwrap();
        assert_eq!(scenario.body_count(), 0);
        assert_eq!(scenario.world().entity_count(), 0);
        assert_eq!(scenario.world().component_count::<Transform>().unwrap(), 0);
    }

    #[test]
    fn physics_scenario_update() {
        // Given
        let mut scenario = small();
        scenario.setup().unwrap();

        // When - run physics for a few frames
        for _ in 0..60 {
            scenario.update().unwrap();
        }

        // Then - every body stayed in bounds and got a translated transform
        assert_eq!(scenario.world().tick(), 60);
        let positions = scenario.world().storage::<Position>().unwrap();
        assert_eq!(positions.len(), 100);
        assert!(positions.iter().all(|p| {
            p.x.abs() <= BOUNDS && p.y.abs() <= BOUNDS && p.z.abs() <= BOUNDS
        }));
        let transforms = scenario.world().storage::<Transform>().unwrap();
        assert!(transforms.iter().any(|t| t.matrix[1][3] != 0.0));
        drop((positions, transforms));

        scenario.teardown().unwrap();
    }

    #[test]
    fn gravity_pulls_velocity_down() {
        let mut scenario = small();
        scenario.setup().unwrap();
        let body = scenario.bodies[0];
        let before = scenario.world().get_component::<Velocity>(body).unwrap().y;

        scenario.update().unwrap();

        let after = scenario.world().get_component::<Velocity>(body).unwrap().y;
        // Either gravity was applied, or the body bounced off a wall.
        assert!(after < before || after.abs() < before.abs());
    }
}
