//! A large, short-lived particle population.
//!
//! Three systems move particles, age them and fade their color. Between ticks every particle
//! whose lifetime ran out is destroyed and replaced, so the entity table keeps recycling slots.

use crate::components::{self, Color, Lifetime, Position, Velocity};
use crate::scenarios::Scenario;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rusty_ecs::ecs::{Config, Context, Declare, Entity, Result, System, World};

/// Knobs for [`ParticleScenario`].
pub struct ParticleConfig {
    /// Population kept alive across ticks.
    pub particle_count: usize,
    /// Seconds advanced per tick.
    pub delta_time: f32,
    /// Seed for spawn positions, velocities and lifetimes.
    pub seed: u64,
    /// Size of the world's worker pool.
    pub executor_threads: usize,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            particle_count: 100_000,
            delta_time: 1.0 / 60.0, // 60 FPS
            seed: 12345,
            executor_threads: 4,
        }
    }
}

struct ParticleFactory(ChaCha8Rng);

impl ParticleFactory {
    fn spawn(&mut self, world: &mut World) -> Result<Entity> {
        let rng = &mut self.0;
        let pos = Position {
            x: rng.gen_range(-100.0..100.0),
            y: rng.gen_range(-100.0..100.0),
            z: rng.gen_range(-100.0..100.0),
        };
        let vel = Velocity {
            x: rng.gen_range(-10.0..10.0),
            y: rng.gen_range(-10.0..10.0),
            z: rng.gen_range(-10.0..10.0),
        };
        let lifetime = Lifetime {
            remaining: rng.gen_range(1.0..5.0),
            total: 5.0,
        };
        let color = Color {
            r: rng.gen_range(0.0..1.0),
            g: rng.gen_range(0.0..1.0),
            b: rng.gen_range(0.0..1.0),
            a: 1.0,
        };

        Ok(world
            .create_entity()
            .with(pos)?
            .with(vel)?
            .with(lifetime)?
            .with(color)?
            .build())
    }
}

/// `p += v * dt`, chunked across a subflow.
struct Movement {
    dt: f32,
}

impl System for Movement {
    fn run(&mut self, ctx: &Context<'_>) -> Result<()> {
        let velocities = ctx.read::<Velocity>()?;
        let mut positions = ctx.write::<Position>()?;

        let owners = positions.entities().to_vec();
        let chunk_size = (owners.len() / ctx.subflow().workers()).max(4096);
        let velocities = &*velocities;
        let dt = self.dt;

        ctx.subflow().scope(|s| {
            let chunks = positions
                .values_mut()
                .chunks_mut(chunk_size)
                .zip(owners.chunks(chunk_size));
            for (values, owners) in chunks {
                s.spawn(move || {
                    for (pos, &entity) in values.iter_mut().zip(owners) {
                        if let Ok(vel) = velocities.get(entity) {
                            pos.x += vel.x * dt;
                            pos.y += vel.y * dt;
                            pos.z += vel.z * dt;
                        }
                    }
                });
            }
        });
        Ok(())
    }

    fn access(&self) -> Option<Declare> {
        Some(Declare::new().read::<Velocity>().write::<Position>())
    }
}

/// Counts every lifetime down by `dt`.
struct LifetimeDecay {
    dt: f32,
}

impl System for LifetimeDecay {
    fn run(&mut self, ctx: &Context<'_>) -> Result<()> {
        for lifetime in ctx.write::<Lifetime>()?.iter_mut() {
            lifetime.remaining -= self.dt;
        }
        Ok(())
    }

    fn access(&self) -> Option<Declare> {
        Some(Declare::new().write::<Lifetime>())
    }
}

/// Sets alpha to the fraction of lifetime left.
struct Fade;

impl System for Fade {
    fn run(&mut self, ctx: &Context<'_>) -> Result<()> {
        let lifetimes = ctx.read::<Lifetime>()?;
        let mut colors = ctx.write::<Color>()?;
        for (entity, color) in colors.entries_mut() {
            if let Ok(lifetime) = lifetimes.get(entity) {
                color.a = (lifetime.remaining / lifetime.total).max(0.0);
            }
        }
        Ok(())
    }

    fn access(&self) -> Option<Declare> {
        Some(Declare::new().read::<Lifetime>().write::<Color>())
    }
}

/// Keeps `particle_count` particles alive, replacing the dead after each tick.
pub struct ParticleScenario {
    config: ParticleConfig,
    world: World,
    factory: ParticleFactory,
    respawned: usize,
}

impl ParticleScenario {
    pub fn new() -> Self {
        Self::with_config(ParticleConfig::default())
    }

    pub fn with_config(config: ParticleConfig) -> Self {
        Self {
            world: World::with_config(
                Config::default().with_worker_threads(config.executor_threads),
            ),
            factory: ParticleFactory(ChaCha8Rng::seed_from_u64(config.seed)),
            respawned: 0,
            config,
        }
    }

    /// Particles currently alive.
    pub fn current_count(&self) -> usize {
        self.world.entity_count()
    }

    /// Total number of particles replaced after dying.
    pub fn respawned(&self) -> usize {
        self.respawned
    }

    /// The simulated world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Destroy dead particles (lifetime <= 0) and replace each with a fresh one.
    fn respawn_dead(&mut self) -> Result<()> {
        let dead = {
            let lifetimes = self.world.storage::<Lifetime>()?;
            self.world
                .query()
                .filter(|entity| lifetimes.get(*entity).is_ok_and(|l| l.remaining <= 0.0))
        };

        for entity in &dead {
            self.world.destroy_entity(*entity)?;
        }
        for _ in 0..dead.len() {
            self.factory.spawn(&mut self.world)?;
        }
        self.respawned += dead.len();
        Ok(())
    }
}

impl Default for ParticleScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for ParticleScenario {
    fn name(&self) -> &'static str {
        "particles"
    }

    fn description(&self) -> &'static str {
        "Many short-lived particles with per-tick destroy and respawn"
    }

    fn entity_count(&self) -> usize {
        self.config.particle_count
    }

    fn setup(&mut self) -> Result<()> {
        components::register_particle(&mut self.world)?;

        for _ in 0..self.config.particle_count {
            self.factory.spawn(&mut self.world)?;
        }

        let dt = self.config.delta_time;
        self.world.register_system(Movement { dt })?;
        self.world.register_system(LifetimeDecay { dt })?;
        self.world.register_system(Fade)?;
        self.world.precede::<LifetimeDecay, Fade>()
    }

    fn update(&mut self) -> Result<()> {
        self.world.run()?;
        self.respawn_dead()
    }

    fn teardown(&mut self) -> Result<()> {
        for entity in self.world.entities() {
            self.world.destroy_entity(entity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(delta_time: f32) -> ParticleScenario {
        ParticleScenario::with_config(ParticleConfig {
            particle_count: 100,
            delta_time,
            executor_threads: 2,
            ..Default::default()
        })
    }

    #[test]
    fn particle_scenario_setup() {
        let mut scenario = small(1.0 / 60.0);

        scenario.setup().unwrap();
        assert_eq!(scenario.current_count(), 100);

        scenario.teardown().unwrap();
        assert_eq!(scenario.current_count(), 0);
        assert_eq!(scenario.world().component_count::<Position>().unwrap(), 0);
    }

    #[test]
    fn particle_scenario_update() {
        let mut scenario = small(1.0 / 60.0);
        scenario.setup().unwrap();

        // Run a few frames, nothing lives less than a second
        for _ in 0..10 {
            scenario.update().unwrap();
        }

        assert_eq!(scenario.current_count(), 100);
        assert_eq!(scenario.respawned(), 0);
        assert_eq!(scenario.world().tick(), 10);

        scenario.teardown().unwrap();
    }

    #[test]
    fn dead_particles_are_replaced() {
        // Given - one second per frame, lifetimes are at most five seconds
        let mut scenario = small(1.0);
        scenario.setup().unwrap();

        // When
        for _ in 0..6 {
            scenario.update().unwrap();
        }

        // Then - the population is stable and freed slots were reused
        assert!(scenario.respawned() >= 100);
        assert_eq!(scenario.current_count(), 100);
        assert_eq!(scenario.world().component_count::<Lifetime>().unwrap(), 100);
        assert!(
            scenario
                .world()
                .entities()
                .iter()
                .all(|entity| entity.index() < 100)
        );
    }

    #[test]
    fn fade_tracks_lifetime() {
        let mut scenario = small(0.5);
        scenario.setup().unwrap();

        scenario.update().unwrap();

        let lifetimes = scenario.world().storage::<Lifetime>().unwrap();
        let colors = scenario.world().storage::<Color>().unwrap();
        for (entity, color) in colors.entries() {
            let lifetime = lifetimes.get(entity).unwrap();
            assert_eq!(color.a, (lifetime.remaining / lifetime.total).max(0.0));
        }
    }
}
