//! Moves a field of particles for a few ticks.
//!
//! Three systems share the world each tick:
//! - `Accelerate` nudges velocities, splitting the work across a subflow
//! - `Integrate` moves positions by velocity, declared to write `Position`
//! - `Report` counts what moved, ordered after `Integrate`

use rusty_ecs::ecs::{Config, Context, Declare, Result, System, World};
use rusty_ecs_macros::Component;

const PARTICLES: usize = 1_000;
const TICKS: usize = 5;

#[derive(Component, Debug, Default, Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Component, Debug, Default, Clone, Copy)]
struct Velocity {
    x: f32,
    y: f32,
}

struct Accelerate {
    gravity: f32,
}

impl System for Accelerate {
    fn run(&mut self, ctx: &Context<'_>) -> Result<()> {
        let mut velocities = ctx.write::<Velocity>()?;
        let gravity = self.gravity;
        ctx.subflow()
            .par_chunks_mut(velocities.values_mut(), 128, |chunk| {
                for velocity in chunk {
                    velocity.y -= gravity;
                }
            });
        Ok(())
    }

    fn access(&self) -> Option<Declare> {
        Some(Declare::new().write::<Velocity>())
    }
}

struct Integrate {
    dt: f32,
}

impl System for Integrate {
    fn run(&mut self, ctx: &Context<'_>) -> Result<()> {
        let velocities = ctx.read::<Velocity>()?;
        let mut positions = ctx.write::<Position>()?;
        for entity in ctx.query().all().into_filter(|e| velocities.contains(*e)) {
            let velocity = *velocities.get(entity)?;
            let position = positions.get_mut(entity)?;
            position.x += self.dt * velocity.x;
            position.y += self.dt * velocity.y;
        }
        Ok(())
    }

    fn access(&self) -> Option<Declare> {
        Some(Declare::new().read::<Velocity>().write::<Position>())
    }
}

struct Report;

impl System for Report {
    fn run(&mut self, ctx: &Context<'_>) -> Result<()> {
        let positions = ctx.read::<Position>()?;
        let below = positions.iter().filter(|p| p.y < 0.0).count();
        let lowest = positions.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        println!(
            "tick {}: {below}/{} particles below the origin, lowest at {lowest:.2}",
            ctx.tick() + 1,
            positions.len()
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    let mut world = World::with_config(Config::default().with_entity_block_size(256));
    world.register_component::<Position>()?;
    world.register_component::<Velocity>()?;

    for i in 0..PARTICLES {
        let spread = i as f32 / PARTICLES as f32;
        let builder = world.create_entity().with(Position { x: spread, y: 0.0 })?;
        // Every fourth particle stays put.
        if i % 4 != 0 {
            builder.with(Velocity {
                x: 1.0 - spread,
                y: spread,
            })?;
        }
    }

    world.register_system(Accelerate { gravity: 0.25 })?;
    world.register_system(Integrate { dt: 0.5 })?;
    world.register_system(Report)?;
    world.precede::<Integrate, Report>()?;

    for _ in 0..TICKS {
        world.run()?;
    }

    println!(
        "{} ticks over {} entities on {} worker(s)",
        world.tick(),
        world.entity_count(),
        world.config().worker_threads
    );
    Ok(())
}
