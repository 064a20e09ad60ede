//! Whole-world workloads driven tick by tick.
//!
//! - **Particles**: high entity count, short lifetimes, constant entity churn
//! - **Physics**: chained integration systems ordered by declared access

pub mod particles;
pub mod physics;

pub use particles::{ParticleConfig, ParticleScenario};
pub use physics::{PhysicsConfig, PhysicsScenario};

use rusty_ecs::ecs::Result;

/// A workload the scenario benchmarks can set up, step and tear down.
pub trait Scenario {
    /// Short label used in reports.
    fn name(&self) -> &'static str;

    /// One line on what the workload stresses.
    fn description(&self) -> &'static str;

    /// Live entities right now.
    fn entity_count(&self) -> usize;

    /// Register components and systems and spawn the initial population.
    fn setup(&mut self) -> Result<()>;

    /// Advance one tick.
    fn update(&mut self) -> Result<()>;

    /// Destroy every entity the scenario spawned.
    fn teardown(&mut self) -> Result<()>;
}
