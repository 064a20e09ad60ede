//! Benchmarks for the `rusty_ecs` runtime.
//!
//! Two Criterion suites live under `benches/`:
//!
//! - `ecs_micro`: single operations measured in isolation (entity churn, storage access,
//!   queries, one scheduled tick)
//! - `ecs_scenarios`: whole workloads (particles, physics) stepped through
//!   [`World::run`](rusty_ecs::ecs::World::run)
//!
//! ```bash
//! cargo bench -p rusty_ecs_bench
//! cargo bench -p rusty_ecs_bench --bench ecs_micro -- entity
//! ```

pub mod components;
pub mod scenarios;
