//! # DROUGHTSIM
//!
//! Predator-prey ecosystem simulator with stochastic drought.
//!
//! ## Features
//!
//! - **Two engines**: a spatial grid of individual prey/predator agents, or
//!   scalar Lotka-Volterra populations coupled to a resource pool
//! - **Drought**: random onsets that ratchet up and decay, drying soil and
//!   shrinking vegetation or resource capacity
//! - **Reproducible**: one seeded generator per run, byte-identical output
//! - **Configurable**: YAML configuration files
//! - **Recorded**: CSV time series, JSON summary and a cross-run index
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use droughtsim::{Config, CsvRecordSink, RunManager};
//!
//! let config = Config::default();
//! let mut run = RunManager::new(config, CsvRecordSink::new("output"));
//!
//! let summary = run.run_headless().unwrap();
//! println!("Prey: {:.2}, predators: {:.2}", summary.prey, summary.predators);
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use droughtsim::config::{Config, SimulationMode};
//!
//! let mut config = Config::default();
//! config.run.mode = SimulationMode::Grid;
//! config.grid.initial_prey = 50;
//! config.drought.chance = 0.02;
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Stepping a world directly
//!
//! ```rust
//! use droughtsim::{Config, World};
//!
//! let mut world = World::new(Config::default());
//! world.run(100);
//! assert!(world.census().prey >= 0.0);
//! ```

pub mod agent;
pub mod config;
pub mod ecology;
pub mod grid;
pub mod memory_monitor;
pub mod record;
pub mod rng;
pub mod run;
pub mod scheduler;
pub mod stats;
pub mod world;

// Re-export main types
pub use config::{Config, SimulationMode};
pub use record::{CsvRecordSink, MemoryRecordSink, RecordSink};
pub use run::{EndReason, RunError, RunManager, RunState};
pub use stats::{Census, RunSummary};
pub use world::World;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a quick benchmark.
///
/// `population` seeds the grid with that many prey and a fifth as many
/// predators; the aggregate engine ignores it.
pub fn benchmark(
    steps: u64,
    mode: SimulationMode,
    population: usize,
) -> Result<BenchmarkResult, RunError> {
    use std::time::Instant;

    let mut config = Config::default();
    config.run.mode = mode;
    config.run.max_steps = steps;
    config.run.run_id = "benchmark".to_string();
    config.grid.width = 64;
    config.grid.height = 64;
    config.grid.initial_prey = population;
    config.grid.initial_predators = population / 5;
    config.grid.max_agents = config.grid.max_agents.max(population * 4);

    let initial = World::new(config.clone()).census();
    let mut run = RunManager::new(config, MemoryRecordSink::new());

    let start = Instant::now();
    let summary = run.run_headless()?;
    let elapsed = start.elapsed();

    Ok(BenchmarkResult {
        steps: summary.steps,
        mode,
        initial,
        final_census: run.world().map(World::census).unwrap_or_default(),
        elapsed_secs: elapsed.as_secs_f64(),
        steps_per_second: summary.steps as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    })
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub steps: u64,
    pub mode: SimulationMode,
    pub initial: Census,
    pub final_census: Census,
    pub elapsed_secs: f64,
    pub steps_per_second: f64,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Mode: {}", self.mode.name())?;
        writeln!(f, "Steps: {}", self.steps)?;
        writeln!(f, "Prey: {:.2} -> {:.2}", self.initial.prey, self.final_census.prey)?;
        writeln!(
            f,
            "Predators: {:.2} -> {:.2}",
            self.initial.predators, self.final_census.predators
        )?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} steps/s", self.steps_per_second)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_quick_simulation() {
        let mut world = World::new(Config::default());
        world.run(100);
        assert_eq!(world.time, 100);
    }

    #[test]
    fn test_benchmark() {
        let result = benchmark(100, SimulationMode::Aggregate, 0).unwrap();
        assert_eq!(result.steps, 100);
        assert!(result.steps_per_second > 0.0);
        assert_eq!(result.initial.prey, 100.0);
    }

    #[test]
    fn test_grid_benchmark() {
        let result = benchmark(20, SimulationMode::Grid, 50).unwrap();
        assert_eq!(result.initial.prey, 50.0);
        assert_eq!(result.initial.predators, 10.0);
        assert!(result.steps <= 20);
    }
}
