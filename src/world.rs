//! World simulation engine - one step of either ecosystem variant.

use crate::agent::{AgentParams, Species};
use crate::config::{Config, SimulationMode};
use crate::ecology::drought::DroughtProcess;
use crate::ecology::population::{PopulationModel, PopulationStepper};
use crate::grid::{AgentRegistry, EnvironmentGrid};
use crate::rng::{create_rng, SimRng};
use crate::scheduler::{AgentScheduler, StepReport};
use crate::stats::Census;
use rand::Rng;

/// Spatial ecosystem: vegetation grid, drought and individual agents
pub struct GridEcosystem {
    pub grid: EnvironmentGrid,
    pub drought: DroughtProcess,
    pub registry: AgentRegistry,
    pub scheduler: AgentScheduler,
    pub params: AgentParams,
    pub last_report: StepReport,
}

impl GridEcosystem {
    /// Seed cells, then prey, then predators, all from `rng`
    pub fn new(config: &Config, rng: &mut SimRng) -> Self {
        let g = &config.grid;
        let params = AgentParams::from_config(config);
        let grid = EnvironmentGrid::random(g.width, g.height, rng);
        let mut registry = AgentRegistry::new();

        let seeds = [
            (Species::Prey, g.initial_prey, g.prey_energy_range),
            (Species::Predator, g.initial_predators, g.predator_energy_range),
        ];
        for (species, count, (lo, hi)) in seeds {
            for _ in 0..count {
                let x = rng.gen_range(0..g.width);
                let y = rng.gen_range(0..g.height);
                let energy = rng.gen_range(lo..hi);
                registry.spawn(species, x, y, energy, params.max_energy(species));
            }
        }

        Self {
            grid,
            drought: DroughtProcess::from_config(&config.drought),
            registry,
            scheduler: AgentScheduler::new(),
            params,
            last_report: StepReport::default(),
        }
    }

    fn step(&mut self, config: &Config, rng: &mut SimRng) {
        let d = &config.drought;

        // Phase 1: drought onset
        self.drought.roll(d.chance, (d.severity_min, d.severity_max), rng);

        // Phase 2: cells (parallel, no randomness)
        self.grid.update(&self.drought, d);

        // Phase 3: relax drought once per step
        self.drought.decay();

        // Phase 4: agents (serial)
        self.last_report = self
            .scheduler
            .step(&mut self.grid, &mut self.registry, &self.params, rng);
    }

    pub fn census(&self) -> Census {
        Census {
            prey: self.registry.count(Species::Prey) as f64,
            predators: self.registry.count(Species::Predator) as f64,
            resources: self.grid.total_density(),
            drought: self.drought.level(),
        }
    }
}

/// Scalar Lotka-Volterra ecosystem
pub struct AggregateEcosystem {
    pub model: PopulationModel,
    pub stepper: PopulationStepper,
}

impl AggregateEcosystem {
    pub fn new(config: &Config) -> Self {
        Self {
            model: PopulationModel::from_config(&config.population),
            stepper: PopulationStepper::from_config(config),
        }
    }

    pub fn census(&self) -> Census {
        Census {
            prey: self.model.prey,
            predators: self.model.predators,
            resources: self.model.resources,
            drought: self.model.drought_level(),
        }
    }
}

pub enum Ecosystem {
    Grid(GridEcosystem),
    Aggregate(AggregateEcosystem),
}

/// The simulation world
pub struct World {
    pub ecosystem: Ecosystem,

    // State
    pub time: u64,

    // Configuration
    pub config: Config,

    // Random number generator (seeded for reproducibility)
    rng: SimRng,
    seed: u64,
}

impl World {
    /// Create a world seeded from `config.run.seed`
    pub fn new(config: Config) -> Self {
        let seed = config.run.seed;
        Self::new_with_seed(config, seed)
    }

    /// Create a new world with a specific seed for reproducibility
    pub fn new_with_seed(config: Config, seed: u64) -> Self {
        let mut rng = create_rng(seed);
        let ecosystem = match config.run.mode {
            SimulationMode::Grid => Ecosystem::Grid(GridEcosystem::new(&config, &mut rng)),
            SimulationMode::Aggregate => Ecosystem::Aggregate(AggregateEcosystem::new(&config)),
        };

        Self {
            ecosystem,
            time: 0,
            config,
            rng,
            seed,
        }
    }

    /// Main simulation step
    pub fn step(&mut self) {
        match &mut self.ecosystem {
            Ecosystem::Grid(eco) => eco.step(&self.config, &mut self.rng),
            Ecosystem::Aggregate(eco) => eco.stepper.step(&mut eco.model, &mut self.rng),
        }
        self.time += 1;
    }

    /// Run simulation for specified number of steps
    pub fn run(&mut self, steps: u64) {
        for _ in 0..steps {
            self.step();
        }
    }

    pub fn mode(&self) -> SimulationMode {
        match self.ecosystem {
            Ecosystem::Grid(_) => SimulationMode::Grid,
            Ecosystem::Aggregate(_) => SimulationMode::Aggregate,
        }
    }

    pub fn census(&self) -> Census {
        match &self.ecosystem {
            Ecosystem::Grid(eco) => eco.census(),
            Ecosystem::Aggregate(eco) => eco.census(),
        }
    }

    /// Step count in grid mode, simulated time in aggregate mode
    pub fn sim_clock(&self) -> f64 {
        match &self.ecosystem {
            Ecosystem::Grid(_) => self.time as f64,
            Ecosystem::Aggregate(eco) => self.time as f64 * eco.stepper.dt(),
        }
    }

    /// No agents left (grid), or both populations at or below `threshold`
    pub fn is_extinct(&self, threshold: f64) -> bool {
        match &self.ecosystem {
            Ecosystem::Grid(eco) => eco.registry.is_empty(),
            Ecosystem::Aggregate(eco) => eco.model.is_extinct(threshold),
        }
    }

    pub fn drought_level(&self) -> f64 {
        self.census().drought
    }

    /// Get seed for reproducibility
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_config() -> Config {
        let mut config = Config::default();
        config.run.mode = SimulationMode::Grid;
        config.grid.width = 10;
        config.grid.height = 10;
        config.grid.initial_prey = 8;
        config.grid.initial_predators = 2;
        config
    }

    #[test]
    fn test_grid_world_creation() {
        let world = World::new(grid_config());
        assert_eq!(world.mode(), SimulationMode::Grid);
        let census = world.census();
        assert_eq!(census.prey, 8.0);
        assert_eq!(census.predators, 2.0);
        assert_eq!(census.drought, 0.0);

        if let Ecosystem::Grid(eco) = &world.ecosystem {
            assert!(eco.registry.is_consistent());
            assert!(eco
                .registry
                .agents()
                .filter(|a| a.is_prey())
                .all(|a| (5.0..15.0).contains(&a.energy)));
        } else {
            panic!("expected grid ecosystem");
        }
    }

    #[test]
    fn test_world_step() {
        let mut world = World::new(grid_config());
        world.step();
        assert_eq!(world.time, 1);
        assert_eq!(world.sim_clock(), 1.0);
    }

    #[test]
    fn test_aggregate_clock_uses_dt() {
        let mut config = Config::default();
        config.run.step_rate = 4.0;
        let mut world = World::new(config);
        world.run(8);
        assert_eq!(world.sim_clock(), 2.0);
    }

    #[test]
    fn test_reproducibility() {
        let config = grid_config();
        let mut world1 = World::new_with_seed(config.clone(), 42);
        let mut world2 = World::new_with_seed(config, 42);

        for _ in 0..50 {
            world1.step();
            world2.step();
            assert_eq!(world1.census(), world2.census());
        }
    }

    #[test]
    fn test_empty_grid_is_extinct() {
        let mut config = grid_config();
        config.grid.initial_prey = 0;
        config.grid.initial_predators = 0;
        let world = World::new(config);
        assert!(world.is_extinct(0.01));
    }

    #[test]
    fn test_grid_drought_stays_bounded() {
        let mut config = grid_config();
        config.drought.chance = 0.5;
        let mut world = World::new(config);
        for _ in 0..100 {
            world.step();
            let level = world.drought_level();
            assert!((0.0..=1.0).contains(&level));
            if let Ecosystem::Grid(eco) = &world.ecosystem {
                assert!(eco
                    .grid
                    .cells()
                    .iter()
                    .all(|c| (0.0..=1.0).contains(&c.moisture) && (0.0..=1.0).contains(&c.density)));
            }
        }
    }
}
