//! Configuration system for the drought ecosystem simulation.
//!
//! Supports YAML configuration files with sensible defaults. Every section is
//! `#[serde(default)]`, so a file only needs to name the values it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub drought: DroughtConfig,
    #[serde(default)]
    pub prey: PreyConfig,
    #[serde(default)]
    pub predator: PredatorConfig,
    #[serde(default)]
    pub population: PopulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which engine variant drives the run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Spatial grid with individual prey/predator agents
    Grid,
    /// Scalar Lotka-Volterra populations coupled to a resource pool
    #[default]
    Aggregate,
}

impl SimulationMode {
    pub fn name(&self) -> &'static str {
        match self {
            SimulationMode::Grid => "grid",
            SimulationMode::Aggregate => "aggregate",
        }
    }
}

/// How the terminal summary condenses the time series
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatistic {
    /// Values recorded at the last step
    #[default]
    Final,
    /// Mean over every recorded step
    Average,
}

/// Run lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Identifier used as the output folder name
    pub run_id: String,
    /// Seed for the run-scoped random generator (must be > 0)
    pub seed: u64,
    /// Engine variant
    pub mode: SimulationMode,
    /// Simulation steps per second of tick time (dt = 1 / step_rate)
    pub step_rate: f64,
    /// Maximum number of steps before the run ends
    pub max_steps: u64,
    /// Optional budget of elapsed tick time in seconds
    pub max_duration_secs: Option<f64>,
    /// Final or averaged values in the summary record
    pub summary: SummaryStatistic,
    /// Append process memory (MB) to every time-series line
    pub record_memory: bool,
    /// Aggregate mode: both populations at or below this count means extinction
    pub extinction_threshold: f64,
}

/// Grid mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    /// Prey agents seeded at start
    pub initial_prey: usize,
    /// Predator agents seeded at start (may be zero)
    pub initial_predators: usize,
    /// Starting energy range for seeded prey `[min, max)`
    pub prey_energy_range: (f64, f64),
    /// Starting energy range for seeded predators `[min, max)`
    pub predator_energy_range: (f64, f64),
    /// Reproduction stops once this many agents are alive
    pub max_agents: usize,
}

/// Drought decay rule applied once per step
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroughtDecay {
    /// Subtract a fixed amount, floored at 0
    Linear(f64),
    /// Multiply by a factor in [0, 1]
    Exponential(f64),
}

/// Drought process and vegetation dynamics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DroughtConfig {
    /// Per-step probability that a new drought is sampled
    pub chance: f64,
    /// Lower bound of the sampled severity
    pub severity_min: f64,
    /// Upper bound of the sampled severity
    pub severity_max: f64,
    /// Drought level never exceeds this bound
    pub max_level: f64,
    /// Grid mode decay rule
    pub decay: DroughtDecay,
    /// Moisture lost per step per unit of drought level
    pub moisture_loss: f64,
    /// Moisture regained per step while no drought is active
    pub recovery_rate: f64,
    /// Vegetation only grows above this moisture
    pub wet_threshold: f64,
    /// Vegetation lost per step on dry soil
    pub dry_decay: f64,
    /// Logistic vegetation growth rate
    pub growth_rate: f64,
    /// Vegetation carrying capacity
    pub carrying_capacity: f64,
    /// Let vegetation grow while drought is fully relaxed
    pub idle_growth: bool,
}

/// Prey agent parameters (grid mode)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreyConfig {
    /// Vegetation eaten per step
    pub consumption_rate: f64,
    /// Base chance to migrate away from a depleted cell
    pub migration_rate: f64,
    /// Box radius scanned when migrating
    pub perception_radius: usize,
    pub max_energy: f64,
    /// Energy above which reproduction is possible
    pub reproduction_threshold: f64,
    /// Energy spent per step
    pub metabolism: f64,
}

/// Predator agent parameters (grid mode)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredatorConfig {
    /// Flat energy bonus on a successful hunt
    pub consumption_gain: f64,
    /// Box radius scanned for prey
    pub perception_radius: usize,
    /// Chance of wandering when no prey is in range
    pub migration_rate: f64,
    /// Chance to reproduce per step once above the threshold
    pub reproduction_chance: f64,
    /// Success probability against prey on the same cell
    pub hunt_success: f64,
    /// Fraction of the prey's remaining energy taken per hunt
    pub transfer_fraction: f64,
    /// Prey left below this energy is killed outright
    pub kill_threshold: f64,
    pub max_energy: f64,
    pub reproduction_threshold: f64,
    pub metabolism: f64,
}

/// Aggregate (Lotka-Volterra) mode parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Prey birth rate (also the grid-mode prey reproduction chance)
    pub alpha: f64,
    /// Predation rate
    pub beta: f64,
    /// Predator growth rate per prey eaten
    pub delta: f64,
    /// Predator death rate
    pub gamma: f64,
    pub initial_prey: f64,
    pub initial_predators: f64,
    pub initial_resources: f64,
    /// Prey ceiling when resources are full
    pub prey_carrying_capacity: f64,
    pub max_resource: f64,
    /// Logistic regrowth rate of the resource pool
    pub resource_growth_rate: f64,
    /// Resources eaten per prey per unit time
    pub resource_consumption_rate: f64,
    /// Multiplicative drought relaxation on steps without a new drought
    pub drought_decay: f64,
    /// Resource growth multiplier reached at drought level 1
    pub drought_growth_floor: f64,
    /// Resource capacity multiplier reached at drought level 1
    pub drought_capacity_floor: f64,
    /// Fraction of alpha removed at drought level 1 (0 disables)
    pub drought_alpha_penalty: f64,
    /// Fraction added to gamma at drought level 1 (0 disables)
    pub drought_gamma_penalty: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Steps between census lines on the console
    pub stats_interval: u64,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: "run-001".to_string(),
            seed: 42,
            mode: SimulationMode::Aggregate,
            step_rate: 1.0,
            max_steps: 1000,
            max_duration_secs: None,
            summary: SummaryStatistic::Final,
            record_memory: false,
            extinction_threshold: 0.01,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            initial_prey: 20,
            initial_predators: 4,
            prey_energy_range: (5.0, 15.0),
            predator_energy_range: (10.0, 20.0),
            max_agents: 2000,
        }
    }
}

impl Default for DroughtConfig {
    fn default() -> Self {
        Self {
            chance: 0.01,
            severity_min: 0.2,
            severity_max: 1.0,
            max_level: 1.0,
            decay: DroughtDecay::Linear(0.005),
            moisture_loss: 0.01,
            recovery_rate: 0.01,
            wet_threshold: 0.2,
            dry_decay: 0.01,
            growth_rate: 0.01,
            carrying_capacity: 1.0,
            idle_growth: false,
        }
    }
}

impl Default for PreyConfig {
    fn default() -> Self {
        Self {
            consumption_rate: 0.1,
            migration_rate: 0.5,
            perception_radius: 1,
            max_energy: 20.0,
            reproduction_threshold: 10.0,
            metabolism: 0.05,
        }
    }
}

impl Default for PredatorConfig {
    fn default() -> Self {
        Self {
            consumption_gain: 0.3,
            perception_radius: 2,
            migration_rate: 0.25,
            reproduction_chance: 0.05,
            hunt_success: 0.8,
            transfer_fraction: 0.5,
            kill_threshold: 1.0,
            max_energy: 20.0,
            reproduction_threshold: 10.0,
            metabolism: 0.1,
        }
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            beta: 0.005,
            delta: 0.005,
            gamma: 0.02,
            initial_prey: 100.0,
            initial_predators: 25.0,
            initial_resources: 100.0,
            prey_carrying_capacity: 200.0,
            max_resource: 100.0,
            resource_growth_rate: 0.2,
            resource_consumption_rate: 0.001,
            drought_decay: 0.95,
            drought_growth_floor: 0.2,
            drought_capacity_floor: 0.25,
            drought_alpha_penalty: 0.0,
            drought_gamma_penalty: 0.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stats_interval: 100,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// The result is not validated: callers may still override fields before
    /// calling [`Config::validate`], which `RunManager::start` does.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Fixed integration step, the inverse of the step rate
    pub fn dt(&self) -> f64 {
        1.0 / self.run.step_rate
    }

    /// Validate configuration values.
    ///
    /// Checks run in a fixed priority order and only the first failure is
    /// reported, so a caller can fix one field at a time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pop = &self.population;

        if !(pop.alpha > 0.0) {
            return Err(ConfigError::Alpha(pop.alpha));
        }
        if !(pop.beta > 0.0) {
            return Err(ConfigError::Beta(pop.beta));
        }
        if !(pop.delta > 0.0) {
            return Err(ConfigError::Delta(pop.delta));
        }
        if !(pop.gamma > 0.0) {
            return Err(ConfigError::Gamma(pop.gamma));
        }
        if !(0.0..=1.0).contains(&self.drought.chance) {
            return Err(ConfigError::DroughtChance(self.drought.chance));
        }
        if !(pop.initial_prey > 0.0) {
            return Err(ConfigError::PreyCount(pop.initial_prey));
        }
        if !(pop.initial_predators > 0.0) {
            return Err(ConfigError::PredatorCount(pop.initial_predators));
        }
        if !(pop.initial_resources > 0.0) {
            return Err(ConfigError::ResourceCount(pop.initial_resources));
        }
        if !(pop.prey_carrying_capacity > 0.0) {
            return Err(ConfigError::CarryingCapacity(pop.prey_carrying_capacity));
        }
        if self.run.run_id.trim().is_empty() {
            return Err(ConfigError::RunId);
        }
        if self.run.seed == 0 {
            return Err(ConfigError::Seed);
        }

        // Structural checks after the user-facing fields
        if self.grid.width == 0 || self.grid.height == 0 {
            return Err(ConfigError::Invalid(
                "grid width and height must be > 0".to_string(),
            ));
        }
        if !(self.run.step_rate.is_finite() && self.run.step_rate > 0.0) {
            return Err(ConfigError::Invalid(
                "step_rate must be finite and > 0".to_string(),
            ));
        }
        if !(pop.max_resource > 0.0) {
            return Err(ConfigError::Invalid("max_resource must be > 0".to_string()));
        }
        let d = &self.drought;
        if !(0.0 <= d.severity_min && d.severity_min <= d.severity_max && d.severity_max <= d.max_level)
        {
            return Err(ConfigError::Invalid(
                "drought severity band must satisfy 0 <= min <= max <= max_level".to_string(),
            ));
        }
        for (name, (lo, hi)) in [
            ("prey_energy_range", self.grid.prey_energy_range),
            ("predator_energy_range", self.grid.predator_energy_range),
        ] {
            if !(0.0 < lo && lo < hi) {
                return Err(ConfigError::Invalid(format!("{} must satisfy 0 < min < max", name)));
            }
        }
        if self.grid.max_agents == 0 {
            return Err(ConfigError::Invalid("max_agents must be > 0".to_string()));
        }
        self.validate_species()
    }

    fn validate_species(&self) -> Result<(), ConfigError> {
        let (prey, pred) = (&self.prey, &self.predator);

        for (name, max_energy, threshold, metabolism) in [
            ("prey", prey.max_energy, prey.reproduction_threshold, prey.metabolism),
            ("predator", pred.max_energy, pred.reproduction_threshold, pred.metabolism),
        ] {
            if !(max_energy.is_finite() && max_energy > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{}.max_energy must be finite and > 0",
                    name
                )));
            }
            if !(threshold >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{}.reproduction_threshold must be >= 0",
                    name
                )));
            }
            if !(metabolism >= 0.0) {
                return Err(ConfigError::Invalid(format!("{}.metabolism must be >= 0", name)));
            }
        }
        if !(prey.consumption_rate >= 0.0) {
            return Err(ConfigError::Invalid("prey.consumption_rate must be >= 0".to_string()));
        }
        if !(pred.consumption_gain >= 0.0 && pred.kill_threshold >= 0.0) {
            return Err(ConfigError::Invalid(
                "predator.consumption_gain and kill_threshold must be >= 0".to_string(),
            ));
        }

        for (name, value) in [
            ("prey.migration_rate", prey.migration_rate),
            ("predator.migration_rate", pred.migration_rate),
            ("predator.reproduction_chance", pred.reproduction_chance),
            ("predator.hunt_success", pred.hunt_success),
            ("predator.transfer_fraction", pred.transfer_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{} must be in [0, 1]", name)));
            }
        }
        Ok(())
    }
}

/// Errors raised while loading or validating a configuration
#[derive(Debug)]
pub enum ConfigError {
    Alpha(f64),
    Beta(f64),
    Delta(f64),
    Gamma(f64),
    DroughtChance(f64),
    PreyCount(f64),
    PredatorCount(f64),
    ResourceCount(f64),
    CarryingCapacity(f64),
    RunId,
    Seed,
    Invalid(String),
    Io(std::io::Error),
    Parse(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alpha(v) => write!(f, "alpha must be > 0 (got {})", v),
            Self::Beta(v) => write!(f, "beta must be > 0 (got {})", v),
            Self::Delta(v) => write!(f, "delta must be > 0 (got {})", v),
            Self::Gamma(v) => write!(f, "gamma must be > 0 (got {})", v),
            Self::DroughtChance(v) => write!(f, "drought chance must be in [0, 1] (got {})", v),
            Self::PreyCount(v) => write!(f, "initial prey count must be > 0 (got {})", v),
            Self::PredatorCount(v) => write!(f, "initial predator count must be > 0 (got {})", v),
            Self::ResourceCount(v) => write!(f, "initial resources must be > 0 (got {})", v),
            Self::CarryingCapacity(v) => {
                write!(f, "prey carrying capacity must be > 0 (got {})", v)
            }
            Self::RunId => write!(f, "run id must not be empty"),
            Self::Seed => write!(f, "random seed must be a positive integer"),
            Self::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Parse(e) => write!(f, "YAML error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e)
    }
}
