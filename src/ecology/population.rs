//! Aggregate population dynamics - Lotka-Volterra with a drought-gated
//! resource pool, integrated with explicit forward Euler steps.

use crate::config::{Config, DroughtDecay, PopulationConfig};
use crate::ecology::drought::DroughtProcess;
use crate::rng::SimRng;

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Scalar prey/predator/resource state
#[derive(Clone, Debug)]
pub struct PopulationModel {
    pub prey: f64,
    pub predators: f64,
    pub resources: f64,
    pub max_resource: f64,
    pub drought: DroughtProcess,
}

impl PopulationModel {
    pub fn new(prey: f64, predators: f64, resources: f64, max_resource: f64, drought_decay: f64) -> Self {
        Self {
            prey: prey.max(0.0),
            predators: predators.max(0.0),
            resources: resources.clamp(0.0, max_resource),
            max_resource,
            drought: DroughtProcess::new(1.0, DroughtDecay::Exponential(drought_decay)),
        }
    }

    pub fn from_config(config: &PopulationConfig) -> Self {
        Self::new(
            config.initial_prey,
            config.initial_predators,
            config.initial_resources,
            config.max_resource,
            config.drought_decay,
        )
    }

    #[inline]
    pub fn drought_level(&self) -> f64 {
        self.drought.level()
    }

    /// Both populations at or below `threshold`
    pub fn is_extinct(&self, threshold: f64) -> bool {
        self.prey <= threshold && self.predators <= threshold
    }
}

/// Fixed-step integrator for a `PopulationModel`
#[derive(Clone, Debug)]
pub struct PopulationStepper {
    params: PopulationConfig,
    drought_chance: f64,
    severity: (f64, f64),
    dt: f64,
}

impl PopulationStepper {
    pub fn new(params: PopulationConfig, drought_chance: f64, severity: (f64, f64), dt: f64) -> Self {
        Self {
            params,
            drought_chance,
            severity,
            dt,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.population.clone(),
            config.drought.chance,
            (config.drought.severity_min, config.drought.severity_max),
            config.dt(),
        )
    }

    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Advance the model by one `dt`
    pub fn step(&self, model: &mut PopulationModel, rng: &mut SimRng) {
        self.update_drought(model, rng);
        self.update_resources(model);
        self.update_populations(model);
    }

    /// New drought raises the level, otherwise it relaxes multiplicatively
    fn update_drought(&self, model: &mut PopulationModel, rng: &mut SimRng) {
        if model.drought.roll(self.drought_chance, self.severity, rng).is_none() {
            model.drought.decay();
        }
    }

    /// Resource capacity after drought scaling
    pub fn effective_resource_capacity(&self, max_resource: f64, drought_level: f64) -> f64 {
        max_resource * lerp(1.0, self.params.drought_capacity_floor, drought_level.clamp(0.0, 1.0))
    }

    fn update_resources(&self, model: &mut PopulationModel) {
        let level = model.drought_level();
        let growth_rate =
            self.params.resource_growth_rate * lerp(1.0, self.params.drought_growth_floor, level);
        let capacity = self.effective_resource_capacity(model.max_resource, level);

        let growth = if capacity > 0.0 {
            growth_rate * model.resources * (1.0 - model.resources / capacity)
        } else {
            0.0
        };
        let consumption = model.prey * self.params.resource_consumption_rate;

        model.resources =
            (model.resources + (growth - consumption) * self.dt).clamp(0.0, model.max_resource);
    }

    /// Prey ceiling gated by the share of resources left
    pub fn prey_capacity(&self, model: &PopulationModel) -> f64 {
        if model.max_resource <= 0.0 {
            return 0.0;
        }
        self.params.prey_carrying_capacity * (model.resources / model.max_resource).clamp(0.0, 1.0)
    }

    fn update_populations(&self, model: &mut PopulationModel) {
        let p = &self.params;
        let level = model.drought_level();
        let alpha = p.alpha * (1.0 - p.drought_alpha_penalty * level).max(0.0);
        let gamma = p.gamma * (1.0 + p.drought_gamma_penalty * level);

        let capacity = self.prey_capacity(model);
        let prey = model.prey;
        let predators = model.predators;

        let births = if capacity > 0.0 {
            alpha * prey * (1.0 - prey / capacity)
        } else {
            0.0
        };
        let d_prey = (births - p.beta * prey * predators) * self.dt;
        let d_predators = (p.delta * prey * predators - gamma * predators) * self.dt;

        model.prey = (prey + d_prey).max(0.0);
        model.predators = (predators + d_predators).max(0.0);
    }
}
