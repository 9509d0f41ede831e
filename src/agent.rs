//! Grid agents: prey and predators living on environment cells.

use crate::config::Config;
use crate::ecology::predation::{self, HuntOutcome};
use crate::grid::{AgentRegistry, EnvironmentGrid};
use crate::rng::SimRng;
use rand::Rng;

/// Unique agent identifier, assigned in spawn order
pub type AgentId = u64;

/// The two agent variants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Species {
    Prey,
    Predator,
}

impl Species {
    pub fn name(&self) -> &'static str {
        match self {
            Species::Prey => "prey",
            Species::Predator => "predator",
        }
    }
}

/// Prey parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreyParams {
    pub consumption_rate: f64,
    pub migration_rate: f64,
    pub perception_radius: usize,
    pub max_energy: f64,
    pub reproduction_threshold: f64,
    /// Per-step reproduction chance (the LV alpha)
    pub birth_rate: f64,
    pub metabolism: f64,
}

/// Predator parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PredatorParams {
    pub consumption_gain: f64,
    pub perception_radius: usize,
    pub migration_rate: f64,
    pub reproduction_chance: f64,
    pub hunt_success: f64,
    pub transfer_fraction: f64,
    pub kill_threshold: f64,
    pub max_energy: f64,
    pub reproduction_threshold: f64,
    pub metabolism: f64,
}

/// Parameters for both species plus the shared population cap
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentParams {
    pub prey: PreyParams,
    pub predator: PredatorParams,
    pub max_agents: usize,
}

impl AgentParams {
    pub fn from_config(config: &Config) -> Self {
        let prey = &config.prey;
        let predator = &config.predator;
        Self {
            prey: PreyParams {
                consumption_rate: prey.consumption_rate,
                migration_rate: prey.migration_rate,
                perception_radius: prey.perception_radius,
                max_energy: prey.max_energy,
                reproduction_threshold: prey.reproduction_threshold,
                birth_rate: config.population.alpha,
                metabolism: prey.metabolism,
            },
            predator: PredatorParams {
                consumption_gain: predator.consumption_gain,
                perception_radius: predator.perception_radius,
                migration_rate: predator.migration_rate,
                reproduction_chance: predator.reproduction_chance,
                hunt_success: predator.hunt_success,
                transfer_fraction: predator.transfer_fraction,
                kill_threshold: predator.kill_threshold,
                max_energy: predator.max_energy,
                reproduction_threshold: predator.reproduction_threshold,
                metabolism: predator.metabolism,
            },
            max_agents: config.grid.max_agents,
        }
    }

    pub fn max_energy(&self, species: Species) -> f64 {
        match species {
            Species::Prey => self.prey.max_energy,
            Species::Predator => self.predator.max_energy,
        }
    }

    pub fn reproduction_threshold(&self, species: Species) -> f64 {
        match species {
            Species::Prey => self.prey.reproduction_threshold,
            Species::Predator => self.predator.reproduction_threshold,
        }
    }
}

/// Everything an agent may touch during its step
pub struct StepContext<'a> {
    pub grid: &'a mut EnvironmentGrid,
    pub registry: &'a mut AgentRegistry,
    pub params: &'a AgentParams,
    pub rng: &'a mut SimRng,
}

/// Side effects of one agent step, gathered by the scheduler
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepEffects {
    pub offspring: Option<AgentId>,
    pub moved: bool,
    /// Prey drained to zero energy by this agent
    pub killed: Option<AgentId>,
}

/// A prey or predator on the grid
#[derive(Clone, Debug)]
pub struct Agent {
    pub id: AgentId,
    pub species: Species,
    pub x: usize,
    pub y: usize,
    pub energy: f64,
    pub max_energy: f64,
}

impl Agent {
    pub fn new(id: AgentId, species: Species, x: usize, y: usize, energy: f64, max_energy: f64) -> Self {
        Self {
            id,
            species,
            x,
            y,
            energy: energy.max(0.0).min(max_energy.max(0.0)),
            max_energy,
        }
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.energy <= 0.0
    }

    #[inline]
    pub fn is_prey(&self) -> bool {
        self.species == Species::Prey
    }

    #[inline]
    pub fn can_reproduce(&self, params: &AgentParams) -> bool {
        self.energy > params.reproduction_threshold(self.species)
    }

    #[inline]
    pub fn position(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    /// Advance this agent by one step.
    ///
    /// A dead agent is still handed to this method by the scheduler but does
    /// nothing; it is swept after the pass.
    pub fn time_step(&mut self, ctx: &mut StepContext<'_>) -> StepEffects {
        if self.is_dead() {
            return StepEffects::default();
        }
        match self.species {
            Species::Prey => self.prey_step(ctx),
            Species::Predator => self.predator_step(ctx),
        }
    }

    fn prey_step(&mut self, ctx: &mut StepContext<'_>) -> StepEffects {
        let params = ctx.params.prey;
        let mut effects = StepEffects::default();

        // Depleted cells push prey away
        let density = ctx.grid.density(self.x, self.y);
        let migration_chance = params.migration_rate * (1.0 - density.clamp(0.0, 1.0));
        if ctx.rng.gen::<f64>() < migration_chance {
            effects.moved = self.migrate(ctx.grid, ctx.registry, &params, ctx.rng);
        }

        self.graze(ctx.grid, &params);
        effects.offspring = self.reproduce(params.birth_rate, ctx);
        self.metabolise(params.metabolism);

        effects
    }

    fn predator_step(&mut self, ctx: &mut StepContext<'_>) -> StepEffects {
        let params = ctx.params.predator;
        let mut effects = StepEffects::default();

        match self.hunt(ctx) {
            HuntOutcome::Caught { prey, killed, .. } => {
                if killed {
                    effects.killed = Some(prey);
                }
            }
            HuntOutcome::NoTarget => {
                if ctx.rng.gen::<f64>() < params.migration_rate {
                    effects.moved = self.wander(ctx.grid, ctx.registry, ctx.rng);
                }
            }
            HuntOutcome::Escaped { .. } => {}
        }

        effects.offspring = self.reproduce(params.reproduction_chance, ctx);
        self.metabolise(params.metabolism);

        effects
    }

    /// Relocate on the grid, keeping the registry buckets in sync
    pub fn move_to(&mut self, registry: &mut AgentRegistry, x: usize, y: usize) {
        registry.relocate(self.id, (self.x, self.y), (x, y));
        self.x = x;
        self.y = y;
    }

    /// Move towards the densest vegetation within the perception radius.
    ///
    /// Only a strictly better cell counts, and the move itself still needs
    /// a successful `migration_rate` coin flip.
    pub fn migrate(
        &mut self,
        grid: &EnvironmentGrid,
        registry: &mut AgentRegistry,
        params: &PreyParams,
        rng: &mut SimRng,
    ) -> bool {
        let (best_x, best_y) = grid.densest_in_radius(self.x, self.y, params.perception_radius);
        if (best_x, best_y) != (self.x, self.y) && rng.gen::<f64>() < params.migration_rate {
            self.move_to(registry, best_x, best_y);
            true
        } else {
            false
        }
    }

    /// Eat from the current cell, returns the amount eaten
    pub fn graze(&mut self, grid: &mut EnvironmentGrid, params: &PreyParams) -> f64 {
        let eaten = grid.consume(self.x, self.y, params.consumption_rate);
        self.energy = (self.energy + eaten).min(self.max_energy);
        eaten
    }

    /// Look for the nearest prey in range and try to catch it
    pub fn hunt(&mut self, ctx: &mut StepContext<'_>) -> HuntOutcome {
        let params = ctx.params.predator;
        let Some((prey_id, distance)) = self.nearest_prey(ctx.grid, ctx.registry, params.perception_radius)
        else {
            return HuntOutcome::NoTarget;
        };

        let odds = predation::hunt_success_probability(params.hunt_success, distance);
        if ctx.rng.gen::<f64>() >= odds {
            return HuntOutcome::Escaped { prey: prey_id };
        }

        let Some(prey) = ctx.registry.get_mut(prey_id) else {
            return HuntOutcome::NoTarget;
        };
        let bite = predation::bite(prey.energy, params.transfer_fraction, params.kill_threshold);
        prey.energy = if bite.killed { 0.0 } else { prey.energy - bite.taken };
        let (prey_x, prey_y) = prey.position();

        let gained = bite.taken + params.consumption_gain;
        self.energy = (self.energy + gained).min(self.max_energy);
        if (prey_x, prey_y) != (self.x, self.y) {
            self.move_to(ctx.registry, prey_x, prey_y);
        }

        HuntOutcome::Caught {
            prey: prey_id,
            energy_gained: gained,
            killed: bite.killed,
        }
    }

    /// Nearest living prey within the box radius, first found wins ties
    fn nearest_prey(
        &self,
        grid: &EnvironmentGrid,
        registry: &AgentRegistry,
        radius: usize,
    ) -> Option<(AgentId, usize)> {
        let mut best: Option<(AgentId, usize)> = None;
        for (cx, cy) in grid.neighborhood(self.x, self.y, radius) {
            for &id in registry.at(cx, cy) {
                let Some(other) = registry.get(id) else {
                    continue;
                };
                if !other.is_prey() || other.is_dead() {
                    continue;
                }
                let distance = predation::box_distance(self.x, self.y, cx, cy);
                if best.map_or(true, |(_, d)| distance < d) {
                    best = Some((id, distance));
                }
            }
        }
        best
    }

    /// Step onto a random in-bounds neighbouring cell
    fn wander(&mut self, grid: &EnvironmentGrid, registry: &mut AgentRegistry, rng: &mut SimRng) -> bool {
        let options: Vec<(usize, usize)> = grid
            .neighborhood(self.x, self.y, 1)
            .filter(|&pos| pos != (self.x, self.y))
            .collect();
        if options.is_empty() {
            return false;
        }
        let (x, y) = options[rng.gen_range(0..options.len())];
        self.move_to(registry, x, y);
        true
    }

    /// Split energy with an offspring on the same cell.
    ///
    /// Only agents above their species' reproduction threshold may try, and
    /// nothing is born once the registry holds `max_agents`. Past that gate a
    /// single `chance` roll decides (the LV alpha for prey). The parent keeps
    /// half its energy and the offspring starts with the other half.
    pub fn reproduce(&mut self, chance: f64, ctx: &mut StepContext<'_>) -> Option<AgentId> {
        if !self.can_reproduce(ctx.params) || ctx.registry.len() >= ctx.params.max_agents {
            return None;
        }
        if ctx.rng.gen::<f64>() >= chance {
            return None;
        }

        self.energy /= 2.0;
        let child = ctx.registry.spawn(
            self.species,
            self.x,
            self.y,
            self.energy,
            ctx.params.max_energy(self.species),
        );
        Some(child)
    }

    fn metabolise(&mut self, cost: f64) {
        self.energy = (self.energy - cost).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::EnvironmentCell;
    use crate::rng::create_rng;

    fn params() -> AgentParams {
        AgentParams::from_config(&Config::default())
    }

    fn flat_grid(width: usize, height: usize, density: f64) -> EnvironmentGrid {
        let mut grid = EnvironmentGrid::new(width, height);
        for cell in grid.cells_mut() {
            *cell = EnvironmentCell::new(1.0, density);
        }
        grid
    }

    #[test]
    fn test_dead_and_reproduce_predicates() {
        let p = params();
        let mut agent = Agent::new(0, Species::Prey, 0, 0, 12.0, 20.0);
        assert!(!agent.is_dead());
        assert!(agent.can_reproduce(&p));

        agent.energy = 10.0;
        assert!(!agent.can_reproduce(&p));

        agent.energy = 0.0;
        assert!(agent.is_dead());
    }

    #[test]
    fn test_new_clamps_without_panicking() {
        let agent = Agent::new(0, Species::Prey, 0, 0, 12.0, -1.0);
        assert_eq!(agent.energy, 0.0);
        assert!(agent.is_dead());

        let agent = Agent::new(1, Species::Predator, 0, 0, f64::NAN, 20.0);
        assert_eq!(agent.energy, 0.0);

        let agent = Agent::new(2, Species::Prey, 0, 0, 25.0, 20.0);
        assert_eq!(agent.energy, 20.0);
    }

    #[test]
    fn test_graze_caps_at_max_energy() {
        let p = params();
        let mut grid = flat_grid(3, 3, 0.5);
        let mut agent = Agent::new(0, Species::Prey, 1, 1, 19.95, 20.0);

        let eaten = agent.graze(&mut grid, &p.prey);
        assert!((eaten - 0.1).abs() < 1e-12);
        assert_eq!(agent.energy, 20.0);
        assert!((grid.density(1, 1) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_graze_takes_at_most_what_is_there() {
        let p = params();
        let mut grid = flat_grid(3, 3, 0.03);
        let mut agent = Agent::new(0, Species::Prey, 1, 1, 5.0, 20.0);

        let eaten = agent.graze(&mut grid, &p.prey);
        assert!((eaten - 0.03).abs() < 1e-12);
        assert_eq!(grid.density(1, 1), 0.0);
    }

    #[test]
    fn test_migrate_moves_to_strictly_denser_cell() {
        let mut p = params();
        p.prey.migration_rate = 1.0;
        let mut grid = flat_grid(5, 5, 0.2);
        grid.get_mut(3, 2).unwrap().density = 0.9;
        let mut registry = AgentRegistry::new();
        let id = registry.spawn(Species::Prey, 2, 2, 5.0, 20.0);
        let mut agent = registry.take(id).unwrap();
        let mut rng = create_rng(1);

        assert!(agent.migrate(&grid, &mut registry, &p.prey, &mut rng));
        assert_eq!(agent.position(), (3, 2));
        registry.restore(agent);
        assert_eq!(registry.at(3, 2), &[id]);
        assert!(registry.at(2, 2).is_empty());
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_migrate_stays_on_ties() {
        let mut p = params();
        p.prey.migration_rate = 1.0;
        let grid = flat_grid(5, 5, 0.5);
        let mut registry = AgentRegistry::new();
        let id = registry.spawn(Species::Prey, 2, 2, 5.0, 20.0);
        let mut agent = registry.take(id).unwrap();
        let mut rng = create_rng(1);

        assert!(!agent.migrate(&grid, &mut registry, &p.prey, &mut rng));
        assert_eq!(agent.position(), (2, 2));
    }

    #[test]
    fn test_reproduce_splits_energy() {
        let mut p = params();
        p.prey.birth_rate = 1.0;
        let mut grid = flat_grid(3, 3, 0.5);
        let mut registry = AgentRegistry::new();
        let id = registry.spawn(Species::Prey, 1, 1, 16.0, 20.0);
        let mut agent = registry.take(id).unwrap();
        let mut rng = create_rng(1);

        let child = {
            let mut ctx = StepContext {
                grid: &mut grid,
                registry: &mut registry,
                params: &p,
                rng: &mut rng,
            };
            agent.reproduce(1.0, &mut ctx)
        }
        .unwrap();

        assert_eq!(agent.energy, 8.0);
        let child = registry.get(child).unwrap();
        assert_eq!(child.energy, 8.0);
        assert_eq!(child.position(), (1, 1));
        assert_eq!(child.species, Species::Prey);
    }

    #[test]
    fn test_reproduce_respects_population_cap() {
        let mut p = params();
        p.max_agents = 1;
        let mut grid = flat_grid(3, 3, 0.5);
        let mut registry = AgentRegistry::new();
        let id = registry.spawn(Species::Prey, 1, 1, 16.0, 20.0);
        registry.spawn(Species::Prey, 0, 0, 16.0, 20.0);
        let mut agent = registry.take(id).unwrap();
        let mut rng = create_rng(1);
        let mut ctx = StepContext {
            grid: &mut grid,
            registry: &mut registry,
            params: &p,
            rng: &mut rng,
        };

        assert!(agent.reproduce(1.0, &mut ctx).is_none());
        assert_eq!(agent.energy, 16.0);
    }

    // Assumed hunt model: odds are hunt_success / (1 + distance) and a bite
    // takes transfer_fraction of the prey's energy.
    #[test]
    fn test_hunt_on_same_cell_with_certain_success() {
        let mut p = params();
        p.predator.hunt_success = 1.0;
        p.predator.transfer_fraction = 0.5;
        p.predator.kill_threshold = 1.0;
        let mut grid = flat_grid(5, 5, 0.5);
        let mut registry = AgentRegistry::new();
        let prey = registry.spawn(Species::Prey, 2, 2, 10.0, 20.0);
        let hunter = registry.spawn(Species::Predator, 2, 2, 5.0, 20.0);
        let mut predator = registry.take(hunter).unwrap();
        let mut rng = create_rng(3);

        let outcome = {
            let mut ctx = StepContext {
                grid: &mut grid,
                registry: &mut registry,
                params: &p,
                rng: &mut rng,
            };
            predator.hunt(&mut ctx)
        };

        match outcome {
            HuntOutcome::Caught {
                prey: caught,
                energy_gained,
                killed,
            } => {
                assert_eq!(caught, prey);
                assert!(!killed);
                assert!((energy_gained - 5.3).abs() < 1e-12);
            }
            other => panic!("expected a catch, got {:?}", other),
        }
        assert!((predator.energy - 10.3).abs() < 1e-12);
        assert!((registry.get(prey).unwrap().energy - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_hunt_moves_onto_prey_and_kills_weak_prey() {
        let mut p = params();
        p.predator.hunt_success = 1.0;
        p.predator.perception_radius = 2;
        let grid = flat_grid(5, 5, 0.5);
        let mut registry = AgentRegistry::new();
        // One cell away the odds halve, so scan seeds for a hit
        let prey = registry.spawn(Species::Prey, 3, 3, 1.2, 20.0);
        let hunter = registry.spawn(Species::Predator, 2, 2, 5.0, 20.0);

        let mut caught = false;
        for seed in 1..64 {
            let mut trial_grid = grid.clone();
            let mut trial_registry = registry.clone();
            let mut predator = trial_registry.take(hunter).unwrap();
            let mut rng = create_rng(seed);
            let outcome = {
                let mut ctx = StepContext {
                    grid: &mut trial_grid,
                    registry: &mut trial_registry,
                    params: &p,
                    rng: &mut rng,
                };
                predator.hunt(&mut ctx)
            };
            if let HuntOutcome::Caught { killed, .. } = outcome {
                assert!(killed);
                assert_eq!(predator.position(), (3, 3));
                assert_eq!(trial_registry.get(prey).unwrap().energy, 0.0);
                trial_registry.restore(predator);
                assert!(trial_registry.is_consistent());
                caught = true;
                break;
            }
        }
        assert!(caught);
    }

    #[test]
    fn test_hunt_without_prey_in_range() {
        let p = params();
        let mut grid = flat_grid(10, 10, 0.5);
        let mut registry = AgentRegistry::new();
        registry.spawn(Species::Prey, 9, 9, 10.0, 20.0);
        let hunter = registry.spawn(Species::Predator, 0, 0, 5.0, 20.0);
        let mut predator = registry.take(hunter).unwrap();
        let mut rng = create_rng(3);
        let mut ctx = StepContext {
            grid: &mut grid,
            registry: &mut registry,
            params: &p,
            rng: &mut rng,
        };

        assert_eq!(predator.hunt(&mut ctx), HuntOutcome::NoTarget);
    }

    #[test]
    fn test_dead_agent_step_is_inert() {
        let p = params();
        let mut grid = flat_grid(3, 3, 0.5);
        let mut registry = AgentRegistry::new();
        let id = registry.spawn(Species::Prey, 1, 1, 5.0, 20.0);
        let mut agent = registry.take(id).unwrap();
        agent.energy = 0.0;
        let mut rng = create_rng(3);
        let mut ctx = StepContext {
            grid: &mut grid,
            registry: &mut registry,
            params: &p,
            rng: &mut rng,
        };

        assert_eq!(agent.time_step(&mut ctx), StepEffects::default());
        assert_eq!(agent.energy, 0.0);
        assert_eq!(grid.density(1, 1), 0.5);
    }

    #[test]
    fn test_prey_step_pays_metabolism() {
        let mut p = params();
        p.prey.migration_rate = 0.0;
        p.prey.birth_rate = 0.0;
        let mut grid = flat_grid(3, 3, 0.0);
        let mut registry = AgentRegistry::new();
        let id = registry.spawn(Species::Prey, 1, 1, 0.03, 20.0);
        let mut agent = registry.take(id).unwrap();
        let mut rng = create_rng(3);
        let mut ctx = StepContext {
            grid: &mut grid,
            registry: &mut registry,
            params: &p,
            rng: &mut rng,
        };

        agent.time_step(&mut ctx);
        assert_eq!(agent.energy, 0.0);
        assert!(agent.is_dead());
    }
}
