//! Agent scheduler - one serial pass over every agent per step.
//!
//! The pass is two-phase: agents are marked while the snapshot is walked and
//! only swept from the registry once every agent has stepped, so removal
//! never disturbs the iteration.

use crate::agent::{AgentId, AgentParams, StepContext};
use crate::grid::{AgentRegistry, EnvironmentGrid};
use crate::rng::SimRng;
use std::collections::BTreeSet;

/// What happened during one scheduler pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub stepped: usize,
    pub births: usize,
    pub deaths: usize,
    pub kills: usize,
    pub moves: usize,
}

/// Steps grid agents and keeps running totals
#[derive(Clone, Debug, Default)]
pub struct AgentScheduler {
    pub total_births: u64,
    pub total_deaths: u64,
    pub total_kills: u64,
}

impl AgentScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one pass over the agents present at the start of the step
    pub fn step(
        &mut self,
        grid: &mut EnvironmentGrid,
        registry: &mut AgentRegistry,
        params: &AgentParams,
        rng: &mut SimRng,
    ) -> StepReport {
        let mut report = StepReport::default();

        // Phase 1: snapshot; offspring born during the pass wait a step
        let snapshot = registry.ids();

        // Phase 2: mark agents that enter the step already dead
        let mut dead: BTreeSet<AgentId> = snapshot
            .iter()
            .copied()
            .filter(|&id| registry.get(id).map_or(false, |a| a.is_dead()))
            .collect();

        // Phase 3: step everyone in the snapshot, marked or not
        for id in snapshot {
            let Some(mut agent) = registry.take(id) else {
                continue;
            };
            let effects = {
                let mut ctx = StepContext {
                    grid: &mut *grid,
                    registry: &mut *registry,
                    params,
                    rng: &mut *rng,
                };
                agent.time_step(&mut ctx)
            };
            if agent.is_dead() {
                dead.insert(agent.id);
            }
            registry.restore(agent);

            report.stepped += 1;
            if effects.offspring.is_some() {
                report.births += 1;
            }
            if effects.moved {
                report.moves += 1;
            }
            if let Some(prey) = effects.killed {
                dead.insert(prey);
                report.kills += 1;
            }
        }

        // Phase 4: sweep
        for id in dead {
            if let Some(agent) = registry.remove(id) {
                log::trace!("{} {} died at {:?}", agent.species.name(), id, agent.position());
                report.deaths += 1;
            }
        }

        self.total_births += report.births as u64;
        self.total_deaths += report.deaths as u64;
        self.total_kills += report.kills as u64;

        log::trace!(
            "Scheduler pass: stepped={} births={} deaths={} kills={}",
            report.stepped,
            report.births,
            report.deaths,
            report.kills
        );

        report
    }
}
