//! Drought process - stochastic onsets, ratchet escalation and decay.

use crate::config::{DroughtConfig, DroughtDecay};
use crate::grid::EnvironmentCell;
use crate::rng::SimRng;
use rand::Rng;

/// Scalar drought severity shared by every cell of a run
#[derive(Clone, Debug)]
pub struct DroughtProcess {
    level: f64,
    max_level: f64,
    decay: DroughtDecay,
}

impl DroughtProcess {
    pub fn new(max_level: f64, decay: DroughtDecay) -> Self {
        Self {
            level: 0.0,
            max_level,
            decay,
        }
    }

    /// Grid-mode process built from the drought section
    pub fn from_config(config: &DroughtConfig) -> Self {
        Self::new(config.max_level, config.decay)
    }

    /// Current drought level
    #[inline]
    pub fn level(&self) -> f64 {
        self.level
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.level > 0.0
    }

    /// Start a new drought episode.
    ///
    /// Only raises the level: a weaker drought never interrupts a stronger
    /// one that is already decaying. Returns whether the level changed.
    pub fn new_drought(&mut self, severity: f64) -> bool {
        let severity = severity.clamp(0.0, self.max_level);
        if severity > self.level {
            self.level = severity;
            true
        } else {
            false
        }
    }

    /// Overwrite the level, clamped to the configured bound
    pub fn set_level(&mut self, level: f64) {
        self.level = level.clamp(0.0, self.max_level);
    }

    /// Apply one step of decay
    pub fn decay(&mut self) {
        self.level = match self.decay {
            DroughtDecay::Linear(rate) => self.level - rate,
            DroughtDecay::Exponential(factor) => self.level * factor,
        }
        .clamp(0.0, self.max_level);
    }

    /// Roll for a drought onset.
    ///
    /// Draws one uniform value for the onset test and, only when it
    /// succeeds, a second one for the severity. Returns the sampled severity.
    pub fn roll(&mut self, chance: f64, severity: (f64, f64), rng: &mut SimRng) -> Option<f64> {
        if rng.gen::<f64>() < chance {
            let sampled = rng.gen_range(severity.0..=severity.1);
            if self.new_drought(sampled) {
                log::debug!("Drought started, severity {:.2}", sampled);
            }
            Some(sampled)
        } else {
            None
        }
    }

    /// Update one cell's moisture and vegetation for the current level
    pub fn update_cell(&self, cell: &mut EnvironmentCell, config: &DroughtConfig) {
        cell.moisture = (cell.moisture - config.moisture_loss * self.level).max(0.0);

        if self.level == 0.0 {
            cell.moisture = (cell.moisture + config.recovery_rate).min(1.0);
            if !config.idle_growth {
                return;
            }
        }

        if cell.moisture > config.wet_threshold {
            let growth = if config.carrying_capacity > 0.0 {
                config.growth_rate * cell.density * (1.0 - cell.density / config.carrying_capacity)
            } else {
                0.0
            };
            cell.density = (cell.density + growth).clamp(0.0, 1.0);
        } else {
            cell.density = (cell.density - config.dry_decay).max(0.0);
        }
    }
}
