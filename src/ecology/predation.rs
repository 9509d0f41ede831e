//! Predation system - hunt odds and energy transfer.

use crate::agent::AgentId;

/// Result of one predator's hunt attempt
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HuntOutcome {
    /// Hunt succeeded
    Caught {
        prey: AgentId,
        energy_gained: f64,
        killed: bool,
    },
    /// A prey was in range but escaped
    Escaped { prey: AgentId },
    /// No prey within perception range
    NoTarget,
}

/// Energy moved from prey to predator by one successful hunt
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bite {
    /// Energy removed from the prey
    pub taken: f64,
    /// Prey is left with no energy
    pub killed: bool,
}

/// Chebyshev (box) distance between two cells
#[inline]
pub fn box_distance(ax: usize, ay: usize, bx: usize, by: usize) -> usize {
    ax.abs_diff(bx).max(ay.abs_diff(by))
}

/// Success probability for a hunt at the given distance.
///
/// Full `base` odds on the predator's own cell, falling off as
/// `base / (1 + distance)`.
pub fn hunt_success_probability(base: f64, distance: usize) -> f64 {
    (base / (1.0 + distance as f64)).clamp(0.0, 1.0)
}

/// Take a fraction of the prey's remaining energy.
///
/// A prey left below `kill_threshold` loses everything it has left.
pub fn bite(prey_energy: f64, transfer_fraction: f64, kill_threshold: f64) -> Bite {
    let available = prey_energy.max(0.0);
    let taken = available * transfer_fraction.clamp(0.0, 1.0);
    if available - taken < kill_threshold {
        Bite {
            taken: available,
            killed: true,
        }
    } else {
        Bite {
            taken,
            killed: false,
        }
    }
}
