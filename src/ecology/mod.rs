//! Ecological processes shared by both engine variants.
//!
//! This module contains:
//! - Drought process (onset, ratchet, decay, per-cell moisture/vegetation)
//! - Predation rules (distance-weighted hunts, energy transfer)
//! - Aggregate population dynamics (Lotka-Volterra with a resource pool)

pub mod drought;
pub mod population;
pub mod predation;

pub use drought::DroughtProcess;
pub use population::{PopulationModel, PopulationStepper};
pub use predation::HuntOutcome;
