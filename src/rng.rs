//! Run-scoped random number generation.
//!
//! Every stochastic draw in a run (drought onsets, migration and
//! reproduction coin flips, hunt outcomes) comes from one `SimRng` created
//! at run start and threaded explicitly through the step functions.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Generator type used throughout the simulation
pub type SimRng = ChaCha8Rng;

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> SimRng {
    ChaCha8Rng::seed_from_u64(seed)
}
