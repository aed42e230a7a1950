//! Deterministic simulation-level RNG.
//!
//! Unit behavior itself is fully deterministic and never draws random
//! numbers.  Randomness is only used when scenarios are generated (scattering
//! units around a spawn point), and there it must be reproducible from the
//! run's seed.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::{PlayerId, Point};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Seeded RNG for scenario generation.
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    /// Independent stream for one player, so adding units for player 2 does
    /// not change where player 1's units land.
    pub fn for_player(seed: u64, player: PlayerId) -> Self {
        SimRng(SmallRng::seed_from_u64(seed ^ (player.0 as u64).wrapping_mul(MIXING_CONSTANT)))
    }

    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// Uniform point in the square `center ± half_extent`.
    pub fn scatter(&mut self, center: Point, half_extent: f32) -> Point {
        if half_extent <= 0.0 {
            return center;
        }
        Point {
            x: center.x + self.0.gen_range(-half_extent..half_extent),
            z: center.z + self.0.gen_range(-half_extent..half_extent),
        }
    }
}
