//! Input generators for benchmark sessions.
//!
//! The interesting workloads differ in how evenly work spreads across the
//! lanes of a group: every lane busy, no lane busy, or one busy lane per
//! group holding the other seven hostage.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::LANE_WIDTH;
use crate::error::SqrtError;

/// Lower bound of the random workload.
pub const RANDOM_LOW: f32 = 0.001;

/// Width of the random workload range.
pub const RANDOM_SPAN: f32 = 2.998;

/// Slowest value to converge from a guess of 1.0 inside the random range.
pub const HEAVY_VALUE: f32 = 2.999;

/// Converges at a guess of 1.0 without a single update.
pub const LIGHT_VALUE: f32 = 1.0;

/// Input generator for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Workload {
    /// `0.001 + 2.998 * u` with `u` uniform in `[0, 1)`.
    #[default]
    Random,
    /// Every value is [`HEAVY_VALUE`].
    Uniform,
    /// Every value is [`LIGHT_VALUE`].
    Trivial,
    /// [`HEAVY_VALUE`] in the first lane of each group, [`LIGHT_VALUE`] elsewhere.
    Divergent,
}

impl Workload {
    pub const ALL: [Workload; 4] = [
        Workload::Random,
        Workload::Uniform,
        Workload::Trivial,
        Workload::Divergent,
    ];

    /// Populate `values` deterministically for `seed`.
    ///
    /// Only [`Workload::Random`] consumes the seed.
    pub fn fill(self, seed: u64, values: &mut [f32]) {
        match self {
            Workload::Random => {
                let mut rng = StdRng::seed_from_u64(seed);
                for v in values.iter_mut() {
                    *v = RANDOM_LOW + RANDOM_SPAN * rng.r#gen::<f32>();
                }
            }
            Workload::Uniform => values.fill(HEAVY_VALUE),
            Workload::Trivial => values.fill(LIGHT_VALUE),
            Workload::Divergent => {
                for (i, v) in values.iter_mut().enumerate() {
                    *v = if i % LANE_WIDTH == 0 {
                        HEAVY_VALUE
                    } else {
                        LIGHT_VALUE
                    };
                }
            }
        }
    }

    /// Allocate and fill a plain vector.
    pub fn generate(self, seed: u64, count: usize) -> Vec<f32> {
        let mut values = vec![0.0_f32; count];
        self.fill(seed, &mut values);
        values
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Workload::Random => "random",
            Workload::Uniform => "uniform",
            Workload::Trivial => "trivial",
            Workload::Divergent => "divergent",
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Workload {
    type Err = SqrtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Workload::ALL
            .into_iter()
            .find(|w| w.as_str() == s)
            .ok_or_else(|| SqrtError::UnknownName {
                kind: "workload",
                name: s.to_string(),
            })
    }
}
