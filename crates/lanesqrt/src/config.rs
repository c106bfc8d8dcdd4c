//! System-wide constants and the YAML run configuration.
//!
//! Lane width, tolerances and the iteration cap are fixed for the whole
//! process; kernels never take them as arguments. Only the benchmark run
//! itself (element count, guess, workers, trials, workload) is
//! configurable, from a YAML file and then from CLI flags.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SqrtError;
use crate::workload::Workload;

/// Lanes processed together by the lane-parallel kernels.
pub const LANE_WIDTH: usize = 8;

/// Byte alignment required by the vector kernels (`LANE_WIDTH * 4`).
pub const LANE_ALIGN: usize = LANE_WIDTH * std::mem::size_of::<f32>();

/// Solver tolerance on `|x^2 - s|` (scaled by `min(s, 1)`).
pub const EPSILON: f32 = 1e-4;

/// Verifier tolerance on `|output - gold|`.
pub const VERIFY_EPSILON: f32 = 1e-4;

/// Iteration cap for the solvers.
pub const MAX_ITERATIONS: u32 = 128;

/// Upper bound on orchestrator workers.
pub const MAX_WORKERS: usize = 32;

/// Timing trials per variant.
pub const DEFAULT_TRIALS: usize = 3;

/// Element count of a default bench session.
pub const DEFAULT_COUNT: usize = 20_000_000;

/// Run configuration for a benchmark session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Number of elements in the input buffer.
    pub count: usize,
    /// Initial guess shared by every element and every variant.
    pub initial_guess: f32,
    /// Workers used by the partitioned variants.
    pub workers: usize,
    /// Timing trials per variant.
    pub trials: usize,
    /// Input generator.
    pub workload: Workload,
    /// Seed for the random workload.
    pub seed: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            initial_guess: 1.0,
            workers: default_workers(),
            trials: DEFAULT_TRIALS,
            workload: Workload::Random,
            seed: 0,
        }
    }
}

impl BenchConfig {
    /// Check the configuration before any buffer is allocated.
    ///
    /// # Errors
    ///
    /// Returns [`SqrtError::NoWorkers`] or [`SqrtError::TooManyWorkers`]
    /// for an out-of-range worker count, and [`SqrtError::InvalidConfig`]
    /// for a zero count, zero trials, or a non-finite guess.
    pub fn validate(&self) -> Result<(), SqrtError> {
        check_workers(self.workers)?;
        if self.count == 0 {
            return Err(SqrtError::InvalidConfig("count must be positive".into()));
        }
        if self.trials == 0 {
            return Err(SqrtError::InvalidConfig("trials must be positive".into()));
        }
        if !self.initial_guess.is_finite() {
            return Err(SqrtError::InvalidConfig(format!(
                "initial_guess must be finite, got {}",
                self.initial_guess
            )));
        }
        Ok(())
    }
}

/// Reject worker counts outside `1..=MAX_WORKERS`.
///
/// # Errors
///
/// [`SqrtError::NoWorkers`] for zero, [`SqrtError::TooManyWorkers`] above
/// [`MAX_WORKERS`].
pub fn check_workers(workers: usize) -> Result<(), SqrtError> {
    if workers == 0 {
        return Err(SqrtError::NoWorkers);
    }
    if workers > MAX_WORKERS {
        return Err(SqrtError::TooManyWorkers {
            requested: workers,
            max: MAX_WORKERS,
        });
    }
    Ok(())
}

/// Available parallelism clamped to `1..=MAX_WORKERS`.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .clamp(1, MAX_WORKERS)
}

/// Parse a YAML run configuration file.
///
/// # Errors
///
/// Returns [`SqrtError::Io`] if the file cannot be read, or
/// [`SqrtError::Yaml`] if the YAML is malformed.
pub fn parse_config(path: &Path) -> Result<BenchConfig, SqrtError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse a YAML run configuration from a string.
///
/// # Errors
///
/// Returns [`SqrtError::Yaml`] if the YAML is malformed or names an
/// unknown field.
pub fn parse_config_str(yaml: &str) -> Result<BenchConfig, SqrtError> {
    let config: BenchConfig = serde_yaml::from_str(yaml)?;
    Ok(config)
}
