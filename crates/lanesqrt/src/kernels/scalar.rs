//! Scalar reference kernel: one element at a time.
//!
//! Produces the gold output every other kernel is verified against, and
//! the per-element convergence outcome the vector kernels do not report.

use std::fmt;

use serde::Serialize;

use super::{needs_refinement, newton_step, tolerance};
use crate::config::MAX_ITERATIONS;

/// How the iteration for one element ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// `|x^2 - s|` fell within tolerance (or the guess was zero).
    Converged,
    /// An update left `x` unchanged before reaching tolerance.
    Stalled,
    /// Stopped at [`MAX_ITERATIONS`] while still refining.
    Capped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Converged => "converged",
            Outcome::Stalled => "stalled",
            Outcome::Capped => "capped",
        })
    }
}

/// Result of refining a single element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    pub value: f32,
    pub iterations: u32,
    pub outcome: Outcome,
}

/// Refine `initial_guess` toward `sqrt(s)`.
///
/// Never divides by a zero guess. Out-of-domain `s` (negative) runs to the
/// cap and returns the last iterate.
pub fn solve(s: f32, initial_guess: f32) -> Solution {
    let tol = tolerance(s);
    let mut x = initial_guess;
    let mut iterations = 0;
    if !needs_refinement(x, s, tol) {
        return Solution {
            value: x,
            iterations,
            outcome: Outcome::Converged,
        };
    }
    while iterations < MAX_ITERATIONS {
        let next = newton_step(x, s);
        iterations += 1;
        let moved = next != x;
        x = next;
        if !needs_refinement(x, s, tol) {
            return Solution {
                value: x,
                iterations,
                outcome: Outcome::Converged,
            };
        }
        if !moved {
            return Solution {
                value: x,
                iterations,
                outcome: Outcome::Stalled,
            };
        }
    }
    Solution {
        value: x,
        iterations,
        outcome: Outcome::Capped,
    }
}

/// Scalar reference implementation: `output[i] ≈ sqrt(values[i])`.
///
/// # Panics
///
/// Panics if `values.len() != output.len()`.
pub fn sqrt_scalar(initial_guess: f32, values: &[f32], output: &mut [f32]) {
    assert_eq!(values.len(), output.len(), "values/output length mismatch");
    for (&s, out) in values.iter().zip(output.iter_mut()) {
        *out = solve(s, initial_guess).value;
    }
}

/// Tally of per-element outcomes over a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConvergenceCensus {
    pub converged: usize,
    pub stalled: usize,
    pub capped: usize,
    pub max_iterations: u32,
    pub total_iterations: u64,
}

impl ConvergenceCensus {
    pub fn elements(&self) -> usize {
        self.converged + self.stalled + self.capped
    }

    /// Count one solved element.
    pub fn record(&mut self, sol: &Solution) {
        match sol.outcome {
            Outcome::Converged => self.converged += 1,
            Outcome::Stalled => self.stalled += 1,
            Outcome::Capped => self.capped += 1,
        }
        self.max_iterations = self.max_iterations.max(sol.iterations);
        self.total_iterations += u64::from(sol.iterations);
    }
}

/// Solve every element and count how each one ended.
pub fn convergence_census(initial_guess: f32, values: &[f32]) -> ConvergenceCensus {
    let mut census = ConvergenceCensus::default();
    for &s in values {
        census.record(&solve(s, initial_guess));
    }
    census
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
