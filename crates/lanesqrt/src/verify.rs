//! Elementwise tolerance check of kernel output against gold output.
//!
//! Reporting is exhaustive: every index outside [`VERIFY_EPSILON`] is
//! returned, not just the first. An empty report means the output passed.

use std::fmt;

use serde::Serialize;

use crate::config::VERIFY_EPSILON;

/// One element outside tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Discrepancy {
    pub index: usize,
    pub got: f32,
    pub expected: f32,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error: [{}] Got {:.6} expected {:.6}",
            self.index, self.got, self.expected
        )
    }
}

/// Compare `output` against `gold` with [`VERIFY_EPSILON`].
///
/// # Panics
///
/// Panics if the slices have different lengths.
pub fn verify_result(output: &[f32], gold: &[f32]) -> Vec<Discrepancy> {
    verify_with_tolerance(output, gold, VERIFY_EPSILON)
}

/// Compare `output` against `gold` with an explicit absolute tolerance.
///
/// A NaN on either side counts as a discrepancy.
///
/// # Panics
///
/// Panics if the slices have different lengths.
pub fn verify_with_tolerance(output: &[f32], gold: &[f32], tol: f32) -> Vec<Discrepancy> {
    assert_eq!(
        output.len(),
        gold.len(),
        "output/gold length mismatch: {} vs {}",
        output.len(),
        gold.len()
    );
    output
        .iter()
        .zip(gold)
        .enumerate()
        .filter(|&(_, (&got, &expected))| {
            let diff = (got - expected).abs();
            diff > tol || diff.is_nan()
        })
        .map(|(index, (&got, &expected))| Discrepancy {
            index,
            got,
            expected,
        })
        .collect()
}

/// Assert that two f32 slices agree within `tol` at every index.
///
/// # Panics
///
/// Panics if slices have different lengths or any element pair differs by
/// more than `tol`; the message lists every violation.
pub fn assert_within_tolerance(a: &[f32], b: &[f32], tol: f32) {
    let report = verify_with_tolerance(a, b, tol);
    assert!(
        report.is_empty(),
        "tolerance violation ({} of {} elements, tol {tol}):\n{}",
        report.len(),
        a.len(),
        report
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}
