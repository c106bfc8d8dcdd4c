//! Shared helpers for the falsification tests.
#![allow(dead_code)]

use lanesqrt::buffer::AlignedBuffer;
use lanesqrt::kernels::KernelFn;

/// Inputs of the worked example, with their expected roots.
pub const SCENARIO_VALUES: [f32; 8] = [0.0001, 1.0, 2.0, 4.0, 9.0, 1_000_000.0, 2.998, 0.5];
pub const SCENARIO_ROOTS: [f32; 8] = [0.01, 1.0, 1.41421, 2.0, 3.0, 1000.0, 1.7315, 0.70711];

/// Run `kernel` over an aligned copy of `values`.
pub fn run_kernel(kernel: KernelFn, initial_guess: f32, values: &[f32]) -> Vec<f32> {
    let input = AlignedBuffer::from_slice(values).unwrap();
    let mut output = AlignedBuffer::zeroed(values.len()).unwrap();
    kernel(initial_guess, &input, &mut output);
    output.to_vec()
}

/// Asserts two outputs are identical bit for bit.
pub fn assert_bits_eq(a: &[f32], b: &[f32], label: &str) {
    assert_eq!(a.len(), b.len(), "{label}: length mismatch");
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert_eq!(
            x.to_bits(),
            y.to_bits(),
            "{label}: element [{i}] differs: {x} vs {y}"
        );
    }
}

/// Asserts every element in a slice is finite (not NaN or infinite).
pub fn assert_all_finite(slice: &[f32]) {
    for (i, &val) in slice.iter().enumerate() {
        assert!(val.is_finite(), "Element [{i}] is not finite: {val}");
    }
}

/// `|root - sqrt(s)|` computed in f64.
pub fn root_error(root: f32, s: f32) -> f64 {
    (f64::from(root) - f64::from(s).sqrt()).abs()
}

/// Deterministic spread of positive values over several decades.
pub fn log_spaced(n: usize, low: f32, high: f32) -> Vec<f32> {
    let (lo, hi) = (f64::from(low).ln(), f64::from(high).ln());
    (0..n)
        .map(|i| (lo + (hi - lo) * i as f64 / (n - 1).max(1) as f64).exp() as f32)
        .collect()
}
