//! Square-root kernels: scalar reference and lane-parallel.
//!
//! Every kernel shares one calling convention, [`KernelFn`]:
//! - `fn sqrt_scalar(...)`: pure Rust scalar reference (ground truth)
//! - `fn sqrt_lanes(...)`: portable `[f32; LANE_WIDTH]` lanes with a boolean mask
//! - `unsafe fn sqrt_avx2(...)`: AVX2 `__m256` lanes with a compare mask
//!
//! All three run the identical f32 operation sequence per element, so their
//! outputs agree bit for bit.

// Kernel code naturally uses single-character math variable names (s, x)
// and unsafe intrinsics inside unsafe fns.
#![allow(
    clippy::many_single_char_names,
    clippy::similar_names,
    clippy::float_cmp,
    clippy::needless_range_loop,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    unsafe_op_in_unsafe_fn
)]

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::config::EPSILON;
use crate::error::SqrtError;

pub mod lanes;
pub mod scalar;

/// Uniform kernel signature: `(initial_guess, values, output)`.
pub type KernelFn = fn(f32, &[f32], &mut [f32]);

/// Convergence bound on `|x^2 - s|` for one element.
///
/// Absolute [`EPSILON`] for `s >= 1`, relative below so small roots still
/// land within [`EPSILON`] of `sqrt(s)`. A NaN `s` takes the absolute bound.
#[inline]
pub fn tolerance(s: f32) -> f32 {
    EPSILON * s.min(1.0)
}

/// Whether `x` still needs another Newton step toward `sqrt(s)`.
///
/// A zero iterate is never refined, so no lane divides by zero.
#[inline]
pub fn needs_refinement(x: f32, s: f32, tol: f32) -> bool {
    (x * x - s).abs() > tol && x != 0.0
}

/// One Newton-Raphson update: `0.5 * (x + s / x)`.
#[inline]
pub fn newton_step(x: f32, s: f32) -> f32 {
    0.5 * (x + s / x)
}

/// Backend selector for kernel dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Pure Rust scalar reference implementation.
    Scalar,
    /// Portable lane-parallel implementation.
    Lanes,
    /// x86-64 AVX2 lane-parallel implementation (aligned buffers).
    Avx2,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Scalar, Backend::Lanes, Backend::Avx2];

    /// The kernel behind this backend.
    ///
    /// [`Backend::Avx2`] maps to [`lanes::sqrt_simd`], which falls back to the
    /// portable lanes when AVX2 or alignment is missing.
    pub fn kernel(self) -> KernelFn {
        match self {
            Backend::Scalar => scalar::sqrt_scalar,
            Backend::Lanes => lanes::sqrt_lanes,
            Backend::Avx2 => lanes::sqrt_simd,
        }
    }

    /// Whether the backend runs natively on this CPU.
    pub fn is_available(self) -> bool {
        match self {
            Backend::Scalar | Backend::Lanes => true,
            Backend::Avx2 => lanes::avx2_available(),
        }
    }

    /// The backend whose code actually runs on this CPU.
    pub fn effective(self) -> Backend {
        if self.is_available() {
            self
        } else {
            Backend::Lanes
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Scalar => "scalar",
            Backend::Lanes => "lanes",
            Backend::Avx2 => "avx2",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = SqrtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backend::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| SqrtError::UnknownName {
                kind: "backend",
                name: s.to_string(),
            })
    }
}
