//! # lanesqrt
//!
//! Newton-Raphson square roots under three execution strategies.
//!
//! The same refinement `x' = 0.5 * (x + s / x)` runs as a sequential
//! reference, as a fixed-width lane-parallel kernel with per-lane
//! convergence masking, and partitioned across fork-join workers. A
//! min-of-N benchmark harness times every variant and verifies it against
//! the scalar gold output.
//!
//! ## Modules
//!
//! - [`kernels`] — Scalar reference, portable lane kernel, AVX2 kernel
//! - [`buffer`] — Zeroed `f32` storage aligned to the vector width
//! - [`partition`] — Contiguous range splitting and fork-join execution
//! - [`verify`] — Elementwise tolerance check against gold output
//! - [`workload`] — Deterministic input generators
//! - [`bench`] — Min-of-N timing, sessions, speedup reports
//! - [`config`] — System-wide constants and YAML run configuration
//! - [`error`] — Error type shared by every fallible operation

pub mod bench;
pub mod buffer;
pub mod config;
pub mod error;
pub mod kernels;
pub mod partition;
pub mod verify;
pub mod workload;
