//! Lane-parallel kernels: fixed groups of [`LANE_WIDTH`] elements in lock-step.
//!
//! Each group starts every lane at the shared guess and keeps a
//! [`ConvergenceMask`] with one flag per lane. While any flag is set, the
//! Newton update is computed for every lane and blended in only where the
//! flag is set, so a lane that has converged keeps its value bit for bit
//! while the slowest lane holds the whole group in the loop.
//!
//! The final partial group is bounds-masked: padding lanes start inactive
//! and are never loaded from or stored to memory.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use super::{needs_refinement, newton_step, tolerance};
use crate::config::{LANE_WIDTH, MAX_ITERATIONS};

#[cfg(target_arch = "x86_64")]
use crate::buffer::is_lane_aligned;
#[cfg(target_arch = "x86_64")]
use crate::config::EPSILON;

/// One flag per lane: `true` while the lane still needs refinement.
pub type ConvergenceMask = [bool; LANE_WIDTH];

// ────────────────────────────────────────────────────────────────────────────
// Portable implementation
// ────────────────────────────────────────────────────────────────────────────

/// Per-lane select: `new` where the mask is set, `old` elsewhere.
#[inline]
fn blend(
    mask: &ConvergenceMask,
    new: &[f32; LANE_WIDTH],
    old: &[f32; LANE_WIDTH],
) -> [f32; LANE_WIDTH] {
    std::array::from_fn(|l| if mask[l] { new[l] } else { old[l] })
}

/// Refine one group; lanes at or beyond `live` are padding and never active.
fn refine_group(initial_guess: f32, s: &[f32; LANE_WIDTH], live: usize) -> [f32; LANE_WIDTH] {
    let tol: [f32; LANE_WIDTH] = std::array::from_fn(|l| tolerance(s[l]));
    let mut x = [initial_guess; LANE_WIDTH];
    let mut mask: ConvergenceMask =
        std::array::from_fn(|l| l < live && needs_refinement(x[l], s[l], tol[l]));

    let mut iterations = 0;
    while mask.iter().any(|&m| m) && iterations < MAX_ITERATIONS {
        let candidate: [f32; LANE_WIDTH] = std::array::from_fn(|l| newton_step(x[l], s[l]));
        let next = blend(&mask, &candidate, &x);
        for l in 0..LANE_WIDTH {
            mask[l] = mask[l] && needs_refinement(next[l], s[l], tol[l]) && next[l] != x[l];
        }
        x = next;
        iterations += 1;
    }
    x
}

/// Portable lane-parallel implementation: `output[i] ≈ sqrt(values[i])`.
///
/// Groups run one after another on the calling thread. Any alignment is
/// accepted.
///
/// # Panics
///
/// Panics if `values.len() != output.len()`.
pub fn sqrt_lanes(initial_guess: f32, values: &[f32], output: &mut [f32]) {
    assert_eq!(values.len(), output.len(), "values/output length mismatch");

    let mut groups = values.chunks_exact(LANE_WIDTH);
    let mut outs = output.chunks_exact_mut(LANE_WIDTH);
    for (s, out) in groups.by_ref().zip(outs.by_ref()) {
        let mut lanes = [0.0_f32; LANE_WIDTH];
        lanes.copy_from_slice(s);
        out.copy_from_slice(&refine_group(initial_guess, &lanes, LANE_WIDTH));
    }

    // Partial tail group
    let tail = groups.remainder();
    if !tail.is_empty() {
        let live = tail.len();
        let mut lanes = [0.0_f32; LANE_WIDTH];
        lanes[..live].copy_from_slice(tail);
        let x = refine_group(initial_guess, &lanes, live);
        outs.into_remainder().copy_from_slice(&x[..live]);
    }
}

/// Lock-step cost of the lane kernels over `values`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct LaneUtilization {
    /// Newton steps that changed a lane's value.
    pub useful: u64,
    /// Lane-steps issued: each group's longest lane times [`LANE_WIDTH`].
    pub issued: u64,
}

impl LaneUtilization {
    /// Fraction of issued lane-steps that did useful work (1.0 when idle).
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        if self.issued == 0 {
            1.0
        } else {
            self.useful as f64 / self.issued as f64
        }
    }

    /// Account for one lane group given each lane's iteration count.
    pub fn record_group(&mut self, iterations: impl IntoIterator<Item = u32>) {
        let mut longest = 0;
        for iters in iterations {
            self.useful += u64::from(iters);
            longest = longest.max(iters);
        }
        self.issued += u64::from(longest) * LANE_WIDTH as u64;
    }
}

/// Measure how much of the lane kernels' work is wasted on converged lanes.
pub fn lane_utilization(initial_guess: f32, values: &[f32]) -> LaneUtilization {
    let mut util = LaneUtilization::default();
    for group in values.chunks(LANE_WIDTH) {
        util.record_group(
            group
                .iter()
                .map(|&s| super::scalar::solve(s, initial_guess).iterations),
        );
    }
    util
}

// ────────────────────────────────────────────────────────────────────────────
// AVX2 implementation
// ────────────────────────────────────────────────────────────────────────────

/// Whether the running CPU supports the AVX2 kernel.
pub fn avx2_available() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        is_x86_feature_detected!("avx2")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

/// Lanes where `|x^2 - s| > tol`, `x != 0`, and `live` is set.
#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn refine_mask_avx2(x: __m256, s: __m256, tol: __m256, live: __m256) -> __m256 {
    let sign = _mm256_set1_ps(-0.0);
    let err = _mm256_andnot_ps(sign, _mm256_sub_ps(_mm256_mul_ps(x, x), s));
    let outside = _mm256_cmp_ps(err, tol, _CMP_GT_OQ);
    let nonzero = _mm256_cmp_ps(x, _mm256_setzero_ps(), _CMP_NEQ_UQ);
    _mm256_and_ps(live, _mm256_and_ps(outside, nonzero))
}

/// Refine one `__m256` group of `s` values; inactive lanes in `live` stay at the guess.
#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn refine_group_avx2(initial_guess: __m256, s: __m256, live: __m256) -> __m256 {
    let half = _mm256_set1_ps(0.5);
    let tol = _mm256_mul_ps(
        _mm256_set1_ps(EPSILON),
        _mm256_min_ps(s, _mm256_set1_ps(1.0)),
    );

    let mut x = initial_guess;
    let mut mask = refine_mask_avx2(x, s, tol, live);
    let mut iterations = 0;
    while _mm256_movemask_ps(mask) != 0 && iterations < MAX_ITERATIONS {
        // x' = 0.5 * (x + s / x) in every lane
        let candidate = _mm256_mul_ps(half, _mm256_add_ps(x, _mm256_div_ps(s, x)));
        let next = _mm256_blendv_ps(x, candidate, mask);
        let moved = _mm256_cmp_ps(next, x, _CMP_NEQ_UQ);
        mask = _mm256_and_ps(refine_mask_avx2(next, s, tol, mask), moved);
        x = next;
        iterations += 1;
    }
    x
}

/// AVX2 lane-parallel implementation: `output[i] ≈ sqrt(values[i])`.
///
/// Full groups use aligned `_mm256_load_ps` / `_mm256_store_ps`; the tail
/// group uses `_mm256_maskload_ps` / `_mm256_maskstore_ps` so no byte
/// outside either slice is touched.
///
/// # Safety
///
/// Requires AVX2 support. Caller must verify with `is_x86_feature_detected!("avx2")`.
/// Both `values` and `output` must start on a
/// [`LANE_ALIGN`](crate::config::LANE_ALIGN)-byte boundary; this is not
/// checked in release builds.
///
/// # Panics
///
/// Panics if `values.len() != output.len()`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
pub unsafe fn sqrt_avx2(initial_guess: f32, values: &[f32], output: &mut [f32]) {
    assert_eq!(values.len(), output.len(), "values/output length mismatch");
    debug_assert!(
        values.is_empty() || (is_lane_aligned(values) && is_lane_aligned(output)),
        "sqrt_avx2 requires lane-aligned buffers"
    );

    let n = values.len();
    let full = n - n % LANE_WIDTH;

    // SAFETY: caller guarantees AVX2 and alignment; every offset below is in bounds.
    unsafe {
        let guess = _mm256_set1_ps(initial_guess);
        let all = _mm256_castsi256_ps(_mm256_set1_epi32(-1));

        let mut i = 0;
        while i < full {
            let s = _mm256_load_ps(values.as_ptr().add(i));
            let x = refine_group_avx2(guess, s, all);
            _mm256_store_ps(output.as_mut_ptr().add(i), x);
            i += LANE_WIDTH;
        }

        // Bounds-masked tail
        if full < n {
            let live = (n - full) as i32;
            let bounds = _mm256_cmpgt_epi32(
                _mm256_set1_epi32(live),
                _mm256_setr_epi32(0, 1, 2, 3, 4, 5, 6, 7),
            );
            let s = _mm256_maskload_ps(values.as_ptr().add(full), bounds);
            let x = refine_group_avx2(guess, s, _mm256_castsi256_ps(bounds));
            _mm256_maskstore_ps(output.as_mut_ptr().add(full), bounds, x);
        }
    }
}

/// Lane-parallel kernel with run-time dispatch.
///
/// Uses [`sqrt_avx2`] when the CPU supports AVX2 and both slices are
/// lane-aligned, and [`sqrt_lanes`] otherwise.
///
/// # Panics
///
/// Panics if `values.len() != output.len()`.
pub fn sqrt_simd(initial_guess: f32, values: &[f32], output: &mut [f32]) {
    #[cfg(target_arch = "x86_64")]
    if avx2_available() && is_lane_aligned(values) && is_lane_aligned(output) {
        // SAFETY: AVX2 detected and both slices aligned.
        unsafe { sqrt_avx2(initial_guess, values, output) };
        return;
    }
    sqrt_lanes(initial_guess, values, output);
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AlignedBuffer;
    use crate::kernels::scalar::sqrt_scalar;
    use proptest::prelude::*;

    fn scalar_gold(guess: f32, values: &[f32]) -> Vec<f32> {
        let mut gold = vec![0.0_f32; values.len()];
        sqrt_scalar(guess, values, &mut gold);
        gold
    }

    fn assert_bits_eq(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert_eq!(x.to_bits(), y.to_bits(), "index {i}: {x} vs {y}");
        }
    }

    // ── Portable known-answer tests ──────────────────────────────────────

    #[test]
    fn test_lanes_concrete_scenario() {
        let values = [0.0001_f32, 1.0, 2.0, 4.0, 9.0, 1_000_000.0, 2.998, 0.5];
        let expected = [0.01_f32, 1.0, 1.41421, 2.0, 3.0, 1000.0, 1.7315, 0.70711];
        let mut output = [0.0_f32; 8];
        sqrt_lanes(1.0, &values, &mut output);
        for i in 0..8 {
            assert!(
                (output[i] - expected[i]).abs() <= 1e-4,
                "output[{i}] = {}, expected {}",
                output[i],
                expected[i]
            );
        }
        assert_bits_eq(&output, &scalar_gold(1.0, &values));
    }

    #[test]
    fn test_converged_lane_is_not_perturbed() {
        // Lane 0 converges at the guess; lane 1 keeps the group iterating.
        let mut s = [1.0_f32; LANE_WIDTH];
        s[1] = 2.999;
        let x = refine_group(1.0, &s, LANE_WIDTH);
        assert_eq!(x[0].to_bits(), 1.0_f32.to_bits());
        assert!((x[1] - 2.999_f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn test_padding_lanes_stay_at_guess() {
        let s = [4.0_f32, 9.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let x = refine_group(1.0, &s, 2);
        assert_eq!(x[0], 2.0);
        assert_eq!(x[1], 3.0);
        for l in 2..LANE_WIDTH {
            assert_eq!(x[l], 1.0, "padding lane {l} was refined");
        }
    }

    #[test]
    fn test_lanes_tail_does_not_write_past_end() {
        for n in 1..=2 * LANE_WIDTH + 1 {
            let values: Vec<f32> = (0..n).map(|i| i as f32 + 0.5).collect();
            let mut output = vec![-7.0_f32; n + LANE_WIDTH];
            sqrt_lanes(1.0, &values, &mut output[..n]);
            assert!(output[n..].iter().all(|&v| v == -7.0), "n = {n}");
            assert_bits_eq(&output[..n], &scalar_gold(1.0, &values));
        }
    }

    #[test]
    fn test_lanes_zero_input() {
        let mut output = [0.0_f32; 3];
        sqrt_lanes(1.0, &[0.0, 0.0, 4.0], &mut output);
        assert_eq!(output[0], f32::from_bits((127 - 75) << 23));
        assert_eq!(output[2], 2.0);
    }

    #[test]
    fn test_lanes_empty() {
        let mut output: [f32; 0] = [];
        sqrt_lanes(1.0, &[], &mut output);
    }

    #[test]
    #[should_panic(expected = "values/output length mismatch")]
    fn test_lanes_length_mismatch() {
        let mut output = [0.0_f32; 4];
        sqrt_lanes(1.0, &[1.0; 5], &mut output);
    }

    #[test]
    fn test_utilization_divergent_group() {
        let mut values = [1.0_f32; LANE_WIDTH];
        values[0] = 2.999;
        let util = lane_utilization(1.0, &values);
        let slow = crate::kernels::scalar::solve(2.999, 1.0).iterations;
        assert_eq!(util.useful, u64::from(slow));
        assert_eq!(util.issued, u64::from(slow) * LANE_WIDTH as u64);
        assert!(util.ratio() < 0.2);
    }

    #[test]
    fn test_utilization_idle() {
        let util = lane_utilization(1.0, &[1.0; 16]);
        assert_eq!(util.issued, 0);
        assert!((util.ratio() - 1.0).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_lanes_match_scalar(
            v in proptest::collection::vec(0.0_f32..1e6, 0..100),
            g in 0.5_f32..8.0
        ) {
            let mut out = vec![0.0_f32; v.len()];
            sqrt_lanes(g, &v, &mut out);
            let gold = scalar_gold(g, &v);
            for i in 0..v.len() {
                prop_assert_eq!(out[i].to_bits(), gold[i].to_bits(), "index {}", i);
            }
        }
    }

    // ── AVX2 parity tests ────────────────────────────────────────────────

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx2_concrete_scenario() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }
        let values = AlignedBuffer::from_slice(&[
            0.0001, 1.0, 2.0, 4.0, 9.0, 1_000_000.0, 2.998, 0.5,
        ])
        .unwrap();
        let mut output = AlignedBuffer::zeroed(8).unwrap();
        unsafe { sqrt_avx2(1.0, &values, &mut output) };
        assert_bits_eq(&output, &scalar_gold(1.0, &values));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx2_masked_tail() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }
        for n in 1..=2 * LANE_WIDTH + 3 {
            let host: Vec<f32> = (0..n).map(|i| (i * i) as f32 + 0.25).collect();
            let values = AlignedBuffer::from_slice(&host).unwrap();
            let mut output = AlignedBuffer::zeroed(n + LANE_WIDTH).unwrap();
            output.fill(-7.0);
            unsafe { sqrt_avx2(1.0, &values, &mut output[..n]) };
            assert!(output[n..].iter().all(|&v| v == -7.0), "n = {n}");
            assert_bits_eq(&output[..n], &scalar_gold(1.0, &host));
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx2_edge_inputs_match_scalar() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }
        let host = [0.0_f32, -1.0, -4.0, f32::NAN, 1e-30, 3.0e38, 1.0, 2.999];
        let values = AlignedBuffer::from_slice(&host).unwrap();
        let mut output = AlignedBuffer::zeroed(host.len()).unwrap();
        unsafe { sqrt_avx2(1.0, &values, &mut output) };
        assert_bits_eq(&output, &scalar_gold(1.0, &host));
    }

    #[test]
    fn test_simd_dispatch_unaligned_falls_back() {
        let buf = AlignedBuffer::from_slice(&[4.0_f32; 17]).unwrap();
        let mut out = AlignedBuffer::zeroed(17).unwrap();
        sqrt_simd(1.0, &buf[1..], &mut out[1..]);
        assert!(out[1..].iter().all(|&v| v == 2.0));
        assert_eq!(out[0], 0.0);
    }

    #[cfg(target_arch = "x86_64")]
    proptest! {
        #[test]
        fn prop_avx2_parity(
            v in proptest::collection::vec(0.0_f32..1e6, 1..100),
            g in 0.5_f32..8.0
        ) {
            if !is_x86_feature_detected!("avx2") {
                return Ok(());
            }
            let values = AlignedBuffer::from_slice(&v).unwrap();
            let mut out = AlignedBuffer::zeroed(v.len()).unwrap();
            unsafe { sqrt_avx2(g, &values, &mut out) };
            let gold = scalar_gold(g, &v);
            for i in 0..v.len() {
                prop_assert_eq!(out[i].to_bits(), gold[i].to_bits(), "index {}", i);
            }
        }
    }
}
