//! Task partitioning: run a kernel over disjoint ranges on scoped workers.
//!
//! `[0, count)` is split into contiguous ranges that start on multiples of
//! [`LANE_WIDTH`], so each range of an aligned buffer is itself aligned and
//! can take the AVX2 kernel. Workers borrow disjoint `split_at_mut`
//! slices; the scope join is the only synchronization.

use std::ops::Range;

use serde::Serialize;

use crate::config::{LANE_WIDTH, check_workers};
use crate::error::SqrtError;
use crate::kernels::{Backend, KernelFn};

/// Split `[0, count)` into at most `workers` contiguous ranges.
///
/// Work is dealt out in whole groups of [`LANE_WIDTH`] elements: with
/// `g = ceil(count / LANE_WIDTH)` groups, worker `w` takes `g / workers`
/// groups plus one more while `w < g % workers`. Every range starts on a
/// group boundary, and only the last range can end on a partial group.
/// Fewer ranges than workers come back only when there are fewer groups
/// than workers.
///
/// # Errors
///
/// [`SqrtError::NoWorkers`] or [`SqrtError::TooManyWorkers`] if `workers`
/// is outside `1..=MAX_WORKERS`.
pub fn partition(count: usize, workers: usize) -> Result<Vec<Range<usize>>, SqrtError> {
    check_workers(workers)?;
    let groups = count.div_ceil(LANE_WIDTH);
    let (base, extra) = (groups / workers, groups % workers);

    let mut ranges = Vec::with_capacity(workers.min(groups));
    let mut start = 0;
    for w in 0..workers {
        let end = start + base + usize::from(w < extra);
        if end > start {
            ranges.push((start * LANE_WIDTH).min(count)..(end * LANE_WIDTH).min(count));
        }
        start = end;
    }
    Ok(ranges)
}

/// Run `kernel` over `values` split across `workers` fork-join workers.
///
/// The first range runs on the calling thread; the rest on scoped threads.
/// Returns only after every range has completed. A panicking worker
/// propagates its panic after the join.
///
/// # Errors
///
/// Returns a worker-count error before any work starts, or
/// [`SqrtError::LengthMismatch`] if the slices differ in length.
pub fn run_partitioned(
    kernel: KernelFn,
    initial_guess: f32,
    values: &[f32],
    output: &mut [f32],
    workers: usize,
) -> Result<(), SqrtError> {
    if values.len() != output.len() {
        return Err(SqrtError::LengthMismatch {
            values: values.len(),
            output: output.len(),
        });
    }
    let ranges = partition(values.len(), workers)?;
    log::debug!(
        "dispatching {} elements over {} ranges ({workers} workers requested)",
        values.len(),
        ranges.len()
    );

    // Carve disjoint (input, output) slices in range order.
    let mut jobs = Vec::with_capacity(ranges.len());
    let mut rest_in = values;
    let mut rest_out = output;
    for r in &ranges {
        let (vin, tail_in) = rest_in.split_at(r.len());
        let (vout, tail_out) = rest_out.split_at_mut(r.len());
        jobs.push((vin, vout));
        rest_in = tail_in;
        rest_out = tail_out;
    }

    let mut jobs = jobs.into_iter();
    let Some((first_in, first_out)) = jobs.next() else {
        return Ok(());
    };
    std::thread::scope(|s| {
        for (vin, vout) in jobs {
            s.spawn(move || kernel(initial_guess, vin, vout));
        }
        kernel(initial_guess, first_in, first_out);
    });
    Ok(())
}

/// A kernel backend paired with a worker count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskKernel {
    pub backend: Backend,
    pub workers: usize,
}

impl TaskKernel {
    pub fn new(backend: Backend, workers: usize) -> Self {
        Self { backend, workers }
    }

    /// Run the partitioned kernel.
    ///
    /// # Errors
    ///
    /// Same as [`run_partitioned`].
    pub fn run(
        &self,
        initial_guess: f32,
        values: &[f32],
        output: &mut [f32],
    ) -> Result<(), SqrtError> {
        run_partitioned(
            self.backend.kernel(),
            initial_guess,
            values,
            output,
            self.workers,
        )
    }
}
