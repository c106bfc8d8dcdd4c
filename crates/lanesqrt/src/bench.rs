//! Benchmark harness: min-of-N timing, verification, speedup reports.
//!
//! A [`BenchSession`] owns the aligned input and output buffers and the
//! gold output for its lifetime. Each [`Variant`] runs [`TrialPolicy::trials`]
//! times on a freshly zeroed output buffer and only the fastest trial
//! counts. After the last trial the output is verified against gold; any
//! discrepancy is kept in the report without stopping the remaining
//! variants.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::buffer::AlignedBuffer;
use crate::config::{BenchConfig, DEFAULT_TRIALS, LANE_WIDTH, check_workers};
use crate::error::SqrtError;
use crate::kernels::lanes::{self, LaneUtilization, avx2_available};
use crate::kernels::scalar::{self, ConvergenceCensus};
use crate::kernels::{Backend, KernelFn};
use crate::partition::TaskKernel;
use crate::verify::{Discrepancy, verify_result};
use crate::workload::Workload;

// ============================================================================
// Trial policy
// ============================================================================

/// Repeated-trial timing policy: keep the minimum of N wall-clock runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialPolicy {
    pub trials: usize,
}

impl Default for TrialPolicy {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
        }
    }
}

/// Durations of every trial plus the minimum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub min: Duration,
    pub trials: Vec<Duration>,
}

impl TrialPolicy {
    #[must_use]
    pub fn new(trials: usize) -> Self {
        Self { trials }
    }

    /// Time `trial` `self.trials` times, running `setup` untimed before each.
    ///
    /// Both closures get `state` mutably, typically the output buffer.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `trial`.
    pub fn measure<T: ?Sized, E>(
        &self,
        state: &mut T,
        mut setup: impl FnMut(&mut T),
        mut trial: impl FnMut(&mut T) -> Result<(), E>,
    ) -> Result<Timing, E> {
        let mut trials = Vec::with_capacity(self.trials);
        let mut min = Duration::MAX;
        for _ in 0..self.trials {
            setup(state);
            let start = Instant::now();
            trial(state)?;
            let elapsed = start.elapsed();
            min = min.min(elapsed);
            trials.push(elapsed);
        }
        if trials.is_empty() {
            min = Duration::ZERO;
        }
        Ok(Timing { min, trials })
    }
}

// ============================================================================
// Variants
// ============================================================================

/// A kernel configuration to benchmark.
#[derive(Debug, Clone, Copy)]
pub enum Variant {
    /// Scalar reference; the baseline for every speedup.
    Scalar,
    /// Portable lane kernel.
    Lanes,
    /// AVX2 lane kernel. Runs and is named as the portable lanes when the
    /// CPU lacks AVX2.
    Avx2,
    /// A lane or scalar kernel partitioned across workers.
    Tasks(TaskKernel),
    /// Any kernel with the uniform signature.
    Custom {
        name: &'static str,
        kernel: KernelFn,
    },
}

impl Variant {
    pub fn name(&self) -> String {
        match self {
            Variant::Scalar => "sqrt serial".to_string(),
            Variant::Lanes => "sqrt lanes".to_string(),
            Variant::Avx2 if avx2_available() => "sqrt avx2".to_string(),
            Variant::Avx2 => "sqrt lanes (avx2 unavailable)".to_string(),
            Variant::Tasks(task) => {
                format!("sqrt task {} x{}", task.backend.effective(), task.workers)
            }
            Variant::Custom { name, .. } => (*name).to_string(),
        }
    }

    fn check(&self) -> Result<(), SqrtError> {
        match self {
            Variant::Tasks(task) => check_workers(task.workers),
            _ => Ok(()),
        }
    }

    fn run(&self, initial_guess: f32, values: &[f32], output: &mut [f32]) -> Result<(), SqrtError> {
        match self {
            Variant::Scalar => scalar::sqrt_scalar(initial_guess, values, output),
            Variant::Lanes => lanes::sqrt_lanes(initial_guess, values, output),
            Variant::Avx2 => lanes::sqrt_simd(initial_guess, values, output),
            Variant::Tasks(task) => task.run(initial_guess, values, output)?,
            Variant::Custom { kernel, .. } => kernel(initial_guess, values, output),
        }
        Ok(())
    }
}

/// Scalar, portable lanes, AVX2 when the CPU has it, and the fastest lane
/// kernel partitioned over `workers`.
pub fn default_variants(workers: usize) -> Vec<Variant> {
    let vector = if avx2_available() {
        Backend::Avx2
    } else {
        Backend::Lanes
    };
    let mut variants = vec![Variant::Scalar, Variant::Lanes];
    if vector == Backend::Avx2 {
        variants.push(Variant::Avx2);
    }
    variants.push(Variant::Tasks(TaskKernel::new(vector, workers)));
    variants
}

// ============================================================================
// Report
// ============================================================================

/// Timing and verification outcome of one variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantResult {
    pub name: String,
    pub min_ms: f64,
    pub trial_ms: Vec<f64>,
    pub discrepancies: Vec<Discrepancy>,
}

impl VariantResult {
    pub fn passed(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Speedup of one variant over the scalar reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Speedup {
    pub name: String,
    pub ratio: f64,
}

/// Results of a whole session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchReport {
    pub count: usize,
    pub initial_guess: f32,
    pub workload: Workload,
    pub census: ConvergenceCensus,
    pub utilization: LaneUtilization,
    pub reference: VariantResult,
    pub variants: Vec<VariantResult>,
}

impl BenchReport {
    /// `reference.min / variant.min` for every non-reference variant.
    pub fn speedups(&self) -> Vec<Speedup> {
        self.variants
            .iter()
            .map(|v| Speedup {
                name: v.name.clone(),
                ratio: if v.min_ms > 0.0 {
                    self.reference.min_ms / v.min_ms
                } else {
                    f64::INFINITY
                },
            })
            .collect()
    }

    /// Whether every variant (reference included) matched gold.
    pub fn passed(&self) -> bool {
        self.reference.passed() && self.variants.iter().all(VariantResult::passed)
    }
}

/// Render a report as human-readable text.
pub fn format_text(report: &BenchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} elements, workload {}, initial guess {}",
        report.count, report.workload, report.initial_guess
    );
    let c = &report.census;
    let _ = writeln!(
        out,
        "convergence: {} converged, {} stalled, {} capped (max {} iterations)",
        c.converged, c.stalled, c.capped, c.max_iterations
    );
    let _ = writeln!(
        out,
        "lane utilization: {:.1}%",
        report.utilization.ratio() * 100.0
    );
    for result in std::iter::once(&report.reference).chain(&report.variants) {
        let _ = writeln!(out, "[{}]:\t\t[{:.3}] ms", result.name, result.min_ms);
        for d in &result.discrepancies {
            let _ = writeln!(out, "{d}");
        }
    }
    for s in report.speedups() {
        let _ = writeln!(out, "\t\t\t\t({:.2}x speedup from {})", s.ratio, s.name);
    }
    out
}

// ============================================================================
// Session
// ============================================================================

/// Buffers and gold output shared by every variant of one benchmark run.
pub struct BenchSession {
    config: BenchConfig,
    policy: TrialPolicy,
    values: AlignedBuffer,
    output: AlignedBuffer,
    gold: Vec<f32>,
    census: ConvergenceCensus,
    utilization: LaneUtilization,
}

impl BenchSession {
    /// Validate `config`, allocate buffers, fill the workload, and compute gold.
    ///
    /// # Errors
    ///
    /// Configuration errors, or [`SqrtError::Allocation`] if a buffer cannot
    /// be allocated.
    pub fn new(config: &BenchConfig) -> Result<Self, SqrtError> {
        config.validate()?;
        let mut values = AlignedBuffer::zeroed(config.count)?;
        let output = AlignedBuffer::zeroed(config.count)?;
        config.workload.fill(config.seed, &mut values);
        Self::with_values(config, values, output)
    }

    /// Build a session over caller-supplied input values.
    ///
    /// `config.count` becomes the input length; `config.workload` is only
    /// carried into the report.
    ///
    /// # Errors
    ///
    /// Same as [`BenchSession::new`].
    pub fn from_values(config: &BenchConfig, values: &[f32]) -> Result<Self, SqrtError> {
        let config = BenchConfig {
            count: values.len(),
            ..config.clone()
        };
        config.validate()?;
        let values = AlignedBuffer::from_slice(values)?;
        let output = AlignedBuffer::zeroed(values.len())?;
        Self::with_values(&config, values, output)
    }

    fn with_values(
        config: &BenchConfig,
        values: AlignedBuffer,
        output: AlignedBuffer,
    ) -> Result<Self, SqrtError> {
        let mut gold = vec![0.0_f32; values.len()];
        let mut census = ConvergenceCensus::default();
        let mut utilization = LaneUtilization::default();
        let mut iterations = [0_u32; LANE_WIDTH];
        for (group, out) in values.chunks(LANE_WIDTH).zip(gold.chunks_mut(LANE_WIDTH)) {
            for ((&s, g), iters) in group.iter().zip(out.iter_mut()).zip(&mut iterations) {
                let sol = scalar::solve(s, config.initial_guess);
                *g = sol.value;
                *iters = sol.iterations;
                census.record(&sol);
            }
            utilization.record_group(iterations[..group.len()].iter().copied());
        }

        if census.capped > 0 {
            log::warn!(
                "{} of {} elements hit the iteration cap",
                census.capped,
                census.elements()
            );
        }
        log::info!(
            "session: {} elements, workload {}, {:.1}% lane utilization",
            values.len(),
            config.workload,
            utilization.ratio() * 100.0
        );

        Ok(Self {
            config: config.clone(),
            policy: TrialPolicy::new(config.trials),
            values,
            output,
            gold,
            census,
            utilization,
        })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn gold(&self) -> &[f32] {
        &self.gold
    }

    pub fn output(&self) -> &[f32] {
        &self.output
    }

    pub fn census(&self) -> ConvergenceCensus {
        self.census
    }

    /// Time one variant and verify its final output.
    ///
    /// # Errors
    ///
    /// Propagates worker-count errors from partitioned variants.
    pub fn run_variant(&mut self, variant: &Variant) -> Result<VariantResult, SqrtError> {
        variant.check()?;
        let name = variant.name();
        let wanted_avx2 = match variant {
            Variant::Avx2 => true,
            Variant::Tasks(task) => task.backend == Backend::Avx2,
            _ => false,
        };
        if wanted_avx2 && !avx2_available() {
            log::warn!("{name}: AVX2 not supported by this CPU, running portable lanes");
        }
        let guess = self.config.initial_guess;
        let values = &self.values;
        let timing = self.policy.measure(
            &mut self.output,
            |output| output.clear(),
            |output| variant.run(guess, values, output),
        )?;
        for (i, t) in timing.trials.iter().enumerate() {
            log::debug!("{name}: trial {i} took {t:?}");
        }

        let discrepancies = verify_result(&self.output, &self.gold);
        for d in &discrepancies {
            log::warn!("{name}: {d}");
        }
        if !discrepancies.is_empty() {
            log::warn!(
                "{name}: {} of {} elements outside tolerance",
                discrepancies.len(),
                self.gold.len()
            );
        }
        let min_ms = timing.min.as_secs_f64() * 1000.0;
        log::info!("{name}: {min_ms:.3} ms");

        Ok(VariantResult {
            name,
            min_ms,
            trial_ms: timing
                .trials
                .iter()
                .map(|t| t.as_secs_f64() * 1000.0)
                .collect(),
            discrepancies,
        })
    }

    /// Run the scalar reference followed by every other listed variant.
    ///
    /// # Errors
    ///
    /// Any invalid variant is reported before the first trial starts.
    pub fn run(&mut self, variants: &[Variant]) -> Result<BenchReport, SqrtError> {
        for v in variants {
            v.check()?;
        }
        let reference = self.run_variant(&Variant::Scalar)?;
        let mut results = Vec::new();
        for v in variants.iter().filter(|v| !matches!(v, Variant::Scalar)) {
            results.push(self.run_variant(v)?);
        }
        Ok(BenchReport {
            count: self.values.len(),
            initial_guess: self.config.initial_guess,
            workload: self.config.workload,
            census: self.census,
            utilization: self.utilization,
            reference,
            variants: results,
        })
    }
}
