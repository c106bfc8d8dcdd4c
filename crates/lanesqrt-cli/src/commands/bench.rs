use std::path::Path;

use lanesqrt::bench::{BenchSession, default_variants, format_text};
use lanesqrt::config::{BenchConfig, parse_config};
use lanesqrt::workload::Workload;

use super::OutputFormat;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub count: Option<usize>,
    pub workers: Option<usize>,
    pub initial_guess: Option<f32>,
    pub trials: Option<usize>,
    pub workload: Option<String>,
    pub seed: Option<u64>,
}

impl Overrides {
    fn apply(&self, config: &mut BenchConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(count) = self.count {
            config.count = count;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(guess) = self.initial_guess {
            config.initial_guess = guess;
        }
        if let Some(trials) = self.trials {
            config.trials = trials;
        }
        if let Some(ref name) = self.workload {
            config.workload = name.parse::<Workload>()?;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(())
    }
}

pub fn run(
    config_path: Option<&Path>,
    overrides: &Overrides,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(path) => parse_config(path)?,
        None => BenchConfig::default(),
    };
    overrides.apply(&mut config)?;
    log::debug!("bench config: {config:?}");

    let mut session = BenchSession::new(&config)?;
    let report = session.run(&default_variants(config.workers))?;

    match format {
        OutputFormat::Text => print!("{}", format_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    if !report.passed() {
        log::warn!("one or more variants disagreed with the scalar reference");
    }
    Ok(())
}
