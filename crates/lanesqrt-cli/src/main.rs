use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

/// Top-level CLI argument parser for the `lsq` command
#[derive(Parser)]
#[command(
    name = "lsq",
    about = "lanesqrt — lane-parallel Newton-Raphson square roots",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `lsq` CLI
#[derive(Subcommand)]
enum Commands {
    /// Benchmark every kernel variant against the scalar reference
    Bench {
        /// YAML run configuration (flags override its values)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of input elements
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Worker count for the partitioned variant (1-32)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Initial Newton-Raphson guess
        #[arg(long, allow_negative_numbers = true)]
        guess: Option<f32>,
        /// Timing trials per variant
        #[arg(long)]
        trials: Option<usize>,
        /// Input workload: random, uniform, trivial, divergent
        #[arg(long)]
        workload: Option<String>,
        /// Seed for the random workload
        #[arg(long)]
        seed: Option<u64>,
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Compute square roots of the given values
    Solve {
        /// Input values
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f32>,
        /// Initial Newton-Raphson guess
        #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
        guess: f32,
        /// Kernel backend: scalar, lanes, avx2
        #[arg(long, default_value = "scalar")]
        backend: String,
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show how an element count splits across workers
    Partition {
        /// Number of elements
        #[arg(short = 'n', long)]
        count: usize,
        /// Worker count (1-32)
        #[arg(short, long)]
        workers: usize,
    },
}

fn run_command(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Bench {
            config,
            count,
            workers,
            guess,
            trials,
            workload,
            seed,
            format,
        } => {
            let fmt = commands::OutputFormat::from_str(&format)?;
            let overrides = commands::bench::Overrides {
                count,
                workers,
                initial_guess: guess,
                trials,
                workload,
                seed,
            };
            commands::bench::run(config.as_deref(), &overrides, fmt)
        }
        Commands::Solve {
            values,
            guess,
            backend,
            format,
        } => {
            let fmt = commands::OutputFormat::from_str(&format)?;
            commands::solve::run(&values, guess, &backend, fmt)
        }
        Commands::Partition { count, workers } => commands::partition::run(count, workers),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run_command(cli.command) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bench(workers: Option<usize>, format: &str) -> Commands {
        Commands::Bench {
            config: None,
            count: Some(1000),
            workers,
            guess: None,
            trials: Some(1),
            workload: Some("divergent".to_string()),
            seed: None,
            format: format.to_string(),
        }
    }

    #[test]
    fn dispatch_bench() {
        assert!(run_command(bench(Some(4), "text")).is_ok());
    }

    #[test]
    fn dispatch_bench_json() {
        assert!(run_command(bench(Some(2), "json")).is_ok());
    }

    #[test]
    fn dispatch_bench_too_many_workers() {
        assert!(run_command(bench(Some(33), "text")).is_err());
    }

    #[test]
    fn dispatch_bench_unknown_format() {
        assert!(run_command(bench(Some(1), "xml")).is_err());
    }

    #[test]
    fn dispatch_solve() {
        let result = run_command(Commands::Solve {
            values: vec![0.0001, 1.0, 2.0, 4.0, 9.0],
            guess: 1.0,
            backend: "lanes".to_string(),
            format: "text".to_string(),
        });
        assert!(result.is_ok());
    }

    #[test]
    fn dispatch_solve_unknown_backend() {
        let result = run_command(Commands::Solve {
            values: vec![4.0],
            guess: 1.0,
            backend: "neon".to_string(),
            format: "text".to_string(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn dispatch_partition() {
        assert!(run_command(Commands::Partition {
            count: 100,
            workers: 3,
        })
        .is_ok());
    }

    #[test]
    fn dispatch_partition_no_workers() {
        assert!(run_command(Commands::Partition {
            count: 100,
            workers: 0,
        })
        .is_err());
    }

    #[test]
    fn cli_parses_negative_values() {
        let cli = Cli::try_parse_from(["lsq", "solve", "-4", "2", "--guess", "0.5"]).unwrap();
        match cli.command {
            Commands::Solve { values, guess, .. } => {
                assert_eq!(values, vec![-4.0, 2.0]);
                assert!((guess - 0.5).abs() < f32::EPSILON);
            }
            _ => panic!("expected solve"),
        }
    }
}
