// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! # SocialSim CLI
//!
//! Scores stored simulation measurement results against ground truth.
//!
//! ## Usage
//!
//! ```bash
//! # Compare two result collections, report to stdout
//! socialsim compare --ground-truth gt.json --simulation sim.json --config metrics.json
//!
//! # Bounded metrics on four threads, report to a file
//! socialsim compare -g gt.json -s sim.json -c metrics.json --threads 4 --timeout-ms 5000 -o report.json
//!
//! # Weight of the top ten ranks for RBO with p = 0.9
//! socialsim rbo-weight --depth 10 --p 0.9
//! ```

mod compare;

use clap::{Parser, Subcommand};
use compare::{compare, write_report, CompareInputs};
use socialsim::{rbo_weight, RunnerConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// SocialSim simulation evaluation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the configured metrics over two measurement-result files
    Compare {
        /// Ground-truth results (JSON)
        #[arg(short, long)]
        ground_truth: PathBuf,

        /// Simulation results (JSON)
        #[arg(short, long)]
        simulation: PathBuf,

        /// Metric configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Worker threads
        #[arg(long)]
        threads: Option<usize>,

        /// Per-metric deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Run metrics one after another
        #[arg(long, default_value = "false")]
        sequential: bool,
    },

    /// Print the weight RBO puts on the top ranks
    RboWeight {
        /// Number of top ranks
        #[arg(long)]
        depth: usize,

        /// Persistence parameter in (0, 1)
        #[arg(long, default_value = "0.95")]
        p: f64,
    },
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn runner_config(threads: Option<usize>, timeout_ms: Option<u64>, sequential: bool) -> RunnerConfig {
    RunnerConfig {
        parallel: !sequential,
        max_threads: threads,
        metric_timeout_ms: timeout_ms,
        ..RunnerConfig::default()
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    info!("SocialSim v{}", socialsim::VERSION);

    match args.command {
        Command::Compare {
            ground_truth,
            simulation,
            config,
            output,
            threads,
            timeout_ms,
            sequential,
        } => {
            let inputs = CompareInputs {
                ground_truth,
                simulation,
                config,
            };
            let runner = runner_config(threads, timeout_ms, sequential);
            let outcome = compare(&inputs, &runner)
                .and_then(|report| write_report(&report, output.as_deref()));
            if let Err(e) = outcome {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
        Command::RboWeight { depth, p } => match rbo_weight(depth, p) {
            Ok(weight) => println!("{}", weight),
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compare() {
        let args = Args::try_parse_from([
            "socialsim",
            "compare",
            "-g",
            "gt.json",
            "--simulation",
            "sim.json",
            "-c",
            "metrics.json",
            "--threads",
            "4",
            "--timeout-ms",
            "250",
        ])
        .unwrap();

        match args.command {
            Command::Compare {
                ground_truth,
                threads,
                timeout_ms,
                sequential,
                output,
                ..
            } => {
                assert_eq!(ground_truth, PathBuf::from("gt.json"));
                assert_eq!(threads, Some(4));
                assert_eq!(timeout_ms, Some(250));
                assert!(!sequential);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_parse_rbo_weight() {
        let args =
            Args::try_parse_from(["socialsim", "--log-level", "debug", "rbo-weight", "--depth", "10", "--p", "0.9"])
                .unwrap();
        match args.command {
            Command::RboWeight { depth, p } => {
                assert_eq!(depth, 10);
                assert_eq!(p, 0.9);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(args.log_level, "debug");
    }

    #[test]
    fn test_compare_requires_inputs() {
        assert!(Args::try_parse_from(["socialsim", "compare", "-g", "gt.json"]).is_err());
    }

    #[test]
    fn test_runner_config_from_flags() {
        let runner = runner_config(Some(2), Some(100), true);
        assert!(!runner.parallel);
        assert_eq!(runner.max_threads, Some(2));
        assert_eq!(runner.metric_timeout_ms, Some(100));
        assert!(!runner.fast_iteration);
    }
}
