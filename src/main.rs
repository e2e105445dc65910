// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI tool timing a sequential and a parallel vector addition.

use clap::{Parser, ValueEnum};
#[cfg(feature = "log")]
use log::info;
use std::error::Error as _;
use std::num::{NonZeroU32, NonZeroUsize};
use std::process::ExitCode;
use thiserror::Error;
use vecadd::bench::{self, BenchConfig, Report};
use vecadd::workload::{self, Workload};
#[cfg(feature = "rayon")]
use vecadd::RayonPool;
use vecadd::{CpuPinningPolicy, ParallelFor, RangeStrategy, ThreadCount, ThreadPoolBuilder};

#[cfg(not(feature = "log"))]
macro_rules! info {
    ( $($args:tt)* ) => {
        ()
    };
}

fn main() -> ExitCode {
    #[cfg(feature = "log")]
    env_logger::init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(report) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("Caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

/// Errors of the CLI tool.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Bench(#[from] vecadd::Error),
    #[cfg_attr(feature = "rayon", allow(dead_code))]
    #[error("the rayon backend requires building with the `rayon` feature")]
    RayonUnavailable,
}

fn run(cli: &Cli) -> Result<Report, CliError> {
    let seed = cli.seed.unwrap_or_else(workload::random_seed);
    info!("Generating 2 x {} random elements with seed {seed}", cli.len);
    let mut workload = Workload::random(cli.len, seed);
    let config = cli.bench_config();

    match cli.backend {
        Backend::Pool => {
            let thread_pool = ThreadPoolBuilder {
                num_threads: cli.thread_count(),
                range_strategy: cli.range_strategy(),
                cpu_pinning: cli.cpu_pinning.into(),
            }
            .build()?;
            Ok(run_with(&thread_pool, &mut workload, &config)?)
        }
        #[cfg(feature = "rayon")]
        Backend::Rayon => {
            let thread_pool = RayonPool::new(cli.thread_count())?;
            Ok(run_with(&thread_pool, &mut workload, &config)?)
        }
        #[cfg(not(feature = "rayon"))]
        Backend::Rayon => Err(CliError::RayonUnavailable),
    }
}

fn run_with(
    thread_pool: &impl ParallelFor,
    workload: &mut Workload,
    config: &BenchConfig,
) -> Result<Report, vecadd::Error> {
    info!(
        "Adding {} elements on {} threads",
        workload.len(),
        thread_pool.num_threads()
    );
    let report = bench::run(thread_pool, workload, config)?;
    if let Some(_speedup) = report.speedup() {
        info!("Parallel speedup: {_speedup:.2}x");
    }
    Ok(report)
}

/// CLI tool timing a sequential and a parallel vector addition.
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(version)]
struct Cli {
    /// Number of elements in each vector.
    #[arg(long, default_value_t = workload::DEFAULT_LEN)]
    len: usize,

    /// Number of worker threads. Default to the available parallelism.
    #[arg(long)]
    num_threads: Option<NonZeroUsize>,

    /// Policy to split work among threads.
    #[arg(long, value_enum, default_value_t = RangeStrategyCli::Fixed)]
    range_strategy: RangeStrategyCli,

    /// Number of items per chunk. Used only for the dynamic strategy.
    #[arg(long, default_value = "65536")]
    chunk_size: NonZeroUsize,

    /// Policy to pin worker threads to CPUs.
    #[arg(long, value_enum, default_value_t = CpuPinningCli::No)]
    cpu_pinning: CpuPinningCli,

    /// Thread pool running the parallel addition.
    #[arg(long, value_enum, default_value_t = Backend::Pool)]
    backend: Backend,

    /// Seed of the random inputs. Default to a random seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of times each addition is timed.
    #[arg(long, default_value = "1")]
    repeat: NonZeroU32,

    /// Whether to also time the total sum of the output.
    #[arg(long, default_value_t = false)]
    sum: bool,

    /// Whether to skip checking the outputs.
    #[arg(long, default_value_t = false)]
    no_verify: bool,
}

impl Cli {
    fn thread_count(&self) -> ThreadCount {
        match self.num_threads {
            Some(num_threads) => ThreadCount::Count(num_threads),
            None => ThreadCount::AvailableParallelism,
        }
    }

    fn range_strategy(&self) -> RangeStrategy {
        match self.range_strategy {
            RangeStrategyCli::Fixed => RangeStrategy::Fixed,
            RangeStrategyCli::Dynamic => RangeStrategy::Dynamic {
                chunk_size: self.chunk_size,
            },
        }
    }

    fn bench_config(&self) -> BenchConfig {
        BenchConfig {
            repeat: self.repeat,
            verify: !self.no_verify,
            with_sum: self.sum,
        }
    }
}

/// Policy to split work among threads.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RangeStrategyCli {
    /// Each worker thread processes a fixed contiguous range of items.
    Fixed,
    /// Worker threads claim chunks of items until none is left.
    Dynamic,
}

/// Policy to pin worker threads to CPUs.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CpuPinningCli {
    /// Don't pin worker threads.
    No,
    /// Pin worker threads if the platform supports it.
    IfSupported,
    /// Pin worker threads, or fail.
    Always,
}

impl From<CpuPinningCli> for CpuPinningPolicy {
    fn from(policy: CpuPinningCli) -> Self {
        match policy {
            CpuPinningCli::No => CpuPinningPolicy::No,
            CpuPinningCli::IfSupported => CpuPinningPolicy::IfSupported,
            CpuPinningCli::Always => CpuPinningPolicy::Always,
        }
    }
}

/// Thread pool running the parallel addition.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Backend {
    /// Scoped worker threads spawned by this crate.
    Pool,
    /// A Rayon thread pool (requires the `rayon` feature).
    Rayon,
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["vecadd"]).unwrap();
        assert_eq!(cli.len, 100_000_000);
        assert_eq!(cli.thread_count(), ThreadCount::AvailableParallelism);
        assert_eq!(cli.range_strategy(), RangeStrategy::Fixed);
        assert_eq!(cli.cpu_pinning, CpuPinningCli::No);
        assert_eq!(cli.backend, Backend::Pool);
        assert_eq!(cli.seed, None);
        assert_eq!(cli.bench_config(), BenchConfig::default());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "vecadd",
            "--len",
            "1000",
            "--num-threads",
            "3",
            "--range-strategy",
            "dynamic",
            "--chunk-size",
            "64",
            "--cpu-pinning",
            "if-supported",
            "--seed",
            "42",
            "--repeat",
            "5",
            "--sum",
            "--no-verify",
        ])
        .unwrap();
        assert_eq!(cli.len, 1000);
        assert_eq!(cli.thread_count(), ThreadCount::try_from(3).unwrap());
        assert_eq!(
            cli.range_strategy(),
            RangeStrategy::Dynamic {
                chunk_size: NonZeroUsize::new(64).unwrap()
            }
        );
        assert_eq!(
            CpuPinningPolicy::from(cli.cpu_pinning),
            CpuPinningPolicy::IfSupported
        );
        assert_eq!(cli.seed, Some(42));
        assert_eq!(
            cli.bench_config(),
            BenchConfig {
                repeat: NonZeroU32::new(5).unwrap(),
                verify: false,
                with_sum: true,
            }
        );
    }

    #[test]
    fn test_rejects_zero() {
        assert!(Cli::try_parse_from(["vecadd", "--num-threads", "0"]).is_err());
        assert!(Cli::try_parse_from(["vecadd", "--chunk-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["vecadd", "--repeat", "0"]).is_err());
    }

    #[test]
    fn test_run_small() {
        let cli = Cli::try_parse_from([
            "vecadd",
            "--len",
            "10000",
            "--num-threads",
            "2",
            "--seed",
            "1",
            "--sum",
        ])
        .unwrap();
        let report = run(&cli).unwrap();
        assert_eq!(report.sequential.count(), 1);
        assert_eq!(report.parallel.count(), 1);
        assert!(report.sums.is_some());
    }

    #[cfg(not(feature = "rayon"))]
    #[test]
    fn test_rayon_unavailable() {
        let cli =
            Cli::try_parse_from(["vecadd", "--len", "10", "--backend", "rayon"]).unwrap();
        assert!(matches!(run(&cli), Err(CliError::RayonUnavailable)));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_run_rayon() {
        let cli = Cli::try_parse_from([
            "vecadd",
            "--len",
            "10000",
            "--num-threads",
            "2",
            "--backend",
            "rayon",
        ])
        .unwrap();
        let report = run(&cli).unwrap();
        assert_eq!(report.parallel.count(), 1);
    }
}
