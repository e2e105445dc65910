// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Timing harness comparing the serial and parallel kernels.

use crate::error::Error;
use crate::kernel::{add_parallel, add_serial, sum_parallel, sum_serial, verify_sum};
use crate::macros::log_debug;
use crate::pool::ParallelFor;
use crate::workload::Workload;
use std::fmt;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

/// A value together with the wall-clock time it took to compute.
#[derive(Debug)]
pub struct Timed<T> {
    /// Computed value.
    pub value: T,
    /// Wall-clock time spent computing the value.
    pub elapsed: Duration,
}

/// Runs `f` and measures its wall-clock time.
pub fn time<T>(f: impl FnOnce() -> T) -> Timed<T> {
    let start = Instant::now();
    let value = f();
    let elapsed = start.elapsed();
    Timed { value, elapsed }
}

/// Durations measured over repeated runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Samples(Vec<Duration>);

impl Samples {
    /// Records a duration.
    pub fn push(&mut self, elapsed: Duration) {
        self.0.push(elapsed);
    }

    /// Number of recorded durations.
    pub fn count(&self) -> usize {
        self.0.len()
    }

    /// Shortest recorded duration.
    pub fn best(&self) -> Option<Duration> {
        self.0.iter().min().copied()
    }

    /// Average of the recorded durations.
    pub fn mean(&self) -> Option<Duration> {
        let count = u32::try_from(self.0.len()).ok().filter(|&n| n != 0)?;
        let total: Duration = self.0.iter().sum();
        Some(total / count)
    }
}

/// Parameters of a benchmark run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BenchConfig {
    /// Number of times each kernel is timed.
    pub repeat: NonZeroU32,
    /// Whether to check the output after each run.
    pub verify: bool,
    /// Whether to also time the serial and parallel total sums of the output.
    pub with_sum: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            repeat: NonZeroU32::MIN,
            verify: true,
            with_sum: false,
        }
    }
}

/// Timings of the total-sum reductions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SumReport {
    /// Total of the output buffer.
    pub total: i64,
    /// Timings of the serial sum.
    pub sequential: Samples,
    /// Timings of the parallel sum.
    pub parallel: Samples,
}

/// Outcome of a benchmark run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// Timings of the serial addition.
    pub sequential: Samples,
    /// Timings of the parallel addition.
    pub parallel: Samples,
    /// Timings of the total-sum reductions, if enabled.
    pub sums: Option<SumReport>,
}

impl Report {
    /// Ratio of the best serial time over the best parallel time.
    pub fn speedup(&self) -> Option<f64> {
        let sequential = self.sequential.best()?.as_secs_f64();
        let parallel = self.parallel.best()?.as_secs_f64();
        (parallel > 0.0).then(|| sequential / parallel)
    }
}

fn write_timing(f: &mut fmt::Formatter<'_>, what: &str, samples: &Samples) -> fmt::Result {
    let Some(best) = samples.best() else {
        return Ok(());
    };
    write!(f, "Time taken by {what}: {} microseconds", best.as_micros())?;
    if samples.count() > 1 {
        if let Some(mean) = samples.mean() {
            write!(
                f,
                " (best of {}, mean {} microseconds)",
                samples.count(),
                mean.as_micros()
            )?;
        }
    }
    writeln!(f)
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_timing(f, "sequential execution", &self.sequential)?;
        write_timing(f, "parallel execution", &self.parallel)?;
        if let Some(sums) = &self.sums {
            writeln!(f, "Total sum: {}", sums.total)?;
            write_timing(f, "sequential sum", &sums.sequential)?;
            write_timing(f, "parallel sum", &sums.parallel)?;
        }
        Ok(())
    }
}

/// Times the serial and the parallel additions of the workload's inputs,
/// `config.repeat` times each.
///
/// The output is reset to [`UNWRITTEN`](crate::workload::UNWRITTEN) before
/// each run. With `config.verify`, every output is checked against its inputs;
/// with `config.with_sum`, the total of the output is also computed serially
/// and in parallel, and both totals must agree.
pub fn run(
    thread_pool: &impl ParallelFor,
    workload: &mut Workload,
    config: &BenchConfig,
) -> Result<Report, Error> {
    let mut report = Report {
        sums: config.with_sum.then(SumReport::default),
        ..Report::default()
    };

    for _round in 0..config.repeat.get() {
        workload.clear_output();
        let (left, right, output) = workload.split_mut();
        let serial = time(|| add_serial(left, right, output));
        serial.value?;
        report.sequential.push(serial.elapsed);
        log_debug!("[round {_round}] Serial addition took {:?}", serial.elapsed);
        if config.verify {
            verify_sum(workload.left(), workload.right(), workload.output())?;
        }

        workload.clear_output();
        let (left, right, output) = workload.split_mut();
        let parallel = time(|| add_parallel(thread_pool, left, right, output));
        parallel.value?;
        report.parallel.push(parallel.elapsed);
        log_debug!(
            "[round {_round}] Parallel addition took {:?}",
            parallel.elapsed
        );
        if config.verify {
            verify_sum(workload.left(), workload.right(), workload.output())?;
        }

        if let Some(sums) = &mut report.sums {
            let serial = time(|| sum_serial(workload.output()));
            let parallel = time(|| sum_parallel(thread_pool, workload.output()));
            let parallel_total = parallel.value?;
            if serial.value != parallel_total {
                return Err(Error::SumMismatch {
                    serial: serial.value,
                    parallel: parallel_total,
                });
            }
            sums.total = serial.value;
            sums.sequential.push(serial.elapsed);
            sums.parallel.push(parallel.elapsed);
        }
    }

    Ok(report)
}
