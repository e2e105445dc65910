// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io;
use thiserror::Error;

/// Errors returned by the thread pools, kernels and benchmark harness.
#[derive(Debug, Error)]
pub enum Error {
    /// Two buffers that must have the same length don't.
    #[error("length mismatch: {what} has {actual} elements, expected {expected}")]
    LengthMismatch {
        /// Name of the offending buffer.
        what: &'static str,
        /// Length of the reference buffer.
        expected: usize,
        /// Length of the offending buffer.
        actual: usize,
    },
    /// [`std::thread::available_parallelism()`] failed.
    #[error("getting the available parallelism failed")]
    AvailableParallelism(#[source] io::Error),
    /// The operating system refused to spawn a worker thread.
    #[error("failed to spawn worker thread #{id}")]
    Spawn {
        /// Index of the worker thread.
        id: usize,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A worker thread panicked while processing its range.
    #[error("worker thread #{id} panicked")]
    WorkerPanic {
        /// Index of the worker thread.
        id: usize,
    },
    /// CPU pinning was required but isn't implemented on this platform.
    #[error("pinning threads to CPUs is not supported on this platform")]
    CpuPinningUnsupported,
    /// CPU pinning was required but failed for a worker thread.
    #[error("failed to pin worker thread #{id} to a CPU: {reason}")]
    CpuPinning {
        /// Index of the worker thread.
        id: usize,
        /// Description of the failure reported by the OS.
        reason: String,
    },
    /// An output element isn't the sum of its inputs.
    #[error("wrong result at index {index}: expected {expected}, got {actual}")]
    Mismatch {
        /// Index of the first wrong element.
        index: usize,
        /// Expected value.
        expected: String,
        /// Value found in the output.
        actual: String,
    },
    /// The serial and parallel total sums differ.
    #[error("total sums differ: {serial} computed serially, {parallel} in parallel")]
    SumMismatch {
        /// Serial total.
        serial: i64,
        /// Parallel total.
        parallel: i64,
    },
    /// Building a Rayon thread pool failed.
    #[cfg(feature = "rayon")]
    #[error("failed to build the Rayon thread pool")]
    Rayon(#[from] rayon::ThreadPoolBuildError),
}

/// Checks that the length of the buffer named `what` is `expected`.
pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::LengthMismatch {
            what,
            expected,
            actual,
        })
    }
}
