// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A scoped thread pool implementing a parallel-for over slices.

use crate::error::{check_len, Error};
#[cfg(feature = "log_parallelism")]
use crate::macros::log_info;
use crate::macros::{log_debug, log_error, log_warn};
use crate::range::{chunk_range, fixed_range, num_chunks, ChunkCursor};
// Platforms that support `libc::sched_setaffinity()`.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
use nix::{
    sched::{sched_setaffinity, CpuSet},
    unistd::Pid,
};
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

/// Whether pinning threads to CPUs is implemented on this platform.
const CPU_PINNING_SUPPORTED: bool = cfg!(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
));

/// Number of threads to spawn in a thread pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadCount {
    /// Spawn the number of threads returned by
    /// [`std::thread::available_parallelism()`].
    AvailableParallelism,
    /// Spawn the given number of threads.
    Count(NonZeroUsize),
}

impl ThreadCount {
    /// Resolves the number of threads to spawn.
    pub fn count(self) -> Result<NonZeroUsize, Error> {
        match self {
            ThreadCount::AvailableParallelism => {
                std::thread::available_parallelism().map_err(Error::AvailableParallelism)
            }
            ThreadCount::Count(count) => Ok(count),
        }
    }
}

impl TryFrom<usize> for ThreadCount {
    type Error = <NonZeroUsize as TryFrom<usize>>::Error;

    fn try_from(thread_count: usize) -> Result<Self, Self::Error> {
        let count = NonZeroUsize::try_from(thread_count)?;
        Ok(ThreadCount::Count(count))
    }
}

/// Strategy to distribute ranges of work items among threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeStrategy {
    /// Each thread processes one contiguous range of items, computed upfront.
    Fixed,
    /// Threads repeatedly claim the next chunk of `chunk_size` items until
    /// none is left.
    Dynamic {
        /// Number of items per chunk.
        chunk_size: NonZeroUsize,
    },
}

/// Policy to pin worker threads to CPUs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuPinningPolicy {
    /// Don't pin worker threads to CPUs.
    No,
    /// Pin each worker thread to a CPU, if CPU pinning is supported and
    /// implemented on this platform.
    IfSupported,
    /// Pin each worker thread to a CPU. If CPU pinning isn't supported on this
    /// platform (or not implemented), building a thread pool fails.
    Always,
}

/// A builder for [`ThreadPool`].
#[derive(Clone, Copy, Debug)]
pub struct ThreadPoolBuilder {
    /// Number of worker threads to spawn in the pool.
    pub num_threads: ThreadCount,
    /// Strategy to distribute ranges of work items among threads.
    pub range_strategy: RangeStrategy,
    /// Policy to pin worker threads to CPUs.
    pub cpu_pinning: CpuPinningPolicy,
}

impl ThreadPoolBuilder {
    /// Creates a thread pool with the configured parameters.
    ///
    /// ```
    /// # use vecadd::{CpuPinningPolicy, ParallelFor, RangeStrategy, ThreadCount, ThreadPoolBuilder};
    /// let thread_pool = ThreadPoolBuilder {
    ///     num_threads: ThreadCount::try_from(4).unwrap(),
    ///     range_strategy: RangeStrategy::Fixed,
    ///     cpu_pinning: CpuPinningPolicy::No,
    /// }
    /// .build()
    /// .unwrap();
    ///
    /// let left = [1, 2, 3, 4, 5];
    /// let right = [10, 20, 30, 40, 50];
    /// let mut output = [0; 5];
    /// thread_pool
    ///     .for_each_zip(&left, &right, &mut output, |a, b| a + b)
    ///     .unwrap();
    /// assert_eq!(output, [11, 22, 33, 44, 55]);
    /// ```
    pub fn build(&self) -> Result<ThreadPool, Error> {
        let num_threads = self.num_threads.count()?;
        let cpu_pinning = match self.cpu_pinning {
            CpuPinningPolicy::No => CpuPinningPolicy::No,
            CpuPinningPolicy::IfSupported if !CPU_PINNING_SUPPORTED => {
                log_warn!("Pinning threads to CPUs is not implemented on this platform.");
                CpuPinningPolicy::No
            }
            CpuPinningPolicy::Always if !CPU_PINNING_SUPPORTED => {
                return Err(Error::CpuPinningUnsupported);
            }
            policy => policy,
        };
        log_debug!(
            "Built a thread pool with {num_threads} threads, {:?} ranges, CPU pinning {:?}",
            self.range_strategy,
            cpu_pinning
        );
        Ok(ThreadPool {
            num_threads,
            range_strategy: self.range_strategy,
            cpu_pinning,
        })
    }
}

/// A parallel-for construct over slices.
///
/// Implementations split the index range of their inputs among worker threads.
/// Each index is processed exactly once, and each output element is written by
/// exactly one thread.
pub trait ParallelFor {
    /// Returns the number of worker threads used by this pool.
    fn num_threads(&self) -> NonZeroUsize;

    /// Sets `output[i] = f(&left[i], &right[i])` for every index `i`, in
    /// parallel.
    ///
    /// Fails with [`Error::LengthMismatch`] if the three slices don't have the
    /// same length.
    fn for_each_zip<A, B, O, F>(
        &self,
        left: &[A],
        right: &[B],
        output: &mut [O],
        f: F,
    ) -> Result<(), Error>
    where
        A: Sync,
        B: Sync,
        O: Send,
        F: Fn(&A, &B) -> O + Sync;

    /// Folds each thread's share of the input into an accumulator created by
    /// `init`, and combines the accumulators of all threads with `reduce`.
    ///
    /// `init` must return an identity element of `reduce`.
    fn fold_reduce<T, Acc, Init, Fold, Reduce>(
        &self,
        input: &[T],
        init: Init,
        fold: Fold,
        reduce: Reduce,
    ) -> Result<Acc, Error>
    where
        T: Sync,
        Acc: Send,
        Init: Fn() -> Acc + Sync,
        Fold: Fn(Acc, &T) -> Acc + Sync,
        Reduce: Fn(Acc, Acc) -> Acc + Sync;
}

/// A thread pool that runs each parallel-for on freshly spawned scoped
/// threads.
///
/// Worker threads borrow the input and output slices directly, and are all
/// joined before a parallel-for returns. A panic in a worker thread is reported
/// as [`Error::WorkerPanic`].
#[derive(Debug)]
pub struct ThreadPool {
    /// Number of worker threads spawned for each parallel-for.
    num_threads: NonZeroUsize,
    /// Strategy to distribute ranges of work items among threads.
    range_strategy: RangeStrategy,
    /// Pinning policy, resolved against the platform's support.
    cpu_pinning: CpuPinningPolicy,
}

impl ThreadPool {
    /// Returns the strategy used to distribute items among threads.
    pub fn range_strategy(&self) -> RangeStrategy {
        self.range_strategy
    }

    /// Spawns one worker thread per job, runs `work` on each of them and joins
    /// them all. The outputs are returned in the order of the jobs.
    fn run_workers<J: Send, R: Send>(
        &self,
        jobs: Vec<J>,
        work: impl Fn(usize, J) -> R + Sync,
    ) -> Result<Vec<R>, Error> {
        let work = &work;
        let cpu_pinning = self.cpu_pinning;
        std::thread::scope(|scope| -> Result<Vec<R>, Error> {
            let mut handles = Vec::with_capacity(jobs.len());
            for (id, job) in jobs.into_iter().enumerate() {
                let handle = std::thread::Builder::new()
                    .name(format!("vecadd-worker-{id}"))
                    .spawn_scoped(scope, move || -> Result<R, Error> {
                        pin_worker(id, cpu_pinning)?;
                        Ok(work(id, job))
                    })
                    .map_err(|source| Error::Spawn { id, source })?;
                handles.push(handle);
            }
            log_debug!("[main thread] Spawned {} threads", handles.len());

            // All the threads are joined before looking at any result, as a
            // panicked thread left unjoined would make the scope panic.
            let joined = handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>();
            log_debug!("[main thread] Joined threads.");

            joined
                .into_iter()
                .enumerate()
                .map(|(id, result)| match result {
                    Ok(output) => output,
                    Err(_) => {
                        log_error!("[main thread] Thread {id} panicked!");
                        Err(Error::WorkerPanic { id })
                    }
                })
                .collect()
        })
    }
}

impl ParallelFor for ThreadPool {
    fn num_threads(&self) -> NonZeroUsize {
        self.num_threads
    }

    fn for_each_zip<A, B, O, F>(
        &self,
        left: &[A],
        right: &[B],
        output: &mut [O],
        f: F,
    ) -> Result<(), Error>
    where
        A: Sync,
        B: Sync,
        O: Send,
        F: Fn(&A, &B) -> O + Sync,
    {
        let len = output.len();
        check_len("left input", len, left.len())?;
        check_len("right input", len, right.len())?;
        let num_threads = self.num_threads.get();

        match self.range_strategy {
            RangeStrategy::Fixed => {
                let mut jobs = Vec::with_capacity(num_threads);
                let mut rest = output;
                for id in 0..num_threads {
                    let range = fixed_range(id, num_threads, len);
                    let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
                    jobs.push((range, head));
                    rest = tail;
                }
                self.run_workers(jobs, |_id, (range, out)| {
                    zip_into(&left[range.clone()], &right[range], out, &f);
                })?;
            }
            RangeStrategy::Dynamic { chunk_size } => {
                let chunk_size = chunk_size.get();
                let chunks = Mutex::new(output.chunks_mut(chunk_size).enumerate());
                let _chunks_per_thread = self.run_workers(vec![(); num_threads], |_id, ()| {
                    let mut num_processed = 0;
                    loop {
                        // The lock is released before the chunk is processed.
                        let next = chunks.lock().unwrap_or_else(PoisonError::into_inner).next();
                        let Some((index, out)) = next else {
                            break;
                        };
                        let range = chunk_range(index, chunk_size, len);
                        zip_into(&left[range.clone()], &right[range], out, &f);
                        num_processed += 1;
                    }
                    num_processed
                })?;
                #[cfg(feature = "log_parallelism")]
                log_chunk_statistics(&_chunks_per_thread);
            }
        }
        Ok(())
    }

    fn fold_reduce<T, Acc, Init, Fold, Reduce>(
        &self,
        input: &[T],
        init: Init,
        fold: Fold,
        reduce: Reduce,
    ) -> Result<Acc, Error>
    where
        T: Sync,
        Acc: Send,
        Init: Fn() -> Acc + Sync,
        Fold: Fn(Acc, &T) -> Acc + Sync,
        Reduce: Fn(Acc, Acc) -> Acc + Sync,
    {
        let len = input.len();
        let num_threads = self.num_threads.get();

        let partials = match self.range_strategy {
            RangeStrategy::Fixed => self.run_workers(vec![(); num_threads], |id, ()| {
                input[fixed_range(id, num_threads, len)]
                    .iter()
                    .fold(init(), |acc, item| fold(acc, item))
            })?,
            RangeStrategy::Dynamic { chunk_size } => {
                let chunk_size = chunk_size.get();
                let cursor = ChunkCursor::new(num_chunks(chunk_size, len));
                self.run_workers(vec![(); num_threads], |_id, ()| {
                    let mut acc = init();
                    while let Some(index) = cursor.next_chunk() {
                        acc = input[chunk_range(index, chunk_size, len)]
                            .iter()
                            .fold(acc, |acc, item| fold(acc, item));
                    }
                    acc
                })?
            }
        };

        Ok(partials.into_iter().reduce(reduce).unwrap_or_else(init))
    }
}

/// Writes `f(&left[i], &right[i])` into `output[i]`, serially.
#[inline(always)]
fn zip_into<A, B, O>(left: &[A], right: &[B], output: &mut [O], f: &impl Fn(&A, &B) -> O) {
    output
        .iter_mut()
        .zip(left)
        .zip(right)
        .for_each(|((out, a), b)| *out = f(a, b));
}

/// Applies the pinning policy to the current worker thread.
fn pin_worker(id: usize, cpu_pinning: CpuPinningPolicy) -> Result<(), Error> {
    match cpu_pinning {
        CpuPinningPolicy::No => Ok(()),
        CpuPinningPolicy::IfSupported => {
            match pin_current_thread(id) {
                Ok(()) => log_debug!("Pinned thread #{id} to CPU #{id}"),
                Err(_e) => log_warn!("Failed to set CPU affinity for thread #{id}: {_e}"),
            }
            Ok(())
        }
        CpuPinningPolicy::Always => {
            pin_current_thread(id).map_err(|reason| Error::CpuPinning { id, reason })?;
            log_debug!("Pinned thread #{id} to CPU #{id}");
            Ok(())
        }
    }
}

#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
fn pin_current_thread(cpu: usize) -> Result<(), String> {
    let mut cpu_set = CpuSet::new();
    cpu_set.set(cpu).map_err(|e| e.to_string())?;
    sched_setaffinity(Pid::from_raw(0), &cpu_set).map_err(|e| e.to_string())
}

#[cfg(any(
    miri,
    not(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    ))
))]
fn pin_current_thread(_cpu: usize) -> Result<(), String> {
    Err("CPU pinning is not implemented on this platform".to_owned())
}

#[cfg(feature = "log_parallelism")]
fn log_chunk_statistics(chunks_per_thread: &[usize]) {
    log_info!("Dynamic range statistics:");
    for (id, chunks) in chunks_per_thread.iter().enumerate() {
        log_info!("- thread #{id}: {chunks} chunks");
    }
}
