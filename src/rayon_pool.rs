// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Adaptor running the parallel-for over a [Rayon](https://docs.rs/rayon)
//! thread pool.

use crate::error::{check_len, Error};
use crate::macros::log_debug;
use crate::pool::{ParallelFor, ThreadCount};
use rayon::iter::{
    IndexedParallelIterator, IntoParallelRefIterator, IntoParallelRefMutIterator,
    ParallelIterator,
};
use std::num::NonZeroUsize;

/// A [`ParallelFor`] backed by a Rayon thread pool.
///
/// Rayon decides how to split the work among its worker threads, which persist
/// across calls.
///
/// ```
/// # use vecadd::{ParallelFor, RayonPool, ThreadCount};
/// let thread_pool = RayonPool::new(ThreadCount::try_from(2).unwrap()).unwrap();
///
/// let input = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
/// let sum = thread_pool
///     .fold_reduce(&input, || 0, |acc, &x| acc + x, |a, b| a + b)
///     .unwrap();
/// assert_eq!(sum, 5 * 11);
/// ```
pub struct RayonPool {
    /// Dedicated thread pool, or [`None`] to use Rayon's global pool.
    inner: Option<rayon::ThreadPool>,
}

impl RayonPool {
    /// Builds a dedicated Rayon thread pool with the given number of threads.
    pub fn new(num_threads: ThreadCount) -> Result<Self, Error> {
        let num_threads = num_threads.count()?;
        let inner = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads.get())
            .thread_name(|id| format!("vecadd-rayon-{id}"))
            .build()?;
        log_debug!("Built a Rayon thread pool with {num_threads} threads");
        Ok(Self { inner: Some(inner) })
    }

    /// Uses Rayon's global thread pool.
    pub fn global() -> Self {
        Self { inner: None }
    }

    /// Runs `op` within this pool.
    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.inner {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl ParallelFor for RayonPool {
    fn num_threads(&self) -> NonZeroUsize {
        let count = match &self.inner {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        };
        // Rayon never runs with zero threads.
        NonZeroUsize::new(count).unwrap_or(NonZeroUsize::MIN)
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

        let f = &f;
        self.install(|| {
            output
                .par_iter_mut()
                .zip(left.par_iter())
                .zip(right.par_iter())
                .for_each(|((out, a), b)| *out = f(a, b))
        });
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
        let (init, fold, reduce) = (&init, &fold, &reduce);
        Ok(self.install(|| {
            input
                .par_iter()
                .fold(init, |acc, item| fold(acc, item))
                .reduce(init, reduce)
        }))
    }
}
