// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::mem::size_of;
use std::num::NonZeroUsize;
use ::vecadd::RangeStrategy;

const NUM_THREADS: &[usize] = &[1, 2, 4, 8];
const LENGTHS: &[usize] = &[10_000, 100_000, 1_000_000, 10_000_000];
const CHUNK_SIZE: usize = 65_536;

fn strategies() -> [(RangeStrategy, &'static str); 2] {
    [
        (RangeStrategy::Fixed, "fixed"),
        (
            RangeStrategy::Dynamic {
                chunk_size: NonZeroUsize::new(CHUNK_SIZE).unwrap(),
            },
            "dynamic",
        ),
    ]
}

fn add(c: &mut Criterion) {
    let mut group = c.benchmark_group("add");
    for len in LENGTHS {
        group.throughput(Throughput::Bytes((len * size_of::<i32>()) as u64));
        group.bench_with_input(BenchmarkId::new("serial", len), len, serial::add);
        for &num_threads in NUM_THREADS {
            group.bench_with_input(
                BenchmarkId::new(format!("rayon@{num_threads}"), len),
                len,
                |bencher, len| rayon::add(bencher, num_threads, len),
            );
            for (range_strategy, range_name) in strategies() {
                group.bench_with_input(
                    BenchmarkId::new(format!("vecadd_{range_name}@{num_threads}"), len),
                    len,
                    |bencher, len| vecadd::add(bencher, range_strategy, num_threads, len),
                );
            }
        }
    }
    group.finish();
}

fn sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("sum");
    for len in LENGTHS {
        group.throughput(Throughput::Bytes((len * size_of::<i32>()) as u64));
        group.bench_with_input(BenchmarkId::new("serial", len), len, serial::sum);
        for &num_threads in NUM_THREADS {
            for (range_strategy, range_name) in strategies() {
                group.bench_with_input(
                    BenchmarkId::new(format!("vecadd_{range_name}@{num_threads}"), len),
                    len,
                    |bencher, len| vecadd::sum(bencher, range_strategy, num_threads, len),
                );
            }
        }
    }
    group.finish();
}

/// Baseline benchmarks on the current thread.
mod serial {
    use criterion::Bencher;
    use std::hint::black_box;
    use vecadd::kernel::{add_serial, sum_serial};
    use vecadd::workload::Workload;

    pub fn add(bencher: &mut Bencher, len: &usize) {
        let mut workload = Workload::random(*len, 42);
        let (left, right, output) = workload.split_mut();
        bencher.iter(|| add_serial(black_box(left), black_box(right), black_box(&mut *output)));
    }

    pub fn sum(bencher: &mut Bencher, len: &usize) {
        let workload = Workload::random(*len, 42);
        bencher.iter(|| sum_serial(black_box(workload.left())));
    }
}

/// Rayon used directly, as a reference point.
mod rayon {
    use criterion::Bencher;
    use rayon::iter::{
        IndexedParallelIterator, IntoParallelRefIterator, IntoParallelRefMutIterator,
        ParallelIterator,
    };
    use std::hint::black_box;
    use vecadd::workload::Workload;

    pub fn add(bencher: &mut Bencher, num_threads: usize, len: &usize) {
        let mut workload = Workload::random(*len, 42);
        let (left, right, output) = workload.split_mut();
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .unwrap();
        thread_pool.install(|| {
            bencher.iter(|| {
                black_box(left)
                    .par_iter()
                    .zip(black_box(right))
                    .zip(black_box(output.par_iter_mut()))
                    .for_each(|((&a, &b), out)| *out = a + b)
            })
        });
    }
}

/// Benchmarks of this crate's thread pool.
mod vecadd {
    use criterion::Bencher;
    use std::hint::black_box;
    use vecadd::kernel::{add_parallel, sum_parallel};
    use vecadd::workload::Workload;
    use vecadd::{CpuPinningPolicy, RangeStrategy, ThreadCount, ThreadPoolBuilder};

    fn thread_pool(range_strategy: RangeStrategy, num_threads: usize) -> vecadd::ThreadPool {
        ThreadPoolBuilder {
            num_threads: ThreadCount::try_from(num_threads).unwrap(),
            range_strategy,
            cpu_pinning: CpuPinningPolicy::IfSupported,
        }
        .build()
        .unwrap()
    }

    pub fn add(
        bencher: &mut Bencher,
        range_strategy: RangeStrategy,
        num_threads: usize,
        len: &usize,
    ) {
        let mut workload = Workload::random(*len, 42);
        let (left, right, output) = workload.split_mut();
        let thread_pool = thread_pool(range_strategy, num_threads);
        bencher.iter(|| {
            add_parallel(
                &thread_pool,
                black_box(left),
                black_box(right),
                black_box(&mut *output),
            )
        });
    }

    pub fn sum(
        bencher: &mut Bencher,
        range_strategy: RangeStrategy,
        num_threads: usize,
        len: &usize,
    ) {
        let workload = Workload::random(*len, 42);
        let thread_pool = thread_pool(range_strategy, num_threads);
        bencher.iter(|| sum_parallel(&thread_pool, black_box(workload.left())));
    }
}

criterion_group!(benches, add, sum);
criterion_main!(benches);
