// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Element-wise addition and total-sum kernels, in serial and parallel
//! flavors.

use crate::error::{check_len, Error};
use crate::pool::ParallelFor;
use std::fmt::Debug;
use std::ops::Add;

/// Sets `output[i] = left[i] + right[i]` on the current thread.
pub fn add_serial<T>(left: &[T], right: &[T], output: &mut [T]) -> Result<(), Error>
where
    T: Copy + Add<Output = T>,
{
    check_len("left input", output.len(), left.len())?;
    check_len("right input", output.len(), right.len())?;
    left.iter()
        .zip(right)
        .zip(output.iter_mut())
        .for_each(|((&a, &b), out)| *out = a + b);
    Ok(())
}

/// Sets `output[i] = left[i] + right[i]`, distributing the indices over the
/// given thread pool.
pub fn add_parallel<T>(
    thread_pool: &impl ParallelFor,
    left: &[T],
    right: &[T],
    output: &mut [T],
) -> Result<(), Error>
where
    T: Copy + Add<Output = T> + Send + Sync,
{
    thread_pool.for_each_zip(left, right, output, |&a, &b| a + b)
}

/// Returns the sum of all the items, widened to [`i64`].
pub fn sum_serial<T: Copy>(input: &[T]) -> i64
where
    i64: From<T>,
{
    input.iter().map(|&x| i64::from(x)).sum()
}

/// Returns the sum of all the items, widened to [`i64`].
///
/// Each thread sums its share of the input locally, and the partial sums are
/// combined once per thread.
pub fn sum_parallel<T>(thread_pool: &impl ParallelFor, input: &[T]) -> Result<i64, Error>
where
    T: Copy + Sync,
    i64: From<T>,
{
    thread_pool.fold_reduce(
        input,
        || 0i64,
        |acc, &x| acc + i64::from(x),
        |a, b| a + b,
    )
}

/// Checks that every output element is the sum of the corresponding inputs.
///
/// Fails with [`Error::Mismatch`] at the first element that isn't.
pub fn verify_sum<T>(left: &[T], right: &[T], output: &[T]) -> Result<(), Error>
where
    T: Copy + Add<Output = T> + PartialEq + Debug,
{
    check_len("left input", output.len(), left.len())?;
    check_len("right input", output.len(), right.len())?;
    let mismatch = left
        .iter()
        .zip(right)
        .zip(output)
        .position(|((&a, &b), &out)| a + b != out);
    match mismatch {
        None => Ok(()),
        Some(index) => Err(Error::Mismatch {
            index,
            expected: format!("{:?}", left[index] + right[index]),
            actual: format!("{:?}", output[index]),
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pool::{CpuPinningPolicy, RangeStrategy, ThreadCount, ThreadPoolBuilder};
    use crate::workload::Workload;
    use std::num::NonZeroUsize;

    fn thread_pools() -> Vec<crate::pool::ThreadPool> {
        [
            RangeStrategy::Fixed,
            RangeStrategy::Dynamic {
                chunk_size: NonZeroUsize::new(1000).unwrap(),
            },
        ]
        .into_iter()
        .map(|range_strategy| {
            ThreadPoolBuilder {
                num_threads: ThreadCount::try_from(4).unwrap(),
                range_strategy,
                cpu_pinning: CpuPinningPolicy::No,
            }
            .build()
            .unwrap()
        })
        .collect()
    }

    #[test]
    fn test_add_serial() {
        let mut output = [0; 4];
        add_serial(&[1, 2, 3, 4], &[10, 20, 30, 40], &mut output).unwrap();
        assert_eq!(output, [11, 22, 33, 44]);
    }

    #[test]
    fn test_add_serial_length_mismatch() {
        let mut output = [0; 4];
        let result = add_serial(&[1, 2, 3], &[10, 20, 30, 40], &mut output);
        assert!(matches!(
            result,
            Err(Error::LengthMismatch {
                what: "left input",
                expected: 4,
                actual: 3,
            })
        ));
    }

    #[test]
    fn test_serial_and_parallel_outputs_identical() {
        for thread_pool in thread_pools() {
            for len in [0, 1, 3, 999, 1000, 1001, 123_457] {
                let workload = Workload::random(len, len as u64);

                let mut serial = vec![0; len];
                add_serial(workload.left(), workload.right(), &mut serial).unwrap();

                let mut parallel = vec![-1; len];
                add_parallel(&thread_pool, workload.left(), workload.right(), &mut parallel)
                    .unwrap();

                assert_eq!(serial, parallel, "len = {len}");
                verify_sum(workload.left(), workload.right(), &parallel).unwrap();
            }
        }
    }

    #[test]
    fn test_add_parallel_into_workload() {
        for thread_pool in thread_pools() {
            let mut workload = Workload::random(50_000, 1);
            let (left, right, output) = workload.split_mut();
            add_parallel(&thread_pool, left, right, output).unwrap();
            verify_sum(workload.left(), workload.right(), workload.output()).unwrap();
        }
    }

    #[test]
    fn test_sums_agree() {
        for thread_pool in thread_pools() {
            let workload = Workload::random(200_001, 9);
            let serial = sum_serial(workload.left());
            let parallel = sum_parallel(&thread_pool, workload.left()).unwrap();
            assert_eq!(serial, parallel);
        }
    }

    #[test]
    fn test_sum_known_values() {
        let input = (1..=100_000).collect::<Vec<i32>>();
        assert_eq!(sum_serial(&input), 5_000_050_000);
        for thread_pool in thread_pools() {
            assert_eq!(sum_parallel(&thread_pool, &input).unwrap(), 5_000_050_000);
            assert_eq!(sum_parallel(&thread_pool, &[] as &[i32]).unwrap(), 0);
        }
        assert_eq!(sum_serial(&[] as &[i32]), 0);
    }

    #[test]
    fn test_verify_sum_detects_mismatch() {
        let result = verify_sum(&[1, 2, 3], &[1, 1, 1], &[2, 3, 5]);
        match result {
            Err(Error::Mismatch {
                index,
                expected,
                actual,
            }) => {
                assert_eq!(index, 2);
                assert_eq!(expected, "4");
                assert_eq!(actual, "5");
            }
            _ => panic!("expected a mismatch, got {result:?}"),
        }
        verify_sum(&[1, 2, 3], &[1, 1, 1], &[2, 3, 4]).unwrap();
    }
}
