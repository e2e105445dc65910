// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Input and output buffers of the benchmark.

use crate::error::{check_len, Error};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;

/// Default number of elements in each buffer.
pub const DEFAULT_LEN: usize = 100_000_000;

/// Exclusive upper bound of the random input values. Sums of two inputs stay
/// far below [`i32::MAX`].
pub const MAX_VALUE: i32 = 100;

/// Value of output elements that no kernel wrote yet. Sums of two inputs are
/// never negative, so verification catches any element left untouched.
pub const UNWRITTEN: i32 = -1;

/// Returns a fresh seed drawn from the thread-local generator.
pub fn random_seed() -> u64 {
    rand::rng().random()
}

/// Two input buffers and one output buffer, all of the same length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workload {
    left: Vec<i32>,
    right: Vec<i32>,
    output: Vec<i32>,
}

impl Workload {
    /// Allocates the buffers and fills the inputs with values uniformly drawn
    /// from `0..MAX_VALUE`, using a ChaCha12 generator seeded with `seed`.
    ///
    /// The output is filled with [`UNWRITTEN`].
    pub fn random(len: usize, seed: u64) -> Self {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        let left = random_vector(&mut rng, len);
        let right = random_vector(&mut rng, len);
        Self {
            left,
            right,
            output: vec![UNWRITTEN; len],
        }
    }

    /// Wraps the given inputs, allocating an output filled with [`UNWRITTEN`].
    pub fn from_parts(left: Vec<i32>, right: Vec<i32>) -> Result<Self, Error> {
        check_len("right input", left.len(), right.len())?;
        let len = left.len();
        Ok(Self {
            left,
            right,
            output: vec![UNWRITTEN; len],
        })
    }

    /// Number of elements in each buffer.
    pub fn len(&self) -> usize {
        self.output.len()
    }

    /// Whether the buffers are empty.
    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// Left input.
    pub fn left(&self) -> &[i32] {
        &self.left
    }

    /// Right input.
    pub fn right(&self) -> &[i32] {
        &self.right
    }

    /// Output.
    pub fn output(&self) -> &[i32] {
        &self.output
    }

    /// Borrows the inputs and the output at the same time.
    pub fn split_mut(&mut self) -> (&[i32], &[i32], &mut [i32]) {
        (&self.left, &self.right, &mut self.output)
    }

    /// Fills the output with [`UNWRITTEN`], so that the next run must write
    /// every element.
    pub fn clear_output(&mut self) {
        self.output.fill(UNWRITTEN);
    }
}

fn random_vector(rng: &mut impl Rng, len: usize) -> Vec<i32> {
    (0..len).map(|_| rng.random_range(0..MAX_VALUE)).collect()
}
