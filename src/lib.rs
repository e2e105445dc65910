// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![doc = include_str!("../README.md")]
#![forbid(missing_docs, unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bench;
mod error;
pub mod kernel;
mod macros;
mod pool;
mod range;
#[cfg(feature = "rayon")]
mod rayon_pool;
pub mod workload;

pub use error::Error;
pub use pool::{
    CpuPinningPolicy, ParallelFor, RangeStrategy, ThreadCount, ThreadPool, ThreadPoolBuilder,
};
#[cfg(feature = "rayon")]
#[cfg_attr(docsrs, doc(cfg(feature = "rayon")))]
pub use rayon_pool::RayonPool;
