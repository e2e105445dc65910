// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Distribution of the indices `0..len` among worker threads.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns the contiguous range of indices processed by thread `id` when
/// `0..len` is split among `num_threads` threads.
///
/// The first `len % num_threads` threads get one more item than the others.
/// Ranges of consecutive threads are adjacent, so that their union over all
/// `id` in `0..num_threads` is exactly `0..len`.
pub(crate) fn fixed_range(id: usize, num_threads: usize, len: usize) -> std::ops::Range<usize> {
    debug_assert!(id < num_threads);
    let quotient = len / num_threads;
    let remainder = len % num_threads;
    let start = id * quotient + id.min(remainder);
    let end = start + quotient + usize::from(id < remainder);
    start..end
}

/// Returns the range of indices covered by chunk `index`, the last chunk
/// being truncated to `len`.
pub(crate) fn chunk_range(index: usize, chunk_size: usize, len: usize) -> std::ops::Range<usize> {
    let start = index.saturating_mul(chunk_size).min(len);
    let end = start.saturating_add(chunk_size).min(len);
    start..end
}

/// Returns the number of chunks of `chunk_size` items needed to cover `len`
/// items.
pub(crate) fn num_chunks(chunk_size: usize, len: usize) -> usize {
    len.div_ceil(chunk_size)
}

/// A shared counter that hands out chunk indices to worker threads.
///
/// Each index in `0..num_chunks` is returned by
/// [`next_chunk()`](Self::next_chunk) exactly once, whichever thread calls it.
pub(crate) struct ChunkCursor {
    /// Next chunk index to hand out.
    next: CachePadded<AtomicUsize>,
    /// Total number of chunks.
    num_chunks: usize,
}

impl ChunkCursor {
    /// Creates a cursor over `0..num_chunks`.
    pub(crate) fn new(num_chunks: usize) -> Self {
        Self {
            next: CachePadded::new(AtomicUsize::new(0)),
            num_chunks,
        }
    }

    /// Claims the next chunk, or returns [`None`] once all the chunks have been
    /// handed out.
    #[inline(always)]
    pub(crate) fn next_chunk(&self) -> Option<usize> {
        // Only atomicity matters here: the chunk contents are handed over
        // separately, and the scoped threads are joined before results are read.
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        (index < self.num_chunks).then_some(index)
    }
}
