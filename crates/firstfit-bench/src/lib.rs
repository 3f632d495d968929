//! Benchmark workloads for the firstfit allocator.
//!
//! - [`request_sizes`]: deterministic request-size stream from a seed
//! - [`fill_arena`]: allocate until exhaustion and keep every handle
//! - [`fragment`]: release every other live block

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use firstfit_arena::{Arena, BlockHandle};

/// `n` request sizes in `1..=max`, reproducible from `seed`.
pub fn request_sizes(n: usize, max: usize, seed: u64) -> Vec<usize> {
    (0..n as u64)
        .map(|i| {
            let mixed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(i.wrapping_mul(1442695040888963407));
            // High bits of an LCG step are the well-distributed ones.
            ((mixed >> 33) % max as u64) as usize + 1
        })
        .collect()
}

/// Allocate `size`-byte blocks until the arena is exhausted.
pub fn fill_arena<const N: usize>(arena: &mut Arena<N>, size: usize) -> Vec<BlockHandle> {
    let mut handles = Vec::new();
    while let Ok(h) = arena.allocate(size) {
        handles.push(h);
    }
    handles
}

/// Release every other handle, leaving a chain of isolated holes. Returns
/// the handles still live.
pub fn fragment<const N: usize>(arena: &mut Arena<N>, handles: Vec<BlockHandle>) -> Vec<BlockHandle> {
    let mut kept = Vec::with_capacity(handles.len() / 2 + 1);
    for (i, h) in handles.into_iter().enumerate() {
        if i % 2 == 0 {
            arena
                .release(Some(h))
                .expect("unchecked arenas accept every release");
        } else {
            kept.push(h);
        }
    }
    kept
}
