//! Test utilities for firstfit development.
//!
//! Provides a whole-chain invariant checker ([`assert_chain_invariants`])
//! and a [`LiveModel`] that shadows an arena's live allocations so tests
//! can detect overlap and clobbered contents.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod model;

pub use model::LiveModel;

use firstfit_arena::{Arena, BlockInfo, ALIGN, DESCRIPTOR_SIZE};

/// Snapshot of the chain as `(descriptor offset, size, is_free)` triples.
pub fn layout<const N: usize>(arena: &Arena<N>) -> Vec<(usize, usize, bool)> {
    arena
        .blocks()
        .map(|b| (b.offset, b.size, b.is_free))
        .collect()
}

/// Check every structural invariant of an initialized chain.
///
/// - the first block starts at offset 0;
/// - each block starts where the previous one ends;
/// - the last block ends exactly at the arena's capacity;
/// - every data offset is 8-aligned;
/// - no two free blocks are adjacent.
///
/// # Panics
///
/// Panics with a description of the first violation found.
pub fn assert_chain_invariants<const N: usize>(arena: &Arena<N>) {
    if !arena.is_initialized() {
        assert_eq!(arena.blocks().count(), 0, "uninitialized arena exposes blocks");
        return;
    }

    let blocks: Vec<BlockInfo> = arena.blocks().collect();
    let mut expected = 0;
    for block in &blocks {
        assert_eq!(block.offset, expected, "gap or overlap before block at {}", block.offset);
        assert_eq!(block.data_offset() % ALIGN, 0, "misaligned block at {}", block.offset);
        expected = block.end();
    }
    assert_eq!(expected, N, "chain ends at {expected}, arena has {N} bytes");

    for pair in blocks.windows(2) {
        assert!(
            !(pair[0].is_free && pair[1].is_free),
            "adjacent free blocks at {} and {}",
            pair[0].offset,
            pair[1].offset
        );
    }
}

/// Whether the arena is back to its pristine, fully free state.
pub fn is_fully_free<const N: usize>(arena: &Arena<N>) -> bool {
    layout(arena) == [(0, N - DESCRIPTOR_SIZE, true)]
}
