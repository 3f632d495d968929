//! The block chain: search, split and merge.
//!
//! Blocks tile the arena from offset 0 to the end, each linked to its
//! successor in address order. The functions here are the only code that
//! rewrites `size` and `next`; the arena layers the free flag and the
//! public operations on top.

use log::trace;

use crate::descriptor::{self, Descriptor, DESCRIPTOR_SIZE, MIN_BLOCK_DATA};
use crate::raw::{View, ViewMut};

/// One block of the chain, as seen by [`Arena::blocks`](crate::Arena::blocks).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Byte offset of the block's descriptor from the arena base.
    pub offset: usize,
    /// Usable bytes in the data area.
    pub size: usize,
    /// Whether the block is available for allocation.
    pub is_free: bool,
}

impl BlockInfo {
    /// Byte offset of the data area.
    pub fn data_offset(&self) -> usize {
        self.offset + DESCRIPTOR_SIZE
    }

    /// Byte offset one past the end of the data area.
    pub fn end(&self) -> usize {
        self.data_offset() + self.size
    }
}

/// Iterator over the chain in address order.
pub struct Blocks<'a, const N: usize> {
    storage: View<'a, N>,
    cursor: Option<usize>,
}

impl<'a, const N: usize> Blocks<'a, N> {
    /// Walk the chain from its head, or nothing if it was never built.
    pub(crate) fn new(storage: View<'a, N>, initialized: bool) -> Self {
        Self {
            storage,
            cursor: initialized.then_some(0),
        }
    }
}

impl<const N: usize> Iterator for Blocks<'_, N> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let offset = self.cursor?;
        let desc = Descriptor::load(self.storage, offset);
        self.cursor = desc.next;
        Some(BlockInfo {
            offset,
            size: desc.size,
            is_free: desc.is_free,
        })
    }
}

/// Lay down the initial chain: one free block spanning the arena.
pub(crate) fn init<const N: usize>(storage: &mut ViewMut<'_, N>) {
    Descriptor::new(0, N - DESCRIPTOR_SIZE, None, true).store(storage, 0);
    trace!(
        "arena initialised: {} bytes, one free block of {}",
        N,
        N - DESCRIPTOR_SIZE
    );
}

/// First free block in chain order with at least `size` data bytes.
///
/// On failure returns the size of the largest free block seen.
pub(crate) fn first_fit<const N: usize>(storage: View<'_, N>, size: usize) -> Result<usize, usize> {
    let mut largest_free = 0;
    for block in Blocks::new(storage, true) {
        if !block.is_free {
            continue;
        }
        if block.size >= size {
            return Ok(block.offset);
        }
        largest_free = largest_free.max(block.size);
    }
    Err(largest_free)
}

/// Set the free flag of the block at `at`.
pub(crate) fn set_free<const N: usize>(storage: &mut ViewMut<'_, N>, at: usize, is_free: bool) {
    let mut desc = Descriptor::load(storage.view(), at);
    desc.is_free = is_free;
    desc.store(storage, at);
}

/// Trim the block at `at` to `size` bytes if the excess can hold a block of
/// its own; the excess becomes a new free block right after it.
///
/// The new free block absorbs its successor when that is free too, so no
/// two free blocks end up adjacent. `size` must be aligned and no larger
/// than the block.
pub(crate) fn split<const N: usize>(storage: &mut ViewMut<'_, N>, at: usize, size: usize) {
    let mut block = Descriptor::load(storage.view(), at);
    debug_assert!(size <= block.size);
    if block.size < size + DESCRIPTOR_SIZE + MIN_BLOCK_DATA {
        return;
    }

    let rest_at = at + DESCRIPTOR_SIZE + size;
    let rest = Descriptor::new(rest_at, block.size - size - DESCRIPTOR_SIZE, block.next, true);
    rest.store(storage, rest_at);

    block.size = size;
    block.next = Some(rest_at);
    block.store(storage, at);
    trace!("split block at {at}: kept {size}, new free block at {rest_at} of {}", rest.size);

    if let Some(after) = rest.next {
        if Descriptor::load(storage.view(), after).is_free {
            absorb_next(storage, rest_at);
        }
    }
}

/// Merge the block following `at` into it. No-op for the last block.
pub(crate) fn absorb_next<const N: usize>(storage: &mut ViewMut<'_, N>, at: usize) {
    let mut block = Descriptor::load(storage.view(), at);
    let Some(next_at) = block.next else {
        return;
    };
    let next = Descriptor::load(storage.view(), next_at);

    block.size += DESCRIPTOR_SIZE + next.size;
    block.next = next.next;
    block.store(storage, at);
    descriptor::scrub_guard(storage, next_at);
    trace!("merged block at {next_at} into {at}: now {}", block.size);
}

/// Grow the block at `at` in place by absorbing a free successor, if the
/// combined data area reaches `size`. Returns whether it grew.
pub(crate) fn grow_into_next<const N: usize>(
    storage: &mut ViewMut<'_, N>,
    at: usize,
    size: usize,
) -> bool {
    let block = Descriptor::load(storage.view(), at);
    let Some(next_at) = block.next else {
        return false;
    };
    let next = Descriptor::load(storage.view(), next_at);
    if !next.is_free || block.size + DESCRIPTOR_SIZE + next.size < size {
        return false;
    }
    absorb_next(storage, at);
    true
}

/// One pass over the whole chain merging every run of adjacent free blocks.
///
/// The cursor only advances once the block under it can no longer absorb
/// its successor, so runs of any length collapse in the same pass.
pub(crate) fn coalesce<const N: usize>(storage: &mut ViewMut<'_, N>) {
    let mut at = 0;
    loop {
        let block = Descriptor::load(storage.view(), at);
        let Some(next_at) = block.next else {
            break;
        };
        if block.is_free && Descriptor::load(storage.view(), next_at).is_free {
            absorb_next(storage, at);
        } else {
            at = next_at;
        }
    }
}
