//! The first-fit arena allocator.
//!
//! [`Arena`] owns `N` bytes and hands out blocks of them by offset. The
//! chain of descriptors lives inside those bytes, so the arena needs no
//! memory beyond its own value and can be placed in a `static`.

use core::fmt;

use crate::allocator::{Allocator, ChainState};
use crate::chain::Blocks;
use crate::config::ArenaConfig;
use crate::descriptor::{Descriptor, ALIGN, DESCRIPTOR_SIZE, MIN_BLOCK_DATA};
use crate::error::ArenaError;
use crate::handle::BlockHandle;
use crate::raw::Storage;

/// Heap-free first-fit allocator over an `N`-byte arena.
///
/// The block chain is built lazily by the first allocation request, so
/// constructing an arena is free and `const`. There is no reset: once
/// built, the chain lives as long as the arena.
///
/// `N` must be a multiple of 8, at least 24 and at most `u32::MAX`;
/// anything else fails to compile.
///
/// The arena performs no synchronisation. Share it between threads or
/// interrupt contexts only behind a lock, or use
/// [`GlobalArena`](crate::GlobalArena), which also hands out raw pointers.
pub struct Arena<const N: usize> {
    storage: Storage<N>,
    state: ChainState,
}

impl<const N: usize> Arena<N> {
    /// Total arena size in bytes, descriptors included.
    pub const CAPACITY: usize = N;

    pub(crate) const LAYOUT_OK: () = {
        assert!(N % ALIGN == 0, "arena capacity must be a multiple of 8");
        assert!(
            N >= DESCRIPTOR_SIZE + MIN_BLOCK_DATA,
            "arena capacity must hold at least one minimal block"
        );
        assert!(N <= u32::MAX as usize, "arena capacity must fit in u32");
    };

    /// Create an arena with the default config.
    pub const fn new() -> Self {
        Self::with_config(ArenaConfig::new())
    }

    /// Create an arena with the given config.
    pub const fn with_config(config: ArenaConfig) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::LAYOUT_OK;
        Self {
            storage: Storage::new(),
            state: ChainState::new(config),
        }
    }

    /// The config this arena was created with.
    pub fn config(&self) -> &ArenaConfig {
        &self.state.config
    }

    /// Whether the block chain has been built yet.
    pub fn is_initialized(&self) -> bool {
        self.state.initialized
    }

    fn allocator(&mut self) -> Allocator<'_, '_, N> {
        Allocator::new(&mut self.state, self.storage.view_mut())
    }

    /// Allocate a block of at least `size` bytes.
    ///
    /// `size` is rounded up to a multiple of 8. The first free block large
    /// enough wins; if it has room to spare for another block, the excess
    /// is split off as a new free block.
    ///
    /// # Errors
    ///
    /// [`ArenaError::EmptyRequest`] for `size == 0`, and
    /// [`ArenaError::OutOfMemory`] when no free block is large enough.
    pub fn allocate(&mut self, size: usize) -> Result<BlockHandle, ArenaError> {
        self.allocator().allocate(size)
    }

    /// Allocate room for `count` elements of `element_size` bytes each,
    /// with every byte of the block set to zero.
    ///
    /// A zero total (either factor zero) still yields a minimal block, so
    /// the caller always gets a distinct allocation back.
    ///
    /// # Errors
    ///
    /// [`ArenaError::SizeOverflow`] if the product overflows `usize`; no
    /// allocation is attempted. Otherwise the errors of [`Arena::allocate`].
    pub fn zero_allocate(
        &mut self,
        count: usize,
        element_size: usize,
    ) -> Result<BlockHandle, ArenaError> {
        self.allocator().zero_allocate(count, element_size)
    }

    /// Return a block to the arena. `None` is a no-op.
    ///
    /// The block is marked free and the whole chain is coalesced, so no two
    /// free blocks remain adjacent.
    ///
    /// # Errors
    ///
    /// Only in [`GuardMode::Checked`](crate::GuardMode::Checked):
    /// [`ArenaError::InvalidBlock`] or [`ArenaError::DoubleRelease`], with
    /// the arena left unchanged. Unchecked arenas trust the handle and
    /// always succeed.
    pub fn release(&mut self, handle: Option<BlockHandle>) -> Result<(), ArenaError> {
        self.allocator().release(handle)
    }

    /// Resize a block, moving it only when it cannot grow in place.
    ///
    /// - `None` behaves as [`Arena::allocate`].
    /// - `new_size == 0` releases the block and returns `Ok(None)`.
    /// - A block already large enough is trimmed and keeps its handle.
    /// - A block followed by a free block that makes up the difference
    ///   absorbs it and keeps its handle.
    /// - Otherwise a new block is allocated, the old contents copied over
    ///   (up to the smaller of the two sizes), and the old block released.
    ///
    /// # Errors
    ///
    /// On [`ArenaError::OutOfMemory`] the original block is untouched and
    /// still allocated. Checked arenas also report invalid handles as in
    /// [`Arena::release`].
    pub fn reallocate(
        &mut self,
        handle: Option<BlockHandle>,
        new_size: usize,
    ) -> Result<Option<BlockHandle>, ArenaError> {
        self.allocator().reallocate(handle, new_size)
    }

    /// Usable bytes in the block, which may exceed what was requested.
    pub fn block_size(&self, handle: BlockHandle) -> usize {
        Descriptor::load(self.storage.view(), handle.descriptor_offset()).size
    }

    /// The block's data area.
    pub fn data(&self, handle: BlockHandle) -> &[u8] {
        let size = self.block_size(handle);
        self.storage.bytes(handle.offset(), size)
    }

    /// The block's data area, writable.
    pub fn data_mut(&mut self, handle: BlockHandle) -> &mut [u8] {
        let size = self.block_size(handle);
        self.storage.bytes_mut(handle.offset(), size)
    }

    /// The whole arena image, descriptors and free space included.
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.bytes(0, N)
    }

    /// Walk the block chain in address order. Empty until the first
    /// allocation request builds the chain.
    pub fn blocks(&self) -> Blocks<'_, N> {
        Blocks::new(self.storage.view(), self.state.initialized)
    }
}

impl<const N: usize> Default for Arena<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for Arena<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &N)
            .field("config", &self.state.config)
            .field("initialized", &self.state.initialized)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(Arena<64>: Send);
static_assertions::assert_not_impl_any!(Arena<64>: Sync);

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: usize = 4096;
    const WHOLE: usize = CAP - DESCRIPTOR_SIZE;

    fn layout<const N: usize>(arena: &Arena<N>) -> Vec<(usize, usize, bool)> {
        arena
            .blocks()
            .map(|b| (b.offset, b.size, b.is_free))
            .collect()
    }

    fn assert_no_adjacent_free<const N: usize>(arena: &Arena<N>) {
        let blocks: Vec<_> = arena.blocks().collect();
        for pair in blocks.windows(2) {
            assert!(
                !(pair[0].is_free && pair[1].is_free),
                "adjacent free blocks at {} and {}",
                pair[0].offset,
                pair[1].offset
            );
        }
    }

    // ── initialization ─────────────────────────────────────────

    #[test]
    fn chain_is_built_on_first_allocation() {
        let mut arena = Arena::<CAP>::new();
        assert!(!arena.is_initialized());
        assert_eq!(arena.blocks().count(), 0);

        arena.allocate(1).unwrap();
        assert!(arena.is_initialized());
    }

    #[test]
    fn zero_size_request_does_not_initialise() {
        let mut arena = Arena::<CAP>::new();
        assert_eq!(arena.allocate(0), Err(ArenaError::EmptyRequest));
        assert!(!arena.is_initialized());
    }

    #[test]
    fn whole_arena_is_allocatable_once() {
        let mut arena = Arena::<CAP>::new();
        let h = arena.allocate(WHOLE).unwrap();
        assert_eq!(h.offset(), DESCRIPTOR_SIZE);
        assert_eq!(arena.block_size(h), WHOLE);
        assert!(matches!(
            arena.allocate(1),
            Err(ArenaError::OutOfMemory { largest_free: 0, .. })
        ));
    }

    #[test]
    fn arena_can_live_in_a_const() {
        let mut arena: Arena<64> = const { Arena::new() };
        assert!(arena.allocate(8).is_ok());
    }

    // ── allocate ───────────────────────────────────────────────

    #[test]
    fn sizes_round_up_to_eight() {
        let mut arena = Arena::<CAP>::new();
        let a = arena.allocate(101).unwrap();
        assert_eq!(arena.block_size(a), 104);
        let b = arena.allocate(1).unwrap();
        assert_eq!(b.offset(), a.offset() + 104 + DESCRIPTOR_SIZE);
    }

    #[test]
    fn handles_are_eight_aligned() {
        let mut arena = Arena::<CAP>::new();
        for size in [1, 3, 9, 17, 33, 100] {
            let h = arena.allocate(size).unwrap();
            assert_eq!(h.offset() % ALIGN, 0);
        }
    }

    #[test]
    fn oversized_request_fails_cleanly() {
        let mut arena = Arena::<CAP>::new();
        assert_eq!(
            arena.allocate(CAP),
            Err(ArenaError::OutOfMemory {
                requested: CAP,
                largest_free: WHOLE
            })
        );
        assert_eq!(layout(&arena), vec![(0, WHOLE, true)]);
    }

    #[test]
    fn unalignable_request_is_out_of_memory() {
        let mut arena = Arena::<CAP>::new();
        assert_eq!(
            arena.allocate(usize::MAX),
            Err(ArenaError::OutOfMemory {
                requested: usize::MAX,
                largest_free: WHOLE
            })
        );
    }

    #[test]
    fn small_leftover_stays_with_block() {
        let mut arena = Arena::<64>::new();
        // 48 usable bytes; a 32-byte request leaves 16, short of a block.
        let h = arena.allocate(32).unwrap();
        assert_eq!(arena.block_size(h), 48);
        assert_eq!(arena.blocks().count(), 1);
    }

    #[test]
    fn first_fit_reuses_earliest_hole() {
        let mut arena = Arena::<CAP>::new();
        let a = arena.allocate(64).unwrap();
        let _b = arena.allocate(64).unwrap();
        let c = arena.allocate(64).unwrap();
        let _d = arena.allocate(64).unwrap();
        arena.release(Some(c)).unwrap();
        arena.release(Some(a)).unwrap();

        assert_eq!(arena.allocate(32).unwrap(), a);
    }

    // ── zero_allocate ──────────────────────────────────────────

    #[test]
    fn zero_allocate_clears_reused_memory() {
        let mut arena = Arena::<CAP>::new();
        let dirty = arena.allocate(64).unwrap();
        arena.data_mut(dirty).fill(0xAA);
        arena.release(Some(dirty)).unwrap();

        let h = arena.zero_allocate(8, 8).unwrap();
        assert_eq!(h, dirty);
        assert!(arena.data(h).iter().all(|&b| b == 0));
    }

    #[test]
    fn zero_allocate_overflow_touches_nothing() {
        let mut arena = Arena::<CAP>::new();
        arena.allocate(8).unwrap();
        let before = arena.as_bytes().to_vec();

        assert_eq!(
            arena.zero_allocate(usize::MAX, 2),
            Err(ArenaError::SizeOverflow {
                count: usize::MAX,
                element_size: 2
            })
        );
        assert_eq!(arena.as_bytes(), &before[..]);
    }

    #[test]
    fn as_bytes_exposes_descriptors() {
        let mut arena = Arena::<64>::new();
        assert!(arena.as_bytes().iter().all(|&b| b == 0));
        let h = arena.allocate(8).unwrap();
        arena.data_mut(h).fill(0xEE);
        let image = arena.as_bytes();
        assert_eq!(image.len(), 64);
        assert_eq!(&image[..4], &8u32.to_ne_bytes());
        assert_eq!(&image[16..24], &[0xEE; 8]);
    }

    #[test]
    fn zero_allocate_with_zero_element_size_yields_minimal_block() {
        let mut arena = Arena::<CAP>::new();
        let h = arena.zero_allocate(10, 0).unwrap();
        assert_eq!(arena.block_size(h), MIN_BLOCK_DATA);
        let g = arena.zero_allocate(0, 10).unwrap();
        assert_ne!(h, g);
    }

    #[test]
    fn zero_allocate_propagates_out_of_memory() {
        let mut arena = Arena::<64>::new();
        assert!(matches!(
            arena.zero_allocate(2, 64),
            Err(ArenaError::OutOfMemory { .. })
        ));
    }

    // ── release ────────────────────────────────────────────────

    #[test]
    fn release_none_is_noop() {
        let mut arena = Arena::<CAP>::new();
        assert_eq!(arena.release(None), Ok(()));
        assert!(!arena.is_initialized());
    }

    #[test]
    fn release_coalesces_both_neighbours() {
        let mut arena = Arena::<CAP>::new();
        let a = arena.allocate(32).unwrap();
        let b = arena.allocate(32).unwrap();
        let c = arena.allocate(32).unwrap();
        let _tail_guard = arena.allocate(32).unwrap();

        arena.release(Some(a)).unwrap();
        arena.release(Some(c)).unwrap();
        assert_no_adjacent_free(&arena);
        assert_eq!(arena.blocks().filter(|b| b.is_free).count(), 3);

        arena.release(Some(b)).unwrap();
        assert_no_adjacent_free(&arena);
        let blocks: Vec<_> = arena.blocks().collect();
        assert_eq!(blocks[0].size, 32 * 3 + DESCRIPTOR_SIZE * 2);
        assert!(blocks[0].is_free);
    }

    #[test]
    fn releasing_everything_restores_single_block() {
        let mut arena = Arena::<CAP>::new();
        let handles: Vec<_> = (1..=10).map(|i| arena.allocate(i * 24).unwrap()).collect();
        for h in handles.into_iter().rev().step_by(2) {
            arena.release(Some(h)).unwrap();
        }
        let rest: Vec<_> = arena
            .blocks()
            .filter(|b| !b.is_free)
            .map(|b| BlockHandle::from_descriptor(b.offset))
            .collect();
        for h in rest {
            arena.release(Some(h)).unwrap();
        }
        assert_eq!(layout(&arena), vec![(0, WHOLE, true)]);
    }

    // ── reallocate ─────────────────────────────────────────────

    #[test]
    fn reallocate_none_allocates() {
        let mut arena = Arena::<CAP>::new();
        let h = arena.reallocate(None, 40).unwrap().unwrap();
        assert_eq!(arena.block_size(h), 40);
    }

    #[test]
    fn reallocate_to_zero_releases() {
        let mut arena = Arena::<CAP>::new();
        let h = arena.allocate(40).unwrap();
        assert_eq!(arena.reallocate(Some(h), 0), Ok(None));
        assert_eq!(layout(&arena), vec![(0, WHOLE, true)]);
    }

    #[test]
    fn shrink_keeps_address_and_frees_tail() {
        let mut arena = Arena::<CAP>::new();
        let h = arena.allocate(256).unwrap();
        let _next = arena.allocate(8).unwrap();

        let shrunk = arena.reallocate(Some(h), 64).unwrap().unwrap();
        assert_eq!(shrunk, h);
        assert_eq!(arena.block_size(h), 64);
        assert_no_adjacent_free(&arena);
        assert_eq!(
            arena.blocks().nth(1).map(|b| (b.size, b.is_free)),
            Some((256 - 64 - DESCRIPTOR_SIZE, true))
        );
    }

    #[test]
    fn shrink_next_to_free_space_stays_coalesced() {
        let mut arena = Arena::<CAP>::new();
        let h = arena.allocate(256).unwrap();
        arena.reallocate(Some(h), 16).unwrap();
        assert_eq!(layout(&arena), vec![(0, 16, false), (32, WHOLE - 32, true)]);
    }

    #[test]
    fn grow_in_place_into_free_successor() {
        let mut arena = Arena::<CAP>::new();
        let h = arena.allocate(32).unwrap();
        let gap = arena.allocate(64).unwrap();
        let _fence = arena.allocate(8).unwrap();
        arena.release(Some(gap)).unwrap();
        arena.data_mut(h)[..4].copy_from_slice(b"keep");

        // 100 rounds to 104; the merged 112 bytes leave too little to split.
        let grown = arena.reallocate(Some(h), 100).unwrap().unwrap();
        assert_eq!(grown, h);
        assert_eq!(arena.block_size(h), 32 + DESCRIPTOR_SIZE + 64);
        assert_eq!(&arena.data(h)[..4], b"keep");
    }

    #[test]
    fn grow_in_place_splits_excess() {
        let mut arena = Arena::<CAP>::new();
        let h = arena.allocate(32).unwrap();
        let grown = arena.reallocate(Some(h), 64).unwrap().unwrap();
        assert_eq!(grown, h);
        assert_eq!(layout(&arena), vec![(0, 64, false), (80, WHOLE - 80, true)]);
    }

    #[test]
    fn grow_by_moving_preserves_contents() {
        let mut arena = Arena::<CAP>::new();
        let h = arena.allocate(16).unwrap();
        let _fence = arena.allocate(8).unwrap();
        arena.data_mut(h).copy_from_slice(b"0123456789abcdef");

        let moved = arena.reallocate(Some(h), 128).unwrap().unwrap();
        assert_ne!(moved, h);
        assert_eq!(&arena.data(moved)[..16], b"0123456789abcdef");
        assert!(arena.blocks().next().is_some_and(|b| b.is_free));
        assert_no_adjacent_free(&arena);
    }

    #[test]
    fn failed_move_leaves_original_allocated() {
        let mut arena = Arena::<128>::new();
        let h = arena.allocate(16).unwrap();
        let _fence = arena.allocate(8).unwrap();
        arena.data_mut(h).fill(7);
        let before = layout(&arena);

        assert!(matches!(
            arena.reallocate(Some(h), 512),
            Err(ArenaError::OutOfMemory { .. })
        ));
        assert_eq!(layout(&arena), before);
        assert!(arena.data(h).iter().all(|&b| b == 7));
    }

    // ── checked mode ───────────────────────────────────────────

    #[test]
    fn checked_mode_detects_double_release() {
        let mut arena = Arena::<CAP>::with_config(ArenaConfig::checked());
        let a = arena.allocate(32).unwrap();
        let _b = arena.allocate(32).unwrap();
        arena.release(Some(a)).unwrap();
        assert_eq!(
            arena.release(Some(a)),
            Err(ArenaError::DoubleRelease { offset: a.offset() })
        );
    }

    #[test]
    fn checked_mode_rejects_absorbed_block() {
        let mut arena = Arena::<CAP>::with_config(ArenaConfig::checked());
        let a = arena.allocate(32).unwrap();
        let b = arena.allocate(32).unwrap();
        arena.release(Some(a)).unwrap();
        arena.release(Some(b)).unwrap();
        // `b` was merged into `a`; its descriptor no longer exists.
        assert_eq!(
            arena.release(Some(b)),
            Err(ArenaError::InvalidBlock { offset: b.offset() })
        );
    }

    #[test]
    fn checked_mode_rejects_interior_handle() {
        let mut arena = Arena::<CAP>::with_config(ArenaConfig::checked());
        let a = arena.allocate(64).unwrap();
        let interior = BlockHandle::from_data_offset(a.offset() + 32);
        let before = layout(&arena);
        assert_eq!(
            arena.reallocate(Some(interior), 8),
            Err(ArenaError::InvalidBlock {
                offset: interior.offset()
            })
        );
        assert_eq!(layout(&arena), before);
    }

    #[test]
    fn checked_mode_rejects_before_initialisation() {
        let mut arena = Arena::<CAP>::with_config(ArenaConfig::checked());
        let h = BlockHandle::from_data_offset(DESCRIPTOR_SIZE);
        assert_eq!(
            arena.release(Some(h)),
            Err(ArenaError::InvalidBlock {
                offset: DESCRIPTOR_SIZE
            })
        );
    }

    #[test]
    #[should_panic(expected = "corrupt chain")]
    fn unchecked_release_of_uninitialised_arena_panics() {
        let mut arena = Arena::<CAP>::new();
        let _ = arena.release(Some(BlockHandle::from_data_offset(DESCRIPTOR_SIZE)));
    }

    // ── reuse scenario ──────────────────────────────────────────

    #[test]
    fn reuse_then_collapse_scenario() {
        let mut arena = Arena::<CAP>::new();
        let a = arena.allocate(101).unwrap();
        assert_eq!(arena.block_size(a), 104);
        let b = arena.allocate(200).unwrap();
        assert!(a.offset() + 104 <= b.offset());

        arena.release(Some(a)).unwrap();
        let c = arena.allocate(104).unwrap();
        assert_eq!(c, a);

        arena.release(Some(b)).unwrap();
        arena.release(Some(c)).unwrap();
        assert_eq!(layout(&arena), vec![(0, WHOLE, true)]);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Alloc(usize),
            Zero(usize, usize),
            Release(usize),
            Realloc(usize, usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1usize..300).prop_map(Op::Alloc),
                (0usize..20, 0usize..20).prop_map(|(n, s)| Op::Zero(n, s)),
                any::<usize>().prop_map(Op::Release),
                (any::<usize>(), 0usize..400).prop_map(|(i, s)| Op::Realloc(i, s)),
            ]
        }

        fn check_chain(arena: &Arena<1024>) -> Result<(), TestCaseError> {
            let blocks: Vec<_> = arena.blocks().collect();
            let mut expected = 0;
            for block in &blocks {
                prop_assert_eq!(block.offset, expected);
                prop_assert_eq!(block.data_offset() % ALIGN, 0);
                expected = block.end();
            }
            prop_assert_eq!(expected, 1024);
            for pair in blocks.windows(2) {
                prop_assert!(!(pair[0].is_free && pair[1].is_free));
            }
            Ok(())
        }

        proptest! {
            #[test]
            fn chain_invariants_hold_under_random_ops(
                ops in proptest::collection::vec(op(), 1..60),
            ) {
                let mut arena = Arena::<1024>::new();
                let mut live: Vec<BlockHandle> = Vec::new();
                for op in ops {
                    match op {
                        Op::Alloc(size) => {
                            if let Ok(h) = arena.allocate(size) {
                                prop_assert!(arena.block_size(h) >= size);
                                live.push(h);
                            }
                        }
                        Op::Zero(n, s) => {
                            if let Ok(h) = arena.zero_allocate(n, s) {
                                prop_assert!(arena.data(h).iter().all(|&b| b == 0));
                                live.push(h);
                            }
                        }
                        Op::Release(i) if !live.is_empty() => {
                            let h = live.swap_remove(i % live.len());
                            arena.release(Some(h)).unwrap();
                        }
                        Op::Realloc(i, size) if !live.is_empty() => {
                            let idx = i % live.len();
                            match arena.reallocate(Some(live[idx]), size) {
                                Ok(Some(h)) => live[idx] = h,
                                Ok(None) => {
                                    live.swap_remove(idx);
                                }
                                Err(_) => {}
                            }
                        }
                        _ => {}
                    }
                    if arena.is_initialized() {
                        check_chain(&arena)?;
                    }
                }
            }

            #[test]
            fn release_all_restores_single_block(
                sizes in proptest::collection::vec(1usize..200, 1..20),
            ) {
                let mut arena = Arena::<1024>::new();
                let handles: Vec<_> = sizes
                    .iter()
                    .filter_map(|&s| arena.allocate(s).ok())
                    .collect();
                for h in handles {
                    arena.release(Some(h)).unwrap();
                }
                prop_assert_eq!(arena.blocks().count(), 1);
                prop_assert!(arena.blocks().all(|b| b.is_free));
            }
        }
    }
}
