//! Shadow model of live allocations.

use firstfit_arena::{Arena, BlockHandle};
use indexmap::IndexMap;

#[derive(Clone, Copy, Debug)]
struct Live {
    requested: usize,
    pattern: u8,
}

/// Tracks every live allocation of one arena together with the byte
/// pattern written into it.
///
/// Insertion order is kept so that tests can pick allocations by index
/// deterministically from generated input.
#[derive(Debug, Default)]
pub struct LiveModel {
    live: IndexMap<BlockHandle, Live>,
}

impl LiveModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// The live handle at `index` modulo the number of live handles.
    pub fn pick(&self, index: usize) -> Option<BlockHandle> {
        if self.live.is_empty() {
            return None;
        }
        self.live
            .get_index(index % self.live.len())
            .map(|(handle, _)| *handle)
    }

    /// Record a fresh allocation and fill its first `requested` bytes with
    /// `pattern`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is already live.
    pub fn insert<const N: usize>(
        &mut self,
        arena: &mut Arena<N>,
        handle: BlockHandle,
        requested: usize,
        pattern: u8,
    ) {
        arena.data_mut(handle)[..requested].fill(pattern);
        let previous = self.live.insert(handle, Live { requested, pattern });
        assert!(previous.is_none(), "{handle} handed out twice");
    }

    /// Forget a released allocation. Returns whether it was live.
    pub fn remove(&mut self, handle: BlockHandle) -> bool {
        self.live.shift_remove(&handle).is_some()
    }

    /// Record the outcome of a successful reallocation to `new_size`.
    ///
    /// The surviving prefix keeps the old pattern; any growth is filled
    /// with it too, so the whole requested range stays checkable.
    pub fn moved<const N: usize>(
        &mut self,
        arena: &mut Arena<N>,
        old: BlockHandle,
        new: BlockHandle,
        new_size: usize,
    ) {
        let Some(entry) = self.live.shift_remove(&old) else {
            panic!("{old} is not live");
        };
        let kept = entry.requested.min(new_size);
        assert!(
            arena.data(new)[..kept].iter().all(|&b| b == entry.pattern),
            "contents of {old} not preserved in {new}"
        );
        arena.data_mut(new)[..new_size].fill(entry.pattern);
        self.live.insert(
            new,
            Live {
                requested: new_size,
                pattern: entry.pattern,
            },
        );
    }

    /// Check the model against the arena.
    ///
    /// # Panics
    ///
    /// Panics if a live block is marked free, smaller than requested,
    /// overlaps another live block, or lost its pattern.
    pub fn verify<const N: usize>(&self, arena: &Arena<N>) {
        let mut ranges: Vec<(usize, usize)> = Vec::with_capacity(self.live.len());
        for (&handle, entry) in &self.live {
            let size = arena.block_size(handle);
            assert!(
                size >= entry.requested,
                "{handle} holds {size} bytes, {} requested",
                entry.requested
            );
            assert!(
                arena
                    .blocks()
                    .any(|b| b.data_offset() == handle.offset() && !b.is_free),
                "{handle} is not an allocated block"
            );
            assert!(
                arena.data(handle)[..entry.requested]
                    .iter()
                    .all(|&b| b == entry.pattern),
                "{handle} contents clobbered"
            );
            ranges.push((handle.offset(), handle.offset() + size));
        }

        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            assert!(
                pair[0].1 <= pair[1].0,
                "live blocks {:?} and {:?} overlap",
                pair[0],
                pair[1]
            );
        }
    }

    pub fn handles(&self) -> impl Iterator<Item = BlockHandle> + '_ {
        self.live.keys().copied()
    }
}
