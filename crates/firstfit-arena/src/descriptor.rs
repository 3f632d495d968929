//! Block descriptor layout.
//!
//! Every block starts with a 16-byte descriptor stored inside the arena
//! itself, followed by the block's data area:
//!
//! ```text
//! descriptor offset
//! │
//! ▼
//! ┌────────┬────────┬────────┬────────┬──────────────────────────┐
//! │  size  │  next  │ flags  │ guard  │ data (size bytes)        │
//! │  u32   │  u32   │  u32   │  u32   │                          │
//! └────────┴────────┴────────┴────────┴──────────────────────────┘
//!  +0       +4       +8       +12      +16 = handle offset
//! ```
//!
//! `next` is the byte offset of the following descriptor (`u32::MAX` for
//! the last block). Because blocks tile the arena without gaps, `next`
//! always equals `offset + DESCRIPTOR_SIZE + size`.

use crate::raw::{View, ViewMut};

/// Size of a block descriptor in bytes.
pub const DESCRIPTOR_SIZE: usize = 16;

/// Alignment unit. Request sizes are rounded up to a multiple of this, so
/// every descriptor and data offset is a multiple of it too.
pub const ALIGN: usize = 8;

/// Smallest data area worth creating when splitting a block.
pub const MIN_BLOCK_DATA: usize = 8;

const SIZE_AT: usize = 0;
const NEXT_AT: usize = 4;
const FLAGS_AT: usize = 8;
const GUARD_AT: usize = 12;

const NO_NEXT: u32 = u32::MAX;
const FLAG_FREE: u32 = 1;
const GUARD_SEED: u32 = 0xB10C_5EED;

static_assertions::const_assert_eq!(GUARD_AT + 4, DESCRIPTOR_SIZE);
static_assertions::const_assert_eq!(DESCRIPTOR_SIZE % ALIGN, 0);
static_assertions::const_assert!(MIN_BLOCK_DATA >= ALIGN);

/// Round `size` up to the next multiple of [`ALIGN`].
///
/// Returns `None` if the rounded size does not fit in `usize`.
pub const fn align_up(size: usize) -> Option<usize> {
    match size.checked_add(ALIGN - 1) {
        Some(padded) => Some(padded & !(ALIGN - 1)),
        None => None,
    }
}

/// Decoded form of a descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Descriptor {
    pub(crate) size: usize,
    pub(crate) next: Option<usize>,
    pub(crate) is_free: bool,
    pub(crate) guard: u32,
}

impl Descriptor {
    /// A descriptor to be stored at `at`, carrying that position's guard.
    pub(crate) fn new(at: usize, size: usize, next: Option<usize>, is_free: bool) -> Self {
        Self {
            size,
            next,
            is_free,
            guard: guard_for(at),
        }
    }

    /// Read the descriptor stored at `at`.
    ///
    /// # Panics
    ///
    /// Panics if the stored `next` link does not point strictly forward to
    /// a descriptor inside the arena. A chain that only moves forward can
    /// never loop.
    pub(crate) fn load<const N: usize>(storage: View<'_, N>, at: usize) -> Self {
        let size = storage.read_u32(at + SIZE_AT) as usize;
        let next = match storage.read_u32(at + NEXT_AT) {
            NO_NEXT => None,
            raw => {
                let next = raw as usize;
                assert!(
                    next > at && next + DESCRIPTOR_SIZE <= N,
                    "corrupt chain: descriptor at {at} links to {next}"
                );
                debug_assert_eq!(next, at + DESCRIPTOR_SIZE + size, "gap in chain at {at}");
                Some(next)
            }
        };
        Self {
            size,
            next,
            is_free: storage.read_u32(at + FLAGS_AT) & FLAG_FREE != 0,
            guard: storage.read_u32(at + GUARD_AT),
        }
    }

    /// Write this descriptor at `at`.
    pub(crate) fn store<const N: usize>(&self, storage: &mut ViewMut<'_, N>, at: usize) {
        storage.write_u32(at + SIZE_AT, self.size as u32);
        storage.write_u32(at + NEXT_AT, self.next.map_or(NO_NEXT, |next| next as u32));
        storage.write_u32(at + FLAGS_AT, if self.is_free { FLAG_FREE } else { 0 });
        storage.write_u32(at + GUARD_AT, self.guard);
    }
}

/// Read only the guard word at `at`, without decoding the rest.
pub(crate) fn load_guard<const N: usize>(storage: View<'_, N>, at: usize) -> u32 {
    storage.read_u32(at + GUARD_AT)
}

/// Erase the guard word of a descriptor that no longer heads a block.
pub(crate) fn scrub_guard<const N: usize>(storage: &mut ViewMut<'_, N>, at: usize) {
    storage.write_u32(at + GUARD_AT, 0);
}

/// Expected guard word for a descriptor at `at`.
pub(crate) fn guard_for(at: usize) -> u32 {
    GUARD_SEED ^ at as u32
}
