//! Block handles.
//!
//! A [`BlockHandle`] is the safe-API counterpart of an allocation address:
//! the byte offset of a block's data area from the arena base. Handles are
//! plain values; they do not borrow the arena and are not checked for
//! staleness unless the arena runs in [`GuardMode::Checked`](crate::GuardMode).

use core::fmt;

use crate::descriptor::DESCRIPTOR_SIZE;

/// Location of an allocation's data area within its arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct BlockHandle {
    /// Byte offset of the data area. Always at least `DESCRIPTOR_SIZE`.
    offset: u32,
}

impl BlockHandle {
    /// Handle for the block whose descriptor starts at `descriptor`.
    pub(crate) fn from_descriptor(descriptor: usize) -> Self {
        Self::from_data_offset(descriptor + DESCRIPTOR_SIZE)
    }

    /// Handle for a data area at `offset`. Capacity is capped at
    /// `u32::MAX`, so every in-arena offset fits.
    pub(crate) fn from_data_offset(offset: usize) -> Self {
        debug_assert!(offset >= DESCRIPTOR_SIZE);
        Self {
            offset: offset as u32,
        }
    }

    /// Byte offset of the data area from the arena base.
    pub fn offset(&self) -> usize {
        self.offset as usize
    }

    /// Byte offset of the block's descriptor.
    pub(crate) fn descriptor_offset(&self) -> usize {
        self.offset() - DESCRIPTOR_SIZE
    }
}

impl fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHandle(off={})", self.offset)
    }
}
