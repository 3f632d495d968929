//! Arena-specific error types.

use core::error::Error;
use core::fmt;

/// Errors that can occur during arena operations.
///
/// The pointer-level API in [`GlobalArena`](crate::GlobalArena) collapses
/// every variant to a null result; the handle-level API reports them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// A zero-byte allocation was requested. Not a fault: the request is
    /// simply answered with nothing.
    EmptyRequest,
    /// No free block is large enough for the request.
    OutOfMemory {
        /// Requested size in bytes, after rounding up to the alignment unit.
        requested: usize,
        /// Size of the largest free block at the time of the request.
        largest_free: usize,
    },
    /// `count * element_size` does not fit in `usize`.
    SizeOverflow {
        /// Number of elements requested.
        count: usize,
        /// Size of each element in bytes.
        element_size: usize,
    },
    /// The handle does not name a block of this arena (checked mode only).
    InvalidBlock {
        /// Data offset carried by the rejected handle.
        offset: usize,
    },
    /// The handle names a block that is already free (checked mode only).
    DoubleRelease {
        /// Data offset carried by the rejected handle.
        offset: usize,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "zero-size allocation request"),
            Self::OutOfMemory {
                requested,
                largest_free,
            } => {
                write!(
                    f,
                    "out of memory: requested {requested} bytes, largest free block {largest_free} bytes"
                )
            }
            Self::SizeOverflow {
                count,
                element_size,
            } => {
                write!(
                    f,
                    "size overflow: {count} elements of {element_size} bytes"
                )
            }
            Self::InvalidBlock { offset } => {
                write!(f, "offset {offset} does not name an arena block")
            }
            Self::DoubleRelease { offset } => {
                write!(f, "block at offset {offset} is already free")
            }
        }
    }
}

impl Error for ArenaError {}
