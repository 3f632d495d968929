//! Heap-free first-fit allocation over a fixed-size byte arena.
//!
//! An [`Arena`] owns `N` bytes and carves them into variable-sized blocks
//! on request. Bookkeeping lives inside the arena itself: every block is
//! preceded by a 16-byte descriptor, and the descriptors form a chain in
//! address order that tiles the whole buffer. Nothing here touches a
//! system heap, so the crate is `no_std` and an arena can be a `static`.
//!
//! # Architecture
//!
//! ```text
//! Arena<N> (handle API)          GlobalArena<N> (pointer API, GlobalAlloc)
//! ├── ChainState                  ├── spin::Mutex<ChainState>
//! └── Storage<N>                  └── Storage<N> (outside the lock)
//!          │                                │
//!          └──────────── Allocator ─────────┘
//!               (allocate / zero_allocate / release / reallocate)
//!               ├── chain (first-fit search, split, coalesce)
//!               │   └── Descriptor (size, next, flags, guard at each block head)
//!               └── View / ViewMut (8-aligned bytes, bounds-checked accessors)
//! ```
//!
//! # Allocation policy
//!
//! - **Search:** first fit from the start of the chain.
//! - **Split:** a chosen block keeps what was asked for when the excess
//!   can hold a descriptor and 8 data bytes; the excess becomes a free block.
//! - **Merge:** after every release no two free blocks are adjacent.
//!
//! Sizes are rounded up to multiples of 8, and every data address is
//! 8-aligned.
//!
//! # Safety
//!
//! Memory access is confined to `raw.rs`, where every slice is formed over
//! a bounds-checked range and only for the duration of one access. The
//! allocator never borrows the arena bytes as a whole while pointers into
//! them are outstanding. `global.rs` declares the `unsafe` pointer entry
//! points, the `Sync` impl and the `GlobalAlloc` impl.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

mod allocator;
pub mod arena;
pub mod chain;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod global;
pub mod handle;
mod raw;

// Public re-exports for the primary API surface.
pub use arena::Arena;
pub use chain::{BlockInfo, Blocks};
pub use config::{ArenaConfig, GuardMode};
pub use descriptor::{align_up, ALIGN, DESCRIPTOR_SIZE, MIN_BLOCK_DATA};
pub use error::ArenaError;
pub use global::GlobalArena;
pub use handle::BlockHandle;
