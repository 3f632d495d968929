//! firstfit: a heap-free first-fit memory allocator.
//!
//! This is the top-level facade crate that re-exports the public API of
//! the firstfit sub-crates. For most users, adding `firstfit` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use firstfit::prelude::*;
//!
//! let mut arena = Arena::<4096>::new();
//! let a = arena.allocate(101).unwrap();
//! assert_eq!(arena.block_size(a), 104);
//!
//! arena.data_mut(a)[..5].copy_from_slice(b"hello");
//! let a = arena.reallocate(Some(a), 400).unwrap().unwrap();
//! assert_eq!(&arena.data(a)[..5], b"hello");
//!
//! arena.release(Some(a)).unwrap();
//! assert_eq!(arena.blocks().count(), 1);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`arena`] | `firstfit-arena` | `Arena`, `GlobalArena`, handles, errors, config |
//! | [`mem`] | `firstfit-mem` | Byte-range and NUL-terminated text primitives |

#![no_std]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// First-fit arena allocator (`firstfit-arena`).
///
/// [`arena::Arena`] is the handle-based allocator;
/// [`arena::GlobalArena`] wraps it for `#[global_allocator]` use.
pub use firstfit_arena as arena;

/// Freestanding byte and text primitives (`firstfit-mem`).
pub use firstfit_mem as mem;

/// Common imports for typical firstfit usage.
///
/// ```rust
/// use firstfit::prelude::*;
/// ```
pub mod prelude {
    // Allocator
    pub use firstfit_arena::{Arena, BlockHandle, BlockInfo, GlobalArena};

    // Configuration
    pub use firstfit_arena::{ArenaConfig, GuardMode};

    // Errors
    pub use firstfit_arena::ArenaError;
    pub use firstfit_mem::TextError;
}
