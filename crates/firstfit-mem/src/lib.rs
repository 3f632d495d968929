//! Freestanding byte-range and text primitives.
//!
//! These are the copy, move, fill and compare routines a heap-free
//! environment has to supply for itself, plus the three NUL-terminated
//! text helpers that usually travel with them. Everything operates on
//! slices, so a length that exceeds either operand panics instead of
//! walking off the end of a buffer.
//!
//! The arena allocator consumes [`copy`] and [`fill`] only.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bytes;
pub mod text;

pub use bytes::{compare, copy, fill, move_within};
pub use text::{text_append, text_copy, text_len, TextError};
