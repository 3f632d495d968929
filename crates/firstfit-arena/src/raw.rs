//! Backing storage and the accessors that touch it.
//!
//! This is the only module that dereferences arena memory. The bytes live
//! in an `UnsafeCell` owned by [`Storage`]; the allocator reaches them
//! through [`View`] and [`ViewMut`], small windows that carry only the base
//! address. A window never borrows the buffer as a whole, so building one
//! does not invalidate pointers already handed out into allocated blocks.
//!
//! Every accessor asserts its range lies inside the arena before touching
//! memory, so a corrupted offset panics instead of reaching memory outside
//! the buffer. Slices are only ever formed over the exact range being
//! accessed, and only for as long as the access lasts.

#![allow(unsafe_code)]

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use crate::descriptor::ALIGN;

#[repr(C, align(8))]
struct Bytes<const N: usize>([u8; N]);

static_assertions::const_assert_eq!(core::mem::align_of::<Bytes<0>>(), ALIGN);

fn check<const N: usize>(offset: usize, len: usize) {
    assert!(
        offset <= N && len <= N - offset,
        "range {offset}+{len} outside arena of {} bytes",
        N
    );
}

/// Fixed-size, 8-aligned arena bytes.
pub(crate) struct Storage<const N: usize> {
    cell: UnsafeCell<Bytes<N>>,
}

impl<const N: usize> Storage<N> {
    pub(crate) const fn new() -> Self {
        Self {
            cell: UnsafeCell::new(Bytes([0; N])),
        }
    }

    fn base(&self) -> NonNull<u8> {
        // SAFETY: `UnsafeCell::get` returns the address of the cell's
        // contents, which is never null.
        unsafe { NonNull::new_unchecked(self.cell.get().cast::<u8>()) }
    }

    /// Shared view of `len` bytes at `offset`.
    pub(crate) fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        check::<N>(offset, len);
        // SAFETY: the range is inside the buffer (checked above). Writers
        // need `&mut self` (`bytes_mut`, `view_mut`) or the lock-holding
        // contract of `view_mut_unchecked`, whose users never call this.
        unsafe { core::slice::from_raw_parts(self.base().as_ptr().add(offset), len) }
    }

    /// Exclusive view of `len` bytes at `offset`.
    pub(crate) fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        check::<N>(offset, len);
        // SAFETY: the range is inside the buffer (checked above); `&mut self`
        // guarantees no other slice into the storage is alive.
        unsafe { core::slice::from_raw_parts_mut(self.base().as_ptr().add(offset), len) }
    }

    /// Read-only window onto the arena.
    pub(crate) fn view(&self) -> View<'_, N> {
        View {
            base: self.base(),
            _storage: PhantomData,
        }
    }

    /// Read-write window, exclusive for as long as the borrow lasts.
    pub(crate) fn view_mut(&mut self) -> ViewMut<'_, N> {
        ViewMut {
            base: self.base(),
            _storage: PhantomData,
        }
    }

    /// Read-write window through a shared borrow.
    ///
    /// # Safety
    ///
    /// While the window lives, the caller must be the only party reading
    /// or writing descriptors and free blocks of this storage, and no
    /// reference may overlap any range the window writes. Allocated blocks
    /// belong to their owners and are only written when the owner hands
    /// them back (reallocation) or when freshly allocated (zeroing).
    pub(crate) unsafe fn view_mut_unchecked(&self) -> ViewMut<'_, N> {
        ViewMut {
            base: self.base(),
            _storage: PhantomData,
        }
    }
}

/// Read-only window onto a [`Storage`].
#[derive(Clone, Copy)]
pub(crate) struct View<'a, const N: usize> {
    base: NonNull<u8>,
    _storage: PhantomData<&'a Storage<N>>,
}

impl<const N: usize> View<'_, N> {
    pub(crate) fn read_u32(self, offset: usize) -> u32 {
        check::<N>(offset, 4);
        // SAFETY: the word is inside the buffer (checked above). Whoever
        // created this window rules out concurrent writers.
        unsafe { ptr::read_unaligned(self.base.as_ptr().add(offset).cast::<u32>()) }
    }

    /// Address of the byte at `offset`.
    pub(crate) fn ptr_at(self, offset: usize) -> NonNull<u8> {
        check::<N>(offset, 0);
        // SAFETY: `offset <= N`, so the result is inside (or one past) the
        // buffer, and the buffer base is never null.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
    }

    /// Offset of `ptr` from the arena base, if it points into the arena.
    pub(crate) fn offset_of(self, ptr: *const u8) -> Option<usize> {
        ptr.addr()
            .checked_sub(self.base.addr().get())
            .filter(|&offset| offset < N)
    }
}

/// Read-write window onto a [`Storage`].
pub(crate) struct ViewMut<'a, const N: usize> {
    base: NonNull<u8>,
    _storage: PhantomData<&'a Storage<N>>,
}

impl<const N: usize> ViewMut<'_, N> {
    /// Read-only copy of this window.
    pub(crate) fn view(&self) -> View<'_, N> {
        View {
            base: self.base,
            _storage: PhantomData,
        }
    }

    pub(crate) fn write_u32(&mut self, offset: usize, value: u32) {
        check::<N>(offset, 4);
        // SAFETY: the word is inside the buffer (checked above) and is
        // descriptor metadata, which only the window's holder touches.
        unsafe { ptr::write_unaligned(self.base.as_ptr().add(offset).cast::<u32>(), value) }
    }

    /// Copy `len` bytes between two non-overlapping ranges.
    pub(crate) fn copy_block(&mut self, src: usize, dst: usize, len: usize) {
        check::<N>(src, len);
        check::<N>(dst, len);
        assert!(
            src + len <= dst || dst + len <= src,
            "copy ranges {src}+{len} and {dst}+{len} overlap"
        );
        // SAFETY: both ranges are inside the buffer and disjoint (checked
        // above), so the two slices never alias. Both blocks are owned by
        // the allocator for the duration of the copy, and the slices die
        // before this returns.
        let (from, to) = unsafe {
            (
                core::slice::from_raw_parts(self.base.as_ptr().add(src), len),
                core::slice::from_raw_parts_mut(self.base.as_ptr().add(dst), len),
            )
        };
        firstfit_mem::copy(to, from, len);
    }

    /// Set `len` bytes at `offset` to `value`.
    pub(crate) fn fill(&mut self, offset: usize, len: usize, value: u8) {
        check::<N>(offset, len);
        // SAFETY: the range is inside the buffer (checked above) and owned
        // by the allocator while it is filled; the slice dies on return.
        let bytes =
            unsafe { core::slice::from_raw_parts_mut(self.base.as_ptr().add(offset), len) };
        firstfit_mem::fill(bytes, value);
    }

    /// Address of the byte at `offset`.
    pub(crate) fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        self.view().ptr_at(offset)
    }
}
