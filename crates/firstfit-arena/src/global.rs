//! Pointer API and `#[global_allocator]` support.
//!
//! [`GlobalArena`] shares one arena between every thread (or interrupt
//! context) of the program. Its methods trade handles for raw addresses
//! and errors for null pointers.
//!
//! Only the chain bookkeeping sits behind the spin lock. The arena bytes
//! stay outside it and are reached through a window opened while the lock
//! is held, so taking the lock never claims the bytes behind pointers
//! already handed out.
//!
//! ```no_run
//! use firstfit_arena::GlobalArena;
//!
//! #[global_allocator]
//! static HEAP: GlobalArena<{ 64 * 1024 }> = GlobalArena::new();
//! ```

#![allow(unsafe_code)]

use core::alloc::{GlobalAlloc, Layout};
use core::fmt;
use core::ptr;

use log::{debug, warn};
use spin::Mutex;

use crate::allocator::{Allocator, ChainState};
use crate::arena::Arena;
use crate::chain::Blocks;
use crate::config::ArenaConfig;
use crate::descriptor::{ALIGN, DESCRIPTOR_SIZE};
use crate::handle::BlockHandle;
use crate::raw::Storage;

/// A lock-protected arena exposing the address-based interface.
pub struct GlobalArena<const N: usize> {
    storage: Storage<N>,
    state: Mutex<ChainState>,
}

// SAFETY: the chain and the free blocks are only touched through a window
// opened while `state` is locked, and allocated blocks are touched only by
// whoever holds their pointer. `handle_of` reads the base address, never
// the bytes.
unsafe impl<const N: usize> Sync for GlobalArena<N> {}

impl<const N: usize> GlobalArena<N> {
    /// Create a global arena with the default config.
    pub const fn new() -> Self {
        Self::with_config(ArenaConfig::new())
    }

    /// Create a global arena with the given config.
    pub const fn with_config(config: ArenaConfig) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Arena::<N>::LAYOUT_OK;
        Self {
            storage: Storage::new(),
            state: Mutex::new(ChainState::new(config)),
        }
    }

    /// The config this arena was created with.
    pub fn config(&self) -> ArenaConfig {
        self.state.lock().config
    }

    fn with_allocator<R>(&self, f: impl FnOnce(&mut Allocator<'_, '_, N>) -> R) -> R {
        let mut state = self.state.lock();
        // SAFETY: the lock is held until `f` returns, so this is the only
        // window onto the chain and the free blocks. The allocator writes
        // an allocated block only when its owner hands it back.
        let storage = unsafe { self.storage.view_mut_unchecked() };
        f(&mut Allocator::new(&mut *state, storage))
    }

    /// Run `f` over the block chain, holding the lock throughout.
    ///
    /// Allocating from inside `f` through this same `GlobalArena`
    /// deadlocks.
    pub fn with_blocks<R>(&self, f: impl FnOnce(Blocks<'_, N>) -> R) -> R {
        let state = self.state.lock();
        f(Blocks::new(self.storage.view(), state.initialized))
    }

    /// Allocate at least `size` bytes. Null on failure or when `size` is 0.
    pub fn allocate(&self, size: usize) -> *mut u8 {
        self.with_allocator(|alloc| match alloc.allocate(size) {
            Ok(handle) => alloc.ptr_of(handle).as_ptr(),
            Err(_) => ptr::null_mut(),
        })
    }

    /// Allocate `count * element_size` zeroed bytes. Null on overflow or
    /// when no block is large enough.
    pub fn zero_allocate(&self, count: usize, element_size: usize) -> *mut u8 {
        self.with_allocator(|alloc| match alloc.zero_allocate(count, element_size) {
            Ok(handle) => alloc.ptr_of(handle).as_ptr(),
            Err(_) => ptr::null_mut(),
        })
    }

    /// Return an allocation to the arena. Null is a no-op, as is any
    /// address outside the arena.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` inside the arena must have been returned by this
    /// arena's allocation functions and not released since. In
    /// [`GuardMode::Checked`](crate::GuardMode) violations are detected
    /// and ignored; otherwise they corrupt the arena or panic.
    pub unsafe fn release(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let Some(handle) = self.handle_of(ptr) else {
            warn!("ignoring release of {ptr:p}: not inside the arena");
            return;
        };
        self.with_allocator(|alloc| {
            if let Err(err) = alloc.release(Some(handle)) {
                // No error channel here; the rejection leaves the arena as it was.
                debug!("release of {ptr:p} dropped: {err}");
            }
        });
    }

    /// Resize an allocation, possibly moving it.
    ///
    /// Null `ptr` allocates; `new_size == 0` releases and returns null. On
    /// failure null is returned and the original allocation is unchanged.
    ///
    /// # Safety
    ///
    /// Same contract as [`GlobalArena::release`]. After a non-null return
    /// the old pointer must no longer be used.
    pub unsafe fn reallocate(&self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        let handle = if ptr.is_null() {
            None
        } else {
            match self.handle_of(ptr) {
                Some(handle) => Some(handle),
                None => {
                    warn!("refusing to reallocate {ptr:p}: not inside the arena");
                    return ptr::null_mut();
                }
            }
        };

        self.with_allocator(|alloc| match alloc.reallocate(handle, new_size) {
            Ok(Some(handle)) => alloc.ptr_of(handle).as_ptr(),
            Ok(None) | Err(_) => ptr::null_mut(),
        })
    }

    /// Handle for an address inside the arena's data region.
    pub fn handle_of(&self, ptr: *const u8) -> Option<BlockHandle> {
        self.storage
            .view()
            .offset_of(ptr)
            .filter(|&offset| offset >= DESCRIPTOR_SIZE)
            .map(BlockHandle::from_data_offset)
    }
}

impl<const N: usize> Default for GlobalArena<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for GlobalArena<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalArena")
            .field("capacity", &N)
            .finish_non_exhaustive()
    }
}

// SAFETY: every returned block is 8-aligned and at least `layout.size()`
// bytes, and layouts demanding more alignment are refused with null.
// Blocks never overlap while allocated, and the lock serialises all
// access to the chain.
unsafe impl<const N: usize> GlobalAlloc for GlobalArena<N> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGN {
            return ptr::null_mut();
        }
        self.allocate(layout.size())
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGN {
            return ptr::null_mut();
        }
        self.zero_allocate(1, layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        // SAFETY: `GlobalAlloc` callers only pass pointers from `alloc`.
        unsafe { self.release(ptr) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > ALIGN {
            return ptr::null_mut();
        }
        // SAFETY: `ptr` came from `alloc` with this layout.
        unsafe { self.reallocate(ptr, new_size) }
    }
}

static_assertions::assert_impl_all!(GlobalArena<64>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::BlockInfo;

    fn all_free<const N: usize>(heap: &GlobalArena<N>) -> bool {
        heap.with_blocks(|mut blocks| blocks.all(|b| b.is_free))
    }

    #[test]
    fn allocate_returns_aligned_pointers_into_the_arena() {
        static HEAP: GlobalArena<1024> = GlobalArena::new();
        let p = HEAP.allocate(13);
        assert!(!p.is_null());
        assert_eq!(p.addr() % ALIGN, 0);
        assert_eq!(HEAP.handle_of(p).map(|h| h.offset()), Some(DESCRIPTOR_SIZE));
    }

    #[test]
    fn earlier_pointers_stay_usable_across_calls() {
        static HEAP: GlobalArena<1024> = GlobalArena::new();
        let p = HEAP.allocate(8);
        unsafe { p.write(1) };

        let q = HEAP.allocate(8);
        unsafe {
            p.write(2);
            q.write(3);
        }
        let r = HEAP.zero_allocate(4, 4);
        unsafe { HEAP.release(q) };
        let r = unsafe { HEAP.reallocate(r, 64) };
        HEAP.with_blocks(|blocks| assert_eq!(blocks.count(), 4));

        unsafe {
            assert_eq!(p.read(), 2);
            p.add(7).write(0x77);
            assert_eq!(p.add(7).read(), 0x77);
            HEAP.release(r);
            HEAP.release(p);
        }
        assert!(all_free(&HEAP));
    }

    #[test]
    fn zero_size_and_exhaustion_yield_null() {
        let heap = GlobalArena::<128>::new();
        assert!(heap.allocate(0).is_null());
        assert!(heap.allocate(4096).is_null());
        assert!(heap.zero_allocate(usize::MAX, 2).is_null());
    }

    #[test]
    fn release_returns_memory() {
        let heap = GlobalArena::<256>::new();
        let p = heap.allocate(64);
        unsafe { heap.release(p) };
        heap.with_blocks(|blocks| assert_eq!(blocks.count(), 1));
        assert!(all_free(&heap));
        assert_eq!(heap.allocate(64), p);
    }

    #[test]
    fn release_ignores_null_and_foreign_pointers() {
        let heap = GlobalArena::<256>::new();
        let p = heap.allocate(16);
        let mut elsewhere = 0u8;
        unsafe {
            heap.release(ptr::null_mut());
            heap.release(&mut elsewhere);
        }
        let used = heap.with_blocks(|blocks| blocks.filter(|b| !b.is_free).count());
        assert_eq!(used, 1);
        unsafe { heap.release(p) };
    }

    #[test]
    fn reallocate_follows_null_and_zero_conventions() {
        let heap = GlobalArena::<256>::new();
        let p = unsafe { heap.reallocate(ptr::null_mut(), 24) };
        assert!(!p.is_null());
        assert!(unsafe { heap.reallocate(p, 0) }.is_null());
        assert!(all_free(&heap));

        let mut elsewhere = 0u8;
        assert!(unsafe { heap.reallocate(&mut elsewhere, 8) }.is_null());
    }

    #[test]
    fn reallocate_moves_contents() {
        let heap = GlobalArena::<512>::new();
        let p = heap.allocate(8);
        let _fence = heap.allocate(8);
        unsafe { p.copy_from_nonoverlapping(b"payload!".as_ptr(), 8) };

        let q = unsafe { heap.reallocate(p, 64) };
        assert!(!q.is_null());
        assert_ne!(p, q);
        let moved = unsafe { core::slice::from_raw_parts(q, 8) };
        assert_eq!(moved, b"payload!");
    }

    #[test]
    fn checked_global_arena_survives_double_release() {
        let heap = GlobalArena::<256>::with_config(ArenaConfig::checked());
        assert!(heap.config().is_checked());
        let p = heap.allocate(16);
        let _q = heap.allocate(16);
        unsafe { heap.release(p) };
        let before: Vec<BlockInfo> = heap.with_blocks(|blocks| blocks.collect());

        unsafe { heap.release(p) };
        let after: Vec<BlockInfo> = heap.with_blocks(|blocks| blocks.collect());
        assert_eq!(before, after);
        assert!(after[0].is_free && !after[1].is_free);
    }

    #[test]
    fn threads_share_one_arena() {
        const THREADS: usize = 4;
        const ROUNDS: usize = 200;
        let heap = GlobalArena::<8192>::new();

        std::thread::scope(|scope| {
            for t in 0..THREADS {
                let heap = &heap;
                scope.spawn(move || {
                    let pattern = 0x10 + t as u8;
                    for round in 0..ROUNDS {
                        let size = 8 + (round % 5) * 24;
                        let p = heap.allocate(size);
                        assert!(!p.is_null());
                        let block = unsafe { core::slice::from_raw_parts_mut(p, size) };
                        block.fill(pattern);
                        std::thread::yield_now();
                        assert!(block.iter().all(|&b| b == pattern));
                        unsafe { heap.release(p) };
                    }
                });
            }
        });

        heap.with_blocks(|blocks| assert_eq!(blocks.count(), 1));
        assert!(all_free(&heap));
    }

    #[test]
    fn global_alloc_refuses_over_aligned_layouts() {
        let heap = GlobalArena::<256>::new();
        let layout = Layout::from_size_align(16, 16).unwrap();
        unsafe {
            assert!(heap.alloc(layout).is_null());
            assert!(heap.alloc_zeroed(layout).is_null());
        }
    }

    #[test]
    fn global_alloc_round_trip() {
        let heap = GlobalArena::<256>::new();
        let layout = Layout::from_size_align(24, 8).unwrap();
        unsafe {
            let p = heap.alloc_zeroed(layout);
            assert!(!p.is_null());
            assert!(core::slice::from_raw_parts(p, 24).iter().all(|&b| b == 0));
            let q = heap.realloc(p, layout, 48);
            assert!(!q.is_null());
            heap.dealloc(q, Layout::from_size_align(48, 8).unwrap());
        }
        assert!(all_free(&heap));
    }
}
