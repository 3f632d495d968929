//! The four allocation operations over a window onto the arena.
//!
//! [`Arena`](crate::Arena) and [`GlobalArena`](crate::GlobalArena) keep the
//! same bookkeeping ([`ChainState`]) and the same bytes, but reach the bytes
//! differently: the arena through its own `&mut`, the global arena through
//! a shared window opened under its lock. [`Allocator`] is the part they
//! share.

use core::ptr::NonNull;

use log::{debug, warn};

use crate::chain::{self, Blocks};
use crate::config::{ArenaConfig, GuardMode};
use crate::descriptor::{self, align_up, Descriptor, ALIGN, DESCRIPTOR_SIZE, MIN_BLOCK_DATA};
use crate::error::ArenaError;
use crate::handle::BlockHandle;
use crate::raw::ViewMut;

/// Allocator state kept outside the arena bytes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ChainState {
    pub(crate) config: ArenaConfig,
    pub(crate) initialized: bool,
}

impl ChainState {
    pub(crate) const fn new(config: ArenaConfig) -> Self {
        Self {
            config,
            initialized: false,
        }
    }
}

/// One exclusive session on an arena's chain.
pub(crate) struct Allocator<'s, 'a, const N: usize> {
    state: &'s mut ChainState,
    storage: ViewMut<'a, N>,
}

impl<'s, 'a, const N: usize> Allocator<'s, 'a, N> {
    pub(crate) fn new(state: &'s mut ChainState, storage: ViewMut<'a, N>) -> Self {
        Self { state, storage }
    }

    fn ensure_initialized(&mut self) {
        if !self.state.initialized {
            chain::init(&mut self.storage);
            self.state.initialized = true;
        }
    }

    pub(crate) fn allocate(&mut self, size: usize) -> Result<BlockHandle, ArenaError> {
        if size == 0 {
            return Err(ArenaError::EmptyRequest);
        }
        self.ensure_initialized();

        let Some(size) = align_up(size) else {
            return Err(self.out_of_memory(size));
        };
        let at = match chain::first_fit(self.storage.view(), size) {
            Ok(at) => at,
            Err(largest_free) => {
                debug!("allocation of {size} bytes failed: largest free block is {largest_free}");
                return Err(ArenaError::OutOfMemory {
                    requested: size,
                    largest_free,
                });
            }
        };

        chain::split(&mut self.storage, at, size);
        chain::set_free(&mut self.storage, at, false);
        Ok(BlockHandle::from_descriptor(at))
    }

    pub(crate) fn zero_allocate(
        &mut self,
        count: usize,
        element_size: usize,
    ) -> Result<BlockHandle, ArenaError> {
        let Some(total) = count.checked_mul(element_size) else {
            debug!("zero allocation of {count} x {element_size} bytes overflows");
            return Err(ArenaError::SizeOverflow {
                count,
                element_size,
            });
        };

        let handle = self.allocate(total.max(MIN_BLOCK_DATA))?;
        let size = self.block_size(handle);
        self.storage.fill(handle.offset(), size, 0);
        Ok(handle)
    }

    pub(crate) fn release(&mut self, handle: Option<BlockHandle>) -> Result<(), ArenaError> {
        let Some(handle) = handle else {
            return Ok(());
        };
        let at = self.resolve(handle)?;
        chain::set_free(&mut self.storage, at, true);
        chain::coalesce(&mut self.storage);
        Ok(())
    }

    pub(crate) fn reallocate(
        &mut self,
        handle: Option<BlockHandle>,
        new_size: usize,
    ) -> Result<Option<BlockHandle>, ArenaError> {
        let Some(handle) = handle else {
            return self.allocate(new_size).map(Some);
        };
        if new_size == 0 {
            self.release(Some(handle))?;
            return Ok(None);
        }

        let at = self.resolve(handle)?;
        let Some(size) = align_up(new_size) else {
            return Err(self.out_of_memory(new_size));
        };

        let current = Descriptor::load(self.storage.view(), at);
        if current.size >= size || chain::grow_into_next(&mut self.storage, at, size) {
            chain::split(&mut self.storage, at, size);
            return Ok(Some(handle));
        }

        let moved = self.allocate(size)?;
        self.storage
            .copy_block(handle.offset(), moved.offset(), current.size.min(size));
        chain::set_free(&mut self.storage, at, true);
        chain::coalesce(&mut self.storage);
        Ok(Some(moved))
    }

    pub(crate) fn block_size(&self, handle: BlockHandle) -> usize {
        Descriptor::load(self.storage.view(), handle.descriptor_offset()).size
    }

    /// Address of the block's data area.
    pub(crate) fn ptr_of(&self, handle: BlockHandle) -> NonNull<u8> {
        self.storage.ptr_at(handle.offset())
    }

    /// Descriptor offset for `handle`, validated in checked mode.
    fn resolve(&self, handle: BlockHandle) -> Result<usize, ArenaError> {
        match self.state.config.guard {
            GuardMode::Unchecked => Ok(handle.descriptor_offset()),
            GuardMode::Checked => self.validate(handle),
        }
    }

    fn validate(&self, handle: BlockHandle) -> Result<usize, ArenaError> {
        let offset = handle.offset();
        let in_range = offset >= DESCRIPTOR_SIZE && offset < N && offset % ALIGN == 0;
        if !self.state.initialized || !in_range {
            warn!("rejected handle at offset {offset}: not inside the chain");
            return Err(ArenaError::InvalidBlock { offset });
        }

        let at = offset - DESCRIPTOR_SIZE;
        if descriptor::load_guard(self.storage.view(), at) != descriptor::guard_for(at) {
            warn!("rejected handle at offset {offset}: guard word mismatch");
            return Err(ArenaError::InvalidBlock { offset });
        }
        if Descriptor::load(self.storage.view(), at).is_free {
            warn!("rejected handle at offset {offset}: block already free");
            return Err(ArenaError::DoubleRelease { offset });
        }
        Ok(at)
    }

    fn out_of_memory(&self, requested: usize) -> ArenaError {
        let largest_free = Blocks::new(self.storage.view(), self.state.initialized)
            .filter(|block| block.is_free)
            .map(|block| block.size)
            .max()
            .unwrap_or(0);
        debug!("allocation of {requested} bytes cannot be aligned");
        ArenaError::OutOfMemory {
            requested,
            largest_free,
        }
    }
}
