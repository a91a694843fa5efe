//! Owned arena buffer
//!
//! The arena is a single contiguous, zero-filled buffer allocated at
//! construction and released exactly once on drop. All raw pointer
//! arithmetic in the crate is confined to this module: block metadata is
//! addressed by arena offset everywhere else, and the accessors here
//! bounds-check every offset before touching memory.

use alloc::alloc::{alloc_zeroed, dealloc, Layout};
use core::ptr::NonNull;

use crate::{AllocError, AllocResult};

use super::block::{BlockHeader, HEADER_SIZE};

/// Contiguous memory region exclusively owned by the allocator.
#[derive(Debug)]
pub(crate) struct Arena {
    base: NonNull<u8>,
    size: usize,
    layout: Layout,
}

// The arena is exclusively owned; nothing aliases the buffer from outside.
unsafe impl Send for Arena {}

impl Arena {
    /// Allocate a zero-filled arena of `size` bytes.
    pub fn new(size: usize) -> AllocResult<Self> {
        debug_assert!(size.is_power_of_two());
        let layout = Layout::from_size_align(size, core::mem::align_of::<BlockHeader>())
            .map_err(|_| AllocError::InvalidParam)?;
        let ptr = unsafe { alloc_zeroed(layout) };
        let base = NonNull::new(ptr).ok_or(AllocError::NoMemory)?;
        Ok(Self { base, size, layout })
    }

    /// Header of the block starting at `offset`.
    pub fn header(&self, offset: usize) -> &BlockHeader {
        self.check_header_offset(offset);
        unsafe { &*self.base.as_ptr().add(offset).cast::<BlockHeader>() }
    }

    /// Mutable header of the block starting at `offset`.
    pub fn header_mut(&mut self, offset: usize) -> &mut BlockHeader {
        self.check_header_offset(offset);
        unsafe { &mut *self.base.as_ptr().add(offset).cast::<BlockHeader>() }
    }

    /// Pointer to the payload bytes just past the header of the block at
    /// `offset`.
    pub fn payload_ptr(&self, offset: usize) -> NonNull<u8> {
        self.check_header_offset(offset);
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset + HEADER_SIZE)) }
    }

    /// Arena offset of the block whose payload starts at `ptr`, if the
    /// pointer lies within the arena. The inverse of [`Arena::payload_ptr`].
    pub fn offset_of_payload(&self, ptr: NonNull<u8>) -> Option<usize> {
        let base = self.base.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        if addr < base + HEADER_SIZE || addr >= base + self.size {
            return None;
        }
        Some(addr - base - HEADER_SIZE)
    }

    /// Zero `len` bytes starting at `offset`.
    pub fn zero(&mut self, offset: usize, len: usize) {
        assert!(
            offset <= self.size && len <= self.size - offset,
            "zero range [{:#x}, {:#x}) outside arena of {:#x} bytes",
            offset,
            offset + len,
            self.size
        );
        unsafe { core::ptr::write_bytes(self.base.as_ptr().add(offset), 0, len) }
    }

    fn check_header_offset(&self, offset: usize) {
        assert!(
            offset <= self.size - HEADER_SIZE,
            "header offset {:#x} outside arena of {:#x} bytes",
            offset,
            self.size
        );
        debug_assert!(crate::is_aligned(
            offset,
            core::mem::align_of::<BlockHeader>()
        ));
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { dealloc(self.base.as_ptr(), self.layout) };
    }
}
