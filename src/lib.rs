//! Fixed-arena buddy memory allocator
//!
//! This crate implements a buddy allocator over a single contiguous,
//! power-of-two-sized arena, featuring:
//! - Per-size-class free lists threaded through block headers in the arena
//! - XOR-based buddy computation and recursive split/merge
//! - Automatic upward coalescing on free
//! - Runtime-configurable defensive checks and snapshot diagnostics

#![no_std]

extern crate alloc;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// The error type used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Invalid configuration or request. (e.g. basic block size not a power
    /// of two, freeing a pointer the allocator does not own)
    InvalidParam,
    /// No free block large enough to satisfy the request.
    NoMemory,
    /// Freeing a block that is not currently allocated (double free).
    NotAllocated,
}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

#[inline]
#[allow(dead_code)]
const fn align_down(pos: usize, align: usize) -> usize {
    pos & !(align - 1)
}

#[inline]
#[allow(dead_code)]
const fn align_up(pos: usize, align: usize) -> usize {
    (pos + align - 1) & !(align - 1)
}

/// Checks whether the address has the demanded alignment.
///
/// Equivalent to `addr % align == 0`, but the alignment must be a power of two.
#[inline]
const fn is_aligned(base_addr: usize, align: usize) -> bool {
    base_addr & (align - 1) == 0
}

pub mod buddy;
pub use buddy::allocator::{BuddyAllocator, BuddyConfig};
pub use buddy::stats::{BuddySnapshot, FreeClassCount};
pub use buddy::HEADER_SIZE;
