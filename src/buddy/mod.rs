//! Buddy allocator module
//!
//! This module provides a complete buddy system implementation with:
//! - A single exclusively owned arena holding all block metadata
//! - Intrusive free lists threaded through in-arena block headers
//! - Split/merge with strict, fail-fast invariant checks
//! - Snapshot-based statistics and debugging

pub mod allocator;
pub mod stats;

mod arena;
mod block;
mod free_list;

pub use allocator::{BuddyAllocator, BuddyConfig};
pub use block::HEADER_SIZE;
pub use stats::{BuddySnapshot, FreeClassCount};
