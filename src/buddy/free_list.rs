//! Per-size-class free lists threaded through block headers
//!
//! The lists are intrusive: the only storage besides the fixed head table is
//! the `next_free` field inside each free block's header, so the arena itself
//! carries all linkage. Traversals carry a visited-counter cycle guard; a
//! cyclic list means the bookkeeping is already corrupted and is fatal.

use alloc::vec;
use alloc::vec::Vec;

use super::arena::Arena;
use super::block::NO_BLOCK;

/// Head table for the per-size-class free lists.
///
/// Class `i` holds blocks of size `basic_block_size << i`. List order is
/// unspecified (insertion happens at the head); callers must not depend on
/// which free block of a class they are handed.
#[derive(Debug)]
pub(crate) struct FreeListTable {
    heads: Vec<usize>,
    lens: Vec<usize>,
}

impl FreeListTable {
    pub fn new(num_classes: usize) -> Self {
        Self {
            heads: vec![NO_BLOCK; num_classes],
            lens: vec![0; num_classes],
        }
    }

    pub fn num_classes(&self) -> usize {
        self.heads.len()
    }

    /// Number of blocks currently on the class list.
    pub fn len(&self, class: usize) -> usize {
        self.lens[class]
    }

    /// First block of the class list, if any.
    pub fn head(&self, class: usize) -> Option<usize> {
        let head = self.heads[class];
        (head != NO_BLOCK).then_some(head)
    }

    /// Number of times the block at `offset` occurs in the class list.
    ///
    /// A healthy list yields 0 or 1; anything more means a double insert
    /// already corrupted the linkage.
    pub fn occurrences(&self, arena: &Arena, class: usize, offset: usize) -> usize {
        let mut count = 0;
        let mut cursor = self.heads[class];
        let mut visited = 0;

        while cursor != NO_BLOCK {
            if visited > self.lens[class] {
                panic!("free list {} is cyclic", class);
            }
            if cursor == offset {
                count += 1;
            }
            cursor = arena.header(cursor).next_free;
            visited += 1;
        }

        count
    }

    pub fn contains(&self, arena: &Arena, class: usize, offset: usize) -> bool {
        self.occurrences(arena, class, offset) > 0
    }

    /// Link the block at `offset` at the head of its class list.
    ///
    /// Precondition (checked by the allocator when configured): the block is
    /// not already on the list.
    pub fn insert(&mut self, arena: &mut Arena, class: usize, offset: usize) {
        arena.header_mut(offset).next_free = self.heads[class];
        self.heads[class] = offset;
        self.lens[class] += 1;
    }

    /// Unlink the block at `offset` from wherever it sits in its class list,
    /// patching the predecessor (or the head) to skip it.
    ///
    /// Panics if the block is not on the list: the free lists and the block
    /// header disagree, which means earlier operations already corrupted the
    /// bookkeeping.
    pub fn remove(&mut self, arena: &mut Arena, class: usize, offset: usize) {
        if self.heads[class] == offset {
            self.heads[class] = arena.header(offset).next_free;
            arena.header_mut(offset).next_free = NO_BLOCK;
            self.lens[class] -= 1;
            return;
        }

        let mut cursor = self.heads[class];
        let mut visited = 0;

        while cursor != NO_BLOCK {
            if visited > self.lens[class] {
                panic!("free list {} is cyclic", class);
            }
            let next = arena.header(cursor).next_free;
            if next == offset {
                let after = arena.header(offset).next_free;
                arena.header_mut(cursor).next_free = after;
                arena.header_mut(offset).next_free = NO_BLOCK;
                self.lens[class] -= 1;
                return;
            }
            cursor = next;
            visited += 1;
        }

        panic!(
            "block {:#x} missing from free list {} during remove",
            offset, class
        );
    }

    /// Iterator over the block offsets of a class list.
    pub fn iter<'a>(&'a self, arena: &'a Arena, class: usize) -> FreeListIter<'a> {
        FreeListIter {
            arena,
            cursor: self.heads[class],
        }
    }
}

/// Iterator over one free list's block offsets.
pub(crate) struct FreeListIter<'a> {
    arena: &'a Arena,
    cursor: usize,
}

impl Iterator for FreeListIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NO_BLOCK {
            return None;
        }
        let offset = self.cursor;
        self.cursor = self.arena.header(offset).next_free;
        Some(offset)
    }
}
