//! Fixed-arena buddy allocator
//!
//! Implements the split/merge state machine over the intrusive free lists:
//! allocation pops an exact-size block or cascades splits down from the
//! first larger donor, and free always attempts upward coalescing while the
//! buddy is intact, free, and the same size.

use core::ptr::NonNull;

use alloc::vec::Vec;

#[cfg(feature = "log")]
use log::{debug, error, info, trace, warn};

use crate::{AllocError, AllocResult};

use super::arena::Arena;
use super::block::{self, FLAG_VALID, HEADER_SIZE, NO_BLOCK};
use super::free_list::FreeListTable;
use super::stats::{BuddySnapshot, FreeClassCount};

/// Runtime toggles for the allocator's defensive behavior.
///
/// These replace compile-time sanity flags so both strict and lenient modes
/// can be exercised without recompilation.
#[derive(Debug, Clone, Copy)]
pub struct BuddyConfig {
    /// Zero block payloads as they are released and merged, so stale data
    /// never crosses a future allocation boundary.
    pub zero_on_free: bool,
    /// Verify free-list preconditions (no double insert, removal target
    /// present) before every insert and remove. Violations panic.
    pub verify_free_list: bool,
}

impl Default for BuddyConfig {
    fn default() -> Self {
        Self {
            zero_on_free: true,
            verify_free_list: true,
        }
    }
}

/// Buddy allocator over a single exclusively owned arena.
///
/// All block metadata lives inside the arena itself; the only bookkeeping
/// outside it is the fixed per-size-class free list head table. Operations
/// are single-threaded and synchronous. The allocator is `Send` but not
/// `Sync`; wrap it in external mutual exclusion to share it.
#[derive(Debug)]
pub struct BuddyAllocator {
    arena: Arena,
    free_lists: FreeListTable,
    basic_block_size: usize,
    total_size: usize,
    /// Bytes currently handed out, counted in full block sizes.
    allocated_bytes: usize,
    config: BuddyConfig,
}

impl BuddyAllocator {
    /// Create an allocator managing `total_size` bytes (rounded up to the
    /// next power of two) in blocks no smaller than `basic_block_size`.
    ///
    /// `basic_block_size` must be a power of two, at least [`HEADER_SIZE`],
    /// and no larger than the rounded total. Fails with
    /// [`AllocError::InvalidParam`] on a bad configuration and
    /// [`AllocError::NoMemory`] if the arena cannot be allocated.
    pub fn new(basic_block_size: usize, total_size: usize) -> AllocResult<Self> {
        Self::with_config(basic_block_size, total_size, BuddyConfig::default())
    }

    /// Like [`BuddyAllocator::new`] with explicit defensive-check toggles.
    pub fn with_config(
        basic_block_size: usize,
        total_size: usize,
        config: BuddyConfig,
    ) -> AllocResult<Self> {
        if !basic_block_size.is_power_of_two() || basic_block_size < HEADER_SIZE {
            error!(
                "buddy allocator: basic block size {} must be a power of two >= {}",
                basic_block_size, HEADER_SIZE
            );
            return Err(AllocError::InvalidParam);
        }
        if total_size == 0 {
            error!("buddy allocator: total size must be non-zero");
            return Err(AllocError::InvalidParam);
        }

        let total_size = total_size.next_power_of_two();
        if basic_block_size > total_size {
            error!(
                "buddy allocator: basic block size {} exceeds arena size {}",
                basic_block_size, total_size
            );
            return Err(AllocError::InvalidParam);
        }

        let mut arena = Arena::new(total_size)?;

        let num_classes = (total_size.trailing_zeros() - basic_block_size.trailing_zeros())
            as usize
            + 1;
        let mut free_lists = FreeListTable::new(num_classes);

        // Install the root block spanning the whole arena
        {
            let root = arena.header_mut(0);
            root.size = total_size;
            root.flags = FLAG_VALID;
            root.next_free = NO_BLOCK;
        }
        free_lists.insert(&mut arena, num_classes - 1, 0);

        debug!(
            "buddy allocator: arena of {} bytes, basic block {}, {} size classes",
            total_size, basic_block_size, num_classes
        );

        Ok(Self {
            arena,
            free_lists,
            basic_block_size,
            total_size,
            allocated_bytes: 0,
            config,
        })
    }

    /// Total arena size in bytes (after power-of-two rounding).
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Smallest allocatable block size in bytes.
    pub fn basic_block_size(&self) -> usize {
        self.basic_block_size
    }

    /// Bytes currently handed out, counted in full block sizes.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    /// Allocate at least `length` usable bytes.
    ///
    /// The backing block is `length` plus the header, rounded up to a power
    /// of two and clamped to the basic block size. Exhaustion is an ordinary
    /// outcome reported as [`AllocError::NoMemory`]; the pointer stays valid
    /// until the matching [`BuddyAllocator::free`].
    pub fn alloc(&mut self, length: usize) -> AllocResult<NonNull<u8>> {
        if length == 0 {
            return Err(AllocError::InvalidParam);
        }

        let real_size = length
            .checked_add(HEADER_SIZE)
            .and_then(usize::checked_next_power_of_two)
            .ok_or(AllocError::NoMemory)?
            .max(self.basic_block_size);

        if real_size > self.total_size {
            info!(
                "buddy allocator: request for {} bytes needs a {} byte block, arena is {} bytes",
                length, real_size, self.total_size
            );
            return Err(AllocError::NoMemory);
        }

        let class = self.class_for_size(real_size);

        // Fast path: an exact-size block is already free
        if let Some(head) = self.free_lists.head(class) {
            self.remove_free_block(class, head);
            return Ok(self.finish_alloc(head));
        }

        // Split-cascade path: find the first larger donor and halve it down
        for donor_class in (class + 1)..self.free_lists.num_classes() {
            let Some(donor) = self.free_lists.head(donor_class) else {
                continue;
            };

            let mut offset = donor;
            for _ in 0..(donor_class - class) {
                offset = self.split(offset);
            }

            self.remove_free_block(class, offset);
            return Ok(self.finish_alloc(offset));
        }

        info!(
            "buddy allocator: exhausted: {} of {} bytes allocated",
            self.allocated_bytes, self.total_size
        );
        Err(AllocError::NoMemory)
    }

    /// Release a block previously returned by [`BuddyAllocator::alloc`].
    ///
    /// Pointers outside the arena (or misaligned for any block start) are
    /// [`AllocError::InvalidParam`]; pointers to blocks that are not
    /// currently allocated, including double frees, are
    /// [`AllocError::NotAllocated`]. The freed block is coalesced upward
    /// with its buddy as far as possible.
    pub fn free(&mut self, ptr: NonNull<u8>) -> AllocResult {
        let Some(offset) = self.arena.offset_of_payload(ptr) else {
            warn!("buddy allocator: free of pointer outside the arena");
            return Err(AllocError::InvalidParam);
        };
        if !crate::is_aligned(offset, self.basic_block_size) {
            warn!(
                "buddy allocator: free of misaligned block offset {:#x}",
                offset
            );
            return Err(AllocError::InvalidParam);
        }

        let header = *self.arena.header(offset);
        if !header.is_valid() || !header.is_allocated() {
            warn!(
                "buddy allocator: free of block {:#x} that is not allocated",
                offset
            );
            return Err(AllocError::NotAllocated);
        }

        // The valid bit vouches for the size field; anything inconsistent
        // here means the header was overwritten while allocated.
        assert!(
            header.size.is_power_of_two()
                && header.size >= self.basic_block_size
                && header.size <= self.total_size
                && crate::is_aligned(offset, header.size),
            "corrupted header at {:#x}: size {} with valid bit set",
            offset,
            header.size
        );

        self.allocated_bytes -= header.size;
        self.arena.header_mut(offset).set_allocated(false);
        if self.config.zero_on_free {
            self.arena.zero(offset + HEADER_SIZE, header.size - HEADER_SIZE);
        }

        let class = self.class_for_size(header.size);
        self.insert_free_block(class, offset);

        // Coalesce upward while the buddy is intact, free, and the same size
        let mut current = offset;
        loop {
            let size = self.arena.header(current).size;
            if size == self.total_size {
                break;
            }

            let buddy = block::buddy_offset(current, size);
            let buddy_header = *self.arena.header(buddy);
            if !buddy_header.is_valid()
                || buddy_header.is_allocated()
                || buddy_header.size != size
            {
                break;
            }

            current = self.merge(current, buddy);
        }

        Ok(())
    }

    /// Point-in-time view of free block counts per size class and the byte
    /// accounting. Diagnostic only; does not mutate allocator state.
    pub fn debug_snapshot(&self) -> BuddySnapshot {
        let mut classes = Vec::with_capacity(self.free_lists.num_classes());
        let mut block_size = self.basic_block_size;
        for class in 0..self.free_lists.num_classes() {
            classes.push(FreeClassCount {
                block_size,
                free_blocks: self.free_lists.len(class),
            });
            block_size *= 2;
        }

        BuddySnapshot {
            total_bytes: self.total_size,
            allocated_bytes: self.allocated_bytes,
            classes,
        }
    }

    /// Walk every free list and panic if any listed header disagrees with
    /// its size class or is misaligned for its size.
    ///
    /// Diagnostic check for tests and debugging sessions; a failure means
    /// some earlier operation corrupted a header in place.
    pub fn verify_free_lists(&self) {
        let mut expected_size = self.basic_block_size;
        for class in 0..self.free_lists.num_classes() {
            for offset in self.free_lists.iter(&self.arena, class) {
                let header = self.arena.header(offset);
                assert!(
                    header.is_valid() && !header.is_allocated(),
                    "free list {} holds block {:#x} with flags {:#x}",
                    class,
                    offset,
                    header.flags
                );
                assert!(
                    header.size == expected_size,
                    "free list {} holds block {:#x} of size {} (expected {})",
                    class,
                    offset,
                    header.size,
                    expected_size
                );
                assert!(
                    crate::is_aligned(offset, header.size),
                    "free block {:#x} is misaligned for its size {}",
                    offset,
                    header.size
                );
            }
            expected_size *= 2;
        }
    }

    /// Free list index for a block size: `log2(size) - log2(basic)`.
    fn class_for_size(&self, size: usize) -> usize {
        assert!(
            size.is_power_of_two() && size >= self.basic_block_size,
            "size {} is not a managed block size",
            size
        );
        let class = (size.trailing_zeros() - self.basic_block_size.trailing_zeros()) as usize;
        assert!(
            class < self.free_lists.num_classes(),
            "size {} exceeds the largest size class",
            size
        );
        class
    }

    /// Halve a free block, producing two buddies one class down.
    ///
    /// Both halves end up on the smaller class's free list; the first
    /// (lower) half is returned. The caller removes it again if it intends
    /// to hand it out or split it further.
    fn split(&mut self, offset: usize) -> usize {
        let old_size = self.arena.header(offset).size;
        let old_class = self.class_for_size(old_size);
        assert!(
            old_class > 0,
            "cannot split a basic block at {:#x}",
            offset
        );
        assert!(
            !self.arena.header(offset).is_allocated(),
            "split of allocated block {:#x}",
            offset
        );

        self.remove_free_block(old_class, offset);

        let new_size = old_size / 2;
        {
            let first = self.arena.header_mut(offset);
            first.size = new_size;
            first.flags = FLAG_VALID;
            first.next_free = NO_BLOCK;
        }
        let second_offset = offset + new_size;
        {
            let second = self.arena.header_mut(second_offset);
            second.size = new_size;
            second.flags = FLAG_VALID;
            second.next_free = NO_BLOCK;
        }
        debug_assert!(block::are_buddies(offset, second_offset, new_size));

        let new_class = old_class - 1;
        self.insert_free_block(new_class, second_offset);
        self.insert_free_block(new_class, offset);

        trace!(
            "buddy allocator: split {:#x} into {:#x}/{:#x} of {} bytes",
            offset,
            offset,
            second_offset,
            new_size
        );

        offset
    }

    /// Coalesce two free buddies into one block one class up.
    ///
    /// Order-independent; the lower-offset block becomes the merge target
    /// and is returned, already on the larger class's free list. The
    /// absorbed header is wiped so a stale view of it can never pass the
    /// validity check again.
    fn merge(&mut self, block1: usize, block2: usize) -> usize {
        let (lower, upper) = if block1 <= block2 {
            (block1, block2)
        } else {
            (block2, block1)
        };

        let size = self.arena.header(lower).size;
        assert!(
            block::are_buddies(lower, upper, size),
            "merge of non-buddies {:#x} and {:#x} at size {}",
            lower,
            upper,
            size
        );
        assert!(
            self.arena.header(upper).size == size,
            "merge of blocks with mismatched sizes at {:#x}/{:#x}",
            lower,
            upper
        );

        let class = self.class_for_size(size);
        self.remove_free_block(class, upper);
        self.remove_free_block(class, lower);

        {
            let absorbed = self.arena.header_mut(upper);
            absorbed.size = 0;
            absorbed.flags = 0;
            absorbed.next_free = NO_BLOCK;
        }

        let merged_size = size * 2;
        {
            let merged = self.arena.header_mut(lower);
            merged.size = merged_size;
            merged.flags = FLAG_VALID;
            merged.next_free = NO_BLOCK;
        }

        if self.config.zero_on_free {
            self.arena
                .zero(lower + HEADER_SIZE, merged_size - HEADER_SIZE);
        }

        self.insert_free_block(class + 1, lower);

        trace!(
            "buddy allocator: merged {:#x}/{:#x} into {:#x} of {} bytes",
            lower,
            upper,
            lower,
            merged_size
        );

        lower
    }

    /// Mark a block (already off its free list) as allocated and return its
    /// payload pointer.
    fn finish_alloc(&mut self, offset: usize) -> NonNull<u8> {
        let size = {
            let header = self.arena.header_mut(offset);
            header.set_allocated(true);
            header.size
        };
        self.allocated_bytes += size;
        self.arena.payload_ptr(offset)
    }

    /// Insert with the double-insert precondition check when configured.
    fn insert_free_block(&mut self, class: usize, offset: usize) {
        if self.config.verify_free_list {
            let seen = self.free_lists.occurrences(&self.arena, class, offset);
            assert!(
                seen == 0,
                "block {:#x} already on free list {} ({} occurrences)",
                offset,
                class,
                seen
            );
        }
        self.free_lists.insert(&mut self.arena, class, offset);
    }

    /// Remove with the presence precondition check when configured.
    fn remove_free_block(&mut self, class: usize, offset: usize) {
        if self.config.verify_free_list {
            assert!(
                self.free_lists.contains(&self.arena, class, offset),
                "block {:#x} missing from free list {}",
                offset,
                class
            );
        }
        self.free_lists.remove(&mut self.arena, class, offset);
    }
}
