//! Block header layout and buddy address arithmetic
//!
//! Every block in the arena, free or allocated, starts with a [`BlockHeader`]
//! written in place at its first bytes. Buddy computation is pure offset
//! arithmetic and never dereferences anything.

/// Block is currently handed out to a caller.
pub(crate) const FLAG_ALLOCATED: usize = 1 << 0;
/// Header is synchronized with the block's current size and state.
/// Cleared when a block is absorbed by a merge, so stale headers fail the
/// validity check instead of being mistaken for live blocks.
pub(crate) const FLAG_VALID: usize = 1 << 1;

/// Sentinel offset marking the end of a free list.
pub(crate) const NO_BLOCK: usize = usize::MAX;

/// Size in bytes of the header prefixed to every block.
///
/// The usable payload of a block of size `S` is `S - HEADER_SIZE` bytes, so
/// the largest request a freshly constructed allocator of `total` bytes can
/// satisfy is `total - HEADER_SIZE`.
pub const HEADER_SIZE: usize = core::mem::size_of::<BlockHeader>();

/// Header written in place at the starting address of every block.
///
/// `next_free` is an arena offset rather than a pointer; all translation to
/// real addresses happens in the arena module.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockHeader {
    /// Full size of the block in bytes (header + payload), a power of two.
    pub size: usize,
    /// `FLAG_ALLOCATED` and `FLAG_VALID` bits.
    pub flags: usize,
    /// Arena offset of the next free block in this block's size class, or
    /// `NO_BLOCK` when the block is unlinked. Meaningless while allocated.
    pub next_free: usize,
}

impl BlockHeader {
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.flags & FLAG_ALLOCATED != 0
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.flags & FLAG_VALID != 0
    }

    #[inline]
    pub fn set_allocated(&mut self, allocated: bool) {
        if allocated {
            self.flags |= FLAG_ALLOCATED;
        } else {
            self.flags &= !FLAG_ALLOCATED;
        }
    }
}

/// Offset of the buddy of the block at `offset` with the given size.
///
/// A block of size `2^n` whose offset is a multiple of its size has its buddy
/// at the offset with bit `n` flipped.
#[inline]
pub(crate) fn buddy_offset(offset: usize, size: usize) -> usize {
    debug_assert!(size.is_power_of_two());
    offset ^ size
}

/// Whether two same-size blocks at the given offsets are buddies.
///
/// Order-independent: the arguments are normalized so the lower offset is
/// checked against the buddy of the higher one.
#[inline]
pub(crate) fn are_buddies(a: usize, b: usize, size: usize) -> bool {
    let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
    lower != upper && upper == buddy_offset(lower, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_flags() {
        let mut header = BlockHeader {
            size: 128,
            flags: FLAG_VALID,
            next_free: NO_BLOCK,
        };
        assert!(header.is_valid());
        assert!(!header.is_allocated());

        header.set_allocated(true);
        assert!(header.is_allocated());
        assert!(header.is_valid());

        header.set_allocated(false);
        assert!(!header.is_allocated());
        assert!(header.is_valid());
    }

    #[test]
    fn test_buddy_offset() {
        assert_eq!(buddy_offset(0, 128), 128);
        assert_eq!(buddy_offset(128, 128), 0);
        assert_eq!(buddy_offset(512, 256), 768);
        assert_eq!(buddy_offset(768, 256), 512);
    }

    #[test]
    fn test_buddy_symmetry() {
        // buddy_of(buddy_of(b)) == b for all offsets and sizes
        for shift in 5..20 {
            let size = 1usize << shift;
            for i in 0..8 {
                let offset = i * size;
                assert_eq!(buddy_offset(buddy_offset(offset, size), size), offset);
                assert!(are_buddies(offset, buddy_offset(offset, size), size));
            }
        }
    }

    #[test]
    fn test_are_buddies_order_independent() {
        assert!(are_buddies(0, 128, 128));
        assert!(are_buddies(128, 0, 128));
        assert!(are_buddies(512, 768, 256));
        assert!(are_buddies(768, 512, 256));
    }

    #[test]
    fn test_not_buddies() {
        // Same parent alignment but wrong distance
        assert!(!are_buddies(0, 256, 128));
        // Adjacent but across a parent boundary: 128 and 256 are not buddies
        // at size 128 (256's buddy is 384)
        assert!(!are_buddies(128, 256, 128));
        // A block is not its own buddy
        assert!(!are_buddies(512, 512, 128));
    }

    #[test]
    fn test_header_size_fits_basic_blocks() {
        // Smallest power-of-two basic block size must hold a header
        assert!(HEADER_SIZE <= 32);
    }
}
