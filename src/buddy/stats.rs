//! Statistics and debugging for the buddy allocator
//!
//! Snapshots report free block counts per size class plus the byte
//! accounting, as data rather than as printed output, so tests and callers
//! can inspect allocator state without side effects.

use alloc::vec::Vec;

#[cfg(feature = "log")]
use log::info;

/// Free block count for one size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeClassCount {
    /// Block size in bytes for this class (header + payload).
    pub block_size: usize,
    /// Number of free blocks currently on this class's list.
    pub free_blocks: usize,
}

/// Point-in-time view of the allocator's free lists and accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuddySnapshot {
    /// Arena size in bytes.
    pub total_bytes: usize,
    /// Bytes currently handed out, counted in full block sizes.
    pub allocated_bytes: usize,
    /// One entry per size class, smallest first.
    pub classes: Vec<FreeClassCount>,
}

impl BuddySnapshot {
    /// Number of free blocks of exactly `block_size` bytes.
    pub fn free_blocks_of(&self, block_size: usize) -> usize {
        self.classes
            .iter()
            .find(|class| class.block_size == block_size)
            .map_or(0, |class| class.free_blocks)
    }

    /// Total bytes sitting on free lists.
    pub fn free_bytes(&self) -> usize {
        self.classes
            .iter()
            .map(|class| class.block_size * class.free_blocks)
            .sum()
    }

    /// Log the per-class free block table and the allocation totals.
    pub fn log(&self) {
        info!("Block Size\tFree Blocks");
        for _class in &self.classes {
            info!("{:>10}\t{}", _class.block_size, _class.free_blocks);
        }
        info!(
            "Total memory allocated: {} of {} bytes",
            self.allocated_bytes, self.total_bytes
        );
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    fn sample_snapshot() -> BuddySnapshot {
        BuddySnapshot {
            total_bytes: 1024,
            allocated_bytes: 128,
            classes: vec![
                FreeClassCount {
                    block_size: 128,
                    free_blocks: 1,
                },
                FreeClassCount {
                    block_size: 256,
                    free_blocks: 1,
                },
                FreeClassCount {
                    block_size: 512,
                    free_blocks: 1,
                },
                FreeClassCount {
                    block_size: 1024,
                    free_blocks: 0,
                },
            ],
        }
    }

    #[test]
    fn test_free_blocks_of() {
        let snapshot = sample_snapshot();
        assert_eq!(snapshot.free_blocks_of(128), 1);
        assert_eq!(snapshot.free_blocks_of(1024), 0);
        // Unknown class sizes report zero rather than panicking
        assert_eq!(snapshot.free_blocks_of(64), 0);
    }

    #[test]
    fn test_free_bytes_accounts_for_the_arena() {
        let snapshot = sample_snapshot();
        assert_eq!(snapshot.free_bytes(), 128 + 256 + 512);
        assert_eq!(snapshot.free_bytes() + snapshot.allocated_bytes, 1024);
    }
}
