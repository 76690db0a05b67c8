//! Free-space bitmap allocator
//!
//! One bit per data block: 0 = free, 1 = allocated. The in-memory bitmap is
//! byte-for-byte the on-disk bitmap region, bit `i % 8` of byte `i / 8`.
//! Allocation is first-fit over ascending block index, so block placement is
//! deterministic and testable by index sequence.

use crate::error::{Result, VolumeError};
use crate::superblock::BITMAP_LEN;

/// Bitmap allocator over the data region's blocks
#[derive(Debug, Clone)]
pub struct BitmapAllocator {
    bitmap: Vec<u8>,
    total_blocks: usize,
    free_blocks: usize,
}

impl BitmapAllocator {
    /// Create an allocator with all blocks free
    pub fn new(total_blocks: usize) -> Self {
        BitmapAllocator {
            bitmap: vec![0u8; (total_blocks + 7) / 8],
            total_blocks,
            free_blocks: total_blocks,
        }
    }

    /// Rebuild an allocator from the on-disk bitmap bytes
    pub fn from_bytes(bytes: &[u8], total_blocks: usize) -> Result<Self> {
        if bytes.len() != (total_blocks + 7) / 8 {
            return Err(VolumeError::CorruptSuperblock(format!(
                "bitmap region is {} bytes, expected {}",
                bytes.len(),
                BITMAP_LEN
            )));
        }

        let mut allocator = BitmapAllocator {
            bitmap: bytes.to_vec(),
            total_blocks,
            free_blocks: 0,
        };
        allocator.free_blocks = (0..total_blocks)
            .filter(|&i| !allocator.is_allocated(i as u16))
            .count();

        Ok(allocator)
    }

    /// The raw bitmap bytes, as persisted in the bitmap region
    pub fn as_bytes(&self) -> &[u8] {
        &self.bitmap
    }

    /// Allocate `n` blocks, first-fit over ascending block index
    ///
    /// Returns the chosen indices in ascending order. No bit is flipped
    /// unless the full request can be satisfied.
    pub fn allocate(&mut self, n: usize) -> Result<Vec<u16>> {
        if n > self.free_blocks {
            return Err(VolumeError::OutOfSpace);
        }

        let mut chosen = Vec::with_capacity(n);
        for index in 0..self.total_blocks as u16 {
            if chosen.len() == n {
                break;
            }
            if !self.is_allocated(index) {
                chosen.push(index);
            }
        }

        // free_blocks is kept exact, so the scan always finds enough bits
        debug_assert_eq!(chosen.len(), n);

        for &index in &chosen {
            self.set_bit(index, true);
        }
        self.free_blocks -= n;

        tracing::debug!(blocks = ?chosen, free = self.free_blocks, "allocated blocks");

        Ok(chosen)
    }

    /// Free previously allocated blocks
    ///
    /// Fails with `InvalidBlockIndex` if any index is out of range, already
    /// free, or repeated in the request; nothing is freed on failure.
    pub fn free(&mut self, blocks: &[u16]) -> Result<()> {
        for (i, &index) in blocks.iter().enumerate() {
            if index as usize >= self.total_blocks || !self.is_allocated(index) {
                return Err(VolumeError::InvalidBlockIndex(index));
            }
            if blocks[..i].contains(&index) {
                return Err(VolumeError::InvalidBlockIndex(index));
            }
        }

        for &index in blocks {
            self.set_bit(index, false);
        }
        self.free_blocks += blocks.len();

        tracing::debug!(blocks = ?blocks, free = self.free_blocks, "freed blocks");

        Ok(())
    }

    /// Check whether a block is currently allocated
    pub fn is_allocated(&self, index: u16) -> bool {
        if index as usize >= self.total_blocks {
            return false;
        }
        self.bitmap[index as usize / 8] & (1 << (index % 8)) != 0
    }

    fn set_bit(&mut self, index: u16, allocated: bool) {
        let byte = index as usize / 8;
        let bit = 1u8 << (index % 8);
        if allocated {
            self.bitmap[byte] |= bit;
        } else {
            self.bitmap[byte] &= !bit;
        }
    }

    /// Total number of blocks tracked
    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    /// Number of free blocks available
    pub fn free_blocks(&self) -> usize {
        self.free_blocks
    }
}
