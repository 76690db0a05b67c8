//! On-disk layout constants and the volume superblock.
//!
//! The superblock occupies the first 4 KiB of the volume and records the
//! geometry of every region plus the mutable free-block count. All multi-byte
//! fields are little-endian.

use crate::error::{Result, VolumeError};
use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 8] = *b"FVOL\x00\x01\x00\x00";
pub const VERSION_MAJOR: u16 = 1;
pub const VERSION_MINOR: u16 = 0;

/// Total size of the volume file.
pub const CAPACITY: u64 = 256 * 1024 * 1024;
/// System region (superblock + bitmap + metadata table + reserved slack).
pub const SYSTEM_SIZE: u64 = 56 * 1024 * 1024;
/// Data region size.
pub const DATA_SIZE: u64 = CAPACITY - SYSTEM_SIZE;
/// Size of one data block.
pub const BLOCK_SIZE: usize = 1024 * 1024;
/// Number of data blocks in the data region.
pub const TOTAL_BLOCKS: usize = (DATA_SIZE / BLOCK_SIZE as u64) as usize;
/// Largest allowed logical file size.
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;
/// Largest block list a single file can hold.
pub const MAX_BLOCKS_PER_FILE: usize = (MAX_FILE_SIZE / BLOCK_SIZE as u64) as usize;
/// Longest allowed file name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

pub const SUPERBLOCK_SIZE: usize = 4096;
pub const BITMAP_OFFSET: u64 = SUPERBLOCK_SIZE as u64;
/// One bit per data block, rounded up to whole bytes.
pub const BITMAP_LEN: usize = (TOTAL_BLOCKS + 7) / 8;
pub const TABLE_OFFSET: u64 = BITMAP_OFFSET + BITMAP_LEN as u64;
/// Fixed size of one metadata slot.
pub const ENTRY_SIZE: usize = 512;
/// Number of metadata slots, and therefore the maximum file count.
pub const MAX_FILES: usize = 1024;
pub const TABLE_LEN: usize = ENTRY_SIZE * MAX_FILES;
/// The data region starts at the fixed system/data boundary.
pub const DATA_OFFSET: u64 = SYSTEM_SIZE;

/// Volume superblock (first 4 KiB of the container)
///
/// Everything except `free_blocks` is immutable after the volume is
/// initialized; `free_blocks` is rewritten after every allocation change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superblock {
    /// Magic number: "FVOL\x00\x01\x00\x00"
    pub magic: [u8; 8],

    /// Format version (major)
    pub version_major: u16,

    /// Format version (minor)
    pub version_minor: u16,

    /// Block size in bytes (always 1 MiB)
    pub block_size: u32,

    /// Total volume capacity in bytes
    pub capacity: u64,

    /// Number of data blocks in the data region
    pub total_blocks: u64,

    /// Number of free data blocks
    pub free_blocks: u64,

    /// Largest allowed file size in bytes
    pub max_file_size: u64,

    /// Longest allowed file name in bytes
    pub max_name_len: u32,

    /// Number of metadata slots
    pub max_files: u32,

    /// Free-space bitmap region
    pub bitmap_offset: u64,
    pub bitmap_len: u64,

    /// Metadata table region
    pub table_offset: u64,
    pub table_len: u64,

    /// Data region start
    pub data_offset: u64,
}

impl Superblock {
    /// Create the superblock describing a freshly initialized volume
    pub fn new() -> Self {
        Superblock {
            magic: MAGIC,
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            block_size: BLOCK_SIZE as u32,
            capacity: CAPACITY,
            total_blocks: TOTAL_BLOCKS as u64,
            free_blocks: TOTAL_BLOCKS as u64,
            max_file_size: MAX_FILE_SIZE,
            max_name_len: MAX_NAME_LEN as u32,
            max_files: MAX_FILES as u32,
            bitmap_offset: BITMAP_OFFSET,
            bitmap_len: BITMAP_LEN as u64,
            table_offset: TABLE_OFFSET,
            table_len: TABLE_LEN as u64,
            data_offset: DATA_OFFSET,
        }
    }

    /// Validate the header against the compiled-in layout
    ///
    /// A superblock that disagrees with the fixed geometry is fatal: the
    /// engine refuses to operate rather than guess where the regions live.
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(VolumeError::InvalidMagic);
        }

        if self.version_major != VERSION_MAJOR || self.version_minor != VERSION_MINOR {
            return Err(VolumeError::UnsupportedVersion {
                major: self.version_major,
                minor: self.version_minor,
            });
        }

        if self.block_size != BLOCK_SIZE as u32 {
            return Err(VolumeError::CorruptSuperblock(format!(
                "block size {} does not match expected {}",
                self.block_size, BLOCK_SIZE
            )));
        }

        if self.capacity != CAPACITY || self.total_blocks != TOTAL_BLOCKS as u64 {
            return Err(VolumeError::CorruptSuperblock(format!(
                "geometry mismatch: capacity {} / {} blocks",
                self.capacity, self.total_blocks
            )));
        }

        if self.bitmap_offset != BITMAP_OFFSET
            || self.bitmap_len != BITMAP_LEN as u64
            || self.table_offset != TABLE_OFFSET
            || self.table_len != TABLE_LEN as u64
            || self.data_offset != DATA_OFFSET
        {
            return Err(VolumeError::CorruptSuperblock(
                "region layout does not match expected offsets".to_string(),
            ));
        }

        if self.max_file_size != MAX_FILE_SIZE
            || self.max_name_len != MAX_NAME_LEN as u32
            || self.max_files != MAX_FILES as u32
        {
            return Err(VolumeError::CorruptSuperblock(
                "recorded limits do not match expected values".to_string(),
            ));
        }

        if self.free_blocks > self.total_blocks {
            return Err(VolumeError::CorruptSuperblock(format!(
                "free blocks ({}) exceeds total blocks ({})",
                self.free_blocks, self.total_blocks
            )));
        }

        Ok(())
    }

    /// Serialize to a full 4 KiB superblock region
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(SUPERBLOCK_SIZE);

        bytes.extend_from_slice(&self.magic);
        bytes.extend_from_slice(&self.version_major.to_le_bytes());
        bytes.extend_from_slice(&self.version_minor.to_le_bytes());
        bytes.extend_from_slice(&self.block_size.to_le_bytes());
        bytes.extend_from_slice(&self.capacity.to_le_bytes());
        bytes.extend_from_slice(&self.total_blocks.to_le_bytes());
        bytes.extend_from_slice(&self.free_blocks.to_le_bytes());
        bytes.extend_from_slice(&self.max_file_size.to_le_bytes());
        bytes.extend_from_slice(&self.max_name_len.to_le_bytes());
        bytes.extend_from_slice(&self.max_files.to_le_bytes());
        bytes.extend_from_slice(&self.bitmap_offset.to_le_bytes());
        bytes.extend_from_slice(&self.bitmap_len.to_le_bytes());
        bytes.extend_from_slice(&self.table_offset.to_le_bytes());
        bytes.extend_from_slice(&self.table_len.to_le_bytes());
        bytes.extend_from_slice(&self.data_offset.to_le_bytes());

        // Pad to SUPERBLOCK_SIZE
        bytes.resize(SUPERBLOCK_SIZE, 0);

        bytes
    }

    /// Deserialize and validate a superblock region
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 96 {
            return Err(VolumeError::CorruptSuperblock(format!(
                "insufficient bytes for superblock: {}",
                bytes.len()
            )));
        }

        let mut offset = 0;
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[offset..offset + 8]);
        offset += 8;

        let version_major = read_u16(bytes, &mut offset);
        let version_minor = read_u16(bytes, &mut offset);
        let block_size = read_u32(bytes, &mut offset);
        let capacity = read_u64(bytes, &mut offset);
        let total_blocks = read_u64(bytes, &mut offset);
        let free_blocks = read_u64(bytes, &mut offset);
        let max_file_size = read_u64(bytes, &mut offset);
        let max_name_len = read_u32(bytes, &mut offset);
        let max_files = read_u32(bytes, &mut offset);
        let bitmap_offset = read_u64(bytes, &mut offset);
        let bitmap_len = read_u64(bytes, &mut offset);
        let table_offset = read_u64(bytes, &mut offset);
        let table_len = read_u64(bytes, &mut offset);
        let data_offset = read_u64(bytes, &mut offset);

        let superblock = Superblock {
            magic,
            version_major,
            version_minor,
            block_size,
            capacity,
            total_blocks,
            free_blocks,
            max_file_size,
            max_name_len,
            max_files,
            bitmap_offset,
            bitmap_len,
            table_offset,
            table_len,
            data_offset,
        };

        superblock.validate()?;

        Ok(superblock)
    }
}

impl Default for Superblock {
    fn default() -> Self {
        Self::new()
    }
}

fn read_u16(bytes: &[u8], offset: &mut usize) -> u16 {
    let value = u16::from_le_bytes([bytes[*offset], bytes[*offset + 1]]);
    *offset += 2;
    value
}

fn read_u32(bytes: &[u8], offset: &mut usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[*offset..*offset + 4]);
    *offset += 4;
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], offset: &mut usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[*offset..*offset + 8]);
    *offset += 8;
    u64::from_le_bytes(buf)
}
