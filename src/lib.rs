//! flatvol — a minimal file system inside a single fixed-size volume file
//!
//! The entire address space is one 256 MiB binary container. File-level
//! operations (create, rename, delete, list, read, write, import, export,
//! usage statistics) are backed by an on-disk layout of superblock,
//! free-space bitmap, per-file metadata table, and fixed-size 1 MiB data
//! blocks.
//!
//! ## Modules
//!
//! - [`error`] - Error types for volume operations
//! - [`superblock`] - Layout constants and the fixed 4 KiB header
//! - [`io`] - Bounds-checked raw access to the container file
//! - [`allocator`] - First-fit bitmap block allocator
//! - [`catalog`] - Flat tombstone-based metadata table
//! - [`volume`] - The storage engine orchestrator
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use flatvol::Volume;
//!
//! # fn main() -> flatvol::Result<()> {
//! let mut volume = Volume::open_or_create("demo.vol")?;
//!
//! volume.create_file("a.txt")?;
//! volume.write_file("a.txt", b"Hello, World!")?;
//! assert_eq!(volume.read_file("a.txt")?, b"Hello, World!");
//!
//! let stats = volume.stats();
//! println!("{} of {} blocks used", stats.used_blocks, stats.total_blocks);
//! # Ok(())
//! # }
//! ```
//!
//! ## On-disk layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            Volume File (256 MiB)            │
//! ├─────────────────────────────────────────────┤
//! │ Superblock (4 KiB at offset 0)              │
//! │  - Magic: "FVOL\x00\x01\x00\x00"            │
//! │  - Geometry, region offsets, free count     │
//! ├─────────────────────────────────────────────┤
//! │ Bitmap (25 bytes)                           │
//! │  - One bit per data block, 1 = allocated    │
//! ├─────────────────────────────────────────────┤
//! │ Metadata table (1024 x 512-byte slots)      │
//! │  - Name → size, ordered block list          │
//! ├─────────────────────────────────────────────┤
//! │ Data region (200 x 1 MiB blocks at 56 MiB)  │
//! │  - File contents, ≤16 blocks per file       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Single-threaded by design: one engine instance per volume file, each
//! operation fully validated, applied and persisted before the next begins.
//! There is no journaling; see [`volume::Volume::write_file`] for the exact
//! persistence ordering.

pub mod allocator;
pub mod catalog;
pub mod error;
pub mod io;
pub mod superblock;
pub mod volume;

// Re-export commonly used types
pub use allocator::BitmapAllocator;
pub use catalog::{FileEntry, FileTable};
pub use error::{Result, VolumeError};
pub use io::VolumeFile;
pub use superblock::{Superblock, BLOCK_SIZE, CAPACITY, MAX_FILE_SIZE, TOTAL_BLOCKS};
pub use volume::{Volume, VolumeStats};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Volume format magic number
pub const MAGIC: &[u8; 8] = &superblock::MAGIC;
