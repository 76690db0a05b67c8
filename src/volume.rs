//! Main Volume API
//!
//! Composes the container file, superblock, block allocator and metadata
//! table into the public file operations. This is the only type the CLI
//! talks to.
//!
//! Every mutating operation validates first, then updates the in-memory
//! state, then persists the touched bitmap bytes, metadata slot and
//! superblock before any data block is written. There is no journaling: an
//! I/O failure during the data-block phase can leave that one file's content
//! inconsistent, but the space accounting stays correct.

use crate::allocator::BitmapAllocator;
use crate::catalog::{validate_name, FileEntry, FileTable};
use crate::error::{Result, VolumeError};
use crate::io::VolumeFile;
use crate::superblock::{
    Superblock, BITMAP_LEN, BITMAP_OFFSET, BLOCK_SIZE, CAPACITY, DATA_OFFSET, ENTRY_SIZE,
    MAX_FILE_SIZE, SUPERBLOCK_SIZE, TABLE_LEN, TABLE_OFFSET, TOTAL_BLOCKS,
};
use serde::Serialize;
use std::path::Path;

/// A mounted volume
///
/// Owns the open handle to the container for its whole lifetime; one engine
/// instance per volume file. Concurrent instances on the same file would race
/// on the bitmap and metadata regions and are undefined behavior.
pub struct Volume {
    file: VolumeFile,
    superblock: Superblock,
    allocator: BitmapAllocator,
    table: FileTable,
}

/// Usage statistics reported by `info`
#[derive(Debug, Clone, Serialize)]
pub struct VolumeStats {
    pub capacity: u64,
    pub block_size: u32,
    pub total_blocks: u64,
    pub used_blocks: u64,
    pub free_blocks: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub file_count: usize,
}

impl Volume {
    /// Initialize a fresh volume at `path`
    ///
    /// Zero-fills the container to capacity and writes an empty superblock,
    /// bitmap and metadata table.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = VolumeFile::create(&path)?;

        let mut volume = Volume {
            file,
            superblock: Superblock::new(),
            allocator: BitmapAllocator::new(TOTAL_BLOCKS),
            table: FileTable::new(),
        };

        // The container is zero-filled, so the bitmap and table regions are
        // already in their empty on-disk form; only the superblock is needed.
        volume.persist_superblock()?;
        volume.file.sync()?;

        tracing::info!(path = %path.as_ref().display(), "initialized volume");
        Ok(volume)
    }

    /// Open an existing volume
    ///
    /// A superblock that fails validation is fatal: the engine refuses to
    /// operate rather than guess the region layout.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = VolumeFile::open(&path)?;

        let superblock = Superblock::from_bytes(&file.read_at(0, SUPERBLOCK_SIZE)?)?;

        let bitmap_bytes = file.read_at(BITMAP_OFFSET, BITMAP_LEN)?;
        let allocator = BitmapAllocator::from_bytes(&bitmap_bytes, TOTAL_BLOCKS)?;

        if superblock.free_blocks != allocator.free_blocks() as u64 {
            return Err(VolumeError::CorruptSuperblock(format!(
                "free-block count {} disagrees with bitmap ({} clear bits)",
                superblock.free_blocks,
                allocator.free_blocks()
            )));
        }

        let table_bytes = file.read_at(TABLE_OFFSET, TABLE_LEN)?;
        let table = FileTable::from_bytes(&table_bytes)?;

        tracing::info!(
            path = %path.as_ref().display(),
            files = table.file_count(),
            free_blocks = allocator.free_blocks(),
            "opened volume"
        );

        Ok(Volume {
            file,
            superblock,
            allocator,
            table,
        })
    }

    /// Open `path`, initializing a fresh volume if none exists
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Create an empty file (size 0, no blocks)
    pub fn create_file(&mut self, name: &str) -> Result<()> {
        let slot = self.table.insert(name)?;
        self.persist_slot(slot)?;
        self.file.sync()?;

        tracing::debug!(name, slot, "created file");
        Ok(())
    }

    /// Delete a file and return its blocks to the free pool
    pub fn delete_file(&mut self, name: &str) -> Result<()> {
        let (_, entry) = self
            .table
            .find(name)
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))?;
        let blocks = entry.blocks.clone();

        self.allocator.free(&blocks)?;
        let (slot, _) = self.table.remove(name)?;
        self.superblock.free_blocks = self.allocator.free_blocks() as u64;

        self.persist_slot(slot)?;
        self.persist_bitmap()?;
        self.persist_superblock()?;
        self.file.sync()?;

        tracing::debug!(name, freed = blocks.len(), "deleted file");
        Ok(())
    }

    /// Rename a file in place; no data movement
    pub fn rename_file(&mut self, old: &str, new: &str) -> Result<()> {
        let slot = self.table.rename(old, new)?;
        self.persist_slot(slot)?;
        self.file.sync()?;

        tracing::debug!(old, new, "renamed file");
        Ok(())
    }

    /// Replace a file's content
    ///
    /// Grows or shrinks the block list by the delta: new blocks are appended
    /// in allocation order, trailing excess blocks are freed. All bitmap and
    /// metadata bookkeeping is persisted before the first data block write.
    pub fn write_file(&mut self, name: &str, content: &[u8]) -> Result<()> {
        if content.len() as u64 > MAX_FILE_SIZE {
            return Err(VolumeError::FileTooLarge {
                size: content.len() as u64,
                max: MAX_FILE_SIZE,
            });
        }

        let (slot, entry) = self
            .table
            .find(name)
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))?;
        let mut blocks = entry.blocks.clone();

        let needed = (content.len() + BLOCK_SIZE - 1) / BLOCK_SIZE;
        if needed > blocks.len() {
            let extra = self.allocator.allocate(needed - blocks.len())?;
            blocks.extend(extra);
        } else if needed < blocks.len() {
            let excess = blocks.split_off(needed);
            self.allocator.free(&excess)?;
        }

        // find() already proved the slot is in use
        let entry = self.table.entry_mut(slot).unwrap();
        entry.size = content.len() as u64;
        entry.blocks = blocks.clone();
        entry.touch();
        self.superblock.free_blocks = self.allocator.free_blocks() as u64;

        // Bookkeeping lands before any content does
        self.persist_bitmap()?;
        self.persist_slot(slot)?;
        self.persist_superblock()?;

        for (i, &index) in blocks.iter().enumerate() {
            let start = i * BLOCK_SIZE;
            let end = (start + BLOCK_SIZE).min(content.len());
            // The final partial block leaves prior bytes past `size` as
            // padding; they are never reinterpreted on read.
            self.file.write_at(block_offset(index), &content[start..end])?;
        }

        self.file.sync()?;

        tracing::debug!(name, size = content.len(), blocks = needed, "wrote file");
        Ok(())
    }

    /// Read a file's full content
    pub fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .table
            .find(name)
            .map(|(_, e)| e.clone())
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))?;

        let mut content = Vec::with_capacity(entry.size as usize);
        let mut remaining = entry.size as usize;
        for &index in &entry.blocks {
            let chunk = remaining.min(BLOCK_SIZE);
            content.extend_from_slice(&self.file.read_at(block_offset(index), chunk)?);
            remaining -= chunk;
        }

        Ok(content)
    }

    /// Import an external payload as a new file
    ///
    /// Equivalent to `create_file` followed by `write_file`; the size limit
    /// is checked up front so a too-large payload mutates nothing.
    pub fn import_file(&mut self, name: &str, content: &[u8]) -> Result<()> {
        if content.len() as u64 > MAX_FILE_SIZE {
            return Err(VolumeError::FileTooLarge {
                size: content.len() as u64,
                max: MAX_FILE_SIZE,
            });
        }
        validate_name(name)?;

        self.create_file(name)?;
        self.write_file(name, content)
    }

    /// Export a file's content for the caller to write outside the volume
    pub fn export_file(&mut self, name: &str) -> Result<Vec<u8>> {
        self.read_file(name)
    }

    /// All live files in slot order
    pub fn list(&self) -> Vec<&FileEntry> {
        self.table.list().collect()
    }

    /// Usage statistics; mutates nothing
    pub fn stats(&self) -> VolumeStats {
        let free = self.allocator.free_blocks() as u64;
        let used = self.superblock.total_blocks - free;
        VolumeStats {
            capacity: CAPACITY,
            block_size: self.superblock.block_size,
            total_blocks: self.superblock.total_blocks,
            used_blocks: used,
            free_blocks: free,
            used_bytes: used * BLOCK_SIZE as u64,
            free_bytes: free * BLOCK_SIZE as u64,
            file_count: self.table.file_count(),
        }
    }

    /// Get a reference to the superblock
    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    /// Flush and drop the open handle
    pub fn close(mut self) -> Result<()> {
        self.file.sync()
    }

    fn persist_superblock(&mut self) -> Result<()> {
        self.file.write_at(0, &self.superblock.to_bytes())
    }

    fn persist_bitmap(&mut self) -> Result<()> {
        self.file.write_at(BITMAP_OFFSET, self.allocator.as_bytes())
    }

    fn persist_slot(&mut self, slot: usize) -> Result<()> {
        let offset = TABLE_OFFSET + (slot * ENTRY_SIZE) as u64;
        self.file.write_at(offset, &self.table.encode_slot(slot))
    }
}

fn block_offset(index: u16) -> u64 {
    DATA_OFFSET + index as u64 * BLOCK_SIZE as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn fresh_volume() -> (NamedTempFile, Volume) {
        let temp = NamedTempFile::new().unwrap();
        let volume = Volume::create(temp.path()).unwrap();
        (temp, volume)
    }

    #[test]
    fn test_create_write_cat() {
        let (_temp, mut vol) = fresh_volume();

        vol.create_file("a.txt").unwrap();
        vol.write_file("a.txt", b"Hello, World!").unwrap();

        assert_eq!(vol.read_file("a.txt").unwrap(), b"Hello, World!");

        let stats = vol.stats();
        assert_eq!(stats.used_blocks, 1);
        assert_eq!(stats.free_blocks, 199);
        assert_eq!(stats.file_count, 1);
    }

    #[test]
    fn test_empty_file_uses_no_blocks() {
        let (_temp, mut vol) = fresh_volume();

        vol.create_file("empty").unwrap();
        assert_eq!(vol.read_file("empty").unwrap(), b"");
        assert_eq!(vol.stats().used_blocks, 0);
    }

    #[test]
    fn test_write_requires_existing_file() {
        let (_temp, mut vol) = fresh_volume();
        let result = vol.write_file("ghost", b"data");
        assert!(matches!(result, Err(VolumeError::NotFound(_))));
    }

    #[test]
    fn test_write_shrink_frees_trailing_blocks() {
        let (_temp, mut vol) = fresh_volume();

        vol.create_file("f").unwrap();
        vol.write_file("f", &vec![1u8; 3 * BLOCK_SIZE]).unwrap();
        assert_eq!(vol.stats().used_blocks, 3);

        vol.write_file("f", &vec![2u8; BLOCK_SIZE / 2]).unwrap();
        assert_eq!(vol.stats().used_blocks, 1);
        assert_eq!(vol.read_file("f").unwrap(), vec![2u8; BLOCK_SIZE / 2]);
    }

    #[test]
    fn test_write_grow_keeps_existing_blocks() {
        let (_temp, mut vol) = fresh_volume();

        vol.create_file("f").unwrap();
        vol.write_file("f", &vec![1u8; BLOCK_SIZE]).unwrap();
        let first = vol.list()[0].blocks.clone();
        assert_eq!(first, vec![0]);

        vol.write_file("f", &vec![2u8; 2 * BLOCK_SIZE + 7]).unwrap();
        let grown = vol.list()[0].blocks.clone();
        assert_eq!(grown[0], first[0]);
        assert_eq!(grown.len(), 3);
    }

    #[test]
    fn test_file_too_large_mutates_nothing() {
        let (_temp, mut vol) = fresh_volume();

        vol.create_file("big").unwrap();
        let free_before = vol.stats().free_blocks;

        let payload = vec![0u8; MAX_FILE_SIZE as usize + 1];
        let result = vol.write_file("big", &payload);
        assert!(matches!(result, Err(VolumeError::FileTooLarge { .. })));

        assert_eq!(vol.stats().free_blocks, free_before);
        assert_eq!(vol.read_file("big").unwrap(), b"");
    }

    #[test]
    fn test_delete_returns_blocks() {
        let (_temp, mut vol) = fresh_volume();

        vol.create_file("f").unwrap();
        vol.write_file("f", &vec![9u8; 2 * BLOCK_SIZE]).unwrap();
        assert_eq!(vol.stats().used_blocks, 2);

        vol.delete_file("f").unwrap();
        assert_eq!(vol.stats().used_blocks, 0);
        assert!(vol.list().is_empty());
        assert!(matches!(
            vol.read_file("f"),
            Err(VolumeError::NotFound(_))
        ));
    }

    #[test]
    fn test_import_and_export() {
        let (_temp, mut vol) = fresh_volume();

        vol.import_file("payload.bin", b"imported bytes").unwrap();
        assert_eq!(vol.export_file("payload.bin").unwrap(), b"imported bytes");

        // Importing over an existing name fails like create does
        let result = vol.import_file("payload.bin", b"again");
        assert!(matches!(result, Err(VolumeError::DuplicateName(_))));
    }

    #[test]
    fn test_import_too_large_creates_nothing() {
        let (_temp, mut vol) = fresh_volume();

        let payload = vec![0u8; MAX_FILE_SIZE as usize + 1];
        let result = vol.import_file("big", &payload);
        assert!(matches!(result, Err(VolumeError::FileTooLarge { .. })));
        assert!(vol.list().is_empty());
    }

    #[test]
    fn test_persistence_across_reopen() {
        let temp = NamedTempFile::new().unwrap();

        {
            let mut vol = Volume::create(temp.path()).unwrap();
            vol.create_file("keep.txt").unwrap();
            vol.write_file("keep.txt", b"survives reopen").unwrap();
            vol.close().unwrap();
        }

        let mut vol = Volume::open(temp.path()).unwrap();
        assert_eq!(vol.read_file("keep.txt").unwrap(), b"survives reopen");
        assert_eq!(vol.stats().used_blocks, 1);
        assert_eq!(vol.stats().file_count, 1);
    }

    #[test]
    fn test_open_rejects_garbage_superblock() {
        let temp = NamedTempFile::new().unwrap();
        {
            Volume::create(temp.path()).unwrap();
        }

        // Stomp the magic
        let mut raw = std::fs::OpenOptions::new()
            .write(true)
            .open(temp.path())
            .unwrap();
        use std::io::{Seek, SeekFrom, Write};
        raw.seek(SeekFrom::Start(0)).unwrap();
        raw.write_all(b"GARBAGE!").unwrap();
        drop(raw);

        assert!(matches!(
            Volume::open(temp.path()),
            Err(VolumeError::InvalidMagic)
        ));
    }
}
