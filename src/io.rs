//! Raw container I/O for the volume file
//!
//! Every access goes through fixed offsets and is bounds-checked against the
//! volume capacity; no region interpretation happens here.

use crate::error::{Result, VolumeError};
use crate::superblock::CAPACITY;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Disk-backed volume container
///
/// Owns the invariant that the backing file is exactly [`CAPACITY`] bytes.
pub struct VolumeFile {
    file: File,
    path: std::path::PathBuf,
}

impl VolumeFile {
    /// Create a new volume file, zero-filled to exactly the volume capacity
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        file.set_len(CAPACITY)?;

        Ok(VolumeFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Open an existing volume file
    ///
    /// A backing file shorter than the capacity is zero-extended before any
    /// region is interpreted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        if file.metadata()?.len() < CAPACITY {
            tracing::warn!(path = %path.as_ref().display(), "volume file shorter than capacity, extending");
            file.set_len(CAPACITY)?;
        }

        Ok(VolumeFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Read `len` bytes starting at `offset`
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.check_range(offset, len as u64)?;

        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        self.file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    /// Write `data` starting at `offset`
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len() as u64)?;

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;

        Ok(())
    }

    fn check_range(&self, offset: u64, len: u64) -> Result<()> {
        let end = offset
            .checked_add(len)
            .ok_or(VolumeError::OutOfRange { offset, len })?;
        if end > CAPACITY {
            return Err(VolumeError::OutOfRange { offset, len });
        }
        Ok(())
    }

    /// Get the backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync all writes to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
