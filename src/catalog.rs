//! Flat-namespace metadata table
//!
//! One fixed-size 512-byte slot per file. A slot is tombstoned on delete (the
//! in-use flag is cleared) and reused by the next insert, mirroring the fixed
//! on-disk table capacity.
//!
//! Slot encoding (little-endian):
//!
//! ```text
//! offset 0    in_use (u8, 0 or 1)
//! offset 1    name_len (u8)
//! offset 2    name bytes, zero-padded to 255
//! offset 257  size (u64)
//! offset 265  created_at (u64, Unix seconds)
//! offset 273  modified_at (u64, Unix seconds)
//! offset 281  block_count (u16)
//! offset 283  block indices (16 x u16)
//! offset 315  zero padding to 512
//! ```

use crate::error::{Result, VolumeError};
use crate::superblock::{ENTRY_SIZE, MAX_BLOCKS_PER_FILE, MAX_FILES, MAX_NAME_LEN, TOTAL_BLOCKS};
use serde::{Deserialize, Serialize};

/// Metadata for one live file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name, unique among in-use entries
    pub name: String,

    /// Logical size in bytes
    pub size: u64,

    /// Ordered data-block indices; length is always `ceil(size / BLOCK_SIZE)`
    pub blocks: Vec<u16>,

    /// Creation timestamp (Unix epoch seconds)
    pub created_at: u64,

    /// Last modified timestamp (Unix epoch seconds)
    pub modified_at: u64,
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl FileEntry {
    /// Create an empty entry (size 0, no blocks)
    pub fn new(name: impl Into<String>) -> Self {
        let now = unix_now();
        FileEntry {
            name: name.into(),
            size: 0,
            blocks: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Update the modification timestamp
    pub fn touch(&mut self) {
        self.modified_at = unix_now();
    }

    /// Serialize into a fixed-size table slot
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENTRY_SIZE);

        let name_bytes = self.name.as_bytes();
        bytes.push(1); // in_use
        bytes.push(name_bytes.len() as u8);
        bytes.extend_from_slice(name_bytes);
        bytes.resize(2 + MAX_NAME_LEN, 0);

        bytes.extend_from_slice(&self.size.to_le_bytes());
        bytes.extend_from_slice(&self.created_at.to_le_bytes());
        bytes.extend_from_slice(&self.modified_at.to_le_bytes());
        bytes.extend_from_slice(&(self.blocks.len() as u16).to_le_bytes());
        for i in 0..MAX_BLOCKS_PER_FILE {
            let index = self.blocks.get(i).copied().unwrap_or(0);
            bytes.extend_from_slice(&index.to_le_bytes());
        }

        bytes.resize(ENTRY_SIZE, 0);
        bytes
    }

    /// Deserialize a table slot; `None` for a free or tombstoned slot
    pub fn decode(bytes: &[u8], slot: usize) -> Result<Option<Self>> {
        if bytes.len() < ENTRY_SIZE {
            return Err(VolumeError::CorruptEntry(slot));
        }

        if bytes[0] == 0 {
            return Ok(None);
        }

        let name_len = bytes[1] as usize;
        if name_len == 0 || name_len > MAX_NAME_LEN {
            return Err(VolumeError::CorruptEntry(slot));
        }
        let name = String::from_utf8(bytes[2..2 + name_len].to_vec())
            .map_err(|_| VolumeError::CorruptEntry(slot))?;

        let mut offset = 2 + MAX_NAME_LEN;
        let size = read_u64(bytes, &mut offset);
        let created_at = read_u64(bytes, &mut offset);
        let modified_at = read_u64(bytes, &mut offset);
        let block_count = read_u16(bytes, &mut offset) as usize;
        if block_count > MAX_BLOCKS_PER_FILE {
            return Err(VolumeError::CorruptEntry(slot));
        }

        let mut blocks = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            let index = read_u16(bytes, &mut offset);
            if index as usize >= TOTAL_BLOCKS {
                return Err(VolumeError::CorruptEntry(slot));
            }
            blocks.push(index);
        }

        Ok(Some(FileEntry {
            name,
            size,
            blocks,
            created_at,
            modified_at,
        }))
    }
}

fn read_u16(bytes: &[u8], offset: &mut usize) -> u16 {
    let value = u16::from_le_bytes([bytes[*offset], bytes[*offset + 1]]);
    *offset += 2;
    value
}

fn read_u64(bytes: &[u8], offset: &mut usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[*offset..*offset + 8]);
    *offset += 8;
    u64::from_le_bytes(buf)
}

/// Validate a candidate file name
///
/// A name is valid iff its byte length is in `[1, 255]` and it contains no
/// path separator or NUL. The namespace is flat, so separators are reserved.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VolumeError::InvalidName("name is empty".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(VolumeError::NameTooLong(name.len()));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(VolumeError::InvalidName(format!(
            "'{}' contains a reserved character",
            name
        )));
    }
    Ok(())
}

/// In-memory image of the metadata table region
#[derive(Debug, Clone)]
pub struct FileTable {
    slots: Vec<Option<FileEntry>>,
}

impl FileTable {
    /// Create an empty table
    pub fn new() -> Self {
        FileTable {
            slots: vec![None; MAX_FILES],
        }
    }

    /// Rebuild the table from the on-disk region
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut slots = Vec::with_capacity(MAX_FILES);
        for slot in 0..MAX_FILES {
            let chunk = &bytes[slot * ENTRY_SIZE..(slot + 1) * ENTRY_SIZE];
            slots.push(FileEntry::decode(chunk, slot)?);
        }
        Ok(FileTable { slots })
    }

    /// Serialize one slot for persisting
    pub fn encode_slot(&self, slot: usize) -> Vec<u8> {
        match &self.slots[slot] {
            Some(entry) => entry.encode(),
            None => vec![0u8; ENTRY_SIZE],
        }
    }

    /// Find an in-use entry by exact name
    pub fn find(&self, name: &str) -> Option<(usize, &FileEntry)> {
        self.slots
            .iter()
            .enumerate()
            .find_map(|(slot, entry)| match entry {
                Some(e) if e.name == name => Some((slot, e)),
                _ => None,
            })
    }

    /// Get a mutable reference to an entry by slot index
    pub fn entry_mut(&mut self, slot: usize) -> Option<&mut FileEntry> {
        self.slots.get_mut(slot).and_then(|e| e.as_mut())
    }

    /// Reserve a slot for a new empty file
    pub fn insert(&mut self, name: &str) -> Result<usize> {
        validate_name(name)?;

        if self.find(name).is_some() {
            return Err(VolumeError::DuplicateName(name.to_string()));
        }

        let slot = self
            .slots
            .iter()
            .position(|e| e.is_none())
            .ok_or(VolumeError::TableFull)?;

        self.slots[slot] = Some(FileEntry::new(name));
        Ok(slot)
    }

    /// Rename an entry in place; returns the mutated slot
    pub fn rename(&mut self, old: &str, new: &str) -> Result<usize> {
        validate_name(new)?;

        if self.find(new).is_some() {
            return Err(VolumeError::DuplicateName(new.to_string()));
        }

        let (slot, _) = self
            .find(old)
            .ok_or_else(|| VolumeError::NotFound(old.to_string()))?;

        // find() only returns in-use slots
        let entry = self.slots[slot].as_mut().unwrap();
        entry.name = new.to_string();
        entry.touch();
        Ok(slot)
    }

    /// Tombstone an entry; returns its slot and contents so the caller can
    /// free the block list
    pub fn remove(&mut self, name: &str) -> Result<(usize, FileEntry)> {
        let (slot, _) = self
            .find(name)
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))?;

        // find() only returns in-use slots
        let entry = self.slots[slot].take().unwrap();
        Ok((slot, entry))
    }

    /// All in-use entries in slot order
    pub fn list(&self) -> impl Iterator<Item = &FileEntry> {
        self.slots.iter().filter_map(|e| e.as_ref())
    }

    /// Number of in-use entries
    pub fn file_count(&self) -> usize {
        self.slots.iter().filter(|e| e.is_some()).count()
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_encode_decode() {
        let mut entry = FileEntry::new("test.txt");
        entry.size = 3 * 1024 * 1024;
        entry.blocks = vec![7, 9, 11];

        let bytes = entry.encode();
        assert_eq!(bytes.len(), ENTRY_SIZE);

        let decoded = FileEntry::decode(&bytes, 0).unwrap().unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_decode_free_slot() {
        let bytes = vec![0u8; ENTRY_SIZE];
        assert!(FileEntry::decode(&bytes, 0).unwrap().is_none());
    }

    #[test]
    fn test_decode_corrupt_block_count() {
        let mut entry = FileEntry::new("x");
        entry.blocks = vec![0];
        let mut bytes = entry.encode();
        // block_count beyond the per-file limit
        bytes[281..283].copy_from_slice(&100u16.to_le_bytes());

        assert!(matches!(
            FileEntry::decode(&bytes, 3),
            Err(VolumeError::CorruptEntry(3))
        ));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("a.txt").is_ok());
        assert!(validate_name(&"x".repeat(255)).is_ok());

        assert!(matches!(
            validate_name(""),
            Err(VolumeError::InvalidName(_))
        ));
        assert!(matches!(
            validate_name(&"x".repeat(256)),
            Err(VolumeError::NameTooLong(256))
        ));
        assert!(matches!(
            validate_name("dir/file"),
            Err(VolumeError::InvalidName(_))
        ));
    }

    #[test]
    fn test_insert_and_find() {
        let mut table = FileTable::new();

        let slot = table.insert("a.txt").unwrap();
        assert_eq!(slot, 0);

        let (found_slot, entry) = table.find("a.txt").unwrap();
        assert_eq!(found_slot, 0);
        assert_eq!(entry.size, 0);
        assert!(entry.blocks.is_empty());
    }

    #[test]
    fn test_duplicate_insert() {
        let mut table = FileTable::new();

        table.insert("x").unwrap();
        let result = table.insert("x");
        assert!(matches!(result, Err(VolumeError::DuplicateName(_))));
        assert_eq!(table.file_count(), 1);
    }

    #[test]
    fn test_slot_reuse_after_remove() {
        let mut table = FileTable::new();

        table.insert("a").unwrap();
        table.insert("b").unwrap();
        table.remove("a").unwrap();

        // The tombstoned slot is reused first
        let slot = table.insert("c").unwrap();
        assert_eq!(slot, 0);
        assert_eq!(table.file_count(), 2);
    }

    #[test]
    fn test_rename() {
        let mut table = FileTable::new();

        table.insert("old.txt").unwrap();
        table.rename("old.txt", "new.txt").unwrap();

        assert!(table.find("old.txt").is_none());
        assert!(table.find("new.txt").is_some());
    }

    #[test]
    fn test_rename_to_existing_name() {
        let mut table = FileTable::new();

        table.insert("a").unwrap();
        table.insert("b").unwrap();

        let result = table.rename("a", "b");
        assert!(matches!(result, Err(VolumeError::DuplicateName(_))));
        // Both entries unchanged
        assert!(table.find("a").is_some());
        assert!(table.find("b").is_some());
    }

    #[test]
    fn test_rename_missing() {
        let mut table = FileTable::new();
        let result = table.rename("ghost", "new");
        assert!(matches!(result, Err(VolumeError::NotFound(_))));
    }

    #[test]
    fn test_remove_missing() {
        let mut table = FileTable::new();
        let result = table.remove("ghost");
        assert!(matches!(result, Err(VolumeError::NotFound(_))));
    }

    #[test]
    fn test_table_full() {
        let mut table = FileTable::new();
        for i in 0..MAX_FILES {
            table.insert(&format!("file{}", i)).unwrap();
        }

        let result = table.insert("one-too-many");
        assert!(matches!(result, Err(VolumeError::TableFull)));
    }

    #[test]
    fn test_table_bytes_round_trip() {
        let mut table = FileTable::new();
        table.insert("a").unwrap();
        let slot = table.insert("b").unwrap();
        table.entry_mut(slot).unwrap().blocks = vec![3, 4];
        table.entry_mut(slot).unwrap().size = 2 * 1024 * 1024;
        table.remove("a").unwrap();

        let mut region = Vec::new();
        for slot in 0..MAX_FILES {
            region.extend_from_slice(&table.encode_slot(slot));
        }

        let rebuilt = FileTable::from_bytes(&region).unwrap();
        assert!(rebuilt.find("a").is_none());
        let (_, entry) = rebuilt.find("b").unwrap();
        assert_eq!(entry.blocks, vec![3, 4]);
        assert_eq!(rebuilt.file_count(), 1);
    }
}
