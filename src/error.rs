use thiserror::Error;

#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("Invalid magic number in superblock")]
    InvalidMagic,

    #[error("Unsupported format version: {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("Corrupt superblock: {0}")]
    CorruptSuperblock(String),

    #[error("Corrupt metadata entry at slot {0}")]
    CorruptEntry(usize),

    #[error("Access out of range: offset {offset} + {len} bytes exceeds volume capacity")]
    OutOfRange { offset: u64, len: u64 },

    #[error("Out of space: not enough free blocks available")]
    OutOfSpace,

    #[error("Invalid block index: {0}")]
    InvalidBlockIndex(u16),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("File name too long: {0} bytes")]
    NameTooLong(usize),

    #[error("File already exists: {0}")]
    DuplicateName(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Metadata table full: no free slot available")]
    TableFull,

    #[error("File too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VolumeError>;
