use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use super::MemoryCore;

/// Memory regions a core may export, values match the core ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MemoryKind {
    SaveRam = 0,
    Rtc = 1,
    SystemRam = 2,
    VideoRam = 3,
}

impl MemoryKind {
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Core does not support this memory type")]
    NoSupport,
    #[error("File not found")]
    FileNotFound,
    #[error("File I/O error")]
    FileError(#[source] std::io::Error),
    #[error("Core returned null memory pointer")]
    NullPointer,
    #[error("File size does not match expected size")]
    SizeMismatch,
}

impl MemoryError {
    /// Whether this is an expected outcome (nothing saved yet, or nothing to save) rather than a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, MemoryError::NoSupport | MemoryError::FileNotFound)
    }
}

fn region<'a>(core: &'a mut impl MemoryCore, kind: MemoryKind, size: usize) -> Result<&'a mut [u8], MemoryError> {
    let data = core.memory_data(kind).ok_or(MemoryError::NullPointer)?;

    if data.len() != size {
        return Err(MemoryError::SizeMismatch);
    }

    Ok(data)
}

/// Load a memory region from disk.
///
/// Files shorter than the region only fill its start, some games save smaller images than the core exports.
///
/// # Returns
/// The amount of bytes loaded.
pub fn read_memory(core: &mut impl MemoryCore, kind: MemoryKind, path: &Path) -> Result<usize, MemoryError> {
    let size = core.memory_size(kind);
    if size == 0 {
        return Err(MemoryError::NoSupport);
    }

    let mut file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MemoryError::FileNotFound,
        _ => MemoryError::FileError(e),
    })?;

    let data = region(core, kind, size)?;
    let mut read = 0;
    while read < size {
        match file.read(&mut data[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(MemoryError::FileError(e)),
        }
    }

    if read == 0 {
        return Err(MemoryError::FileError(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "empty memory file",
        )));
    }

    Ok(read)
}

/// Dump a memory region to disk.
///
/// # Returns
/// The amount of bytes written.
pub fn write_memory(core: &mut impl MemoryCore, kind: MemoryKind, path: &Path) -> Result<usize, MemoryError> {
    let size = core.memory_size(kind);
    if size == 0 {
        return Err(MemoryError::NoSupport);
    }

    let data = region(core, kind, size)?;
    let mut file = File::create(path).map_err(MemoryError::FileError)?;
    file.write_all(data)
        .and_then(|_| file.sync_all())
        .map_err(MemoryError::FileError)?;

    Ok(size)
}

/// FNV-1a over a memory region, used to notice when a game touched its save RAM.
pub fn checksum(data: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    data.iter()
        .fold(OFFSET, |hash, byte| (hash ^ *byte as u64).wrapping_mul(PRIME))
}
