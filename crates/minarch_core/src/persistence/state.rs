use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use super::StateCore;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Core does not support save states")]
    NoSupport,
    #[error("State file not found")]
    FileNotFound,
    #[error("File I/O error")]
    FileError(#[source] std::io::Error),
    #[error("Memory allocation failed")]
    AllocError,
    #[error("Core serialization failed")]
    SerializeError,
    #[error("State size mismatch")]
    SizeMismatch,
}

/// Outcome of a successful state read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRead {
    /// What the core reported via `serialize_size()`.
    pub expected: usize,
    /// What the file actually provided.
    pub read: usize,
}

impl StateRead {
    /// A short file was handed to the core. Some cores accept that, others silently ignore it.
    pub fn is_short(&self) -> bool {
        self.read < self.expected
    }
}

fn zeroed(size: usize) -> Result<Vec<u8>, StateError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(size).map_err(|_| StateError::AllocError)?;
    buffer.resize(size, 0);
    Ok(buffer)
}

/// Restore the core from the state file at `path`.
///
/// At most `serialize_size()` bytes are read, any trailing data is ignored. Short files are tolerated and passed on,
/// the byte counts are reported back so callers can flag them.
pub fn read_state(core: &mut impl StateCore, path: &Path) -> Result<StateRead, StateError> {
    let expected = core.serialize_size();
    if expected == 0 {
        return Err(StateError::NoSupport);
    }

    let mut buffer = zeroed(expected)?;
    let mut file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => StateError::FileNotFound,
        _ => StateError::FileError(e),
    })?;

    let mut read = 0;
    while read < expected {
        match file.read(&mut buffer[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StateError::FileError(e)),
        }
    }

    if read < expected {
        log::warn!("State {:?} is short: read {} of {} bytes", path, read, expected);
    }

    if !core.unserialize(&buffer) {
        return Err(StateError::SerializeError);
    }

    Ok(StateRead { expected, read })
}

/// Snapshot the core into `path`.
///
/// The file is synced before returning. On any failure after the file was created it is removed again, a
/// half-written state never survives.
///
/// # Returns
/// The amount of bytes written.
pub fn write_state(core: &mut impl StateCore, path: &Path) -> Result<usize, StateError> {
    let size = core.serialize_size();
    if size == 0 {
        return Err(StateError::NoSupport);
    }

    let mut buffer = zeroed(size)?;
    if !core.serialize(&mut buffer) {
        return Err(StateError::SerializeError);
    }

    let mut file = File::create(path).map_err(StateError::FileError)?;
    let written = file.write_all(&buffer).and_then(|_| file.sync_all());

    if let Err(e) = written {
        drop(file);
        if let Err(unlink) = std::fs::remove_file(path) {
            log::warn!("Could not remove partial state {:?}: {}", path, unlink);
        }
        return Err(StateError::FileError(e));
    }

    Ok(size)
}
