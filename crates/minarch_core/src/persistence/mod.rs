//! Battery RAM, RTC and save state files.
//!
//! The on-disk formats are raw byte images without headers: SRAM/RTC are copies of the core's memory regions,
//! states are exactly `serialize_size()` bytes produced by the core.

use std::path::{Path, PathBuf};

pub use memory::{checksum, read_memory, write_memory, MemoryError, MemoryKind};
pub use state::{read_state, write_state, StateError, StateRead};

pub mod memory;
pub mod state;

/// Slot written on every clean exit and read by one-button resume.
pub const AUTO_RESUME_SLOT: u8 = 9;
/// Hidden slot the launcher uses for its own resume default, a missing file is not worth reporting.
pub const HIDDEN_RESUME_SLOT: u8 = 8;
pub const SLOT_COUNT: u8 = 10;

/// The state serialisation half of a loaded core.
pub trait StateCore {
    /// Bytes needed for a snapshot, `0` when the core cannot save states.
    fn serialize_size(&mut self) -> usize;
    fn serialize(&mut self, buffer: &mut [u8]) -> bool;
    fn unserialize(&mut self, buffer: &[u8]) -> bool;
}

/// Access to the memory regions a core exports.
pub trait MemoryCore {
    fn memory_size(&mut self, kind: MemoryKind) -> usize;
    /// The region's bytes, `None` when the core returned a null pointer.
    fn memory_data(&mut self, kind: MemoryKind) -> Option<&mut [u8]>;
}

/// Per-game persistence locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePaths {
    pub saves_dir: PathBuf,
    pub states_dir: PathBuf,
    /// Game file name including extension, e.g. `Tetris (World).gb`.
    pub game_name: String,
}

impl GamePaths {
    pub fn new(saves_dir: impl Into<PathBuf>, states_dir: impl Into<PathBuf>, game_name: impl Into<String>) -> Self {
        Self {
            saves_dir: saves_dir.into(),
            states_dir: states_dir.into(),
            game_name: game_name.into(),
        }
    }

    pub fn sram_path(&self) -> PathBuf {
        self.saves_dir.join(format!("{}.sav", self.game_name))
    }

    pub fn rtc_path(&self) -> PathBuf {
        self.saves_dir.join(format!("{}.rtc", self.game_name))
    }

    pub fn state_path(&self, slot: u8) -> PathBuf {
        self.states_dir.join(format!("{}.st{}", self.game_name, slot))
    }

    pub fn memory_path(&self, kind: MemoryKind) -> Option<PathBuf> {
        match kind {
            MemoryKind::SaveRam => Some(self.sram_path()),
            MemoryKind::Rtc => Some(self.rtc_path()),
            _ => None,
        }
    }
}

/// Location of the resume pointer for a ROM: `{userdata}/.minui/{emu}/{rom file name}.txt`.
pub fn resume_pointer_path(userdata_dir: &Path, emu_tag: &str, rom_path: &Path) -> PathBuf {
    let file_name = rom_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    userdata_dir.join(".minui").join(emu_tag).join(format!("{}.txt", file_name))
}

/// Write the absolute ROM path to the resume pointer file.
pub fn write_resume_pointer(pointer: &Path, rom_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = pointer.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(pointer, rom_path.to_string_lossy().as_bytes())
}

/// Read a pending resume slot request and consume it.
///
/// # Returns
/// * `Some(slot)` - When the file existed and held a valid slot number. The file is removed either way.
/// * `None` - When there was no request.
pub fn take_resume_slot(path: &Path) -> Option<u8> {
    let contents = std::fs::read_to_string(path).ok()?;

    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("Could not remove resume slot file {:?}: {}", path, e);
    }

    match contents.trim().parse::<u8>() {
        Ok(slot) if slot < SLOT_COUNT => Some(slot),
        _ => {
            log::warn!("Ignoring invalid resume slot {:?}", contents.trim());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let paths = GamePaths::new("/saves/GB", "/states/GB-gambatte", "Tetris.gb");

        assert_eq!(paths.sram_path(), PathBuf::from("/saves/GB/Tetris.gb.sav"));
        assert_eq!(paths.rtc_path(), PathBuf::from("/saves/GB/Tetris.gb.rtc"));
        assert_eq!(paths.state_path(3), PathBuf::from("/states/GB-gambatte/Tetris.gb.st3"));
        assert_eq!(paths.memory_path(MemoryKind::SystemRam), None);
    }

    #[test]
    fn test_resume_pointer_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let rom = Path::new("/mnt/SDCARD/Roms/Game Boy (GB)/Tetris.gb");
        let pointer = resume_pointer_path(dir.path(), "GB", rom);

        assert!(pointer.ends_with(".minui/GB/Tetris.gb.txt"));

        write_resume_pointer(&pointer, rom).unwrap();
        assert_eq!(std::fs::read_to_string(&pointer).unwrap(), rom.to_string_lossy());
    }

    #[test]
    fn test_take_resume_slot_consumes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume_slot.txt");

        assert_eq!(take_resume_slot(&path), None);

        std::fs::write(&path, "4\n").unwrap();
        assert_eq!(take_resume_slot(&path), Some(4));
        assert!(!path.exists());

        std::fs::write(&path, "banana").unwrap();
        assert_eq!(take_resume_slot(&path), None);
        assert!(!path.exists());
    }
}
