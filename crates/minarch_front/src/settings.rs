//! Memory mapped settings block, shared with whatever else on the device maps the same file.

use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use memmap2::MmapMut;
use minarch_core::settings::{Settings, SettingsBlock};

pub struct SharedSettings {
    map: MmapMut,
    persist_path: PathBuf,
}

impl SharedSettings {
    /// Map `shm_path`, seeding it from `persist_path` (or the defaults) when the mapping holds no valid block.
    pub fn open(shm_path: &Path, persist_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = shm_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(shm_path)
            .with_context(|| format!("Failed to open settings block {:?}", shm_path))?;

        if (file.metadata()?.len() as usize) < SettingsBlock::SIZE {
            file.set_len(SettingsBlock::SIZE as u64)?;
        }

        // Safety: the file is only ever accessed through the atomics of `SettingsBlock`.
        let map = unsafe { memmap2::MmapOptions::new().len(SettingsBlock::SIZE).map_mut(&file)? };

        let result = Self {
            map,
            persist_path: persist_path.to_path_buf(),
        };

        if let Err(e) = result.block().validate() {
            log::info!("Initialising settings block ({})", e);
            result.block().store(&load_persisted(persist_path));
        }

        Ok(result)
    }

    pub fn block(&self) -> &SettingsBlock {
        // Safety: the mapping is page aligned, at least `SettingsBlock::SIZE` long, and every field is an atomic.
        unsafe { &*(self.map.as_ptr() as *const SettingsBlock) }
    }

    /// Write the current values to the persistent file.
    pub fn persist(&self) -> anyhow::Result<()> {
        let file = std::fs::File::create(&self.persist_path)
            .with_context(|| format!("Failed to create {:?}", self.persist_path))?;

        bincode::serialize_into(BufWriter::new(file), &self.block().snapshot())?;
        Ok(())
    }
}

fn load_persisted(path: &Path) -> Settings {
    let Ok(file) = std::fs::File::open(path) else {
        return Settings::default();
    };

    match bincode::deserialize_from::<_, Settings>(std::io::BufReader::new(file)) {
        Ok(settings) if settings.version == Settings::default().version => settings,
        Ok(settings) => {
            log::warn!("Ignoring persisted settings with version {}", settings.version);
            Settings::default()
        }
        Err(e) => {
            log::warn!("Failed to read persisted settings: {}", e);
            Settings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use minarch_core::settings::DEFAULT_SPEAKER_VOLUME;

    use super::*;

    #[test]
    fn test_fresh_block_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SharedSettings::open(&dir.path().join("msettings.shm"), &dir.path().join("msettings.bin")).unwrap();

        assert!(settings.block().validate().is_ok());
        assert_eq!(settings.block().volume(), DEFAULT_SPEAKER_VOLUME);
    }

    #[test]
    fn test_persisted_values_survive() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("msettings.bin");

        {
            let settings = SharedSettings::open(&dir.path().join("a.shm"), &bin).unwrap();
            settings.block().set_volume(13);
            settings.block().set_brightness(7);
            settings.persist().unwrap();
        }

        // A fresh mapping falls back to the persisted copy.
        let settings = SharedSettings::open(&dir.path().join("b.shm"), &bin).unwrap();
        assert_eq!(settings.block().volume(), 13);
        assert_eq!(settings.block().brightness(), 7);
    }

    #[test]
    fn test_existing_block_is_shared() {
        let dir = tempfile::tempdir().unwrap();
        let shm = dir.path().join("msettings.shm");
        let bin = dir.path().join("msettings.bin");

        let first = SharedSettings::open(&shm, &bin).unwrap();
        first.block().set_hdmi(true);

        let second = SharedSettings::open(&shm, &bin).unwrap();
        assert!(second.block().has_hdmi());
    }
}
