//! Layout of the settings block shared with the input daemon.
//!
//! The daemon is the only writer of brightness and volume, the runtime only reads them. Every field is a single
//! atomic, written with `Release` and read with `Acquire`.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SETTINGS_VERSION: u32 = 3;
pub const DEFAULT_BRIGHTNESS: u32 = 2;
pub const DEFAULT_HEADPHONE_VOLUME: u32 = 4;
pub const DEFAULT_SPEAKER_VOLUME: u32 = 8;
pub const MAX_BRIGHTNESS: u32 = 10;
pub const MAX_VOLUME: u32 = 20;

/// Brightness steps for AMOLED panels, which are far from linear.
const AMOLED_CURVE: [u32; 11] = [1, 2, 4, 8, 15, 25, 40, 55, 70, 85, 100];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Settings block has version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },
    #[error("Settings block needs {needed} bytes, mapping has {available}")]
    TooSmall { needed: usize, available: usize },
}

/// Panel brightness (percent) for a brightness index `0..=10`.
pub fn brightness_percent(index: u32, amoled: bool) -> u32 {
    let index = index.min(MAX_BRIGHTNESS);
    if amoled {
        AMOLED_CURVE[index as usize]
    } else {
        index * 10
    }
}

/// Mixer volume (percent) for a volume index `0..=20`. HDMI always passes through at full volume.
pub fn mixer_volume(index: u32, hdmi: bool) -> u32 {
    if hdmi {
        100
    } else {
        index.min(MAX_VOLUME) * 5
    }
}

/// Plain copy of the block, persisted between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub version: u32,
    pub brightness: u32,
    pub headphone_volume: u32,
    pub speaker_volume: u32,
    pub mute: bool,
    pub jack: bool,
    pub hdmi: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            brightness: DEFAULT_BRIGHTNESS,
            headphone_volume: DEFAULT_HEADPHONE_VOLUME,
            speaker_volume: DEFAULT_SPEAKER_VOLUME,
            mute: false,
            jack: false,
            hdmi: false,
        }
    }
}

/// The shared memory layout.
#[repr(C)]
#[derive(Debug, Default)]
pub struct SettingsBlock {
    version: AtomicU32,
    brightness: AtomicU32,
    headphone_volume: AtomicU32,
    speaker_volume: AtomicU32,
    mute: AtomicU32,
    jack: AtomicU32,
    hdmi: AtomicU32,
    _reserved: [AtomicU32; 9],
}

impl SettingsBlock {
    pub const SIZE: usize = std::mem::size_of::<SettingsBlock>();

    pub fn new(settings: &Settings) -> Self {
        let block = Self::default();
        block.store(settings);
        block
    }

    /// Overwrite every field from `settings`.
    pub fn store(&self, settings: &Settings) {
        self.brightness.store(settings.brightness.min(MAX_BRIGHTNESS), Ordering::Release);
        self.headphone_volume
            .store(settings.headphone_volume.min(MAX_VOLUME), Ordering::Release);
        self.speaker_volume
            .store(settings.speaker_volume.min(MAX_VOLUME), Ordering::Release);
        self.mute.store(settings.mute as u32, Ordering::Release);
        self.jack.store(settings.jack as u32, Ordering::Release);
        self.hdmi.store(settings.hdmi as u32, Ordering::Release);
        // Published last, readers treat a matching version as "initialised".
        self.version.store(settings.version, Ordering::Release);
    }

    pub fn snapshot(&self) -> Settings {
        Settings {
            version: self.version.load(Ordering::Acquire),
            brightness: self.brightness(),
            headphone_volume: self.headphone_volume.load(Ordering::Acquire),
            speaker_volume: self.speaker_volume.load(Ordering::Acquire),
            mute: self.is_muted(),
            jack: self.has_jack(),
            hdmi: self.has_hdmi(),
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let found = self.version.load(Ordering::Acquire);
        if found != SETTINGS_VERSION {
            return Err(SettingsError::Version {
                found,
                expected: SETTINGS_VERSION,
            });
        }
        Ok(())
    }

    pub fn brightness(&self) -> u32 {
        self.brightness.load(Ordering::Acquire)
    }

    pub fn set_brightness(&self, value: u32) {
        self.brightness.store(value.min(MAX_BRIGHTNESS), Ordering::Release);
    }

    /// Volume index of whichever output is active.
    pub fn volume(&self) -> u32 {
        if self.has_jack() {
            self.headphone_volume.load(Ordering::Acquire)
        } else {
            self.speaker_volume.load(Ordering::Acquire)
        }
    }

    pub fn set_volume(&self, value: u32) {
        let target = if self.has_jack() {
            &self.headphone_volume
        } else {
            &self.speaker_volume
        };
        target.store(value.min(MAX_VOLUME), Ordering::Release);
    }

    pub fn is_muted(&self) -> bool {
        self.mute.load(Ordering::Acquire) != 0
    }

    pub fn has_jack(&self) -> bool {
        self.jack.load(Ordering::Acquire) != 0
    }

    pub fn has_hdmi(&self) -> bool {
        self.hdmi.load(Ordering::Acquire) != 0
    }

    pub fn set_hdmi(&self, hdmi: bool) {
        self.hdmi.store(hdmi as u32, Ordering::Release);
    }

    /// Output gain in `0.0..=1.0` for the audio stream.
    pub fn output_gain(&self) -> f32 {
        if self.is_muted() {
            0.0
        } else {
            mixer_volume(self.volume(), self.has_hdmi()) as f32 / 100.0
        }
    }
}
