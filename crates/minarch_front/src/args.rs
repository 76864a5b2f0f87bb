use std::path::PathBuf;

use log::LevelFilter;

#[derive(clap::Parser, Debug, Clone)]
#[clap(version, about)]
pub struct MainArgs {
    /// The libretro core to load, e.g. `gambatte_libretro.so`
    pub core: PathBuf,

    /// The game to run
    pub rom: PathBuf,

    /// Resume from the auto-save slot
    #[clap(long)]
    pub resume: bool,

    /// Resume from a specific save state slot instead
    #[clap(long, value_parser = clap::value_parser!(u8).range(0..10))]
    pub slot: Option<u8>,

    /// Width of the device screen
    #[clap(long, default_value_t = minarch_core::DEVICE_WIDTH)]
    pub width: u32,

    /// Height of the device screen
    #[clap(long, default_value_t = minarch_core::DEVICE_HEIGHT)]
    pub height: u32,

    /// The presenter can show buffers larger than the screen and scale them down itself
    #[clap(long)]
    pub no_fit: bool,

    /// Largest back-buffer the presenter may allocate, defaults to 1.5x the screen
    #[clap(long)]
    pub buffer_width: Option<u32>,

    #[clap(long)]
    pub buffer_height: Option<u32>,

    /// Screen width that identifies an external HDMI display
    #[clap(long, default_value_t = 1280)]
    pub hdmi_width: u32,

    /// Force the HDMI output state instead of reading it from the settings block
    #[clap(long)]
    pub hdmi: bool,

    /// Run without a window, for automated runs
    #[clap(long)]
    pub headless: bool,

    /// Exit with code 124 after this many seconds
    #[clap(long)]
    pub timeout: Option<u64>,

    #[clap(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,

    #[clap(long, env = "SDCARD_PATH")]
    pub sdcard: Option<PathBuf>,

    #[clap(long, env = "USERDATA_PATH")]
    pub userdata: Option<PathBuf>,

    #[clap(long, env = "SHARED_USERDATA_PATH")]
    pub shared_userdata: Option<PathBuf>,

    #[clap(long, env = "SYSTEM_PATH")]
    pub system: Option<PathBuf>,

    /// Device tag used to pick `-{device}` config variants
    #[clap(long, env = "DEVICE")]
    pub device: Option<String>,
}

impl MainArgs {
    pub fn buffer_size(&self) -> (u32, u32) {
        (
            self.buffer_width.unwrap_or(self.width * 3 / 2),
            self.buffer_height.unwrap_or(self.height * 3 / 2),
        )
    }
}
