pub mod audio;
pub mod config;
pub mod convert;
pub mod environment;
pub mod exit;
pub mod game;
pub mod input;
pub mod options;
pub mod pacing;
pub mod pad;
pub mod persistence;
pub mod rate_meter;
pub mod rotation;
pub mod scaler;
pub mod settings;

pub use exit::ExitStatus;

/// Native screen dimensions of the reference handheld, used when the host does not say otherwise.
pub const DEVICE_WIDTH: u32 = 640;
pub const DEVICE_HEIGHT: u32 = 480;
