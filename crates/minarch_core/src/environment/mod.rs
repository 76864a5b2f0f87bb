//! The host side of the libretro environment protocol.
//!
//! The frontend decodes the raw `(cmd, *mut c_void)` pair into an [`EnvRequest`], hands it to
//! [`Environment::dispatch`] and writes the [`EnvReply`] back through the pointer. Nothing in here touches raw memory.

use std::path::{Path, PathBuf};

use crate::convert::PixelFormat;
use crate::input::{retro, InputDescriptor};
use crate::options::{OptionDefinition, OptionList};
use crate::rotation::Rotation;

pub use video::{AvInfo, Geometry, Timing, VideoState};

mod video;

/// Flag OR'ed into commands that are not part of the stable API.
pub const EXPERIMENTAL: u32 = 0x10000;

pub const AV_ENABLE_VIDEO: u32 = 1;
pub const AV_ENABLE_AUDIO: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvCommand {
    SetRotation,
    GetOverscan,
    GetCanDupe,
    SetMessage,
    SetPerformanceLevel,
    GetSystemDirectory,
    SetPixelFormat,
    SetInputDescriptors,
    SetDiskControlInterface,
    GetVariable,
    SetVariables,
    GetVariableUpdate,
    SetSupportNoGame,
    SetFrameTimeCallback,
    SetAudioCallback,
    GetRumbleInterface,
    GetInputDeviceCapabilities,
    GetLogInterface,
    GetSaveDirectory,
    SetSystemAvInfo,
    SetControllerInfo,
    SetGeometry,
    GetCurrentSoftwareFramebuffer,
    GetAudioVideoEnable,
    GetFastForwarding,
    GetTargetRefreshRate,
    GetInputBitmasks,
    GetCoreOptionsVersion,
    SetCoreOptions,
    SetCoreOptionsIntl,
    SetCoreOptionsDisplay,
    GetDiskControlInterfaceVersion,
    SetDiskControlExtInterface,
    SetAudioBufferStatusCallback,
    SetContentInfoOverride,
    SetVariable,
    GetThrottleState,
}

impl EnvCommand {
    /// Decode a raw request number. Unsupported requests map to `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        use EnvCommand::*;

        let command = match raw {
            1 => SetRotation,
            2 => GetOverscan,
            3 => GetCanDupe,
            6 => SetMessage,
            8 => SetPerformanceLevel,
            9 => GetSystemDirectory,
            10 => SetPixelFormat,
            11 => SetInputDescriptors,
            13 => SetDiskControlInterface,
            15 => GetVariable,
            16 => SetVariables,
            17 => GetVariableUpdate,
            18 => SetSupportNoGame,
            21 => SetFrameTimeCallback,
            22 => SetAudioCallback,
            23 => GetRumbleInterface,
            24 => GetInputDeviceCapabilities,
            27 => GetLogInterface,
            31 => GetSaveDirectory,
            32 => SetSystemAvInfo,
            35 => SetControllerInfo,
            37 => SetGeometry,
            x if x == 40 | EXPERIMENTAL => GetCurrentSoftwareFramebuffer,
            x if x == 47 | EXPERIMENTAL => GetAudioVideoEnable,
            49 => GetFastForwarding,
            x if x == 50 | EXPERIMENTAL => GetTargetRefreshRate,
            x if x == 51 | EXPERIMENTAL => GetInputBitmasks,
            52 => GetCoreOptionsVersion,
            53 => SetCoreOptions,
            54 => SetCoreOptionsIntl,
            55 => SetCoreOptionsDisplay,
            57 => GetDiskControlInterfaceVersion,
            58 => SetDiskControlExtInterface,
            62 => SetAudioBufferStatusCallback,
            65 => SetContentInfoOverride,
            70 => SetVariable,
            x if x == 71 | EXPERIMENTAL => GetThrottleState,
            _ => return None,
        };

        Some(command)
    }

    /// Queries that fail outright when the core passes no output pointer.
    pub fn requires_output(self) -> bool {
        matches!(
            self,
            EnvCommand::GetFastForwarding | EnvCommand::GetTargetRefreshRate | EnvCommand::GetThrottleState
        )
    }
}

/// Outcome of one request: whether it was understood, and what the core gets back as the return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvResult {
    pub handled: bool,
    pub success: bool,
}

impl EnvResult {
    pub const OK: EnvResult = EnvResult {
        handled: true,
        success: true,
    };
    /// Understood, but refused.
    pub const FAIL: EnvResult = EnvResult {
        handled: true,
        success: false,
    };
    pub const UNHANDLED: EnvResult = EnvResult {
        handled: false,
        success: false,
    };
}

/// A decoded request. `None` payloads stand for a null data pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvRequest<'a> {
    SetRotation(Option<u32>),
    GetOverscan,
    GetCanDupe,
    SetMessage(Option<&'a str>),
    SetPerformanceLevel,
    GetSystemDirectory,
    SetPixelFormat(Option<u32>),
    SetInputDescriptors(Option<Vec<InputDescriptor>>),
    SetDiskControlInterface { present: bool },
    GetVariable(Option<&'a str>),
    SetVariables(Option<Vec<(String, String)>>),
    GetVariableUpdate,
    SetSupportNoGame,
    /// `Some(Some(reference))` registers, `Some(None)` carries a null callback.
    SetFrameTimeCallback(Option<Option<i64>>),
    SetAudioCallback,
    GetRumbleInterface,
    GetInputDeviceCapabilities,
    GetLogInterface,
    GetSaveDirectory,
    SetSystemAvInfo(Option<AvInfo>),
    /// Descriptions of the controller types offered on port 0.
    SetControllerInfo(Option<Vec<String>>),
    SetGeometry(Option<Geometry>),
    GetCurrentSoftwareFramebuffer,
    GetAudioVideoEnable,
    GetFastForwarding,
    GetTargetRefreshRate,
    GetInputBitmasks,
    GetCoreOptionsVersion,
    SetCoreOptions(Option<Vec<OptionDefinition>>),
    SetCoreOptionsIntl(Option<Vec<OptionDefinition>>),
    SetCoreOptionsDisplay { key: &'a str, visible: bool },
    GetDiskControlInterfaceVersion,
    SetDiskControlExtInterface { present: bool },
    SetAudioBufferStatusCallback { present: bool },
    SetContentInfoOverride,
    /// `None` is the support probe with null data.
    SetVariable(Option<(&'a str, &'a str)>),
    GetThrottleState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleMode {
    /// Matches the raw protocol values.
    FastForward = 2,
    Vsync = 5,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleState {
    pub mode: ThrottleMode,
    pub rate: f32,
}

/// Data to write back through the request pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvReply<'a> {
    None,
    Bool(bool),
    U32(u32),
    F32(f32),
    Path(&'a Path),
    /// Value of a core variable, `None` when unknown.
    Variable(Option<&'a str>),
    Throttle(ThrottleState),
    /// The frontend should hand out its rumble setter.
    RumbleInterface,
    /// The frontend should hand out its log forwarder.
    LogInterface,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvResponse<'a> {
    pub result: EnvResult,
    pub reply: EnvReply<'a>,
}

impl<'a> EnvResponse<'a> {
    fn ok(reply: EnvReply<'a>) -> Self {
        Self {
            result: EnvResult::OK,
            reply,
        }
    }

    fn result(result: EnvResult) -> Self {
        Self {
            result,
            reply: EnvReply::None,
        }
    }
}

/// Registered frame-time callback bookkeeping, the function pointer itself lives in the frontend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTime {
    /// Ideal frame period in microseconds.
    pub reference: i64,
    /// Timestamp of the last invocation in microseconds, `0` before the first one.
    pub last: i64,
}

impl FrameTime {
    /// Microseconds to report for a frame starting at `now_us`.
    pub fn delta(&mut self, now_us: i64) -> i64 {
        let delta = if self.last == 0 { self.reference } else { now_us - self.last };
        self.last = now_us;
        delta
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiskControl {
    #[default]
    None,
    Basic,
    Extended,
}

/// Host state touched by environment requests.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub video: VideoState,
    pub core_options: OptionList,
    pub system_dir: PathBuf,
    pub save_dir: PathBuf,
    pub fast_forward: bool,
    /// Extra speed multiples while fast-forwarding.
    pub max_ff_speed: u32,
    /// The core offers a DualShock controller type.
    pub has_custom_controllers: bool,
    pub frame_time: Option<FrameTime>,
    pub disk_control: DiskControl,
    pub audio_buffer_status: bool,
    /// Descriptors from the first `SET_INPUT_DESCRIPTORS`, waiting to be applied to the controls.
    pub input_descriptors: Option<Vec<InputDescriptor>>,
    /// `(old_rate, new_rate, fps)` of a sample rate change the audio side has not handled yet.
    pending_audio_reinit: Option<(f64, f64, f64)>,
}

impl Environment {
    pub fn new(system_dir: PathBuf, save_dir: PathBuf) -> Self {
        Self {
            system_dir,
            save_dir,
            ..Default::default()
        }
    }

    /// Hand out a pending audio reinit, at most once per sample rate change.
    pub fn take_audio_reinit(&mut self) -> Option<(f64, f64, f64)> {
        self.pending_audio_reinit.take()
    }

    pub fn throttle_state(&self) -> ThrottleState {
        if self.fast_forward {
            ThrottleState {
                mode: ThrottleMode::FastForward,
                rate: (self.max_ff_speed + 1) as f32,
            }
        } else {
            ThrottleState {
                mode: ThrottleMode::Vsync,
                rate: 1.0,
            }
        }
    }

    pub fn dispatch(&mut self, request: EnvRequest<'_>) -> EnvResponse<'_> {
        use EnvRequest as R;

        match request {
            R::SetRotation(rotation) => EnvResponse::result(self.set_rotation(rotation)),
            R::GetOverscan | R::GetCanDupe | R::GetInputBitmasks => EnvResponse::ok(EnvReply::Bool(true)),
            R::SetMessage(message) => {
                if let Some(message) = message {
                    log::info!("{}", message);
                }
                EnvResponse::ok(EnvReply::None)
            }
            R::SetPerformanceLevel
            | R::SetSupportNoGame
            | R::SetAudioCallback
            | R::GetCurrentSoftwareFramebuffer
            | R::SetContentInfoOverride => EnvResponse::ok(EnvReply::None),
            R::GetSystemDirectory => EnvResponse::ok(EnvReply::Path(&self.system_dir)),
            R::GetSaveDirectory => EnvResponse::ok(EnvReply::Path(&self.save_dir)),
            R::SetPixelFormat(format) => EnvResponse::result(self.set_pixel_format(format)),
            R::SetInputDescriptors(descriptors) => {
                if self.input_descriptors.is_none() {
                    self.input_descriptors = Some(descriptors.unwrap_or_default());
                }
                EnvResponse::result(EnvResult::FAIL)
            }
            R::SetDiskControlInterface { present } => {
                if present {
                    self.disk_control = DiskControl::Basic;
                }
                EnvResponse::ok(EnvReply::None)
            }
            R::SetDiskControlExtInterface { present } => {
                if present {
                    self.disk_control = DiskControl::Extended;
                }
                EnvResponse::ok(EnvReply::None)
            }
            R::GetVariable(key) => {
                let value = key.and_then(|key| self.core_options.get_value(key));
                EnvResponse::ok(EnvReply::Variable(value))
            }
            R::SetVariables(vars) => {
                if let Some(vars) = vars {
                    let list = OptionList::from_variables(vars.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                    log::debug!("Core declared {} variables", list.len());
                    self.core_options.replace(list.into_options());
                }
                EnvResponse::ok(EnvReply::None)
            }
            R::GetVariableUpdate => EnvResponse::ok(EnvReply::Bool(self.core_options.take_changed())),
            R::SetFrameTimeCallback(callback) => EnvResponse::result(self.set_frame_time(callback)),
            R::GetRumbleInterface => EnvResponse::ok(EnvReply::RumbleInterface),
            R::GetInputDeviceCapabilities => EnvResponse::ok(EnvReply::U32(
                (1 << retro::DEVICE_JOYPAD) | (1 << retro::DEVICE_ANALOG),
            )),
            R::GetLogInterface => EnvResponse::ok(EnvReply::LogInterface),
            R::SetSystemAvInfo(info) => EnvResponse::result(self.set_system_av_info(info)),
            R::SetControllerInfo(types) => {
                let dualshock = types
                    .iter()
                    .flatten()
                    .any(|desc| desc.to_ascii_lowercase().contains("dualshock"));
                if dualshock {
                    self.has_custom_controllers = true;
                }
                EnvResponse::result(EnvResult::FAIL)
            }
            R::SetGeometry(geometry) => EnvResponse::result(self.set_geometry(geometry)),
            R::GetAudioVideoEnable => EnvResponse::ok(EnvReply::U32(AV_ENABLE_VIDEO | AV_ENABLE_AUDIO)),
            R::GetFastForwarding => EnvResponse::ok(EnvReply::Bool(self.fast_forward)),
            R::GetTargetRefreshRate => EnvResponse::ok(EnvReply::F32(self.video.fps as f32)),
            R::GetCoreOptionsVersion | R::GetDiskControlInterfaceVersion => EnvResponse::ok(EnvReply::U32(1)),
            R::SetCoreOptions(defs) | R::SetCoreOptionsIntl(defs) => {
                if let Some(defs) = defs {
                    log::debug!("Core declared {} options", defs.len());
                    let list = OptionList::from_definitions(&defs);
                    self.core_options.replace(list.into_options());
                }
                EnvResponse::ok(EnvReply::None)
            }
            R::SetCoreOptionsDisplay { key, visible } => {
                self.core_options.set_visible(key, visible);
                EnvResponse::ok(EnvReply::None)
            }
            R::SetAudioBufferStatusCallback { present } => {
                self.audio_buffer_status = present;
                log::info!(
                    "SET_AUDIO_BUFFER_STATUS_CALLBACK: {}",
                    if present { "enabled" } else { "disabled" }
                );
                EnvResponse::ok(EnvReply::None)
            }
            R::SetVariable(Some((key, value))) => {
                self.core_options.set_value(key, value);
                EnvResponse::ok(EnvReply::None)
            }
            R::SetVariable(None) => EnvResponse::ok(EnvReply::U32(1)),
            R::GetThrottleState => EnvResponse::ok(EnvReply::Throttle(self.throttle_state())),
        }
    }

    fn set_rotation(&mut self, rotation: Option<u32>) -> EnvResult {
        let Some(raw) = rotation else {
            log::error!("SET_ROTATION called with NULL data");
            return EnvResult::FAIL;
        };

        match Rotation::from_raw(raw) {
            Some(rotation) => {
                self.video.rotation = rotation;
                log::info!("SET_ROTATION: {:?}", rotation);
                EnvResult::OK
            }
            None => {
                log::error!("SET_ROTATION invalid value: {} (must be 0-3)", raw);
                EnvResult::FAIL
            }
        }
    }

    fn set_pixel_format(&mut self, format: Option<u32>) -> EnvResult {
        let Some(raw) = format else {
            log::error!("SET_PIXEL_FORMAT called with NULL data");
            return EnvResult::FAIL;
        };

        match PixelFormat::from_raw(raw) {
            Some(format) => {
                self.video.pixel_format = format;
                log::info!("Core requested {:?} format", format);
                EnvResult::OK
            }
            None => {
                log::error!("Core requested unknown pixel format {}", raw);
                EnvResult::FAIL
            }
        }
    }

    fn set_geometry(&mut self, geometry: Option<Geometry>) -> EnvResult {
        let Some(geometry) = geometry else {
            log::error!("SET_GEOMETRY called with NULL data");
            return EnvResult::FAIL;
        };

        // The reported size may not match the frames actually sent, so the aspect ratio is left alone here.
        log::debug!(
            "SET_GEOMETRY: {}x{} aspect: {:.3}",
            geometry.base_width,
            geometry.base_height,
            geometry.aspect_ratio
        );
        self.video.needs_rescale = true;
        self.video.geometry_changed = true;
        EnvResult::OK
    }

    fn set_system_av_info(&mut self, info: Option<AvInfo>) -> EnvResult {
        let Some(info) = info else {
            log::error!("SET_SYSTEM_AV_INFO called with NULL data");
            return EnvResult::FAIL;
        };

        log::debug!(
            "SET_SYSTEM_AV_INFO: {}x{} @ {:.2} fps, {:.0} Hz",
            info.geometry.base_width,
            info.geometry.base_height,
            info.timing.fps,
            info.timing.sample_rate
        );

        let old_rate = self.video.sample_rate;
        self.video.aspect_ratio = info.geometry.effective_aspect();
        self.video.fps = info.timing.fps;
        self.video.sample_rate = info.timing.sample_rate;

        if old_rate != info.timing.sample_rate {
            self.pending_audio_reinit = Some((old_rate, info.timing.sample_rate, info.timing.fps));
        }

        self.video.needs_rescale = true;
        self.video.av_info_changed = true;
        EnvResult::OK
    }

    fn set_frame_time(&mut self, callback: Option<Option<i64>>) -> EnvResult {
        match callback {
            None => {
                log::error!("SET_FRAME_TIME_CALLBACK called with NULL data");
                EnvResult::FAIL
            }
            Some(None) => {
                self.frame_time = None;
                EnvResult::OK
            }
            Some(Some(reference)) => {
                self.frame_time = Some(FrameTime { reference, last: 0 });
                EnvResult::OK
            }
        }
    }
}
