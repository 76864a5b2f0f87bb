//! Raw libretro structures not covered by `libretro_sys`.
#![allow(dead_code)]

use std::ffi::{c_char, c_uint, c_void};

pub use libretro_sys::{GameGeometry, GameInfo, SystemAvInfo, SystemInfo, SystemTiming, Variable};

pub type EnvironmentFn = unsafe extern "C" fn(cmd: c_uint, data: *mut c_void) -> bool;
pub type VideoRefreshFn = unsafe extern "C" fn(data: *const c_void, width: c_uint, height: c_uint, pitch: usize);
pub type AudioSampleFn = unsafe extern "C" fn(left: i16, right: i16);
pub type AudioSampleBatchFn = unsafe extern "C" fn(data: *const i16, frames: usize) -> usize;
pub type InputPollFn = unsafe extern "C" fn();
pub type InputStateFn = unsafe extern "C" fn(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16;

/// Only the level and format string are read, the variadic arguments are left alone.
pub type LogPrintfFn = unsafe extern "C" fn(level: c_uint, fmt: *const c_char);
pub type SetRumbleStateFn = unsafe extern "C" fn(port: c_uint, effect: c_uint, strength: u16) -> bool;
pub type FrameTimeFn = unsafe extern "C" fn(usec: i64);
pub type AudioBufferStatusFn = unsafe extern "C" fn(active: bool, occupancy: c_uint, underrun_likely: bool);

pub const LOG_DEBUG: c_uint = 0;
pub const LOG_INFO: c_uint = 1;
pub const LOG_WARN: c_uint = 2;
pub const LOG_ERROR: c_uint = 3;

pub const NUM_CORE_OPTION_VALUES_MAX: usize = 128;

#[repr(C)]
pub struct Message {
    pub msg: *const c_char,
    pub frames: c_uint,
}

#[repr(C)]
pub struct InputDescriptor {
    pub port: c_uint,
    pub device: c_uint,
    pub index: c_uint,
    pub id: c_uint,
    pub description: *const c_char,
}

#[repr(C)]
pub struct ControllerDescription {
    pub desc: *const c_char,
    pub id: c_uint,
}

#[repr(C)]
pub struct ControllerInfo {
    pub types: *const ControllerDescription,
    pub num_types: c_uint,
}

#[repr(C)]
pub struct LogCallback {
    pub log: Option<LogPrintfFn>,
}

#[repr(C)]
pub struct RumbleInterface {
    pub set_rumble_state: Option<SetRumbleStateFn>,
}

#[repr(C)]
pub struct FrameTimeCallback {
    pub callback: Option<FrameTimeFn>,
    pub reference: i64,
}

#[repr(C)]
pub struct AudioBufferStatusCallback {
    pub callback: Option<AudioBufferStatusFn>,
}

#[repr(C)]
pub struct CoreOptionValue {
    pub value: *const c_char,
    pub label: *const c_char,
}

#[repr(C)]
pub struct CoreOptionDefinition {
    pub key: *const c_char,
    pub desc: *const c_char,
    pub info: *const c_char,
    pub values: [CoreOptionValue; NUM_CORE_OPTION_VALUES_MAX],
    pub default_value: *const c_char,
}

#[repr(C)]
pub struct CoreOptionsIntl {
    pub us: *const CoreOptionDefinition,
    pub local: *const CoreOptionDefinition,
}

#[repr(C)]
pub struct CoreOptionDisplay {
    pub key: *const c_char,
    pub visible: bool,
}

#[repr(C)]
pub struct ThrottleState {
    pub mode: c_uint,
    pub rate: f32,
}

/// The extended disk control table. The basic table is its first seven entries.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct DiskControlCallbacks {
    pub set_eject_state: Option<unsafe extern "C" fn(ejected: bool) -> bool>,
    pub get_eject_state: Option<unsafe extern "C" fn() -> bool>,
    pub get_image_index: Option<unsafe extern "C" fn() -> c_uint>,
    pub set_image_index: Option<unsafe extern "C" fn(index: c_uint) -> bool>,
    pub get_num_images: Option<unsafe extern "C" fn() -> c_uint>,
    pub replace_image_index: Option<unsafe extern "C" fn(index: c_uint, info: *const GameInfo) -> bool>,
    pub add_image_index: Option<unsafe extern "C" fn() -> bool>,
    pub set_initial_image: Option<unsafe extern "C" fn(index: c_uint, path: *const c_char) -> bool>,
    pub get_image_path: Option<unsafe extern "C" fn(index: c_uint, path: *mut c_char, len: usize) -> bool>,
    pub get_image_label: Option<unsafe extern "C" fn(index: c_uint, label: *mut c_char, len: usize) -> bool>,
}

#[repr(C)]
pub struct BasicDiskControlCallbacks {
    pub set_eject_state: Option<unsafe extern "C" fn(ejected: bool) -> bool>,
    pub get_eject_state: Option<unsafe extern "C" fn() -> bool>,
    pub get_image_index: Option<unsafe extern "C" fn() -> c_uint>,
    pub set_image_index: Option<unsafe extern "C" fn(index: c_uint) -> bool>,
    pub get_num_images: Option<unsafe extern "C" fn() -> c_uint>,
    pub replace_image_index: Option<unsafe extern "C" fn(index: c_uint, info: *const GameInfo) -> bool>,
    pub add_image_index: Option<unsafe extern "C" fn() -> bool>,
}

impl From<&BasicDiskControlCallbacks> for DiskControlCallbacks {
    fn from(basic: &BasicDiskControlCallbacks) -> Self {
        Self {
            set_eject_state: basic.set_eject_state,
            get_eject_state: basic.get_eject_state,
            get_image_index: basic.get_image_index,
            set_image_index: basic.set_image_index,
            get_num_images: basic.get_num_images,
            replace_image_index: basic.replace_image_index,
            add_image_index: basic.add_image_index,
            ..Default::default()
        }
    }
}
