//! Translation between raw environment calls and [`EnvRequest`]/[`EnvReply`].

use std::collections::HashMap;
use std::ffi::{c_char, c_uint, c_void, CStr, CString};
use std::path::{Path, PathBuf};

use minarch_core::environment::{EnvCommand, EnvReply, EnvRequest};
use minarch_core::input::InputDescriptor;
use minarch_core::options::OptionDefinition;

use super::ffi::{self, Variable};
use super::{av_info_from_raw, callbacks, geometry_from_raw};

/// Function pointers a core hands over, kept by the frontend rather than the environment state.
#[derive(Clone, Copy)]
pub enum Registration {
    FrameTime(Option<ffi::FrameTimeFn>),
    AudioBufferStatus(Option<ffi::AudioBufferStatusFn>),
    DiskControl(ffi::DiskControlCallbacks),
}

/// Owns the strings whose pointers were handed to the core.
#[derive(Default)]
pub struct ReplyCache {
    variables: HashMap<String, CString>,
    paths: HashMap<PathBuf, CString>,
}

impl ReplyCache {
    fn variable(&mut self, key: &str, value: &str) -> *const c_char {
        let cached = self.variables.entry(key.to_string()).or_default();
        if cached.as_bytes() != value.as_bytes() {
            *cached = CString::new(value).unwrap_or_default();
        }
        cached.as_ptr()
    }

    fn path(&mut self, path: &Path) -> *const c_char {
        self.paths
            .entry(path.to_path_buf())
            .or_insert_with(|| CString::new(path.to_string_lossy().as_bytes()).unwrap_or_default())
            .as_ptr()
    }
}

unsafe fn str_ref<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        CStr::from_ptr(ptr).to_str().ok()
    }
}

unsafe fn owned(ptr: *const c_char) -> Option<String> {
    super::c_string(ptr)
}

unsafe fn read<'a, T>(data: *mut c_void) -> Option<&'a T> {
    (data as *const T).as_ref()
}

/// Decode the payload of `cmd`.
///
/// Returns `None` when the payload cannot be represented at all, which the core sees as an unhandled request.
///
/// # Safety
/// `data` must be null or point to the structure the libretro API defines for `cmd`.
pub unsafe fn decode<'a>(cmd: EnvCommand, data: *mut c_void) -> Option<EnvRequest<'a>> {
    use EnvCommand as C;
    use EnvRequest as R;

    let request = match cmd {
        C::SetRotation => R::SetRotation(read::<c_uint>(data).copied()),
        C::GetOverscan => R::GetOverscan,
        C::GetCanDupe => R::GetCanDupe,
        C::SetMessage => R::SetMessage(read::<ffi::Message>(data).and_then(|msg| str_ref(msg.msg))),
        C::SetPerformanceLevel => R::SetPerformanceLevel,
        C::GetSystemDirectory => R::GetSystemDirectory,
        C::SetPixelFormat => R::SetPixelFormat(read::<c_uint>(data).copied()),
        C::SetInputDescriptors => R::SetInputDescriptors(input_descriptors(data)),
        C::SetDiskControlInterface => R::SetDiskControlInterface { present: !data.is_null() },
        C::GetVariable => R::GetVariable(read::<Variable>(data).and_then(|var| str_ref(var.key))),
        C::SetVariables => R::SetVariables(variables(data)),
        C::GetVariableUpdate => R::GetVariableUpdate,
        C::SetSupportNoGame => R::SetSupportNoGame,
        C::SetFrameTimeCallback => R::SetFrameTimeCallback(
            read::<ffi::FrameTimeCallback>(data).map(|cb| cb.callback.map(|_| cb.reference)),
        ),
        C::SetAudioCallback => R::SetAudioCallback,
        C::GetRumbleInterface => R::GetRumbleInterface,
        C::GetInputDeviceCapabilities => R::GetInputDeviceCapabilities,
        C::GetLogInterface => R::GetLogInterface,
        C::GetSaveDirectory => R::GetSaveDirectory,
        C::SetSystemAvInfo => R::SetSystemAvInfo(read::<ffi::SystemAvInfo>(data).map(av_info_from_raw)),
        C::SetControllerInfo => R::SetControllerInfo(controller_types(data)),
        C::SetGeometry => R::SetGeometry(read::<ffi::GameGeometry>(data).map(geometry_from_raw)),
        C::GetCurrentSoftwareFramebuffer => R::GetCurrentSoftwareFramebuffer,
        C::GetAudioVideoEnable => R::GetAudioVideoEnable,
        C::GetFastForwarding => R::GetFastForwarding,
        C::GetTargetRefreshRate => R::GetTargetRefreshRate,
        C::GetInputBitmasks => R::GetInputBitmasks,
        C::GetCoreOptionsVersion => R::GetCoreOptionsVersion,
        C::SetCoreOptions => R::SetCoreOptions(option_definitions(data as *const ffi::CoreOptionDefinition)),
        C::SetCoreOptionsIntl => R::SetCoreOptionsIntl(
            read::<ffi::CoreOptionsIntl>(data).and_then(|intl| option_definitions(intl.us)),
        ),
        C::SetCoreOptionsDisplay => {
            let display = read::<ffi::CoreOptionDisplay>(data)?;
            R::SetCoreOptionsDisplay {
                key: str_ref(display.key)?,
                visible: display.visible,
            }
        }
        C::GetDiskControlInterfaceVersion => R::GetDiskControlInterfaceVersion,
        C::SetDiskControlExtInterface => R::SetDiskControlExtInterface { present: !data.is_null() },
        C::SetAudioBufferStatusCallback => R::SetAudioBufferStatusCallback {
            present: read::<ffi::AudioBufferStatusCallback>(data).map_or(false, |cb| cb.callback.is_some()),
        },
        C::SetContentInfoOverride => R::SetContentInfoOverride,
        C::SetVariable => R::SetVariable(
            read::<Variable>(data)
                .and_then(|var| Some((str_ref(var.key)?, str_ref(var.value).unwrap_or_default()))),
        ),
        C::GetThrottleState => R::GetThrottleState,
    };

    Some(request)
}

/// Function pointers carried by `cmd`, to be kept once the request succeeded.
///
/// # Safety
/// Same contract as [`decode`].
pub unsafe fn registration(cmd: EnvCommand, data: *mut c_void) -> Option<Registration> {
    match cmd {
        EnvCommand::SetFrameTimeCallback => {
            read::<ffi::FrameTimeCallback>(data).map(|cb| Registration::FrameTime(cb.callback))
        }
        EnvCommand::SetAudioBufferStatusCallback => Some(Registration::AudioBufferStatus(
            read::<ffi::AudioBufferStatusCallback>(data).and_then(|cb| cb.callback),
        )),
        EnvCommand::SetDiskControlInterface => read::<ffi::BasicDiskControlCallbacks>(data)
            .map(|basic| Registration::DiskControl(ffi::DiskControlCallbacks::from(basic))),
        EnvCommand::SetDiskControlExtInterface => {
            read::<ffi::DiskControlCallbacks>(data).map(|ext| Registration::DiskControl(*ext))
        }
        _ => None,
    }
}

/// Write `reply` through `data`, a null pointer drops the reply.
///
/// # Safety
/// `data` must be null or point to the output structure the libretro API defines for the request that produced
/// `reply`.
pub unsafe fn write_reply(reply: EnvReply<'_>, data: *mut c_void, cache: &mut ReplyCache) {
    if data.is_null() {
        return;
    }

    match reply {
        EnvReply::None => {}
        EnvReply::Bool(value) => *(data as *mut bool) = value,
        EnvReply::U32(value) => *(data as *mut c_uint) = value,
        EnvReply::F32(value) => *(data as *mut f32) = value,
        EnvReply::Path(path) => *(data as *mut *const c_char) = cache.path(path),
        EnvReply::Variable(value) => {
            let var = &mut *(data as *mut Variable);
            var.value = match (str_ref(var.key), value) {
                (Some(key), Some(value)) => cache.variable(key, value),
                _ => std::ptr::null(),
            };
        }
        EnvReply::Throttle(state) => {
            *(data as *mut ffi::ThrottleState) = ffi::ThrottleState {
                mode: state.mode as c_uint,
                rate: state.rate,
            }
        }
        EnvReply::RumbleInterface => {
            *(data as *mut ffi::RumbleInterface) = ffi::RumbleInterface {
                set_rumble_state: Some(callbacks::set_rumble_state),
            }
        }
        EnvReply::LogInterface => {
            *(data as *mut ffi::LogCallback) = ffi::LogCallback {
                log: Some(callbacks::log_printf),
            }
        }
    }
}

unsafe fn input_descriptors(data: *mut c_void) -> Option<Vec<InputDescriptor>> {
    let mut ptr = data as *const ffi::InputDescriptor;
    if ptr.is_null() {
        return None;
    }

    let mut result = Vec::new();
    while let Some(description) = owned((*ptr).description) {
        let raw = &*ptr;
        result.push(InputDescriptor {
            port: raw.port,
            device: raw.device,
            index: raw.index,
            id: raw.id,
            description,
        });
        ptr = ptr.add(1);
    }

    Some(result)
}

unsafe fn variables(data: *mut c_void) -> Option<Vec<(String, String)>> {
    let mut ptr = data as *const Variable;
    if ptr.is_null() {
        return None;
    }

    let mut result = Vec::new();
    while let Some(key) = owned((*ptr).key) {
        result.push((key, owned((*ptr).value).unwrap_or_default()));
        ptr = ptr.add(1);
    }

    Some(result)
}

/// Only port 0 matters.
unsafe fn controller_types(data: *mut c_void) -> Option<Vec<String>> {
    let info = read::<ffi::ControllerInfo>(data)?;
    if info.types.is_null() {
        return Some(Vec::new());
    }

    let types = std::slice::from_raw_parts(info.types, info.num_types as usize);
    Some(types.iter().filter_map(|ty| owned(ty.desc)).collect())
}

unsafe fn option_definitions(mut ptr: *const ffi::CoreOptionDefinition) -> Option<Vec<OptionDefinition>> {
    if ptr.is_null() {
        return None;
    }

    let mut result = Vec::new();
    while let Some(key) = owned((*ptr).key) {
        let raw = &*ptr;
        let values = raw
            .values
            .iter()
            .map_while(|value| Some((owned(value.value)?, owned(value.label))))
            .collect();

        result.push(OptionDefinition {
            key,
            desc: owned(raw.desc).unwrap_or_default(),
            info: owned(raw.info),
            values,
            default_value: owned(raw.default_value),
        });
        ptr = ptr.add(1);
    }

    Some(result)
}
