//! Dynamically loaded libretro core.
//!
//! The library is opened once, every entry point is resolved up front and kept as a plain function pointer next to
//! the [`Library`] that owns it.

use std::ffi::{c_uint, c_void, CStr, CString};
use std::path::Path;

use anyhow::Context;
use libloading::Library;
use minarch_core::environment::{AvInfo, Geometry, Timing};
use minarch_core::game::{parse_extensions, Game};
use minarch_core::persistence::{MemoryCore, MemoryKind, StateCore};

use ffi::{GameInfo, SystemAvInfo, SystemInfo};

pub mod callbacks;
pub mod environment;
pub mod ffi;

/// The entry points every core exports.
struct CoreApi {
    init: unsafe extern "C" fn(),
    deinit: unsafe extern "C" fn(),
    api_version: unsafe extern "C" fn() -> c_uint,
    get_system_info: unsafe extern "C" fn(info: *mut SystemInfo),
    get_system_av_info: unsafe extern "C" fn(info: *mut SystemAvInfo),
    set_environment: unsafe extern "C" fn(ffi::EnvironmentFn),
    set_video_refresh: unsafe extern "C" fn(ffi::VideoRefreshFn),
    set_audio_sample: unsafe extern "C" fn(ffi::AudioSampleFn),
    set_audio_sample_batch: unsafe extern "C" fn(ffi::AudioSampleBatchFn),
    set_input_poll: unsafe extern "C" fn(ffi::InputPollFn),
    set_input_state: unsafe extern "C" fn(ffi::InputStateFn),
    set_controller_port_device: unsafe extern "C" fn(port: c_uint, device: c_uint),
    reset: unsafe extern "C" fn(),
    run: unsafe extern "C" fn(),
    serialize_size: unsafe extern "C" fn() -> usize,
    serialize: unsafe extern "C" fn(data: *mut c_void, size: usize) -> bool,
    unserialize: unsafe extern "C" fn(data: *const c_void, size: usize) -> bool,
    load_game: unsafe extern "C" fn(game: *const GameInfo) -> bool,
    unload_game: unsafe extern "C" fn(),
    get_memory_data: unsafe extern "C" fn(id: c_uint) -> *mut c_void,
    get_memory_size: unsafe extern "C" fn(id: c_uint) -> usize,
}

/// What the core reports about itself before a game is loaded.
#[derive(Debug, Clone)]
pub struct CoreInfo {
    pub library_name: String,
    pub library_version: String,
    pub valid_extensions: Vec<String>,
    pub need_fullpath: bool,
}

pub struct Core {
    api: CoreApi,
    pub info: CoreInfo,
    /// Short name derived from the file name, e.g. `gambatte`.
    pub name: String,
    /// Path handed to `load_game`, the core may hold on to the pointer.
    game_path: Option<CString>,
    game_loaded: bool,
    // Dropped last, every pointer in `api` points into it.
    _library: Library,
}

macro_rules! symbol {
    ($lib:expr, $name:literal) => {
        *$lib
            .get(concat!($name, "\0").as_bytes())
            .with_context(|| format!("Core is missing `{}`", $name))?
    };
}

impl Core {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        // Safety: loading a core runs its initialisers, the core is trusted to be a well formed libretro library.
        let library = unsafe { Library::new(path) }.with_context(|| format!("Failed to open core {:?}", path))?;

        let api = unsafe {
            CoreApi {
                init: symbol!(library, "retro_init"),
                deinit: symbol!(library, "retro_deinit"),
                api_version: symbol!(library, "retro_api_version"),
                get_system_info: symbol!(library, "retro_get_system_info"),
                get_system_av_info: symbol!(library, "retro_get_system_av_info"),
                set_environment: symbol!(library, "retro_set_environment"),
                set_video_refresh: symbol!(library, "retro_set_video_refresh"),
                set_audio_sample: symbol!(library, "retro_set_audio_sample"),
                set_audio_sample_batch: symbol!(library, "retro_set_audio_sample_batch"),
                set_input_poll: symbol!(library, "retro_set_input_poll"),
                set_input_state: symbol!(library, "retro_set_input_state"),
                set_controller_port_device: symbol!(library, "retro_set_controller_port_device"),
                reset: symbol!(library, "retro_reset"),
                run: symbol!(library, "retro_run"),
                serialize_size: symbol!(library, "retro_serialize_size"),
                serialize: symbol!(library, "retro_serialize"),
                unserialize: symbol!(library, "retro_unserialize"),
                load_game: symbol!(library, "retro_load_game"),
                unload_game: symbol!(library, "retro_unload_game"),
                get_memory_data: symbol!(library, "retro_get_memory_data"),
                get_memory_size: symbol!(library, "retro_get_memory_size"),
            }
        };

        let info = unsafe { Self::read_system_info(&api) };
        let name = minarch_core::game::core_name(path);

        log::info!(
            "core: {} version: {} (valid_extensions: {:?} need_fullpath: {}) api: {}",
            info.library_name,
            info.library_version,
            info.valid_extensions,
            info.need_fullpath,
            unsafe { (api.api_version)() }
        );

        Ok(Self {
            api,
            info,
            name,
            game_path: None,
            game_loaded: false,
            _library: library,
        })
    }

    unsafe fn read_system_info(api: &CoreApi) -> CoreInfo {
        let mut raw: SystemInfo = std::mem::zeroed();
        (api.get_system_info)(&mut raw);

        CoreInfo {
            library_name: c_string(raw.library_name).unwrap_or_default(),
            library_version: c_string(raw.library_version).unwrap_or_default(),
            valid_extensions: c_string(raw.valid_extensions)
                .map(|exts| parse_extensions(&exts))
                .unwrap_or_default(),
            need_fullpath: raw.need_fullpath,
        }
    }

    /// Install the frontend callbacks, must happen before [`Core::init`].
    pub fn install_callbacks(&self) {
        unsafe {
            (self.api.set_environment)(callbacks::environment);
            (self.api.set_video_refresh)(callbacks::video_refresh);
            (self.api.set_audio_sample)(callbacks::audio_sample);
            (self.api.set_audio_sample_batch)(callbacks::audio_sample_batch);
            (self.api.set_input_poll)(callbacks::input_poll);
            (self.api.set_input_state)(callbacks::input_state);
        }
    }

    pub fn init(&self) {
        unsafe { (self.api.init)() }
    }

    pub fn deinit(&self) {
        unsafe { (self.api.deinit)() }
    }

    pub fn load_game(&mut self, game: &Game) -> anyhow::Result<()> {
        let path = CString::new(game.path.to_string_lossy().as_bytes()).context("Game path contains a NUL byte")?;
        let info = game_info(&path, game);

        let loaded = unsafe { (self.api.load_game)(&info) };
        self.game_path = Some(path);
        anyhow::ensure!(loaded, "Core failed to load {:?}", game.path);

        self.game_loaded = true;
        Ok(())
    }

    pub fn unload_game(&mut self) {
        if std::mem::take(&mut self.game_loaded) {
            unsafe { (self.api.unload_game)() }
        }
    }

    pub fn av_info(&self) -> AvInfo {
        let mut raw: SystemAvInfo = unsafe { std::mem::zeroed() };
        unsafe { (self.api.get_system_av_info)(&mut raw) };

        av_info_from_raw(&raw)
    }

    pub fn set_controller_port_device(&self, port: u32, device: u32) {
        unsafe { (self.api.set_controller_port_device)(port, device) }
    }

    pub fn reset(&self) {
        unsafe { (self.api.reset)() }
    }

    #[profiling::function]
    pub fn run(&self) {
        unsafe { (self.api.run)() }
    }
}

impl StateCore for Core {
    fn serialize_size(&mut self) -> usize {
        unsafe { (self.api.serialize_size)() }
    }

    fn serialize(&mut self, buffer: &mut [u8]) -> bool {
        unsafe { (self.api.serialize)(buffer.as_mut_ptr().cast(), buffer.len()) }
    }

    fn unserialize(&mut self, buffer: &[u8]) -> bool {
        unsafe { (self.api.unserialize)(buffer.as_ptr().cast(), buffer.len()) }
    }
}

impl MemoryCore for Core {
    fn memory_size(&mut self, kind: MemoryKind) -> usize {
        unsafe { (self.api.get_memory_size)(kind.as_raw()) }
    }

    fn memory_data(&mut self, kind: MemoryKind) -> Option<&mut [u8]> {
        let size = self.memory_size(kind);
        let data = unsafe { (self.api.get_memory_data)(kind.as_raw()) };
        if data.is_null() {
            return None;
        }

        // Safety: the core owns `size` bytes at `data` for as long as the game stays loaded.
        Some(unsafe { std::slice::from_raw_parts_mut(data.cast::<u8>(), size) })
    }
}

/// Describe `game` to the core, `path` must outlive any use of the result.
pub fn game_info(path: &CStr, game: &Game) -> GameInfo {
    GameInfo {
        path: path.as_ptr(),
        data: if game.data.is_empty() {
            std::ptr::null()
        } else {
            game.data.as_ptr().cast()
        },
        size: game.size(),
        meta: std::ptr::null(),
    }
}

pub fn av_info_from_raw(raw: &SystemAvInfo) -> AvInfo {
    AvInfo {
        geometry: geometry_from_raw(&raw.geometry),
        timing: Timing {
            fps: raw.timing.fps,
            sample_rate: raw.timing.sample_rate,
        },
    }
}

pub fn geometry_from_raw(raw: &ffi::GameGeometry) -> Geometry {
    Geometry {
        base_width: raw.base_width,
        base_height: raw.base_height,
        max_width: raw.max_width,
        max_height: raw.max_height,
        aspect_ratio: raw.aspect_ratio,
    }
}

/// Copy a C string, `None` for null pointers.
///
/// # Safety
/// `ptr` must be null or point to a NUL terminated string.
pub unsafe fn c_string(ptr: *const std::ffi::c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}
