//! The `extern "C"` functions handed to the core.
//!
//! libretro callbacks carry no user pointer, so the state they touch lives in a thread local [`Host`] owned by the
//! runner thread. The runner must never hold the borrow while calling into the core.

use std::cell::RefCell;
use std::ffi::{c_char, c_uint, c_void, CStr};
use std::time::Instant;

use minarch_core::environment::{EnvCommand, Environment};
use once_cell::sync::OnceCell;

use super::environment::{self, Registration, ReplyCache};
use super::ffi;
use crate::input::InputState;

thread_local! {
    static HOST: RefCell<Option<Host>> = RefCell::new(None);
}

static CORE_NAME: OnceCell<String> = OnceCell::new();

/// Last frame the core produced, kept in its native format.
#[derive(Debug, Default)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pitch: usize,
    /// A new frame arrived since the last [`RawFrame::take_fresh`].
    fresh: bool,
}

impl RawFrame {
    fn store(&mut self, data: &[u8], width: u32, height: u32, pitch: usize) {
        self.data.clear();
        self.data.extend_from_slice(data);
        self.width = width;
        self.height = height;
        self.pitch = pitch;
        self.fresh = true;
    }

    pub fn take_fresh(&mut self) -> bool {
        std::mem::take(&mut self.fresh)
    }
}

pub struct Host {
    pub env: Environment,
    pub input: InputState,
    pub frame: RawFrame,
    /// Interleaved stereo samples produced during the current `run`.
    pub audio: Vec<i16>,
    pub frame_time: Option<ffi::FrameTimeFn>,
    pub audio_buffer_status: Option<ffi::AudioBufferStatusFn>,
    pub disk_control: Option<ffi::DiskControlCallbacks>,
    replies: ReplyCache,
    epoch: Instant,
}

impl Host {
    pub fn new(env: Environment, input: InputState) -> Self {
        Self {
            env,
            input,
            frame: RawFrame::default(),
            audio: Vec::with_capacity(4096),
            frame_time: None,
            audio_buffer_status: None,
            disk_control: None,
            replies: ReplyCache::default(),
            epoch: Instant::now(),
        }
    }

    /// Milliseconds since the host was created, the pad's clock.
    pub fn ticks(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    fn register(&mut self, registration: Registration) {
        match registration {
            Registration::FrameTime(callback) => self.frame_time = callback,
            Registration::AudioBufferStatus(callback) => self.audio_buffer_status = callback,
            Registration::DiskControl(table) => self.disk_control = Some(table),
        }
    }
}

/// Make `host` the state behind the callbacks of this thread.
pub fn install(host: Host, core_name: &str) {
    let _ = CORE_NAME.set(core_name.to_string());
    HOST.with(|cell| *cell.borrow_mut() = Some(host));
}

pub fn uninstall() -> Option<Host> {
    HOST.with(|cell| cell.borrow_mut().take())
}

/// Run `f` against the installed host, `None` when there is none or it is already borrowed.
pub fn with_host<R>(f: impl FnOnce(&mut Host) -> R) -> Option<R> {
    HOST.with(|cell| match cell.try_borrow_mut() {
        Ok(mut host) => host.as_mut().map(f),
        Err(_) => {
            log::error!("Host state re-entered from a core callback");
            None
        }
    })
}

pub unsafe extern "C" fn environment(cmd: c_uint, data: *mut c_void) -> bool {
    let Some(command) = EnvCommand::from_raw(cmd) else {
        log::trace!("Unsupported environment request: {}", cmd);
        return false;
    };

    if data.is_null() && command.requires_output() {
        return false;
    }

    let Some(request) = environment::decode(command, data) else {
        return false;
    };

    with_host(|host| {
        let response = host.env.dispatch(request);
        let success = response.result.success;
        environment::write_reply(response.reply, data, &mut host.replies);

        if success {
            if let Some(registration) = environment::registration(command, data) {
                host.register(registration);
            }
        }

        success
    })
    .unwrap_or(false)
}

pub unsafe extern "C" fn video_refresh(data: *const c_void, width: c_uint, height: c_uint, pitch: usize) {
    // A null frame repeats the previous one.
    if data.is_null() || width == 0 || height == 0 {
        return;
    }

    with_host(|host| {
        // Only the visible part of the last row is guaranteed to be readable.
        let row_bytes = width as usize * host.env.video.pixel_format.bytes_per_pixel();
        let len = pitch * (height as usize - 1) + row_bytes;
        let bytes = std::slice::from_raw_parts(data.cast::<u8>(), len);
        host.frame.store(bytes, width, height, pitch)
    });
}

pub unsafe extern "C" fn audio_sample(left: i16, right: i16) {
    with_host(|host| host.audio.extend_from_slice(&[left, right]));
}

pub unsafe extern "C" fn audio_sample_batch(data: *const i16, frames: usize) -> usize {
    if data.is_null() {
        return 0;
    }

    let samples = std::slice::from_raw_parts(data, frames * 2);
    with_host(|host| host.audio.extend_from_slice(samples));
    frames
}

pub unsafe extern "C" fn input_poll() {
    with_host(|host| {
        let now = host.ticks();
        host.input.poll(now)
    });
}

pub unsafe extern "C" fn input_state(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16 {
    with_host(|host| host.input.state(port, device, index, id)).unwrap_or(0)
}

pub unsafe extern "C" fn set_rumble_state(port: c_uint, effect: c_uint, strength: u16) -> bool {
    log::trace!("Rumble - port: {} effect: {} strength: {}", port, effect, strength);
    true
}

pub unsafe extern "C" fn log_printf(level: c_uint, fmt: *const c_char) {
    if fmt.is_null() {
        return;
    }

    let message = CStr::from_ptr(fmt).to_string_lossy();
    let message = message.trim_end();
    let name = CORE_NAME.get().map_or("core", String::as_str);

    match level {
        ffi::LOG_DEBUG => log::debug!("[{}] {}", name, message),
        ffi::LOG_INFO => log::info!("[{}] {}", name, message),
        ffi::LOG_WARN => log::warn!("[{}] {}", name, message),
        _ => log::error!("[{}] {}", name, message),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use minarch_core::input::Controls;

    use super::*;

    fn install_test_host() {
        let env = Environment::new(PathBuf::from("/bios"), PathBuf::from("/saves"));
        install(Host::new(env, InputState::new(Controls::default())), "test");
    }

    #[test]
    fn test_environment_round_trip() {
        install_test_host();

        let mut format: c_uint = 2;
        let handled = unsafe { environment(10, (&mut format as *mut c_uint).cast()) };
        assert!(handled);

        let mut dupe = false;
        assert!(unsafe { environment(3, (&mut dupe as *mut bool).cast()) });
        assert!(dupe);

        // Unknown requests and output-less queries are refused.
        assert!(!unsafe { environment(4, std::ptr::null_mut()) });
        assert!(!unsafe { environment(49, std::ptr::null_mut()) });

        let host = uninstall().unwrap();
        assert_eq!(host.env.video.pixel_format, minarch_core::convert::PixelFormat::Rgb565);
    }

    #[test]
    fn test_frame_time_registration() {
        unsafe extern "C" fn on_frame(_usec: i64) {}

        install_test_host();

        let mut callback = ffi::FrameTimeCallback {
            callback: Some(on_frame),
            reference: 16_667,
        };
        assert!(unsafe { environment(21, (&mut callback as *mut ffi::FrameTimeCallback).cast()) });

        let host = uninstall().unwrap();
        assert!(host.frame_time.is_some());
        assert_eq!(host.env.frame_time.map(|ft| ft.reference), Some(16_667));
    }

    #[test]
    fn test_video_and_audio_capture() {
        install_test_host();

        let pixels = [0xFFu8; 8 * 2];
        unsafe {
            video_refresh(pixels.as_ptr().cast(), 4, 2, 8);
            video_refresh(std::ptr::null(), 4, 2, 8);
            audio_sample(1, 2);
        }
        let batch = [3i16, 4, 5, 6];
        assert_eq!(unsafe { audio_sample_batch(batch.as_ptr(), 2) }, 2);

        let mut host = uninstall().unwrap();
        assert!(host.frame.take_fresh());
        assert_eq!((host.frame.width, host.frame.height, host.frame.pitch), (4, 2, 8));
        assert_eq!(host.audio, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_padded_pitch_with_tight_last_row() {
        install_test_host();
        let mut format: c_uint = 2;
        assert!(unsafe { environment(10, (&mut format as *mut c_uint).cast()) });

        // 4x2 RGB565 with a 16 byte pitch, the allocation ends right after the last visible pixel.
        let mut pixels = vec![0u8; 16 + 4 * 2];
        pixels[16..].fill(0xAB);
        unsafe {
            video_refresh(pixels.as_ptr().cast(), 4, 2, 16);
            video_refresh(pixels.as_ptr().cast(), 4, 0, 16);
        }

        let mut host = uninstall().unwrap();
        assert!(host.frame.take_fresh());
        assert_eq!(host.frame.data.len(), 24);
        assert_eq!(&host.frame.data[16..], &[0xAB; 8]);

        let mut converter = minarch_core::convert::PixelConverter::new();
        let frame = converter
            .convert(host.env.video.pixel_format, &host.frame.data, 4, 2, 16)
            .unwrap();
        assert_eq!(frame.pixel(3, 1), 0xABAB);
    }

    #[test]
    fn test_callbacks_without_host() {
        assert_eq!(unsafe { input_state(0, 1, 0, 0) }, 0);
        assert!(!unsafe { environment(3, std::ptr::null_mut()) });
    }
}
