//! One game session: startup, the frame loop and shutdown.
//!
//! Everything in here runs on the thread that installed the callback [`Host`], and never calls into the core while
//! holding the host borrow.

use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError};
use minarch_core::audio::Resampler;
use minarch_core::config::{Config, ConfigLevel, ConfigPaths, WriteScope};
use minarch_core::environment::Environment;
use minarch_core::game::{core_name, emu_tag, matches_extension, CoreDirs, Game, Roots};
use minarch_core::input::{retro, Controls, ShortcutAction, GAMEPAD_DEVICES};
use minarch_core::options::FrontendOptions;
use minarch_core::pacing::{
    frame_budget, resync_ratio, FastForwardLimiter, FpsCounter, FrameBudget, FramePacer, SramAutosave,
};
use minarch_core::pad::Button;
use minarch_core::persistence::{
    checksum, read_memory, read_state, resume_pointer_path, take_resume_slot, write_memory, write_resume_pointer,
    write_state, GamePaths, MemoryCore, MemoryKind, StateError, AUTO_RESUME_SLOT, HIDDEN_RESUME_SLOT,
};
use minarch_core::rate_meter::{RateMeter, AUDIO_SAMPLE_INTERVAL_SECS};
use minarch_core::ExitStatus;

use crate::audio::AudioOutput;
use crate::core::callbacks::{self, with_host, Host};
use crate::core::{self as retro_core, Core};
use crate::input::{InputState, KeyInput};
use crate::rendering::pipeline::{Look, ScreenOptions, VideoPipeline};
use crate::rendering::{Presenter, RgbaFrame};
use crate::runner::messages::EmulatorMessage;
use crate::settings::SharedSettings;

/// Sample rate assumed for resampling when no audio device could be opened.
const FALLBACK_OUTPUT_RATE: f64 = 48000.0;
/// Below this fill level (percent) the core is told an underrun is likely.
const UNDERRUN_LIKELY_PERCENT: u32 = 25;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub core_path: PathBuf,
    pub rom_path: PathBuf,
    pub resume: bool,
    pub slot: Option<u8>,
    pub screen: ScreenOptions,
    pub force_hdmi: bool,
    pub timeout: Option<Duration>,
    pub device: Option<String>,
    pub roots: Roots,
    pub resume_slot_file: PathBuf,
}

/// Start a session, run it until something ends it and shut it down again.
pub fn run_session(
    options: SessionOptions,
    settings: Arc<SharedSettings>,
    presenter: &mut impl Presenter,
    messages: &Receiver<EmulatorMessage>,
) -> anyhow::Result<ExitStatus> {
    let mut session = Session::start(options, settings)?;
    let status = session.run(presenter, messages);
    session.shutdown();

    Ok(status)
}

pub struct Session {
    core: Core,
    game: Game,
    /// Keeps the path of a swapped-in disc alive for the core.
    disc_path: Option<CString>,
    paths: GamePaths,
    resume_pointer: PathBuf,
    config: Config,
    frontend: FrontendOptions,
    gamepad_type: usize,
    slot: u8,

    settings: Arc<SharedSettings>,
    audio: Option<AudioOutput>,
    resampler: Resampler,
    pipeline: VideoPipeline,
    canvas: RgbaFrame,
    force_hdmi: bool,

    pacer: FramePacer,
    pacer_hz: f64,
    ff_limiter: FastForwardLimiter,
    display_meter: RateMeter,
    audio_meter: RateMeter,
    fps: FpsCounter,
    hud: Option<String>,
    sram: SramAutosave,

    timeout: Option<Duration>,
    started: Instant,
    last_present: Option<Instant>,
    last_audio_sample: Instant,
    audio_frames: u64,
    last_underrun_check: Instant,
    force_rescale: bool,
    skip_present: bool,
}

impl Session {
    pub fn start(options: SessionOptions, settings: Arc<SharedSettings>) -> anyhow::Result<Self> {
        let mut core = Core::open(&options.core_path)?;

        let tag = emu_tag(&options.rom_path);
        let dirs = CoreDirs::new(&options.roots, &tag, &core_name(&options.core_path));
        dirs.create_all()
            .with_context(|| format!("Failed to create the directories for {}", tag))?;

        let game = Game::open(&options.rom_path, core.info.need_fullpath).context("Failed to open the game")?;
        if !core.info.valid_extensions.is_empty() && !matches_extension(&game.rom_path, &core.info.valid_extensions) {
            log::warn!(
                "{:?} does not match the extensions {} supports ({})",
                game.rom_path,
                core.info.library_name,
                core.info.valid_extensions.join("|")
            );
        }

        let config = Config::load(ConfigPaths {
            system_dir: options.roots.system.clone(),
            emu_dir: dirs.emu_dir.clone(),
            config_dir: dirs.config_dir.clone(),
            game_name: game.name.clone(),
            device: options.device.clone(),
        })
        .context("Failed to read the config cascade")?;
        log::info!("{}", config.loaded().description());

        let mut frontend = FrontendOptions::new();
        config.apply_options(&mut frontend.list);

        let mut env = Environment::new(dirs.bios_dir.clone(), dirs.saves_dir.clone());
        env.max_ff_speed = frontend.max_ff_speed();
        let controls = config.core_controls().map(Controls::with_controls).unwrap_or_default();

        callbacks::install(Host::new(env, InputState::new(controls)), &core.name);
        core.install_callbacks();
        core.init();

        if let Err(e) = core.load_game(&game) {
            core.deinit();
            callbacks::uninstall();
            return Err(e);
        }

        let paths = GamePaths::new(&dirs.saves_dir, &dirs.states_dir, game.name.clone());
        for kind in [MemoryKind::SaveRam, MemoryKind::Rtc] {
            read_memory_file(&mut core, &paths, kind);
        }

        let av_info = core.av_info();
        log::info!(
            "AV info: {}x{} (max {}x{}) at {:.2} fps, {:.0} Hz audio",
            av_info.geometry.base_width,
            av_info.geometry.base_height,
            av_info.geometry.max_width,
            av_info.geometry.max_height,
            av_info.timing.fps,
            av_info.timing.sample_rate
        );
        with_host(|host| host.env.video.apply_av_info(&av_info));

        let has_custom_controllers = with_host(|host| host.env.has_custom_controllers).unwrap_or(false);
        let gamepad_type = config
            .gamepad_type()
            .filter(|&index| has_custom_controllers && index < GAMEPAD_DEVICES.len())
            .unwrap_or(0);
        core.set_controller_port_device(0, GAMEPAD_DEVICES.get(gamepad_type).copied().unwrap_or(retro::DEVICE_JOYPAD));

        with_host(|host| {
            config.apply_options(&mut host.env.core_options);
            if let Some(descriptors) = &host.env.input_descriptors {
                host.input.controls.apply_descriptors(descriptors);
            }
            config.apply_controls(&mut host.input.controls);
        });

        let audio = match AudioOutput::open(settings.clone()) {
            Ok(audio) => Some(audio),
            Err(e) => {
                log::warn!("Continuing without audio: {:#}", e);
                None
            }
        };
        let output_rate = audio.as_ref().map_or(FALLBACK_OUTPUT_RATE, |a| a.sample_rate() as f64);
        let resampler = Resampler::new(av_info.timing.sample_rate, output_rate);

        let now = Instant::now();
        let mut session = Self {
            resume_pointer: resume_pointer_path(&options.roots.userdata, &tag, &game.rom_path),
            core,
            game,
            disc_path: None,
            paths,
            config,
            frontend,
            gamepad_type,
            slot: 0,
            settings,
            audio,
            resampler,
            pipeline: VideoPipeline::new(options.screen),
            canvas: RgbaFrame::default(),
            force_hdmi: options.force_hdmi,
            pacer: FramePacer::new(av_info.timing.fps, av_info.timing.fps),
            pacer_hz: av_info.timing.fps,
            ff_limiter: FastForwardLimiter::new(),
            display_meter: RateMeter::display(),
            audio_meter: RateMeter::audio(),
            fps: FpsCounter::new(now),
            hud: None,
            sram: SramAutosave::new(0),
            timeout: options.timeout,
            started: now,
            last_present: None,
            last_audio_sample: now,
            audio_frames: 0,
            last_underrun_check: now,
            force_rescale: true,
            skip_present: false,
        };

        let requested = options
            .slot
            .or(options.resume.then_some(AUTO_RESUME_SLOT))
            .or_else(|| take_resume_slot(&options.resume_slot_file));
        if let Some(slot) = requested {
            if slot < HIDDEN_RESUME_SLOT {
                session.slot = slot;
            }
            session.load_state(slot);
        }

        let sram = session.sram_checksum();
        session.sram = SramAutosave::new(sram);

        Ok(session)
    }

    /// Run frames until a quit request, a shortcut, the timeout or a display failure ends the session.
    pub fn run(&mut self, presenter: &mut impl Presenter, messages: &Receiver<EmulatorMessage>) -> ExitStatus {
        loop {
            profiling::scope!("Session Frame");
            let frame_start = Instant::now();

            if let Some(status) = self.handle_messages(messages) {
                break status;
            }
            if self.timeout.map_or(false, |timeout| self.started.elapsed() >= timeout) {
                log::info!("Timed out after {:?}", self.started.elapsed());
                break ExitStatus::Timeout;
            }

            self.refresh_av_info();
            self.update_pacer(presenter.is_paced());

            let fast_forward = with_host(|host| host.env.fast_forward).unwrap_or(false);
            let run = !presenter.is_paced() || fast_forward || self.pacer.step();

            if run {
                self.run_core(fast_forward);

                if let Some(status) = self.handle_input(presenter, messages) {
                    break status;
                }
                self.count_frame(frame_start);
            }

            if let Err(e) = self.present(presenter, fast_forward) {
                break match messages.try_recv() {
                    Ok(EmulatorMessage::Quit(status)) => status,
                    _ => {
                        log::error!("Stopping: {:#}", e);
                        ExitStatus::Cancel
                    }
                };
            }

            self.sample_audio_rate(fast_forward);
            self.autosave_sram(Instant::now());
            self.wait_for_next_frame(presenter.is_paced(), fast_forward, frame_start);
        }
    }

    /// Persist everything and release the core.
    pub fn shutdown(mut self) {
        log::info!("Shutting down {}", self.game.name);

        self.save_state(AUTO_RESUME_SLOT);
        self.write_memory_files();
        if let Err(e) = write_resume_pointer(&self.resume_pointer, &self.game.rom_path) {
            log::warn!("Could not write resume pointer {:?}: {}", self.resume_pointer, e);
        }

        self.core.unload_game();
        self.core.deinit();
        callbacks::uninstall();

        drop(self.audio.take());
        if let Err(e) = self.settings.persist() {
            log::warn!("Could not persist settings: {:#}", e);
        }
    }

    fn handle_messages(&mut self, messages: &Receiver<EmulatorMessage>) -> Option<ExitStatus> {
        loop {
            match messages.try_recv() {
                Ok(EmulatorMessage::Quit(status)) => return Some(status),
                Ok(EmulatorMessage::Key(key)) => {
                    with_host(|host| host.input.queue(key));
                }
                Ok(EmulatorMessage::ChangeDisc(path)) => self.change_disc(&path),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(ExitStatus::Cancel),
            }
        }
    }

    fn refresh_av_info(&mut self) {
        let changed = with_host(|host| host.env.video.take_av_info_changed()).unwrap_or(false);
        if changed {
            let av_info = self.core.av_info();
            log::debug!("Re-queried AV info: {:?}", av_info);
            with_host(|host| host.env.video.apply_av_info(&av_info));
            self.pacer = FramePacer::new(av_info.timing.fps, self.pacer_hz);
        }

        if let Some((old, new, fps)) = with_host(|host| host.env.take_audio_reinit()).flatten() {
            self.resampler.reinit(old, new, fps);
            if let Some(audio) = &self.audio {
                audio.clear();
            }
        }

        let rescale = with_host(|host| {
            let video = &mut host.env.video;
            video.take_needs_rescale() | video.take_geometry_changed()
        });
        self.force_rescale |= rescale.unwrap_or(false);
    }

    /// Rebuild the pacer once the display rate settles somewhere new.
    fn update_pacer(&mut self, paced: bool) {
        if !paced || !self.display_meter.is_stable() {
            return;
        }

        let hz = self.display_meter.rate();
        if (hz - self.pacer_hz).abs() > 0.5 {
            let fps = self.core_fps();
            self.pacer = FramePacer::new(fps, hz);
            self.pacer_hz = hz;
            log::info!(
                "Display locked at {:.2} Hz, core at {:.2} fps ({})",
                hz,
                fps,
                if self.pacer.is_direct() { "direct" } else { "paced" }
            );
        }
    }

    fn core_fps(&self) -> f64 {
        with_host(|host| host.env.video.fps).unwrap_or(0.0)
    }

    fn run_core(&mut self, fast_forward: bool) {
        let now_us = self.started.elapsed().as_micros() as i64 + 1;
        let (frame_time, buffer_status) = with_host(|host| {
            let delta = host.env.frame_time.as_mut().map(|frame_time| frame_time.delta(now_us));
            (host.frame_time.zip(delta), host.audio_buffer_status)
        })
        .unwrap_or_default();

        // Safety: both were registered by the core for exactly this use.
        if let Some((callback, delta)) = frame_time {
            unsafe { callback(delta) };
        }
        if let Some(callback) = buffer_status {
            let occupancy = self.audio.as_ref().map_or(0, |audio| audio.occupancy());
            unsafe { callback(self.audio.is_some(), occupancy, occupancy < UNDERRUN_LIKELY_PERCENT) };
        }

        self.core.run();

        // Cores that never poll still need the shortcuts and the menu to work.
        with_host(|host| {
            if !host.input.take_polled() {
                let now = host.ticks();
                host.input.poll(now);
                host.input.take_polled();
            }
        });

        self.drain_audio(fast_forward);
    }

    fn drain_audio(&mut self, fast_forward: bool) {
        let Some(mut samples) = with_host(|host| std::mem::take(&mut host.audio)) else {
            return;
        };

        if !fast_forward {
            if let Some(audio) = &self.audio {
                self.resampler.process(&samples, |frame| {
                    audio.push(frame);
                });
            }
        }

        samples.clear();
        with_host(|host| host.audio = samples);
    }

    fn handle_input(
        &mut self,
        presenter: &mut impl Presenter,
        messages: &Receiver<EmulatorMessage>,
    ) -> Option<ExitStatus> {
        let (menu, actions, power) = with_host(|host| {
            (
                host.input.take_menu_tapped(),
                host.input.take_actions(),
                host.input.pad.just_pressed(Button::Power),
            )
        })?;

        if menu {
            log::info!("Menu tapped, handing back to the launcher");
            return Some(ExitStatus::Menu);
        }

        for action in actions {
            log::debug!("Shortcut: {:?}", action);
            match action {
                ShortcutAction::SaveState => self.save_state(self.slot),
                ShortcutAction::LoadState => self.load_state(self.slot),
                ShortcutAction::ResetGame => self.core.reset(),
                ShortcutAction::SaveQuit => return Some(ExitStatus::Success),
                ShortcutAction::CycleScaling => {
                    self.frontend.set_scaling(self.frontend.scaling().next());
                    log::info!("Scaling: {:?}", self.frontend.scaling());
                    self.force_rescale = true;
                    self.save_config();
                }
                ShortcutAction::CycleEffect => {
                    self.frontend.set_effect(self.frontend.effect().next());
                    log::info!("Effect: {:?}", self.frontend.effect());
                    self.force_rescale = true;
                    self.save_config();
                }
                ShortcutAction::SetFastForward(active) => {
                    with_host(|host| host.env.fast_forward = active);
                    log::debug!("Fast forward: {}", active);
                }
            }
        }

        if power {
            return self.suspend(presenter, messages);
        }

        None
    }

    /// Stop running the core until the power button is pressed again.
    fn suspend(&mut self, presenter: &mut impl Presenter, messages: &Receiver<EmulatorMessage>) -> Option<ExitStatus> {
        log::info!("Suspending");
        self.save_state(AUTO_RESUME_SLOT);
        self.write_memory_files();

        // Non-blocking, the display may already be gone.
        let mut blank = self.canvas.blanked();
        if let Err(e) = presenter.present(&mut blank, true) {
            log::debug!("Could not blank the display: {:#}", e);
        }
        if let Some(audio) = &mut self.audio {
            if let Err(e) = audio.pause() {
                log::warn!("{:#}", e);
            }
        }

        loop {
            if self.timeout.map_or(false, |timeout| self.started.elapsed() >= timeout) {
                return Some(ExitStatus::Timeout);
            }

            match messages.recv_timeout(Duration::from_millis(100)) {
                Ok(EmulatorMessage::Quit(status)) => return Some(status),
                Ok(EmulatorMessage::Key(KeyInput::Button(Button::Power, true))) => break,
                Ok(EmulatorMessage::Key(key)) => {
                    with_host(|host| host.input.queue(key));
                }
                Ok(EmulatorMessage::ChangeDisc(path)) => self.change_disc(&path),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Some(ExitStatus::Cancel),
            }
        }

        log::info!("Waking up");
        with_host(|host| host.input.pad.reset());
        self.pacer.reset();
        self.display_meter.reset();
        self.audio_meter.reset();
        self.last_present = None;
        self.last_audio_sample = Instant::now();
        if let Some(audio) = &mut self.audio {
            if let Err(e) = audio.resume() {
                log::warn!("{:#}", e);
            }
        }
        None
    }

    fn count_frame(&mut self, frame_start: Instant) {
        if !self.frontend.debug_hud() {
            self.hud = None;
            return;
        }

        if let Some(fps) = self.fps.tick(frame_start) {
            let result = self.pipeline.result();
            self.hud = Some(format!(
                "{:.1}/{:.2} fps | {}x{} -> {}x{} | {:?}",
                fps,
                self.core_fps(),
                result.true_w,
                result.true_h,
                result.dst_w,
                result.dst_h,
                self.frontend.scaling()
            ));
        }
    }

    #[profiling::function]
    fn present(&mut self, presenter: &mut impl Presenter, fast_forward: bool) -> anyhow::Result<()> {
        let look = Look {
            mode: self.frontend.scaling(),
            sharpness: self.frontend.sharpness(),
            effect: self.frontend.effect(),
        };
        let hdmi = (self.force_hdmi || self.settings.block().has_hdmi()).then_some(true);
        let force_rescale = std::mem::take(&mut self.force_rescale);

        let drawn = with_host(|host| {
            host.frame.take_fresh();
            self.pipeline
                .process(&host.frame, &host.env.video, look, hdmi, force_rescale, &mut self.canvas)
        })
        .unwrap_or(false);

        if !drawn || std::mem::take(&mut self.skip_present) {
            return Ok(());
        }

        self.canvas.title = self.hud.clone();
        presenter.present(&mut self.canvas, fast_forward)?;

        let now = Instant::now();
        if let Some(last) = self.last_present.replace(now) {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            if elapsed > 0.0 && presenter.is_paced() && !fast_forward {
                self.display_meter.add_sample(1.0 / elapsed);
            }
        }

        Ok(())
    }

    fn sample_audio_rate(&mut self, fast_forward: bool) {
        let Some(audio) = &self.audio else {
            return;
        };

        let now = Instant::now();
        self.audio_frames += audio.stats().take_played();

        let elapsed = now.saturating_duration_since(self.last_audio_sample).as_secs_f64();
        if elapsed >= AUDIO_SAMPLE_INTERVAL_SECS {
            self.audio_meter.add_sample(self.audio_frames as f64 / elapsed);
            self.audio_frames = 0;
            self.last_audio_sample = now;
        }

        if now.saturating_duration_since(self.last_underrun_check) >= Duration::from_secs(1) {
            let underruns = audio.stats().take_underruns();
            if underruns > 0 && !fast_forward {
                log::debug!("Audio underruns in the last second: {}", underruns);
            }
            self.last_underrun_check = now;
        }

        let ratio = if self.display_meter.is_stable() && self.audio_meter.is_stable() {
            resync_ratio(self.display_meter.rate(), self.core_fps(), fast_forward)
        } else {
            1.0
        };
        self.resampler.set_ratio(ratio);
    }

    fn wait_for_next_frame(&mut self, paced: bool, fast_forward: bool, frame_start: Instant) {
        if fast_forward {
            let now_us = self.started.elapsed().as_micros() as u64;
            let max_ff = self.frontend.max_ff_speed();
            if let Some(delay) = self.ff_limiter.delay(now_us, self.core_fps(), true, max_ff) {
                spin_sleep::sleep(delay);
            }
            return;
        }

        let now_us = self.started.elapsed().as_micros() as u64;
        self.ff_limiter.delay(now_us, self.core_fps(), false, 0);

        // The presenter already blocked on the display, unless nothing was shown yet.
        if paced && self.last_present.is_some() {
            return;
        }

        match frame_budget(self.core_fps(), frame_start.elapsed()) {
            FrameBudget::Sleep(remaining) => spin_sleep::sleep(remaining),
            FrameBudget::Late => self.skip_present = !paced,
        }
    }

    fn autosave_sram(&mut self, now: Instant) {
        let sum = self.sram_checksum();
        if self.sram.update(sum, now) {
            log::debug!("Flushing SRAM");
            self.write_memory_files();
        }
    }

    fn sram_checksum(&mut self) -> u64 {
        self.core.memory_data(MemoryKind::SaveRam).map_or(0, |data| checksum(data))
    }

    fn write_memory_files(&mut self) {
        for kind in [MemoryKind::SaveRam, MemoryKind::Rtc] {
            let Some(path) = self.paths.memory_path(kind) else {
                continue;
            };

            match write_memory(&mut self.core, kind, &path) {
                Ok(written) => log::trace!("Wrote {} bytes of {:?} to {:?}", written, kind, path),
                Err(e) if e.is_benign() => {}
                Err(e) => log::error!("Could not write {:?} to {:?}: {}", kind, path, e),
            }
        }

        let sum = self.sram_checksum();
        self.sram.mark_written(sum);
    }

    fn save_state(&mut self, slot: u8) {
        let path = self.paths.state_path(slot);
        match write_state(&mut self.core, &path) {
            Ok(size) => log::info!("Saved slot {} ({} bytes)", slot, size),
            Err(StateError::NoSupport) => log::debug!("Core has no save states, not saving slot {}", slot),
            Err(e) => log::error!("Save failed for slot {}: {}", slot, e),
        }
    }

    fn load_state(&mut self, slot: u8) {
        let path = self.paths.state_path(slot);
        match read_state(&mut self.core, &path) {
            Ok(read) if read.is_short() => log::warn!(
                "Slot {} is short, loaded {} of {} bytes",
                slot,
                read.read,
                read.expected
            ),
            Ok(read) => log::info!("Loaded slot {} ({} bytes)", slot, read.read),
            Err(StateError::FileNotFound) if slot == HIDDEN_RESUME_SLOT => {
                log::debug!("No hidden resume state to load")
            }
            Err(e) => log::warn!("Could not resume from slot {}: {}", slot, e),
        }
    }

    fn save_config(&mut self) {
        let scope = match self.config.loaded() {
            ConfigLevel::Game => WriteScope::Game,
            _ => WriteScope::Console,
        };
        let gamepad_type = with_host(|host| host.env.has_custom_controllers)
            .unwrap_or(false)
            .then_some(self.gamepad_type);

        let result = with_host(|host| {
            self.config.write(
                scope,
                &self.frontend.list,
                &host.env.core_options,
                gamepad_type,
                &host.input.controls,
            )
        });

        if let Some(Err(e)) = result {
            log::error!("Could not save config: {}", e);
        }
    }

    /// Insert another disc through the core's disk control interface.
    fn change_disc(&mut self, path: &Path) {
        let Some(disk) = with_host(|host| host.disk_control).flatten() else {
            log::warn!("Core has no disk control interface, ignoring {:?}", path);
            return;
        };

        match self.game.change_disc(path, self.core.info.need_fullpath) {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                log::error!("Could not change disc: {}", e);
                return;
            }
        }

        let disc_path = match CString::new(self.game.path.to_string_lossy().as_bytes()) {
            Ok(disc_path) => disc_path,
            Err(e) => {
                log::error!("Disc path is not representable: {}", e);
                return;
            }
        };
        let info = retro_core::game_info(&disc_path, &self.game);

        // Safety: the table came from the core, `info` points into `self.game` and `disc_path` which outlive the call.
        unsafe {
            if let Some(set_eject_state) = disk.set_eject_state {
                set_eject_state(true);
            }
            match disk.replace_image_index {
                Some(replace_image_index) if replace_image_index(0, &info) => {}
                _ => log::warn!("Core refused disc {:?}", path),
            }
            if let Some(set_eject_state) = disk.set_eject_state {
                set_eject_state(false);
            }
        }

        self.disc_path = Some(disc_path);
    }
}

fn read_memory_file(core: &mut Core, paths: &GamePaths, kind: MemoryKind) {
    let Some(path) = paths.memory_path(kind) else {
        return;
    };

    match read_memory(core, kind, &path) {
        Ok(read) => log::info!("Loaded {:?} from {:?} ({} bytes)", kind, path, read),
        Err(e) if e.is_benign() => log::debug!("No {:?} loaded: {}", kind, e),
        Err(e) => log::warn!("Could not load {:?} from {:?}: {}", kind, path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(timeout: Option<Duration>) -> SessionOptions {
        SessionOptions {
            core_path: PathBuf::from("/nonexistent/fake_libretro.so"),
            rom_path: PathBuf::from("/nonexistent/Roms/Game Boy (GB)/game.gb"),
            resume: false,
            slot: None,
            screen: ScreenOptions {
                width: 640,
                height: 480,
                fit: true,
                buffer_width: 960,
                buffer_height: 720,
                hdmi_width: 1280,
            },
            force_hdmi: false,
            timeout,
            device: None,
            roots: Roots::default(),
            resume_slot_file: PathBuf::from("/nonexistent/resume_slot.txt"),
        }
    }

    #[test]
    fn test_missing_core_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let settings =
            Arc::new(SharedSettings::open(&dir.path().join("s.shm"), &dir.path().join("s.bin")).unwrap());

        let result = Session::start(options(None), settings);
        assert!(result.is_err());
        // Nothing was installed for the callbacks.
        assert!(callbacks::uninstall().is_none());
    }
}
