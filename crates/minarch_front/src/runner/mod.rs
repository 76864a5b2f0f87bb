use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{unbounded, Sender};
use minarch_core::ExitStatus;
use winit::event::KeyboardInput;

use crate::input::keyboard_to_input;
use crate::rendering::{ExchangePresenter, RgbaFrame};
use crate::runner::frame_exchanger::ExchangerReceiver;
use crate::runner::messages::EmulatorMessage;
use crate::runner::session::SessionOptions;
use crate::settings::SharedSettings;

pub mod frame_exchanger;
pub mod messages;
pub mod session;

pub struct EmulatorRunner {
    options: SessionOptions,
    settings: Arc<SharedSettings>,
}

impl EmulatorRunner {
    pub fn new(options: SessionOptions, settings: Arc<SharedSettings>) -> Self {
        Self { options, settings }
    }

    pub fn run(self) -> RunnerHandle {
        let (request_sender, request_receiver) = unbounded::<EmulatorMessage>();
        let (frame_sender, frame_receiver) = frame_exchanger::exchangers(RgbaFrame::default());

        let emu_thread = std::thread::spawn(move || {
            profiling::register_thread!("Emulator Thread");

            let mut presenter = ExchangePresenter::new(frame_sender);
            session::run_session(self.options, self.settings, &mut presenter, &request_receiver)
        });

        RunnerHandle {
            current_thread: emu_thread,
            frame_receiver,
            request_sender,
        }
    }
}

pub struct RunnerHandle {
    current_thread: JoinHandle<anyhow::Result<ExitStatus>>,
    pub frame_receiver: ExchangerReceiver<RgbaFrame>,
    pub request_sender: Sender<EmulatorMessage>,
}

impl RunnerHandle {
    /// Inform the emulator of a keypress event.
    pub fn handle_input(&self, input: KeyboardInput) {
        let Some(key) = keyboard_to_input(input) else {
            return;
        };

        log::trace!("Sending input: {:?}", key);
        let _ = self.request_sender.send(EmulatorMessage::Key(key));
    }

    pub fn change_disc(&self, path: PathBuf) {
        log::debug!("Dropped file: {:?}", path);
        let _ = self.request_sender.send(EmulatorMessage::ChangeDisc(path));
    }

    /// Whether the session ended on its own.
    pub fn is_finished(&self) -> bool {
        self.current_thread.is_finished()
    }

    /// Stops the emulator thread with `status` and blocks until it has completed.
    ///
    /// A session that already ended reports its own status instead.
    pub fn stop(self, status: ExitStatus) -> anyhow::Result<ExitStatus> {
        let _ = self.request_sender.send(EmulatorMessage::Quit(status));
        // The emulation thread may be blocking trying to send a frame.
        drop(self.frame_receiver);

        match self.current_thread.join() {
            Ok(result) => result,
            Err(_) => anyhow::bail!("The emulator thread panicked"),
        }
    }
}
