use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use minarch_core::ExitStatus;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::run_return::EventLoopExtRunReturn;

use crate::args::MainArgs;
use crate::rendering::pipeline::ScreenOptions;
use crate::rendering::{HeadlessPresenter, Renderer, RendererOptions};
use crate::runner::session::{self, SessionOptions};
use crate::runner::EmulatorRunner;
use crate::settings::SharedSettings;

mod args;
mod audio;
mod config;
mod core;
mod input;
mod rendering;
mod runner;
mod settings;

fn main() -> ExitCode {
    let args = MainArgs::parse();

    let cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("minarch")
        .build();
    let _ = simplelog::SimpleLogger::init(args.log_level, cfg);

    #[cfg(feature = "profiling-tracy")]
    tracy_client::Client::start();

    match run(args) {
        Ok(status) => {
            log::info!("Exiting: {:?}", status);
            ExitCode::from(status.code())
        }
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::from(ExitStatus::Error.code())
        }
    }
}

fn run(args: MainArgs) -> anyhow::Result<ExitStatus> {
    let roots = config::resolve_roots(&args)?;
    let settings = Arc::new(SharedSettings::open(
        &config::get_shared_settings_path(&roots),
        &config::get_settings_path(&roots),
    )?);

    let (buffer_width, buffer_height) = args.buffer_size();
    let options = SessionOptions {
        core_path: args.core.clone(),
        rom_path: args.rom.clone(),
        resume: args.resume,
        slot: args.slot,
        screen: ScreenOptions {
            width: args.width,
            height: args.height,
            fit: !args.no_fit,
            buffer_width,
            buffer_height,
            hdmi_width: args.hdmi_width,
        },
        force_hdmi: args.hdmi,
        timeout: args.timeout.map(Duration::from_secs),
        device: args.device.clone(),
        resume_slot_file: config::get_resume_slot_path(&roots),
        roots,
    };

    if args.headless {
        run_headless(options, settings)
    } else {
        run_windowed(&args, options, settings)
    }
}

fn run_headless(options: SessionOptions, settings: Arc<SharedSettings>) -> anyhow::Result<ExitStatus> {
    // Nothing sends requests, the sender only keeps the channel open.
    let (_request_sender, request_receiver) = crossbeam::channel::unbounded();
    let mut presenter = HeadlessPresenter::default();

    let status = session::run_session(options, settings, &mut presenter, &request_receiver)?;
    log::info!("Produced {} frames", presenter.presented);

    Ok(status)
}

fn run_windowed(args: &MainArgs, options: SessionOptions, settings: Arc<SharedSettings>) -> anyhow::Result<ExitStatus> {
    let mut event_loop = EventLoop::new();
    let title = match options.rom_path.file_stem() {
        Some(stem) => format!("minarch - {}", stem.to_string_lossy()),
        None => "minarch".to_string(),
    };
    let mut renderer = Renderer::new(
        &event_loop,
        RendererOptions {
            title,
            width: args.width,
            height: args.height,
        },
    )?;

    let mut runner = EmulatorRunner::new(options, settings).run();
    let mut requested = None;

    event_loop.run_return(|event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    requested = Some(ExitStatus::Cancel);
                    *control_flow = ControlFlow::Exit;
                }
                WindowEvent::KeyboardInput { input, .. } => runner.handle_input(input),
                WindowEvent::DroppedFile(path) => runner.change_disc(path),
                WindowEvent::Resized(size) => {
                    if let Err(e) = renderer.resize(size.width, size.height) {
                        log::error!("{:#}", e);
                        requested = Some(ExitStatus::Error);
                        *control_flow = ControlFlow::Exit;
                    }
                }
                _ => {}
            },
            Event::MainEventsCleared => {
                if runner.is_finished() {
                    *control_flow = ControlFlow::Exit;
                } else {
                    renderer.request_redraw();
                }
            }
            Event::RedrawRequested(_) => {
                let (fresh, frame) = runner.frame_receiver.try_recv_or_recent();
                if let Err(e) = renderer.render(frame, fresh) {
                    log::error!("{:#}", e);
                    requested = Some(ExitStatus::Error);
                    *control_flow = ControlFlow::Exit;
                }
            }
            _ => {}
        }
    });

    let status = runner.stop(requested.unwrap_or(ExitStatus::Cancel))?;
    if requested == Some(ExitStatus::Error) {
        anyhow::bail!("The display failed");
    }

    Ok(status)
}
