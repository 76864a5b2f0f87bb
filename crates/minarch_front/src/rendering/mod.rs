use std::time::Instant;

use anyhow::Context;
use crossbeam::channel::TrySendError;
use pixels::Pixels;
use winit::event_loop::EventLoop;
use winit::window::Window;

use crate::rendering::framerate::FrameRate;
use crate::runner::frame_exchanger::ExchangerSender;

mod framerate;
pub mod pipeline;

/// A finished canvas, ready to be shown.
#[derive(Debug, Clone, Default)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    /// Debug HUD line, shown in the window title.
    pub title: Option<String>,
}

impl RgbaFrame {
    /// An all black frame of the same size.
    pub fn blanked(&self) -> RgbaFrame {
        RgbaFrame {
            width: self.width,
            height: self.height,
            rgba: vec![0; self.rgba.len()],
            title: Some("Suspended".to_string()),
        }
    }
}

/// Where the runner hands its canvases.
pub trait Presenter {
    /// Hand off `frame`, which may be swapped for a recycled buffer.
    fn present(&mut self, frame: &mut RgbaFrame, fast_forward: bool) -> anyhow::Result<()>;

    /// Whether `present` blocks on the display refresh, pacing the caller.
    fn is_paced(&self) -> bool;
}

/// Sends frames to the UI thread, blocking on the exchange unless fast forwarding.
pub struct ExchangePresenter {
    sender: ExchangerSender<RgbaFrame>,
}

impl ExchangePresenter {
    pub fn new(sender: ExchangerSender<RgbaFrame>) -> Self {
        Self { sender }
    }
}

impl Presenter for ExchangePresenter {
    fn present(&mut self, frame: &mut RgbaFrame, fast_forward: bool) -> anyhow::Result<()> {
        if fast_forward {
            match self.sender.try_send(frame) {
                Ok(()) | Err(TrySendError::Full(())) => Ok(()),
                Err(TrySendError::Disconnected(())) => anyhow::bail!("The display went away"),
            }
        } else {
            self.sender.send(frame).context("The display went away")
        }
    }

    fn is_paced(&self) -> bool {
        true
    }
}

/// Discards every frame.
#[derive(Debug, Default)]
pub struct HeadlessPresenter {
    pub presented: u64,
}

impl Presenter for HeadlessPresenter {
    fn present(&mut self, _frame: &mut RgbaFrame, _fast_forward: bool) -> anyhow::Result<()> {
        self.presented += 1;
        Ok(())
    }

    fn is_paced(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct RendererOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

pub struct Renderer {
    pixels: Pixels,
    primary_window: Window,
    title: String,
    buffer_size: (u32, u32),
    framerate: FrameRate,
    last_title_update: Instant,
}

impl Renderer {
    pub fn new(event_loop: &EventLoop<()>, options: RendererOptions) -> anyhow::Result<Self> {
        let window = {
            let size = winit::dpi::LogicalSize::new(options.width as f64, options.height as f64);
            winit::window::WindowBuilder::new()
                .with_title(&options.title)
                .with_inner_size(size)
                .with_min_inner_size(winit::dpi::LogicalSize::new(160.0, 120.0))
                .build(event_loop)?
        };

        let pixels = {
            let window_size = window.inner_size();
            let surface_texture = pixels::SurfaceTexture::new(window_size.width, window_size.height, &window);

            pixels::PixelsBuilder::new(options.width, options.height, surface_texture)
                .enable_vsync(true)
                .build()
                .context("Failed to create the pixel surface")?
        };

        Ok(Self {
            pixels,
            primary_window: window,
            title: options.title,
            buffer_size: (options.width, options.height),
            framerate: FrameRate::new(),
            last_title_update: Instant::now(),
        })
    }

    pub fn request_redraw(&self) {
        self.primary_window.request_redraw();
    }

    pub fn resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.pixels
            .resize_surface(width, height)
            .context("Failed to resize the surface")
    }

    /// Show `frame`, `fresh` tells whether it differs from the previous call.
    pub fn render(&mut self, frame: &RgbaFrame, fresh: bool) -> anyhow::Result<()> {
        if frame.width > 0 && frame.height > 0 && fresh {
            if self.buffer_size != (frame.width, frame.height) {
                self.pixels
                    .resize_buffer(frame.width, frame.height)
                    .context("Failed to resize the frame buffer")?;
                self.buffer_size = (frame.width, frame.height);
                log::debug!("Presenting {}x{} canvas", frame.width, frame.height);
            }

            let target = self.pixels.frame_mut();
            if target.len() == frame.rgba.len() {
                target.copy_from_slice(&frame.rgba);
            }
        }

        self.update_title(frame);

        let result = self.pixels.render().context("Failed to render pixels");
        self.framerate.frame_finished();

        result
    }

    fn update_title(&mut self, frame: &RgbaFrame) {
        if self.last_title_update.elapsed().as_secs() < 1 {
            return;
        }

        let hz = self.framerate.fps();
        let title = match &frame.title {
            Some(hud) => format!("{} - [{} | {:.1} Hz]", self.title, hud, hz),
            None => format!("{} - [{:.1} Hz]", self.title, hz),
        };
        self.primary_window.set_title(&title);
        self.last_title_update = Instant::now();
    }
}
