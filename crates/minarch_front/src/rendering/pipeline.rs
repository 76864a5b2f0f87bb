use minarch_core::convert::{rgb565_to_rgba, PixelConverter, BYTES_PER_PIXEL};
use minarch_core::environment::VideoState;
use minarch_core::rotation::RotationBuffer;
use minarch_core::scaler::{self, Effect, ScalerInput, ScalerResult, ScalingMode, Sharpness};

use crate::core::callbacks::RawFrame;
use crate::rendering::RgbaFrame;

/// Fixed properties of the screen the canvas ends up on.
#[derive(Debug, Clone, Copy)]
pub struct ScreenOptions {
    pub width: u32,
    pub height: u32,
    pub fit: bool,
    pub buffer_width: u32,
    pub buffer_height: u32,
    pub hdmi_width: u32,
}

/// The user-selectable look of the picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Look {
    pub mode: ScalingMode,
    pub sharpness: Sharpness,
    pub effect: Effect,
}

/// Turns raw core frames into RGBA canvases.
///
/// Every buffer in here only grows, a steady stream of same-sized frames never allocates.
pub struct VideoPipeline {
    screen: ScreenOptions,
    converter: PixelConverter,
    rotation: RotationBuffer,
    canvas: Vec<u8>,
    input: Option<ScalerInput>,
    result: ScalerResult,
}

impl VideoPipeline {
    pub fn new(screen: ScreenOptions) -> Self {
        Self {
            screen,
            converter: PixelConverter::new(),
            rotation: RotationBuffer::new(),
            canvas: Vec::new(),
            input: None,
            result: ScalerResult::default(),
        }
    }

    pub fn result(&self) -> &ScalerResult {
        &self.result
    }

    /// Draw `raw` into `out`.
    ///
    /// `force_rescale` recomputes the scaler result even when no input changed, for geometry/AV changes the frame
    /// size does not reveal. Returns `false` when the frame could not be drawn.
    #[profiling::function]
    pub fn process(
        &mut self,
        raw: &RawFrame,
        video: &VideoState,
        look: Look,
        hdmi_active: Option<bool>,
        force_rescale: bool,
        out: &mut RgbaFrame,
    ) -> bool {
        let (width, height) = (raw.width as usize, raw.height as usize);
        let Some(frame) = self
            .converter
            .convert(video.pixel_format, &raw.data, width, height, raw.pitch)
        else {
            log::trace!("Dropping malformed {}x{} frame (pitch {})", width, height, raw.pitch);
            return false;
        };

        let input = ScalerInput {
            src_w: frame.width as i32,
            src_h: frame.height as i32,
            src_p: frame.pitch as i32,
            aspect_ratio: video.aspect_ratio,
            rotation: video.rotation,
            mode: look.mode,
            device_w: self.screen.width as i32,
            device_h: self.screen.height as i32,
            device_p: (self.screen.width as usize * BYTES_PER_PIXEL) as i32,
            bpp: BYTES_PER_PIXEL as i32,
            fit: self.screen.fit,
            buffer_w: self.screen.buffer_width as i32,
            buffer_h: self.screen.buffer_height as i32,
            hdmi_width: self.screen.hdmi_width as i32,
            hdmi_active,
        };

        if force_rescale || self.input != Some(input) {
            self.result = scaler::calculate(&input);
            self.input = Some(input);

            let needed = (self.result.dst_p.max(0) * self.result.canvas_h.max(0)) as usize;
            if self.canvas.len() < needed {
                self.canvas.resize(needed, 0);
            }
            // The borders only need clearing when the layout changes.
            scaler::blit::clear(&mut self.canvas);

            log::debug!(
                "Scaler: {}x{} -> {}x{} at ({},{}) on {}x{} canvas, scale {} ({:?})",
                self.result.src_w,
                self.result.src_h,
                self.result.dst_w,
                self.result.dst_h,
                self.result.dst_x,
                self.result.dst_y,
                self.result.canvas_w,
                self.result.canvas_h,
                self.result.scale,
                self.result.kind
            );
        }

        if self.result.is_empty() {
            return false;
        }

        let rotated = self
            .rotation
            .apply(video.rotation, frame.data, frame.width, frame.height, frame.pitch);

        if !scaler::blit(&self.result, &rotated, &mut self.canvas, look.sharpness, look.effect) {
            return false;
        }

        self.write_rgba(out);
        true
    }

    fn write_rgba(&self, out: &mut RgbaFrame) {
        let (width, height) = (self.result.canvas_w as usize, self.result.canvas_h as usize);
        let pitch = self.result.dst_p as usize;

        out.width = width as u32;
        out.height = height as u32;
        out.rgba.resize(width * height * 4, 0);

        for (row, out_row) in out.rgba.chunks_exact_mut(width * 4).enumerate() {
            let src_row = &self.canvas[row * pitch..row * pitch + width * BYTES_PER_PIXEL];
            for (px, rgba) in src_row.chunks_exact(BYTES_PER_PIXEL).zip(out_row.chunks_exact_mut(4)) {
                rgba.copy_from_slice(&rgb565_to_rgba(u16::from_le_bytes([px[0], px[1]])));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use minarch_core::convert::PixelFormat;
    use minarch_core::rotation::Rotation;

    use super::*;

    fn screen() -> ScreenOptions {
        ScreenOptions {
            width: 640,
            height: 480,
            fit: true,
            buffer_width: 960,
            buffer_height: 720,
            hdmi_width: 1280,
        }
    }

    fn look() -> Look {
        Look {
            mode: ScalingMode::Native,
            sharpness: Sharpness::Sharp,
            effect: Effect::None,
        }
    }

    fn solid_frame(width: u32, height: u32, px: u16) -> RawFrame {
        let mut frame = RawFrame::default();
        frame.data = px.to_le_bytes().repeat((width * height) as usize);
        frame.width = width;
        frame.height = height;
        frame.pitch = width as usize * 2;
        frame
    }

    fn video(format: PixelFormat) -> VideoState {
        VideoState {
            pixel_format: format,
            aspect_ratio: 4.0 / 3.0,
            fps: 60.0,
            ..Default::default()
        }
    }

    fn rgba_at(frame: &RgbaFrame, x: u32, y: u32) -> [u8; 4] {
        let at = ((y * frame.width + x) * 4) as usize;
        frame.rgba[at..at + 4].try_into().unwrap()
    }

    #[test]
    fn test_native_frame_is_centred() {
        let mut pipeline = VideoPipeline::new(screen());
        let mut out = RgbaFrame::default();
        let raw = solid_frame(256, 224, 0xFFFF);

        assert!(pipeline.process(&raw, &video(PixelFormat::Rgb565), look(), None, false, &mut out));
        assert_eq!((out.width, out.height), (640, 480));
        assert_eq!(out.rgba.len(), 640 * 480 * 4);

        // Border stays black, the image is white.
        assert_eq!(rgba_at(&out, 0, 0), [0, 0, 0, 0xFF]);
        assert_eq!(rgba_at(&out, 64, 16), [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(rgba_at(&out, 575, 463), [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(rgba_at(&out, 576, 464), [0, 0, 0, 0xFF]);
    }

    #[test]
    fn test_rotated_1555_frame() {
        let mut pipeline = VideoPipeline::new(screen());
        let mut out = RgbaFrame::default();
        let raw = solid_frame(240, 320, 0x7C00);
        let video = VideoState {
            rotation: Rotation::Ccw90,
            ..video(PixelFormat::Rgb1555)
        };

        assert!(pipeline.process(&raw, &video, look(), None, false, &mut out));
        assert_eq!((pipeline.result().true_w, pipeline.result().true_h), (320, 240));
        // Pure red survives both conversions.
        assert_eq!(rgba_at(&out, 320, 240), [0xFF, 0, 0, 0xFF]);
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let mut pipeline = VideoPipeline::new(screen());
        let mut out = RgbaFrame::default();
        let mut raw = solid_frame(256, 224, 0);
        raw.data.truncate(100);

        assert!(!pipeline.process(&raw, &video(PixelFormat::Rgb565), look(), None, false, &mut out));
        assert!(out.rgba.is_empty());
    }
}
