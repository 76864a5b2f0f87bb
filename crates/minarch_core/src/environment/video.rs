use crate::convert::PixelFormat;
use crate::rotation::Rotation;

/// Frame size information reported by the core.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Geometry {
    pub base_width: u32,
    pub base_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    /// `0.0` or less means "use `base_width / base_height`".
    pub aspect_ratio: f32,
}

impl Geometry {
    /// The display aspect ratio, falling back to the pixel ratio.
    pub fn effective_aspect(&self) -> f64 {
        if self.aspect_ratio > 0.0 {
            self.aspect_ratio as f64
        } else if self.base_height > 0 {
            self.base_width as f64 / self.base_height as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timing {
    pub fps: f64,
    pub sample_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AvInfo {
    pub geometry: Geometry,
    pub timing: Timing,
}

/// Everything the core told us about its video output.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VideoState {
    pub rotation: Rotation,
    pub pixel_format: PixelFormat,
    /// Display aspect, only updated by a full AV info change.
    pub aspect_ratio: f64,
    pub fps: f64,
    pub sample_rate: f64,
    pub geometry_changed: bool,
    pub av_info_changed: bool,
    /// The cached scaler result is stale.
    pub needs_rescale: bool,
}

impl VideoState {
    /// Seed from the AV info queried right after `load_game`.
    pub fn apply_av_info(&mut self, info: &AvInfo) {
        self.aspect_ratio = info.geometry.effective_aspect();
        self.fps = info.timing.fps;
        self.sample_rate = info.timing.sample_rate;
        self.needs_rescale = true;
    }

    /// Report and clear the AV info change flag.
    pub fn take_av_info_changed(&mut self) -> bool {
        std::mem::take(&mut self.av_info_changed)
    }

    pub fn take_geometry_changed(&mut self) -> bool {
        std::mem::take(&mut self.geometry_changed)
    }

    pub fn take_needs_rescale(&mut self) -> bool {
        std::mem::take(&mut self.needs_rescale)
    }
}
