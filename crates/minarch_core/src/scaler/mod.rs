//! Placement of an arbitrarily sized core frame on a fixed device screen.
//!
//! [`calculate`] is a pure function: no I/O, no allocation, total over its input domain. The presenter feeds
//! its result to [`blit`] (software path) or to a GPU scaler (aspect value).

use std::fmt::{Display, Formatter};

use crate::rotation::Rotation;

pub mod blit;

pub use blit::{blit, Effect, Sharpness};

/// User facing scaling modes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalingMode {
    /// Integer scale, centred.
    Native,
    /// Preserve the core's display aspect ratio.
    #[default]
    Aspect,
    /// Stretch over the whole screen.
    Fullscreen,
    /// Integer scale up until the screen is covered, cropping the overflow.
    Cropped,
}

impl ScalingMode {
    pub const ALL: [ScalingMode; 4] = [
        ScalingMode::Native,
        ScalingMode::Aspect,
        ScalingMode::Fullscreen,
        ScalingMode::Cropped,
    ];

    /// Map an option index (`Native, Aspect, Fullscreen, Cropped`) to a mode.
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or_default()
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|m| *m == self).unwrap_or(1)
    }

    pub fn next(self) -> Self {
        Self::from_index((self.index() + 1) % Self::ALL.len())
    }
}

/// Which way an oversized aspect frame gets boxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boxing {
    /// Bars top and bottom.
    Letterbox,
    /// Bars left and right.
    Pillarbox,
    Matched,
}

/// The strategy [`calculate`] settled on, mostly useful for the debug HUD and logs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ScalerKind {
    /// Nothing sensible to draw (zero sized source or device).
    #[default]
    Empty,
    ForcedCrop,
    Cropped,
    Integer,
    FullFit,
    AspectFit,
    /// Oversized fullscreen at the given integer scale.
    Full(i32),
    /// Oversized aspect at the given integer scale.
    Aspect(i32, Boxing),
}

impl Display for ScalerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalerKind::Empty => write!(f, "empty"),
            ScalerKind::ForcedCrop => write!(f, "forced crop"),
            ScalerKind::Cropped => write!(f, "cropped"),
            ScalerKind::Integer => write!(f, "integer"),
            ScalerKind::FullFit => write!(f, "full fit"),
            ScalerKind::AspectFit => write!(f, "aspect fit"),
            ScalerKind::Full(scale) => write!(f, "full{}", scale),
            ScalerKind::Aspect(scale, boxing) => {
                let suffix = match boxing {
                    Boxing::Letterbox => 'L',
                    Boxing::Pillarbox => 'P',
                    Boxing::Matched => 'M',
                };
                write!(f, "aspect{}{}", scale, suffix)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalerInput {
    pub src_w: i32,
    pub src_h: i32,
    /// Source pitch in bytes.
    pub src_p: i32,
    /// Display aspect ratio, `0` derives it from the (rotated) source dimensions.
    pub aspect_ratio: f64,
    pub rotation: Rotation,
    pub mode: ScalingMode,
    pub device_w: i32,
    pub device_h: i32,
    /// Device pitch in bytes.
    pub device_p: i32,
    pub bpp: i32,
    /// `true` when the device cannot present a back-buffer larger than its own screen.
    pub fit: bool,
    /// Largest back-buffer the presenter can allocate, `0` disables the clamp.
    pub buffer_w: i32,
    pub buffer_h: i32,
    pub hdmi_width: i32,
    /// Explicit HDMI state from the settings block, takes precedence over the `hdmi_width` heuristic.
    pub hdmi_active: Option<bool>,
}

impl Default for ScalerInput {
    fn default() -> Self {
        Self {
            src_w: 0,
            src_h: 0,
            src_p: 0,
            aspect_ratio: 0.0,
            rotation: Rotation::None,
            mode: ScalingMode::default(),
            device_w: 0,
            device_h: 0,
            device_p: 0,
            bpp: 2,
            fit: true,
            buffer_w: 0,
            buffer_h: 0,
            hdmi_width: 0,
            hdmi_active: None,
        }
    }
}

/// Where to read from and where to draw to.
///
/// The image lands at `dst_x/dst_y` with size `dst_w x dst_h` inside a canvas of `canvas_w x canvas_h`. The
/// presenter shows the canvas on the device, downscaling it in hardware on oversized devices.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ScalerResult {
    pub src_x: i32,
    pub src_y: i32,
    pub src_w: i32,
    pub src_h: i32,
    pub src_p: i32,
    /// Source dimensions after rotation, before any cropping.
    pub true_w: i32,
    pub true_h: i32,

    pub dst_x: i32,
    pub dst_y: i32,
    pub dst_w: i32,
    pub dst_h: i32,
    /// Canvas pitch in bytes.
    pub dst_p: i32,
    pub canvas_w: i32,
    pub canvas_h: i32,

    /// Integer scale, `-1` for fractional/nearest scaling, `0` when nothing is drawn.
    pub scale: i32,
    /// `0` integer, `-1` fullscreen, otherwise the aspect ratio the presenter should preserve.
    pub aspect: f64,
    pub kind: ScalerKind,
}

impl ScalerResult {
    pub fn is_empty(&self) -> bool {
        self.dst_w <= 0 || self.dst_h <= 0
    }
}

#[inline]
fn ceil_div(a: i32, b: i32) -> i32 {
    (a + b - 1) / b
}

/// Centre `inner` inside `outer`, an odd leftover pixel goes to the leading edge.
#[inline]
fn centre(outer: i32, inner: i32) -> i32 {
    (outer - inner + 1) / 2
}

/// Width/height of the source once its display aspect ratio is applied.
///
/// Height is derived from width first. When that would shrink the image, width is derived from height instead
/// and rounded up to an even pixel count.
pub fn aspect_dimensions(src_w: i32, src_h: i32, aspect: f64) -> (i32, i32) {
    let from_width = ((src_w as f64 + aspect - 1.0) / aspect) as i32;

    if from_width < src_h {
        let w = (src_h as f64 * aspect) as i32;
        (w + w % 2, src_h)
    } else {
        (src_w, from_width)
    }
}

/// Scale the canvas down proportionally so it fits `buffer_w x buffer_h`.
///
/// # Returns
/// * `true` - If the result had to be clamped.
pub fn clamp_to_buffer(result: &mut ScalerResult, buffer_w: i32, buffer_h: i32, bpp: i32) -> bool {
    if result.canvas_w <= buffer_w && result.canvas_h <= buffer_h {
        return false;
    }

    let cap = (buffer_w as f64 / result.canvas_w as f64).min(buffer_h as f64 / result.canvas_h as f64);
    let apply = |v: i32| (v as f64 * cap) as i32;

    result.canvas_w = apply(result.canvas_w);
    result.canvas_h = apply(result.canvas_h);
    result.dst_w = apply(result.dst_w);
    result.dst_h = apply(result.dst_h);
    result.dst_x = apply(result.dst_x);
    result.dst_y = apply(result.dst_y);
    result.dst_p = result.canvas_w * bpp;

    true
}

/// Work out how to put the source frame on the device.
#[profiling::function]
pub fn calculate(input: &ScalerInput) -> ScalerResult {
    let (src_w, src_h) = if input.rotation.swaps_dimensions() {
        (input.src_h, input.src_w)
    } else {
        (input.src_w, input.src_h)
    };

    let mut result = ScalerResult {
        src_p: input.src_p,
        true_w: src_w.max(0),
        true_h: src_h.max(0),
        src_w: src_w.max(0),
        src_h: src_h.max(0),
        ..Default::default()
    };

    if src_w <= 0 || src_h <= 0 || input.device_w <= 0 || input.device_h <= 0 {
        result.aspect = 1.0;
        return result;
    }

    let aspect = match input.aspect_ratio {
        a if !a.is_finite() => 1.0,
        a if a <= 0.0 => src_w as f64 / src_h as f64,
        a => a,
    };

    let (aspect_w, aspect_h) = aspect_dimensions(src_w, src_h, aspect);

    let hdmi = input.hdmi_active.unwrap_or(input.device_w == input.hdmi_width);
    let mode = match input.mode {
        ScalingMode::Cropped if hdmi => ScalingMode::Native,
        mode => mode,
    };

    match mode {
        ScalingMode::Native | ScalingMode::Cropped => native_or_cropped(input, &mut result, mode),
        _ if input.fit => fit(input, &mut result, aspect_w, aspect_h),
        _ => oversized(input, &mut result, mode, aspect),
    }

    if input.buffer_w > 0 && input.buffer_h > 0 {
        clamp_to_buffer(&mut result, input.buffer_w, input.buffer_h, input.bpp);
    }

    result.aspect = match mode {
        ScalingMode::Native | ScalingMode::Cropped => 0.0,
        ScalingMode::Fullscreen => -1.0,
        ScalingMode::Aspect => aspect,
    };

    result
}

fn device_canvas(input: &ScalerInput, result: &mut ScalerResult) {
    result.canvas_w = input.device_w;
    result.canvas_h = input.device_h;
    result.dst_p = if input.device_p > 0 {
        input.device_p
    } else {
        input.device_w * input.bpp
    };
}

fn native_or_cropped(input: &ScalerInput, result: &mut ScalerResult, mode: ScalingMode) {
    let (src_w, src_h) = (result.src_w, result.src_h);
    let (dev_w, dev_h) = (input.device_w, input.device_h);
    let scale = (dev_w / src_w).min(dev_h / src_h);

    device_canvas(input, result);

    if scale == 0 {
        // Source does not fit even at 1x, show the middle of it.
        result.kind = ScalerKind::ForcedCrop;
        result.scale = 1;

        if src_w > dev_w {
            result.src_x = (src_w - dev_w) / 2;
            result.src_w = dev_w;
        } else {
            result.dst_x = centre(dev_w, src_w);
        }

        if src_h > dev_h {
            result.src_y = (src_h - dev_h) / 2;
            result.src_h = dev_h;
        } else {
            result.dst_y = centre(dev_h, src_h);
        }

        result.dst_w = result.src_w;
        result.dst_h = result.src_h;
    } else if mode == ScalingMode::Cropped {
        let scale = ceil_div(dev_w, src_w).min(ceil_div(dev_h, src_h));
        result.kind = ScalerKind::Cropped;
        result.scale = scale;

        let overflow_x = src_w * scale - dev_w;
        if overflow_x > 0 {
            result.src_x = overflow_x / 2 / scale;
            result.src_w = src_w - result.src_x * 2;
        } else {
            result.dst_x = centre(dev_w, src_w * scale);
        }

        let overflow_y = src_h * scale - dev_h;
        if overflow_y > 0 {
            result.src_y = overflow_y / 2 / scale;
            result.src_h = src_h - result.src_y * 2;
        } else {
            result.dst_y = centre(dev_h, src_h * scale);
        }

        result.dst_w = (result.src_w * scale).min(dev_w - result.dst_x);
        result.dst_h = (result.src_h * scale).min(dev_h - result.dst_y);
    } else {
        result.kind = ScalerKind::Integer;
        result.scale = scale;
        result.dst_w = src_w * scale;
        result.dst_h = src_h * scale;
        result.dst_x = centre(dev_w, result.dst_w);
        result.dst_y = centre(dev_h, result.dst_h);
    }
}

fn fit(input: &ScalerInput, result: &mut ScalerResult, aspect_w: i32, aspect_h: i32) {
    device_canvas(input, result);

    if input.mode == ScalingMode::Fullscreen {
        result.kind = ScalerKind::FullFit;
        result.dst_w = input.device_w;
        result.dst_h = input.device_h;
        result.scale = -1;
        return;
    }

    let scale_f = (input.device_w as f64 / aspect_w as f64).min(input.device_h as f64 / aspect_h as f64);

    result.kind = ScalerKind::AspectFit;
    result.dst_w = ((aspect_w as f64 * scale_f) as i32).min(input.device_w);
    result.dst_h = ((aspect_h as f64 * scale_f) as i32).min(input.device_h);
    result.dst_x = centre(input.device_w, result.dst_w);
    result.dst_y = centre(input.device_h, result.dst_h);
    result.scale = if scale_f == 1.0 && result.dst_w == result.src_w && result.dst_h == result.src_h {
        1
    } else {
        -1
    };
}

fn oversized(input: &ScalerInput, result: &mut ScalerResult, mode: ScalingMode, aspect: f64) {
    let (src_w, src_h) = (result.src_w, result.src_h);
    let (dev_w, dev_h) = (input.device_w, input.device_h);

    let scale_x = ceil_div(dev_w, src_w);
    let mut scale_y = ceil_div(dev_h, src_h);
    // Odd resolutions need snapping to eights
    if (dev_h - src_h).rem_euclid(8) != 0 {
        scale_y -= 1;
    }
    let scale = scale_x.max(scale_y).max(1);

    let scaled_w = src_w * scale;
    let scaled_h = src_h * scale;

    result.scale = scale;
    result.dst_w = scaled_w;
    result.dst_h = scaled_h;
    result.canvas_w = scaled_w;
    result.canvas_h = scaled_h;

    if mode == ScalingMode::Fullscreen {
        result.kind = ScalerKind::Full(scale);
    } else {
        // Compare in thousandths so 1.3333 and 1.3334 count as the same shape.
        let core_aspect = (aspect * 1000.0) as i64;
        let screen_aspect = dev_w as f64 / dev_h as f64;
        let fixed_aspect = (screen_aspect * 1000.0) as i64;

        if core_aspect > fixed_aspect {
            result.kind = ScalerKind::Aspect(scale, Boxing::Letterbox);
            let letterbox_h = (dev_w as f64 / aspect) as i32;
            let ratio = letterbox_h as f64 / dev_h as f64;
            if ratio > 0.0 {
                result.canvas_h = ((scaled_h as f64 / ratio) as i32).max(scaled_h);
            }
            result.dst_y = centre(result.canvas_h, scaled_h);
        } else if core_aspect < fixed_aspect {
            result.kind = ScalerKind::Aspect(scale, Boxing::Pillarbox);
            let pillar_w = (dev_h as f64 * aspect) as i32;
            let ratio = pillar_w as f64 / dev_w as f64;
            if ratio > 0.0 {
                let snapped = ((scaled_w as f64 / ratio) as i32 / 8) * 8;
                result.canvas_w = if snapped >= scaled_w {
                    snapped
                } else {
                    ceil_div(scaled_w, 8) * 8
                };
            }
            result.dst_x = centre(result.canvas_w, scaled_w);
        } else {
            result.kind = ScalerKind::Aspect(scale, Boxing::Matched);
        }
    }

    result.dst_p = result.canvas_w * input.bpp;
}
