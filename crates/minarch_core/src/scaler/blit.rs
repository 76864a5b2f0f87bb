use crate::convert::{Frame, BYTES_PER_PIXEL};
use crate::scaler::ScalerResult;

/// Sampling filter used when the scale is not a whole number.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Sharpness {
    Sharp,
    Crisp,
    #[default]
    Soft,
}

impl Sharpness {
    pub const ALL: [Sharpness; 3] = [Sharpness::Sharp, Sharpness::Crisp, Sharpness::Soft];

    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or_default()
    }
}

/// Post-scale screen effect.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    #[default]
    None,
    /// Darken every other output row.
    Line,
    /// Darken every other row and column.
    Grid,
}

impl Effect {
    pub const ALL: [Effect; 3] = [Effect::None, Effect::Line, Effect::Grid];

    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or_default()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Self {
        Self::from_index((self.index() + 1) % Self::ALL.len())
    }
}

/// Fill the whole canvas with black.
pub fn clear(canvas: &mut [u8]) {
    canvas.fill(0);
}

#[inline(always)]
fn darken(px: u16) -> u16 {
    // 3/4 brightness per channel, done on the packed value.
    let half = (px >> 1) & 0b01111_011111_01111;
    let quarter = (px >> 2) & 0b00111_001111_00111;
    half + quarter
}

#[inline(always)]
fn lerp565(a: u16, b: u16, t: u32) -> u16 {
    // t in 0..=256
    let lerp = |shift: u16, mask: u16| -> u16 {
        let ca = ((a >> shift) & mask) as u32;
        let cb = ((b >> shift) & mask) as u32;
        (((ca * (256 - t) + cb * t) >> 8) as u16) << shift
    };

    lerp(11, 0x1F) | lerp(5, 0x3F) | lerp(0, 0x1F)
}

/// Copy the source rect of `src` into the destination rect of `canvas` according to `result`.
///
/// `canvas` must hold at least `result.canvas_h` rows of `result.dst_p` bytes.
///
/// # Returns
/// * `true` - When something was drawn.
/// * `false` - When the result is empty or the buffers are too small for it.
#[profiling::function]
pub fn blit(result: &ScalerResult, src: &Frame, canvas: &mut [u8], sharpness: Sharpness, effect: Effect) -> bool {
    if result.is_empty() || result.src_w <= 0 || result.src_h <= 0 {
        return false;
    }

    let (src_x, src_y) = (result.src_x as usize, result.src_y as usize);
    let (src_w, src_h) = (result.src_w as usize, result.src_h as usize);
    let (dst_x, dst_y) = (result.dst_x as usize, result.dst_y as usize);
    let (dst_w, dst_h) = (result.dst_w as usize, result.dst_h as usize);
    let pitch = result.dst_p as usize;

    if src_x + src_w > src.width || src_y + src_h > src.height {
        return false;
    }
    if dst_x + dst_w > pitch / BYTES_PER_PIXEL || canvas.len() < (dst_y + dst_h) * pitch {
        return false;
    }

    let smooth = sharpness == Sharpness::Soft && (dst_w != src_w || dst_h != src_h);

    for dy in 0..dst_h {
        let row_start = (dst_y + dy) * pitch + dst_x * BYTES_PER_PIXEL;
        let row = &mut canvas[row_start..row_start + dst_w * BYTES_PER_PIXEL];
        // Fixed point 16.8 source coordinate of this row.
        let fy = (dy * src_h * 256) / dst_h;
        let sy = src_y + (fy >> 8);
        let ty = (fy & 0xFF) as u32;
        let dark_row = matches!(effect, Effect::Line | Effect::Grid) && dy % 2 == 1;

        for (dx, out) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let fx = (dx * src_w * 256) / dst_w;
            let sx = src_x + (fx >> 8);

            let mut px = if smooth {
                let tx = (fx & 0xFF) as u32;
                let nx = (sx + 1).min(src_x + src_w - 1);
                let ny = (sy + 1).min(src_y + src_h - 1);
                let top = lerp565(src.pixel(sx, sy), src.pixel(nx, sy), tx);
                let bottom = lerp565(src.pixel(sx, ny), src.pixel(nx, ny), tx);
                lerp565(top, bottom, ty)
            } else {
                src.pixel(sx, sy)
            };

            if dark_row || (effect == Effect::Grid && dx % 2 == 1) {
                px = darken(px);
            }

            out.copy_from_slice(&px.to_le_bytes());
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaler::{calculate, ScalerInput, ScalingMode};

    fn solid(width: usize, height: usize, colour: u16) -> Vec<u8> {
        std::iter::repeat(colour.to_le_bytes())
            .take(width * height)
            .flatten()
            .collect()
    }

    fn read(canvas: &[u8], pitch: usize, x: usize, y: usize) -> u16 {
        let at = y * pitch + x * 2;
        u16::from_le_bytes([canvas[at], canvas[at + 1]])
    }

    #[test]
    fn test_integer_blit_fills_destination_only() {
        let data = solid(4, 4, 0xFFFF);
        let src = Frame {
            data: &data,
            width: 4,
            height: 4,
            pitch: 8,
        };
        let result = calculate(&ScalerInput {
            src_w: 4,
            src_h: 4,
            src_p: 8,
            mode: ScalingMode::Native,
            device_w: 10,
            device_h: 8,
            device_p: 20,
            ..Default::default()
        });
        let mut canvas = vec![0u8; 20 * 8];

        assert!(blit(&result, &src, &mut canvas, Sharpness::Sharp, Effect::None));
        // 2x scale, 8x8 image at (1, 0)
        assert_eq!(read(&canvas, 20, 0, 0), 0);
        assert_eq!(read(&canvas, 20, 1, 0), 0xFFFF);
        assert_eq!(read(&canvas, 20, 8, 7), 0xFFFF);
        assert_eq!(read(&canvas, 20, 9, 7), 0);
    }

    #[test]
    fn test_line_effect_darkens_odd_rows() {
        let data = solid(2, 2, 0xFFFF);
        let src = Frame {
            data: &data,
            width: 2,
            height: 2,
            pitch: 4,
        };
        let result = calculate(&ScalerInput {
            src_w: 2,
            src_h: 2,
            src_p: 4,
            mode: ScalingMode::Native,
            device_w: 4,
            device_h: 4,
            device_p: 8,
            ..Default::default()
        });
        let mut canvas = vec![0u8; 8 * 4];

        blit(&result, &src, &mut canvas, Sharpness::Sharp, Effect::Line);
        assert_eq!(read(&canvas, 8, 0, 0), 0xFFFF);
        assert_ne!(read(&canvas, 8, 0, 1), 0xFFFF);
        assert_eq!(read(&canvas, 8, 0, 1), darken(0xFFFF));
    }

    #[test]
    fn test_soft_blends_neighbours() {
        assert_eq!(lerp565(0x0000, 0xFFFF, 0), 0x0000);
        assert_eq!(lerp565(0x0000, 0xFFFF, 256), 0xFFFF);
        let mid = lerp565(0x0000, 0xF800, 128);
        assert_eq!(mid >> 11, 15);
    }

    #[test]
    fn test_rejects_small_canvas() {
        let data = solid(4, 4, 0xFFFF);
        let src = Frame {
            data: &data,
            width: 4,
            height: 4,
            pitch: 8,
        };
        let result = calculate(&ScalerInput {
            src_w: 4,
            src_h: 4,
            src_p: 8,
            mode: ScalingMode::Native,
            device_w: 8,
            device_h: 8,
            device_p: 16,
            ..Default::default()
        });
        let mut canvas = vec![0u8; 10];

        assert!(!blit(&result, &src, &mut canvas, Sharpness::Sharp, Effect::None));
    }
}
