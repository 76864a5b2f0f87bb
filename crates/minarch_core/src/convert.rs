//! Pixel format conversion into the RGB565 working format.
//!
//! Everything after the core's video callback (rotation, scaling, effects) operates on RGB565.

pub const BYTES_PER_PIXEL: usize = 2;

/// Pixel layouts a core may announce.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// The protocol default until the core says otherwise.
    #[default]
    Rgb1555,
    Xrgb8888,
    Rgb565,
}

impl PixelFormat {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PixelFormat::Rgb1555),
            1 => Some(PixelFormat::Xrgb8888),
            2 => Some(PixelFormat::Rgb565),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb1555 | PixelFormat::Rgb565 => 2,
            PixelFormat::Xrgb8888 => 4,
        }
    }
}

/// A borrowed RGB565 image.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub data: &'a [u8],
    pub width: usize,
    pub height: usize,
    /// Bytes per row, may exceed `width * 2`.
    pub pitch: usize,
}

impl<'a> Frame<'a> {
    /// Read the pixel at `(x, y)`, callers are expected to stay inside the frame.
    #[inline(always)]
    pub fn pixel(&self, x: usize, y: usize) -> u16 {
        let at = y * self.pitch + x * BYTES_PER_PIXEL;
        u16::from_le_bytes([self.data[at], self.data[at + 1]])
    }
}

#[inline(always)]
pub fn rgb1555_to_565(px: u16) -> u16 {
    let r = (px >> 10) & 0x1F;
    let g = (px >> 5) & 0x1F;
    let b = px & 0x1F;
    // Replicate the top green bit into the new low bit so white stays white.
    (r << 11) | (g << 6) | ((g >> 4) << 5) | b
}

#[inline(always)]
pub fn xrgb8888_to_565(px: u32) -> u16 {
    let r = ((px >> 16) & 0xFF) as u16;
    let g = ((px >> 8) & 0xFF) as u16;
    let b = (px & 0xFF) as u16;
    ((r >> 3) << 11) | ((g >> 2) << 5) | (b >> 3)
}

/// Expand one RGB565 pixel into `[r, g, b, a]` bytes, used by presenters with an RGBA surface.
#[inline(always)]
pub fn rgb565_to_rgba(px: u16) -> [u8; 4] {
    let r = ((px >> 11) & 0x1F) as u8;
    let g = ((px >> 5) & 0x3F) as u8;
    let b = (px & 0x1F) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 0xFF]
}

/// Grow-only conversion buffer, so a frame loop at constant resolution never allocates.
#[derive(Debug, Default)]
pub struct PixelConverter {
    buffer: Vec<u8>,
}

impl PixelConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert `src` into RGB565.
    ///
    /// RGB565 input is handed back as-is. Returns `None` when `src` is too short for the given geometry.
    #[profiling::function]
    pub fn convert<'a>(
        &'a mut self,
        format: PixelFormat,
        src: &'a [u8],
        width: usize,
        height: usize,
        pitch: usize,
    ) -> Option<Frame<'a>> {
        let src_bpp = format.bytes_per_pixel();
        let row_bytes = width * src_bpp;

        if width == 0 || height == 0 || pitch < row_bytes || src.len() < pitch * (height - 1) + row_bytes {
            return None;
        }

        if format == PixelFormat::Rgb565 {
            return Some(Frame {
                data: src,
                width,
                height,
                pitch,
            });
        }

        let out_pitch = width * BYTES_PER_PIXEL;
        let needed = out_pitch * height;
        if self.buffer.len() < needed {
            self.buffer.resize(needed, 0);
        }

        for (y, out_row) in self.buffer[..needed].chunks_exact_mut(out_pitch).enumerate() {
            let row = &src[y * pitch..y * pitch + row_bytes];

            match format {
                PixelFormat::Rgb1555 => {
                    for (out, px) in out_row.chunks_exact_mut(2).zip(row.chunks_exact(2)) {
                        let converted = rgb1555_to_565(u16::from_le_bytes([px[0], px[1]]));
                        out.copy_from_slice(&converted.to_le_bytes());
                    }
                }
                PixelFormat::Xrgb8888 => {
                    for (out, px) in out_row.chunks_exact_mut(2).zip(row.chunks_exact(4)) {
                        let converted = xrgb8888_to_565(u32::from_le_bytes([px[0], px[1], px[2], px[3]]));
                        out.copy_from_slice(&converted.to_le_bytes());
                    }
                }
                PixelFormat::Rgb565 => unreachable!("handled above"),
            }
        }

        Some(Frame {
            data: &self.buffer[..needed],
            width,
            height,
            pitch: out_pitch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_1555_white_and_black() {
        assert_eq!(rgb1555_to_565(0x7FFF), 0xFFFF);
        assert_eq!(rgb1555_to_565(0x0000), 0x0000);
        // Pure red
        assert_eq!(rgb1555_to_565(0x7C00), 0xF800);
    }

    #[test]
    fn test_8888_primaries() {
        assert_eq!(xrgb8888_to_565(0x00FF_0000), 0xF800);
        assert_eq!(xrgb8888_to_565(0x0000_FF00), 0x07E0);
        assert_eq!(xrgb8888_to_565(0x0000_00FF), 0x001F);
        // The unused high byte must not leak into red.
        assert_eq!(xrgb8888_to_565(0xFF00_0000), 0x0000);
    }

    #[test]
    fn test_rgba_expansion() {
        assert_eq!(rgb565_to_rgba(0xFFFF), [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(rgb565_to_rgba(0xF800), [0xFF, 0, 0, 0xFF]);
    }

    #[test]
    fn test_convert_honours_pitch() {
        // 2x2 XRGB8888 frame with 8 bytes of padding per row.
        let mut src = vec![0u8; 16 * 2];
        src[0..4].copy_from_slice(&0x00FF_0000u32.to_le_bytes());
        src[16 + 4..16 + 8].copy_from_slice(&0x0000_00FFu32.to_le_bytes());

        let mut conv = PixelConverter::new();
        let frame = conv.convert(PixelFormat::Xrgb8888, &src, 2, 2, 16).unwrap();

        assert_eq!(frame.pitch, 4);
        assert_eq!(frame.pixel(0, 0), 0xF800);
        assert_eq!(frame.pixel(1, 0), 0x0000);
        assert_eq!(frame.pixel(1, 1), 0x001F);
    }

    #[test]
    fn test_convert_rejects_short_input() {
        let src = vec![0u8; 10];
        let mut conv = PixelConverter::new();

        assert!(conv.convert(PixelFormat::Rgb1555, &src, 4, 4, 8).is_none());
    }
}
