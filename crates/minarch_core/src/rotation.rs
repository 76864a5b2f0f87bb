use crate::convert::{Frame, BYTES_PER_PIXEL};

/// Screen rotation requested by the core, in 90 degree counter-clockwise steps.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    None,
    Ccw90,
    Ccw180,
    Ccw270,
}

impl Rotation {
    /// Decode the raw value the core hands over, anything outside `0..=3` is rejected.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Rotation::None),
            1 => Some(Rotation::Ccw90),
            2 => Some(Rotation::Ccw180),
            3 => Some(Rotation::Ccw270),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Whether width and height trade places after applying this rotation.
    #[inline]
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Ccw90 | Rotation::Ccw270)
    }

    /// The rotation that undoes this one.
    pub fn inverse(self) -> Self {
        match self {
            Rotation::None => Rotation::None,
            Rotation::Ccw90 => Rotation::Ccw270,
            Rotation::Ccw180 => Rotation::Ccw180,
            Rotation::Ccw270 => Rotation::Ccw90,
        }
    }
}

/// Reusable back-buffer for software rotation of RGB565 frames.
///
/// The allocation only ever grows, a frame loop at steady resolution never touches the allocator.
#[derive(Debug, Default)]
pub struct RotationBuffer {
    buffer: Vec<u8>,
}

impl RotationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current size of the backing allocation in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Rotate `src` (`width x height`, `pitch` bytes per row) by `rotation`.
    ///
    /// Returns `src` untouched for [`Rotation::None`]. The rotated output is tightly packed, so its pitch is
    /// `out_width * 2`. Frames whose `src` slice is too short for the given dimensions come back unrotated.
    #[profiling::function]
    pub fn apply<'a>(
        &'a mut self,
        rotation: Rotation,
        src: &'a [u8],
        width: usize,
        height: usize,
        pitch: usize,
    ) -> Frame<'a> {
        let unrotated = Frame {
            data: src,
            width,
            height,
            pitch,
        };

        if rotation == Rotation::None || width == 0 || height == 0 {
            return unrotated;
        }

        let row_bytes = width * BYTES_PER_PIXEL;
        if pitch < row_bytes || src.len() < pitch * (height - 1) + row_bytes {
            log::warn!(
                "Refusing to rotate a {}x{} frame with pitch {} from a {} byte buffer",
                width,
                height,
                pitch,
                src.len()
            );
            return unrotated;
        }

        let needed = width * height * BYTES_PER_PIXEL;
        if self.buffer.len() < needed {
            log::debug!("Growing rotation buffer to {} bytes", needed);
            self.buffer.resize(needed, 0);
        }

        let (out_w, out_h) = if rotation.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        };
        let dst = &mut self.buffer[..needed];

        for y in 0..height {
            let row = &src[y * pitch..y * pitch + row_bytes];

            for x in 0..width {
                let (dx, dy) = match rotation {
                    Rotation::Ccw90 => (y, width - 1 - x),
                    Rotation::Ccw180 => (width - 1 - x, height - 1 - y),
                    Rotation::Ccw270 => (height - 1 - y, x),
                    Rotation::None => (x, y),
                };
                let to = (dy * out_w + dx) * BYTES_PER_PIXEL;
                let from = x * BYTES_PER_PIXEL;

                dst[to..to + BYTES_PER_PIXEL].copy_from_slice(&row[from..from + BYTES_PER_PIXEL]);
            }
        }

        Frame {
            data: &self.buffer[..needed],
            width: out_w,
            height: out_h,
            pitch: out_w * BYTES_PER_PIXEL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_frame(width: usize, height: usize) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| (i as u16).to_le_bytes())
            .collect()
    }

    fn pixel(frame: &Frame, x: usize, y: usize) -> u16 {
        let at = y * frame.pitch + x * 2;
        u16::from_le_bytes([frame.data[at], frame.data[at + 1]])
    }

    #[test]
    fn test_from_raw() {
        assert_eq!(Rotation::from_raw(3), Some(Rotation::Ccw270));
        assert_eq!(Rotation::from_raw(4), None);
    }

    #[test]
    fn test_identity_is_passthrough() {
        let src = numbered_frame(4, 2);
        let mut buf = RotationBuffer::new();
        let out = buf.apply(Rotation::None, &src, 4, 2, 8);

        assert_eq!(out.data.as_ptr(), src.as_ptr());
        assert_eq!(buf.capacity(), 0);
    }

    #[test]
    fn test_rotate_90_swaps_dimensions() {
        // 3x2 frame:
        // 0 1 2
        // 3 4 5
        let src = numbered_frame(3, 2);
        let mut buf = RotationBuffer::new();
        let out = buf.apply(Rotation::Ccw90, &src, 3, 2, 6);

        assert_eq!((out.width, out.height, out.pitch), (2, 3, 4));
        // Counter-clockwise: top row becomes the left column, read bottom up.
        assert_eq!(pixel(&out, 0, 0), 2);
        assert_eq!(pixel(&out, 1, 0), 5);
        assert_eq!(pixel(&out, 0, 2), 0);
        assert_eq!(pixel(&out, 1, 2), 3);
    }

    #[test]
    fn test_rotate_180() {
        let src = numbered_frame(3, 2);
        let mut buf = RotationBuffer::new();
        let out = buf.apply(Rotation::Ccw180, &src, 3, 2, 6);

        assert_eq!(pixel(&out, 0, 0), 5);
        assert_eq!(pixel(&out, 2, 1), 0);
    }

    #[test]
    fn test_90_then_270_is_identity() {
        let (w, h) = (7, 5);
        // Add some row padding to make sure the pitch is honoured.
        let pitch = w * 2 + 6;
        let mut src = vec![0u8; pitch * h];
        for y in 0..h {
            for x in 0..w {
                let v = ((y * w + x) as u16 * 31).to_le_bytes();
                src[y * pitch + x * 2..y * pitch + x * 2 + 2].copy_from_slice(&v);
            }
        }

        let mut first = RotationBuffer::new();
        let mut second = RotationBuffer::new();
        let once = first.apply(Rotation::Ccw90, &src, w, h, pitch);
        let twice = second.apply(Rotation::Ccw270, once.data, once.width, once.height, once.pitch);

        assert_eq!((twice.width, twice.height), (w, h));
        for y in 0..h {
            assert_eq!(
                &twice.data[y * twice.pitch..y * twice.pitch + w * 2],
                &src[y * pitch..y * pitch + w * 2]
            );
        }
    }

    #[test]
    fn test_buffer_only_grows() {
        let mut buf = RotationBuffer::new();
        let big = numbered_frame(8, 8);
        let small = numbered_frame(2, 2);

        buf.apply(Rotation::Ccw90, &big, 8, 8, 16);
        assert_eq!(buf.capacity(), 128);

        let out = buf.apply(Rotation::Ccw90, &small, 2, 2, 4);
        assert_eq!(out.data.len(), 8);
        assert_eq!(buf.capacity(), 128);
    }

    #[test]
    fn test_short_source_is_not_rotated() {
        let src = vec![0u8; 4];
        let mut buf = RotationBuffer::new();
        let out = buf.apply(Rotation::Ccw90, &src, 4, 4, 8);

        assert_eq!(out.width, 4);
        assert_eq!(buf.capacity(), 0);
    }
}
