use minarch_core::persistence::{MemoryCore, MemoryKind, StateCore};

/// A tiny stand-in core: a frame counter, some work RAM and battery RAM.
///
/// Its snapshot is `[frame (4 bytes LE)] ++ wram ++ sram`.
#[derive(Debug, Clone)]
pub struct FakeCore {
    pub frame: u32,
    pub wram: Vec<u8>,
    pub sram: Vec<u8>,
    pub rtc: Vec<u8>,
    pub supports_states: bool,
}

impl FakeCore {
    pub fn new(sram_size: usize) -> Self {
        Self {
            frame: 0,
            wram: vec![0; 64],
            sram: vec![0; sram_size],
            rtc: Vec::new(),
            supports_states: true,
        }
    }

    /// Advance one frame, scribbling over both RAM regions.
    pub fn run(&mut self) {
        self.frame += 1;
        let seed = self.frame as u8;
        for (i, byte) in self.wram.iter_mut().enumerate() {
            *byte = byte.wrapping_add(seed).wrapping_add(i as u8);
        }
        if let Some(first) = self.sram.first_mut() {
            *first = first.wrapping_add(1);
        }
        if let Some(last) = self.sram.last_mut() {
            *last = seed;
        }
    }

    pub fn reset(&mut self) {
        let sram_size = self.sram.len();
        *self = FakeCore {
            rtc: std::mem::take(&mut self.rtc),
            supports_states: self.supports_states,
            ..FakeCore::new(sram_size)
        };
    }
}

impl StateCore for FakeCore {
    fn serialize_size(&mut self) -> usize {
        if self.supports_states {
            4 + self.wram.len() + self.sram.len()
        } else {
            0
        }
    }

    fn serialize(&mut self, buffer: &mut [u8]) -> bool {
        if buffer.len() != self.serialize_size() {
            return false;
        }
        let (frame, rest) = buffer.split_at_mut(4);
        let (wram, sram) = rest.split_at_mut(self.wram.len());
        frame.copy_from_slice(&self.frame.to_le_bytes());
        wram.copy_from_slice(&self.wram);
        sram.copy_from_slice(&self.sram);
        true
    }

    fn unserialize(&mut self, buffer: &[u8]) -> bool {
        if buffer.len() != self.serialize_size() {
            return false;
        }
        let (frame, rest) = buffer.split_at(4);
        let (wram, sram) = rest.split_at(self.wram.len());
        self.frame = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        self.wram.copy_from_slice(wram);
        self.sram.copy_from_slice(sram);
        true
    }
}

impl MemoryCore for FakeCore {
    fn memory_size(&mut self, kind: MemoryKind) -> usize {
        match kind {
            MemoryKind::SaveRam => self.sram.len(),
            MemoryKind::Rtc => self.rtc.len(),
            MemoryKind::SystemRam => self.wram.len(),
            MemoryKind::VideoRam => 0,
        }
    }

    fn memory_data(&mut self, kind: MemoryKind) -> Option<&mut [u8]> {
        match kind {
            MemoryKind::SaveRam => Some(&mut self.sram),
            MemoryKind::Rtc => Some(&mut self.rtc),
            MemoryKind::SystemRam => Some(&mut self.wram),
            MemoryKind::VideoRam => None,
        }
    }
}
