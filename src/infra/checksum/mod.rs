//! CRC-32 as specified by ISO 3309 (reflected polynomial 0xEDB88320,
//! start value 0xFFFF_FFFF, final inversion). Used to seal persisted records.

const CRC32_POLY_REFLECTED: u32 = 0xEDB8_8320;
const CRC32_START: u32 = 0xFFFF_FFFF;

/// Incremental CRC-32 calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    state: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    pub const fn new() -> Self {
        Self { state: CRC32_START }
    }

    fn add_byte(&mut self, byte: u8) {
        self.state ^= byte as u32;
        for _bit in 0..8 {
            if self.state & 1 != 0 {
                self.state = (self.state >> 1) ^ CRC32_POLY_REFLECTED;
            } else {
                self.state >>= 1;
            }
        }
    }

    /// Feed a buffer into the running checksum.
    pub fn update(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.add_byte(*byte);
        }
    }

    /// Final checksum value. The calculator may keep being updated afterwards.
    pub fn value(&self) -> u32 {
        self.state ^ 0xFFFF_FFFF
    }
}

/// One-shot helper over a single buffer.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(bytes);
    crc.value()
}
