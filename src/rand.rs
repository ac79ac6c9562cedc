//! Pseudo random source for the MPPT perturbation steps.
//!
//! A fixed-seed LFSR keeps the tracker's behavior reproducible run to run,
//! which matters more here than statistical quality.

/// Galois configuration, taps at bits 32, 31, 29, 1 (maximal length).
const LFSR_TAPS: u32 = 0xD000_0001;

/// 32 bit Galois LFSR.
pub struct StepLfsr {
    state: u32,
}

impl StepLfsr {
    pub const fn new() -> Self {
        Self { state: 1 }
    }

    fn next_bit(&mut self) -> u32 {
        let bit = self.state & 1;
        self.state >>= 1;
        if bit != 0 {
            self.state ^= LFSR_TAPS;
        }
        bit
    }

    /// `width` random bits, most significant first. `width` must be at most 16.
    pub fn bits(&mut self, width: u32) -> u32 {
        let mut value = 0;
        for _ in 0..width {
            value = (value << 1) | self.next_bit();
        }
        value
    }

    /// One perturbation step: a non-zero `width` bit draw, squared and
    /// rescaled by 2^-width. Small steps dominate; the occasional large one
    /// lets the tracker escape a local ridge after partial shading.
    pub fn step(&mut self, width: u32) -> u16 {
        let mut raw = self.bits(width);
        while raw == 0 {
            raw = self.bits(width);
        }
        ((raw * raw) >> width) as u16
    }
}

impl Default for StepLfsr {
    fn default() -> Self {
        Self::new()
    }
}
