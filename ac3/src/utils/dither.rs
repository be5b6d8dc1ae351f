//! Dither generation for zero-allocation mantissas.

/// Amplitude applied to dither values, -3 dB relative to full scale.
pub const DITHER_SCALE: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Deterministic uniform noise source owned by a single decoder.
///
/// Output is a 16-bit signed value spanning the full mantissa range. Two
/// generators constructed with the same seed produce identical sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DitherGenerator {
    seed: u32,
}

impl DitherGenerator {
    pub const fn new(seed: u32) -> Self {
        Self { seed }
    }

    #[inline(always)]
    pub fn next_mantissa(&mut self) -> i32 {
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);

        (self.seed >> 16) as u16 as i16 as i32
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }
}

impl Default for DitherGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}
