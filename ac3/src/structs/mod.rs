//! Data structures representing bitstream components.
//!
//! Contains the frame header, bit stream information, channel state and the
//! per-block decoding stages: exponents, bit allocation, mantissas and
//! coupling.

pub mod audio_block;
pub mod bit_allocation;
pub mod bsi;
pub mod channel;
pub mod coupling;
pub mod exponent;
pub mod mantissa;
pub mod sync;
