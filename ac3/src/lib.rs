#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Parser and decoder for AC-3 syncframes with `bsid` up to 8.
//!
//! ### Bitstream Organization
//!
//! **Syncframe**: sync word, CRC and rate codes, then the bit stream
//! information (BSI), six audio blocks and a trailing CRC.
//! **Audio block**: side information (strategies, exponents, allocation
//! parameters) followed by the packed mantissas. Side information may be
//! reused from the previous block.
//!
//! ### Channel Modes
//!
//! - 1+1 dual mono, 1/0 and 2/0
//! - 3/0, 2/1, 3/1, 2/2 and 3/2
//! - optional LFE channel
//!
//! ### Decoding Pipeline
//!
//! Exponents are differentially decoded, a psychoacoustic model derives the
//! number of bits of every mantissa from them, and the dequantized
//! mantissas are scaled by their exponents. Channels sharing a coupling
//! channel have their high frequencies rebuilt from it.
//!
//! ## Quick Start
//!
//! 1. Split a bitstream into frames using [`process::extract::Extractor`]
//! 2. Decode frames to coefficients using [`process::decode::Decoder`]
//!
//! ```rust,no_run
//! use ac3::process::{decode::Decoder, extract::Extractor};
//!
//! let mut extractor = Extractor::default();
//! let mut decoder = Decoder::default();
//!
//! extractor.push_bytes(&std::fs::read("stream.ac3")?);
//!
//! for frame_result in extractor {
//!     match frame_result {
//!         Ok(frame) => {
//!             let coefficients = decoder.decode(frame.as_ref())?;
//!             let first_block = &coefficients.blocks[0];
//!             println!("{} channels", first_block.channels.len());
//!         }
//!         Err(extract_error) => {
//!             eprintln!("Frame extraction error: {}", extract_error);
//!         }
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Processing functionality for AC-3 bitstreams.
///
/// 1. **Frame Extraction** ([`process::extract`]): Splits bitstream data into
///    syncframes using sync word detection.
///
/// 2. **Decoding** ([`process::decode`]): Frame decoding to transform
///    coefficients.
pub mod process;

/// Data structures representing AC-3 syntax elements.
///
/// - **Sync Information** ([`structs::sync`]): Frame header
/// - **Bitstream Information** ([`structs::bsi`]): Stream configuration
/// - **Channels** ([`structs::channel`]): Channel modes and per-channel state
/// - **Audio Blocks** ([`structs::audio_block`]): Block side information
/// - **Exponents** ([`structs::exponent`]): Spectral envelope
/// - **Bit Allocation** ([`structs::bit_allocation`]): Psychoacoustic model
/// - **Mantissas** ([`structs::mantissa`]): Dequantization
/// - **Coupling** ([`structs::coupling`]): Shared high-frequency channel
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **CRC Validation** ([`utils::crc`]): Error detection
/// - **Error Handling** ([`utils::errors`]): Error types
/// - **Dithering** ([`utils::dither`]): Zero-allocation noise
/// - **Tables** ([`utils::tables`]): Constant lookup tables
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;
