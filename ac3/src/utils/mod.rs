//! Utility functions and supporting infrastructure.
//!
//! Provides bitstream I/O, CRC validation, error handling, dither generation
//! and the constant tables shared by the decoding stages.

pub mod bitstream_io;
pub mod crc;
pub mod dither;
pub mod errors;
pub mod tables;
