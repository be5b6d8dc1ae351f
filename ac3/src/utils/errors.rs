use std::io;

#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

/// Region of a frame protected by one of the two CRC words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcRegion {
    /// First five-eighths of the frame, protected by `crc1`.
    Head,
    /// Whole frame after the sync word, protected by `crc2`.
    Frame,
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("Sync word 0x0B77 not found in {0} bytes")]
    SyncNotFound(usize),

    #[error("Invalid sample rate code: {0}")]
    InvalidSampleRateCode(u8),

    #[error("Invalid frame size code: {0}")]
    InvalidFrameSizeCode(u8),

    #[error("Unsupported bitstream id: {0} > 8")]
    UnsupportedStreamId(u8),

    #[error("Exponent out of range in group {group}: value = {value}")]
    ExponentOverflow { group: usize, value: i32 },

    #[error("Invalid mantissa code {code} for bap {bap}")]
    InvalidGroupedVqCode { bap: u8, code: u16 },

    #[error("Reserved delta bit allocation strategy")]
    InvalidDeltaBitAllocationStrategy,

    #[error("Invalid coupling band structure: begin = {begin}, end = {end}")]
    InvalidCouplingBandStructure { begin: u8, end: u8 },

    #[error("Bitstream exhausted before the end of the frame")]
    BitstreamExhausted,

    #[error("Invalid channel bandwidth code: {0} > 60")]
    InvalidBandwidthCode(u8),

    #[error("Frame truncated: expected {expected} bytes, {available} available")]
    TruncatedFrame { expected: usize, available: usize },

    #[error("CRC check failed for {region:?} region: remainder = {remainder:#06X}")]
    CrcMismatch { region: CrcRegion, remainder: u16 },

    #[error("{0:?} reuses exponents in the first block of a frame")]
    ReuseInFirstBlock(crate::structs::channel::ChannelId),

    #[error("Channel mode changed from {previous} to {current} without resetting state")]
    ChannelModeChanged { previous: u8, current: u8 },

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => DecodeError::BitstreamExhausted,
            _ => DecodeError::Io(err),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("Insufficient buffer data for frame extraction")]
    InsufficientData,

    #[error("Invalid frame header after sync word: {0}")]
    InvalidHeader(DecodeError),

    #[error("Sync lost: expected 0x0B77, found {0:#06X}")]
    SyncLost(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_maps_to_exhaustion() {
        let err = DecodeError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(matches!(err, DecodeError::BitstreamExhausted));

        let err = DecodeError::from(io::Error::other("boom"));
        assert!(matches!(err, DecodeError::Io(_)));
    }
}
