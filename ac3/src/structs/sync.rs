use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::DecodeError;
use crate::utils::tables::{FRAME_SIZES, SAMPLE_RATES};

/// Two-byte pattern opening every syncframe.
pub const SYNC_WORD: u16 = 0x0B77;

/// Length in bytes of the fixed frame header.
pub const SYNC_INFO_LEN: usize = 5;

/// Frame header following the sync word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncInfo {
    pub crc1: u16,
    pub fscod: u8,
    pub frmsizecod: u8,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit rate in kbit/s.
    pub bit_rate: u16,
    /// Frame size in 16-bit words.
    pub frame_size: u16,
}

impl SyncInfo {
    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self, DecodeError> {
        let sync_word = reader.get_n::<u16>(16)?;
        if sync_word != SYNC_WORD {
            return Err(DecodeError::SyncNotFound(0));
        }

        let crc1 = reader.get_n(16)?;
        let fscod = reader.get_n(2)?;
        let frmsizecod = reader.get_n(6)?;

        Self::from_codes(crc1, fscod, frmsizecod)
    }

    /// Resolves sample rate, bit rate and frame size from the header codes.
    pub fn from_codes(crc1: u16, fscod: u8, frmsizecod: u8) -> Result<Self, DecodeError> {
        let Some(&sample_rate) = SAMPLE_RATES.get(fscod as usize) else {
            return Err(DecodeError::InvalidSampleRateCode(fscod));
        };

        let Some(&(bit_rate, frame_sizes)) = FRAME_SIZES.get(frmsizecod as usize) else {
            return Err(DecodeError::InvalidFrameSizeCode(frmsizecod));
        };

        Ok(Self {
            crc1,
            fscod,
            frmsizecod,
            sample_rate,
            bit_rate,
            frame_size: frame_sizes[fscod as usize],
        })
    }

    /// Frame length in bytes, sync word included.
    pub fn frame_len(&self) -> usize {
        self.frame_size as usize * 2
    }

    /// Parses just the header from the first bytes of a frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = BsIoSliceReader::from_slice(bytes);
        Self::read(&mut reader)
    }
}
