use log::trace;

use crate::structs::channel::{ChannelLabel, ChannelMode};
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::DecodeError;

/// Highest `bsid` this decoder understands.
pub const MAX_BSID: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioProductionInfo {
    /// Peak mixing level, 80 + `mixlevel` dB SPL.
    pub mix_level: u8,
    pub room_type: u8,
}

/// Per-program fields, repeated for the second program in dual mono.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgramInfo {
    /// Dialogue level, `-dialnorm` dBFS. Zero is reserved and read as 31.
    pub dialnorm: u8,
    pub compression: Option<u8>,
    pub language_code: Option<u8>,
    pub production: Option<AudioProductionInfo>,
}

impl ProgramInfo {
    fn read(reader: &mut BsIoSliceReader) -> Result<Self, DecodeError> {
        let dialnorm = reader.get_n(5)?;
        let compression = if reader.get()? {
            Some(reader.get_n(8)?)
        } else {
            None
        };
        let language_code = if reader.get()? {
            Some(reader.get_n(8)?)
        } else {
            None
        };
        let production = if reader.get()? {
            Some(AudioProductionInfo {
                mix_level: reader.get_n(5)?,
                room_type: reader.get_n(2)?,
            })
        } else {
            None
        };

        Ok(Self {
            dialnorm,
            compression,
            language_code,
            production,
        })
    }

    /// Dialogue level in dBFS.
    pub fn dialogue_level(&self) -> i8 {
        match self.dialnorm {
            0 => -31,
            n => -(n as i8),
        }
    }
}

/// Bit stream information following the frame header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitstreamInfo {
    pub bsid: u8,
    pub bsmod: u8,
    pub channel_mode: ChannelMode,
    pub center_mix_level: Option<u8>,
    pub surround_mix_level: Option<u8>,
    pub dolby_surround_mode: Option<u8>,
    pub lfe_on: bool,
    pub program: ProgramInfo,
    /// Second program of a dual mono (1+1) stream.
    pub program2: Option<ProgramInfo>,
    pub copyright: bool,
    pub original: bool,
    pub timecode1: Option<u16>,
    pub timecode2: Option<u16>,
    pub additional_info: Option<Vec<u8>>,
}

impl BitstreamInfo {
    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self, DecodeError> {
        let bsid = reader.get_n(5)?;
        if bsid > MAX_BSID {
            return Err(DecodeError::UnsupportedStreamId(bsid));
        }

        let bsmod = reader.get_n(3)?;
        let channel_mode = ChannelMode::from_acmod(reader.get_n(3)?);

        let center_mix_level = if channel_mode.has_center_mix() {
            Some(reader.get_n(2)?)
        } else {
            None
        };
        let surround_mix_level = if channel_mode.has_surround_mix() {
            Some(reader.get_n(2)?)
        } else {
            None
        };
        let dolby_surround_mode = if channel_mode == ChannelMode::Stereo {
            Some(reader.get_n(2)?)
        } else {
            None
        };

        let lfe_on = reader.get()?;

        let program = ProgramInfo::read(reader)?;
        let program2 = if channel_mode == ChannelMode::DualMono {
            Some(ProgramInfo::read(reader)?)
        } else {
            None
        };

        let copyright = reader.get()?;
        let original = reader.get()?;

        let timecode1 = if reader.get()? {
            Some(reader.get_n(14)?)
        } else {
            None
        };
        let timecode2 = if reader.get()? {
            Some(reader.get_n(14)?)
        } else {
            None
        };

        // addbsil counts one less than the number of bytes that follow.
        let additional_info = if reader.get()? {
            let addbsil = reader.get_n::<u8>(6)? as usize;
            Some(reader.read_bytes(addbsil + 1)?)
        } else {
            None
        };

        trace!(
            "bsi: bsid={bsid} bsmod={bsmod} acmod={channel_mode} lfeon={lfe_on} dialnorm={}",
            program.dialnorm
        );

        Ok(Self {
            bsid,
            bsmod,
            channel_mode,
            center_mix_level,
            surround_mix_level,
            dolby_surround_mode,
            lfe_on,
            program,
            program2,
            copyright,
            original,
            timecode1,
            timecode2,
            additional_info,
        })
    }

    /// Number of full-bandwidth channels.
    pub fn channel_count(&self) -> usize {
        self.channel_mode.channel_count()
    }

    pub fn is_dual_mono(&self) -> bool {
        self.channel_mode == ChannelMode::DualMono
    }

    /// Coded channels in bitstream order, LFE last.
    pub fn channel_labels(&self) -> Vec<ChannelLabel> {
        let mut labels = self.channel_mode.labels().to_vec();
        if self.lfe_on {
            labels.push(ChannelLabel::LFE);
        }
        labels
    }
}
