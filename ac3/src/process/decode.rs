use crate::log_or_err;
use crate::process::extract::find_sync;
use crate::structs::audio_block::{
    AllocationCounters, AudioBlockDecoder, BlockCoefficients, PreviousBlockState,
};
use crate::structs::bsi::BitstreamInfo;
use crate::structs::channel::ChannelMode;
use crate::structs::sync::{SYNC_INFO_LEN, SyncInfo};
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::crc::{CRC_FRAME_ALG, Crc16, head_region_len};
use crate::utils::dither::DitherGenerator;
use crate::utils::errors::{CrcRegion, DecodeError};
use crate::utils::tables::BLOCKS_PER_FRAME;
use log::{Level, debug};

/// Decodes syncframes to per-channel transform coefficients.
///
/// A decoder carries side information from one audio block to the next and
/// from one frame to the next, so frames of a stream must be fed in order
/// to the same instance.
///
/// # Example
///
/// ```rust,no_run
/// use ac3::process::decode::Decoder;
///
/// let data = std::fs::read("stream.ac3")?;
/// let mut decoder = Decoder::default();
/// let frame = decoder.decode(&data)?;
///
/// println!("{} Hz, {}", frame.sync_info.sample_rate, frame.bsi.channel_mode);
/// for block in &frame.blocks {
///     println!("{:?}", &block.channels[0][..8]);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Default)]
pub struct Decoder {
    state: DecoderState,
}

impl Decoder {
    /// Creates a decoder whose dither generator starts from `seed`.
    pub fn with_dither_seed(seed: u32) -> Self {
        Self {
            state: DecoderState {
                dither: DitherGenerator::new(seed),
                ..Default::default()
            },
        }
    }

    /// Decodes the first complete frame found in `buf`.
    ///
    /// Bytes before the first sync word are skipped. On error the decoder
    /// state is left as it was before the call.
    pub fn decode(&mut self, buf: &[u8]) -> Result<FrameCoefficients, DecodeError> {
        self.state.decode_frame(buf)
    }

    /// Sets the failure level for validation errors.
    ///
    /// - `log::Level::Error`: Only fail on Error level messages (default)
    /// - `log::Level::Warn`: Fail on Warning level and above (strict mode)
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.state.fail_level = level;
    }

    pub fn stats(&self) -> DecoderStats {
        self.state.stats
    }

    /// Drops all carried block state, as after a seek.
    pub fn reset(&mut self) {
        self.state.blocks = PreviousBlockState::default();
        self.state.channel_mode = None;
    }
}

/// Running totals of a [`Decoder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub blocks_decoded: u64,
    /// Channels passed through the bit allocation model.
    pub bit_allocations: u64,
    /// Blocks that cleared all allocation pointers instead of running the
    /// model.
    pub mute_shortcuts: u64,
}

/// Transform coefficients of one syncframe.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameCoefficients {
    pub sync_info: SyncInfo,
    pub bsi: BitstreamInfo,
    /// Six blocks of 256 coefficients per channel.
    pub blocks: Vec<BlockCoefficients>,
}

#[derive(Debug)]
struct DecoderState {
    fail_level: Level,
    blocks: PreviousBlockState,
    dither: DitherGenerator,
    channel_mode: Option<ChannelMode>,
    stats: DecoderStats,
    crc: Crc16,
}

impl Default for DecoderState {
    fn default() -> Self {
        Self {
            fail_level: Level::Error,
            blocks: PreviousBlockState::default(),
            dither: DitherGenerator::default(),
            channel_mode: None,
            stats: DecoderStats::default(),
            crc: Crc16::new(&CRC_FRAME_ALG),
        }
    }
}

impl DecoderState {
    fn decode_frame(&mut self, buf: &[u8]) -> Result<FrameCoefficients, DecodeError> {
        let start = find_sync(buf).ok_or(DecodeError::SyncNotFound(buf.len()))?;
        let buf = &buf[start..];
        if buf.len() < SYNC_INFO_LEN {
            return Err(DecodeError::TruncatedFrame {
                expected: SYNC_INFO_LEN,
                available: buf.len(),
            });
        }

        let sync_info = SyncInfo::from_bytes(&buf[..SYNC_INFO_LEN])?;
        let frame_len = sync_info.frame_len();
        let Some(frame) = buf.get(..frame_len) else {
            return Err(DecodeError::TruncatedFrame {
                expected: frame_len,
                available: buf.len(),
            });
        };

        self.check_crc(frame)?;

        let mut reader = BsIoSliceReader::from_slice(frame);
        SyncInfo::read(&mut reader)?;
        let bsi = BitstreamInfo::read(&mut reader)?;

        debug!(
            "Frame at {start}: {} Hz, {} kbit/s, {} bytes, bsid {}, {}{}",
            sync_info.sample_rate,
            sync_info.bit_rate,
            frame_len,
            bsi.bsid,
            bsi.channel_mode,
            if bsi.lfe_on { " + LFE" } else { "" },
        );

        let mut blocks_state = self.blocks.clone();
        if let Some(previous) = self.channel_mode {
            if previous != bsi.channel_mode {
                log_or_err!(
                    self,
                    Level::Warn,
                    DecodeError::ChannelModeChanged {
                        previous: previous.acmod(),
                        current: bsi.channel_mode.acmod(),
                    }
                );
                blocks_state = PreviousBlockState::default();
            }
        }

        let mut dither = self.dither;
        let mut counters = AllocationCounters::default();
        let block_decoder = AudioBlockDecoder {
            fail_level: self.fail_level,
            fscod: sync_info.fscod,
            bsi: &bsi,
        };

        let blocks = (0..BLOCKS_PER_FRAME)
            .map(|block| {
                block_decoder.decode(
                    &mut reader,
                    block,
                    &mut blocks_state,
                    &mut dither,
                    &mut counters,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let bits_left = reader.available()?;

        self.blocks = blocks_state;
        self.dither = dither;
        self.channel_mode = Some(bsi.channel_mode);
        self.stats.frames_decoded += 1;
        self.stats.blocks_decoded += blocks.len() as u64;
        self.stats.bit_allocations += counters.bit_allocations;
        self.stats.mute_shortcuts += counters.mute_shortcuts;

        debug!(
            "Committed frame {}: {} allocations, {} mute shortcuts, {} bits left",
            self.stats.frames_decoded,
            counters.bit_allocations,
            counters.mute_shortcuts,
            bits_left,
        );

        Ok(FrameCoefficients {
            sync_info,
            bsi,
            blocks,
        })
    }

    fn check_crc(&self, frame: &[u8]) -> Result<(), DecodeError> {
        let regions = [
            (CrcRegion::Head, &frame[2..head_region_len(frame.len())]),
            (CrcRegion::Frame, &frame[2..]),
        ];

        for (region, bytes) in regions {
            let remainder = self.crc.remainder(bytes);
            if remainder != 0 {
                log_or_err!(self, Level::Warn, DecodeError::CrcMismatch { region, remainder });
            }
        }

        Ok(())
    }
}
