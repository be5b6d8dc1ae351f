//! Audio block parsing and coefficient reconstruction.
//!
//! A syncframe carries six audio blocks of 256 coefficients per channel.
//! Most side information may be reused from the previous block, so every
//! block is decoded against a [`PreviousBlockState`] that survives across
//! blocks and frames.

use log::{Level, trace};

use crate::log_or_err;
use crate::structs::bit_allocation::{AllocationInput, BitAllocationParams, allocate};
use crate::structs::bsi::BitstreamInfo;
use crate::structs::channel::{
    ChannelId, ChannelMode, DeltaBitAllocation, DeltaSegment, DeltaStrategy, ExponentStrategy,
    PerChannelState,
};
use crate::structs::coupling::{CouplingState, reconstruct};
use crate::structs::exponent::{channel_group_count, coupling_group_count, decode_exponents};
use crate::structs::mantissa::{GroupedMantissas, decode_mantissas};
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::dither::DitherGenerator;
use crate::utils::errors::DecodeError;
use crate::utils::tables::{BLOCK_LEN, MAX_CHANNELS, REMATRIX_BANDS};

/// Last transform bin of the LFE channel, exclusive.
pub const LFE_END_BIN: usize = 7;

/// Highest valid `chbwcod`.
pub const MAX_BANDWIDTH_CODE: u8 = 60;

/// Decoding state carried from one audio block to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousBlockState {
    pub channels: [PerChannelState; MAX_CHANNELS],
    pub coupling_channel: PerChannelState,
    pub lfe: PerChannelState,
    pub coupling: CouplingState,
    pub params: BitAllocationParams,
    pub coarse_snr_offset: u8,
    /// `(cplfleak, cplsleak)`
    pub coupling_leak: (u8, u8),
    pub rematrix_flags: [bool; 4],
    /// Dynamic range gains of the first and, in dual mono, second program.
    pub dynamic_range: [f32; 2],
}

impl Default for PreviousBlockState {
    fn default() -> Self {
        Self {
            channels: [PerChannelState::default(); MAX_CHANNELS],
            coupling_channel: PerChannelState::default(),
            lfe: PerChannelState::default(),
            coupling: CouplingState::default(),
            params: BitAllocationParams::default(),
            coarse_snr_offset: 0,
            coupling_leak: (0, 0),
            rematrix_flags: [false; 4],
            dynamic_range: [1.0; 2],
        }
    }
}

impl PreviousBlockState {
    pub fn channel(&self, id: ChannelId) -> &PerChannelState {
        match id {
            ChannelId::FullBandwidth(ch) => &self.channels[ch],
            ChannelId::Coupling => &self.coupling_channel,
            ChannelId::Lfe => &self.lfe,
        }
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> &mut PerChannelState {
        match id {
            ChannelId::FullBandwidth(ch) => &mut self.channels[ch],
            ChannelId::Coupling => &mut self.coupling_channel,
            ChannelId::Lfe => &mut self.lfe,
        }
    }

    /// True when the coarse offset and every active fine offset are zero.
    fn offsets_are_zero(&self, channel_count: usize, lfe_on: bool) -> bool {
        self.coarse_snr_offset == 0
            && (!self.coupling.in_use || self.coupling_channel.fine_snr_offset == 0)
            && self.channels[..channel_count]
                .iter()
                .all(|channel| channel.fine_snr_offset == 0)
            && (!lfe_on || self.lfe.fine_snr_offset == 0)
    }

    fn clear_allocation(&mut self) {
        for channel in &mut self.channels {
            channel.bap = [0; BLOCK_LEN];
        }
        self.coupling_channel.bap = [0; BLOCK_LEN];
        self.lfe.bap = [0; BLOCK_LEN];
    }

    fn allocate_channel(&mut self, id: ChannelId, fscod: u8) {
        let params = self.params;
        let coarse_snr_offset = self.coarse_snr_offset;
        let leak = (id == ChannelId::Coupling).then_some(self.coupling_leak);

        let channel = self.channel_mut(id);
        let input = AllocationInput {
            exponents: &channel.exponents,
            start_bin: channel.start_bin,
            end_bin: channel.end_bin,
            fscod,
            params: &params,
            coarse_snr_offset,
            fine_snr_offset: channel.fine_snr_offset,
            fast_gain_code: channel.fast_gain_code,
            leak,
            delta: channel.delta.active_segments(),
        };

        let mut bap = [0u8; BLOCK_LEN];
        allocate(&input, &mut bap);
        channel.bap = bap;
    }
}

/// Counters for the allocation work done while decoding blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationCounters {
    /// Channels passed through the allocation model.
    pub bit_allocations: u64,
    /// Blocks whose pointers were cleared because every SNR offset was zero.
    pub mute_shortcuts: u64,
}

/// Transform coefficients of one audio block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockCoefficients {
    /// One array per full-bandwidth channel, in bitstream order.
    pub channels: Vec<[f32; BLOCK_LEN]>,
    pub lfe: Option<[f32; BLOCK_LEN]>,
    /// Decoded coupling channel, before it is spread over the coupled
    /// channels.
    pub coupling: Option<[f32; BLOCK_LEN]>,
    pub block_switch: Vec<bool>,
    pub dither: Vec<bool>,
    /// Signalled dynamic range gains; they are not applied to the
    /// coefficients.
    pub dynamic_range: [f32; 2],
}

/// Linear gain of a `dynrng` word.
pub fn dynamic_range_gain(code: u8) -> f32 {
    let exponent = (code as i8) >> 5;
    let mantissa = (code & 0x1F) as f32;

    (32.0 + mantissa) / 32.0 * 2f32.powi(exponent as i32)
}

/// Number of rematrixing flags sent for the given coupling setup.
pub fn rematrix_band_count(coupling: &CouplingState) -> usize {
    match coupling.begin {
        _ if !coupling.in_use => 4,
        0 => 2,
        1 | 2 => 3,
        _ => 4,
    }
}

/// Undoes sum/difference coding of the first two channels in the flagged
/// bands, up to `end_bin`.
pub fn rematrix(
    left: &mut [f32; BLOCK_LEN],
    right: &mut [f32; BLOCK_LEN],
    flags: &[bool; 4],
    end_bin: usize,
) {
    for (band, _) in flags.iter().enumerate().filter(|(_, flag)| **flag) {
        let start = REMATRIX_BANDS[band];
        let end = REMATRIX_BANDS[band + 1].min(end_bin);

        for bin in start..end {
            let (a, b) = (left[bin], right[bin]);
            left[bin] = a + b;
            right[bin] = a - b;
        }
    }
}

fn read_delta(
    reader: &mut BsIoSliceReader,
    strategy: DeltaStrategy,
    delta: &mut DeltaBitAllocation,
) -> Result<(), DecodeError> {
    match strategy {
        DeltaStrategy::Reuse => {}
        DeltaStrategy::None => delta.enabled = false,
        DeltaStrategy::New => {
            delta.enabled = true;
            delta.segment_count = reader.get_n::<u8>(3)? as usize + 1;
            for segment in &mut delta.segments[..delta.segment_count] {
                *segment = DeltaSegment {
                    offset: reader.get_n(5)?,
                    len: reader.get_n(4)?,
                    value: reader.get_n(3)?,
                };
            }
        }
    }

    Ok(())
}

#[derive(Debug, Default)]
struct Reallocation {
    coupling: bool,
    channels: [bool; MAX_CHANNELS],
    lfe: bool,
}

impl Reallocation {
    fn all(&mut self) {
        self.coupling = true;
        self.channels = [true; MAX_CHANNELS];
        self.lfe = true;
    }

    fn any(&self) -> bool {
        self.coupling || self.lfe || self.channels.iter().any(|&ch| ch)
    }
}

/// Decodes the audio blocks of one frame.
#[derive(Debug)]
pub struct AudioBlockDecoder<'a> {
    pub fail_level: Level,
    pub fscod: u8,
    pub bsi: &'a BitstreamInfo,
}

impl AudioBlockDecoder<'_> {
    /// Parses audio block `block` and returns its coefficients.
    ///
    /// `state` and `dither` are updated in place; callers that need frame
    /// atomicity pass copies.
    pub fn decode(
        &self,
        reader: &mut BsIoSliceReader,
        block: usize,
        state: &mut PreviousBlockState,
        dither: &mut DitherGenerator,
        counters: &mut AllocationCounters,
    ) -> Result<BlockCoefficients, DecodeError> {
        let mode = self.bsi.channel_mode;
        let channel_count = mode.channel_count();
        let lfe_on = self.bsi.lfe_on;

        let block_switch = (0..channel_count)
            .map(|_| reader.get())
            .collect::<Result<Vec<_>, _>>()?;
        let dither_flags = (0..channel_count)
            .map(|_| reader.get())
            .collect::<Result<Vec<_>, _>>()?;

        if block == 0 {
            state.dynamic_range = [1.0; 2];
        }
        if reader.get()? {
            state.dynamic_range[0] = dynamic_range_gain(reader.get_n(8)?);
        }
        if mode == ChannelMode::DualMono && reader.get()? {
            state.dynamic_range[1] = dynamic_range_gain(reader.get_n(8)?);
        }

        if reader.get()? {
            state.coupling.read_strategy(reader, mode)?;
        }
        if state.coupling.in_use {
            state.coupling.read_coordinates(reader, mode)?;
        }

        if mode == ChannelMode::Stereo && reader.get()? {
            let mut flags = [false; 4];
            for flag in &mut flags[..rematrix_band_count(&state.coupling)] {
                *flag = reader.get()?;
            }
            state.rematrix_flags = flags;
        }

        let mut realloc = Reallocation::default();
        self.read_exponents(reader, block, state, &mut realloc)?;
        self.read_allocation_info(reader, block, state, &mut realloc)?;

        if realloc.any() {
            if state.offsets_are_zero(channel_count, lfe_on) {
                state.clear_allocation();
                counters.mute_shortcuts += 1;
            } else {
                let mut targets = Vec::with_capacity(MAX_CHANNELS + 2);
                if state.coupling.in_use && realloc.coupling {
                    targets.push(ChannelId::Coupling);
                }
                targets.extend(
                    (0..channel_count)
                        .filter(|&ch| realloc.channels[ch])
                        .map(ChannelId::FullBandwidth),
                );
                if lfe_on && realloc.lfe {
                    targets.push(ChannelId::Lfe);
                }

                for id in targets {
                    state.allocate_channel(id, self.fscod);
                    counters.bit_allocations += 1;
                }
            }
        }

        if reader.get()? {
            let skip_len = reader.get_n::<u16>(9)? as usize;
            reader.skip_bytes(skip_len)?;
        }

        let mut groups = GroupedMantissas::default();
        let mut channels = vec![[0.0f32; BLOCK_LEN]; channel_count];
        let mut coupling = None;

        for (ch, coeffs) in channels.iter_mut().enumerate() {
            let channel = &state.channels[ch];
            decode_mantissas(
                reader,
                &mut groups,
                channel,
                0..channel.end_bin,
                dither_flags[ch].then_some(&mut *dither),
                coeffs,
            )?;

            if state.coupling.is_coupled(ch) && coupling.is_none() {
                let mut coupling_coeffs = [0.0f32; BLOCK_LEN];
                decode_mantissas(
                    reader,
                    &mut groups,
                    &state.coupling_channel,
                    state.coupling.start_bin..state.coupling.end_bin,
                    None,
                    &mut coupling_coeffs,
                )?;
                coupling = Some(coupling_coeffs);
            }
        }

        let lfe = if lfe_on {
            let mut lfe_coeffs = [0.0f32; BLOCK_LEN];
            decode_mantissas(
                reader,
                &mut groups,
                &state.lfe,
                0..LFE_END_BIN,
                None,
                &mut lfe_coeffs,
            )?;
            Some(lfe_coeffs)
        } else {
            None
        };

        if let Some(coupling_coeffs) = &coupling {
            for (ch, coeffs) in channels.iter_mut().enumerate() {
                if state.coupling.is_coupled(ch) {
                    reconstruct(
                        &state.coupling,
                        &state.coupling_channel,
                        coupling_coeffs,
                        ch,
                        dither_flags[ch].then_some(&mut *dither),
                        coeffs,
                    );
                }
            }
        }

        if mode == ChannelMode::Stereo {
            let end_bin = state.channels[0].end_bin.min(state.channels[1].end_bin);
            if let [left, right] = channels.as_mut_slice() {
                rematrix(left, right, &state.rematrix_flags, end_bin);
            }
        }

        trace!(
            "block {block}: coupling={} rematrix={:?} bap runs={}",
            state.coupling.in_use, state.rematrix_flags, counters.bit_allocations
        );

        Ok(BlockCoefficients {
            channels,
            lfe,
            coupling,
            block_switch,
            dither: dither_flags,
            dynamic_range: state.dynamic_range,
        })
    }

    /// Exponent strategies, bandwidth codes and exponents.
    fn read_exponents(
        &self,
        reader: &mut BsIoSliceReader,
        block: usize,
        state: &mut PreviousBlockState,
        realloc: &mut Reallocation,
    ) -> Result<(), DecodeError> {
        let channel_count = self.bsi.channel_count();
        let coupling_in_use = state.coupling.in_use;

        let coupling_strategy = if coupling_in_use {
            ExponentStrategy::from_bits(reader.get_n(2)?)
        } else {
            ExponentStrategy::Reuse
        };
        let mut strategies = [ExponentStrategy::Reuse; MAX_CHANNELS];
        for strategy in &mut strategies[..channel_count] {
            *strategy = ExponentStrategy::from_bits(reader.get_n(2)?);
        }
        let lfe_strategy = match self.bsi.lfe_on && reader.get()? {
            true => ExponentStrategy::D15,
            false => ExponentStrategy::Reuse,
        };

        if block == 0 {
            let reused = (coupling_in_use && coupling_strategy == ExponentStrategy::Reuse)
                .then_some(ChannelId::Coupling)
                .into_iter()
                .chain(
                    (0..channel_count)
                        .filter(|&ch| strategies[ch] == ExponentStrategy::Reuse)
                        .map(ChannelId::FullBandwidth),
                )
                .chain(
                    (self.bsi.lfe_on && lfe_strategy == ExponentStrategy::Reuse)
                        .then_some(ChannelId::Lfe),
                );

            for id in reused {
                log_or_err!(self, Level::Warn, DecodeError::ReuseInFirstBlock(id));
            }
        }

        for ch in 0..channel_count {
            if strategies[ch] == ExponentStrategy::Reuse {
                continue;
            }

            let channel = &mut state.channels[ch];
            channel.start_bin = 0;
            channel.end_bin = if state.coupling.is_coupled(ch) {
                state.coupling.start_bin
            } else {
                let code = reader.get_n::<u8>(6)?;
                if code > MAX_BANDWIDTH_CODE {
                    return Err(DecodeError::InvalidBandwidthCode(code));
                }
                3 * code as usize + 73
            };
        }

        if coupling_strategy != ExponentStrategy::Reuse {
            let (start_bin, end_bin) = (state.coupling.start_bin, state.coupling.end_bin);
            let absolute = reader.get_n::<u8>(4)? << 1;
            let groups = coupling_group_count(coupling_strategy, start_bin, end_bin);

            let channel = &mut state.coupling_channel;
            decode_exponents(
                reader,
                coupling_strategy,
                groups,
                absolute,
                &mut channel.exponents[start_bin..],
            )?;
            channel.start_bin = start_bin;
            channel.end_bin = end_bin;
            channel.exponent_strategy = coupling_strategy;
            realloc.coupling = true;
        }

        for ch in 0..channel_count {
            let strategy = strategies[ch];
            if strategy == ExponentStrategy::Reuse {
                continue;
            }

            let channel = &mut state.channels[ch];
            channel.exponent_strategy = strategy;
            let absolute = reader.get_n::<u8>(4)?;
            channel.exponents[0] = absolute;
            let groups = channel_group_count(strategy, channel.end_bin);
            decode_exponents(reader, strategy, groups, absolute, &mut channel.exponents[1..])?;
            channel.gain_range = reader.get_n(2)?;
            realloc.channels[ch] = true;
        }

        if lfe_strategy != ExponentStrategy::Reuse {
            let lfe = &mut state.lfe;
            lfe.exponent_strategy = lfe_strategy;
            let absolute = reader.get_n::<u8>(4)?;
            lfe.exponents[0] = absolute;
            decode_exponents(reader, lfe_strategy, 2, absolute, &mut lfe.exponents[1..])?;
            lfe.start_bin = 0;
            lfe.end_bin = LFE_END_BIN;
            realloc.lfe = true;
        }

        Ok(())
    }

    /// Allocation parameters, SNR offsets, coupling leak and delta bit
    /// allocation.
    fn read_allocation_info(
        &self,
        reader: &mut BsIoSliceReader,
        block: usize,
        state: &mut PreviousBlockState,
        realloc: &mut Reallocation,
    ) -> Result<(), DecodeError> {
        let channel_count = self.bsi.channel_count();
        let coupling_in_use = state.coupling.in_use;
        let lfe_on = self.bsi.lfe_on;

        if reader.get()? {
            state.params = BitAllocationParams {
                slow_decay_code: reader.get_n(2)?,
                fast_decay_code: reader.get_n(2)?,
                slow_gain_code: reader.get_n(2)?,
                db_per_bit_code: reader.get_n(2)?,
                floor_code: reader.get_n(3)?,
            };
            realloc.all();
        }

        if reader.get()? {
            state.coarse_snr_offset = reader.get_n(6)?;

            let coupling = coupling_in_use.then_some(ChannelId::Coupling);
            let lfe = lfe_on.then_some(ChannelId::Lfe);
            let targets = coupling
                .into_iter()
                .chain((0..channel_count).map(ChannelId::FullBandwidth))
                .chain(lfe);

            for id in targets {
                let channel = state.channel_mut(id);
                channel.fine_snr_offset = reader.get_n(4)?;
                channel.fast_gain_code = reader.get_n(3)?;
            }
            realloc.all();
        }

        if coupling_in_use && reader.get()? {
            state.coupling_leak = (reader.get_n(3)?, reader.get_n(3)?);
            realloc.coupling = true;
        }

        if reader.get()? {
            let coupling_strategy = match coupling_in_use {
                true => Some(DeltaStrategy::from_bits(reader.get_n(2)?)?),
                false => None,
            };
            let mut strategies = [DeltaStrategy::Reuse; MAX_CHANNELS];
            for strategy in &mut strategies[..channel_count] {
                *strategy = DeltaStrategy::from_bits(reader.get_n(2)?)?;
            }

            if let Some(strategy) = coupling_strategy {
                read_delta(reader, strategy, &mut state.coupling_channel.delta)?;
            }
            for ch in 0..channel_count {
                read_delta(reader, strategies[ch], &mut state.channels[ch].delta)?;
            }
            realloc.all();
        } else if block == 0 {
            state.coupling_channel.delta.enabled = false;
            for channel in &mut state.channels {
                channel.delta.enabled = false;
            }
        }

        Ok(())
    }
}
