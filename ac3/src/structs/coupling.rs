//! Channel coupling.
//!
//! Above the coupling begin frequency the coupled channels share one
//! coupling channel. Each of them keeps a coordinate per coupling band, and
//! its coefficients are rebuilt as the coupling coefficient scaled by that
//! coordinate.

use std::ops::Range;

use log::trace;

use crate::structs::channel::{ChannelMode, PerChannelState};
use crate::structs::mantissa::dither_value;
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::dither::DitherGenerator;
use crate::utils::errors::DecodeError;
use crate::utils::tables::{BLOCK_LEN, MAX_CHANNELS, MAX_COUPLING_SUBBANDS};

/// Width of a coupling subband in transform bins.
pub const SUBBAND_LEN: usize = 12;

/// Gain applied when a coupled channel is rebuilt.
pub const RECONSTRUCTION_GAIN: f32 = 8.0;

/// Coupling strategy and coordinates carried from block to block.
///
/// Phase flags are kept beside the coordinates and applied to the second
/// channel on every rebuild, so a stored coordinate is never negated in
/// place. `cplbegf` may exceed `cplendf` by at most 2, which leaves a single
/// subband.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouplingState {
    pub in_use: bool,
    pub channels: [bool; MAX_CHANNELS],
    pub phase_flags_in_use: bool,
    /// `cplbegf`
    pub begin: u8,
    /// `cplendf`
    pub end: u8,
    /// Set when the subband continues the band of the previous subband.
    pub band_structure: [bool; MAX_COUPLING_SUBBANDS],
    pub band_count: usize,
    pub start_bin: usize,
    pub end_bin: usize,
    pub coordinates: [[f32; MAX_COUPLING_SUBBANDS]; MAX_CHANNELS],
    pub phase_flags: [bool; MAX_COUPLING_SUBBANDS],
}

impl Default for CouplingState {
    fn default() -> Self {
        Self {
            in_use: false,
            channels: [false; MAX_CHANNELS],
            phase_flags_in_use: false,
            begin: 0,
            end: 0,
            band_structure: [false; MAX_COUPLING_SUBBANDS],
            band_count: 0,
            start_bin: 0,
            end_bin: 0,
            coordinates: [[0.0; MAX_COUPLING_SUBBANDS]; MAX_CHANNELS],
            phase_flags: [false; MAX_COUPLING_SUBBANDS],
        }
    }
}

/// Coupling coordinate from its 4-bit exponent and mantissa and the channel's
/// master coordinate.
pub fn coordinate(exponent: u8, mantissa: u8, master: u8) -> f32 {
    let mantissa = if exponent == 15 {
        mantissa as f32 / 16.0
    } else {
        (mantissa as f32 + 16.0) / 32.0
    };

    mantissa * 2f32.powi(-(exponent as i32 + 3 * master as i32))
}

impl CouplingState {
    /// Reads the coupling strategy that follows a set `cplstre` bit.
    pub fn read_strategy(
        &mut self,
        reader: &mut BsIoSliceReader,
        channel_mode: ChannelMode,
    ) -> Result<(), DecodeError> {
        self.in_use = reader.get()?;
        self.channels = [false; MAX_CHANNELS];
        self.band_structure = [false; MAX_COUPLING_SUBBANDS];
        self.phase_flags = [false; MAX_COUPLING_SUBBANDS];
        self.phase_flags_in_use = false;

        if !self.in_use {
            return Ok(());
        }

        for coupled in &mut self.channels[..channel_mode.channel_count()] {
            *coupled = reader.get()?;
        }

        if channel_mode == ChannelMode::Stereo {
            self.phase_flags_in_use = reader.get()?;
        }

        let begin: u8 = reader.get_n(4)?;
        let end: u8 = reader.get_n(4)?;
        if begin > end + 2 {
            return Err(DecodeError::InvalidCouplingBandStructure { begin, end });
        }

        self.begin = begin;
        self.end = end;
        self.start_bin = begin as usize * SUBBAND_LEN + 37;
        self.end_bin = end as usize * SUBBAND_LEN + 73;

        let subbands = self.subband_count();
        self.band_count = subbands;
        for merged in &mut self.band_structure[1..subbands] {
            *merged = reader.get()?;
            if *merged {
                self.band_count -= 1;
            }
        }

        trace!(
            "coupling: bins {}..{} subbands={subbands} bands={}",
            self.start_bin, self.end_bin, self.band_count
        );

        Ok(())
    }

    /// Reads `cplcoe` and the coordinates of every coupled channel, then the
    /// phase flags.
    pub fn read_coordinates(
        &mut self,
        reader: &mut BsIoSliceReader,
        channel_mode: ChannelMode,
    ) -> Result<(), DecodeError> {
        let mut any_new = false;

        for ch in 0..channel_mode.channel_count() {
            if !self.channels[ch] || !reader.get()? {
                continue;
            }

            any_new = true;
            let master = reader.get_n::<u8>(2)?;
            for band in 0..self.band_count {
                let exponent = reader.get_n::<u8>(4)?;
                let mantissa = reader.get_n::<u8>(4)?;
                self.coordinates[ch][band] = coordinate(exponent, mantissa, master);
            }
        }

        if channel_mode == ChannelMode::Stereo && self.phase_flags_in_use && any_new {
            for flag in &mut self.phase_flags[..self.band_count] {
                *flag = reader.get()?;
            }
        }

        Ok(())
    }

    pub fn subband_count(&self) -> usize {
        (3 + self.end as usize).saturating_sub(self.begin as usize)
    }

    pub fn is_coupled(&self, ch: usize) -> bool {
        self.in_use && self.channels.get(ch).copied().unwrap_or(false)
    }

    /// Coupling bands in bitstream order with their transform bin ranges.
    pub fn bands(&self) -> Vec<(usize, Range<usize>)> {
        let mut bands: Vec<(usize, Range<usize>)> = Vec::with_capacity(self.band_count);

        for subband in 0..self.subband_count() {
            if self.band_structure[subband] {
                if let Some((_, range)) = bands.last_mut() {
                    range.end += SUBBAND_LEN;
                    continue;
                }
            }

            let bin = self.start_bin + subband * SUBBAND_LEN;
            bands.push((bands.len(), bin..bin + SUBBAND_LEN));
        }

        bands
    }

    /// Effective coordinate of `ch` in `band`, phase flags applied.
    pub fn channel_coordinate(&self, ch: usize, band: usize) -> f32 {
        let coordinate = self.coordinates[ch][band];
        if ch == 1 && self.phase_flags_in_use && self.phase_flags[band] {
            -coordinate
        } else {
            coordinate
        }
    }
}

/// Rebuilds the coupled range of channel `ch` from the coupling channel.
///
/// Zero-allocation coupling bins take fresh dither when `dither` is given.
pub fn reconstruct(
    state: &CouplingState,
    coupling_channel: &PerChannelState,
    coupling_coeffs: &[f32; BLOCK_LEN],
    ch: usize,
    mut dither: Option<&mut DitherGenerator>,
    out: &mut [f32; BLOCK_LEN],
) {
    for (band, bins) in state.bands() {
        let gain = state.channel_coordinate(ch, band) * RECONSTRUCTION_GAIN;

        for bin in bins.start..bins.end.min(BLOCK_LEN) {
            out[bin] = match (coupling_channel.bap[bin], dither.as_deref_mut()) {
                (0, Some(dither)) => {
                    dither_value(dither, coupling_channel.exponents[bin]) * gain
                }
                _ => coupling_coeffs[bin] * gain,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::BitSink;

    #[test]
    fn coordinate_formats() {
        assert_eq!(coordinate(0, 0, 0), 0.5);
        assert_eq!(coordinate(0, 15, 0), 31.0 / 32.0);
        assert_eq!(coordinate(15, 8, 0), 0.5 * 2f32.powi(-15));
        assert_eq!(coordinate(2, 0, 1), 0.5 * 2f32.powi(-5));
        assert_eq!(coordinate(15, 0, 3), 0.0);
    }

    fn stereo_strategy(begin: u32, end: u32, structure: &[u32]) -> BitSink {
        let mut sink = BitSink::default();
        sink.put(1, 1); // cplinu
        sink.put(2, 0b11); // both channels
        sink.put(1, 1); // phsflginu
        sink.put(4, begin);
        sink.put(4, end);
        for &bit in structure {
            sink.put(1, bit);
        }
        sink
    }

    #[test]
    fn band_structure_merges_subbands() -> anyhow::Result<()> {
        // 4 subbands: 0 | 1 2 | 3
        let bytes = stereo_strategy(2, 3, &[0, 1, 0]).into_bytes();
        let mut reader = BsIoSliceReader::from_slice(&bytes);

        let mut state = CouplingState::default();
        state.read_strategy(&mut reader, ChannelMode::Stereo)?;

        assert!(state.is_coupled(0) && state.is_coupled(1));
        assert!(!state.is_coupled(2));
        assert_eq!((state.start_bin, state.end_bin), (61, 109));
        assert_eq!(state.subband_count(), 4);
        assert_eq!(state.band_count, 3);
        assert_eq!(state.bands(), [(0, 61..73), (1, 73..97), (2, 97..109)]);
        Ok(())
    }

    #[test]
    fn rejects_inverted_frequency_range() {
        let bytes = stereo_strategy(9, 6, &[]).into_bytes();
        let mut reader = BsIoSliceReader::from_slice(&bytes);

        assert!(matches!(
            CouplingState::default().read_strategy(&mut reader, ChannelMode::Stereo),
            Err(DecodeError::InvalidCouplingBandStructure { begin: 9, end: 6 })
        ));

        let bytes = stereo_strategy(8, 6, &[]).into_bytes();
        let mut reader = BsIoSliceReader::from_slice(&bytes);
        let mut state = CouplingState::default();
        assert!(state.read_strategy(&mut reader, ChannelMode::Stereo).is_ok());
        assert_eq!(state.subband_count(), 1);
        assert_eq!((state.start_bin, state.end_bin), (133, 145));
    }

    #[test]
    fn widest_range_has_eighteen_subbands() -> anyhow::Result<()> {
        let bytes = stereo_strategy(0, 15, &[0; 17]).into_bytes();
        let mut reader = BsIoSliceReader::from_slice(&bytes);

        let mut state = CouplingState::default();
        state.read_strategy(&mut reader, ChannelMode::Stereo)?;

        assert_eq!(state.subband_count(), MAX_COUPLING_SUBBANDS);
        assert_eq!((state.start_bin, state.end_bin), (37, 253));
        assert_eq!(state.bands().len(), 18);
        Ok(())
    }

    #[test]
    fn phase_flags_negate_second_channel() -> anyhow::Result<()> {
        let mut sink = stereo_strategy(2, 2, &[1, 1]);
        for _ in 0..2 {
            sink.put(1, 1); // cplcoe
            sink.put(2, 0);
            sink.put(4, 1);
            sink.put(4, 0);
        }
        sink.put(1, 1); // phsflg
        let bytes = sink.into_bytes();
        let mut reader = BsIoSliceReader::from_slice(&bytes);

        let mut state = CouplingState::default();
        state.read_strategy(&mut reader, ChannelMode::Stereo)?;
        state.read_coordinates(&mut reader, ChannelMode::Stereo)?;

        assert_eq!(state.band_count, 1);
        assert_eq!(state.channel_coordinate(0, 0), 0.25);
        assert_eq!(state.channel_coordinate(1, 0), -0.25);
        // stored coordinates stay positive
        assert_eq!(state.coordinates[1][0], 0.25);
        Ok(())
    }

    #[test]
    fn unsent_coordinates_carry_over() -> anyhow::Result<()> {
        let mut state = CouplingState::default();
        let bytes = stereo_strategy(2, 2, &[1, 1]).into_bytes();
        let mut reader = BsIoSliceReader::from_slice(&bytes);
        state.read_strategy(&mut reader, ChannelMode::Stereo)?;
        state.coordinates[0][0] = 0.75;
        state.coordinates[1][0] = 0.5;

        // cplcoe clear for both channels, no phase flags follow
        let bytes = [0x00];
        let mut reader = BsIoSliceReader::from_slice(&bytes);
        state.read_coordinates(&mut reader, ChannelMode::Stereo)?;

        assert_eq!(reader.position()?, 2);
        assert_eq!(state.coordinates[0][0], 0.75);
        assert_eq!(state.coordinates[1][0], 0.5);
        Ok(())
    }

    #[test]
    fn reconstruction_scales_by_coordinate() {
        let mut state = CouplingState {
            in_use: true,
            begin: 0,
            end: 0,
            start_bin: 37,
            end_bin: 73,
            band_count: 2,
            ..Default::default()
        };
        state.channels[0] = true;
        state.band_structure[2] = true;
        state.coordinates[0][0] = 0.5;
        state.coordinates[0][1] = 0.25;

        let mut coupling_channel = PerChannelState::default();
        coupling_channel.bap[37..73].fill(4);
        let mut coeffs = [0.0f32; BLOCK_LEN];
        coeffs[37..73].fill(1.0);

        let mut out = [0.0f32; BLOCK_LEN];
        reconstruct(&state, &coupling_channel, &coeffs, 0, None, &mut out);

        assert!(out[37..49].iter().all(|&c| c == 4.0));
        assert!(out[49..73].iter().all(|&c| c == 2.0));
        assert!(out[..37].iter().chain(&out[73..]).all(|&c| c == 0.0));
    }

    #[test]
    fn reconstruction_redithers_empty_bins() {
        let mut state = CouplingState {
            in_use: true,
            start_bin: 37,
            end_bin: 73,
            band_count: 1,
            ..Default::default()
        };
        state.channels[0] = true;
        state.band_structure[1] = true;
        state.band_structure[2] = true;
        state.coordinates[0][0] = 1.0;

        let mut coupling_channel = PerChannelState::default();
        coupling_channel.exponents[37..73].fill(5);
        let coeffs = [0.0f32; BLOCK_LEN];

        let mut dither = DitherGenerator::new(99);
        let mut expected = DitherGenerator::new(99);
        let mut out = [0.0f32; BLOCK_LEN];
        reconstruct(&state, &coupling_channel, &coeffs, 0, Some(&mut dither), &mut out);

        for &coef in &out[37..73] {
            assert_eq!(coef, dither_value(&mut expected, 5) * RECONSTRUCTION_GAIN);
        }
        assert_eq!(dither, expected);
    }
}
