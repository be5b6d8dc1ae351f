use std::fmt;

use crate::utils::errors::DecodeError;
use crate::utils::tables::{BLOCK_LEN, CHANNEL_COUNTS};

/// Audio coding mode (`acmod`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    /// 1+1, two independent mono programs.
    DualMono,
    Mono,
    #[default]
    Stereo,
    /// 3/0: L, C, R.
    ThreeFront,
    /// 2/1: L, R, S.
    TwoOne,
    /// 3/1: L, C, R, S.
    ThreeOne,
    /// 2/2: L, R, Ls, Rs.
    TwoTwo,
    /// 3/2: L, C, R, Ls, Rs.
    ThreeTwo,
}

impl ChannelMode {
    pub fn from_acmod(acmod: u8) -> Self {
        match acmod & 7 {
            0 => Self::DualMono,
            1 => Self::Mono,
            2 => Self::Stereo,
            3 => Self::ThreeFront,
            4 => Self::TwoOne,
            5 => Self::ThreeOne,
            6 => Self::TwoTwo,
            _ => Self::ThreeTwo,
        }
    }

    pub fn acmod(self) -> u8 {
        self as u8
    }

    /// Number of full-bandwidth channels.
    pub fn channel_count(self) -> usize {
        CHANNEL_COUNTS[self as usize]
    }

    /// A center mix level is transmitted when three front channels exist.
    pub fn has_center_mix(self) -> bool {
        let acmod = self.acmod();
        acmod & 1 != 0 && acmod != 1
    }

    pub fn has_surround_mix(self) -> bool {
        self.acmod() & 4 != 0
    }

    pub fn labels(self) -> &'static [ChannelLabel] {
        use ChannelLabel::*;

        match self {
            Self::DualMono => &[Ch1, Ch2],
            Self::Mono => &[C],
            Self::Stereo => &[L, R],
            Self::ThreeFront => &[L, C, R],
            Self::TwoOne => &[L, R, S],
            Self::ThreeOne => &[L, C, R, S],
            Self::TwoTwo => &[L, R, Ls, Rs],
            Self::ThreeTwo => &[L, C, R, Ls, Rs],
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DualMono => "1+1",
            Self::Mono => "1/0",
            Self::Stereo => "2/0",
            Self::ThreeFront => "3/0",
            Self::TwoOne => "2/1",
            Self::ThreeOne => "3/1",
            Self::TwoTwo => "2/2",
            Self::ThreeTwo => "3/2",
        };

        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLabel {
    L,
    C,
    R,
    S,
    Ls,
    Rs,
    Ch1,
    Ch2,
    LFE,
}

/// Target of a per-channel operation within an audio block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelId {
    FullBandwidth(usize),
    Coupling,
    Lfe,
}

/// Exponent strategy (`chexpstr`, `cplexpstr`, `lfeexpstr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExponentStrategy {
    #[default]
    Reuse,
    D15,
    D25,
    D45,
}

impl ExponentStrategy {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Self::Reuse,
            1 => Self::D15,
            2 => Self::D25,
            _ => Self::D45,
        }
    }

    /// Bins written per decoded exponent.
    pub fn repeat(self) -> usize {
        match self {
            Self::Reuse => 0,
            Self::D15 => 1,
            Self::D25 => 2,
            Self::D45 => 4,
        }
    }

    /// Bins covered by one 7-bit exponent group.
    pub fn group_size(self) -> usize {
        self.repeat() * 3
    }
}

/// Delta bit allocation strategy (`cpldeltbae`, `deltbae`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaStrategy {
    Reuse,
    New,
    None,
}

impl DeltaStrategy {
    pub fn from_bits(bits: u8) -> Result<Self, DecodeError> {
        match bits {
            0 => Ok(Self::Reuse),
            1 => Ok(Self::New),
            2 => Ok(Self::None),
            _ => Err(DecodeError::InvalidDeltaBitAllocationStrategy),
        }
    }
}

pub const MAX_DELTA_SEGMENTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeltaSegment {
    /// Band offset from the end of the previous segment.
    pub offset: u8,
    /// Number of bands adjusted.
    pub len: u8,
    /// Encoded adjustment, 0..=7.
    pub value: u8,
}

impl DeltaSegment {
    /// Mask adjustment in PSD units.
    pub fn mask_delta(self) -> i32 {
        if self.value >= 4 {
            (self.value as i32 - 3) << 7
        } else {
            (self.value as i32 - 4) << 7
        }
    }
}

/// Delta bit allocation carried by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeltaBitAllocation {
    pub enabled: bool,
    pub segment_count: usize,
    pub segments: [DeltaSegment; MAX_DELTA_SEGMENTS],
}

impl DeltaBitAllocation {
    pub fn active_segments(&self) -> &[DeltaSegment] {
        if self.enabled {
            &self.segments[..self.segment_count]
        } else {
            &[]
        }
    }
}

/// Decoded exponents, allocation pointers and allocation parameters of one
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerChannelState {
    pub exponents: [u8; BLOCK_LEN],
    pub bap: [u8; BLOCK_LEN],
    pub start_bin: usize,
    pub end_bin: usize,
    pub exponent_strategy: ExponentStrategy,
    pub gain_range: u8,
    pub fine_snr_offset: u8,
    pub fast_gain_code: u8,
    pub delta: DeltaBitAllocation,
}

impl Default for PerChannelState {
    fn default() -> Self {
        Self {
            exponents: [0; BLOCK_LEN],
            bap: [0; BLOCK_LEN],
            start_bin: 0,
            end_bin: 0,
            exponent_strategy: ExponentStrategy::Reuse,
            gain_range: 0,
            fine_snr_offset: 0,
            fast_gain_code: 0,
            delta: DeltaBitAllocation::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_counts_follow_acmod() {
        let counts = (0..8)
            .map(|acmod| ChannelMode::from_acmod(acmod).channel_count())
            .collect::<Vec<_>>();
        assert_eq!(counts, [2, 1, 2, 3, 3, 4, 4, 5]);

        assert!(ChannelMode::ThreeTwo.has_center_mix());
        assert!(!ChannelMode::Mono.has_center_mix());
        assert!(ChannelMode::TwoOne.has_surround_mix());
        assert_eq!(ChannelMode::ThreeTwo.labels().len(), 5);
    }

    #[test]
    fn delta_segment_steps() {
        let step = |value| DeltaSegment { offset: 0, len: 1, value }.mask_delta();

        assert_eq!(step(0), -512);
        assert_eq!(step(3), -128);
        assert_eq!(step(4), 128);
        assert_eq!(step(7), 512);
        assert!(matches!(
            DeltaStrategy::from_bits(3),
            Err(DecodeError::InvalidDeltaBitAllocationStrategy)
        ));
    }
}
