//! Mantissa dequantization.
//!
//! Allocation pointers 1, 2 and 4 pack several mantissas into one code word.
//! The unpacked values wait in a [`GroupedMantissas`] queue that is shared by
//! every channel of an audio block, so a group may straddle two channels.

use std::ops::Range;

use crate::structs::channel::PerChannelState;
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::dither::{DITHER_SCALE, DitherGenerator};
use crate::utils::errors::DecodeError;
use crate::utils::tables::{
    BLOCK_LEN, LEVELS_3, LEVELS_5, LEVELS_7, LEVELS_11, LEVELS_15, RAW_MANTISSA_BITS,
};

#[derive(Debug, Clone, Copy)]
struct Pending<const N: usize> {
    values: [i32; N],
    next: usize,
}

impl<const N: usize> Default for Pending<N> {
    fn default() -> Self {
        Self {
            values: [0; N],
            next: N,
        }
    }
}

impl<const N: usize> Pending<N> {
    fn pop(
        &mut self,
        refill: impl FnOnce() -> Result<[i32; N], DecodeError>,
    ) -> Result<i32, DecodeError> {
        if self.next == N {
            self.values = refill()?;
            self.next = 0;
        }

        let value = self.values[self.next];
        self.next += 1;
        Ok(value)
    }
}

/// Pending grouped mantissas of one audio block.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupedMantissas {
    levels_3: Pending<3>,
    levels_5: Pending<3>,
    levels_11: Pending<2>,
}

fn checked_code(
    reader: &mut BsIoSliceReader,
    bits: u32,
    max: u16,
    bap: u8,
) -> Result<usize, DecodeError> {
    let code = reader.get_n::<u16>(bits)?;
    if code > max {
        return Err(DecodeError::InvalidGroupedVqCode { bap, code });
    }

    Ok(code as usize)
}

impl GroupedMantissas {
    /// Reads the next mantissa for a non-zero allocation pointer, as a
    /// 16-bit fixed point fraction.
    pub fn read(&mut self, reader: &mut BsIoSliceReader, bap: u8) -> Result<i32, DecodeError> {
        match bap {
            0 => Ok(0),
            1 => self.levels_3.pop(|| {
                let code = checked_code(reader, 5, 26, bap)?;
                Ok([LEVELS_3[code / 9], LEVELS_3[code / 3 % 3], LEVELS_3[code % 3]])
            }),
            2 => self.levels_5.pop(|| {
                let code = checked_code(reader, 7, 124, bap)?;
                Ok([LEVELS_5[code / 25], LEVELS_5[code / 5 % 5], LEVELS_5[code % 5]])
            }),
            3 => Ok(LEVELS_7[checked_code(reader, 3, 6, bap)?]),
            4 => self.levels_11.pop(|| {
                let code = checked_code(reader, 7, 120, bap)?;
                Ok([LEVELS_11[code / 11], LEVELS_11[code % 11]])
            }),
            5 => Ok(LEVELS_15[checked_code(reader, 4, 14, bap)?]),
            _ => {
                let bits = RAW_MANTISSA_BITS[(bap.min(15) - 6) as usize];
                Ok(reader.get_s::<i32>(bits)? << (16 - bits))
            }
        }
    }
}

/// Converts a 16-bit fixed point mantissa to a coefficient.
#[inline(always)]
pub fn scale(mantissa: i32, exponent: u8) -> f32 {
    mantissa as f32 * 2f32.powi(-(exponent as i32 + 15))
}

/// Scaled dither value for a zero-allocation bin.
#[inline(always)]
pub fn dither_value(dither: &mut DitherGenerator, exponent: u8) -> f32 {
    scale(dither.next_mantissa(), exponent) * DITHER_SCALE
}

/// Decodes the mantissas of `bins` into `out`, leaving every other bin at
/// zero.
///
/// Zero-allocation bins take a dither value when `dither` is given.
pub fn decode_mantissas(
    reader: &mut BsIoSliceReader,
    groups: &mut GroupedMantissas,
    channel: &PerChannelState,
    bins: Range<usize>,
    mut dither: Option<&mut DitherGenerator>,
    out: &mut [f32; BLOCK_LEN],
) -> Result<(), DecodeError> {
    out.fill(0.0);

    for bin in bins.start..bins.end.min(BLOCK_LEN) {
        let exponent = channel.exponents[bin];
        out[bin] = match (channel.bap[bin], dither.as_deref_mut()) {
            (0, Some(dither)) => dither_value(dither, exponent),
            (0, None) => 0.0,
            (bap, _) => scale(groups.read(reader, bap)?, exponent),
        };
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::BitSink;

    #[test]
    fn three_level_groups_are_shared() -> anyhow::Result<()> {
        let mut sink = BitSink::default();
        // (2, 0, 1) then (1, 1, 1)
        sink.put(5, 2 * 9 + 1);
        sink.put(5, 13);
        let bytes = sink.into_bytes();
        let mut reader = BsIoSliceReader::from_slice(&bytes);

        let mut groups = GroupedMantissas::default();
        let values = (0..4)
            .map(|_| groups.read(&mut reader, 1))
            .collect::<Result<Vec<_>, _>>()?;

        assert_eq!(values, [21845, -21845, 0, 0]);
        assert_eq!(reader.position()?, 10);
        Ok(())
    }

    #[test]
    fn interleaved_groups_keep_their_queues() -> anyhow::Result<()> {
        let mut sink = BitSink::default();
        sink.put(7, 124); // bap 2: (4, 4, 4)
        sink.put(7, 11); // bap 4: (1, 0)
        sink.put(3, 6); // bap 3
        let bytes = sink.into_bytes();
        let mut reader = BsIoSliceReader::from_slice(&bytes);

        let mut groups = GroupedMantissas::default();
        let top_5 = LEVELS_5[4];
        assert_eq!(groups.read(&mut reader, 2)?, top_5);
        assert_eq!(groups.read(&mut reader, 4)?, LEVELS_11[1]);
        assert_eq!(groups.read(&mut reader, 2)?, top_5);
        assert_eq!(groups.read(&mut reader, 3)?, LEVELS_7[6]);
        assert_eq!(groups.read(&mut reader, 4)?, LEVELS_11[0]);
        assert_eq!(groups.read(&mut reader, 2)?, top_5);
        assert_eq!(reader.position()?, 17);
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_codes() {
        let cases = [(1u8, 5, 27u32), (2, 7, 125), (3, 3, 7), (4, 7, 121), (5, 4, 15)];
        for (bap, bits, code) in cases {
            let mut sink = BitSink::default();
            sink.put(bits, code);
            let bytes = sink.into_bytes();
            let mut reader = BsIoSliceReader::from_slice(&bytes);

            assert!(matches!(
                GroupedMantissas::default().read(&mut reader, bap),
                Err(DecodeError::InvalidGroupedVqCode { bap: b, code: c })
                    if b == bap && c as u32 == code
            ));
        }
    }

    #[test]
    fn raw_mantissas_are_left_justified() -> anyhow::Result<()> {
        let mut sink = BitSink::default();
        sink.put_signed(5, -1); // bap 6
        sink.put_signed(16, 0x4000); // bap 15
        sink.put_signed(14, -0x2000); // bap 14
        let bytes = sink.into_bytes();
        let mut reader = BsIoSliceReader::from_slice(&bytes);

        let mut groups = GroupedMantissas::default();
        assert_eq!(groups.read(&mut reader, 6)?, -1 << 11);
        assert_eq!(groups.read(&mut reader, 15)?, 0x4000);
        assert_eq!(groups.read(&mut reader, 14)?, -0x8000);
        Ok(())
    }

    #[test]
    fn scale_follows_exponent() {
        assert_eq!(scale(0x4000, 0), 0.5);
        assert_eq!(scale(0x4000, 1), 0.25);
        assert_eq!(scale(-0x8000, 24), -(2f32.powi(-24)));
    }

    #[test]
    fn zero_allocation_dithers_only_when_asked() -> anyhow::Result<()> {
        let mut channel = PerChannelState::default();
        channel.exponents = [3; BLOCK_LEN];
        let mut reader = BsIoSliceReader::default();
        let mut out = [1.0f32; BLOCK_LEN];

        let mut groups = GroupedMantissas::default();
        decode_mantissas(&mut reader, &mut groups, &channel, 0..20, None, &mut out)?;
        assert!(out.iter().all(|&c| c == 0.0));

        let mut dither = DitherGenerator::new(7);
        let mut expected = DitherGenerator::new(7);
        decode_mantissas(
            &mut reader,
            &mut GroupedMantissas::default(),
            &channel,
            0..20,
            Some(&mut dither),
            &mut out,
        )?;

        for &coef in &out[..20] {
            assert_eq!(coef, dither_value(&mut expected, 3));
            assert!(coef.abs() <= DITHER_SCALE / 8.0);
        }
        assert!(out[20..].iter().all(|&c| c == 0.0));
        assert_eq!(dither, expected);
        Ok(())
    }

    #[test]
    fn truncated_mantissas_are_exhaustion() {
        let mut channel = PerChannelState::default();
        channel.bap[..4].fill(15);
        let bytes = [0u8; 7];
        let mut reader = BsIoSliceReader::from_slice(&bytes);

        assert!(matches!(
            decode_mantissas(
                &mut reader,
                &mut GroupedMantissas::default(),
                &channel,
                0..4,
                None,
                &mut [0.0; BLOCK_LEN]
            ),
            Err(DecodeError::BitstreamExhausted)
        ));
    }
}
