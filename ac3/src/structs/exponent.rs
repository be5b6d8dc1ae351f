//! Differential exponent decoding.
//!
//! Exponents are sent as an absolute starting value followed by 7-bit groups,
//! each carrying three deltas in -2..=+2. Depending on the strategy every
//! decoded exponent covers 1, 2 or 4 consecutive transform bins.

use crate::structs::channel::ExponentStrategy;
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::DecodeError;
use crate::utils::tables::EXPONENT_DELTAS;

/// Largest valid exponent.
pub const MAX_EXPONENT: i32 = 24;

/// Number of exponent groups for a full-bandwidth channel ending at `end_bin`.
pub fn channel_group_count(strategy: ExponentStrategy, end_bin: usize) -> usize {
    let group_size = strategy.group_size();
    if group_size == 0 {
        return 0;
    }

    (end_bin + group_size - 4) / group_size
}

/// Number of exponent groups for the coupling channel.
pub fn coupling_group_count(
    strategy: ExponentStrategy,
    start_bin: usize,
    end_bin: usize,
) -> usize {
    let group_size = strategy.group_size();
    if group_size == 0 {
        return 0;
    }

    end_bin.saturating_sub(start_bin) / group_size
}

/// Decodes `group_count` exponent groups starting from `absolute` into `out`.
///
/// Every group is consumed from the bitstream even when `out` is too short to
/// hold its expansion; the excess is dropped.
pub fn decode_exponents(
    reader: &mut BsIoSliceReader,
    strategy: ExponentStrategy,
    group_count: usize,
    absolute: u8,
    out: &mut [u8],
) -> Result<(), DecodeError> {
    let repeat = strategy.repeat();
    let mut exponent = absolute as i32;
    let mut bin = 0;

    for group in 0..group_count {
        let code = reader.get_n::<u8>(7)?;

        for delta in EXPONENT_DELTAS[code as usize] {
            exponent += delta as i32;
            if !(0..=MAX_EXPONENT).contains(&exponent) {
                return Err(DecodeError::ExponentOverflow {
                    group,
                    value: exponent,
                });
            }

            for _ in 0..repeat {
                if let Some(slot) = out.get_mut(bin) {
                    *slot = exponent as u8;
                }
                bin += 1;
            }
        }
    }

    Ok(())
}
