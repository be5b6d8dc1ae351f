//! Parametric bit allocation.
//!
//! Computes the allocation pointer of every transform bin from its exponent
//! and the signalled allocation parameters. The model integrates the power
//! spectral density over 50 critical bands, spreads it with a fast and a slow
//! leaky integrator, compares the resulting masking curve with the absolute
//! hearing threshold and finally maps the signal-to-mask ratio of each bin to
//! a quantizer.
//!
//! All arithmetic is integer and saturating, so identical inputs always yield
//! identical pointers.

use crate::structs::channel::DeltaSegment;
use crate::utils::tables::{
    BAND_SIZE, BAND_START, BAP, BIN_TO_BAND, BLOCK_LEN, DB_PER_BIT, FAST_DECAY, FAST_GAIN, FLOOR,
    HEARING_THRESHOLD, LOG_ADD, MAX_BANDS, SLOW_DECAY, SLOW_GAIN,
};

/// Frame-wide parameters signalled by `baie`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitAllocationParams {
    pub slow_decay_code: u8,
    pub fast_decay_code: u8,
    pub slow_gain_code: u8,
    pub db_per_bit_code: u8,
    pub floor_code: u8,
}

impl BitAllocationParams {
    fn slow_decay(&self) -> i32 {
        SLOW_DECAY[self.slow_decay_code as usize & 3]
    }

    fn fast_decay(&self) -> i32 {
        FAST_DECAY[self.fast_decay_code as usize & 3]
    }

    fn slow_gain(&self) -> i32 {
        SLOW_GAIN[self.slow_gain_code as usize & 3]
    }

    fn db_knee(&self) -> i32 {
        DB_PER_BIT[self.db_per_bit_code as usize & 3]
    }

    fn floor(&self) -> i32 {
        FLOOR[self.floor_code as usize & 7]
    }
}

/// Everything the allocation of one channel depends on.
#[derive(Debug, Clone, Copy)]
pub struct AllocationInput<'a> {
    pub exponents: &'a [u8; BLOCK_LEN],
    pub start_bin: usize,
    pub end_bin: usize,
    pub fscod: u8,
    pub params: &'a BitAllocationParams,
    pub coarse_snr_offset: u8,
    pub fine_snr_offset: u8,
    pub fast_gain_code: u8,
    /// Initial `(fast, slow)` leak codes, coupling channel only.
    pub leak: Option<(u8, u8)>,
    pub delta: &'a [DeltaSegment],
}

impl AllocationInput<'_> {
    fn snr_offset(&self) -> i32 {
        (((self.coarse_snr_offset as i32 - 15) << 4) + self.fine_snr_offset as i32) << 2
    }
}

/// Adds two values in the log-power domain.
#[inline]
pub fn logadd(a: i32, b: i32) -> i32 {
    let c = a - b;
    let address = ((c.abs() >> 1) as usize).min(LOG_ADD.len() - 1);

    if c >= 0 {
        a + LOG_ADD[address] as i32
    } else {
        b + LOG_ADD[address] as i32
    }
}

/// Low frequency compensation applied while bootstrapping the excitation.
pub fn calc_lowcomp(lowcomp: i32, b0: i32, b1: i32, band: usize) -> i32 {
    if band < 7 {
        if b0 + 256 == b1 {
            384
        } else if b0 > b1 {
            (lowcomp - 64).max(0)
        } else {
            lowcomp
        }
    } else if band < 20 {
        if b0 + 256 == b1 {
            320
        } else if b0 > b1 {
            (lowcomp - 64).max(0)
        } else {
            lowcomp
        }
    } else {
        (lowcomp - 128).max(0)
    }
}

fn band_end_bin(band: usize, end_bin: usize) -> usize {
    (BAND_START[band] as usize + BAND_SIZE[band] as usize).min(end_bin)
}

fn integrate_bands(
    psd: &[i32; BLOCK_LEN],
    start_bin: usize,
    end_bin: usize,
) -> [i32; MAX_BANDS] {
    let mut band_psd = [0i32; MAX_BANDS];
    let mut bin = start_bin;
    let mut band = BIN_TO_BAND[start_bin] as usize;

    while band < MAX_BANDS {
        let last = band_end_bin(band, end_bin);

        band_psd[band] = psd[bin];
        for &value in &psd[bin + 1..last] {
            band_psd[band] = logadd(band_psd[band], value);
        }

        bin = last;
        band += 1;
        if end_bin <= last {
            break;
        }
    }

    band_psd
}

fn masking_curve(input: &AllocationInput, band_psd: &[i32; MAX_BANDS]) -> [i32; MAX_BANDS] {
    let params = input.params;
    let slow_decay = params.slow_decay();
    let fast_decay = params.fast_decay();
    let slow_gain = params.slow_gain();
    let fast_gain = FAST_GAIN[input.fast_gain_code as usize & 7];
    let db_knee = params.db_knee();

    let band_start = BIN_TO_BAND[input.start_bin] as usize;
    let band_end = BIN_TO_BAND[input.end_bin - 1] as usize + 1;
    // the LFE channel ends inside band 6 and never looks at band 7
    let lfe_edge = |band: usize| band_end == 7 && band == 6;

    let mut excite = [0i32; MAX_BANDS];
    let mut fast_leak = 0;
    let mut slow_leak = 0;

    let begin = if band_start == 0 {
        let mut lowcomp = calc_lowcomp(0, band_psd[0], band_psd[1], 0);
        excite[0] = band_psd[0] - fast_gain - lowcomp;
        lowcomp = calc_lowcomp(lowcomp, band_psd[1], band_psd[2], 1);
        excite[1] = band_psd[1] - fast_gain - lowcomp;

        let mut leaky_start = 7;
        for band in 2..7 {
            if !lfe_edge(band) {
                lowcomp = calc_lowcomp(lowcomp, band_psd[band], band_psd[band + 1], band);
            }
            fast_leak = band_psd[band] - fast_gain;
            slow_leak = band_psd[band] - slow_gain;
            excite[band] = fast_leak - lowcomp;

            if !lfe_edge(band) && band_psd[band] <= band_psd[band + 1] {
                leaky_start = band + 1;
                break;
            }
        }

        for band in leaky_start..band_end.min(22) {
            if !lfe_edge(band) {
                lowcomp = calc_lowcomp(lowcomp, band_psd[band], band_psd[band + 1], band);
            }
            fast_leak = (fast_leak - fast_decay).max(band_psd[band] - fast_gain);
            slow_leak = (slow_leak - slow_decay).max(band_psd[band] - slow_gain);
            excite[band] = (fast_leak - lowcomp).max(slow_leak);
        }

        22
    } else {
        let (fast, slow) = input.leak.unwrap_or((0, 0));
        fast_leak = ((fast as i32) << 8) + 768;
        slow_leak = ((slow as i32) << 8) + 768;

        band_start
    };

    for band in begin..band_end {
        fast_leak = (fast_leak - fast_decay).max(band_psd[band] - fast_gain);
        slow_leak = (slow_leak - slow_decay).max(band_psd[band] - slow_gain);
        excite[band] = fast_leak.max(slow_leak);
    }

    let threshold = &HEARING_THRESHOLD[input.fscod as usize];
    let mut mask = [0i32; MAX_BANDS];
    for band in band_start..band_end {
        if band_psd[band] < db_knee {
            excite[band] += (db_knee - band_psd[band]) >> 2;
        }
        mask[band] = excite[band].max(threshold[band] as i32);
    }

    mask
}

/// Adds delta bit allocation segments to the masking curve.
///
/// Segments reaching past the last band are cut off.
pub fn apply_delta(mask: &mut [i32; MAX_BANDS], segments: &[DeltaSegment]) {
    let mut band = 0usize;

    for segment in segments {
        band += segment.offset as usize;
        let delta = segment.mask_delta();

        for _ in 0..segment.len {
            let Some(value) = mask.get_mut(band) else {
                return;
            };
            *value += delta;
            band += 1;
        }
    }
}

/// Runs the allocation model and writes the pointers for `start_bin..end_bin`.
///
/// Bins outside the range are cleared.
pub fn allocate(input: &AllocationInput, bap: &mut [u8; BLOCK_LEN]) {
    bap.fill(0);

    let start_bin = input.start_bin;
    let end_bin = input.end_bin.min(BLOCK_LEN);
    if start_bin >= end_bin {
        return;
    }

    let mut psd = [0i32; BLOCK_LEN];
    for bin in start_bin..end_bin {
        psd[bin] = 3072 - ((input.exponents[bin] as i32) << 7);
    }

    let band_psd = integrate_bands(&psd, start_bin, end_bin);
    let mut mask = masking_curve(input, &band_psd);
    apply_delta(&mut mask, input.delta);

    let snr_offset = input.snr_offset();
    let floor = input.params.floor();

    let mut bin = start_bin;
    let mut band = BIN_TO_BAND[start_bin] as usize;
    while band < MAX_BANDS {
        let last = band_end_bin(band, end_bin);

        let masked = ((mask[band] - snr_offset - floor).max(0) & 0x1FE0) + floor;
        for k in bin..last {
            let address = ((psd[k] - masked) >> 5).clamp(0, 63);
            bap[k] = BAP[address as usize];
        }

        bin = last;
        band += 1;
        if end_bin <= last {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: BitAllocationParams = BitAllocationParams {
        slow_decay_code: 2,
        fast_decay_code: 1,
        slow_gain_code: 1,
        db_per_bit_code: 2,
        floor_code: 7,
    };

    fn input<'a>(exponents: &'a [u8; BLOCK_LEN], end_bin: usize) -> AllocationInput<'a> {
        AllocationInput {
            exponents,
            start_bin: 0,
            end_bin,
            fscod: 2,
            params: &PARAMS,
            coarse_snr_offset: 15,
            fine_snr_offset: 0,
            fast_gain_code: 4,
            leak: None,
            delta: &[],
        }
    }

    fn sloped_exponents() -> [u8; BLOCK_LEN] {
        let mut exponents = [0u8; BLOCK_LEN];
        for (bin, exp) in exponents.iter_mut().enumerate() {
            *exp = (2 + bin / 12).min(24) as u8;
        }
        exponents
    }

    #[test]
    fn logadd_combines_toward_larger() {
        assert_eq!(logadd(1000, 1000), 1064);
        assert_eq!(logadd(1000, 0), 1000);
        assert_eq!(logadd(0, 1000), 1000);
        assert_eq!(logadd(500, 510), logadd(510, 500));
    }

    #[test]
    fn lowcomp_branches() {
        assert_eq!(calc_lowcomp(0, 100, 356, 3), 384);
        assert_eq!(calc_lowcomp(100, 500, 400, 3), 36);
        assert_eq!(calc_lowcomp(10, 500, 400, 3), 0);
        assert_eq!(calc_lowcomp(100, 400, 500, 3), 100);
        assert_eq!(calc_lowcomp(0, 100, 356, 10), 320);
        assert_eq!(calc_lowcomp(200, 100, 50, 21), 72);
    }

    #[test]
    fn identical_inputs_give_identical_pointers() {
        let exponents = sloped_exponents();
        let mut first = [0u8; BLOCK_LEN];
        let mut second = [0xFFu8; BLOCK_LEN];

        allocate(&input(&exponents, 253), &mut first);
        allocate(&input(&exponents, 253), &mut second);

        assert_eq!(first, second);
        assert!(first.iter().all(|&bap| bap <= 15));
        assert!(first[253..].iter().all(|&bap| bap == 0));
    }

    #[test]
    fn quiet_spectrum_gets_no_bits() {
        let exponents = [24u8; BLOCK_LEN];
        let mut bap = [0u8; BLOCK_LEN];

        allocate(&input(&exponents, 253), &mut bap);
        assert!(bap.iter().all(|&b| b == 0));
    }

    #[test]
    fn loud_spectrum_with_high_snr_offset_gets_finest_quantizer() {
        let exponents = [0u8; BLOCK_LEN];
        let mut bap = [0u8; BLOCK_LEN];
        let params = BitAllocationParams {
            floor_code: 0,
            ..PARAMS
        };
        let loud = AllocationInput {
            params: &params,
            coarse_snr_offset: 63,
            fine_snr_offset: 15,
            fast_gain_code: 0,
            ..input(&exponents, 253)
        };

        allocate(&loud, &mut bap);
        assert!(bap[..253].iter().all(|&b| b == 15));
    }

    #[test]
    fn raising_snr_offset_never_lowers_pointers() {
        let exponents = sloped_exponents();
        let mut low = [0u8; BLOCK_LEN];
        let mut high = [0u8; BLOCK_LEN];

        allocate(
            &AllocationInput {
                coarse_snr_offset: 10,
                ..input(&exponents, 253)
            },
            &mut low,
        );
        allocate(
            &AllocationInput {
                coarse_snr_offset: 40,
                ..input(&exponents, 253)
            },
            &mut high,
        );

        assert!(low.iter().zip(high.iter()).all(|(l, h)| l <= h));
        let total = |bap: &[u8; BLOCK_LEN]| bap.iter().map(|&b| b as u32).sum::<u32>();
        assert!(total(&high) > total(&low));
    }

    #[test]
    fn delta_segments_walk_bands() {
        let mut mask = [0i32; MAX_BANDS];
        let segments = [
            DeltaSegment {
                offset: 2,
                len: 2,
                value: 7,
            },
            DeltaSegment {
                offset: 1,
                len: 1,
                value: 0,
            },
        ];

        apply_delta(&mut mask, &segments);

        assert_eq!(mask[..6], [0, 0, 512, 512, 0, -512]);
        assert!(mask[6..].iter().all(|&m| m == 0));
    }

    #[test]
    fn delta_segments_saturate_at_last_band() {
        let mut mask = [0i32; MAX_BANDS];
        let segments = [DeltaSegment {
            offset: 31,
            len: 15,
            value: 4,
        }; 2];

        apply_delta(&mut mask, &segments);

        assert!(mask[31..46].iter().all(|&m| m == 128));
        assert!(mask[46..].iter().all(|&m| m == 0));
    }

    #[test]
    fn lfe_and_coupling_ranges() {
        let exponents = sloped_exponents();
        let mut bap = [0xFFu8; BLOCK_LEN];

        allocate(&input(&exponents, 7), &mut bap);
        assert!(bap[7..].iter().all(|&b| b == 0));

        let coupling = AllocationInput {
            start_bin: 37,
            end_bin: 109,
            leak: Some((2, 3)),
            ..input(&exponents, 0)
        };
        allocate(&coupling, &mut bap);
        assert!(bap[..37].iter().all(|&b| b == 0));
        assert!(bap[109..].iter().all(|&b| b == 0));
    }
}
