//! Constant lookup tables for AC-3 decoding.
//!
//! Literal tables are reproduced from ATSC A/52. Tables that follow directly
//! from a closed form (exponent deltas, the bin-to-band map and quantizer
//! levels) are generated at compile time.

/// Number of transform coefficients per channel per audio block.
pub const BLOCK_LEN: usize = 256;

/// Audio blocks per frame.
pub const BLOCKS_PER_FRAME: usize = 6;

/// Maximum number of full-bandwidth channels.
pub const MAX_CHANNELS: usize = 5;

/// Number of critical bands used by the masking model.
pub const MAX_BANDS: usize = 50;

/// Maximum number of coupling subbands.
pub const MAX_COUPLING_SUBBANDS: usize = 18;

/// Sample rates indexed by `fscod`.
pub const SAMPLE_RATES: [u32; 3] = [32000, 44100, 48000];

/// Full-bandwidth channel count indexed by `acmod`.
pub const CHANNEL_COUNTS: [usize; 8] = [2, 1, 2, 3, 3, 4, 4, 5];

/// `(bit_rate_kbps, [frame_size_words; fscod])` indexed by `frmsizecod`.
pub const FRAME_SIZES: [(u16, [u16; 3]); 38] = [
    ( 32, [  96,   69,   64]),
    ( 32, [  96,   70,   64]),
    ( 40, [ 120,   87,   80]),
    ( 40, [ 120,   88,   80]),
    ( 48, [ 144,  104,   96]),
    ( 48, [ 144,  105,   96]),
    ( 56, [ 168,  121,  112]),
    ( 56, [ 168,  122,  112]),
    ( 64, [ 192,  139,  128]),
    ( 64, [ 192,  140,  128]),
    ( 80, [ 240,  174,  160]),
    ( 80, [ 240,  175,  160]),
    ( 96, [ 288,  208,  192]),
    ( 96, [ 288,  209,  192]),
    (112, [ 336,  243,  224]),
    (112, [ 336,  244,  224]),
    (128, [ 384,  278,  256]),
    (128, [ 384,  279,  256]),
    (160, [ 480,  348,  320]),
    (160, [ 480,  349,  320]),
    (192, [ 576,  417,  384]),
    (192, [ 576,  418,  384]),
    (224, [ 672,  487,  448]),
    (224, [ 672,  488,  448]),
    (256, [ 768,  557,  512]),
    (256, [ 768,  558,  512]),
    (320, [ 960,  696,  640]),
    (320, [ 960,  697,  640]),
    (384, [1152,  835,  768]),
    (384, [1152,  836,  768]),
    (448, [1344,  975,  896]),
    (448, [1344,  976,  896]),
    (512, [1536, 1114, 1024]),
    (512, [1536, 1115, 1024]),
    (576, [1728, 1253, 1152]),
    (576, [1728, 1254, 1152]),
    (640, [1920, 1393, 1280]),
    (640, [1920, 1394, 1280]),
];

/// Maps a 7-bit grouped exponent code to its three successive deltas.
///
/// Codes 125..=127 carry a delta of 25, which no valid running exponent can
/// absorb.
pub const EXPONENT_DELTAS: [[i8; 3]; 128] = exponent_delta_table();

const fn exponent_delta_table() -> [[i8; 3]; 128] {
    let mut table = [[25i8; 3]; 128];
    let mut code = 0;
    while code < 125 {
        table[code] = [
            (code / 25) as i8 - 2,
            ((code % 25) / 5) as i8 - 2,
            (code % 5) as i8 - 2,
        ];
        code += 1;
    }

    table
}

pub const SLOW_DECAY: [i32; 4] = [0x0F, 0x11, 0x13, 0x15];
pub const FAST_DECAY: [i32; 4] = [0x3F, 0x53, 0x67, 0x7B];
pub const SLOW_GAIN: [i32; 4] = [0x540, 0x4D8, 0x478, 0x410];
pub const DB_PER_BIT: [i32; 4] = [0x000, 0x700, 0x900, 0xB00];
pub const FLOOR: [i32; 8] = [0x2F0, 0x2B0, 0x270, 0x230, 0x1F0, 0x170, 0x0F0, -0x800];
pub const FAST_GAIN: [i32; 8] = [0x080, 0x100, 0x180, 0x200, 0x280, 0x300, 0x380, 0x400];

pub const BAND_START: [u8; MAX_BANDS] = [
     0,   1,   2,   3,   4,   5,   6,   7,   8,   9,
    10,  11,  12,  13,  14,  15,  16,  17,  18,  19,
    20,  21,  22,  23,  24,  25,  26,  27,  28,  31,
    34,  37,  40,  43,  46,  49,  55,  61,  67,  73,
    79,  85,  97, 109, 121, 133, 157, 181, 205, 229,
];

pub const BAND_SIZE: [u8; MAX_BANDS] = [
     1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
     1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
     1,  1,  1,  1,  1,  1,  1,  1,  3,  3,
     3,  3,  3,  3,  3,  6,  6,  6,  6,  6,
     6, 12, 12, 12, 12, 24, 24, 24, 24, 24,
];

/// Critical band containing each transform bin.
pub const BIN_TO_BAND: [u8; BLOCK_LEN] = bin_to_band_table();

const fn bin_to_band_table() -> [u8; BLOCK_LEN] {
    let mut table = [0u8; BLOCK_LEN];
    let mut band = 0;
    while band < MAX_BANDS {
        let start = BAND_START[band] as usize;
        let mut bin = start;
        while bin < start + BAND_SIZE[band] as usize {
            table[bin] = band as u8;
            bin += 1;
        }
        band += 1;
    }

    table
}

/// Log-addition correction indexed by half the PSD difference.
pub const LOG_ADD: [u16; 256] = [
    0x0040, 0x003F, 0x003E, 0x003D, 0x003C, 0x003B, 0x003A, 0x0039,
    0x0038, 0x0037, 0x0036, 0x0035, 0x0034, 0x0034, 0x0033, 0x0032,
    0x0031, 0x0030, 0x002F, 0x002F, 0x002E, 0x002D, 0x002C, 0x002C,
    0x002B, 0x002A, 0x0029, 0x0029, 0x0028, 0x0027, 0x0026, 0x0026,
    0x0025, 0x0024, 0x0024, 0x0023, 0x0023, 0x0022, 0x0021, 0x0021,
    0x0020, 0x0020, 0x001F, 0x001E, 0x001E, 0x001D, 0x001D, 0x001C,
    0x001C, 0x001B, 0x001B, 0x001A, 0x001A, 0x0019, 0x0019, 0x0018,
    0x0018, 0x0017, 0x0017, 0x0016, 0x0016, 0x0015, 0x0015, 0x0015,
    0x0014, 0x0014, 0x0013, 0x0013, 0x0013, 0x0012, 0x0012, 0x0012,
    0x0011, 0x0011, 0x0011, 0x0010, 0x0010, 0x0010, 0x000F, 0x000F,
    0x000F, 0x000E, 0x000E, 0x000E, 0x000D, 0x000D, 0x000D, 0x000D,
    0x000C, 0x000C, 0x000C, 0x000C, 0x000B, 0x000B, 0x000B, 0x000B,
    0x000A, 0x000A, 0x000A, 0x000A, 0x000A, 0x0009, 0x0009, 0x0009,
    0x0009, 0x0009, 0x0008, 0x0008, 0x0008, 0x0008, 0x0008, 0x0008,
    0x0007, 0x0007, 0x0007, 0x0007, 0x0007, 0x0007, 0x0006, 0x0006,
    0x0006, 0x0006, 0x0006, 0x0006, 0x0006, 0x0006, 0x0005, 0x0005,
    0x0005, 0x0005, 0x0005, 0x0005, 0x0005, 0x0005, 0x0004, 0x0004,
    0x0004, 0x0004, 0x0004, 0x0004, 0x0004, 0x0004, 0x0004, 0x0004,
    0x0004, 0x0003, 0x0003, 0x0003, 0x0003, 0x0003, 0x0003, 0x0003,
    0x0003, 0x0003, 0x0003, 0x0003, 0x0003, 0x0003, 0x0003, 0x0002,
    0x0002, 0x0002, 0x0002, 0x0002, 0x0002, 0x0002, 0x0002, 0x0002,
    0x0002, 0x0002, 0x0002, 0x0002, 0x0002, 0x0002, 0x0002, 0x0002,
    0x0002, 0x0002, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001,
    0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001,
    0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001,
    0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001,
    0x0001, 0x0001, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
];

/// Absolute hearing threshold per band, rows indexed by `fscod`.
pub const HEARING_THRESHOLD: [[u16; MAX_BANDS]; 3] = [
    // 32 kHz
    [
        0x0580, 0x0580, 0x04B0, 0x0450, 0x0420, 0x03F0, 0x03E0, 0x03D0, 0x03C0, 0x03B0,
        0x03B0, 0x03B0, 0x03A0, 0x03A0, 0x03A0, 0x03A0, 0x03A0, 0x03A0, 0x03A0, 0x03A0,
        0x0390, 0x0390, 0x0390, 0x0390, 0x0380, 0x0380, 0x0380, 0x0370, 0x0360, 0x0350,
        0x0340, 0x0330, 0x0320, 0x0310, 0x0300, 0x02F0, 0x02F0, 0x02F0, 0x0300, 0x0310,
        0x0330, 0x0350, 0x03C0, 0x0410, 0x0470, 0x04A0, 0x0460, 0x0440, 0x0450, 0x04E0,
    ],
    // 44.1 kHz
    [
        0x04F0, 0x04F0, 0x0460, 0x0410, 0x03E0, 0x03D0, 0x03C0, 0x03B0, 0x03B0, 0x03A0,
        0x03A0, 0x03A0, 0x03A0, 0x03A0, 0x0390, 0x0390, 0x0390, 0x0380, 0x0380, 0x0380,
        0x0370, 0x0370, 0x0360, 0x0360, 0x0350, 0x0350, 0x0340, 0x0340, 0x0320, 0x0310,
        0x0300, 0x02F0, 0x02F0, 0x02F0, 0x02F0, 0x0300, 0x0320, 0x0350, 0x0390, 0x03E0,
        0x0420, 0x0450, 0x04A0, 0x0490, 0x0460, 0x0440, 0x0480, 0x0630, 0x0840, 0x0840,
    ],
    // 48 kHz
    [
        0x04D0, 0x04D0, 0x0440, 0x0400, 0x03E0, 0x03C0, 0x03B0, 0x03B0, 0x03A0, 0x03A0,
        0x03A0, 0x03A0, 0x03A0, 0x0390, 0x0390, 0x0390, 0x0380, 0x0380, 0x0370, 0x0370,
        0x0360, 0x0360, 0x0350, 0x0350, 0x0340, 0x0340, 0x0330, 0x0320, 0x0310, 0x0300,
        0x02F0, 0x02F0, 0x02F0, 0x02F0, 0x0300, 0x0310, 0x0340, 0x0390, 0x03E0, 0x0420,
        0x0460, 0x0490, 0x04A0, 0x0460, 0x0440, 0x0440, 0x0520, 0x0800, 0x0840, 0x0840,
    ],
];

/// Allocation pointer for each masked PSD address.
pub const BAP: [u8; 64] = [
     0,  1,  1,  1,  1,  1,  2,  2,  3,  3,  3,  4,  4,  5,  5,  6,
     6,  6,  6,  7,  7,  7,  7,  8,  8,  8,  8,  9,  9,  9,  9, 10,
    10, 10, 10, 11, 11, 11, 11, 12, 12, 12, 12, 13, 13, 13, 13, 14,
    14, 14, 14, 14, 14, 14, 14, 15, 15, 15, 15, 15, 15, 15, 15, 15,
];

/// Mantissa width in bits for the raw quantizers, bap 6..=15.
pub const RAW_MANTISSA_BITS: [u32; 10] = [5, 6, 7, 8, 9, 10, 11, 12, 14, 16];

/// Symmetric quantizer levels in 16-bit fixed point.
const fn quantizer_levels<const N: usize>() -> [i32; N] {
    let mut levels = [0i32; N];
    let mut i = 0;
    while i < N {
        levels[i] = ((2 * i as i32 - N as i32 + 1) << 15) / N as i32;
        i += 1;
    }

    levels
}

pub const LEVELS_3: [i32; 3] = quantizer_levels::<3>();
pub const LEVELS_5: [i32; 5] = quantizer_levels::<5>();
pub const LEVELS_7: [i32; 7] = quantizer_levels::<7>();
pub const LEVELS_11: [i32; 11] = quantizer_levels::<11>();
pub const LEVELS_15: [i32; 15] = quantizer_levels::<15>();

/// Rematrixing band edges in stereo mode.
pub const REMATRIX_BANDS: [usize; 5] = [13, 25, 37, 61, 253];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_rows() {
        assert_eq!(FRAME_SIZES[0], (32, [96, 69, 64]));
        assert_eq!(FRAME_SIZES[1], (32, [96, 70, 64]));
        assert_eq!(FRAME_SIZES[17], (128, [384, 279, 256]));
        assert_eq!(FRAME_SIZES[37], (640, [1920, 1394, 1280]));

        for (bit_rate, sizes) in FRAME_SIZES {
            assert_eq!(sizes[0], bit_rate * 3);
            assert_eq!(sizes[2], bit_rate * 2);
        }
    }

    #[test]
    fn exponent_deltas() {
        assert_eq!(EXPONENT_DELTAS[0], [-2, -2, -2]);
        assert_eq!(EXPONENT_DELTAS[62], [0, 0, 0]);
        assert_eq!(EXPONENT_DELTAS[124], [2, 2, 2]);
        assert_eq!(EXPONENT_DELTAS[125], [25, 25, 25]);
        assert_eq!(EXPONENT_DELTAS[127], [25, 25, 25]);
    }

    #[test]
    fn band_map_covers_all_coded_bins() {
        assert_eq!(BIN_TO_BAND[0], 0);
        assert_eq!(BIN_TO_BAND[27], 27);
        assert_eq!(BIN_TO_BAND[28], 28);
        assert_eq!(BIN_TO_BAND[30], 28);
        assert_eq!(BIN_TO_BAND[252], 49);
        assert_eq!(BIN_TO_BAND[253], 0);

        for band in 1..MAX_BANDS {
            assert_eq!(
                BAND_START[band],
                BAND_START[band - 1] + BAND_SIZE[band - 1]
            );
        }
    }

    #[test]
    fn quantizer_levels_are_symmetric() {
        assert_eq!(LEVELS_3, [-21845, 0, 21845]);
        assert_eq!(LEVELS_5, [-26214, -13107, 0, 13107, 26214]);
        assert_eq!(LEVELS_7[0], -LEVELS_7[6]);
        assert_eq!(LEVELS_11[5], 0);
        assert_eq!(LEVELS_15[14], 30583);
    }
}
