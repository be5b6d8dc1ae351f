//! Bit-level frame synthesis for unit tests.

use bitstream_io::{BigEndian, BitWrite, BitWriter};

use crate::utils::crc::{CRC_FRAME_ALG, Crc16, head_region_len};

const CRC: Crc16 = Crc16::new(&CRC_FRAME_ALG);

/// MSB-first bit writer collecting into a byte vector.
pub struct BitSink {
    writer: BitWriter<Vec<u8>, BigEndian>,
    bits: u64,
}

impl Default for BitSink {
    fn default() -> Self {
        Self {
            writer: BitWriter::endian(Vec::new(), BigEndian),
            bits: 0,
        }
    }
}

impl BitSink {
    pub fn put(&mut self, bits: u32, value: u32) {
        assert!(bits == 32 || value >> bits == 0, "{value} does not fit {bits} bits");
        self.writer
            .write_unsigned_var::<u32>(bits, value)
            .expect("writing to a vector");
        self.bits += bits as u64;
    }

    pub fn put_flag(&mut self, flag: bool) {
        self.put(1, flag as u32);
    }

    /// Writes the low `bits` bits of a signed value.
    pub fn put_signed(&mut self, bits: u32, value: i32) {
        let mask = if bits == 32 { u32::MAX } else { (1 << bits) - 1 };
        self.put(bits, value as u32 & mask);
    }

    pub fn bits_written(&self) -> u64 {
        self.bits
    }

    /// Pads with zero bits to a byte boundary and returns the bytes.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.writer.byte_align().expect("writing to a vector");
        self.writer.into_writer()
    }
}

/// Minimal BSI with `bsid = 8`, no optional fields and dialnorm 31.
pub fn put_bsi(sink: &mut BitSink, acmod: u8, lfe_on: bool) {
    sink.put(5, 8);
    sink.put(3, 0);
    sink.put(3, acmod as u32);
    if acmod & 1 != 0 && acmod != 1 {
        sink.put(2, 0);
    }
    if acmod & 4 != 0 {
        sink.put(2, 0);
    }
    if acmod == 2 {
        sink.put(2, 0);
    }
    sink.put_flag(lfe_on);

    let programs = if acmod == 0 { 2 } else { 1 };
    for _ in 0..programs {
        sink.put(5, 31);
        sink.put(3, 0);
    }

    // copyrightb, origbs, timecod1e, timecod2e, addbsie
    sink.put(5, 0);
}

/// Builds a complete syncframe around `body`.
///
/// `body` writes everything after `frmsizecod`. The frame is zero padded to
/// its table length and both CRC words are filled in.
pub fn build_frame(fscod: u8, frmsizecod: u8, body: impl FnOnce(&mut BitSink)) -> Vec<u8> {
    let (_, sizes) = crate::utils::tables::FRAME_SIZES[frmsizecod as usize];
    let frame_len = sizes[fscod as usize] as usize * 2;

    let mut sink = BitSink::default();
    sink.put(16, 0x0B77);
    sink.put(16, 0);
    sink.put(2, fscod as u32);
    sink.put(6, frmsizecod as u32);
    body(&mut sink);

    let mut frame = sink.into_bytes();
    assert!(frame.len() + 2 <= frame_len, "payload does not fit the frame");
    frame.resize(frame_len, 0);

    seal_frame(&mut frame);
    frame
}

/// Recomputes both CRC words of a frame in place.
pub fn seal_frame(frame: &mut [u8]) {
    let frame_len = frame.len();
    let head_len = head_region_len(frame_len);

    // crc1 leads its own region, so solve for it by search
    let crc1 = (0..=u16::MAX)
        .find(|&candidate| {
            let word = candidate.to_be_bytes();
            let crc = CRC.update(CRC.init, &word);
            CRC.update(crc, &frame[4..head_len]) == 0
        })
        .expect("crc1 solution");
    frame[2..4].copy_from_slice(&crc1.to_be_bytes());

    let crc2 = CRC.checksum(&frame[2..frame_len - 2]);
    frame[frame_len - 2..].copy_from_slice(&crc2.to_be_bytes());
}

/// Side information of an uncoupled stereo audio block.
#[derive(Debug, Clone, Copy, Default)]
pub struct StereoBlock {
    pub dither: bool,
    /// Sends `cplstre = 1, cplinu = 0`.
    pub coupling_off: bool,
    pub rematrix: Option<[bool; 4]>,
    /// D15 exponents for both channels as `(chbwcod, absexp)`, all deltas
    /// zero.
    pub exponents: Option<(u32, u32)>,
    /// Allocation parameters and `(csnroffst, fsnroffst)` for both channels.
    pub snr: Option<(u32, u32)>,
    /// `skipl`, followed by that many 0xFF filler bytes.
    pub skip: Option<u32>,
    /// Writes the LFE fields of a stream with `lfeon = 1`.
    pub lfe_on: bool,
    /// D15 LFE exponents as `absexp`, all deltas zero.
    pub lfe_exponents: Option<u32>,
}

impl StereoBlock {
    /// First block of a frame with flat exponents.
    pub fn first(absexp: u32, snr: (u32, u32)) -> Self {
        Self {
            dither: false,
            coupling_off: true,
            rematrix: Some([false; 4]),
            exponents: Some((0, absexp)),
            snr: Some(snr),
            skip: None,
            lfe_on: false,
            lfe_exponents: None,
        }
    }
}

/// Exponent group code for three zero deltas.
pub const FLAT_EXPONENTS: u32 = 62;

/// Writes everything of a stereo block up to the mantissas.
pub fn put_stereo_block(sink: &mut BitSink, block: &StereoBlock) {
    sink.put(2, 0); // blksw
    sink.put(2, if block.dither { 0b11 } else { 0 });
    sink.put(1, 0); // dynrnge

    sink.put_flag(block.coupling_off);
    if block.coupling_off {
        sink.put(1, 0);
    }

    sink.put_flag(block.rematrix.is_some());
    if let Some(flags) = block.rematrix {
        for flag in flags {
            sink.put_flag(flag);
        }
    }

    let strategy = if block.exponents.is_some() { 1 } else { 0 };
    sink.put(2, strategy);
    sink.put(2, strategy);
    if block.lfe_on {
        sink.put_flag(block.lfe_exponents.is_some());
    }

    if let Some((bandwidth, absexp)) = block.exponents {
        sink.put(6, bandwidth);
        sink.put(6, bandwidth);

        let groups = (3 * bandwidth + 73 - 1) / 3;
        for _ in 0..2 {
            sink.put(4, absexp);
            for _ in 0..groups {
                sink.put(7, FLAT_EXPONENTS);
            }
            sink.put(2, 0); // gainrng
        }
    }
    if let Some(absexp) = block.lfe_exponents {
        sink.put(4, absexp);
        for _ in 0..2 {
            sink.put(7, FLAT_EXPONENTS);
        }
    }

    sink.put_flag(block.snr.is_some()); // baie
    if let Some((coarse, fine)) = block.snr {
        sink.put(2, 2);
        sink.put(2, 1);
        sink.put(2, 1);
        sink.put(2, 2);
        sink.put(3, 7);

        sink.put(1, 1); // snroffste
        sink.put(6, coarse);
        let channels = if block.lfe_on { 3 } else { 2 };
        for _ in 0..channels {
            sink.put(4, fine);
            sink.put(3, 4);
        }
    } else {
        sink.put(1, 0);
    }

    sink.put(1, 0); // deltbaie

    sink.put_flag(block.skip.is_some());
    if let Some(len) = block.skip {
        sink.put(9, len);
        for _ in 0..len {
            sink.put(8, 0xFF);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_frames_pass_both_checks() {
        let frame = build_frame(0, 0, |sink| put_bsi(sink, 2, false));
        assert_eq!(frame.len(), 192);

        assert_eq!(CRC.remainder(&frame[2..head_region_len(192)]), 0);
        assert_eq!(CRC.remainder(&frame[2..]), 0);
    }
}
