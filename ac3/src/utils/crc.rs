//! CRC validation for AC-3 frames.
//!
//! Both frame CRC words use the generator `x^16 + x^15 + x^2 + 1`. The register
//! is fed the protected bytes including the transmitted CRC word, so a valid
//! region leaves a zero remainder.

/// CRC algorithm specification with polynomial and initial value.
pub struct Algorithm<T> {
    poly: T,
    init: T,
}

/// CRC-16 algorithm protecting the syncframe.
pub const CRC_FRAME_ALG: Algorithm<u16> = Algorithm {
    poly: 0x8005,
    init: 0x0000,
};

/// Shifts `len` zero bits through a CRC-16 register seeded with `value` in
/// its high byte.
#[inline(always)]
pub const fn crc16(poly: u16, mut value: u16, len: usize) -> u16 {
    value <<= 8;

    let mut i = 0;
    while i < len {
        value = (value << 1) ^ (((value >> 15) & 1) * poly);
        i += 1;
    }

    value
}

const fn crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc16(poly, i as u16, 8);
        i += 1;
    }

    table
}

#[derive(Debug)]
pub struct Crc16 {
    pub poly: u16,
    pub init: u16,
    table: [u16; 256],
}

impl Crc16 {
    pub const fn new(algorithm: &Algorithm<u16>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc16_table(algorithm.poly),
        }
    }

    const fn table_entry(&self, index: u16) -> u16 {
        self.table[(index & 0xFF) as usize]
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u16, bytes: &[u8]) -> u16 {
        let mut i = 0;

        while i < bytes.len() {
            crc = self.table_entry(crc >> 8) ^ (crc << 8) ^ bytes[i] as u16;
            i += 1;
        }

        crc
    }

    /// Remainder of `bytes` with the register starting at `init`.
    pub const fn remainder(&self, bytes: &[u8]) -> u16 {
        self.update(self.init, bytes)
    }

    /// Value that, appended to `bytes`, leaves a zero remainder.
    pub const fn checksum(&self, bytes: &[u8]) -> u16 {
        self.update(self.remainder(bytes), &[0, 0])
    }
}

/// Byte length of the region covered by `crc1`, sync word included.
pub const fn head_region_len(frame_len: usize) -> usize {
    ((frame_len >> 2) + (frame_len >> 4)) << 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRC: Crc16 = Crc16::new(&CRC_FRAME_ALG);

    #[test]
    fn appended_checksum_leaves_zero_remainder() {
        let mut data = b"123456789".to_vec();
        let crc = CRC.checksum(&data);
        data.extend_from_slice(&crc.to_be_bytes());

        assert_eq!(CRC.remainder(&data), 0);

        data[3] ^= 0x10;
        assert_ne!(CRC.remainder(&data), 0);
    }

    #[test]
    fn matches_bitwise_division() {
        // CRC-16/UMTS check value for "123456789"
        assert_eq!(CRC.checksum(b"123456789"), 0xFEE8);
    }

    #[test]
    fn head_region_is_five_eighths() {
        assert_eq!(head_region_len(128), 80);
        assert_eq!(head_region_len(192), 120);
        assert_eq!(head_region_len(3840), 2400);
    }
}
