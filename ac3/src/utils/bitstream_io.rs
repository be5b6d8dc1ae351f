//! Bitstream I/O utilities for frame parsing.
//!
//! Wraps a big-endian [`BitReader`] with explicit bounds checking so that every
//! read past the end of a frame surfaces as [`io::ErrorKind::UnexpectedEof`]
//! instead of silently producing zero bits.

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, BitReader, SignedInteger, UnsignedInteger};

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

fn out_of_bounds(op: &str, n: u64, position: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("{op}({n}): out of bounds bits at {position}"),
    )
}

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    /// Reads `n` bits as an unsigned value, MSB first.
    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(out_of_bounds(
                "get_n",
                n as u64,
                self.bs.position_in_bits().unwrap_or(0),
            )),
            Err(e) => Err(e),
        }
    }

    /// Reads `n` bits as a two's complement signed value.
    #[inline(always)]
    pub fn get_s<S: SignedInteger>(&mut self, n: u32) -> io::Result<S> {
        match self.bs.read_signed_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(out_of_bounds(
                "get_s",
                n as u64,
                self.bs.position_in_bits().unwrap_or(0),
            )),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs
            .position_in_bits()
            .map(|pos| self.len.saturating_sub(pos))
    }

    /// Skips `count` whole bytes, checking the remaining length up front.
    pub fn skip_bytes(&mut self, count: usize) -> io::Result<()> {
        let bits = count as u64 * 8;
        let avail = self.available()?;
        if bits > avail {
            return Err(out_of_bounds("skip_bytes", count as u64, self.len - avail));
        }

        self.bs.seek_bits(SeekFrom::Current(bits as i64)).map(|_| ())
    }

    /// Reads `count` whole bytes into a new vector.
    pub fn read_bytes(&mut self, count: usize) -> io::Result<Vec<u8>> {
        let avail = self.available()?;
        if count as u64 * 8 > avail {
            return Err(out_of_bounds("read_bytes", count as u64, self.len - avail));
        }

        (0..count).map(|_| self.get_n::<u8>(8)).collect()
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

impl Default for BsIoSliceReader<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_msb_first() -> anyhow::Result<()> {
        let mut reader = BsIoSliceReader::from_slice(&[0x0B, 0x77, 0xF0]);

        assert_eq!(reader.get_n::<u16>(16)?, 0x0B77);
        assert!(reader.get()?);
        assert_eq!(reader.get_s::<i8>(3)?, -1);
        assert_eq!(reader.available()?, 4);
        Ok(())
    }

    #[test]
    fn exhaustion_is_an_error() {
        let mut reader = BsIoSliceReader::from_slice(&[0xFF]);

        let err = reader.get_n::<u16>(9).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut reader = BsIoSliceReader::from_slice(&[0xFF, 0x00]);
        assert!(reader.skip_bytes(3).is_err());
        assert!(reader.read_bytes(3).is_err());
        assert_eq!(reader.position().unwrap(), 0);

        reader.skip_bytes(1).unwrap();
        assert_eq!(reader.position().unwrap(), 8);
        assert_eq!(reader.available().unwrap(), 8);
    }
}
