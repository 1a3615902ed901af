// pxbi-parsers/src/cursor.rs
//! Position-tracking byte cursor
//!
//! Wraps any `Read + Seek` source and exposes typed reads with an explicit
//! byte order, bounds-checked seeks and the position checks used to validate
//! declared pointers. Every read is checked against the stream length before
//! any buffer is allocated.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{ByteOrder, ReadBytesExt};
use tracing::trace;

use crate::traits::{ParseError, ParseResult};

/// Sequential reader over a seekable byte source
#[derive(Debug)]
pub struct ByteCursor<R> {
    inner: R,
    position: u64,
    len: u64,
}

impl<R: Read + Seek> ByteCursor<R> {
    /// Wrap a reader, positioning the cursor at offset 0
    pub fn new(mut inner: R) -> ParseResult<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            position: 0,
            len,
        })
    }

    /// Current absolute offset
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Total length of the underlying stream
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Bytes left between the cursor and the end of the stream
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.position)
    }

    fn ensure(&self, requested: u64) -> ParseResult<()> {
        let available = self.remaining();
        if requested > available {
            return Err(ParseError::UnexpectedEndOfStream {
                offset: self.position,
                requested,
                available,
            });
        }
        Ok(())
    }

    fn ensure_elements(&self, count: usize, width: u64) -> ParseResult<()> {
        let requested = (count as u64).checked_mul(width).unwrap_or(u64::MAX);
        self.ensure(requested)
    }

    /// Move to an absolute offset (at most the stream length)
    pub fn seek(&mut self, offset: u64) -> ParseResult<()> {
        if offset > self.len {
            return Err(ParseError::UnexpectedEndOfStream {
                offset: self.position,
                requested: offset - self.position,
                available: self.remaining(),
            });
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        Ok(())
    }

    /// Fail unless the cursor sits exactly at `expected`
    pub fn assert_position(&self, region: &'static str, expected: u64) -> ParseResult<()> {
        if self.position != expected {
            return Err(ParseError::MisalignedPointer {
                region,
                expected,
                actual: self.position,
            });
        }
        trace!(region, offset = expected, "Pointer checkpoint");
        Ok(())
    }

    /// Skip forward to `target`; moving backwards is a layout violation
    pub fn skip_to(&mut self, region: &'static str, target: u64) -> ParseResult<()> {
        if target < self.position {
            return Err(ParseError::MisalignedPointer {
                region,
                expected: target,
                actual: self.position,
            });
        }
        self.seek(target)
    }

    /// Advance to the next multiple of `alignment`
    pub fn align_to(&mut self, alignment: u64) -> ParseResult<()> {
        let padding = (alignment - self.position % alignment) % alignment;
        self.ensure(padding)?;
        self.seek(self.position + padding)
    }

    /// Fail if any byte remains after the cursor
    pub fn expect_end(&self) -> ParseResult<()> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(ParseError::TrailingData {
                offset: self.position,
                remaining,
            }),
        }
    }

    pub fn read_u8(&mut self) -> ParseResult<u8> {
        self.ensure(1)?;
        let value = self.inner.read_u8()?;
        self.position += 1;
        Ok(value)
    }

    pub fn read_u16<B: ByteOrder>(&mut self) -> ParseResult<u16> {
        self.ensure(2)?;
        let value = self.inner.read_u16::<B>()?;
        self.position += 2;
        Ok(value)
    }

    pub fn read_i16<B: ByteOrder>(&mut self) -> ParseResult<i16> {
        self.ensure(2)?;
        let value = self.inner.read_i16::<B>()?;
        self.position += 2;
        Ok(value)
    }

    pub fn read_u32<B: ByteOrder>(&mut self) -> ParseResult<u32> {
        self.ensure(4)?;
        let value = self.inner.read_u32::<B>()?;
        self.position += 4;
        Ok(value)
    }

    pub fn read_f32<B: ByteOrder>(&mut self) -> ParseResult<f32> {
        self.ensure(4)?;
        let value = self.inner.read_f32::<B>()?;
        self.position += 4;
        Ok(value)
    }

    /// Read `count` consecutive u16 values
    pub fn read_u16_array<B: ByteOrder>(&mut self, count: usize) -> ParseResult<Vec<u16>> {
        self.ensure_elements(count, 2)?;
        let mut values = vec![0u16; count];
        self.inner.read_u16_into::<B>(&mut values)?;
        self.position += count as u64 * 2;
        Ok(values)
    }

    /// Read `count` consecutive i16 values
    pub fn read_i16_array<B: ByteOrder>(&mut self, count: usize) -> ParseResult<Vec<i16>> {
        self.ensure_elements(count, 2)?;
        let mut values = vec![0i16; count];
        self.inner.read_i16_into::<B>(&mut values)?;
        self.position += count as u64 * 2;
        Ok(values)
    }

    /// Read `count` consecutive u32 values
    pub fn read_u32_array<B: ByteOrder>(&mut self, count: usize) -> ParseResult<Vec<u32>> {
        self.ensure_elements(count, 4)?;
        let mut values = vec![0u32; count];
        self.inner.read_u32_into::<B>(&mut values)?;
        self.position += count as u64 * 4;
        Ok(values)
    }

    /// Read `count` consecutive f32 values
    pub fn read_f32_array<B: ByteOrder>(&mut self, count: usize) -> ParseResult<Vec<f32>> {
        self.ensure_elements(count, 4)?;
        let mut values = vec![0f32; count];
        self.inner.read_f32_into::<B>(&mut values)?;
        self.position += count as u64 * 4;
        Ok(values)
    }

    /// Read a fixed number of f32 values into an array
    pub fn read_f32_fixed<B: ByteOrder, const N: usize>(&mut self) -> ParseResult<[f32; N]> {
        self.ensure_elements(N, 4)?;
        let mut values = [0f32; N];
        self.inner.read_f32_into::<B>(&mut values)?;
        self.position += N as u64 * 4;
        Ok(values)
    }

    /// Read `len` raw bytes
    pub fn read_bytes(&mut self, len: usize) -> ParseResult<Vec<u8>> {
        self.ensure(len as u64)?;
        let mut buffer = vec![0u8; len];
        self.inner.read_exact(&mut buffer)?;
        self.position += len as u64;
        Ok(buffer)
    }

    /// Read exactly `N` raw bytes into an array
    pub fn read_array<const N: usize>(&mut self) -> ParseResult<[u8; N]> {
        self.ensure(N as u64)?;
        let mut buffer = [0u8; N];
        self.inner.read_exact(&mut buffer)?;
        self.position += N as u64;
        Ok(buffer)
    }

    /// Read a fixed-length ASCII field
    pub fn read_ascii(&mut self, len: usize) -> ParseResult<String> {
        let offset = self.position;
        let bytes = self.read_bytes(len)?;
        ascii_to_string(bytes, offset)
    }

    /// Read a u32 that must equal a format constant
    pub fn read_const_u32<B: ByteOrder>(&mut self, field: &'static str, expected: u32) -> ParseResult<u32> {
        let actual = self.read_u32::<B>()?;
        if actual != expected {
            return Err(ParseError::ConstantMismatch {
                field,
                expected: u64::from(expected),
                actual: u64::from(actual),
            });
        }
        Ok(actual)
    }

    /// Read a u32 padding field that must be zero
    pub fn read_zero_u32<B: ByteOrder>(&mut self, field: &'static str) -> ParseResult<()> {
        self.read_const_u32::<B>(field, 0).map(|_| ())
    }

    /// Read a null-terminated ASCII string at an absolute offset
    ///
    /// The cursor position is restored afterwards, whether or not the read
    /// succeeds.
    pub fn read_cstring_at(&mut self, offset: u64) -> ParseResult<String> {
        let saved = self.position;
        let result = self.read_cstring_from(offset);
        self.seek(saved)?;
        result
    }

    fn read_cstring_from(&mut self, offset: u64) -> ParseResult<String> {
        self.seek(offset)?;
        let mut bytes = Vec::new();
        loop {
            match self.read_u8()? {
                0 => break,
                byte => bytes.push(byte),
            }
        }
        ascii_to_string(bytes, offset)
    }
}

fn ascii_to_string(bytes: Vec<u8>, offset: u64) -> ParseResult<String> {
    if !bytes.is_ascii() {
        return Err(ParseError::InvalidString { offset });
    }
    String::from_utf8(bytes).map_err(|_| ParseError::InvalidString { offset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, LittleEndian};
    use std::io::Cursor;

    fn cursor(bytes: &[u8]) -> ByteCursor<Cursor<Vec<u8>>> {
        ByteCursor::new(Cursor::new(bytes.to_vec())).unwrap()
    }

    #[test]
    fn test_big_endian_reads() {
        let mut c = cursor(&[0x00, 0x00, 0x00, 0x40, 0x01, 0x02, 0xFF, 0xFE, 0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(c.read_u32::<BigEndian>().unwrap(), 64);
        assert_eq!(c.read_u16::<BigEndian>().unwrap(), 0x0102);
        assert_eq!(c.read_i16::<BigEndian>().unwrap(), -2);
        assert_eq!(c.read_f32::<BigEndian>().unwrap(), 1.0);
        assert_eq!(c.tell(), 12);
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn test_little_endian_read() {
        let mut c = cursor(&[0x40, 0x00, 0x00, 0x00]);
        assert_eq!(c.read_u32::<LittleEndian>().unwrap(), 64);
    }

    #[test]
    fn test_read_past_end() {
        let mut c = cursor(&[0x01, 0x02]);
        let err = c.read_u32::<BigEndian>().unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedEndOfStream { offset: 0, requested: 4, available: 2 }
        ));
        // A failed read does not move the cursor
        assert_eq!(c.tell(), 0);
    }

    #[test]
    fn test_huge_array_count_fails_before_allocating() {
        let mut c = cursor(&[0u8; 8]);
        assert!(matches!(
            c.read_f32_array::<BigEndian>(usize::MAX / 2),
            Err(ParseError::UnexpectedEndOfStream { .. })
        ));
    }

    #[test]
    fn test_assert_position() {
        let mut c = cursor(&[0u8; 16]);
        c.seek(8).unwrap();
        assert!(c.assert_position("mesh", 8).is_ok());
        match c.assert_position("mesh", 12) {
            Err(ParseError::MisalignedPointer { region, expected, actual }) => {
                assert_eq!(region, "mesh");
                assert_eq!(expected, 12);
                assert_eq!(actual, 8);
            }
            other => panic!("Expected MisalignedPointer, got {other:?}"),
        }
    }

    #[test]
    fn test_skip_to_rejects_backwards() {
        let mut c = cursor(&[0u8; 16]);
        c.seek(10).unwrap();
        assert!(matches!(
            c.skip_to("bones", 4),
            Err(ParseError::MisalignedPointer { expected: 4, actual: 10, .. })
        ));
        c.skip_to("bones", 16).unwrap();
        assert_eq!(c.tell(), 16);
        assert!(matches!(
            c.skip_to("bones", 17),
            Err(ParseError::UnexpectedEndOfStream { .. })
        ));
    }

    #[test]
    fn test_cstring_restores_position() {
        let mut c = cursor(b"\x00\x00\x00\x01skel\x00mesh\x00");
        c.seek(2).unwrap();
        assert_eq!(c.read_cstring_at(4).unwrap(), "skel");
        assert_eq!(c.tell(), 2);
        assert_eq!(c.read_cstring_at(9).unwrap(), "mesh");
        assert_eq!(c.read_cstring_at(8).unwrap(), "");
        assert_eq!(c.tell(), 2);
    }

    #[test]
    fn test_cstring_errors_restore_position() {
        let mut c = cursor(b"ab\xC3\x00cd");
        c.seek(1).unwrap();
        assert!(matches!(c.read_cstring_at(0), Err(ParseError::InvalidString { offset: 0 })));
        assert_eq!(c.tell(), 1);
        // Unterminated
        assert!(matches!(
            c.read_cstring_at(4),
            Err(ParseError::UnexpectedEndOfStream { .. })
        ));
        assert_eq!(c.tell(), 1);
    }

    #[test]
    fn test_align_to() {
        let mut c = cursor(&[0u8; 12]);
        c.seek(6).unwrap();
        c.align_to(4).unwrap();
        assert_eq!(c.tell(), 8);
        c.align_to(4).unwrap();
        assert_eq!(c.tell(), 8);
    }

    #[test]
    fn test_constants_and_padding() {
        let mut c = cursor(&[0, 0, 0, 64, 0, 0, 0, 3, 0, 0, 0, 1]);
        assert_eq!(c.read_const_u32::<BigEndian>("base_offset", 64).unwrap(), 64);
        assert!(matches!(
            c.read_const_u32::<BigEndian>("tag_count", 4),
            Err(ParseError::ConstantMismatch { field: "tag_count", expected: 4, actual: 3 })
        ));
        assert!(matches!(
            c.read_zero_u32::<BigEndian>("padding"),
            Err(ParseError::ConstantMismatch { actual: 1, .. })
        ));
    }

    #[test]
    fn test_expect_end() {
        let mut c = cursor(&[1, 2, 3]);
        c.seek(1).unwrap();
        assert!(matches!(
            c.expect_end(),
            Err(ParseError::TrailingData { offset: 1, remaining: 2 })
        ));
        c.seek(3).unwrap();
        assert!(c.expect_end().is_ok());
    }

    #[test]
    fn test_read_ascii() {
        let mut c = cursor(b"PXBIMDL1");
        assert_eq!(c.read_ascii(4).unwrap(), "PXBI");
        assert_eq!(c.read_array::<4>().unwrap(), *b"MDL1");
    }
}
