//! Bit-level writer for encoding packed binary data.

use crate::error::{BitError, BitResult};

/// Maximum length accepted by the `u16` length prefix of byte arrays and strings.
pub const MAX_PREFIXED_LEN: usize = u16::MAX as usize;

/// A growable bit-level writer.
///
/// Scalars are written byte-aligned with a fixed width per type (little-endian),
/// so the size of a message is a pure function of its layout. Sub-byte fields
/// use [`write_bit`](Self::write_bit) and [`write_bits`](Self::write_bits).
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    /// Completed bytes.
    bytes: Vec<u8>,
    /// Current byte being written (not yet pushed to bytes).
    current_byte: u8,
    /// Number of bits written to `current_byte` (0-7).
    bit_count: u8,
}

impl BitWriter {
    /// Creates a new empty `BitWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `BitWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            current_byte: 0,
            bit_count: 0,
        }
    }

    /// Returns the number of bits written so far.
    #[must_use]
    pub fn bits_written(&self) -> usize {
        self.bytes.len() * 8 + self.bit_count as usize
    }

    /// Returns the number of bytes the finished buffer will occupy.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bytes.len() + usize::from(self.bit_count > 0)
    }

    /// Writes a single bit.
    pub fn write_bit(&mut self, value: bool) {
        self.current_byte = (self.current_byte << 1) | u8::from(value);
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.bytes.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// Writes up to 64 bits from an unsigned integer, most significant bit first.
    pub fn write_bits(&mut self, value: u64, bits: u8) -> BitResult<()> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 64 });
        }
        if bits == 0 {
            return Ok(());
        }
        if bits < 64 && value >= (1u64 << bits) {
            return Err(BitError::ValueOutOfRange { value, bits });
        }
        if self.bit_count == 0 && bits % 8 == 0 {
            let bytes = value.to_be_bytes();
            self.bytes.extend_from_slice(&bytes[8 - bits as usize / 8..]);
            return Ok(());
        }
        for i in (0..bits).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
        Ok(())
    }

    /// Pads with zero bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        while self.bit_count != 0 {
            self.write_bit(false);
        }
    }

    /// Writes a byte-aligned `bool` as one full byte.
    pub fn write_bool_aligned(&mut self, value: bool) -> BitResult<()> {
        self.write_u8_aligned(u8::from(value))
    }

    /// Writes a byte-aligned `u8`.
    pub fn write_u8_aligned(&mut self, value: u8) -> BitResult<()> {
        self.ensure_aligned()?;
        self.bytes.push(value);
        Ok(())
    }

    /// Writes a byte-aligned `u16` (little-endian).
    pub fn write_u16_aligned(&mut self, value: u16) -> BitResult<()> {
        self.write_aligned_bytes(&value.to_le_bytes())
    }

    /// Writes a byte-aligned `u32` (little-endian).
    pub fn write_u32_aligned(&mut self, value: u32) -> BitResult<()> {
        self.write_aligned_bytes(&value.to_le_bytes())
    }

    /// Writes a byte-aligned `u64` (little-endian).
    pub fn write_u64_aligned(&mut self, value: u64) -> BitResult<()> {
        self.write_aligned_bytes(&value.to_le_bytes())
    }

    /// Writes a byte-aligned `i8`.
    pub fn write_i8_aligned(&mut self, value: i8) -> BitResult<()> {
        self.write_aligned_bytes(&value.to_le_bytes())
    }

    /// Writes a byte-aligned `i16` (little-endian).
    pub fn write_i16_aligned(&mut self, value: i16) -> BitResult<()> {
        self.write_aligned_bytes(&value.to_le_bytes())
    }

    /// Writes a byte-aligned `i32` (little-endian).
    pub fn write_i32_aligned(&mut self, value: i32) -> BitResult<()> {
        self.write_aligned_bytes(&value.to_le_bytes())
    }

    /// Writes a byte-aligned `i64` (little-endian).
    pub fn write_i64_aligned(&mut self, value: i64) -> BitResult<()> {
        self.write_aligned_bytes(&value.to_le_bytes())
    }

    /// Writes a byte-aligned `f32` as its IEEE-754 bit pattern.
    pub fn write_f32_aligned(&mut self, value: f32) -> BitResult<()> {
        self.write_aligned_bytes(&value.to_bits().to_le_bytes())
    }

    /// Writes a byte-aligned `f64` as its IEEE-754 bit pattern.
    pub fn write_f64_aligned(&mut self, value: f64) -> BitResult<()> {
        self.write_aligned_bytes(&value.to_bits().to_le_bytes())
    }

    /// Writes a `u16` length prefix followed by the raw bytes.
    pub fn write_bytes_aligned(&mut self, value: &[u8]) -> BitResult<()> {
        let len = prefix_len(value.len())?;
        self.write_u16_aligned(len)?;
        self.write_aligned_bytes(value)
    }

    /// Writes a `u16` length prefix followed by the UTF-8 bytes of `value`.
    pub fn write_str_aligned(&mut self, value: &str) -> BitResult<()> {
        self.write_bytes_aligned(value.as_bytes())
    }

    /// Writes a `u16` element count followed by each element as an `i32`.
    pub fn write_i32_array_aligned(&mut self, values: &[i32]) -> BitResult<()> {
        let len = prefix_len(values.len())?;
        self.write_u16_aligned(len)?;
        for value in values {
            self.write_i32_aligned(*value)?;
        }
        Ok(())
    }

    /// Appends already-encoded bytes with no length prefix.
    pub fn write_raw_aligned(&mut self, bytes: &[u8]) -> BitResult<()> {
        self.write_aligned_bytes(bytes)
    }

    /// Finishes writing and returns the byte buffer.
    ///
    /// If the last byte is incomplete, it is padded with zeros on the right.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.current_byte <<= 8 - self.bit_count;
            self.bytes.push(self.current_byte);
        }
        self.bytes
    }

    /// Finishes writing and appends to the provided buffer.
    pub fn finish_into(self, buf: &mut Vec<u8>) {
        let mut bytes = self.finish();
        buf.append(&mut bytes);
    }

    fn ensure_aligned(&self) -> BitResult<()> {
        if self.bit_count != 0 {
            return Err(BitError::MisalignedAccess {
                bit_position: self.bits_written(),
            });
        }
        Ok(())
    }

    fn write_aligned_bytes(&mut self, bytes: &[u8]) -> BitResult<()> {
        self.ensure_aligned()?;
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }
}

fn prefix_len(len: usize) -> BitResult<u16> {
    u16::try_from(len).map_err(|_| BitError::LengthOverflow {
        length: len,
        max: MAX_PREFIXED_LEN,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_writer() {
        let writer = BitWriter::new();
        assert_eq!(writer.bits_written(), 0);
        assert!(writer.finish().is_empty());
    }

    #[test]
    fn write_single_bit_true() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        assert_eq!(writer.bits_written(), 1);
        assert_eq!(writer.byte_len(), 1);
        // Single bit 1, padded with 7 zeros
        assert_eq!(writer.finish(), vec![0b1000_0000]);
    }

    #[test]
    fn write_bits_across_byte_boundary() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b1111, 4).unwrap();
        writer.write_bits(0b1010_1010, 8).unwrap();
        assert_eq!(writer.finish(), vec![0b1111_1010, 0b1010_0000]);
    }

    #[test]
    fn write_bits_aligned_fast_path_is_big_endian() {
        let mut writer = BitWriter::new();
        writer.write_bits(0x0102_0304_0506, 48).unwrap();
        assert_eq!(writer.finish(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn raw_append_requires_alignment() {
        let mut writer = BitWriter::new();
        writer.write_raw_aligned(&[7, 8]).unwrap();
        writer.write_bit(true);
        assert!(writer.write_raw_aligned(&[9]).is_err());
        assert_eq!(writer.finish(), vec![7, 8, 0b1000_0000]);
    }

    #[test]
    fn write_bits_invalid_count() {
        let mut writer = BitWriter::new();
        let result = writer.write_bits(0, 65);
        assert!(matches!(
            result,
            Err(BitError::InvalidBitCount {
                bits: 65,
                max_bits: 64
            })
        ));
    }

    #[test]
    fn write_bits_value_out_of_range() {
        let mut writer = BitWriter::new();
        let result = writer.write_bits(256, 8);
        assert!(matches!(
            result,
            Err(BitError::ValueOutOfRange { value: 256, bits: 8 })
        ));
    }

    #[test]
    fn aligned_writes_are_little_endian() {
        let mut writer = BitWriter::new();
        writer.write_u16_aligned(0xBEEF).unwrap();
        writer.write_i32_aligned(-2).unwrap();
        assert_eq!(writer.finish(), vec![0xEF, 0xBE, 0xFE, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn aligned_write_after_partial_byte_fails() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        let err = writer.write_u8_aligned(1).unwrap_err();
        assert!(matches!(err, BitError::MisalignedAccess { bit_position: 1 }));
        writer.align_to_byte();
        writer.write_u8_aligned(1).unwrap();
        assert_eq!(writer.finish(), vec![0b1000_0000, 1]);
    }

    #[test]
    fn bytes_are_length_prefixed() {
        let mut writer = BitWriter::new();
        writer.write_bytes_aligned(&[9, 8, 7]).unwrap();
        assert_eq!(writer.finish(), vec![3, 0, 9, 8, 7]);
    }

    #[test]
    fn oversized_bytes_rejected() {
        let mut writer = BitWriter::new();
        let big = vec![0u8; MAX_PREFIXED_LEN + 1];
        let err = writer.write_bytes_aligned(&big).unwrap_err();
        assert!(matches!(err, BitError::LengthOverflow { .. }));
    }

    #[test]
    fn finish_into() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xAB, 8).unwrap();

        let mut buf = vec![0x00, 0x11];
        writer.finish_into(&mut buf);
        assert_eq!(buf, vec![0x00, 0x11, 0xAB]);
    }
}
