//! Bit-level reader with bounded operations.

use crate::error::{BitError, BitResult};

/// A bit-level reader for decoding packed binary data.
///
/// All read operations are bounds-checked and return errors on failure.
/// The reader never panics on malformed input.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a new `BitReader` from a byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Returns the number of bits remaining to read.
    #[must_use]
    pub const fn bits_remaining(&self) -> usize {
        self.data
            .len()
            .saturating_mul(8)
            .saturating_sub(self.bit_pos)
    }

    /// Returns `true` if there are no more bits to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bits_remaining() == 0
    }

    /// Returns the current bit position.
    #[must_use]
    pub const fn bit_position(&self) -> usize {
        self.bit_pos
    }

    /// Reads a single bit as a boolean.
    pub fn read_bit(&mut self) -> BitResult<bool> {
        self.ensure_bits(1)?;
        let byte_idx = self.bit_pos / 8;
        let bit_idx = self.bit_pos % 8;
        let bit = (self.data[byte_idx] >> (7 - bit_idx)) & 1;
        self.bit_pos += 1;
        Ok(bit == 1)
    }

    /// Reads up to 64 bits as an unsigned integer, most significant bit first.
    pub fn read_bits(&mut self, bits: u8) -> BitResult<u64> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 64 });
        }
        if bits == 0 {
            return Ok(0);
        }
        self.ensure_bits(bits as usize)?;

        let mut value = 0u64;
        for _ in 0..bits {
            value = (value << 1) | u64::from(self.read_bit()?);
        }
        Ok(value)
    }

    /// Aligns to the next byte boundary.
    pub fn align_to_byte(&mut self) -> BitResult<()> {
        let rem = self.bit_pos % 8;
        if rem == 0 {
            return Ok(());
        }
        let skip = 8 - rem;
        self.ensure_bits(skip)?;
        self.bit_pos += skip;
        Ok(())
    }

    /// Reads a byte-aligned `bool` stored as one full byte.
    ///
    /// Any non-zero byte reads as `true`.
    pub fn read_bool_aligned(&mut self) -> BitResult<bool> {
        Ok(self.read_u8_aligned()? != 0)
    }

    /// Reads a byte-aligned `u8`.
    pub fn read_u8_aligned(&mut self) -> BitResult<u8> {
        let [value] = self.read_aligned_bytes::<1>()?;
        Ok(value)
    }

    /// Reads a byte-aligned `u16` (little-endian).
    pub fn read_u16_aligned(&mut self) -> BitResult<u16> {
        Ok(u16::from_le_bytes(self.read_aligned_bytes::<2>()?))
    }

    /// Reads a byte-aligned `u32` (little-endian).
    pub fn read_u32_aligned(&mut self) -> BitResult<u32> {
        Ok(u32::from_le_bytes(self.read_aligned_bytes::<4>()?))
    }

    /// Reads a byte-aligned `u64` (little-endian).
    pub fn read_u64_aligned(&mut self) -> BitResult<u64> {
        Ok(u64::from_le_bytes(self.read_aligned_bytes::<8>()?))
    }

    /// Reads a byte-aligned `i8`.
    pub fn read_i8_aligned(&mut self) -> BitResult<i8> {
        Ok(i8::from_le_bytes(self.read_aligned_bytes::<1>()?))
    }

    /// Reads a byte-aligned `i16` (little-endian).
    pub fn read_i16_aligned(&mut self) -> BitResult<i16> {
        Ok(i16::from_le_bytes(self.read_aligned_bytes::<2>()?))
    }

    /// Reads a byte-aligned `i32` (little-endian).
    pub fn read_i32_aligned(&mut self) -> BitResult<i32> {
        Ok(i32::from_le_bytes(self.read_aligned_bytes::<4>()?))
    }

    /// Reads a byte-aligned `i64` (little-endian).
    pub fn read_i64_aligned(&mut self) -> BitResult<i64> {
        Ok(i64::from_le_bytes(self.read_aligned_bytes::<8>()?))
    }

    /// Reads a byte-aligned `f32`.
    pub fn read_f32_aligned(&mut self) -> BitResult<f32> {
        Ok(f32::from_bits(self.read_u32_aligned()?))
    }

    /// Reads a byte-aligned `f64`.
    pub fn read_f64_aligned(&mut self) -> BitResult<f64> {
        Ok(f64::from_bits(self.read_u64_aligned()?))
    }

    /// Reads a `u16` length-prefixed byte array, rejecting lengths above `max_len`.
    pub fn read_bytes_aligned(&mut self, max_len: usize) -> BitResult<Vec<u8>> {
        let len = self.read_u16_aligned()? as usize;
        if len > max_len {
            return Err(BitError::LengthOverflow {
                length: len,
                max: max_len,
            });
        }
        self.ensure_aligned()?;
        self.ensure_bits(len * 8)?;
        let start = self.bit_pos / 8;
        let out = self.data[start..start + len].to_vec();
        self.bit_pos += len * 8;
        Ok(out)
    }

    /// Reads a `u16` length-prefixed UTF-8 string, rejecting lengths above `max_len`.
    pub fn read_string_aligned(&mut self, max_len: usize) -> BitResult<String> {
        let bytes = self.read_bytes_aligned(max_len)?;
        String::from_utf8(bytes).map_err(|_| BitError::InvalidUtf8)
    }

    /// Reads a `u16` count-prefixed `i32` array, rejecting counts above `max_len`.
    pub fn read_i32_array_aligned(&mut self, max_len: usize) -> BitResult<Vec<i32>> {
        let len = self.read_u16_aligned()? as usize;
        if len > max_len {
            return Err(BitError::LengthOverflow {
                length: len,
                max: max_len,
            });
        }
        self.ensure_bits(len * 32)?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_i32_aligned()?);
        }
        Ok(out)
    }

    fn ensure_aligned(&self) -> BitResult<()> {
        if self.bit_pos % 8 != 0 {
            return Err(BitError::MisalignedAccess {
                bit_position: self.bit_pos,
            });
        }
        Ok(())
    }

    fn ensure_bits(&self, bits: usize) -> BitResult<()> {
        let available = self.bits_remaining();
        if bits > available {
            return Err(BitError::UnexpectedEof {
                requested: bits,
                available,
            });
        }
        Ok(())
    }

    fn read_aligned_bytes<const N: usize>(&mut self) -> BitResult<[u8; N]> {
        self.ensure_aligned()?;
        self.ensure_bits(N * 8)?;
        let idx = self.bit_pos / 8;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[idx..idx + N]);
        self.bit_pos += N * 8;
        Ok(out)
    }
}
