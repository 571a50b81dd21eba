//! Bit-granular cursor over a borrowed DEFLATE stream
//!
//! DEFLATE packs data elements starting at the least-significant bit of each
//! byte. The cursor addresses the stream by absolute bit position and reads
//! by loading eight bytes little-endian and shifting, so any `n <= 57` bits
//! can be peeked in one load regardless of alignment. The buffer is never
//! copied or mutated.

use thiserror::Error;

/// Bits counted from bit 0 (the LSB) of byte 0 of the buffer.
pub type BitPosition = usize;

/// Widest peek a single unaligned 64-bit load can serve (64 - 7 shift bits).
pub const MAX_PEEK_BITS: u32 = 57;

/// Attempted read past the end of the buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{requested} bits requested at bit {position}, {available} available")]
pub struct OutOfBounds {
    pub position: BitPosition,
    pub requested: usize,
    pub available: usize,
}

/// Split a bit position into (byte offset, bit within byte).
#[inline]
pub fn split_position(position: BitPosition) -> (usize, u8) {
    (position / 8, (position % 8) as u8)
}

#[derive(Clone, Copy, Debug)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    position: BitPosition,
}

impl<'a> BitCursor<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Cursor at `position`; the end of the buffer itself is a valid position.
    #[inline]
    pub fn at(data: &'a [u8], position: BitPosition) -> Result<Self, OutOfBounds> {
        let mut cursor = Self::new(data);
        cursor.seek(position)?;
        Ok(cursor)
    }

    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub fn position(&self) -> BitPosition {
        self.position
    }

    #[inline]
    pub fn bit_len(&self) -> usize {
        self.data.len() * 8
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.bit_len() - self.position
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.remaining() == 0
    }

    #[inline]
    pub fn seek(&mut self, position: BitPosition) -> Result<(), OutOfBounds> {
        if position > self.bit_len() {
            return Err(OutOfBounds {
                position,
                requested: 0,
                available: 0,
            });
        }
        self.position = position;
        Ok(())
    }

    /// Next `n` bits, first stream bit in the LSB, without advancing.
    #[inline]
    pub fn peek(&self, n: u32) -> Result<u64, OutOfBounds> {
        self.check(n as usize)?;
        Ok(load_bits(self.data, self.position, n))
    }

    /// Like [`peek`](Self::peek) but bits past the end read as zero.
    #[inline]
    pub fn peek_padded(&self, n: u32) -> u64 {
        load_bits(self.data, self.position, n)
    }

    #[inline]
    pub fn advance(&mut self, n: usize) -> Result<(), OutOfBounds> {
        self.check(n)?;
        self.position += n;
        Ok(())
    }

    #[inline]
    pub fn read(&mut self, n: u32) -> Result<u64, OutOfBounds> {
        let value = self.peek(n)?;
        self.position += n as usize;
        Ok(value)
    }

    /// Skip to the next byte boundary, returning the skipped bits.
    #[inline]
    pub fn align_to_byte(&mut self) -> Result<u64, OutOfBounds> {
        let (_, bit) = split_position(self.position);
        if bit == 0 {
            return Ok(0);
        }
        self.read(8 - bit as u32)
    }

    #[inline]
    fn check(&self, requested: usize) -> Result<(), OutOfBounds> {
        let available = self.remaining();
        if requested > available {
            return Err(OutOfBounds {
                position: self.position,
                requested,
                available,
            });
        }
        Ok(())
    }
}

#[inline]
fn load_bits(data: &[u8], position: BitPosition, n: u32) -> u64 {
    debug_assert!(n <= MAX_PEEK_BITS);
    let (byte, shift) = split_position(position);
    let mut word = [0u8; 8];
    if let Some(tail) = data.get(byte..) {
        let take = tail.len().min(8);
        word[..take].copy_from_slice(&tail[..take]);
    }
    (u64::from_le_bytes(word) >> shift) & ((1u64 << n) - 1)
}
