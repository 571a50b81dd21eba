//! Canonical Huffman tables: construction, validation and decoding
//!
//! `HuffmanTable::build` turns a list of per-symbol code lengths into the
//! canonical prefix code defined by RFC 1951 §3.2.2 and rejects length sets
//! that violate the Kraft inequality. Whether an under-subscribed code is
//! acceptable depends on where it is used, so the table only records its
//! [`CodeShape`] and [`HuffmanTable::require_usable`] applies the policy.
//!
//! Decoding reads codes MSB-first out of an LSB-first stream: short codes go
//! through a bit-reversed direct lookup table, longer ones through the
//! count/offset walk over the canonical symbol order.

use std::sync::OnceLock;

use crate::bit_cursor::BitCursor;
use crate::error::Rejection;
use crate::inflate_tables::{fixed_literal_lengths, FIXED_DISTANCE_LENGTHS};

/// Longest code DEFLATE allows
pub const MAX_CODE_LENGTH: usize = 15;

/// Largest alphabet: literal/length symbols 0..=287
pub const MAX_SYMBOLS: usize = 288;

/// Width of the direct lookup table
const FAST_BITS: u8 = 10;
const FAST_SIZE: usize = 1 << FAST_BITS;

/// How completely a set of code lengths fills the code space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeShape {
    /// Kraft sum equals the capacity
    Complete,
    /// Exactly one symbol has a nonzero length
    Degenerate,
    /// Under-subscribed with two or more symbols
    Incomplete,
    /// No symbol has a code
    Empty,
}

/// Decode table held inline, so candidates never touch the heap.
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    /// Number of codes of each length
    counts: [u16; MAX_CODE_LENGTH + 1],
    /// Symbols ordered by (length, symbol), `symbol_count` of them used
    symbols: [u16; MAX_SYMBOLS],
    symbol_count: u16,
    /// Direct lookup: `symbol << 4 | length`, 0 for a miss
    fast: [u16; FAST_SIZE],
    fast_bits: u8,
    max_length: u8,
    shape: CodeShape,
}

/// Kraft sum of `lengths` scaled to `2^max_length`, with that capacity.
///
/// Returns `(Σ count[l]·2^(maxlen−l), 2^maxlen)`.
pub fn kraft_sum(lengths: &[u8]) -> (u64, u64) {
    let max_length = lengths.iter().copied().max().unwrap_or(0) as u32;
    let sum = lengths
        .iter()
        .filter(|&&len| len > 0)
        .map(|&len| 1u64 << (max_length - len as u32))
        .sum();
    (sum, 1u64 << max_length)
}

/// Canonical code of every symbol (0 where the length is 0).
pub fn canonical_codes(lengths: &[u8]) -> Vec<u16> {
    let mut bl_count = [0u32; MAX_CODE_LENGTH + 1];
    for &len in lengths {
        if len > 0 && len as usize <= MAX_CODE_LENGTH {
            bl_count[len as usize] += 1;
        }
    }

    let mut next_code = [0u32; MAX_CODE_LENGTH + 1];
    let mut code = 0u32;
    for bits in 1..=MAX_CODE_LENGTH {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    lengths
        .iter()
        .map(|&len| {
            if len == 0 || len as usize > MAX_CODE_LENGTH {
                return 0;
            }
            let c = next_code[len as usize];
            next_code[len as usize] += 1;
            c as u16
        })
        .collect()
}

impl HuffmanTable {
    /// Build the canonical decode table for `lengths`.
    ///
    /// Rejects only lengths above 15, alphabets above 288 symbols and
    /// over-subscribed codes; any other length set produces a table whose
    /// unassigned code points fail to decode.
    pub fn build(lengths: &[u8]) -> Result<Self, Rejection> {
        if lengths.len() > MAX_SYMBOLS {
            return Err(Rejection::TooManySymbols(lengths.len()));
        }
        if let Some((symbol, &length)) = lengths
            .iter()
            .enumerate()
            .find(|(_, &len)| len as usize > MAX_CODE_LENGTH)
        {
            return Err(Rejection::CodeLengthTooLong { symbol, length });
        }

        let (sum, capacity) = kraft_sum(lengths);
        if sum > capacity {
            return Err(Rejection::OverSubscribedCode);
        }

        let shape = if sum == capacity && sum > 0 {
            CodeShape::Complete
        } else {
            match lengths.iter().filter(|&&len| len > 0).count() {
                0 => CodeShape::Empty,
                1 => CodeShape::Degenerate,
                _ => CodeShape::Incomplete,
            }
        };

        Ok(Self::assemble(lengths, shape))
    }

    /// Table layout for lengths already known to be valid.
    fn assemble(lengths: &[u8], shape: CodeShape) -> Self {
        let mut counts = [0u16; MAX_CODE_LENGTH + 1];
        for &len in lengths {
            counts[len as usize] += 1;
        }
        counts[0] = 0;

        let max_length = lengths.iter().copied().max().unwrap_or(0);

        // Offsets of each length class in the canonical symbol order
        let mut offsets = [0u16; MAX_CODE_LENGTH + 2];
        for len in 1..=MAX_CODE_LENGTH {
            offsets[len + 1] = offsets[len] + counts[len];
        }
        let symbol_count = offsets[MAX_CODE_LENGTH + 1];

        let mut next_code = [0u32; MAX_CODE_LENGTH + 1];
        let mut code = 0u32;
        for len in 1..=MAX_CODE_LENGTH {
            code = (code + counts[len - 1] as u32) << 1;
            next_code[len] = code;
        }

        let fast_bits = max_length.min(FAST_BITS);
        let mut symbols = [0u16; MAX_SYMBOLS];
        let mut fast = [0u16; FAST_SIZE];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let class = len as usize;
            symbols[offsets[class] as usize] = symbol as u16;
            offsets[class] += 1;

            let code = next_code[class];
            next_code[class] += 1;
            if len > fast_bits {
                continue;
            }
            let reversed = reverse_bits(code, len) as usize;
            let entry = ((symbol as u16) << 4) | len as u16;
            for high in 0..1usize << (fast_bits - len) {
                fast[reversed | (high << len)] = entry;
            }
        }

        Self {
            counts,
            symbols,
            symbol_count,
            fast,
            fast_bits,
            max_length,
            shape,
        }
    }

    #[inline]
    pub fn shape(&self) -> CodeShape {
        self.shape
    }

    #[inline]
    pub fn max_length(&self) -> u8 {
        self.max_length
    }

    /// Number of symbols with a code
    #[inline]
    pub fn symbol_count(&self) -> usize {
        self.symbol_count as usize
    }

    /// Accept complete codes and the single-symbol code; `Empty` only when
    /// `allow_empty` (a block without distance codes).
    pub fn require_usable(&self, allow_empty: bool) -> Result<(), Rejection> {
        match self.shape {
            CodeShape::Complete | CodeShape::Degenerate => Ok(()),
            CodeShape::Empty if allow_empty => Ok(()),
            CodeShape::Empty => Err(Rejection::EmptyCode),
            CodeShape::Incomplete => Err(Rejection::IncompleteCode),
        }
    }

    /// Decode one symbol and advance past its code.
    #[inline]
    pub fn decode(&self, cursor: &mut BitCursor) -> Result<u16, Rejection> {
        let bits = cursor.peek_padded(MAX_CODE_LENGTH as u32);
        let entry = self.fast[(bits & ((1 << self.fast_bits) - 1)) as usize];
        if entry != 0 {
            cursor.advance((entry & 0xF) as usize)?;
            return Ok(entry >> 4);
        }
        self.decode_slow(bits, cursor)
    }

    /// Canonical walk: at each length, codes of that length form the range
    /// `[first, first + count)`.
    fn decode_slow(&self, bits: u64, cursor: &mut BitCursor) -> Result<u16, Rejection> {
        let mut code = 0u32;
        let mut first = 0u32;
        let mut index = 0u32;
        for len in 1..=self.max_length as usize {
            code |= ((bits >> (len - 1)) & 1) as u32;
            let count = self.counts[len] as u32;
            if code < first + count {
                cursor.advance(len)?;
                return Ok(self.symbols[(index + code - first) as usize]);
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }
        if self.max_length as usize > cursor.remaining() {
            return Err(Rejection::Truncated);
        }
        Err(Rejection::InvalidCode)
    }
}

#[inline]
fn reverse_bits(value: u32, bits: u8) -> u32 {
    value.reverse_bits() >> (32 - bits as u32)
}

static FIXED_LITERAL: OnceLock<HuffmanTable> = OnceLock::new();
static FIXED_DISTANCE: OnceLock<HuffmanTable> = OnceLock::new();

/// Fixed literal/length table (BTYPE=01)
pub fn fixed_literal_table() -> &'static HuffmanTable {
    FIXED_LITERAL
        .get_or_init(|| HuffmanTable::assemble(&fixed_literal_lengths(), CodeShape::Complete))
}

/// Fixed distance table (BTYPE=01)
pub fn fixed_distance_table() -> &'static HuffmanTable {
    FIXED_DISTANCE
        .get_or_init(|| HuffmanTable::assemble(&FIXED_DISTANCE_LENGTHS, CodeShape::Complete))
}
