//! Block header scanning
//!
//! Reads the 3-bit block header and, for dynamic blocks, everything up to the
//! first symbol of the block body. The checks are ordered by cost:
//! 1. 13-bit skip LUT: BFINAL and BTYPE at every offset of the window in one
//!    lookup, skipping ahead over positions that cannot start a dynamic block
//! 2. Precode leaf count: over-subscribed and incomplete precodes are
//!    rejected from the raw 3-bit lengths without building a table
//! 3. Literal/length and distance code lengths decoded through the precode,
//!    then both tables built and validated
//!
//! HLIT and HDIST are never rejected on their own: their 5-bit fields cannot
//! exceed the 288 and 32 entry alphabets. Symbols 286, 287, 30 and 31 may be
//! given code lengths but are rejected when a block body actually uses them.

#![allow(clippy::unusual_byte_groupings)]

use crate::bit_cursor::{BitCursor, BitPosition};
use crate::error::Rejection;
use crate::huffman::HuffmanTable;
use crate::inflate_tables::{
    END_OF_BLOCK, MAX_DISTANCE_CODES, MAX_LITERAL_CODES, MAX_PRECODE_LENGTH, PRECODE_BITS,
    PRECODE_COUNT, PRECODE_ORDER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    Stored,
    FixedHuffman,
    DynamicHuffman,
    Reserved,
}

impl BlockType {
    #[inline]
    pub fn from_bits(btype: u64) -> Self {
        match btype & 3 {
            0 => BlockType::Stored,
            1 => BlockType::FixedHuffman,
            2 => BlockType::DynamicHuffman,
            _ => BlockType::Reserved,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub is_final: bool,
    pub block_type: BlockType,
}

impl BlockHeader {
    /// Read BFINAL and BTYPE; the reserved type is rejected here.
    #[inline]
    pub fn read(cursor: &mut BitCursor) -> Result<Self, Rejection> {
        let bits = cursor.read(3)?;
        let header = Self::from_bits(bits);
        if header.block_type == BlockType::Reserved {
            return Err(Rejection::ReservedBlockType);
        }
        Ok(header)
    }

    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Self {
            is_final: bits & 1 != 0,
            block_type: BlockType::from_bits(bits >> 1),
        }
    }
}

// ============================================================================
// 13-bit skip LUT for dynamic block candidates
// ============================================================================

/// Bits of stream examined per skip lookup
pub const SKIP_LUT_BITS: u32 = 13;
const SKIP_LUT_SIZE: usize = 1 << SKIP_LUT_BITS;

/// Could a dynamic block start at bit 0 of `bits`, of which only the low
/// `known` bits are real? Only known header bits can rule a position out.
const fn could_start_dynamic(bits: u32, known: u32, allow_final: bool) -> bool {
    if known >= 1 && !allow_final && bits & 1 != 0 {
        return false;
    }
    if known >= 2 && (bits >> 1) & 1 != 0 {
        return false;
    }
    !(known >= 3 && (bits >> 2) & 1 != 1)
}

/// Distance to the first position in the window that could be a candidate.
const fn compute_skip(window: u32, allow_final: bool) -> u8 {
    let mut shift = 0u32;
    while shift < SKIP_LUT_BITS {
        if could_start_dynamic(window >> shift, SKIP_LUT_BITS - shift, allow_final) {
            return shift as u8;
        }
        shift += 1;
    }
    SKIP_LUT_BITS as u8
}

const fn generate_skip_lut(allow_final: bool) -> [u8; SKIP_LUT_SIZE] {
    let mut lut = [0u8; SKIP_LUT_SIZE];
    let mut i = 0;
    while i < SKIP_LUT_SIZE {
        lut[i] = compute_skip(i as u32, allow_final);
        i += 1;
    }
    lut
}

static SKIP_NON_FINAL_LUT: [u8; SKIP_LUT_SIZE] = generate_skip_lut(false);
static SKIP_ANY_LUT: [u8; SKIP_LUT_SIZE] = generate_skip_lut(true);

/// Bits to skip before the next possible dynamic block start; 0 means the
/// position at bit 0 of `window` is a candidate.
#[inline]
pub fn dynamic_candidate_skip(window: u64, allow_final: bool) -> usize {
    let index = (window & (SKIP_LUT_SIZE as u64 - 1)) as usize;
    let lut = if allow_final {
        &SKIP_ANY_LUT
    } else {
        &SKIP_NON_FINAL_LUT
    };
    lut[index] as usize
}

// ============================================================================
// Precode leaf count
// ============================================================================

/// A length L occupies 2^(7-L) leaves of a depth-7 code tree
const fn precode_to_leaves(length: u8) -> u16 {
    if length == 0 || length > MAX_PRECODE_LENGTH {
        0
    } else {
        1 << (MAX_PRECODE_LENGTH - length)
    }
}

/// Leaves used by four precode lengths (12 bits) at once
const fn generate_precode_lut() -> [u16; 1 << 12] {
    let mut lut = [0u16; 1 << 12];
    let mut i = 0u32;
    while i < (1 << 12) {
        lut[i as usize] = precode_to_leaves((i & 7) as u8)
            + precode_to_leaves(((i >> 3) & 7) as u8)
            + precode_to_leaves(((i >> 6) & 7) as u8)
            + precode_to_leaves(((i >> 9) & 7) as u8);
        i += 1;
    }
    lut
}

static PRECODE_LEAF_LUT: [u16; 1 << 12] = generate_precode_lut();

/// Full depth-7 tree
const PRECODE_FULL_LEAVES: u32 = 1 << MAX_PRECODE_LENGTH;

/// Validate `count` raw 3-bit precode lengths by counting leaves.
///
/// A usable precode fills all 128 leaves, or has exactly one nonzero length.
#[inline]
pub fn check_precode_leaves(precode_bits: u64, count: usize) -> Result<(), Rejection> {
    let mut rest = precode_bits & ((1u64 << (count * PRECODE_BITS as usize)) - 1);
    let mut leaves = 0u32;
    while rest != 0 {
        leaves += PRECODE_LEAF_LUT[(rest & 0xFFF) as usize] as u32;
        rest >>= 12;
    }

    match leaves.cmp(&PRECODE_FULL_LEAVES) {
        std::cmp::Ordering::Equal => Ok(()),
        std::cmp::Ordering::Greater => Err(Rejection::OverSubscribedCode),
        std::cmp::Ordering::Less => {
            let nonzero = (0..count)
                .filter(|i| (precode_bits >> (i * 3)) & 7 != 0)
                .count();
            match nonzero {
                0 => Err(Rejection::EmptyCode),
                1 => Ok(()),
                _ => Err(Rejection::IncompleteCode),
            }
        }
    }
}

// ============================================================================
// Dynamic block header
// ============================================================================

/// HLIT/HDIST/HCLEN fields and the raw precode lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    pub literal_count: usize,
    pub distance_count: usize,
    pub precode_count: usize,
    pub precode_bits: u64,
}

impl Preamble {
    /// Read the 14 count bits and the precode lengths, cursor just after
    /// BTYPE. Rejects unusable precodes.
    #[inline]
    pub fn read(cursor: &mut BitCursor) -> Result<Self, Rejection> {
        let counts = cursor.read(14)?;
        let literal_count = (counts & 31) as usize + 257;
        let distance_count = ((counts >> 5) & 31) as usize + 1;
        let precode_count = ((counts >> 10) & 15) as usize + 4;

        let precode_bits = cursor.read(precode_count as u32 * PRECODE_BITS)?;
        check_precode_leaves(precode_bits, precode_count)?;

        Ok(Self {
            literal_count,
            distance_count,
            precode_count,
            precode_bits,
        })
    }

    /// Precode lengths in symbol order
    pub fn precode_lengths(&self) -> [u8; PRECODE_COUNT] {
        let mut lengths = [0u8; PRECODE_COUNT];
        for (i, &symbol) in PRECODE_ORDER.iter().enumerate().take(self.precode_count) {
            lengths[symbol] = ((self.precode_bits >> (i * 3)) & 7) as u8;
        }
        lengths
    }
}

/// Decoding tables of a dynamic block, cursor positioned at the block body
#[derive(Debug, Clone)]
pub struct DynamicHeader {
    pub preamble: Preamble,
    pub literal: HuffmanTable,
    pub distance: HuffmanTable,
}

impl DynamicHeader {
    /// Read and validate everything between BTYPE and the first body symbol.
    pub fn read(cursor: &mut BitCursor) -> Result<Self, Rejection> {
        let preamble = Preamble::read(cursor)?;

        let precode = HuffmanTable::build(&preamble.precode_lengths())?;
        precode.require_usable(false)?;

        let total = preamble.literal_count + preamble.distance_count;
        let mut lengths = [0u8; MAX_LITERAL_CODES + MAX_DISTANCE_CODES];
        read_code_lengths(cursor, &precode, &mut lengths[..total])?;

        let (literal_lengths, distance_lengths) = lengths[..total].split_at(preamble.literal_count);
        if literal_lengths[END_OF_BLOCK as usize] == 0 {
            return Err(Rejection::MissingEndOfBlock);
        }

        let literal = HuffmanTable::build(literal_lengths)?;
        literal.require_usable(false)?;
        let distance = HuffmanTable::build(distance_lengths)?;
        distance.require_usable(true)?;

        Ok(Self {
            preamble,
            literal,
            distance,
        })
    }

    /// Distance table, `None` for a literal-only block
    pub fn distance_table(&self) -> Option<&HuffmanTable> {
        (self.distance.symbol_count() > 0).then_some(&self.distance)
    }
}

/// Decode the run-length coded literal/length + distance code lengths.
fn read_code_lengths(
    cursor: &mut BitCursor,
    precode: &HuffmanTable,
    lengths: &mut [u8],
) -> Result<(), Rejection> {
    let total = lengths.len();
    let mut i = 0;

    while i < total {
        let symbol = precode.decode(cursor)?;
        let (value, repeat) = match symbol {
            0..=15 => {
                lengths[i] = symbol as u8;
                i += 1;
                continue;
            }
            16 => {
                if i == 0 {
                    return Err(Rejection::RepeatWithoutPrevious);
                }
                (lengths[i - 1], cursor.read(2)? as usize + 3)
            }
            17 => (0, cursor.read(3)? as usize + 3),
            18 => (0, cursor.read(7)? as usize + 11),
            _ => return Err(Rejection::InvalidCode),
        };

        if i + repeat > total {
            return Err(Rejection::CodeLengthOverflow);
        }
        lengths[i..i + repeat].fill(value);
        i += repeat;
    }

    Ok(())
}

// ============================================================================
// Stored block header
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredHeader {
    pub length: u16,
    pub payload_start: BitPosition,
}

impl StoredHeader {
    /// Read the byte-aligned LEN/NLEN pair, cursor just after BTYPE.
    ///
    /// Encoders pad with zeros; `require_zero_padding` turns that into a
    /// check for scanning, while decoding ignores the padding.
    pub fn read(cursor: &mut BitCursor, require_zero_padding: bool) -> Result<Self, Rejection> {
        let padding = cursor.align_to_byte()?;
        if require_zero_padding && padding != 0 {
            return Err(Rejection::StoredPaddingNotZero);
        }

        let fields = cursor.read(32)?;
        let length = fields as u16;
        let nlength = (fields >> 16) as u16;
        if length != !nlength {
            return Err(Rejection::StoredLengthMismatch);
        }

        Ok(Self {
            length,
            payload_start: cursor.position(),
        })
    }

    /// Step over the payload, rejecting one that runs past the buffer.
    pub fn skip_payload(&self, cursor: &mut BitCursor) -> Result<(), Rejection> {
        cursor.advance(self.length as usize * 8)?;
        Ok(())
    }
}
