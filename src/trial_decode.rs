//! Trial decoding of a block body
//!
//! Walks literal/length and distance symbols until END_OF_BLOCK without
//! producing output. The walk itself is generic over a [`SymbolSink`], so the
//! reference inflater and the trial share one decoding loop: the inflater's
//! sink writes bytes into a window, the trial's sink only counts them.

use crate::bit_cursor::{BitCursor, BitPosition};
use crate::error::Rejection;
use crate::huffman::HuffmanTable;
use crate::inflate_tables::{
    DISTANCE_BASE, DISTANCE_EXTRA_BITS, END_OF_BLOCK, LENGTH_BASE, LENGTH_EXTRA_BITS,
    MAX_MATCH_LENGTH, WINDOW_SIZE,
};

/// Receiver of decoded symbols
pub trait SymbolSink {
    type Error: From<Rejection>;

    fn literal(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Back-reference of `length` bytes starting `distance` bytes back.
    fn copy(&mut self, distance: usize, length: usize) -> Result<(), Self::Error>;
}

/// Decode symbols up to and including END_OF_BLOCK, returning how many
/// literal and match symbols were seen.
pub fn decode_symbols<S: SymbolSink>(
    cursor: &mut BitCursor,
    literal: &HuffmanTable,
    distance: Option<&HuffmanTable>,
    sink: &mut S,
) -> Result<usize, S::Error> {
    let mut symbols = 0usize;

    loop {
        let symbol = literal.decode(cursor)?;

        if symbol < 256 {
            sink.literal(symbol as u8)?;
        } else if symbol == END_OF_BLOCK {
            return Ok(symbols);
        } else {
            let code = (symbol - 257) as usize;
            if code >= LENGTH_BASE.len() {
                return Err(Rejection::InvalidLiteralSymbol(symbol).into());
            }
            let length = LENGTH_BASE[code] as usize
                + cursor.read(LENGTH_EXTRA_BITS[code] as u32).map_err(Rejection::from)? as usize;

            let distance_table = distance.ok_or(Rejection::MissingDistanceCode)?;
            let distance_code = distance_table.decode(cursor)? as usize;
            if distance_code >= DISTANCE_BASE.len() {
                return Err(Rejection::InvalidDistanceSymbol(distance_code as u16).into());
            }
            let distance = DISTANCE_BASE[distance_code] as usize
                + cursor
                    .read(DISTANCE_EXTRA_BITS[distance_code] as u32)
                    .map_err(Rejection::from)? as usize;

            sink.copy(distance, length)?;
        }

        symbols += 1;
    }
}

/// Upper bound on the bytes a valid stream can have produced before bit
/// `position`: a length/distance pair needs at least 2 bits and yields at
/// most 258 bytes, and no more than a window is reachable anyway.
#[inline]
pub fn max_preceding_output(position: BitPosition) -> usize {
    position
        .saturating_mul(MAX_MATCH_LENGTH / 2)
        .min(WINDOW_SIZE)
}

/// Result of a successful trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialOutcome {
    /// Bit position just after END_OF_BLOCK
    pub end: BitPosition,
    /// Literal and match symbols, END_OF_BLOCK excluded
    pub symbols: usize,
    /// Bytes the block would decode to
    pub bytes: usize,
}

/// Counts output and checks every distance against what could precede it
struct BoundedOutput {
    preceding: usize,
    produced: usize,
}

impl SymbolSink for BoundedOutput {
    type Error = Rejection;

    #[inline]
    fn literal(&mut self, _byte: u8) -> Result<(), Rejection> {
        self.produced += 1;
        Ok(())
    }

    #[inline]
    fn copy(&mut self, distance: usize, length: usize) -> Result<(), Rejection> {
        let available = self.preceding + self.produced;
        if distance > available {
            return Err(Rejection::DistanceTooFar {
                distance,
                available,
            });
        }
        self.produced += length;
        Ok(())
    }
}

/// Decodes one block body without producing output
pub struct TrialDecoder<'t> {
    literal: &'t HuffmanTable,
    distance: Option<&'t HuffmanTable>,
    preceding: usize,
}

impl<'t> TrialDecoder<'t> {
    /// `preceding` is the number of bytes assumed to exist before the block.
    pub fn new(
        literal: &'t HuffmanTable,
        distance: Option<&'t HuffmanTable>,
        preceding: usize,
    ) -> Self {
        Self {
            literal,
            distance,
            preceding,
        }
    }

    /// Trial for a block starting at `block_start`, preceded by as much
    /// output as a stream could have produced by then.
    pub fn for_block(
        literal: &'t HuffmanTable,
        distance: Option<&'t HuffmanTable>,
        block_start: BitPosition,
    ) -> Self {
        Self::new(literal, distance, max_preceding_output(block_start))
    }

    /// Decode from the cursor (positioned at the block body) to END_OF_BLOCK.
    pub fn run(&self, cursor: &mut BitCursor) -> Result<TrialOutcome, Rejection> {
        let mut sink = BoundedOutput {
            preceding: self.preceding,
            produced: 0,
        };
        let symbols = decode_symbols(cursor, self.literal, self.distance, &mut sink)?;
        Ok(TrialOutcome {
            end: cursor.position(),
            symbols,
            bytes: sink.produced,
        })
    }
}
