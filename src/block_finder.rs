//! Deflate Block Finder
//!
//! Locates bit offsets where a DEFLATE block starts, without any index and
//! without decoding the stream from its beginning. Every offset passes a
//! chain of increasingly expensive checks before it is reported:
//! 1. 13-bit LUT for quick invalid position skipping (dynamic blocks)
//! 2. Precode validation via leaf counting
//! 3. Full literal/length and distance table validation
//! 4. Trial decode of the block body up to END_OF_BLOCK
//! 5. Lookahead at the header of the block that follows, or at the zero
//!    padding that ends the stream after a final block
//!
//! `sync` is a pure function of the buffer and the start position; the
//! finder keeps no state between calls.

use std::sync::OnceLock;

use crate::bit_cursor::{BitCursor, BitPosition, OutOfBounds};
use crate::error::{Rejection, SyncError, SyncResult};
use crate::header::{
    dynamic_candidate_skip, BlockHeader, BlockType, DynamicHeader, Preamble, StoredHeader,
    SKIP_LUT_BITS,
};
use crate::huffman::{fixed_distance_table, fixed_literal_table};
use crate::inflate_tables::BLOCK_HEADER_BITS;
use crate::trial_decode::TrialDecoder;

/// Shortest Huffman block, header included, reported by default.
///
/// Real encoders emit blocks of many kilobytes; tiny blocks are where almost
/// all false positives on random data come from.
pub const DEFAULT_MIN_BLOCK_BITS: usize = 1024;

fn debug_enabled() -> bool {
    static DEBUG: OnceLock<bool> = OnceLock::new();
    *DEBUG.get_or_init(|| std::env::var("BLOCKFINDER_DEBUG").is_ok())
}

// ============================================================================
// Configuration
// ============================================================================

/// Block types accepted as sync targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKinds {
    pub stored: bool,
    pub fixed: bool,
    pub dynamic: bool,
}

impl BlockKinds {
    pub const DYNAMIC: BlockKinds = BlockKinds {
        stored: false,
        fixed: false,
        dynamic: true,
    };

    pub const ALL: BlockKinds = BlockKinds {
        stored: true,
        fixed: true,
        dynamic: true,
    };

    pub fn allows(&self, block_type: BlockType) -> bool {
        match block_type {
            BlockType::Stored => self.stored,
            BlockType::FixedHuffman => self.fixed,
            BlockType::DynamicHuffman => self.dynamic,
            BlockType::Reserved => false,
        }
    }

    /// Only dynamic blocks can take the LUT fast path
    fn dynamic_only(&self) -> bool {
        *self == Self::DYNAMIC
    }
}

impl Default for BlockKinds {
    fn default() -> Self {
        Self::DYNAMIC
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub kinds: BlockKinds,
    /// Report BFINAL=1 blocks; `false` searches non-final blocks only
    pub accept_final: bool,
    /// Minimum size of a Huffman block from its header to END_OF_BLOCK
    pub min_block_bits: usize,
    /// Require a plausible block header right after a non-final block and
    /// zero padding bits after a final one
    pub check_next_header: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            kinds: BlockKinds::DYNAMIC,
            accept_final: true,
            min_block_bits: DEFAULT_MIN_BLOCK_BITS,
            check_next_header: true,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// An offset that passed every check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedBlock {
    pub position: BitPosition,
    pub header: BlockHeader,
    /// Bit position just after the block
    pub end: BitPosition,
}

impl VerifiedBlock {
    pub fn bit_len(&self) -> usize {
        self.end - self.position
    }

    /// Where a forward walk continues after this block.
    ///
    /// Every stored header offset whose padding runs to the same byte
    /// boundary reads the same LEN/NLEN, so only the lowest one is reported
    /// and the walk resumes at the first offset that aligns further.
    pub fn resume_position(&self) -> BitPosition {
        match self.header.block_type {
            BlockType::Stored => {
                let length_field = (self.position + BLOCK_HEADER_BITS).next_multiple_of(8);
                length_field - (BLOCK_HEADER_BITS - 1)
            }
            _ => self.position + 1,
        }
    }
}

/// Where candidate offsets were ruled out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Positions jumped over by the skip LUT
    pub lut_skipped: usize,
    /// Positions evaluated beyond the LUT
    pub candidates: usize,
    pub header_rejects: usize,
    pub code_rejects: usize,
    pub body_rejects: usize,
    pub next_header_rejects: usize,
    pub truncated: usize,
    pub verified: usize,
}

impl ScanStats {
    pub fn merge(&mut self, other: &ScanStats) {
        self.lut_skipped += other.lut_skipped;
        self.candidates += other.candidates;
        self.header_rejects += other.header_rejects;
        self.code_rejects += other.code_rejects;
        self.body_rejects += other.body_rejects;
        self.next_header_rejects += other.next_header_rejects;
        self.truncated += other.truncated;
        self.verified += other.verified;
    }

    pub fn positions(&self) -> usize {
        self.lut_skipped + self.candidates
    }

    fn record(&mut self, rejection: Rejection) {
        use Rejection::*;
        let counter = match rejection {
            Truncated => &mut self.truncated,
            ReservedBlockType
            | BlockKindDisabled
            | FinalBlockSkipped
            | StoredLengthMismatch
            | StoredPaddingNotZero => &mut self.header_rejects,
            CodeLengthTooLong { .. }
            | TooManySymbols(_)
            | OverSubscribedCode
            | IncompleteCode
            | EmptyCode
            | RepeatWithoutPrevious
            | CodeLengthOverflow
            | MissingEndOfBlock => &mut self.code_rejects,
            InvalidCode
            | InvalidLiteralSymbol(_)
            | InvalidDistanceSymbol(_)
            | MissingDistanceCode
            | DistanceTooFar { .. }
            | BlockTooShort { .. } => &mut self.body_rejects,
            MissingNextHeader | InvalidNextHeader(_) | FinalPaddingNotZero => {
                &mut self.next_header_rejects
            }
        };
        *counter += 1;
    }
}

// ============================================================================
// Block Finder
// ============================================================================

#[derive(Debug, Clone)]
pub struct BlockFinder<'a> {
    data: &'a [u8],
    config: SyncConfig,
}

impl<'a> BlockFinder<'a> {
    pub fn new(data: &'a [u8]) -> SyncResult<Self> {
        Self::with_config(data, SyncConfig::default())
    }

    pub fn with_config(data: &'a [u8], config: SyncConfig) -> SyncResult<Self> {
        if data.is_empty() {
            return Err(SyncError::EmptyInput);
        }
        Ok(Self { data, config })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn bit_len(&self) -> usize {
        self.data.len() * 8
    }

    /// First verified block offset at or after `position`, or `position`
    /// itself when the rest of the buffer holds none.
    ///
    /// A caller walking all blocks resumes at `offset + 1` and stops once the
    /// returned offset equals the requested one; [`find_next`](Self::find_next)
    /// and [`offsets`](Self::offsets) avoid that ambiguity and also skip the
    /// aliases of a stored block header.
    pub fn sync(&self, position: BitPosition) -> SyncResult<BitPosition> {
        Ok(self
            .find_next(position)?
            .map_or(position, |block| block.position))
    }

    pub fn find_next(&self, position: BitPosition) -> SyncResult<Option<VerifiedBlock>> {
        self.find_next_with_stats(position, &mut ScanStats::default())
    }

    pub fn find_next_with_stats(
        &self,
        position: BitPosition,
        stats: &mut ScanStats,
    ) -> SyncResult<Option<VerifiedBlock>> {
        self.check_position(position)?;
        Ok(self.scan(position, self.bit_len(), stats))
    }

    /// All verified offsets in `start..end`. Blocks may extend past `end`.
    pub fn find_in_range(
        &self,
        start: BitPosition,
        end: BitPosition,
        stats: &mut ScanStats,
    ) -> SyncResult<Vec<BitPosition>> {
        Ok(self
            .find_blocks_in_range(start, end, stats)?
            .iter()
            .map(|block| block.position)
            .collect())
    }

    pub fn find_blocks_in_range(
        &self,
        start: BitPosition,
        end: BitPosition,
        stats: &mut ScanStats,
    ) -> SyncResult<Vec<VerifiedBlock>> {
        self.check_position(start)?;
        let end = end.min(self.bit_len());

        let mut blocks = Vec::new();
        let mut position = start;
        while let Some(block) = self.scan(position, end, stats) {
            position = block.resume_position();
            blocks.push(block);
        }
        Ok(blocks)
    }

    /// Lazily iterate over every verified offset from `position` on.
    pub fn offsets_from(&self, position: BitPosition) -> BlockOffsets<'_, 'a> {
        BlockOffsets {
            finder: self,
            position,
            stats: ScanStats::default(),
        }
    }

    pub fn offsets(&self) -> BlockOffsets<'_, 'a> {
        self.offsets_from(0)
    }

    /// Run every check on the single offset `position`.
    pub fn verify(&self, position: BitPosition) -> Result<VerifiedBlock, Rejection> {
        let mut cursor = BitCursor::at(self.data, position)?;
        let header = BlockHeader::read(&mut cursor)?;

        if header.is_final && !self.config.accept_final {
            return Err(Rejection::FinalBlockSkipped);
        }
        if !self.config.kinds.allows(header.block_type) {
            return Err(Rejection::BlockKindDisabled);
        }

        let end = match header.block_type {
            BlockType::DynamicHuffman => {
                let tables = DynamicHeader::read(&mut cursor)?;
                let outcome =
                    TrialDecoder::for_block(&tables.literal, tables.distance_table(), position)
                        .run(&mut cursor)?;
                self.check_size(position, outcome.end)?
            }
            BlockType::FixedHuffman => {
                let outcome = TrialDecoder::for_block(
                    fixed_literal_table(),
                    Some(fixed_distance_table()),
                    position,
                )
                .run(&mut cursor)?;
                self.check_size(position, outcome.end)?
            }
            BlockType::Stored => {
                let stored = StoredHeader::read(&mut cursor, true)?;
                stored.skip_payload(&mut cursor)?;
                cursor.position()
            }
            BlockType::Reserved => return Err(Rejection::ReservedBlockType),
        };

        if self.config.check_next_header {
            if header.is_final {
                self.check_final_padding(end)?;
            } else {
                self.check_next_header(end)?;
            }
        }

        Ok(VerifiedBlock {
            position,
            header,
            end,
        })
    }

    fn check_position(&self, position: BitPosition) -> Result<(), OutOfBounds> {
        if position > self.bit_len() {
            return Err(OutOfBounds {
                position,
                requested: 0,
                available: 0,
            });
        }
        Ok(())
    }

    fn check_size(&self, start: BitPosition, end: BitPosition) -> Result<BitPosition, Rejection> {
        let bits = end - start;
        if bits < self.config.min_block_bits {
            return Err(Rejection::BlockTooShort {
                bits,
                minimum: self.config.min_block_bits,
            });
        }
        Ok(end)
    }

    /// The block after a non-final one must start with a usable header.
    fn check_next_header(&self, position: BitPosition) -> Result<(), Rejection> {
        let mut cursor = BitCursor::at(self.data, position)?;
        let bits = cursor
            .read(BLOCK_HEADER_BITS as u32)
            .map_err(|_| Rejection::MissingNextHeader)?;

        match BlockHeader::from_bits(bits).block_type {
            BlockType::Reserved => Err(Rejection::InvalidNextHeader("reserved block type")),
            BlockType::DynamicHuffman => Preamble::read(&mut cursor)
                .map(drop)
                .map_err(|_| Rejection::InvalidNextHeader("dynamic block preamble")),
            BlockType::Stored => StoredHeader::read(&mut cursor, true)
                .map(drop)
                .map_err(|_| Rejection::InvalidNextHeader("stored block length")),
            BlockType::FixedHuffman => TrialDecoder::for_block(
                fixed_literal_table(),
                Some(fixed_distance_table()),
                position,
            )
            .run(&mut cursor)
            .map(drop)
            .map_err(|_| Rejection::InvalidNextHeader("fixed block body")),
        }
    }

    /// Nothing follows a final block but the zero bits that fill its last byte.
    fn check_final_padding(&self, end: BitPosition) -> Result<(), Rejection> {
        let mut cursor = BitCursor::at(self.data, end)?;
        if cursor.align_to_byte()? != 0 {
            return Err(Rejection::FinalPaddingNotZero);
        }
        Ok(())
    }

    /// Forward scan over `start..limit` for the first verified block.
    fn scan(
        &self,
        start: BitPosition,
        limit: BitPosition,
        stats: &mut ScanStats,
    ) -> Option<VerifiedBlock> {
        // A candidate needs its 3 header bits inside the buffer
        let limit = limit.min((self.bit_len() + 1).saturating_sub(BLOCK_HEADER_BITS));
        let use_lut = self.config.kinds.dynamic_only();
        let mut cursor = BitCursor::new(self.data);
        let mut position = start;

        while position < limit {
            if use_lut {
                cursor.seek(position).ok()?;
                let skip = dynamic_candidate_skip(
                    cursor.peek_padded(SKIP_LUT_BITS),
                    self.config.accept_final,
                );
                if skip > 0 {
                    stats.lut_skipped += skip;
                    position += skip;
                    continue;
                }
            }

            stats.candidates += 1;
            match self.verify(position) {
                Ok(block) => {
                    stats.verified += 1;
                    if debug_enabled() {
                        eprintln!(
                            "[blockfinder] {:?} block at bit {} (~{} B), {} bits, final={}",
                            block.header.block_type,
                            block.position,
                            block.position / 8,
                            block.bit_len(),
                            block.header.is_final
                        );
                    }
                    return Some(block);
                }
                Err(rejection) => stats.record(rejection),
            }
            position += 1;
        }

        None
    }
}

/// Iterator over verified blocks in stream order
pub struct BlockOffsets<'f, 'a> {
    finder: &'f BlockFinder<'a>,
    position: BitPosition,
    stats: ScanStats,
}

impl BlockOffsets<'_, '_> {
    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }
}

impl Iterator for BlockOffsets<'_, '_> {
    type Item = VerifiedBlock;

    fn next(&mut self) -> Option<VerifiedBlock> {
        if self.position > self.finder.bit_len() {
            return None;
        }
        let block = self
            .finder
            .scan(self.position, self.finder.bit_len(), &mut self.stats)?;
        self.position = block.resume_position();
        Some(block)
    }
}
