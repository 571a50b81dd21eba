//! Reference inflater
//!
//! Decodes a DEFLATE stream block by block from any bit offset, given the
//! bytes that logically precede it. This is the consumer of the offsets the
//! block finder reports, and the ground truth the tests check them against:
//! every decoded block is recorded with its bit range and output offset.

use std::io::Write;

use crate::bit_cursor::{split_position, BitCursor, BitPosition};
use crate::error::{Rejection, SyncError, SyncResult};
use crate::header::{BlockHeader, BlockType, DynamicHeader, StoredHeader};
use crate::huffman::{fixed_distance_table, fixed_literal_table};
use crate::inflate_tables::WINDOW_SIZE;
use crate::trial_decode::{decode_symbols, SymbolSink};

/// One decoded block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    pub position: BitPosition,
    pub end: BitPosition,
    pub header: BlockHeader,
    /// Offset of the block's first byte in this inflater's output
    pub output_offset: usize,
}

/// Appends decoded bytes to the history buffer
struct HistorySink<'h> {
    history: &'h mut Vec<u8>,
}

impl SymbolSink for HistorySink<'_> {
    type Error = Rejection;

    #[inline]
    fn literal(&mut self, byte: u8) -> Result<(), Rejection> {
        self.history.push(byte);
        Ok(())
    }

    #[inline]
    fn copy(&mut self, distance: usize, length: usize) -> Result<(), Rejection> {
        let available = self.history.len().min(WINDOW_SIZE);
        if distance > available {
            return Err(Rejection::DistanceTooFar {
                distance,
                available,
            });
        }

        // Byte at a time: source and destination overlap when distance < length
        let start = self.history.len() - distance;
        for i in 0..length {
            let byte = self.history[start + i];
            self.history.push(byte);
        }
        Ok(())
    }
}

pub struct Inflater<'a> {
    data: &'a [u8],
    position: BitPosition,
    /// Preceding window followed by output not yet trimmed
    history: Vec<u8>,
    records: Vec<BlockRecord>,
    total_output: usize,
    finished: bool,
}

impl<'a> Inflater<'a> {
    /// Start decoding at `position`; only the last 32 KiB of `dictionary`
    /// are kept.
    pub fn new(data: &'a [u8], position: BitPosition, dictionary: &[u8]) -> SyncResult<Self> {
        BitCursor::at(data, position)?;
        let keep = dictionary.len().min(WINDOW_SIZE);
        let mut history = Vec::with_capacity(2 * WINDOW_SIZE);
        history.extend_from_slice(&dictionary[dictionary.len() - keep..]);

        Ok(Self {
            data,
            position,
            history,
            records: Vec::new(),
            total_output: 0,
            finished: false,
        })
    }

    /// Bit position of the next block
    pub fn position(&self) -> BitPosition {
        self.position
    }

    pub fn records(&self) -> &[BlockRecord] {
        &self.records
    }

    pub fn total_output(&self) -> usize {
        self.total_output
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The last (up to) 32 KiB of dictionary plus output
    pub fn window(&self) -> &[u8] {
        let len = self.history.len();
        &self.history[len - len.min(WINDOW_SIZE)..]
    }

    /// Decode one block into `writer`; `None` once the final block is done.
    pub fn next_block<W: Write>(&mut self, writer: &mut W) -> SyncResult<Option<BlockRecord>> {
        if self.finished {
            return Ok(None);
        }

        let start = self.position;
        let before = self.history.len();
        let mut cursor = BitCursor::at(self.data, start)?;
        let header = self
            .decode_block(&mut cursor)
            .map_err(|reason| SyncError::invalid_stream(start, reason))?;

        writer.write_all(&self.history[before..])?;

        let record = BlockRecord {
            position: start,
            end: cursor.position(),
            header,
            output_offset: self.total_output,
        };
        self.total_output += self.history.len() - before;
        self.position = record.end;
        self.finished = header.is_final;
        self.records.push(record);

        if self.history.len() > 2 * WINDOW_SIZE {
            let excess = self.history.len() - WINDOW_SIZE;
            self.history.drain(..excess);
        }

        Ok(Some(record))
    }

    /// Decode through the final block, returning the bytes written.
    pub fn inflate_to_end<W: Write>(&mut self, writer: &mut W) -> SyncResult<usize> {
        let before = self.total_output;
        while self.next_block(writer)?.is_some() {}
        Ok(self.total_output - before)
    }

    fn decode_block(&mut self, cursor: &mut BitCursor) -> Result<BlockHeader, Rejection> {
        let header = BlockHeader::read(cursor)?;
        let mut sink = HistorySink {
            history: &mut self.history,
        };

        match header.block_type {
            BlockType::Stored => {
                let stored = StoredHeader::read(cursor, false)?;
                let (byte, _) = split_position(stored.payload_start);
                let payload = self
                    .data
                    .get(byte..byte + stored.length as usize)
                    .ok_or(Rejection::Truncated)?;
                stored.skip_payload(cursor)?;
                sink.history.extend_from_slice(payload);
            }
            BlockType::FixedHuffman => {
                decode_symbols(
                    cursor,
                    fixed_literal_table(),
                    Some(fixed_distance_table()),
                    &mut sink,
                )?;
            }
            BlockType::DynamicHuffman => {
                let tables = DynamicHeader::read(cursor)?;
                decode_symbols(cursor, &tables.literal, tables.distance_table(), &mut sink)?;
            }
            BlockType::Reserved => return Err(Rejection::ReservedBlockType),
        }

        Ok(header)
    }
}

/// Decode from a verified block offset to the end of the stream.
pub fn inflate_from<W: Write>(
    data: &[u8],
    position: BitPosition,
    dictionary: &[u8],
    writer: &mut W,
) -> SyncResult<usize> {
    Inflater::new(data, position, dictionary)?.inflate_to_end(writer)
}
