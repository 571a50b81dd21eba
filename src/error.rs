use std::fmt;
use std::io;
use thiserror::Error;

use crate::bit_cursor::{BitPosition, OutOfBounds};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Empty input: the compressed buffer contains no bytes")]
    EmptyInput,

    #[error("Boundary error: {0}")]
    Boundary(#[from] OutOfBounds),

    #[error("Invalid deflate stream at bit {position}: {reason}")]
    InvalidStream {
        position: BitPosition,
        #[source]
        reason: Rejection,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Thread error: {0}")]
    Thread(String),
}

impl SyncError {
    pub fn invalid_argument<T: fmt::Display>(msg: T) -> Self {
        SyncError::InvalidArgument(msg.to_string())
    }

    pub fn thread<T: fmt::Display>(msg: T) -> Self {
        SyncError::Thread(msg.to_string())
    }

    pub fn invalid_stream(position: BitPosition, reason: Rejection) -> Self {
        SyncError::InvalidStream { position, reason }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Why a candidate offset was not accepted as a block start.
///
/// Rejections are the normal outcome for almost every bit offset and never
/// leave `BlockFinder::sync`. The reference inflater reports them wrapped in
/// [`SyncError::InvalidStream`] when it meets corrupt data.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("stream ends before the block does")]
    Truncated,

    #[error("reserved block type 3")]
    ReservedBlockType,

    #[error("block type not searched for")]
    BlockKindDisabled,

    #[error("final blocks are excluded from the search")]
    FinalBlockSkipped,

    #[error("code length {length} for symbol {symbol} exceeds 15")]
    CodeLengthTooLong { symbol: usize, length: u8 },

    #[error("{0} code lengths exceed the 288 symbol alphabet")]
    TooManySymbols(usize),

    #[error("over-subscribed Huffman code")]
    OverSubscribedCode,

    #[error("incomplete Huffman code")]
    IncompleteCode,

    #[error("Huffman code has no symbols")]
    EmptyCode,

    #[error("repeat code 16 with no previous length")]
    RepeatWithoutPrevious,

    #[error("code length repeat runs past the table end")]
    CodeLengthOverflow,

    #[error("end-of-block symbol has no code")]
    MissingEndOfBlock,

    #[error("bit pattern maps to no symbol")]
    InvalidCode,

    #[error("invalid literal/length symbol {0}")]
    InvalidLiteralSymbol(u16),

    #[error("invalid distance symbol {0}")]
    InvalidDistanceSymbol(u16),

    #[error("length code in a block without distance codes")]
    MissingDistanceCode,

    #[error("distance {distance} reaches before the {available} available bytes")]
    DistanceTooFar { distance: usize, available: usize },

    #[error("stored block LEN/NLEN mismatch")]
    StoredLengthMismatch,

    #[error("stored block padding bits are not zero")]
    StoredPaddingNotZero,

    #[error("block of {bits} bits is shorter than the {minimum} bit minimum")]
    BlockTooShort { bits: usize, minimum: usize },

    #[error("non-final block is not followed by another block header")]
    MissingNextHeader,

    #[error("following block header is invalid: {0}")]
    InvalidNextHeader(&'static str),

    #[error("padding after the final block is not zero")]
    FinalPaddingNotZero,
}

impl From<OutOfBounds> for Rejection {
    fn from(_: OutOfBounds) -> Self {
        Rejection::Truncated
    }
}
