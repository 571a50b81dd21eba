//! Fixed DEFLATE alphabets and tables (RFC 1951 §3.2.5 - §3.2.7)

/// Maximum back-reference distance (32KB)
pub const WINDOW_SIZE: usize = 32 * 1024;

/// Maximum match length
pub const MAX_MATCH_LENGTH: usize = 258;

/// END_OF_BLOCK symbol
pub const END_OF_BLOCK: u16 = 256;

/// Block header: BFINAL + BTYPE
pub const BLOCK_HEADER_BITS: usize = 3;

/// Width of the literal/length alphabet (HLIT <= 31), including the
/// unused symbols 286 and 287
pub const MAX_LITERAL_CODES: usize = 288;

/// Width of the distance alphabet (HDIST <= 31), including the unused
/// symbols 30 and 31
pub const MAX_DISTANCE_CODES: usize = 32;

/// Number of precode (code length alphabet) symbols
pub const PRECODE_COUNT: usize = 19;

/// Maximum precode length (3-bit field)
pub const MAX_PRECODE_LENGTH: u8 = 7;

/// Bits per precode length
pub const PRECODE_BITS: u32 = 3;

/// Precode alphabet order
pub const PRECODE_ORDER: [usize; PRECODE_COUNT] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Extra bits for length codes
pub static LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Base lengths for length codes
pub static LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

/// Extra bits for distance codes
pub static DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Base distances for distance codes
pub static DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Code lengths of the fixed literal/length code (BTYPE=01)
pub const fn fixed_literal_lengths() -> [u8; MAX_LITERAL_CODES] {
    let mut lengths = [0u8; MAX_LITERAL_CODES];
    let mut i = 0;
    while i < MAX_LITERAL_CODES {
        lengths[i] = match i {
            0..=143 => 8,
            144..=255 => 9,
            256..=279 => 7,
            _ => 8,
        };
        i += 1;
    }
    lengths
}

/// Code lengths of the fixed distance code (BTYPE=01)
pub const FIXED_DISTANCE_LENGTHS: [u8; MAX_DISTANCE_CODES] = [5; MAX_DISTANCE_CODES];

/// Length symbol (257..=285) and extra-bit value for a match length
pub fn length_symbol(length: usize) -> Option<(u16, u16, u8)> {
    if !(3..=MAX_MATCH_LENGTH).contains(&length) {
        return None;
    }
    let code = LENGTH_BASE.iter().rposition(|&base| base as usize <= length)?;
    let extra = (length - LENGTH_BASE[code] as usize) as u16;
    Some((257 + code as u16, extra, LENGTH_EXTRA_BITS[code]))
}

/// Distance symbol (0..=29) and extra-bit value for a match distance
pub fn distance_symbol(distance: usize) -> Option<(u16, u16, u8)> {
    if !(1..=WINDOW_SIZE).contains(&distance) {
        return None;
    }
    let code = DISTANCE_BASE
        .iter()
        .rposition(|&base| base as usize <= distance)?;
    let extra = (distance - DISTANCE_BASE[code] as usize) as u16;
    Some((code as u16, extra, DISTANCE_EXTRA_BITS[code]))
}
