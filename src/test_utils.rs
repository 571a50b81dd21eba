//! Stream builders and assertions shared by the test modules

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::Compression;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::huffman::canonical_codes;
use crate::inflate_tables::{
    distance_symbol, fixed_literal_lengths, length_symbol, END_OF_BLOCK, FIXED_DISTANCE_LENGTHS,
    MAX_DISTANCE_CODES, MAX_LITERAL_CODES, PRECODE_COUNT, PRECODE_ORDER,
};

/// Compare byte slices, reporting the first mismatch with surrounding context.
#[macro_export]
macro_rules! assert_slices_eq {
    ($left:expr, $right:expr) => {
        $crate::assert_slices_eq!($left, $right, "");
    };
    ($left:expr, $right:expr, $msg:expr) => {
        let left = &$left[..];
        let right = &$right[..];
        if left.len() != right.len() {
            panic!(
                "assertion failed: `(left == right)` {}\n  left len: {},\n right len: {}",
                $msg,
                left.len(),
                right.len()
            );
        }
        if let Some(i) = left.iter().zip(right.iter()).position(|(a, b)| a != b) {
            let start = i.saturating_sub(16);
            let end = (i + 16).min(left.len());
            panic!(
                "assertion failed: `(left == right)` {}\n at index {}\n  left: {:02X?}\n right: {:02X?}",
                $msg,
                i,
                &left[start..end],
                &right[start..end]
            );
        }
    };
}

/// LSB-first bit packer, the writing counterpart of `BitCursor`
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Low `n` bits of `value`, least significant first.
    pub fn write_bits(&mut self, value: u64, n: u32) {
        for i in 0..n {
            if self.bit_len % 8 == 0 {
                self.bytes.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            if let Some(last) = self.bytes.last_mut() {
                *last |= bit << (self.bit_len % 8);
            }
            self.bit_len += 1;
        }
    }

    /// Huffman code of `len` bits, most significant first.
    pub fn write_code(&mut self, code: u32, len: u32) {
        let reversed = code.reverse_bits() >> (32 - len);
        self.write_bits(reversed as u64, len);
    }

    pub fn align_to_byte(&mut self) {
        let pad = (8 - self.bit_len % 8) % 8;
        self.write_bits(0, pad as u32);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.align_to_byte();
        self.bytes.extend_from_slice(bytes);
        self.bit_len += bytes.len() * 8;
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Literal(u8),
    Match { length: usize, distance: usize },
}

/// The bytes `tokens` decode to, with nothing before them.
pub fn expand_tokens(tokens: &[Token]) -> Vec<u8> {
    let mut output = Vec::new();
    for token in tokens {
        match *token {
            Token::Literal(byte) => output.push(byte),
            Token::Match { length, distance } => {
                let start = output.len() - distance;
                for i in 0..length {
                    output.push(output[start + i]);
                }
            }
        }
    }
    output
}

fn write_tokens(
    writer: &mut BitWriter,
    literal_lengths: &[u8],
    distance_lengths: &[u8],
    tokens: &[Token],
) {
    let literal_codes = canonical_codes(literal_lengths);
    let distance_codes = canonical_codes(distance_lengths);
    let literal = |writer: &mut BitWriter, symbol: u16| {
        let len = literal_lengths[symbol as usize];
        assert!(len > 0, "symbol {} has no code", symbol);
        writer.write_code(literal_codes[symbol as usize] as u32, len as u32);
    };

    for token in tokens {
        match *token {
            Token::Literal(byte) => literal(writer, byte as u16),
            Token::Match { length, distance } => {
                let (symbol, extra, bits) = length_symbol(length).expect("match length");
                literal(writer, symbol);
                writer.write_bits(extra as u64, bits as u32);

                let (symbol, extra, bits) = distance_symbol(distance).expect("match distance");
                let len = distance_lengths[symbol as usize];
                assert!(len > 0, "distance symbol {} has no code", symbol);
                writer.write_code(distance_codes[symbol as usize] as u32, len as u32);
                writer.write_bits(extra as u64, bits as u32);
            }
        }
    }
    literal(writer, END_OF_BLOCK);
}

/// Dynamic block whose code lengths are sent through a flat precode
/// (symbols 0..=15 at 4 bits, no repeat codes).
pub fn write_dynamic_block(
    writer: &mut BitWriter,
    is_final: bool,
    literal_lengths: &[u8],
    distance_lengths: &[u8],
    tokens: &[Token],
) {
    assert!((257..=MAX_LITERAL_CODES).contains(&literal_lengths.len()));
    assert!((1..=MAX_DISTANCE_CODES).contains(&distance_lengths.len()));

    writer.write_bits(is_final as u64, 1);
    writer.write_bits(2, 2);
    writer.write_bits((literal_lengths.len() - 257) as u64, 5);
    writer.write_bits((distance_lengths.len() - 1) as u64, 5);
    writer.write_bits((PRECODE_COUNT - 4) as u64, 4);

    let mut precode = [0u8; PRECODE_COUNT];
    precode[..16].fill(4);
    for &symbol in PRECODE_ORDER.iter() {
        writer.write_bits(precode[symbol] as u64, 3);
    }
    for &len in literal_lengths.iter().chain(distance_lengths) {
        writer.write_code(len as u32, 4);
    }

    write_tokens(writer, literal_lengths, distance_lengths, tokens);
}

pub fn write_fixed_block(writer: &mut BitWriter, is_final: bool, tokens: &[Token]) {
    writer.write_bits(is_final as u64, 1);
    writer.write_bits(1, 2);
    write_tokens(
        writer,
        &fixed_literal_lengths(),
        &FIXED_DISTANCE_LENGTHS,
        tokens,
    );
}

pub fn write_stored_block(writer: &mut BitWriter, is_final: bool, payload: &[u8]) {
    let len = payload.len() as u16;
    writer.write_bits(is_final as u64, 1);
    writer.write_bits(0, 2);
    writer.align_to_byte();
    writer.write_bits(len as u64, 16);
    writer.write_bits(!len as u64, 16);
    writer.write_bytes(payload);
}

/// Literal code lengths for the hand-built stream: 'a'..=DEL and
/// END_OF_BLOCK at 5 bits each, a complete code over 261 symbols.
pub fn hand_built_literal_lengths() -> Vec<u8> {
    let mut lengths = vec![0u8; 261];
    lengths[97..=127].fill(5);
    lengths[END_OF_BLOCK as usize] = 5;
    lengths
}

/// Literal-only tokens of the hand-built blocks
pub fn hand_built_tokens() -> Vec<Token> {
    (0..141).map(|i| Token::Literal(97 + (i % 31) as u8)).collect()
}

/// `count` dynamic blocks of 1832 bits each, back to back from bit 0; the
/// last one is final and the stream ends exactly at its end.
fn hand_built_stream(count: usize) -> Vec<u8> {
    let literal_lengths = hand_built_literal_lengths();
    let tokens = hand_built_tokens();
    let mut writer = BitWriter::new();
    for i in 0..count {
        write_dynamic_block(&mut writer, i + 1 == count, &literal_lengths, &[0], &tokens);
    }
    assert_eq!(writer.bit_len(), count * 1832);
    writer.finish()
}

/// Blocks at bits 0 and 1832, the second one final
pub fn two_block_stream() -> Vec<u8> {
    hand_built_stream(2)
}

/// Blocks at bits 0, 1832 and 3664, the third one final
pub fn three_block_stream() -> Vec<u8> {
    hand_built_stream(3)
}

/// One final dynamic block at bit 0 that declares all 288 literal/length
/// and all 32 distance codes (HLIT=31, HDIST=31). Returns the stream and
/// the bytes it decodes to.
pub fn full_alphabet_stream() -> (Vec<u8>, Vec<u8>) {
    // 'a'..='~', END_OF_BLOCK and length symbol 257 at 5 bits: complete
    let mut literal_lengths = vec![0u8; MAX_LITERAL_CODES];
    literal_lengths[97..=126].fill(5);
    literal_lengths[END_OF_BLOCK as usize] = 5;
    literal_lengths[257] = 5;
    // Distance symbols 30 and 31 get codes but are never used
    let distance_lengths = [5u8; MAX_DISTANCE_CODES];

    let tokens: Vec<Token> = (0..200)
        .map(|i| {
            if i % 10 == 9 {
                Token::Match {
                    length: 3,
                    distance: 5,
                }
            } else {
                Token::Literal(97 + (i % 30) as u8)
            }
        })
        .collect();

    let mut writer = BitWriter::new();
    write_dynamic_block(&mut writer, true, &literal_lengths, &distance_lengths, &tokens);
    (writer.finish(), expand_tokens(&tokens))
}

/// Text-like data that compresses into dynamic blocks of realistic size
pub fn base64_like(len: usize, seed: u64) -> Vec<u8> {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|i| {
            if i % 77 == 76 {
                b'\n'
            } else {
                ALPHABET[rng.gen_range(0..ALPHABET.len())]
            }
        })
        .collect()
}

pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

/// Raw DEFLATE (no zlib/gzip wrapper) from flate2
pub fn compress_raw(data: &[u8], level: u32) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_cursor::BitCursor;

    #[test]
    fn test_bit_writer_matches_cursor() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_code(0b110, 3);
        writer.write_bits(0xABCD, 16);
        let data = writer.finish();

        let mut cursor = BitCursor::new(&data);
        assert_eq!(cursor.read(3).unwrap(), 0b101);
        // MSB-first code read one bit at a time
        assert_eq!(cursor.read(1).unwrap(), 1);
        assert_eq!(cursor.read(1).unwrap(), 1);
        assert_eq!(cursor.read(1).unwrap(), 0);
        assert_eq!(cursor.read(16).unwrap(), 0xABCD);
    }

    #[test]
    fn test_hand_built_stream_lengths() {
        assert_eq!(two_block_stream().len(), 458);
        assert_eq!(three_block_stream().len(), 687);
    }

    #[test]
    fn test_expand_tokens() {
        let tokens = [
            Token::Literal(b'a'),
            Token::Literal(b'b'),
            Token::Match {
                length: 5,
                distance: 2,
            },
        ];
        assert_eq!(expand_tokens(&tokens), b"abababa");
    }

    #[test]
    fn test_assert_slices_eq_passes() {
        assert_slices_eq!(vec![1u8, 2, 3], [1u8, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "at index 2")]
    fn test_assert_slices_eq_reports_index() {
        assert_slices_eq!(vec![1u8, 2, 3], [1u8, 2, 4]);
    }
}
