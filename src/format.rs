use std::fmt;

use crate::error::{SyncError, SyncResult};

/// Wrapper around the raw DEFLATE stream in an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerFormat {
    #[default]
    RawDeflate,
    Gzip,
    Zlib,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const GZIP_HEADER_LEN: usize = 10;
const ZLIB_HEADER_LEN: usize = 2;

impl ContainerFormat {
    /// Guess the container from the first bytes; anything unrecognised is
    /// scanned as raw DEFLATE.
    pub fn detect(data: &[u8]) -> Self {
        if data.len() >= GZIP_HEADER_LEN && data[..2] == GZIP_MAGIC && data[2] == 0x08 {
            ContainerFormat::Gzip
        } else if data.len() >= ZLIB_HEADER_LEN
            && data[0] & 0x0f == 0x08
            && data[0] >> 4 <= 7
            && data[1] & 0x20 == 0
            && u16::from_be_bytes([data[0], data[1]]) % 31 == 0
        {
            ContainerFormat::Zlib
        } else {
            ContainerFormat::RawDeflate
        }
    }

    /// Byte offset of the DEFLATE stream inside the container.
    pub fn payload_offset(&self, data: &[u8]) -> SyncResult<usize> {
        match self {
            ContainerFormat::RawDeflate => Ok(0),
            ContainerFormat::Zlib => {
                if data.len() < ZLIB_HEADER_LEN {
                    return Err(SyncError::invalid_argument("truncated zlib header"));
                }
                Ok(ZLIB_HEADER_LEN)
            }
            ContainerFormat::Gzip => gzip_header_len(data),
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerFormat::RawDeflate => write!(f, "raw deflate"),
            ContainerFormat::Gzip => write!(f, "gzip"),
            ContainerFormat::Zlib => write!(f, "zlib"),
        }
    }
}

/// Length of the gzip member header, optional fields included
fn gzip_header_len(data: &[u8]) -> SyncResult<usize> {
    if data.len() < GZIP_HEADER_LEN || data[..2] != GZIP_MAGIC || data[2] != 0x08 {
        return Err(SyncError::invalid_argument("not a gzip header"));
    }

    let flags = data[3];
    let mut offset = GZIP_HEADER_LEN;

    // FEXTRA
    if flags & 0x04 != 0 {
        let xlen = data
            .get(offset..offset + 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)
            .ok_or_else(|| SyncError::invalid_argument("truncated gzip extra field"))?;
        offset += 2 + xlen;
    }

    // FNAME, FCOMMENT: zero-terminated
    for flag in [0x08, 0x10] {
        if flags & flag != 0 {
            let terminator = data
                .get(offset..)
                .and_then(|rest| rest.iter().position(|&b| b == 0))
                .ok_or_else(|| SyncError::invalid_argument("unterminated gzip header string"))?;
            offset += terminator + 1;
        }
    }

    // FHCRC
    if flags & 0x02 != 0 {
        offset += 2;
    }

    if offset > data.len() {
        return Err(SyncError::invalid_argument("truncated gzip header"));
    }
    Ok(offset)
}
