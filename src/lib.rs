//! deflate-sync - find DEFLATE block boundaries without an index
//!
//! Given a compressed buffer and an arbitrary bit offset, [`BlockFinder::sync`]
//! returns the next offset at which a DEFLATE block provably starts: its
//! header parses, its Huffman codes are well formed, its body decodes to
//! END_OF_BLOCK using only back-references a real stream could satisfy, and
//! the block after it starts with a plausible header. Decoding can then
//! resume from that offset, given the preceding 32 KiB window, which is what
//! parallel and random-access decompressors need.
//!
//! ```no_run
//! use deflate_sync::BlockFinder;
//!
//! # fn main() -> deflate_sync::SyncResult<()> {
//! let data = std::fs::read("file.deflate")?;
//! let finder = BlockFinder::new(&data)?;
//! for block in finder.offsets() {
//!     println!("block at bit {}", block.position);
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(test)]
#[macro_use]
mod test_utils;

pub mod bit_cursor;
pub mod block_finder;
pub mod cli;
pub mod error;
pub mod format;
pub mod header;
pub mod huffman;
pub mod inflate;
pub mod inflate_tables;
pub mod parallel;
pub mod trial_decode;
pub mod utils;

#[cfg(test)]
mod sync_tests;

pub use bit_cursor::{BitCursor, BitPosition, OutOfBounds};
pub use block_finder::{BlockFinder, BlockKinds, ScanStats, SyncConfig, VerifiedBlock};
pub use error::{Rejection, SyncError, SyncResult};
pub use inflate::{inflate_from, BlockRecord, Inflater};
pub use parallel::{find_blocks_parallel, ScanReport};
