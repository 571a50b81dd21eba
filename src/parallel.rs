//! Partitioned block search
//!
//! The bit range is cut into equal chunks, each chunk is scanned
//! independently on a rayon pool and the per-chunk offsets are concatenated
//! in chunk order. A block found in chunk `i` starts inside chunk `i`, so the
//! merged list is sorted. Stored header aliases that straddle a chunk
//! boundary are dropped while merging, which makes the result identical to
//! a sequential scan.

use rayon::prelude::*;

use crate::bit_cursor::{BitPosition, OutOfBounds};
use crate::block_finder::{BlockFinder, ScanStats, SyncConfig, VerifiedBlock};
use crate::error::{SyncError, SyncResult};

/// Chunks smaller than this are not worth a task
const MIN_CHUNK_BITS: usize = 1 << 20;

/// Chunks per thread, for load balancing
const CHUNKS_PER_THREAD: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub offsets: Vec<BitPosition>,
    pub stats: ScanStats,
}

/// Every verified offset in `data`, scanned with `threads` workers.
pub fn find_blocks_parallel(
    data: &[u8],
    config: &SyncConfig,
    threads: usize,
) -> SyncResult<ScanReport> {
    find_blocks_parallel_from(data, config, threads, 0)
}

/// Like [`find_blocks_parallel`], starting at bit `start`.
pub fn find_blocks_parallel_from(
    data: &[u8],
    config: &SyncConfig,
    threads: usize,
    start: BitPosition,
) -> SyncResult<ScanReport> {
    let finder = BlockFinder::with_config(data, config.clone())?;
    let bit_len = finder.bit_len();
    if start > bit_len {
        return Err(OutOfBounds {
            position: start,
            requested: 0,
            available: 0,
        }
        .into());
    }

    let threads = threads.max(1);
    let chunk_bits = chunk_size(bit_len - start, threads);

    if threads == 1 || chunk_bits >= bit_len - start {
        let mut stats = ScanStats::default();
        let offsets = finder.find_in_range(start, bit_len, &mut stats)?;
        return Ok(ScanReport { offsets, stats });
    }

    let ranges: Vec<(BitPosition, BitPosition)> = (start..bit_len)
        .step_by(chunk_bits)
        .map(|chunk_start| (chunk_start, (chunk_start + chunk_bits).min(bit_len)))
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(SyncError::thread)?;

    let chunks: Vec<SyncResult<(Vec<VerifiedBlock>, ScanStats)>> = pool.install(|| {
        ranges
            .par_iter()
            .map(|&(chunk_start, chunk_end)| {
                let mut stats = ScanStats::default();
                let blocks = finder.find_blocks_in_range(chunk_start, chunk_end, &mut stats)?;
                Ok((blocks, stats))
            })
            .collect()
    });

    let mut report = ScanReport::default();
    let mut resume = start;
    for chunk in chunks {
        let (blocks, stats) = chunk?;
        report.stats.merge(&stats);
        for block in blocks {
            if block.position < resume {
                report.stats.verified -= 1;
                continue;
            }
            resume = block.resume_position();
            report.offsets.push(block.position);
        }
    }
    Ok(report)
}

fn chunk_size(bits: usize, threads: usize) -> usize {
    bits.div_ceil(threads * CHUNKS_PER_THREAD).max(MIN_CHUNK_BITS)
}
