//! blockfinder - locate DEFLATE block boundaries in a compressed file
//!
//! Scans a gzip, zlib or raw DEFLATE file for the start of every block that
//! can be decoded on its own given the preceding window, and reports how
//! fast the offsets were found.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;
use std::time::{Duration, Instant};

use memmap2::Mmap;

use deflate_sync::block_finder::{BlockFinder, ScanStats};
use deflate_sync::cli::BlockfinderArgs;
use deflate_sync::error::{SyncError, SyncResult};
use deflate_sync::format::ContainerFormat;
use deflate_sync::parallel::find_blocks_parallel_from;
use deflate_sync::utils::{format_bit_offset, format_percentage, format_size, throughput_mb_per_s};
use deflate_sync::BitPosition;

const VERSION: &str = concat!("blockfinder ", env!("CARGO_PKG_VERSION"));

fn main() {
    match run() {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("blockfinder: {}", e);
            process::exit(1);
        }
    }
}

fn run() -> SyncResult<i32> {
    let args = BlockfinderArgs::parse()?;

    if args.version {
        println!("{}", VERSION);
        return Ok(0);
    }

    if args.help {
        print_help();
        return Ok(0);
    }

    let Some(file) = args.file.as_deref() else {
        eprintln!("A gzip, zlib or raw deflate file path must be specified!");
        eprintln!("Usage: blockfinder [OPTION]... FILE [REPEAT]");
        return Ok(1);
    };

    let path = Path::new(file);
    if !path.exists() {
        return Err(SyncError::FileNotFound(file.to_string()));
    }
    if path.is_dir() {
        return Err(SyncError::invalid_argument(format!("{} is a directory", file)));
    }

    let input = File::open(path)?;
    let mmap = unsafe { Mmap::map(&input)? };
    if mmap.is_empty() {
        return Err(SyncError::EmptyInput);
    }

    let format = if args.raw {
        ContainerFormat::RawDeflate
    } else {
        ContainerFormat::detect(&mmap)
    };
    let start = format.payload_offset(&mmap)? * 8;

    if args.verbosity >= 2 {
        eprintln!(
            "blockfinder: {} ({}, {}), scanning from bit {} with {} thread(s)",
            file,
            format_size(mmap.len()),
            format,
            start,
            args.thread_count()
        );
    }

    let scan = match args.repeat {
        Some(repeat) => {
            scan_file(&mmap, start, &args)?;
            let mut last = None;
            for _ in 0..repeat {
                let scan = scan_file(&mmap, start, &args)?;
                report(&scan, mmap.len(), &args);
                last = Some(scan);
            }
            last
        }
        None => {
            let scan = scan_file(&mmap, start, &args)?;
            report(&scan, mmap.len(), &args);
            Some(scan)
        }
    };

    if args.list {
        if let Some(scan) = scan {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            for offset in &scan.offsets {
                writeln!(writer, "{}", offset)?;
            }
            writer.flush()?;
        }
    }

    Ok(0)
}

/// Offsets and timings of one pass over the file
struct ScanRun {
    offsets: Vec<BitPosition>,
    stats: ScanStats,
    elapsed: Duration,
    /// Offset of the second verified block and the time taken to reach it
    /// from the first one
    second_found: Option<(BitPosition, Duration)>,
}

fn scan_file(data: &[u8], start: BitPosition, args: &BlockfinderArgs) -> SyncResult<ScanRun> {
    let config = args.sync_config();
    let threads = args.thread_count();
    let t0 = Instant::now();

    if threads > 1 {
        let report = find_blocks_parallel_from(data, &config, threads, start)?;
        let elapsed = t0.elapsed();
        // Chunks finish out of order, so time the first-to-second sync on its own
        let second_found = match report.offsets.first() {
            Some(&first) => time_second_block(&BlockFinder::with_config(data, config)?, first)?,
            None => None,
        };
        return Ok(ScanRun {
            offsets: report.offsets,
            stats: report.stats,
            elapsed,
            second_found,
        });
    }

    let finder = BlockFinder::with_config(data, config)?;
    let mut run = ScanRun {
        offsets: Vec::new(),
        stats: ScanStats::default(),
        elapsed: Duration::ZERO,
        second_found: None,
    };

    // Resume past every hit until the rest of the file holds none
    let mut position = start;
    let mut first_found = None;
    while let Some(block) = finder.find_next_with_stats(position, &mut run.stats)? {
        match first_found {
            None => first_found = Some(t0.elapsed()),
            Some(first) if run.second_found.is_none() => {
                run.second_found = Some((block.position, t0.elapsed() - first));
            }
            Some(_) => {}
        }
        run.offsets.push(block.position);
        position = block.resume_position();
    }

    run.elapsed = t0.elapsed();
    Ok(run)
}

/// Sync from the block at `first` to the one after it.
fn time_second_block(
    finder: &BlockFinder<'_>,
    first: BitPosition,
) -> SyncResult<Option<(BitPosition, Duration)>> {
    let resume = finder
        .verify(first)
        .map_err(|reason| SyncError::invalid_stream(first, reason))?
        .resume_position();
    let t0 = Instant::now();
    Ok(finder
        .find_next(resume)?
        .map(|block| (block.position, t0.elapsed())))
}

fn report(run: &ScanRun, file_size: usize, args: &BlockfinderArgs) {
    if args.verbosity == 0 {
        return;
    }

    if let Some((offset, _)) = run.second_found {
        eprintln!("Found second block at offset: {}", format_bit_offset(offset));
    }
    eprintln!(
        "Found {} blocks in {:.6} s ({:.6} MB/s).",
        run.offsets.len(),
        run.elapsed.as_secs_f64(),
        throughput_mb_per_s(file_size, run.elapsed)
    );
    if let Some((_, latency)) = run.second_found {
        eprintln!(
            "Latency to find second block from first one: {:.6} ms",
            latency.as_secs_f64() * 1000.0
        );
    }

    if args.verbosity >= 2 {
        let stats = &run.stats;
        let positions = stats.positions();
        eprintln!(
            "Scanned {} bit positions: {} skipped by lookup table ({}), {} candidates examined",
            positions,
            stats.lut_skipped,
            format_percentage(stats.lut_skipped, positions),
            stats.candidates
        );
    }

    if args.verbosity >= 3 {
        let stats = &run.stats;
        eprintln!("  rejected at block header:   {}", stats.header_rejects);
        eprintln!("  rejected at code lengths:   {}", stats.code_rejects);
        eprintln!("  rejected in block body:     {}", stats.body_rejects);
        eprintln!("  rejected at next header:    {}", stats.next_header_rejects);
        eprintln!("  ran past end of input:      {}", stats.truncated);
        eprintln!("  verified:                   {}", stats.verified);
    }
}

fn print_help() {
    println!("Usage: blockfinder [OPTION]... FILE [REPEAT]");
    println!();
    println!("Find the bit offsets of DEFLATE blocks in FILE without decoding it.");
    println!("With REPEAT, one warm-up scan runs first, then REPEAT timed scans.");
    println!();
    println!("Options:");
    println!("  -p, --threads N    Scan with N threads (0 = all CPUs, default 1)");
    println!("  --stored           Also report stored blocks");
    println!("  --fixed            Also report fixed-Huffman blocks");
    println!("  --all-types        Report stored, fixed and dynamic blocks");
    println!("  --no-dynamic       Do not report dynamic-Huffman blocks");
    println!("  --no-final         Do not report final blocks");
    println!("  --min-bits N       Minimum Huffman block size in bits (default 1024)");
    println!("  --no-lookahead     Skip the check of the following block header");
    println!("  --raw              Treat FILE as raw deflate, even if it looks like gzip/zlib");
    println!("  -l, --list         Print every offset (in bits) to stdout");
    println!("  -q, --quiet        Suppress the timing report");
    println!("  -v, --verbose      Print scan statistics (-vv for rejection counts)");
    println!("  -h, --help         Show this help");
    println!("  -V, --version      Show version");
    println!();
    println!("Options are also read from the BLOCKFINDER environment variable.");
}
