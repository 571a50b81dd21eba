use std::env;

use crate::block_finder::{BlockKinds, SyncConfig, DEFAULT_MIN_BLOCK_BITS};
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockfinderArgs {
    pub file: Option<String>,
    /// Benchmark repetitions after one warm-up run
    pub repeat: Option<usize>,
    /// Parallel scan with this many threads
    pub threads: Option<usize>,
    pub stored: bool,
    pub fixed: bool,
    pub dynamic: bool,
    /// Report final blocks too; `--no-final` turns this off
    pub accept_final: bool,
    pub min_block_bits: usize,
    pub check_next_header: bool,
    /// Scan the file as raw DEFLATE even if it looks like gzip or zlib
    pub raw: bool,
    pub list: bool,
    pub verbosity: u8,
    pub help: bool,
    pub version: bool,
}

impl Default for BlockfinderArgs {
    fn default() -> Self {
        BlockfinderArgs {
            file: None,
            repeat: None,
            threads: None,
            stored: false,
            fixed: false,
            dynamic: true,
            accept_final: true,
            min_block_bits: DEFAULT_MIN_BLOCK_BITS,
            check_next_header: true,
            raw: false,
            list: false,
            verbosity: 1,
            help: false,
            version: false,
        }
    }
}

impl BlockfinderArgs {
    pub fn parse() -> SyncResult<Self> {
        let mut argv: Vec<String> = env::args().skip(1).collect();

        // Options from the environment go first so the command line wins
        if let Ok(env_args) = env::var("BLOCKFINDER") {
            argv.splice(0..0, parse_env_args(&env_args));
        }

        Self::parse_from(argv)
    }

    pub fn parse_from(argv: Vec<String>) -> SyncResult<Self> {
        let mut args = BlockfinderArgs::default();
        let mut positional = Vec::new();
        let mut in_options = true;
        let mut i = 0;

        while i < argv.len() {
            let arg = &argv[i];

            if !in_options || !arg.starts_with('-') || arg == "-" {
                positional.push(arg.clone());
                i += 1;
                continue;
            }

            if arg == "--" {
                in_options = false;
                i += 1;
                continue;
            }

            if let Some(long) = arg.strip_prefix("--") {
                let (name, inline_value) = match long.split_once('=') {
                    Some((name, value)) => (name, Some(value.to_string())),
                    None => (long, None),
                };

                match name {
                    "help" => args.help = true,
                    "version" => args.version = true,
                    "stored" => args.stored = true,
                    "fixed" => args.fixed = true,
                    "all-types" => {
                        args.stored = true;
                        args.fixed = true;
                    }
                    "no-dynamic" => args.dynamic = false,
                    "no-final" => args.accept_final = false,
                    "no-lookahead" => args.check_next_header = false,
                    "raw" => args.raw = true,
                    "list" => args.list = true,
                    "quiet" | "silent" => args.verbosity = 0,
                    "verbose" => args.verbosity += 1,
                    "min-bits" | "threads" => {
                        let value = match inline_value {
                            Some(value) => value,
                            None => {
                                if i + 1 >= argv.len() {
                                    return Err(SyncError::invalid_argument(format!(
                                        "--{} requires an argument",
                                        name
                                    )));
                                }
                                i += 1;
                                argv[i].clone()
                            }
                        };
                        match name {
                            "min-bits" => args.min_block_bits = parse_count(&value)?,
                            _ => args.threads = Some(parse_threads(&value)?),
                        }
                    }
                    _ => {
                        return Err(SyncError::invalid_argument(format!(
                            "Unknown option: {}",
                            arg
                        )))
                    }
                }
            } else {
                // Short options, possibly combined (-vv, -p4)
                let chars: Vec<char> = arg.chars().collect();
                let mut j = 1;

                while j < chars.len() {
                    match chars[j] {
                        'h' => args.help = true,
                        'V' => args.version = true,
                        'l' => args.list = true,
                        'q' => args.verbosity = 0,
                        'v' => args.verbosity += 1,
                        'p' => {
                            let value = if j + 1 < chars.len() {
                                let value: String = chars[j + 1..].iter().collect();
                                j = chars.len();
                                value
                            } else {
                                if i + 1 >= argv.len() {
                                    return Err(SyncError::invalid_argument(
                                        "-p requires an argument",
                                    ));
                                }
                                i += 1;
                                argv[i].clone()
                            };
                            args.threads = Some(parse_threads(&value)?);
                        }
                        other => {
                            return Err(SyncError::invalid_argument(format!(
                                "Unknown option: -{}",
                                other
                            )))
                        }
                    }
                    j += 1;
                }
            }

            i += 1;
        }

        let mut positional = positional.into_iter();
        args.file = positional.next();
        if let Some(repeat) = positional.next() {
            args.repeat = Some(repeat.parse().map_err(|_| {
                SyncError::invalid_argument(format!("Invalid repeat count: {}", repeat))
            })?);
        }
        if let Some(extra) = positional.next() {
            return Err(SyncError::invalid_argument(format!(
                "Unexpected argument: {}",
                extra
            )));
        }

        if !(args.stored || args.fixed || args.dynamic) {
            return Err(SyncError::invalid_argument("No block type left to search for"));
        }

        Ok(args)
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            kinds: BlockKinds {
                stored: self.stored,
                fixed: self.fixed,
                dynamic: self.dynamic,
            },
            accept_final: self.accept_final,
            min_block_bits: self.min_block_bits,
            check_next_header: self.check_next_header,
        }
    }

    /// Worker count for the scan; 1 means the sequential `sync` loop.
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or(1)
    }
}

/// Split an options string the way a shell would, honouring double quotes.
fn parse_env_args(env_str: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current_arg = String::new();
    let mut in_quotes = false;

    for ch in env_str.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ' ' | '\t' if !in_quotes => {
                if !current_arg.is_empty() {
                    args.push(std::mem::take(&mut current_arg));
                }
            }
            _ => current_arg.push(ch),
        }
    }

    if !current_arg.is_empty() {
        args.push(current_arg);
    }

    args
}

/// Count with an optional k/m suffix (powers of 1024)
fn parse_count(value: &str) -> SyncResult<usize> {
    let value = value.to_lowercase();

    let (num_str, multiplier) = if let Some(num) = value.strip_suffix('k') {
        (num, 1024)
    } else if let Some(num) = value.strip_suffix('m') {
        (num, 1024 * 1024)
    } else {
        (value.as_str(), 1)
    };

    let num: usize = num_str
        .parse()
        .map_err(|_| SyncError::invalid_argument(format!("Invalid count: {}", value)))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| SyncError::invalid_argument(format!("Count too large: {}", value)))
}

/// Thread count, where 0 means one per CPU
fn parse_threads(value: &str) -> SyncResult<usize> {
    let threads: usize = value
        .parse()
        .map_err(|_| SyncError::invalid_argument(format!("Invalid thread count: {}", value)))?;
    Ok(if threads == 0 {
        num_cpus::get().max(1)
    } else {
        threads
    })
}
