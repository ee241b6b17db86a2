//! Command-line interface definitions for photodedup.
//!
//! ```bash
//! # Report duplicates without touching anything (default)
//! photodedup scan ~/Pictures
//!
//! # Remove verified duplicates, moving them to the trash
//! photodedup scan ~/Pictures --apply --trash
//!
//! # Machine-readable report
//! photodedup scan ~/Pictures --output json
//!
//! # Show the merged configuration
//! photodedup config
//! ```

use std::path::PathBuf;

use bytesize::ByteSize;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::scanner::HashAlgorithm;

/// Tiered duplicate detection for photo and video collections.
///
/// Candidates are grouped by size and file name, scored on metadata, and
/// verified by sampled then full content hashes before any file is removed.
#[derive(Debug, Parser)]
#[command(name = "photodedup")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory for duplicate files
    Scan(ScanArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Default, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Minimum file size to consider (default 1KiB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Confidence at which groups are accepted without reading content
    ///
    /// Between 0.0 and 1.0. The default 1.0 verifies every group by content.
    /// Lower values trade correctness for speed: accepted groups are never
    /// read, so files that differ only in content can be reported (and in
    /// apply mode removed) as duplicates.
    #[arg(long, value_name = "F")]
    pub confidence: Option<f64>,

    /// Seconds within which timestamps count as close
    #[arg(long, value_name = "SECS")]
    pub timestamp_tolerance: Option<u64>,

    /// Worker threads (default: CPU count x 4, at most 64)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Verify the content of at most N files (default: no limit)
    ///
    /// Groups past the limit are listed as unverified and left untouched.
    #[arg(long, value_name = "N")]
    pub max_verify: Option<usize>,

    /// Remove redundant copies (default is a dry run)
    #[arg(long)]
    pub apply: bool,

    /// Move removed copies to the system trash
    #[arg(long, requires = "apply")]
    pub trash: bool,

    /// Fingerprint algorithm
    #[arg(long, value_enum, value_name = "ALGORITHM")]
    pub hash: Option<HashAlgorithm>,

    /// Memory-map files at least this large when hashing in full
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub mmap_threshold: Option<u64>,

    /// Never memory-map files
    #[arg(long, conflicts_with = "mmap_threshold")]
    pub no_mmap: bool,

    /// Skip hidden files and directories
    #[arg(long)]
    pub skip_hidden: bool,

    /// Gitignore-style patterns to exclude (repeatable)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,
}

/// Arguments for the config subcommand.
#[derive(Debug, Default, Args)]
pub struct ConfigArgs {
    /// Print the default config file location instead
    #[arg(long)]
    pub path: bool,
}

/// Report format for scan results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON document
    Json,
    /// One CSV row per file
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Parse a human-readable size such as `4096`, `1.5MB` or `32 MiB`.
///
/// SI suffixes (KB, MB, GB, TB) are powers of 1000 and IEC suffixes
/// (KiB, MiB, GiB, TiB) powers of 1024. A bare number is bytes.
///
/// # Examples
///
/// ```
/// use photodedup::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("32MiB").unwrap(), 33_554_432);
/// ```
///
/// # Errors
///
/// Returns a message for empty or negative input and for anything
/// [`ByteSize`] cannot parse.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    s.parse::<ByteSize>()
        .map(|size| size.as_u64())
        .map_err(|e| format!("Invalid size '{s}': {e}"))
}
