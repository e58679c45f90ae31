//! CLI argument parsing using Clap.

use clap::Parser;

/// chunkstats - chunking and postage bucket benchmark sweep
#[derive(Parser, Debug)]
#[command(name = "chunkstats")]
#[command(version, about, long_about = None, disable_version_flag = true)]
#[command(after_help = "Examples:
  chunkstats                 Run the sweep with 10 iterations per cell
  chunkstats 1               Single pass over every cell
  RUST_LOG=debug chunkstats  Also log collision histograms

Settings are read from $CHUNKSTATS_CONFIG_PATH or ./chunkstats.json.
")]
pub struct Cli {
    /// Print version information
    #[arg(short = 'V', long)]
    pub version: bool,

    /// Trials per (size, compaction level) cell
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub iterations: Option<u32>,
}
