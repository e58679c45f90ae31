//! chunkstats - chunking and postage bucket benchmark sweep
//!
//! Sweeps the bundled chunk evaluator over the configured grid and writes
//! one averaged CSV row per cell.

#![forbid(unsafe_code)]

use std::io;

use anyhow::Result;
use chunkstats::chunker::SwarmChunkEvaluator;
use chunkstats::cli;
use chunkstats::config::{CONFIG_PATH_ENV, SETTINGS_FILE_NAME, Settings};
use chunkstats::payload::OsRandomSource;
use chunkstats::sweep::run_sweep;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(err) = main_impl() {
        print_error_with_hints(&err);
        std::process::exit(1);
    }
}

fn main_impl() -> Result<()> {
    let cli = cli::Cli::parse();

    if cli.version {
        print_version();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli_settings = Settings {
        iterations: cli.iterations,
        ..Settings::default()
    };
    let config = Settings::merge(Settings::load()?, cli_settings).resolve();
    config.validate()?;

    tracing::info!(
        report = %config.report_path.display(),
        sizes = config.sizes.len(),
        compaction_levels = config.compaction_levels.len(),
        iterations = config.iterations,
        "Loaded sweep configuration"
    );

    let evaluator = SwarmChunkEvaluator::new();
    let mut payloads = OsRandomSource;
    let outcome = futures::executor::block_on(run_sweep(&config, &evaluator, &mut payloads))?;

    println!(
        "Completed {} cells into {}. Test duration {:.3?}",
        outcome.rows_written,
        config.report_path.display(),
        outcome.elapsed
    );
    if outcome.chunk_count_mismatches > 0 {
        println!(
            "Warning: {} trials reported a chunk count different from the first trial of their cell",
            outcome.chunk_count_mismatches
        );
    }
    Ok(())
}

fn print_version() {
    println!(
        "chunkstats {} ({} {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or(""),
    );
}

fn print_error_with_hints(err: &anyhow::Error) {
    eprintln!("Error: {err}");
    for cause in err.chain() {
        if let Some(stats_error) = cause.downcast_ref::<chunkstats::Error>() {
            if let Some(hint) = hint_for(stats_error) {
                eprintln!("Hint: {hint}");
            }
            return;
        }
    }
}

fn hint_for(err: &chunkstats::Error) -> Option<String> {
    use chunkstats::Error;
    match err {
        Error::Config(_) => Some(format!(
            "check ./{SETTINGS_FILE_NAME} or the file named by {CONFIG_PATH_ENV}"
        )),
        Error::Consistency { .. } => Some(
            "set \"consistency\": \"warn\" to log chunk count mismatches instead of aborting"
                .to_string(),
        ),
        Error::Evaluation { .. } | Error::Payload(_) => {
            Some("the report keeps every cell completed before the failure".to_string())
        }
        Error::Io(_) | Error::Csv(_) => {
            Some("make sure the report path is writable".to_string())
        }
        Error::Json(_) | Error::Validation(_) => None,
    }
}
