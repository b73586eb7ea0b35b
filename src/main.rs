//! datarepo-read - stream records out of an indexed sample repository
//!
//! Runs one full reader session and writes every record's bytes to the
//! output file (or discards them), then prints read statistics.

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use datarepo::config::{CliArgs, ReaderConfig};
use datarepo::RepoReader;

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn progress_bar(total: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})",
            )
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

fn run() -> Result<()> {
    let args = CliArgs::parse_args();
    setup_logging(args.verbose, args.quiet);
    args.validate()
        .map_err(|e| anyhow::anyhow!("Invalid arguments: {}", e))?;

    let config = ReaderConfig::from_cli(&args).context("Configuration error")?;
    let mut reader = RepoReader::new(config);
    reader.open().context("Failed to open repository")?;

    // Without --stop the whole repository from --start on is read
    if args.stop_sample_index.is_none() {
        let total = reader.metadata().map_or(0, |m| m.total_samples);
        let last = i64::try_from(total.saturating_sub(1)).unwrap_or(i64::MAX);
        reader.config_mut()?.set_stop_sample_index(last);
    }

    reader.start().context("Failed to start reader")?;
    let total = reader.total_records().unwrap_or(0);
    info!("Reading {} record(s)", total);

    let mut output = match args.output {
        Some(ref path) => {
            info!("Writing records to: {:?}", path);
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Some(BufWriter::new(file))
        }
        None => None,
    };

    let pb = progress_bar(total, args.quiet || args.no_progress);
    while let Some(record) = reader.next_record()? {
        if let Some(ref mut out) = output {
            out.write_all(&record.data)?;
        }
        pb.inc(1);
        if pb.position() % 1024 == 0 {
            pb.set_message(format!("epoch {}", record.epoch));
        }
    }
    pb.finish_with_message("done");

    if let Some(mut out) = output {
        out.flush()?;
    }

    let snapshot = reader.stats().snapshot();
    reader.close();

    if !args.quiet {
        println!("\n====================================");
        println!("READ COMPLETE");
        println!("====================================");
        println!("Records: {}", snapshot.records);
        println!("Bytes: {}", snapshot.bytes);
        println!(
            "Throughput: {:.1} records/s over {:.3}s",
            snapshot.records_per_sec, snapshot.duration_secs
        );
        println!(
            "Latency: mean={:.1}us p50={}us p99={}us max={}us",
            snapshot.mean_latency_us,
            snapshot.p50_latency_us,
            snapshot.p99_latency_us,
            snapshot.max_latency_us
        );
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
