//! groupsum binary.
//!
//! Ingests traffic samples, sums them per ISP/location/city and per bar
//! level, and writes the resulting tables as CSV.
//!
//! # Configuration
//!
//! Configuration can be provided through multiple sources, in order of precedence:
//!
//! 1. Command-line arguments (highest precedence)
//! 2. Environment variables (prefixed with `GROUPSUM_`)
//! 3. User-specified configuration file (via `--config`)
//! 4. `config/local.toml` in the working directory
//! 5. Default configuration (embedded in binary)
//!
//! ## Command-line Options
//!
//! ```text
//! Options:
//!   -c, --config <FILE>               Path to the configuration file
//!   -i, --input <FILE>                Newline-delimited JSON records, repeatable [env: GROUPSUM_INPUT]
//!   -o, --output-dir <DIR>            Directory collected tables are written to [env: GROUPSUM_OUTPUT_DIR]
//!       --on-record-error <POLICY>    stop | skip
//!       --write-csv <BOOL>            Write collected tables as CSV
//!       --log-filter <FILTER>         Log filter directive [env: GROUPSUM_LOG_FILTER]
//! ```
//!
//! ## Configuration File Format (TOML)
//!
//! ```toml
//! [ingest]
//! on_record_error = "stop"   # Options: "stop", "skip"
//! channel_capacity = 1024
//!
//! [output]
//! directory = "."
//! write_csv = true
//!
//! [log]
//! filter = "info"
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Built-in sample, tables written to the working directory
//! groupsum
//!
//! # Records from two files, skipping lines that fail to parse
//! groupsum -i east.jsonl -i west.jsonl --on-record-error skip --output-dir out
//! ```
//!
//! Each input line is one JSON object:
//!
//! ```json
//! {"isp":"ct","loc":"bj","city":"bj","Bar":1,"Foo":1}
//! ```

use clap::Parser;
use groupsum::{
    config::{CliArgs, Settings},
    run, sample_records, spawn_producer, ChannelSource, CsvSink, IterSource,
    JsonLinesSource, RecordSource, TableSink, TrafficSample,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli_args = CliArgs::parse();

    // Load settings from config file and CLI args
    let settings = Settings::new(&cli_args)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let source: Box<dyn RecordSource<TrafficSample>> = if cli_args.input.is_empty() {
        info!("no input given, using built-in sample");
        Box::new(IterSource::new(sample_records()))
    } else {
        // One producer per file, all feeding the same channel
        let (channel, sender) = ChannelSource::new(settings.ingest.channel_capacity);
        for path in &cli_args.input {
            info!(path = %path.display(), "reading records from file");
            spawn_producer(&JsonLinesSource::<TrafficSample>::new(path), sender.clone());
        }
        drop(sender);
        Box::new(channel)
    };

    let sink = if settings.output.write_csv {
        Some(CsvSink::new(&settings.output.directory)?)
    } else {
        None
    };

    let report = run(
        source.as_ref(),
        settings.ingest.on_record_error,
        sink.as_ref().map(|sink| sink as &dyn TableSink),
    )
    .await?;

    info!(
        processed = report.processed,
        skipped = report.skipped,
        output = %settings.output.directory.display(),
        "done"
    );
    Ok(())
}
