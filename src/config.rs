//! Configuration management for groupsum.
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. Default configuration (embedded in binary)
//! 2. `config/local.toml`, if present
//! 3. A configuration file given with `--config`
//! 4. Environment variables prefixed with `GROUPSUM_`, nested keys separated
//!    by `__` (e.g. `GROUPSUM_INGEST__ON_RECORD_ERROR=skip`)
//! 5. Command-line arguments

use clap::Parser;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::pipeline::ErrorPolicy;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");
const LOCAL_CONFIG_PATH: &str = "config/local.toml";

/// Command-line arguments.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Newline-delimited JSON record files, read concurrently; the built-in
    /// sample is used when none is given
    #[arg(short, long, value_name = "FILE", env = "GROUPSUM_INPUT", value_delimiter = ',')]
    pub input: Vec<PathBuf>,

    /// Directory collected tables are written to
    #[arg(short, long, value_name = "DIR", env = "GROUPSUM_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// What to do with a record its producer flagged as failed
    #[arg(long, value_enum)]
    pub on_record_error: Option<ErrorPolicy>,

    /// Write collected tables as CSV
    #[arg(long)]
    pub write_csv: Option<bool>,

    /// Log filter directive, e.g. "info" or "groupsum_core=debug"
    #[arg(long, env = "GROUPSUM_LOG_FILTER")]
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub ingest: IngestSettings,
    pub output: OutputSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestSettings {
    pub on_record_error: ErrorPolicy,
    /// Bound of the channel multiple producers feed records through
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    pub directory: PathBuf,
    pub write_csv: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub filter: String,
}

impl Settings {
    /// Loads settings from all sources, applying `cli` last.
    pub fn new(cli: &CliArgs) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(Path::new(LOCAL_CONFIG_PATH)).required(false));

        if let Some(ref path) = cli.config {
            builder = builder.add_source(File::from(path.clone()));
        }

        builder = builder.add_source(
            Environment::with_prefix("GROUPSUM")
                .prefix_separator("_")
                .separator("__"),
        );

        if let Some(policy) = cli.on_record_error {
            builder = builder.set_override("ingest.on_record_error", policy.as_str())?;
        }
        if let Some(ref dir) = cli.output_dir {
            builder = builder.set_override("output.directory", dir.to_string_lossy().to_string())?;
        }
        if let Some(write_csv) = cli.write_csv {
            builder = builder.set_override("output.write_csv", write_csv)?;
        }
        if let Some(ref filter) = cli.log_filter {
            builder = builder.set_override("log.filter", filter.as_str())?;
        }

        builder.build()?.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ingest: IngestSettings {
                on_record_error: ErrorPolicy::Stop,
                channel_capacity: 1024,
            },
            output: OutputSettings {
                directory: PathBuf::from("."),
                write_csv: true,
            },
            log: LogSettings {
                filter: "info".to_string(),
            },
        }
    }
}
