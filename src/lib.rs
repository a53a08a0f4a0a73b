//! groupsum: streaming multi-dimensional aggregation with tabular summaries
//!
//! This crate wires the `groupsum_core` aggregation engine into an async
//! ingestion pipeline: records arrive from a [`RecordSource`], are routed into
//! per-dimension aggregators by an [`Ingestor`], and are finally collected into
//! tables and written through a [`TableSink`].
//!
//! # Example
//!
//! ```rust,no_run
//! use groupsum::{run, sample_records, CsvSink, ErrorPolicy, IterSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Built-in demo records
//!     let source = IterSource::new(sample_records());
//!
//!     // Tables land in ./out as CSV
//!     let sink = CsvSink::new("out")?;
//!
//!     let report = run(&source, ErrorPolicy::Stop, Some(&sink)).await?;
//!     println!("Processed {} records", report.processed);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod traffic;
#[cfg(test)]
mod tests;

pub use config::{CliArgs, Settings};
pub use error::{AppError, PipelineError, SinkError};
pub use pipeline::{ErrorPolicy, Ingest, IngestReport, Ingestor, RecordSource};
pub use sink::{CsvSink, TableSink};
pub use source::{spawn_producer, ChannelSource, IterSource, JsonLinesSource};
pub use traffic::{
    export_tables, register_rules, run, sample_records, summary, TrafficSample, TrafficTotals,
};
