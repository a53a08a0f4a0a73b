use groupsum_core::{RecordError, SummaryError};
use polars::prelude::PolarsError;
use thiserror::Error;

use crate::pipeline::IngestReport;

/// Errors that end an ingestion run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A producer flagged a record as failed under the `stop` policy
    #[error("ingestion stopped after {} records: {source}", .report.processed)]
    Upstream {
        #[source]
        source: RecordError,
        report: IngestReport,
    },
}

/// Errors writing a table to its destination.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table serialization error: {0}")]
    Table(#[from] PolarsError),
}

/// Top-level error of an ingest-summarize-export run.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    #[error("failed to write table {name}: {source}")]
    Sink {
        name: String,
        #[source]
        source: SinkError,
    },
}
