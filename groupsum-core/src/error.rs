//! Error types for the aggregation engine.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Contract violations between aggregator instances.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// Two aggregators of different concrete kinds were merged
    #[error("cannot merge aggregator of kind {found} into kind {expected}")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors raised while turning a store namespace into a table.
#[derive(Error, Debug)]
pub enum ViewError {
    /// The collected columns could not be assembled into a dataframe
    #[error("failed to build table for namespace {namespace}: {source}")]
    Table {
        namespace: String,
        #[source]
        source: PolarsError,
    },
}

/// Errors surfaced by the summary orchestrator.
#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("view[{0}] not registered")]
    ViewNotRegistered(String),

    #[error("procedure[{0}] not registered")]
    ProcedureNotRegistered(String),

    #[error("view[{name}] collection failed: {source}")]
    View {
        name: String,
        #[source]
        source: ViewError,
    },

    /// A table procedure rejected its input, e.g. an unknown column
    #[error("procedure[{name}] failed: {source}")]
    Procedure {
        name: String,
        #[source]
        source: PolarsError,
    },
}

/// Terminal error attached to a record by its producer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("record error: {message}")]
pub struct RecordError {
    pub message: String,
}

impl RecordError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
