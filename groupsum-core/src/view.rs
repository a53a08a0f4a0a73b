//! Reconstruction of one store namespace into a table.
//!
//! A [`ViewDefinition`] names the path segments of its namespace (the key
//! columns) and the numbers each aggregator contributes (the value columns).
//! Collecting walks the namespace in key order and emits one row per bucket.
//! Rows that don't fit the definition are skipped or padded and reported as
//! [`RowDiagnostic`]s; collection itself never aborts on a bad row.

use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use polars::prelude::*;
use tracing::warn;

use crate::aggregator::{Aggregator, DynAggregator};
use crate::error::ViewError;
use crate::path::split_segments;
use crate::store::KeyedStore;

/// Named numeric values extracted from one aggregator.
pub type ColumnValues = HashMap<String, f64>;

type ToColumns<P> = Arc<dyn Fn(&dyn DynAggregator<P>) -> Option<ColumnValues> + Send + Sync>;

/// Declarative mapping from a namespace of the store to a table.
pub struct ViewDefinition<P> {
    key_columns: Vec<String>,
    value_columns: Vec<String>,
    namespace: String,
    to_columns: ToColumns<P>,
}

impl<P> Clone for ViewDefinition<P> {
    fn clone(&self) -> Self {
        Self {
            key_columns: self.key_columns.clone(),
            value_columns: self.value_columns.clone(),
            namespace: self.namespace.clone(),
            to_columns: self.to_columns.clone(),
        }
    }
}

impl<P> fmt::Debug for ViewDefinition<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewDefinition")
            .field("key_columns", &self.key_columns)
            .field("value_columns", &self.value_columns)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Why a row was skipped or padded during collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowDiagnostic {
    /// The key did not decompose into one segment per key column; row skipped
    SegmentCount {
        key: String,
        expected: usize,
        found: usize,
    },
    /// The bucket holds an aggregator this view cannot convert; row skipped
    KindMismatch { key: String, found: &'static str },
    /// The conversion did not produce a declared value column; cell is null
    MissingColumn { key: String, column: String },
}

impl fmt::Display for RowDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowDiagnostic::SegmentCount {
                key,
                expected,
                found,
            } => write!(
                f,
                "key {key} has {found} segments, view expects {expected}"
            ),
            RowDiagnostic::KindMismatch { key, found } => {
                write!(f, "key {key} holds unsupported aggregator {found}")
            }
            RowDiagnostic::MissingColumn { key, column } => {
                write!(f, "key {key} is missing column {column}")
            }
        }
    }
}

/// A collected table together with the rows that needed attention.
#[derive(Debug, Clone)]
pub struct Collection {
    pub table: DataFrame,
    pub diagnostics: Vec<RowDiagnostic>,
}

impl<P> ViewDefinition<P> {
    /// Defines a view over `namespace` whose buckets hold aggregators of
    /// kind `A`, converted to value columns by `convert`.
    pub fn new<A, F>(
        key_columns: impl IntoIterator<Item = impl Into<String>>,
        value_columns: impl IntoIterator<Item = impl Into<String>>,
        namespace: impl Into<String>,
        convert: F,
    ) -> Self
    where
        A: Aggregator<P>,
        F: Fn(&A) -> ColumnValues + Send + Sync + 'static,
    {
        let to_columns: ToColumns<P> =
            Arc::new(move |agg: &dyn DynAggregator<P>| agg.downcast_ref::<A>().map(&convert));
        Self {
            key_columns: key_columns.into_iter().map(Into::into).collect(),
            value_columns: value_columns.into_iter().map(Into::into).collect(),
            namespace: namespace.into(),
            to_columns,
        }
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn value_columns(&self) -> &[String] {
        &self.value_columns
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Collects the namespace into a table, logging skipped rows.
    pub fn collect<S>(&self, store: &S) -> Result<DataFrame, ViewError>
    where
        S: KeyedStore<P> + ?Sized,
    {
        self.collect_detailed(store).map(|collection| collection.table)
    }

    /// Collects the namespace into a table and returns the row diagnostics
    /// alongside it.
    pub fn collect_detailed<S>(&self, store: &S) -> Result<Collection, ViewError>
    where
        S: KeyedStore<P> + ?Sized,
    {
        let mut keys: Vec<Vec<String>> = vec![Vec::new(); self.key_columns.len()];
        let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); self.value_columns.len()];
        let mut diagnostics = Vec::new();

        store.walk_prefix(&self.namespace, &mut |key, agg| {
            let segments = split_segments(&key[self.namespace.len()..]);
            if segments.len() != self.key_columns.len() {
                let diagnostic = RowDiagnostic::SegmentCount {
                    key: key.to_string(),
                    expected: self.key_columns.len(),
                    found: segments.len(),
                };
                warn!(namespace = %self.namespace, "{diagnostic}");
                diagnostics.push(diagnostic);
                return ControlFlow::Continue(());
            }

            let Some(converted) = (self.to_columns)(agg) else {
                let diagnostic = RowDiagnostic::KindMismatch {
                    key: key.to_string(),
                    found: agg.kind(),
                };
                warn!(namespace = %self.namespace, "{diagnostic}");
                diagnostics.push(diagnostic);
                return ControlFlow::Continue(());
            };

            for (column, segment) in keys.iter_mut().zip(segments) {
                column.push(segment);
            }
            for (name, column) in self.value_columns.iter().zip(values.iter_mut()) {
                match converted.get(name) {
                    Some(value) => column.push(Some(*value)),
                    None => {
                        let diagnostic = RowDiagnostic::MissingColumn {
                            key: key.to_string(),
                            column: name.clone(),
                        };
                        warn!(namespace = %self.namespace, "{diagnostic}");
                        diagnostics.push(diagnostic);
                        column.push(None);
                    }
                }
            }
            ControlFlow::Continue(())
        });

        let columns: Vec<Column> = self
            .key_columns
            .iter()
            .zip(keys)
            .map(|(name, data)| Column::new(name.as_str().into(), data))
            .chain(
                self.value_columns
                    .iter()
                    .zip(values)
                    .map(|(name, data)| Column::new(name.as_str().into(), data)),
            )
            .collect();

        let table = DataFrame::new(columns).map_err(|source| ViewError::Table {
            namespace: self.namespace.clone(),
            source,
        })?;

        Ok(Collection { table, diagnostics })
    }
}
