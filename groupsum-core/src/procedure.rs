//! Table-to-table transforms applied on top of collected views.

use std::sync::Arc;

use polars::prelude::*;

/// A named post-processing step over a collected table.
pub type Procedure = Arc<dyn Fn(&DataFrame) -> PolarsResult<DataFrame> + Send + Sync>;

/// Wraps a closure as a [`Procedure`].
pub fn procedure<F>(transform: F) -> Procedure
where
    F: Fn(&DataFrame) -> PolarsResult<DataFrame> + Send + Sync + 'static,
{
    Arc::new(transform)
}

/// Keeps the rows where every one of `columns` is strictly greater than
/// `threshold`.
pub fn filter_all_greater<I, S>(columns: I, threshold: f64) -> Procedure
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
    procedure(move |table| {
        let predicate = columns
            .iter()
            .map(|name| col(name.as_str()).gt(lit(threshold)))
            .reduce(|acc, expr| acc.and(expr));
        match predicate {
            Some(predicate) => table.clone().lazy().filter(predicate).collect(),
            None => Ok(table.clone()),
        }
    })
}

/// Groups by `keys` and sums each of `values` within a group. Groups keep the
/// order in which they first appear.
pub fn group_by_sum<K, V, S, T>(keys: K, values: V) -> Procedure
where
    K: IntoIterator<Item = S>,
    V: IntoIterator<Item = T>,
    S: Into<String>,
    T: Into<String>,
{
    let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
    let values: Vec<String> = values.into_iter().map(Into::into).collect();
    procedure(move |table| {
        let by: Vec<Expr> = keys.iter().map(|name| col(name.as_str())).collect();
        let sums: Vec<Expr> = values.iter().map(|name| col(name.as_str()).sum()).collect();
        table.clone().lazy().group_by_stable(by).agg(sums).collect()
    })
}
