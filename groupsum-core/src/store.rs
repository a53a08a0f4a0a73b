//! Ordered, prefix-walkable store of aggregator instances.
//!
//! Keys are full keys (`namespace + path`). The store keeps them in
//! ascending byte order, which is the row order views produce.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Bound, ControlFlow};

use tracing::debug;

use crate::aggregator::DynAggregator;
use crate::error::AggregateError;

/// Exact lookup, insertion and prefix-ordered traversal over full keys.
pub trait KeyedStore<P> {
    fn get(&self, key: &str) -> Option<&dyn DynAggregator<P>>;

    fn get_mut(&mut self, key: &str) -> Option<&mut dyn DynAggregator<P>>;

    /// Inserts an aggregator, returning the one previously under `key`.
    fn insert(
        &mut self,
        key: String,
        aggregator: Box<dyn DynAggregator<P>>,
    ) -> Option<Box<dyn DynAggregator<P>>>;

    /// Visits every entry whose key starts with `prefix`, in ascending key
    /// order, until the visitor breaks.
    fn walk_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str, &dyn DynAggregator<P>) -> ControlFlow<()>,
    );

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`KeyedStore`] backed by a `BTreeMap`.
pub struct BTreeStore<P> {
    entries: BTreeMap<String, Box<dyn DynAggregator<P>>>,
}

impl<P> Default for BTreeStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for BTreeStore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v.kind())))
            .finish()
    }
}

impl<P> BTreeStore<P> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// All full keys, ascending.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Folds another store into this one.
    ///
    /// Keys present on both sides are merged with [`DynAggregator::merge_dyn`];
    /// keys only in `other` are adopted as is. Used to unify stores filled by
    /// separate ingestion shards.
    pub fn merge_store(&mut self, other: BTreeStore<P>) -> Result<(), AggregateError> {
        for (key, incoming) in other.entries {
            match self.entries.get_mut(&key) {
                Some(existing) => existing.merge_dyn(incoming.as_ref())?,
                None => {
                    debug!(key = %key, "adopting aggregator from merged store");
                    self.entries.insert(key, incoming);
                }
            }
        }
        Ok(())
    }
}

impl<P> KeyedStore<P> for BTreeStore<P> {
    fn get(&self, key: &str) -> Option<&dyn DynAggregator<P>> {
        self.entries
            .get(key)
            .map(|agg| -> &dyn DynAggregator<P> { agg.as_ref() })
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut dyn DynAggregator<P>> {
        self.entries
            .get_mut(key)
            .map(|agg| -> &mut dyn DynAggregator<P> { agg.as_mut() })
    }

    fn insert(
        &mut self,
        key: String,
        aggregator: Box<dyn DynAggregator<P>>,
    ) -> Option<Box<dyn DynAggregator<P>>> {
        self.entries.insert(key, aggregator)
    }

    fn walk_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str, &dyn DynAggregator<P>) -> ControlFlow<()>,
    ) {
        let range = self
            .entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded));
        for (key, agg) in range {
            if !key.starts_with(prefix) {
                break;
            }
            if visitor(key.as_str(), agg.as_ref()).is_break() {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
