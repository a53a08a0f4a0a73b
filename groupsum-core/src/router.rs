//! Fan-out of records into per-dimension aggregation buckets.

use std::fmt;

use tracing::{debug, trace};

use crate::aggregator::DynAggregator;
use crate::path::KeyPath;
use crate::store::{BTreeStore, KeyedStore};

/// Computes the dimension path of a payload under one rule.
pub type ExtractKey<P> = Box<dyn Fn(&P) -> KeyPath + Send + Sync>;

/// Creates an empty aggregator for a bucket seen for the first time.
pub type MakeAggregator<P> = Box<dyn Fn() -> Box<dyn DynAggregator<P>> + Send + Sync>;

/// One way of slicing the data: a key extractor, an aggregator factory and
/// the namespace that isolates this rule's keys from the others.
pub struct DimensionRule<P> {
    extract_key: ExtractKey<P>,
    make_aggregator: MakeAggregator<P>,
    namespace: String,
}

impl<P> DimensionRule<P> {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Full store key of `payload` under this rule.
    pub fn full_key(&self, payload: &P) -> String {
        (self.extract_key)(payload).full_key(&self.namespace)
    }
}

impl<P> fmt::Debug for DimensionRule<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DimensionRule")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Routes every payload through each registered [`DimensionRule`] and merges
/// it into the bucket the rule selects.
///
/// Namespaces must be prefix-disjoint; this is not checked.
pub struct Router<P, S = BTreeStore<P>> {
    rules: Vec<DimensionRule<P>>,
    store: S,
}

impl<P> Router<P> {
    pub fn new() -> Self {
        Self::with_store(BTreeStore::new())
    }
}

impl<P> Default for Router<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, S> Router<P, S>
where
    S: KeyedStore<P>,
{
    pub fn with_store(store: S) -> Self {
        Self {
            rules: Vec::new(),
            store,
        }
    }

    /// Appends a rule. Rules run in registration order.
    pub fn register<K, F>(&mut self, extract_key: K, make_aggregator: F, namespace: impl Into<String>)
    where
        K: Fn(&P) -> KeyPath + Send + Sync + 'static,
        F: Fn() -> Box<dyn DynAggregator<P>> + Send + Sync + 'static,
    {
        let namespace = namespace.into();
        debug!(namespace = %namespace, rule = self.rules.len(), "registered dimension rule");
        self.rules.push(DimensionRule {
            extract_key: Box::new(extract_key),
            make_aggregator: Box::new(make_aggregator),
            namespace,
        });
    }

    /// Merges `payload` into its bucket under every rule.
    ///
    /// The lookup and the insert of a new bucket happen under the same
    /// exclusive borrow of the store, so a key never gets two aggregators.
    /// A panic in an extractor or aggregator propagates to the caller and
    /// leaves the remaining rules unapplied for this payload.
    pub fn process(&mut self, payload: &P) {
        for rule in &self.rules {
            let key = rule.full_key(payload);
            match self.store.get_mut(&key) {
                Some(agg) => agg.absorb(payload),
                None => {
                    let mut agg = (rule.make_aggregator)();
                    agg.absorb(payload);
                    trace!(key = %key, kind = agg.kind(), "created aggregator");
                    self.store.insert(key, agg);
                }
            }
        }
    }

    pub fn rules(&self) -> &[DimensionRule<P>] {
        &self.rules
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.namespace())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<P, S: fmt::Debug> fmt::Debug for Router<P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("rules", &self.rules)
            .field("store", &self.store)
            .finish()
    }
}
