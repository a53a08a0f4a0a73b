//! Registry of named views and procedures over a filled store.
//!
//! Views are collected on first access and cached for the lifetime of the
//! orchestrator. The orchestrator borrows the store, so the store cannot be
//! written to while summaries are being read from it; a new ingestion run
//! needs a new orchestrator.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use polars::prelude::DataFrame;
use tracing::{debug, info};

use crate::error::SummaryError;
use crate::procedure::Procedure;
use crate::store::{BTreeStore, KeyedStore};
use crate::view::ViewDefinition;

pub struct SummaryOrchestrator<'s, P, S: ?Sized = BTreeStore<P>> {
    store: &'s S,
    views: HashMap<String, ViewDefinition<P>>,
    procedures: HashMap<String, Procedure>,
    collected: HashMap<String, DataFrame>,
}

impl<'s, P, S> SummaryOrchestrator<'s, P, S>
where
    S: KeyedStore<P> + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            views: HashMap::new(),
            procedures: HashMap::new(),
            collected: HashMap::new(),
        }
    }

    /// Registers a view, replacing any view of the same name.
    pub fn register_view(&mut self, name: impl Into<String>, view: ViewDefinition<P>) {
        let name = name.into();
        debug!(view = %name, namespace = view.namespace(), "registered view");
        self.views.insert(name, view);
    }

    /// Registers a procedure, replacing any procedure of the same name.
    pub fn register_procedure(&mut self, name: impl Into<String>, procedure: Procedure) {
        let name = name.into();
        debug!(procedure = %name, "registered procedure");
        self.procedures.insert(name, procedure);
    }

    /// Returns the table of a registered view, collecting it on first use.
    ///
    /// Failed lookups and failed collections leave the cache untouched.
    pub fn get_view(&mut self, name: &str) -> Result<&DataFrame, SummaryError> {
        match self.collected.entry(name.to_string()) {
            Entry::Occupied(cached) => Ok(&*cached.into_mut()),
            Entry::Vacant(slot) => {
                let view = self
                    .views
                    .get(name)
                    .ok_or_else(|| SummaryError::ViewNotRegistered(name.to_string()))?;
                let table = view
                    .collect(self.store)
                    .map_err(|source| SummaryError::View {
                        name: name.to_string(),
                        source,
                    })?;
                info!(view = name, rows = table.height(), "collected view");
                Ok(&*slot.insert(table))
            }
        }
    }

    /// Applies a registered procedure to a view's table. The result is not
    /// cached, and the cached view is left as it was.
    pub fn process(&mut self, view: &str, procedure: &str) -> Result<DataFrame, SummaryError> {
        let transform = self
            .procedures
            .get(procedure)
            .cloned()
            .ok_or_else(|| SummaryError::ProcedureNotRegistered(procedure.to_string()))?;

        let table = self.get_view(view)?;
        let result = transform(table).map_err(|source| SummaryError::Procedure {
            name: procedure.to_string(),
            source,
        })?;
        debug!(view, procedure, rows = result.height(), "applied procedure");
        Ok(result)
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.collected.contains_key(name)
    }

    pub fn view_names(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    pub fn procedure_names(&self) -> impl Iterator<Item = &str> {
        self.procedures.keys().map(String::as_str)
    }
}

impl<P, S: ?Sized> fmt::Debug for SummaryOrchestrator<'_, P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryOrchestrator")
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .field("procedures", &self.procedures.keys().collect::<Vec<_>>())
            .field("collected", &self.collected.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{boxed, Aggregator};
    use crate::path::KeyPath;
    use crate::procedure::{filter_all_greater, group_by_sum, procedure};
    use crate::router::Router;
    use polars::prelude::PolarsError;

    #[derive(Debug, Clone)]
    struct Sale {
        shop: &'static str,
        item: &'static str,
        amount: u64,
    }

    #[derive(Debug, Default)]
    struct Revenue {
        amount: u64,
        sales: u64,
    }

    impl Aggregator<Sale> for Revenue {
        fn add_record(&mut self, record: &Sale) {
            self.amount += record.amount;
            self.sales += 1;
        }

        fn merge_self(&mut self, other: &Self) {
            self.amount += other.amount;
            self.sales += other.sales;
        }
    }

    fn filled_router() -> Router<Sale> {
        let mut router = Router::new();
        router.register(
            |s: &Sale| KeyPath::from_segments([s.shop, s.item]),
            || boxed(Revenue::default()),
            "sales/",
        );
        for (shop, item, amount) in [
            ("north", "tea", 3),
            ("north", "tea", 4),
            ("south", "tea", 1),
            ("south", "cake", 9),
        ] {
            router.process(&Sale { shop, item, amount });
        }
        router
    }

    fn revenue_view() -> ViewDefinition<Sale> {
        ViewDefinition::new(
            ["Shop", "Item"],
            ["Amount", "Sales"],
            "sales/",
            |r: &Revenue| {
                HashMap::from([
                    ("Amount".to_string(), r.amount as f64),
                    ("Sales".to_string(), r.sales as f64),
                ])
            },
        )
    }

    #[test]
    fn test_get_view_collects_and_caches() {
        let router = filled_router();
        let mut summary = SummaryOrchestrator::<Sale>::new(router.store());
        summary.register_view("revenue", revenue_view());

        assert!(!summary.is_cached("revenue"));
        let first = summary.get_view("revenue").unwrap().clone();
        assert!(summary.is_cached("revenue"));
        let second = summary.get_view("revenue").unwrap();

        assert_eq!(first.height(), 3);
        assert!(first.equals_missing(second));
    }

    #[test]
    fn test_unregistered_view_is_an_error_and_not_cached() {
        let router = filled_router();
        let mut summary = SummaryOrchestrator::<Sale>::new(router.store());

        let err = summary.get_view("missing").unwrap_err();
        assert!(matches!(err, SummaryError::ViewNotRegistered(ref name) if name == "missing"));
        assert_eq!(err.to_string(), "view[missing] not registered");
        assert!(!summary.is_cached("missing"));
    }

    #[test]
    fn test_unregistered_procedure_is_checked_first() {
        let router = filled_router();
        let mut summary = SummaryOrchestrator::<Sale>::new(router.store());
        summary.register_view("revenue", revenue_view());

        let err = summary.process("revenue", "nope").unwrap_err();
        assert!(matches!(err, SummaryError::ProcedureNotRegistered(_)));
        assert!(!summary.is_cached("revenue"));
    }

    #[test]
    fn test_process_applies_procedure_without_touching_cache() {
        let router = filled_router();
        let mut summary = SummaryOrchestrator::<Sale>::new(router.store());
        summary.register_view("revenue", revenue_view());
        summary.register_procedure("big", filter_all_greater(["Amount"], 5.0));
        summary.register_procedure("by_shop", group_by_sum(["Shop"], ["Amount", "Sales"]));

        let big = summary.process("revenue", "big").unwrap();
        assert_eq!(big.height(), 2);

        let by_shop = summary.process("revenue", "by_shop").unwrap();
        assert_eq!(by_shop.height(), 2);

        assert_eq!(summary.get_view("revenue").unwrap().height(), 3);
    }

    #[test]
    fn test_failing_procedure_surfaces_error() {
        let router = filled_router();
        let mut summary = SummaryOrchestrator::<Sale>::new(router.store());
        summary.register_view("revenue", revenue_view());
        summary.register_procedure("bad_column", filter_all_greater(["Weight"], 1.0));
        summary.register_procedure(
            "always_fails",
            procedure(|_| -> Result<DataFrame, PolarsError> {
                Err(PolarsError::ComputeError("boom".into()))
            }),
        );

        assert!(matches!(
            summary.process("revenue", "bad_column"),
            Err(SummaryError::Procedure { ref name, .. }) if name == "bad_column"
        ));
        assert!(summary.process("revenue", "always_fails").is_err());
        assert_eq!(summary.get_view("revenue").unwrap().height(), 3);
    }

    #[test]
    fn test_registration_overwrites_by_name() {
        let router = filled_router();
        let mut summary = SummaryOrchestrator::<Sale>::new(router.store());
        summary.register_view("revenue", revenue_view());
        summary.register_view(
            "revenue",
            ViewDefinition::new(["Shop"], ["Amount"], "sales/", |r: &Revenue| {
                HashMap::from([("Amount".to_string(), r.amount as f64)])
            }),
        );

        let table = summary.get_view("revenue").unwrap();
        assert_eq!(table.width(), 2);
        assert_eq!(table.height(), 0);
        assert_eq!(summary.view_names().count(), 1);
    }
}
