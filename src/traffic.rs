//! Traffic samples summed per ISP/location/city and per bar level.
//!
//! This is the stock configuration of the `groupsum` binary: two dimension
//! rules over one aggregator kind, a view per namespace and two procedures
//! on top of the per-city view.

use groupsum_core::{
    boxed, filter_all_greater, group_by_sum, Aggregator, ColumnValues, KeyPath, KeyedStore,
    Record, Router, SummaryOrchestrator, ViewDefinition,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;
use crate::pipeline::{ErrorPolicy, Ingest, IngestReport, Ingestor, RecordSource};
use crate::sink::TableSink;

pub const ISP_LOC_CITY_NAMESPACE: &str = "agg_example/isp_loc_city/";
/// Spelled in snake case like the per-city namespace; earlier releases of the
/// example wrote this one as `agg_example/Barlevel/`.
pub const BAR_LEVEL_NAMESPACE: &str = "agg_example/bar_level/";

pub const ISP_LOC_CITY_VIEW: &str = "isp_loc_city";
pub const BAR_LEVEL_VIEW: &str = "bar_level";

pub const NUM_GT2: &str = "num>2";
pub const GROUP_BY_ISP: &str = "group_by_isp";

/// Names of the exported tables, in export order.
pub const EXAMPLE_TABLE: &str = "example";
pub const EXAMPLE_LEVEL_TABLE: &str = "examplelevel";
pub const EXAMPLE_GT2_TABLE: &str = "exampleGt2";
pub const EXAMPLE_ISP_TABLE: &str = "exampleISP";

/// One measurement as read from the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSample {
    pub isp: String,
    pub loc: String,
    pub city: String,
    #[serde(alias = "Bar")]
    pub bar: i64,
    #[serde(alias = "Foo")]
    pub foo: i64,
}

impl TrafficSample {
    pub fn new(isp: &str, loc: &str, city: &str, bar: i64, foo: i64) -> Self {
        Self {
            isp: isp.to_string(),
            loc: loc.to_string(),
            city: city.to_string(),
            bar,
            foo,
        }
    }
}

/// Running sums of a bucket of samples.
///
/// Sums wrap on overflow instead of panicking; input values are untrusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficTotals {
    pub bar: i64,
    pub foo: i64,
    pub count: u64,
}

impl Aggregator<TrafficSample> for TrafficTotals {
    fn add_record(&mut self, record: &TrafficSample) {
        self.bar = self.bar.wrapping_add(record.bar);
        self.foo = self.foo.wrapping_add(record.foo);
        self.count = self.count.wrapping_add(1);
    }

    fn merge_self(&mut self, other: &Self) {
        self.bar = self.bar.wrapping_add(other.bar);
        self.foo = self.foo.wrapping_add(other.foo);
        self.count = self.count.wrapping_add(other.count);
    }
}

impl TrafficTotals {
    fn columns(&self) -> ColumnValues {
        ColumnValues::from([
            ("Bar".to_string(), self.bar as f64),
            ("Foo".to_string(), self.foo as f64),
            ("Count".to_string(), self.count as f64),
        ])
    }
}

pub fn isp_loc_city_path(sample: &TrafficSample) -> KeyPath {
    KeyPath::from_segments([&sample.isp, &sample.loc, &sample.city])
}

pub fn bar_level_path(sample: &TrafficSample) -> KeyPath {
    if sample.bar > 2 {
        KeyPath::raw("bar>2")
    } else {
        KeyPath::raw("bar<=2")
    }
}

pub fn isp_loc_city_view() -> ViewDefinition<TrafficSample> {
    ViewDefinition::new::<TrafficTotals, _>(
        ["ISP", "Loc", "City"],
        ["Bar", "Foo", "Count"],
        ISP_LOC_CITY_NAMESPACE,
        TrafficTotals::columns,
    )
}

pub fn bar_level_view() -> ViewDefinition<TrafficSample> {
    ViewDefinition::new::<TrafficTotals, _>(
        ["Level"],
        ["Bar", "Foo", "Count"],
        BAR_LEVEL_NAMESPACE,
        TrafficTotals::columns,
    )
}

/// Registers the per-city and per-level rules on `router`.
pub fn register_rules<S>(router: &mut Router<TrafficSample, S>)
where
    S: KeyedStore<TrafficSample>,
{
    router.register(
        isp_loc_city_path,
        || boxed(TrafficTotals::default()),
        ISP_LOC_CITY_NAMESPACE,
    );
    router.register(
        bar_level_path,
        || boxed(TrafficTotals::default()),
        BAR_LEVEL_NAMESPACE,
    );
}

/// Builds the orchestrator with both views and both procedures registered.
pub fn summary<S>(store: &S) -> SummaryOrchestrator<'_, TrafficSample, S>
where
    S: KeyedStore<TrafficSample> + ?Sized,
{
    let mut summary = SummaryOrchestrator::<TrafficSample, S>::new(store);
    summary.register_view(ISP_LOC_CITY_VIEW, isp_loc_city_view());
    summary.register_view(BAR_LEVEL_VIEW, bar_level_view());
    summary.register_procedure(NUM_GT2, filter_all_greater(["Bar", "Foo"], 2.0));
    summary.register_procedure(GROUP_BY_ISP, group_by_sum(["ISP"], ["Bar", "Foo", "Count"]));
    summary
}

/// The five demo samples.
pub fn sample_records() -> Vec<Record<TrafficSample>> {
    vec![
        TrafficSample::new("ct", "bj", "bj", 1, 1).into(),
        TrafficSample::new("ct", "bj", "bj", 2, 2).into(),
        TrafficSample::new("cnc", "sd", "wf", 3, 3).into(),
        TrafficSample::new("cnc", "sd", "qd", 4, 4).into(),
        TrafficSample::new("cnc", "sd", "wf", 5, 5).into(),
    ]
}

/// Writes the four exported tables through `sink`.
pub fn export_tables<S>(
    summary: &mut SummaryOrchestrator<'_, TrafficSample, S>,
    sink: &dyn TableSink,
) -> Result<(), AppError>
where
    S: KeyedStore<TrafficSample> + ?Sized,
{
    let tables = [
        (EXAMPLE_TABLE, summary.get_view(ISP_LOC_CITY_VIEW)?.clone()),
        (EXAMPLE_LEVEL_TABLE, summary.get_view(BAR_LEVEL_VIEW)?.clone()),
        (EXAMPLE_GT2_TABLE, summary.process(ISP_LOC_CITY_VIEW, NUM_GT2)?),
        (EXAMPLE_ISP_TABLE, summary.process(ISP_LOC_CITY_VIEW, GROUP_BY_ISP)?),
    ];

    for (name, mut table) in tables {
        info!(table = name, "{}", table);
        sink.write_table(name, &mut table)
            .map_err(|source| AppError::Sink {
                name: name.to_string(),
                source,
            })?;
    }
    Ok(())
}

/// Ingests `source` under `policy`, then exports through `sink` if given.
///
/// When ingestion stops on a failed record, the records taken in before it
/// are still exported and the ingestion error is returned afterwards.
pub async fn run(
    source: &dyn RecordSource<TrafficSample>,
    policy: ErrorPolicy,
    sink: Option<&dyn TableSink>,
) -> Result<IngestReport, AppError> {
    let mut router = Router::new();
    register_rules(&mut router);
    let ingestor = Ingestor::new(router, policy);
    let outcome = ingestor.ingest(source).await;

    if let Some(sink) = sink {
        if let Err(ref err) = outcome {
            warn!(error = %err, "exporting partial results");
        }
        let router = ingestor.router();
        let router = router.lock().await;
        let mut summary = summary(router.store());
        export_tables(&mut summary, sink)?;
    }
    Ok(outcome?)
}
