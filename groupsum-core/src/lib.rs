/*!
# groupsum-core: multi-dimensional aggregation routing with dataframe views

groupsum-core folds a stream of records into many independent aggregations at
once. Each aggregation slices the records along its own hierarchical key path
(for example `isp/location/city`). The accumulated buckets can then be read
back as polars `DataFrame`s for filtering or grouping.

## Building blocks

### Aggregation
- [`Aggregator`]: per-bucket accumulator that absorbs records and merges with
  partial results of its own kind
- [`DimensionRule`]: key extractor + aggregator factory + namespace
- [`Router`]: fans every record out to all rules and creates or updates the
  bucket each rule selects, exactly once per record and rule

### Storage
- [`KeyedStore`]: ordered full-key → aggregator map with prefix traversal
- [`BTreeStore`]: the in-memory implementation, with store-to-store merging
  for sharded ingestion

### Read side
- [`ViewDefinition`]: how one namespace decomposes into key and value columns
- [`SummaryOrchestrator`]: named views, cached on first collection, plus
  named table procedures such as [`filter_all_greater`] and [`group_by_sum`]

## Usage

```rust,no_run
use std::collections::HashMap;
use groupsum_core::{boxed, Aggregator, KeyPath, Router, SummaryOrchestrator, ViewDefinition};

struct Hit { region: String, bytes: u64 }

#[derive(Default)]
struct Bytes { total: u64 }

impl Aggregator<Hit> for Bytes {
    fn add_record(&mut self, record: &Hit) { self.total += record.bytes; }
    fn merge_self(&mut self, other: &Self) { self.total += other.total; }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut router = Router::new();
    router.register(
        |h: &Hit| KeyPath::from_segments([h.region.as_str()]),
        || boxed(Bytes::default()),
        "by_region/",
    );
    router.process(&Hit { region: "eu".into(), bytes: 10 });

    let mut summary = SummaryOrchestrator::<Hit>::new(router.store());
    summary.register_view(
        "regions",
        ViewDefinition::new(["Region"], ["Bytes"], "by_region/", |b: &Bytes| {
            HashMap::from([("Bytes".to_string(), b.total as f64)])
        }),
    );
    println!("{}", summary.get_view("regions")?);
    Ok(())
}
```
*/

pub mod aggregator;
pub mod error;
pub mod path;
pub mod procedure;
pub mod record;
pub mod router;
pub mod store;
pub mod summary;
pub mod view;

pub use aggregator::{boxed, Aggregator, DynAggregator};
pub use error::{AggregateError, RecordError, SummaryError, ViewError};
pub use path::{KeyPath, SEGMENT_DELIMITER};
pub use procedure::{filter_all_greater, group_by_sum, procedure, Procedure};
pub use record::Record;
pub use router::{DimensionRule, Router};
pub use store::{BTreeStore, KeyedStore};
pub use summary::SummaryOrchestrator;
pub use view::{Collection, ColumnValues, RowDiagnostic, ViewDefinition};
