use std::io::Write;

use futures::stream::{self, BoxStream, StreamExt};
use groupsum_core::{KeyedStore, Record, Router};
use mockall::*;
use polars::prelude::DataFrame;

use crate::error::{AppError, PipelineError, SinkError};
use crate::pipeline::{ErrorPolicy, Ingest, Ingestor, RecordSource};
use crate::sink::TableSink;
use crate::source::{spawn_producer, ChannelSource, IterSource, JsonLinesSource};
use crate::traffic::{
    register_rules, run, sample_records, summary, TrafficSample, TrafficTotals,
    ISP_LOC_CITY_NAMESPACE, ISP_LOC_CITY_VIEW,
};

mock! {
    pub Source {}
    impl RecordSource<TrafficSample> for Source {
        fn stream(&self) -> BoxStream<'static, Record<TrafficSample>>;
    }
}

mock! {
    pub Sink {}
    impl TableSink for Sink {
        fn write_table(&self, name: &str, table: &mut DataFrame) -> Result<(), SinkError>;
    }
}

fn traffic_ingestor(policy: ErrorPolicy) -> Ingestor<TrafficSample> {
    let mut router = Router::new();
    register_rules(&mut router);
    Ingestor::new(router, policy)
}

fn mock_source(records: Vec<Record<TrafficSample>>) -> MockSource {
    let mut source = MockSource::new();
    source
        .expect_stream()
        .times(1)
        .return_once(move || stream::iter(records).boxed());
    source
}

async fn totals(ingestor: &Ingestor<TrafficSample>, path: &str) -> Option<TrafficTotals> {
    let router = ingestor.router();
    let router = router.lock().await;
    let key = format!("{ISP_LOC_CITY_NAMESPACE}{path}");
    router
        .store()
        .get(&key)
        .and_then(|agg| agg.downcast_ref::<TrafficTotals>().copied())
}

#[tokio::test]
async fn test_ingest_sample_records() {
    let ingestor = traffic_ingestor(ErrorPolicy::Stop);
    let source = mock_source(sample_records());

    let report = ingestor.ingest(&source).await.unwrap();
    assert_eq!(report.processed, 5);
    assert_eq!(report.skipped, 0);

    let wf = totals(&ingestor, "cnc/sd/wf").await.unwrap();
    assert_eq!(wf, TrafficTotals { bar: 8, foo: 8, count: 2 });

    // two namespaces, three cities plus two levels
    assert_eq!(ingestor.router().lock().await.store().len(), 5);
}

#[tokio::test]
async fn test_stop_policy_keeps_earlier_records() {
    let ingestor = traffic_ingestor(ErrorPolicy::Stop);
    let source = mock_source(vec![
        TrafficSample::new("ct", "bj", "bj", 1, 1).into(),
        Record::failed("connection reset"),
        TrafficSample::new("ct", "bj", "bj", 2, 2).into(),
    ]);

    let err = ingestor.ingest(&source).await.unwrap_err();
    let PipelineError::Upstream { source, report } = err;
    assert_eq!(source.message, "connection reset");
    assert_eq!(report.processed, 1);

    let bj = totals(&ingestor, "ct/bj/bj").await.unwrap();
    assert_eq!(bj.count, 1);
}

#[tokio::test]
async fn test_skip_policy_continues() {
    let ingestor = traffic_ingestor(ErrorPolicy::Skip);
    let source = mock_source(vec![
        TrafficSample::new("ct", "bj", "bj", 1, 1).into(),
        Record::failed("bad line"),
        TrafficSample::new("ct", "bj", "bj", 2, 2).into(),
    ]);

    let report = ingestor.ingest(&source).await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(totals(&ingestor, "ct/bj/bj").await.unwrap().bar, 3);
}

#[tokio::test]
async fn test_empty_stream() {
    let ingestor = traffic_ingestor(ErrorPolicy::Stop);
    let source = mock_source(Vec::new());

    let report = ingestor.ingest(&source).await.unwrap();
    assert_eq!(report.processed, 0);
    assert!(ingestor.router().lock().await.store().is_empty());
}

#[tokio::test]
async fn test_into_router_after_ingest() {
    let ingestor = traffic_ingestor(ErrorPolicy::Stop);
    ingestor
        .ingest(&IterSource::new(sample_records()))
        .await
        .unwrap();

    let router = match ingestor.into_router() {
        Ok(router) => router,
        Err(_) => panic!("router still shared"),
    };
    let store = router.into_store();
    let mut summary = summary(&store);
    assert_eq!(summary.get_view(ISP_LOC_CITY_VIEW).unwrap().height(), 3);
}

#[tokio::test]
async fn test_channel_source_with_many_producers() {
    let ingestor = traffic_ingestor(ErrorPolicy::Stop);
    let (source, sender) = ChannelSource::new(4);

    let mut producers = Vec::new();
    for record in sample_records() {
        let sender = sender.clone();
        producers.push(tokio::spawn(async move {
            sender.send(record).await.unwrap();
        }));
    }
    drop(sender);

    let report = ingestor.ingest(&source).await.unwrap();
    for producer in producers {
        producer.await.unwrap();
    }
    assert_eq!(report.processed, 5);

    // arrival order does not change the sums
    let wf = totals(&ingestor, "cnc/sd/wf").await.unwrap();
    assert_eq!(wf, TrafficTotals { bar: 8, foo: 8, count: 2 });

    // the receiver is consumed by the first run
    let again = ingestor.ingest(&source).await.unwrap();
    assert_eq!(again.processed, 0);
}

#[tokio::test]
async fn test_json_lines_source() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"isp":"ct","loc":"bj","city":"bj","Bar":1,"Foo":1}}"#).unwrap();
    writeln!(file).unwrap();
    writeln!(file, "not json").unwrap();
    writeln!(file, r#"{{"isp":"ct","loc":"bj","city":"bj","bar":2,"foo":2}}"#).unwrap();
    file.flush().unwrap();

    let source = JsonLinesSource::<TrafficSample>::new(file.path());
    let records: Vec<Record<TrafficSample>> = source.stream().collect().await;
    assert_eq!(records.len(), 3);
    assert!(records[1].error().unwrap().message.contains(":3:"));

    let ingestor = traffic_ingestor(ErrorPolicy::Skip);
    let report = ingestor.ingest(&source).await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(totals(&ingestor, "ct/bj/bj").await.unwrap().bar, 3);
}

#[tokio::test]
async fn test_file_producers_share_one_channel() {
    let mut east = tempfile::NamedTempFile::new().unwrap();
    writeln!(east, r#"{{"isp":"cnc","loc":"sd","city":"wf","Bar":3,"Foo":3}}"#).unwrap();
    writeln!(east, r#"{{"isp":"cnc","loc":"sd","city":"qd","Bar":4,"Foo":4}}"#).unwrap();
    let mut west = tempfile::NamedTempFile::new().unwrap();
    writeln!(west, r#"{{"isp":"cnc","loc":"sd","city":"wf","Bar":5,"Foo":5}}"#).unwrap();

    let (channel, sender) = ChannelSource::new(1);
    let producers = vec![
        spawn_producer(&JsonLinesSource::<TrafficSample>::new(east.path()), sender.clone()),
        spawn_producer(&JsonLinesSource::<TrafficSample>::new(west.path()), sender.clone()),
    ];
    drop(sender);

    let ingestor = traffic_ingestor(ErrorPolicy::Stop);
    let report = ingestor.ingest(&channel).await.unwrap();
    for producer in producers {
        producer.await.unwrap();
    }

    assert_eq!(report.processed, 3);
    let wf = totals(&ingestor, "cnc/sd/wf").await.unwrap();
    assert_eq!(wf, TrafficTotals { bar: 8, foo: 8, count: 2 });
}

#[tokio::test]
async fn test_json_lines_missing_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let source = JsonLinesSource::<TrafficSample>::new(dir.path().join("absent.jsonl"));

    let ingestor = traffic_ingestor(ErrorPolicy::Stop);
    let err = ingestor.ingest(&source).await.unwrap_err();
    assert!(err.to_string().contains("cannot open"));
}

#[tokio::test]
async fn test_run_exports_four_tables() {
    let mut sink = MockSink::new();
    let mut seq = Sequence::new();
    for (name, rows) in [
        ("example", 3),
        ("examplelevel", 2),
        ("exampleGt2", 3),
        ("exampleISP", 2),
    ] {
        sink.expect_write_table()
            .withf(move |table_name, table| table_name == name && table.height() == rows)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
    }

    let source = IterSource::new(sample_records());
    let report = run(&source, ErrorPolicy::Stop, Some(&sink)).await.unwrap();
    assert_eq!(report.processed, 5);
}

#[tokio::test]
async fn test_run_exports_partial_results_when_stopped() {
    let mut sink = MockSink::new();
    sink.expect_write_table()
        .withf(|name, table| name == "example" && table.height() == 1)
        .times(1)
        .returning(|_, _| Ok(()));
    sink.expect_write_table()
        .withf(|name, _| name != "example")
        .times(3)
        .returning(|_, _| Ok(()));

    let source = IterSource::new(vec![
        TrafficSample::new("ct", "bj", "bj", 1, 1).into(),
        Record::failed("truncated"),
        TrafficSample::new("cnc", "sd", "wf", 3, 3).into(),
    ]);
    let err = run(&source, ErrorPolicy::Stop, Some(&sink)).await.unwrap_err();

    match err {
        AppError::Pipeline(PipelineError::Upstream { report, .. }) => {
            assert_eq!(report.processed, 1)
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_run_reports_sink_failure() {
    let mut sink = MockSink::new();
    sink.expect_write_table()
        .times(1)
        .returning(|_, _| Err(SinkError::Io(std::io::Error::other("disk full"))));

    let source = IterSource::new(sample_records());
    let err = run(&source, ErrorPolicy::Stop, Some(&sink)).await.unwrap_err();
    assert!(matches!(err, AppError::Sink { ref name, .. } if name == "example"));
}

#[tokio::test]
async fn test_run_without_sink() {
    let source = IterSource::new(sample_records());
    let report = run(&source, ErrorPolicy::Skip, None).await.unwrap();
    assert_eq!(report.processed, 5);
}
