use std::sync::Arc;

use async_trait::async_trait;
use clap::ValueEnum;
use futures::stream::BoxStream;
use futures::StreamExt;
use groupsum_core::{BTreeStore, KeyedStore, Record, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::PipelineError;

/// What the ingestion loop does with a record its producer flagged as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Abort the run; records already processed stay aggregated
    Stop,
    /// Log the failure and continue with the next record
    Skip,
}

impl ErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorPolicy::Stop => "stop",
            ErrorPolicy::Skip => "skip",
        }
    }
}

/// Counts of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub processed: u64,
    pub skipped: u64,
}

/// Producer of records. The stream ending is the end-of-input signal.
pub trait RecordSource<P>: Send + Sync {
    fn stream(&self) -> BoxStream<'static, Record<P>>;
}

#[async_trait]
pub trait Ingest<P> {
    async fn ingest(&self, source: &dyn RecordSource<P>) -> Result<IngestReport, PipelineError>;
}

/// Single writer in front of a [`Router`].
///
/// Every record is processed while holding the router's lock, so bucket
/// lookup and creation form one critical section even when several tasks
/// feed the same ingestor.
pub struct Ingestor<P, S = BTreeStore<P>> {
    router: Arc<Mutex<Router<P, S>>>,
    policy: ErrorPolicy,
}

impl<P, S> Ingestor<P, S>
where
    S: KeyedStore<P>,
{
    pub fn new(router: Router<P, S>, policy: ErrorPolicy) -> Self {
        Self {
            router: Arc::new(Mutex::new(router)),
            policy,
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Shared handle to the router, for building summaries after ingestion.
    pub fn router(&self) -> Arc<Mutex<Router<P, S>>> {
        self.router.clone()
    }

    /// Unwraps the router once no other handle to it is alive.
    pub fn into_router(self) -> Result<Router<P, S>, Self> {
        let policy = self.policy;
        Arc::try_unwrap(self.router)
            .map(Mutex::into_inner)
            .map_err(|router| Self { router, policy })
    }
}

#[async_trait]
impl<P, S> Ingest<P> for Ingestor<P, S>
where
    P: Send + Sync + 'static,
    S: KeyedStore<P> + Send + 'static,
{
    async fn ingest(&self, source: &dyn RecordSource<P>) -> Result<IngestReport, PipelineError> {
        let mut report = IngestReport::default();
        let mut stream = source.stream();

        while let Some(record) = stream.next().await {
            match record {
                Record::Data(payload) => {
                    self.router.lock().await.process(&payload);
                    report.processed += 1;
                }
                Record::Failed(err) => match self.policy {
                    ErrorPolicy::Stop => {
                        warn!(error = %err, processed = report.processed, "stopping on failed record");
                        return Err(PipelineError::Upstream {
                            source: err,
                            report,
                        });
                    }
                    ErrorPolicy::Skip => {
                        warn!(error = %err, "skipping failed record");
                        report.skipped += 1;
                    }
                },
            }
        }

        info!(
            processed = report.processed,
            skipped = report.skipped,
            "ingestion finished"
        );
        Ok(report)
    }
}
