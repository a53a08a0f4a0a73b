//! Record producers feeding the ingestion loop.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use groupsum_core::Record;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::pipeline::RecordSource;

/// A fixed, in-memory list of records.
#[derive(Debug, Clone)]
pub struct IterSource<P> {
    records: Vec<Record<P>>,
}

impl<P> IterSource<P> {
    pub fn new(records: impl IntoIterator<Item = Record<P>>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }
}

impl<P> RecordSource<P> for IterSource<P>
where
    P: Clone + Send + Sync + 'static,
{
    fn stream(&self) -> BoxStream<'static, Record<P>> {
        stream::iter(self.records.clone()).boxed()
    }
}

/// Multi-producer channel of records.
///
/// Producers hold clones of the sender returned by [`ChannelSource::new`];
/// the stream ends once every sender is dropped. The receiving end can only
/// be streamed once.
pub struct ChannelSource<P> {
    receiver: Mutex<Option<mpsc::Receiver<Record<P>>>>,
}

impl<P> ChannelSource<P> {
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<Record<P>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let source = Self {
            receiver: Mutex::new(Some(receiver)),
        };
        (source, sender)
    }
}

impl<P> RecordSource<P> for ChannelSource<P>
where
    P: Send + 'static,
{
    fn stream(&self) -> BoxStream<'static, Record<P>> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match receiver {
            Some(receiver) => ReceiverStream::new(receiver).boxed(),
            None => {
                warn!("record channel already consumed");
                stream::empty().boxed()
            }
        }
    }
}

/// Spawns a task forwarding every record of `source` into `sender`.
///
/// The task ends when the source is exhausted or the receiving side is gone.
pub fn spawn_producer<P>(
    source: &dyn RecordSource<P>,
    sender: mpsc::Sender<Record<P>>,
) -> JoinHandle<()>
where
    P: Send + 'static,
{
    let mut records = source.stream();
    tokio::spawn(async move {
        while let Some(record) = records.next().await {
            if sender.send(record).await.is_err() {
                debug!("record channel closed, producer stopping");
                break;
            }
        }
    })
}

/// Newline-delimited JSON file, one payload per line.
///
/// Blank lines are ignored. A line that fails to parse, or a file that can't
/// be read, surfaces as a failed record so the error policy decides.
pub struct JsonLinesSource<P> {
    path: PathBuf,
    _payload: PhantomData<fn() -> P>,
}

impl<P> JsonLinesSource<P> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _payload: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<P> RecordSource<P> for JsonLinesSource<P>
where
    P: DeserializeOwned + Send + 'static,
{
    fn stream(&self) -> BoxStream<'static, Record<P>> {
        let path = self.path.clone();
        let records = async_stream::stream! {
            match tokio::fs::File::open(&path).await {
                Err(e) => {
                    yield Record::failed(format!("cannot open {}: {e}", path.display()));
                }
                Ok(file) => {
                    debug!(path = %path.display(), "reading records");
                    let mut lines = BufReader::new(file).lines();
                    let mut line_no = 0usize;
                    loop {
                        match lines.next_line().await {
                            Ok(Some(line)) => {
                                line_no += 1;
                                if line.trim().is_empty() {
                                    continue;
                                }
                                match serde_json::from_str::<P>(&line) {
                                    Ok(payload) => {
                                        yield Record::Data(payload);
                                    }
                                    Err(e) => {
                                        yield Record::failed(format!("{}:{line_no}: {e}", path.display()));
                                    }
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                yield Record::failed(format!("{}: {e}", path.display()));
                                break;
                            }
                        }
                    }
                }
            }
        };
        records.boxed()
    }
}
