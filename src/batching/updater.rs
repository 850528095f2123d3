// Batch updater - coalesces a stream of items into bounded flushes
// Author: kelexine (https://github.com/kelexine)

use crate::config::BatchingSettings;
use crate::metrics;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

enum Command<T> {
    Item(T),
    Flush(oneshot::Sender<()>),
}

/// Accumulates items and hands them to a sink in batches.
///
/// A batch is flushed when it reaches `max_batch_size` items or when
/// `max_wait` has passed since its first item, whichever happens first.
/// A single worker task owns the sink, so every item is delivered exactly
/// once and in submission order. Dropping the updater flushes whatever is
/// still pending.
pub struct BatchUpdater<T> {
    tx: mpsc::UnboundedSender<Command<T>>,
    worker: JoinHandle<()>,
}

impl<T: Send + 'static> BatchUpdater<T> {
    /// Spawn the worker. Must be called from within a Tokio runtime.
    pub fn new<S>(sink: S, max_batch_size: usize, max_wait: Duration) -> Self
    where
        S: FnMut(Vec<T>) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(rx, sink, max_batch_size.max(1), max_wait));
        Self { tx, worker }
    }

    pub fn from_settings<S>(sink: S, settings: &BatchingSettings) -> Self
    where
        S: FnMut(Vec<T>) + Send + 'static,
    {
        Self::new(sink, settings.max_batch_size, settings.max_wait())
    }

    /// Queue an item for the next flush.
    pub fn push(&self, item: T) {
        if self.tx.send(Command::Item(item)).is_err() {
            debug!("Batch worker has stopped; dropping item");
        }
    }

    /// A cheap, cloneable submission function for this updater.
    pub fn submitter(&self) -> impl Fn(T) + Clone + Send + Sync + 'static {
        let tx = self.tx.clone();
        move |item| {
            let _ = tx.send(Command::Item(item));
        }
    }

    /// Deliver everything pending now and wait until the sink has run.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Flush what is pending and wait for the worker to exit.
    pub async fn shutdown(self) {
        let Self { tx, worker } = self;
        drop(tx);
        let _ = worker.await;
    }
}

/// Build an updater and return only its submission function.
///
/// The worker stays alive until every clone of the returned function is
/// dropped, then flushes the remainder.
pub fn create_batch_updater<T, S>(
    sink: S,
    max_batch_size: usize,
    max_wait: Duration,
) -> impl Fn(T) + Clone + Send + Sync + 'static
where
    T: Send + 'static,
    S: FnMut(Vec<T>) + Send + 'static,
{
    let updater = BatchUpdater::new(sink, max_batch_size, max_wait);
    updater.submitter()
}

async fn run_worker<T, S>(
    mut rx: mpsc::UnboundedReceiver<Command<T>>,
    mut sink: S,
    max_batch_size: usize,
    max_wait: Duration,
) where
    S: FnMut(Vec<T>),
{
    let mut batch: Vec<T> = Vec::with_capacity(max_batch_size);
    let mut deadline: Option<Instant> = None;

    let mut deliver = |batch: &mut Vec<T>, deadline: &mut Option<Instant>, reason: &str| {
        *deadline = None;
        if batch.is_empty() {
            return;
        }
        trace!("Flushing {} items ({})", batch.len(), reason);
        metrics::record_batch_flush(reason);
        sink(std::mem::take(batch));
    };

    loop {
        let command = match deadline {
            Some(at) => tokio::select! {
                biased;
                _ = sleep_until(at) => {
                    deliver(&mut batch, &mut deadline, "timeout");
                    continue;
                }
                command = rx.recv() => command,
            },
            None => rx.recv().await,
        };

        match command {
            Some(Command::Item(item)) => {
                if batch.is_empty() {
                    deadline = Some(Instant::now() + max_wait);
                }
                batch.push(item);
                if batch.len() >= max_batch_size {
                    deliver(&mut batch, &mut deadline, "size");
                }
            }
            Some(Command::Flush(done)) => {
                deliver(&mut batch, &mut deadline, "manual");
                let _ = done.send(());
            }
            None => {
                deliver(&mut batch, &mut deadline, "shutdown");
                break;
            }
        }
    }
}
