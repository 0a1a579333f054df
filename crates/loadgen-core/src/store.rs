//! Trace storage for one run.
//!
//! Dispatchers never touch the [`TraceStore`] directly: they hold a
//! [`TraceSink`] and push sealed records into an unbounded channel. A single
//! collector task owns the store and appends in arrival order, so appends are
//! serialized no matter how many requests of a page finish together.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::trace::TraceRecord;

#[derive(Debug, Clone, Default)]
pub struct TraceStore {
    records: Vec<TraceRecord>,
}

impl TraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: TraceRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in completion (append) order.
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Snapshot ordered by ascending `start_time`; ties keep append order.
    pub fn sorted(&self) -> Vec<TraceRecord> {
        let mut out = self.records.clone();
        // sort_by is stable
        out.sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));
        out
    }
}

/// Write half of the store funnel. Cheap to clone; one per in-flight request is fine.
#[derive(Debug, Clone)]
pub struct TraceSink {
    tx: mpsc::UnboundedSender<TraceRecord>,
}

impl TraceSink {
    pub fn append(&self, record: TraceRecord) {
        if self.tx.send(record).is_err() {
            tracing::warn!(
                request_id = record.request_id(),
                "trace collector is gone, record dropped"
            );
        }
    }
}

/// Starts the collector task. The returned handle resolves to the filled
/// store once every [`TraceSink`] clone has been dropped.
pub fn spawn_collector() -> (TraceSink, JoinHandle<TraceStore>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<TraceRecord>();

    let collector = tokio::spawn(async move {
        let mut store = TraceStore::new();
        while let Some(record) = rx.recv().await {
            store.append(record);
        }
        store
    });

    (TraceSink { tx }, collector)
}
