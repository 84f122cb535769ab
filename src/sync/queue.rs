//! Ordered event buffer with threshold-triggered flushes
//!
//! Overflow flushes are spawned without being awaited by the producer; their
//! handles are kept so [`BatchingQueue::drain`] can join them before the
//! final, awaited flush.

use std::mem;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::database::EventSink;
use crate::models::SyncEvent;

/// Buffers events for one tenant and hands full batches to the sink
pub struct BatchingQueue {
    sink: Arc<dyn EventSink>,
    api_key: String,
    threshold: usize,
    buffer: Vec<SyncEvent>,
    in_flight: Vec<JoinHandle<()>>,
    enqueued: usize,
}

impl BatchingQueue {
    pub fn new(sink: Arc<dyn EventSink>, api_key: impl Into<String>, threshold: usize) -> Self {
        Self {
            sink,
            api_key: api_key.into(),
            threshold: threshold.max(1),
            buffer: Vec::new(),
            in_flight: Vec::new(),
            enqueued: 0,
        }
    }

    /// Add an event
    ///
    /// If the buffer is already at the threshold, the whole buffer is taken
    /// and written in the background first, so each overflow flush carries
    /// exactly `threshold` events. Must be called inside a Tokio runtime.
    pub fn enqueue(&mut self, event: SyncEvent) {
        if self.buffer.len() >= self.threshold {
            let batch = mem::take(&mut self.buffer);
            self.spawn_flush(batch);
        }
        self.buffer.push(event);
        self.enqueued += 1;
    }

    /// Events waiting in the live buffer
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Overflow flushes not yet joined
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Events accepted since creation
    pub fn enqueued(&self) -> usize {
        self.enqueued
    }

    /// Join outstanding flushes, then flush what remains and wait for it
    ///
    /// Returns the number of events in the final flush. Sink errors are
    /// logged and not returned.
    pub async fn drain(&mut self) -> usize {
        for handle in self.in_flight.drain(..) {
            if let Err(err) = handle.await {
                error!(api_key = %self.api_key, error = %err, "Overflow flush task failed");
            }
        }

        let batch = mem::take(&mut self.buffer);
        let count = batch.len();
        if count > 0 {
            write_batch(self.sink.as_ref(), &self.api_key, batch).await;
        }
        count
    }

    fn spawn_flush(&mut self, batch: Vec<SyncEvent>) {
        info!(api_key = %self.api_key, count = batch.len(), "Inserting actions to sink");

        let sink = Arc::clone(&self.sink);
        let api_key = self.api_key.clone();
        self.in_flight.push(tokio::spawn(async move {
            write_batch(sink.as_ref(), &api_key, batch).await;
        }));
    }
}

async fn write_batch(sink: &dyn EventSink, api_key: &str, batch: Vec<SyncEvent>) {
    let count = batch.len();
    match sink.write(api_key, batch).await {
        Ok(()) => info!(api_key = api_key, count = count, "Actions written"),
        Err(err) => error!(
            api_key = api_key,
            count = count,
            error = %err,
            "Failed to write actions"
        ),
    }
}
