//! Fire-and-forget publisher for ROI polygon updates.
//!
//! Callers enqueue a JSON string and return immediately. A single worker
//! thread delivers messages in enqueue order, one connection per message,
//! at most once.

pub mod delivery;
pub mod queue;

pub use delivery::{Delivery, OneShotDelivery};
pub use queue::PublishQueue;

use crate::config::PublisherConfig;
use crate::errors::BridgeError;
use crate::metrics::PublisherMetrics;
use crate::roi::PolygonUpdate;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

pub struct PolygonPublisher<D: Delivery = OneShotDelivery> {
    shared: Arc<Shared<D>>,
    /// Held only briefly, never across a join
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Serializes `stop()` calls
    stopping: Mutex<()>,
}

struct Shared<D> {
    topic: String,
    queue: PublishQueue,
    delivery: D,
    metrics: PublisherMetrics,
}

impl PolygonPublisher<OneShotDelivery> {
    pub fn new(config: PublisherConfig) -> Self {
        let delivery = OneShotDelivery::new(&config);
        Self::with_delivery(config, delivery)
    }
}

impl<D: Delivery> PolygonPublisher<D> {
    pub fn with_delivery(config: PublisherConfig, delivery: D) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: PublishQueue::new(config.queue_capacity),
                metrics: PublisherMetrics::new(&config.topic),
                topic: config.topic,
                delivery,
            }),
            worker: Mutex::new(None),
            stopping: Mutex::new(()),
        }
    }

    pub fn topic(&self) -> &str {
        &self.shared.topic
    }

    /// Spawn the worker if it is not running.
    pub fn start(&self) -> Result<(), BridgeError> {
        let mut worker = self.worker();
        if worker.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        if let Some(finished) = worker.take() {
            if finished.join().is_err() {
                tracing::error!("Publisher thread panicked");
            }
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("bridge-publisher".to_string())
            .spawn(move || {
                let span = tracing::info_span!("publisher", topic = %shared.topic);
                let _enter = span.enter();
                run(&shared);
            })?;

        tracing::debug!(topic = %self.shared.topic, "Publisher worker started");
        *worker = Some(handle);
        Ok(())
    }

    /// Queue a message and return. Starts the worker on first use.
    ///
    /// Never waits on a concurrent `stop()`: a message queued while stopping
    /// is discarded with the rest. Only fails if the worker thread cannot be
    /// spawned; the message stays queued for the next successful start.
    pub fn publish_polygon(&self, message: impl Into<String>) -> Result<(), BridgeError> {
        if let Some(evicted) = self.shared.queue.push(message.into()) {
            self.shared.metrics.dropped(1);
            tracing::warn!(
                bytes = evicted.len(),
                "Publish queue full, dropped oldest pending message"
            );
        }
        if self.shared.queue.is_stopping() {
            return Ok(());
        }
        self.start()
    }

    pub fn publish_update(&self, update: &PolygonUpdate) -> Result<(), BridgeError> {
        self.publish_polygon(update.to_json()?)
    }

    /// Stop and join the worker. An in-flight delivery completes; anything
    /// still queued is discarded.
    pub fn stop(&self) {
        let _stopping = self.stopping.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = {
            let mut worker = self.worker();
            self.shared.queue.request_stop();
            worker.take()
        };

        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Publisher thread panicked");
            }
        }

        let dropped = self.shared.queue.discard_pending();
        if dropped > 0 {
            self.shared.metrics.dropped(dropped);
            tracing::warn!(dropped, "Discarded pending polygon updates at stop");
        }
        self.shared.queue.reset();
    }

    pub fn is_running(&self) -> bool {
        self.worker().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Messages queued but not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    fn worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: Delivery> Drop for PolygonPublisher<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<D: Delivery>(shared: &Shared<D>) {
    while let Some(message) = shared.queue.next() {
        shared.metrics.attempted();
        match shared.delivery.deliver(&shared.topic, &message) {
            Ok(()) => {
                shared.metrics.delivered();
                tracing::debug!(bytes = message.len(), "Polygon update published");
            }
            Err(e) => {
                shared.metrics.dropped(1);
                tracing::warn!(error = %e, "Polygon update dropped after failed publish");
            }
        }
    }
    tracing::debug!("Publisher worker exiting");
}
