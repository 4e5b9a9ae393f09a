//! Page Worker Pool
//!
//! In-process stand-in for the external worker fleet, used when the service
//! runs with the local channel bus. Each worker pulls a `PageWorkItem` from the
//! shared channel, simulates processing with a random delay, and acknowledges
//! the page to the `CompletionReceiver`.
//!
//! ## Responsibilities
//! - **Consuming**: workers share one receiver; each item goes to exactly one worker.
//! - **Redelivery**: an optional duplicate rate re-acknowledges pages, which
//!   exercises the at-least-once path of the receiver.
//! - **Shutdown**: workers exit once the bus is dropped and the channel drains.

use super::receiver::CompletionReceiver;
use crate::messaging::protocol::PageWorkItem;

use base64::Engine;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Tuning for the simulated workers.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Number of concurrent workers.
    pub worker_count: usize,
    /// Upper bound of the simulated processing delay.
    pub max_delay: Duration,
    /// Probability in `[0, 1]` that an acknowledgement is sent twice.
    pub duplicate_rate: f64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_delay: Duration::from_millis(250),
            duplicate_rate: 0.0,
        }
    }
}

pub struct PageWorkerPool {
    items: Arc<Mutex<mpsc::Receiver<PageWorkItem>>>,
    receiver: Arc<CompletionReceiver>,
    settings: WorkerSettings,
}

impl PageWorkerPool {
    pub fn new(
        items: mpsc::Receiver<PageWorkItem>,
        receiver: Arc<CompletionReceiver>,
        settings: WorkerSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            items: Arc::new(Mutex::new(items)),
            receiver,
            settings,
        })
    }

    /// Spawns the workers and returns their handles.
    pub fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        tracing::info!("Starting {} page workers", self.settings.worker_count);

        (0..self.settings.worker_count.max(1))
            .map(|worker_id| {
                let pool = self.clone();
                tokio::spawn(async move {
                    pool.worker_loop(worker_id).await;
                })
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: usize) {
        tracing::debug!("Worker {} started", worker_id);

        loop {
            // Hold the lock only while waiting for the next item.
            let next = { self.items.lock().await.recv().await };

            let Some(item) = next else {
                tracing::debug!("Worker {} stopping: bus closed", worker_id);
                break;
            };

            self.process(worker_id, item).await;
        }
    }

    async fn process(&self, worker_id: usize, item: PageWorkItem) {
        let size = base64::engine::general_purpose::STANDARD
            .decode(&item.binary_data)
            .map(|bytes| bytes.len())
            .unwrap_or_default();

        tracing::debug!(
            "Worker {} got page {} of {} ({} bytes)",
            worker_id,
            item.page_number,
            item.file_name,
            size
        );

        let (delay, duplicate) = {
            let mut rng = rand::thread_rng();
            let max_ms = self.settings.max_delay.as_millis() as u64;
            let delay = if max_ms == 0 { 0 } else { rng.gen_range(0..max_ms) };
            (delay, rng.gen_bool(self.settings.duplicate_rate.clamp(0.0, 1.0)))
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;

        let ack = item.processed();
        self.receiver.on_page_processed(&ack);
        if duplicate {
            tracing::trace!("Worker {} redelivering ack for page {}", worker_id, ack.page_id);
            self.receiver.on_page_processed(&ack);
        }

        tracing::trace!(
            "Worker {} done with page {} of {}",
            worker_id,
            item.page_number,
            item.file_name
        );
    }
}
