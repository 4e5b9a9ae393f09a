//! Publisher abstraction and the in-process channel implementation.

use super::protocol::PageWorkItem;

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

/// Future returned by `MessageBus::publish`.
pub type PublishFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>>;

/// Why a work item was not accepted by the messaging layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("message bus is closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("broker rejected message with status {0}")]
    Rejected(u16),
}

/// Outbound side of the messaging substrate.
///
/// `publish` resolves once the broker accepted the item. Delivery to workers
/// is at-least-once and unordered; nothing here waits for processing.
pub trait MessageBus: Send + Sync {
    fn publish(&self, item: PageWorkItem) -> PublishFuture<'_>;
}

/// In-process bus backed by a bounded tokio channel.
///
/// The receiving half is consumed by `pipeline::worker::PageWorkerPool`.
#[derive(Clone)]
pub struct ChannelBus {
    sender: mpsc::Sender<PageWorkItem>,
}

impl ChannelBus {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PageWorkItem>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl MessageBus for ChannelBus {
    fn publish(&self, item: PageWorkItem) -> PublishFuture<'_> {
        Box::pin(async move {
            self.sender
                .send(item)
                .await
                .map_err(|_| PublishError::Closed)
        })
    }
}
