//! Query / Notify Surface
//!
//! `CompletionMonitor` is the read side of the tracker: status queries,
//! eviction, a broadcast stream of completion events, and `await_request` for
//! callers that want to block until a request is done.

use crate::tracking::tree::CompletionTree;
use crate::tracking::types::*;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 1024;

/// Emitted once per entity on its false -> true transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CompletionEvent {
    #[serde(rename_all = "camelCase")]
    DocumentCompleted {
        request_id: RequestId,
        document_id: DocumentId,
    },
    #[serde(rename_all = "camelCase")]
    RequestCompleted { request_id: RequestId },
}

/// Result of `await_request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AwaitOutcome {
    Finished,
    TimedOut,
}

pub struct CompletionMonitor {
    tree: Arc<CompletionTree>,
    events: broadcast::Sender<CompletionEvent>,
}

impl CompletionMonitor {
    pub fn new(tree: Arc<CompletionTree>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self { tree, events })
    }

    pub fn tree(&self) -> &Arc<CompletionTree> {
        &self.tree
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompletionEvent> {
        self.events.subscribe()
    }

    /// Publishes an event to every current subscriber. Having none is fine.
    pub fn emit(&self, event: CompletionEvent) {
        tracing::debug!("Completion event: {:?}", event);
        let _ = self.events.send(event);
    }

    pub fn get_status(&self, request_id: &RequestId) -> Result<RequestStatus, TrackingError> {
        self.tree.get_status(request_id)
    }

    pub fn evict(&self, request_id: &RequestId) -> Result<(), TrackingError> {
        self.tree.evict(request_id)
    }

    /// Waits until `request_id` is finished or `timeout` elapses.
    ///
    /// Subscribes before checking the current state so a completion landing
    /// between the check and the wait is not missed. No tree lock is held
    /// while waiting; dropping the future cancels the wait.
    ///
    /// # Returns
    /// * `Ok(Finished)` once the request is finished (immediately if it already is).
    /// * `Ok(TimedOut)` if the deadline passed first, including when the request
    ///   was evicted while waiting.
    /// * `Err(NotFound)` if the request is unknown when the call starts.
    pub async fn await_request(
        &self,
        request_id: &RequestId,
        timeout: Duration,
    ) -> Result<AwaitOutcome, TrackingError> {
        let mut events = self.subscribe();

        if self.tree.is_request_finished(request_id)? {
            return Ok(AwaitOutcome::Finished);
        }

        let wait = async {
            loop {
                match events.recv().await {
                    Ok(CompletionEvent::RequestCompleted { request_id: done })
                        if done == *request_id =>
                    {
                        return AwaitOutcome::Finished;
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Await for {} lagged by {} events", request_id, skipped);
                        if let Ok(true) = self.tree.is_request_finished(request_id) {
                            return AwaitOutcome::Finished;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        std::future::pending::<()>().await;
                    }
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(outcome) => Ok(outcome),
            Err(_) => Ok(AwaitOutcome::TimedOut),
        }
    }
}

/// Traces every completion event at debug level. `CompletionReceiver` already
/// reports transitions at info, so this only adds detail when debugging.
pub fn spawn_event_log(monitor: &CompletionMonitor) -> JoinHandle<()> {
    let mut events = monitor.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(CompletionEvent::RequestCompleted { request_id }) => {
                    tracing::debug!("Upload {} done", request_id);
                }
                Ok(CompletionEvent::DocumentCompleted {
                    request_id,
                    document_id,
                }) => {
                    tracing::debug!("Document {} of upload {} done", document_id, request_id);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
