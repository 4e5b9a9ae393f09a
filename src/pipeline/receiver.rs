//! Completion Receiver
//!
//! Folds "page processed" notifications into the completion tree. Every
//! notification is accepted: unknown ids and redeliveries are logged and
//! reported in the returned `ReceiveOutcome`, never raised.

use super::notify::{CompletionEvent, CompletionMonitor};
use crate::messaging::protocol::PageProcessed;
use crate::tracking::tree::CompletionTree;
use crate::tracking::types::TrackingError;

use std::sync::Arc;

/// What a single notification did to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Page flipped to finished; ancestors may have completed.
    Marked {
        document_completed: bool,
        request_completed: bool,
    },
    /// Page was already finished (redelivery).
    Duplicate,
    /// Ids not (or no longer) tracked.
    Unknown,
}

pub struct CompletionReceiver {
    tree: Arc<CompletionTree>,
    monitor: Arc<CompletionMonitor>,
}

impl CompletionReceiver {
    pub fn new(monitor: Arc<CompletionMonitor>) -> Arc<Self> {
        Arc::new(Self {
            tree: monitor.tree().clone(),
            monitor,
        })
    }

    /// Handles one inbound notification.
    ///
    /// Events are emitted after the tree lock is released and only for the
    /// transitions this call caused, so no entity completes twice.
    pub fn on_page_processed(&self, msg: &PageProcessed) -> ReceiveOutcome {
        let outcome =
            match self
                .tree
                .mark_page_finished(&msg.request_id, &msg.document_id, &msg.page_id)
            {
                Ok(outcome) => outcome,
                Err(err @ TrackingError::NotFound { .. }) => {
                    tracing::warn!(
                        "Got progress update for untracked page {} (request {}, document {}): {}",
                        msg.page_id,
                        msg.request_id,
                        msg.document_id,
                        err
                    );
                    return ReceiveOutcome::Unknown;
                }
                Err(err) => {
                    tracing::warn!("Ignoring progress update for page {}: {}", msg.page_id, err);
                    return ReceiveOutcome::Unknown;
                }
            };

        if !outcome.page_changed {
            tracing::debug!(
                "Duplicate completion for page {} of document {}",
                msg.page_id,
                msg.document_id
            );
            return ReceiveOutcome::Duplicate;
        }

        tracing::debug!(
            "Page {} finished (document done: {}, request done: {})",
            msg.page_id,
            outcome.document_completed,
            outcome.request_completed
        );

        if outcome.document_completed {
            tracing::info!(
                "Document {} of request {} finished",
                msg.document_id,
                msg.request_id
            );
            self.monitor.emit(CompletionEvent::DocumentCompleted {
                request_id: msg.request_id.clone(),
                document_id: msg.document_id.clone(),
            });
        }

        if outcome.request_completed {
            tracing::info!("Request {} finished", msg.request_id);
            self.monitor.emit(CompletionEvent::RequestCompleted {
                request_id: msg.request_id.clone(),
            });
        }

        ReceiveOutcome::Marked {
            document_completed: outcome.document_completed,
            request_completed: outcome.request_completed,
        }
    }
}
