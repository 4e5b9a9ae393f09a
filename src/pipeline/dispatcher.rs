//! Dispatcher
//!
//! Fans documents out into page work-items.
//!
//! ## Ordering
//! 1. **Register**: the document, then every page, is written into the
//!    completion tree.
//! 2. **Publish**: only then are the page work-items handed to the message bus.
//!
//! A worker may complete a page the instant it is published, so a page must
//! exist in the tree before its item is visible. For multi-document requests
//! every document of the request is registered before any item is published.
//! The request is sealed between the two phases and reads as unfinished
//! until then, even while it has no documents yet.

use super::notify::{CompletionEvent, CompletionMonitor};
use crate::messaging::bus::MessageBus;
use crate::messaging::protocol::PageWorkItem;
use crate::splitting::registry::SplitterRegistry;
use crate::splitting::types::{PageUnit, SplitError};
use crate::tracking::tree::CompletionTree;
use crate::tracking::types::*;

use base64::Engine;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A page whose work-item the bus did not accept. The page stays registered
/// and unfinished.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishFailure {
    pub page_id: PageId,
    pub page_number: u32,
    pub error: String,
}

/// Outcome of fanning out a single document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDispatch {
    pub document_id: DocumentId,
    pub filename: String,
    pub page_count: usize,
    pub publish_failures: Vec<PublishFailure>,
}

/// Outcome of fanning out a whole upload request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDispatch {
    pub request_id: RequestId,
    pub documents: Vec<DocumentDispatch>,
    pub failed_documents: Vec<FailedDocument>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Registration(#[from] TrackingError),

    #[error("failed to split {filename}: {source}")]
    SplitFailed {
        filename: String,
        #[source]
        source: SplitError,
    },
}

/// A document whose pages are registered but not yet published.
struct PreparedDocument {
    document_id: DocumentId,
    filename: String,
    items: Vec<PageWorkItem>,
}

pub struct Dispatcher {
    tree: Arc<CompletionTree>,
    splitters: Arc<SplitterRegistry>,
    bus: Arc<dyn MessageBus>,
    monitor: Arc<CompletionMonitor>,
}

impl Dispatcher {
    pub fn new(
        monitor: Arc<CompletionMonitor>,
        splitters: Arc<SplitterRegistry>,
        bus: Arc<dyn MessageBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            tree: monitor.tree().clone(),
            splitters,
            bus,
            monitor,
        })
    }

    /// Registers, splits and publishes one document under an existing request.
    ///
    /// The caller owns the request and seals it with
    /// `CompletionTree::seal_request` once its last document is submitted.
    /// Returns after every page's publish has been accepted or failed.
    pub async fn submit_document(
        &self,
        request_id: &RequestId,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<DocumentDispatch, DispatchError> {
        let prepared = self.prepare_document(request_id, filename, bytes).await?;
        Ok(self.publish_document(prepared).await)
    }

    /// Creates a request for `uploads` and fans all of them out.
    ///
    /// A document that fails to split is recorded on the request and skipped;
    /// its siblings proceed. Only a failure to register the request itself is
    /// returned as an error.
    pub async fn submit_request(
        &self,
        uploads: Vec<Upload>,
    ) -> Result<RequestDispatch, DispatchError> {
        let request_id = RequestId::new();
        self.tree.register_request(&request_id)?;

        let mut prepared = Vec::with_capacity(uploads.len());
        let mut failed_documents = Vec::new();

        for upload in uploads {
            let filename = upload.filename;
            match self
                .prepare_document(&request_id, &filename, upload.bytes)
                .await
            {
                Ok(document) => prepared.push(document),
                Err(err) => failed_documents.push(FailedDocument {
                    filename,
                    reason: err.to_string(),
                }),
            }
        }

        if prepared.is_empty() {
            tracing::warn!("Request {} has no dispatchable documents", request_id);
        }

        // Nothing is published yet, so sealing completes the request only
        // when it has no healthy documents at all.
        if self.tree.seal_request(&request_id)? {
            self.monitor.emit(CompletionEvent::RequestCompleted {
                request_id: request_id.clone(),
            });
        }

        let documents = join_all(
            prepared
                .into_iter()
                .map(|document| self.publish_document(document)),
        )
        .await;

        tracing::info!(
            "Request {} dispatched: {} documents, {} pages, {} failed documents",
            request_id,
            documents.len(),
            documents.iter().map(|d| d.page_count).sum::<usize>(),
            failed_documents.len()
        );

        Ok(RequestDispatch {
            request_id,
            documents,
            failed_documents,
        })
    }

    /// Registers and splits one document without publishing it.
    async fn prepare_document(
        &self,
        request_id: &RequestId,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<PreparedDocument, DispatchError> {
        let document_id = DocumentId::new();
        self.tree
            .register_document(request_id, &document_id, filename)?;

        let pages = match self.split(filename, bytes).await {
            Ok(pages) => pages,
            Err(source) => {
                tracing::warn!("Failed to split {}: {}", filename, source);
                self.rollback(request_id, &document_id, filename, &source.to_string());
                return Err(DispatchError::SplitFailed {
                    filename: filename.to_string(),
                    source,
                });
            }
        };

        let mut items = Vec::with_capacity(pages.len());
        for page in pages {
            let page_id = PageId::new();
            if let Err(err) =
                self.tree
                    .register_page(request_id, &document_id, &page_id, page.page_number)
            {
                tracing::error!("Failed to register page {} of {}: {}", page.page_number, filename, err);
                self.rollback(request_id, &document_id, filename, &err.to_string());
                return Err(err.into());
            }

            items.push(PageWorkItem {
                file_name: filename.to_string(),
                page_number: page.page_number,
                binary_data: base64::engine::general_purpose::STANDARD.encode(&page.content),
                request_id: request_id.clone(),
                document_id: document_id.clone(),
                page_id,
            });
        }

        Ok(PreparedDocument {
            document_id,
            filename: filename.to_string(),
            items,
        })
    }

    /// Runs the splitter off the async worker threads.
    async fn split(&self, filename: &str, bytes: Vec<u8>) -> Result<Vec<PageUnit>, SplitError> {
        let splitters = self.splitters.clone();
        let name = filename.to_string();

        tokio::task::spawn_blocking(move || splitters.split(&name, &bytes))
            .await
            .unwrap_or_else(|e| Err(SplitError::CorruptInput(format!("splitter aborted: {}", e))))
    }

    fn rollback(&self, request_id: &RequestId, document_id: &DocumentId, filename: &str, reason: &str) {
        if let Err(err) = self.tree.remove_document(request_id, document_id) {
            tracing::warn!("Rollback of document {} failed: {}", document_id, err);
        }
        if let Err(err) = self.tree.record_failed_document(request_id, filename, reason) {
            tracing::warn!("Could not record failed document {}: {}", filename, err);
        }
    }

    /// Publishes every page of a prepared document concurrently and collects
    /// per-page failures.
    async fn publish_document(&self, document: PreparedDocument) -> DocumentDispatch {
        let page_count = document.items.len();

        let results = join_all(document.items.into_iter().map(|item| {
            let page_id = item.page_id.clone();
            let page_number = item.page_number;
            async move { (page_id, page_number, self.bus.publish(item).await) }
        }))
        .await;

        let publish_failures: Vec<PublishFailure> = results
            .into_iter()
            .filter_map(|(page_id, page_number, result)| {
                result.err().map(|err| {
                    tracing::error!(
                        "Failed to publish page {} of {}: {}",
                        page_number,
                        document.filename,
                        err
                    );
                    PublishFailure {
                        page_id,
                        page_number,
                        error: err.to_string(),
                    }
                })
            })
            .collect();

        tracing::info!(
            "Dispatched {} ({}): {} pages, {} publish failures",
            document.filename,
            document.document_id,
            page_count,
            publish_failures.len()
        );

        DocumentDispatch {
            document_id: document.document_id,
            filename: document.filename,
            page_count,
            publish_failures,
        }
    }
}
