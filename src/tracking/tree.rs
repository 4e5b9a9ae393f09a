//! Completion Tree
//!
//! Concurrent registry of `Request -> Document -> Page` trees. Each request
//! subtree lives behind its own mutex; the outer `DashMap` is only used to find
//! that mutex and its shard guard is dropped before the mutex is taken, so two
//! unrelated uploads never wait on each other.
//!
//! Two global indices (`DocumentId -> RequestId`, `PageId -> DocumentId`) make
//! id reuse detectable across requests. They are written only while the owning
//! request mutex is held, and never held while a request mutex is acquired.

use super::types::*;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub struct CompletionTree {
    requests: DashMap<RequestId, Arc<Mutex<RequestNode>>>,
    documents: DashMap<DocumentId, RequestId>,
    pages: DashMap<PageId, DocumentId>,
}

impl CompletionTree {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn request_node(&self, request_id: &RequestId) -> Option<Arc<Mutex<RequestNode>>> {
        self.requests.get(request_id).map(|entry| entry.value().clone())
    }

    /// Creates an empty, unsealed request subtree.
    pub fn register_request(&self, request_id: &RequestId) -> Result<RequestSnapshot, TrackingError> {
        match self.requests.entry(request_id.clone()) {
            Entry::Occupied(_) => Err(TrackingError::duplicate(NodeKind::Request, request_id)),
            Entry::Vacant(slot) => {
                let node = RequestNode::new(request_id.clone());
                let snapshot = node.snapshot();
                slot.insert(Arc::new(Mutex::new(node)));
                tracing::debug!("Registered request {}", request_id);
                Ok(snapshot)
            }
        }
    }

    /// Adds an empty document under an existing request.
    pub fn register_document(
        &self,
        request_id: &RequestId,
        document_id: &DocumentId,
        filename: &str,
    ) -> Result<DocumentSnapshot, TrackingError> {
        let node = self
            .request_node(request_id)
            .ok_or_else(|| TrackingError::unknown_parent(NodeKind::Request, request_id))?;
        let mut request = node.lock();

        if request.evicted {
            return Err(TrackingError::unknown_parent(NodeKind::Request, request_id));
        }

        match self.documents.entry(document_id.clone()) {
            Entry::Occupied(_) => {
                return Err(TrackingError::duplicate(NodeKind::Document, document_id));
            }
            Entry::Vacant(slot) => {
                slot.insert(request_id.clone());
            }
        }

        let seq = request.next_seq();
        request.documents.insert(
            document_id.clone(),
            DocumentNode::new(document_id.clone(), filename.to_string(), seq),
        );

        tracing::debug!(
            "Registered document {} ({}) in request {}",
            document_id,
            filename,
            request_id
        );

        Ok(DocumentSnapshot {
            id: document_id.clone(),
            filename: filename.to_string(),
            finished: true,
            pages: Vec::new(),
        })
    }

    /// Adds an unfinished page under an existing request/document pair.
    pub fn register_page(
        &self,
        request_id: &RequestId,
        document_id: &DocumentId,
        page_id: &PageId,
        page_number: u32,
    ) -> Result<PageSnapshot, TrackingError> {
        let node = self
            .request_node(request_id)
            .ok_or_else(|| TrackingError::unknown_parent(NodeKind::Request, request_id))?;
        let mut request = node.lock();

        if request.evicted {
            return Err(TrackingError::unknown_parent(NodeKind::Request, request_id));
        }

        let document = request
            .documents
            .get_mut(document_id)
            .ok_or_else(|| TrackingError::unknown_parent(NodeKind::Document, document_id))?;

        match self.pages.entry(page_id.clone()) {
            Entry::Occupied(_) => return Err(TrackingError::duplicate(NodeKind::Page, page_id)),
            Entry::Vacant(slot) => {
                slot.insert(document_id.clone());
            }
        }

        document.pages.insert(
            page_id.clone(),
            PageNode {
                id: page_id.clone(),
                page_number,
                finished: false,
            },
        );

        tracing::trace!(
            "Registered page {} (#{}) of document {}",
            page_id,
            page_number,
            document_id
        );

        Ok(PageSnapshot {
            id: page_id.clone(),
            page_number,
            finished: false,
        })
    }

    /// Flips one page to finished and reports which ancestors completed.
    ///
    /// Marking an already finished page returns a default `MarkOutcome`
    /// without touching state. Unknown ids return `NotFound`.
    pub fn mark_page_finished(
        &self,
        request_id: &RequestId,
        document_id: &DocumentId,
        page_id: &PageId,
    ) -> Result<MarkOutcome, TrackingError> {
        let node = self
            .request_node(request_id)
            .ok_or_else(|| TrackingError::not_found(NodeKind::Request, request_id))?;
        let mut request = node.lock();

        if request.evicted {
            return Err(TrackingError::not_found(NodeKind::Request, request_id));
        }

        let document = request
            .documents
            .get_mut(document_id)
            .ok_or_else(|| TrackingError::not_found(NodeKind::Document, document_id))?;
        let page = document
            .pages
            .get_mut(page_id)
            .ok_or_else(|| TrackingError::not_found(NodeKind::Page, page_id))?;

        if page.finished {
            return Ok(MarkOutcome::default());
        }

        // The page was unfinished, so both ancestors were unfinished before
        // this call; any finished state observed now is a transition.
        page.finished = true;
        document.finished_pages += 1;
        let document_completed = document.is_finished();
        let request_completed = document_completed && request.is_finished();

        if request_completed {
            request.finished_at = Some(now_ms());
        }

        Ok(MarkOutcome {
            page_changed: true,
            document_completed,
            request_completed,
        })
    }

    /// Declares that every document of the request is registered.
    ///
    /// Returns `true` when sealing is what made the request finished, which
    /// happens when no registered document has unfinished pages left.
    /// Sealing twice is a no-op returning `false`.
    pub fn seal_request(&self, request_id: &RequestId) -> Result<bool, TrackingError> {
        let node = self
            .request_node(request_id)
            .ok_or_else(|| TrackingError::not_found(NodeKind::Request, request_id))?;
        let mut request = node.lock();

        if request.evicted {
            return Err(TrackingError::not_found(NodeKind::Request, request_id));
        }
        if request.sealed {
            return Ok(false);
        }

        request.sealed = true;
        let completed = request.is_finished();
        if completed {
            request.finished_at = Some(now_ms());
        }

        tracing::debug!(
            "Sealed request {} with {} documents",
            request_id,
            request.documents.len()
        );
        Ok(completed)
    }

    pub fn is_request_finished(&self, request_id: &RequestId) -> Result<bool, TrackingError> {
        let node = self
            .request_node(request_id)
            .ok_or_else(|| TrackingError::not_found(NodeKind::Request, request_id))?;
        let request = node.lock();
        Ok(request.is_finished())
    }

    pub fn snapshot(&self, request_id: &RequestId) -> Result<RequestSnapshot, TrackingError> {
        let node = self
            .request_node(request_id)
            .ok_or_else(|| TrackingError::not_found(NodeKind::Request, request_id))?;
        let request = node.lock();
        Ok(request.snapshot())
    }

    /// Page totals and per-document breakdown for one request.
    pub fn get_status(&self, request_id: &RequestId) -> Result<RequestStatus, TrackingError> {
        let node = self
            .request_node(request_id)
            .ok_or_else(|| TrackingError::not_found(NodeKind::Request, request_id))?;
        let request = node.lock();
        Ok(request.status())
    }

    /// Removes a document and all its pages. Used to roll back a document
    /// whose split or page registration failed.
    pub fn remove_document(
        &self,
        request_id: &RequestId,
        document_id: &DocumentId,
    ) -> Result<(), TrackingError> {
        let node = self
            .request_node(request_id)
            .ok_or_else(|| TrackingError::not_found(NodeKind::Request, request_id))?;
        let mut request = node.lock();

        let document = request
            .documents
            .remove(document_id)
            .ok_or_else(|| TrackingError::not_found(NodeKind::Document, document_id))?;

        for page_id in document.pages.keys() {
            self.pages.remove(page_id);
        }
        self.documents.remove(document_id);

        tracing::debug!("Rolled back document {} of request {}", document_id, request_id);
        Ok(())
    }

    /// Records a document that never made it into the tree.
    pub fn record_failed_document(
        &self,
        request_id: &RequestId,
        filename: &str,
        reason: &str,
    ) -> Result<(), TrackingError> {
        let node = self
            .request_node(request_id)
            .ok_or_else(|| TrackingError::not_found(NodeKind::Request, request_id))?;
        let mut request = node.lock();

        request.failed_documents.push(FailedDocument {
            filename: filename.to_string(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Drops a request subtree, finished or not. Later notifications for it
    /// resolve to `NotFound`.
    pub fn evict(&self, request_id: &RequestId) -> Result<(), TrackingError> {
        let (_, node) = self
            .requests
            .remove(request_id)
            .ok_or_else(|| TrackingError::not_found(NodeKind::Request, request_id))?;
        let mut request = node.lock();
        request.evicted = true;

        for (document_id, document) in request.documents.iter() {
            for page_id in document.pages.keys() {
                self.pages.remove(page_id);
            }
            self.documents.remove(document_id);
        }

        tracing::info!(
            "Evicted request {} (finished: {})",
            request_id,
            request.is_finished()
        );
        Ok(())
    }

    /// Requests due for eviction at `now`.
    ///
    /// Finished requests expire `finished_retention` after they finished.
    /// Unfinished ones, including requests still being dispatched, expire
    /// `abandoned_ttl` after creation, if a TTL is set.
    pub fn expired(
        &self,
        now: u64,
        finished_retention: Duration,
        abandoned_ttl: Option<Duration>,
    ) -> Vec<RequestId> {
        let nodes: Vec<Arc<Mutex<RequestNode>>> = self
            .requests
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        nodes
            .into_iter()
            .filter_map(|node| {
                let request = node.lock();
                let due = if request.is_finished() {
                    let since = request.finished_at.unwrap_or(request.created_at);
                    now.saturating_sub(since) >= finished_retention.as_millis() as u64
                } else {
                    abandoned_ttl.is_some_and(|ttl| {
                        now.saturating_sub(request.created_at) >= ttl.as_millis() as u64
                    })
                };
                if due {
                    Some(request.id.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }
}

impl Default for CompletionTree {
    fn default() -> Self {
        Self {
            requests: DashMap::new(),
            documents: DashMap::new(),
            pages: DashMap::new(),
        }
    }
}
