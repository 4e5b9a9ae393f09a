use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Unique identifier for an upload request.
///
/// Wrapper around a UUID string. A request groups every document uploaded in
/// a single call and is the unit of lock granularity in the `CompletionTree`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generates a new random UUID v4-based RequestId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Unique identifier for a single uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Unique identifier for one page work-item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PageId(pub String);

impl PageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Level of the completion tree an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Request,
    Document,
    Page,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Request => f.write_str("request"),
            NodeKind::Document => f.write_str("document"),
            NodeKind::Page => f.write_str("page"),
        }
    }
}

/// Failures reported by `CompletionTree` operations.
///
/// `DuplicateId` and `UnknownParent` abort a single registration call.
/// `NotFound` is the expected answer for stale or redelivered notifications
/// and is logged by callers rather than propagated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackingError {
    #[error("{kind} id {id} is already registered")]
    DuplicateId { kind: NodeKind, id: String },

    #[error("parent {kind} {id} is not registered")]
    UnknownParent { kind: NodeKind, id: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: NodeKind, id: String },
}

impl TrackingError {
    pub(crate) fn duplicate(kind: NodeKind, id: impl ToString) -> Self {
        Self::DuplicateId {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn unknown_parent(kind: NodeKind, id: impl ToString) -> Self {
        Self::UnknownParent {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn not_found(kind: NodeKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TrackingError::NotFound { .. })
    }
}

/// Leaf of the completion tree.
#[derive(Debug, Clone)]
pub(crate) struct PageNode {
    pub id: PageId,
    /// 1-based, diagnostics and ordering only.
    pub page_number: u32,
    pub finished: bool,
}

/// A document and the pages it was split into.
///
/// `finished_pages` is kept in step with the page flags so that the
/// document-level check is O(1).
#[derive(Debug, Clone)]
pub(crate) struct DocumentNode {
    pub id: DocumentId,
    pub filename: String,
    pub pages: HashMap<PageId, PageNode>,
    pub finished_pages: usize,
    /// Registration order within the request.
    pub seq: usize,
}

impl DocumentNode {
    pub fn new(id: DocumentId, filename: String, seq: usize) -> Self {
        Self {
            id,
            filename,
            pages: HashMap::new(),
            finished_pages: 0,
            seq,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_pages == self.pages.len()
    }
}

/// Root of a completion tree: one upload request.
#[derive(Debug, Clone)]
pub(crate) struct RequestNode {
    pub id: RequestId,
    pub documents: HashMap<DocumentId, DocumentNode>,
    pub failed_documents: Vec<FailedDocument>,
    pub created_at: u64,
    pub finished_at: Option<u64>,
    /// Set under the request lock when the subtree is evicted, so that a
    /// registration racing with `evict` fails instead of writing into a
    /// detached node.
    pub evicted: bool,
    /// Set once every intended document is registered. Until then the
    /// request is never reported finished.
    pub sealed: bool,
    next_seq: usize,
}

impl RequestNode {
    pub fn new(id: RequestId) -> Self {
        Self {
            id,
            documents: HashMap::new(),
            failed_documents: Vec::new(),
            created_at: now_ms(),
            finished_at: None,
            evicted: false,
            sealed: false,
            next_seq: 0,
        }
    }

    /// Logical AND over all registered documents, vacuously true once sealed.
    pub fn is_finished(&self) -> bool {
        self.sealed && self.documents.values().all(DocumentNode::is_finished)
    }

    pub fn next_seq(&mut self) -> usize {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn snapshot(&self) -> RequestSnapshot {
        let mut documents: Vec<&DocumentNode> = self.documents.values().collect();
        documents.sort_by_key(|doc| doc.seq);

        RequestSnapshot {
            id: self.id.clone(),
            finished: self.is_finished(),
            documents: documents
                .into_iter()
                .map(|doc| {
                    let mut pages: Vec<PageSnapshot> = doc
                        .pages
                        .values()
                        .map(|page| PageSnapshot {
                            id: page.id.clone(),
                            page_number: page.page_number,
                            finished: page.finished,
                        })
                        .collect();
                    pages.sort_by_key(|page| page.page_number);

                    DocumentSnapshot {
                        id: doc.id.clone(),
                        filename: doc.filename.clone(),
                        finished: doc.is_finished(),
                        pages,
                    }
                })
                .collect(),
        }
    }

    pub fn status(&self) -> RequestStatus {
        let snapshot = self.snapshot();
        let documents: Vec<DocumentStatus> = snapshot
            .documents
            .into_iter()
            .map(|doc| DocumentStatus {
                document_id: doc.id,
                filename: doc.filename,
                total_pages: doc.pages.len(),
                finished_pages: doc.pages.iter().filter(|p| p.finished).count(),
                finished: doc.finished,
            })
            .collect();

        RequestStatus {
            request_id: self.id.clone(),
            total_pages: documents.iter().map(|d| d.total_pages).sum(),
            finished_pages: documents.iter().map(|d| d.finished_pages).sum(),
            finished: snapshot.finished,
            sealed: self.sealed,
            documents,
            failed_documents: self.failed_documents.clone(),
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }
}

/// A document that was rejected by its splitter and excluded from the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDocument {
    pub filename: String,
    pub reason: String,
}

/// Result of a `mark_page_finished` call.
///
/// Each flag reports a false -> true transition caused by *this* call, so a
/// completion event keyed on them fires at most once per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarkOutcome {
    pub page_changed: bool,
    pub document_completed: bool,
    pub request_completed: bool,
}

/// Tree of finished flags for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub id: RequestId,
    pub finished: bool,
    pub documents: Vec<DocumentSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub id: DocumentId,
    pub filename: String,
    pub finished: bool,
    pub pages: Vec<PageSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub id: PageId,
    pub page_number: u32,
    pub finished: bool,
}

/// Aggregated progress of a request, as served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatus {
    pub request_id: RequestId,
    pub total_pages: usize,
    pub finished_pages: usize,
    pub finished: bool,
    /// False while the request is still being dispatched.
    pub sealed: bool,
    pub documents: Vec<DocumentStatus>,
    pub failed_documents: Vec<FailedDocument>,
    pub created_at: u64,
    pub finished_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatus {
    pub document_id: DocumentId,
    pub filename: String,
    pub total_pages: usize,
    pub finished_pages: usize,
    pub finished: bool,
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
