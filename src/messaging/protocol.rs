//! Message Definitions
//!
//! The two message shapes exchanged with the worker fleet. Field names follow
//! the camelCase wire format used on the broker topics.

use crate::tracking::types::{DocumentId, PageId, RequestId};
use serde::{Deserialize, Serialize};

/// Default pub/sub component name on the Dapr sidecar.
pub const DEFAULT_PUBSUB_NAME: &str = "pubsub";
/// Topic carrying one `PageWorkItem` per page.
pub const DEFAULT_PAGE_TOPIC: &str = "NewFileUploaded";

/// Outbound work item: one page of one document.
///
/// Self-describing: a worker echoes the three ids back in `PageProcessed`
/// without needing anything else from the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWorkItem {
    pub file_name: String,
    pub page_number: u32,
    /// Base64 encoded page content.
    pub binary_data: String,
    pub request_id: RequestId,
    pub document_id: DocumentId,
    pub page_id: PageId,
}

impl PageWorkItem {
    /// The acknowledgement a worker sends once this item is processed.
    pub fn processed(&self) -> PageProcessed {
        PageProcessed {
            request_id: self.request_id.clone(),
            document_id: self.document_id.clone(),
            page_id: self.page_id.clone(),
        }
    }
}

/// Inbound completion acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageProcessed {
    pub request_id: RequestId,
    pub document_id: DocumentId,
    pub page_id: PageId,
}
