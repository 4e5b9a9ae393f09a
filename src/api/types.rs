//! HTTP API Types
//!
//! Endpoints and the JSON bodies served by the upload service.

use crate::pipeline::dispatcher::{DocumentDispatch, Upload};
use crate::pipeline::notify::AwaitOutcome;
use crate::splitting::types::file_extension;
use crate::tracking::types::{FailedDocument, RequestId, RequestStatus};
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Multipart upload of one or more documents.
pub const ENDPOINT_UPLOAD: &str = "/Files";
/// Completion acknowledgement, invoked by workers through the Dapr sidecar.
pub const ENDPOINT_PAGE_PROCESSED: &str = "/FileUploadProcessed";
/// Status (GET) and eviction (DELETE) of one request.
pub const ENDPOINT_REQUEST: &str = "/requests/:request_id";
/// Long-poll until the request is finished.
pub const ENDPOINT_REQUEST_AWAIT: &str = "/requests/:request_id/await";

/// Default and upper bound for `?timeout_ms=` on the await endpoint.
pub const DEFAULT_AWAIT_TIMEOUT_MS: u64 = 30_000;
pub const MAX_AWAIT_TIMEOUT_MS: u64 = 300_000;

// --- Data Transfer Objects ---

/// Response to an upload: reporting only, the completion state lives in the tree.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub request_id: RequestId,
    pub file_count: usize,
    pub total_size_bytes: u64,
    #[serde(rename = "totalSizeMB")]
    pub total_size_mb: f64,
    pub extensions: Vec<ExtensionCount>,
    pub documents: Vec<DocumentSummary>,
    pub failed_documents: Vec<FailedDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionCount {
    pub extension: String,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub document_id: String,
    pub file_name: String,
    pub page_count: usize,
    pub publish_failures: usize,
}

impl From<&DocumentDispatch> for DocumentSummary {
    fn from(dispatch: &DocumentDispatch) -> Self {
        Self {
            document_id: dispatch.document_id.0.clone(),
            file_name: dispatch.filename.clone(),
            page_count: dispatch.page_count,
            publish_failures: dispatch.publish_failures.len(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessedResponse {
    pub outcome: String,
}

#[derive(Debug, Deserialize)]
pub struct AwaitParams {
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwaitResponse {
    pub outcome: AwaitOutcome,
    pub status: Option<RequestStatus>,
}

/// Total size of non-empty files and per-extension counts, in first-seen order.
pub fn summarize_uploads(uploads: &[Upload]) -> (u64, Vec<ExtensionCount>) {
    let mut total = 0u64;
    let mut extensions: Vec<ExtensionCount> = Vec::new();

    for upload in uploads.iter().filter(|u| !u.bytes.is_empty()) {
        total += upload.bytes.len() as u64;

        let Some(ext) = file_extension(&upload.filename) else {
            continue;
        };
        let ext = format!(".{}", ext);
        match extensions.iter_mut().find(|e| e.extension == ext) {
            Some(entry) => entry.count += 1,
            None => extensions.push(ExtensionCount {
                extension: ext,
                count: 1,
            }),
        }
    }

    (total, extensions)
}

/// Bytes to megabytes, rounded to two decimals.
pub fn to_megabytes(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}
