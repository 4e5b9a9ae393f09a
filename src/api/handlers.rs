use super::types::*;
use crate::messaging::protocol::PageProcessed;
use crate::pipeline::dispatcher::{Dispatcher, Upload};
use crate::pipeline::notify::{AwaitOutcome, CompletionMonitor};
use crate::pipeline::receiver::{CompletionReceiver, ReceiveOutcome};
use crate::tracking::types::{RequestId, TrackingError};

use axum::extract::{Multipart, Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use std::sync::Arc;
use std::time::Duration;

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn tracking_error_response(err: TrackingError) -> Response {
    match err {
        TrackingError::NotFound { .. } => error_response(StatusCode::NOT_FOUND, err),
        _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

pub async fn handle_upload(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    mut multipart: Multipart,
) -> Response {
    let mut uploads = Vec::new();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let Some(filename) = field.file_name().map(str::to_string) else {
                    tracing::debug!("Skipping multipart field without a file name");
                    continue;
                };
                match field.bytes().await {
                    Ok(bytes) => uploads.push(Upload {
                        filename,
                        bytes: bytes.to_vec(),
                    }),
                    Err(e) => {
                        tracing::warn!("Failed to read upload {}: {}", filename, e);
                        return error_response(StatusCode::BAD_REQUEST, e);
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Malformed multipart upload: {}", e);
                return error_response(StatusCode::BAD_REQUEST, e);
            }
        }
    }

    if uploads.is_empty() {
        tracing::warn!("No files were uploaded");
        return error_response(StatusCode::BAD_REQUEST, "No files were uploaded");
    }

    let file_count = uploads.len();
    let (total_size_bytes, extensions) = summarize_uploads(&uploads);

    let dispatch = match dispatcher.submit_request(uploads).await {
        Ok(dispatch) => dispatch,
        Err(e) => {
            tracing::error!("Failed to dispatch upload: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e);
        }
    };

    tracing::info!(
        "FileUpload processed: {} files, total size: {} bytes, extensions: {}",
        file_count,
        total_size_bytes,
        extensions
            .iter()
            .map(|e| format!("{} ({})", e.extension, e.count))
            .collect::<Vec<_>>()
            .join(", ")
    );

    (
        StatusCode::OK,
        Json(UploadSummary {
            request_id: dispatch.request_id.clone(),
            file_count,
            total_size_bytes,
            total_size_mb: to_megabytes(total_size_bytes),
            extensions,
            documents: dispatch.documents.iter().map(DocumentSummary::from).collect(),
            failed_documents: dispatch.failed_documents,
        }),
    )
        .into_response()
}

/// Always answers 200: a stale or duplicate acknowledgement is not the
/// sender's error, and a failure status would only trigger redelivery.
pub async fn handle_page_processed(
    Extension(receiver): Extension<Arc<CompletionReceiver>>,
    Json(msg): Json<PageProcessed>,
) -> (StatusCode, Json<ProcessedResponse>) {
    let outcome = match receiver.on_page_processed(&msg) {
        ReceiveOutcome::Marked { .. } => "marked",
        ReceiveOutcome::Duplicate => "duplicate",
        ReceiveOutcome::Unknown => "unknown",
    };

    (
        StatusCode::OK,
        Json(ProcessedResponse {
            outcome: outcome.to_string(),
        }),
    )
}

pub async fn handle_get_status(
    Extension(monitor): Extension<Arc<CompletionMonitor>>,
    Path(request_id): Path<String>,
) -> Response {
    match monitor.get_status(&RequestId(request_id)) {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => tracking_error_response(e),
    }
}

pub async fn handle_await(
    Extension(monitor): Extension<Arc<CompletionMonitor>>,
    Path(request_id): Path<String>,
    Query(params): Query<AwaitParams>,
) -> Response {
    let request_id = RequestId(request_id);
    let timeout_ms = params
        .timeout_ms
        .unwrap_or(DEFAULT_AWAIT_TIMEOUT_MS)
        .min(MAX_AWAIT_TIMEOUT_MS);

    let outcome = match monitor
        .await_request(&request_id, Duration::from_millis(timeout_ms))
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return tracking_error_response(e),
    };

    let status_code = match outcome {
        AwaitOutcome::Finished => StatusCode::OK,
        AwaitOutcome::TimedOut => StatusCode::REQUEST_TIMEOUT,
    };

    (
        status_code,
        Json(AwaitResponse {
            outcome,
            status: monitor.get_status(&request_id).ok(),
        }),
    )
        .into_response()
}

pub async fn handle_evict(
    Extension(monitor): Extension<Arc<CompletionMonitor>>,
    Path(request_id): Path<String>,
) -> Response {
    match monitor.evict(&RequestId(request_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => tracking_error_response(e),
    }
}
