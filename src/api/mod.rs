//! HTTP API Module
//!
//! Inbound surface of the service: document uploads, completion callbacks from
//! workers, and request status/await/eviction. Browser calls are accepted from
//! local origins only.
//!
//! ## Submodules
//! - **`handlers`**: Axum request handlers.
//! - **`types`**: endpoint constants, DTOs and upload summary helpers.

pub mod handlers;
pub mod types;

use crate::pipeline::dispatcher::Dispatcher;
use crate::pipeline::notify::CompletionMonitor;
use crate::pipeline::receiver::CompletionReceiver;
use handlers::*;
use types::*;

use axum::extract::DefaultBodyLimit;
use axum::http::{request, HeaderValue};
use axum::routing::{get, post};
use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Builds the service router.
pub fn build_router(
    dispatcher: Arc<Dispatcher>,
    receiver: Arc<CompletionReceiver>,
    monitor: Arc<CompletionMonitor>,
    max_upload_bytes: usize,
) -> Router {
    Router::new()
        .route(ENDPOINT_UPLOAD, post(handle_upload))
        .route(ENDPOINT_PAGE_PROCESSED, post(handle_page_processed))
        .route(ENDPOINT_REQUEST, get(handle_get_status).delete(handle_evict))
        .route(ENDPOINT_REQUEST_AWAIT, get(handle_await))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(Extension(dispatcher))
        .layer(Extension(receiver))
        .layer(Extension(monitor))
        .layer(local_cors())
}

/// Lets browser front-ends served from the local machine call the API.
fn local_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            |origin: &HeaderValue, _: &request::Parts| is_local_origin(origin),
        ))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// `localhost`, `127.0.0.1` and `*.localhost` origins, any scheme or port.
pub(crate) fn is_local_origin(origin: &HeaderValue) -> bool {
    origin
        .to_str()
        .ok()
        .and_then(|origin| reqwest::Url::parse(origin).ok())
        .and_then(|url| {
            url.host_str().map(|host| {
                host == "localhost" || host == "127.0.0.1" || host.ends_with(".localhost")
            })
        })
        .unwrap_or(false)
}
