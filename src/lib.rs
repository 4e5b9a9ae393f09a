//! Page Fan-out / Fan-in Completion Tracker
//!
//! Splits uploaded multi-page documents into per-page work-items, publishes them
//! to an at-least-once messaging layer, and tracks page acknowledgements until
//! every document, and every upload request, is done.
//!
//! ## Architecture Modules
//! - **`tracking`**: the in-memory `Request -> Document -> Page` completion tree.
//!   Per-request locking, monotonic page transitions, tolerant of duplicate and
//!   stale notifications.
//! - **`splitting`**: format-specific page splitters (PDF via `lopdf`, plain text)
//!   behind an extension registry.
//! - **`messaging`**: the work-item/acknowledgement wire shapes and publishers
//!   (in-process channel, Dapr sidecar).
//! - **`pipeline`**: dispatcher, completion receiver, status/await surface,
//!   simulated worker pool and retention sweeper.
//! - **`api`**: the Axum HTTP surface.
//! - **`config`**: command line / environment configuration.

pub mod api;
pub mod config;
pub mod messaging;
pub mod pipeline;
pub mod splitting;
pub mod tracking;
