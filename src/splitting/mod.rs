//! Document Splitting Module
//!
//! Turns one uploaded document into an ordered list of page units. Splitting is
//! side-effect free: a document either yields all of its pages or an error, and
//! the dispatcher only registers pages after a successful split.
//!
//! ## Submodules
//! - **`types`**: `PageUnit`, `SplitError` and the `DocumentSplitter` trait.
//! - **`pdf`**: one standalone PDF per page, via `lopdf`.
//! - **`text`**: plain text paginated by form feeds.
//! - **`registry`**: extension-based lookup of splitters.

pub mod pdf;
pub mod registry;
pub mod text;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;
