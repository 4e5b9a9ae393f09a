//! Completion Tracking Module
//!
//! Holds the in-memory `Request -> Document -> Page` hierarchy used to decide
//! when a fanned-out upload has been fully processed.
//!
//! ## Core Concepts
//! - **Identity**: `RequestId`, `DocumentId` and `PageId` are UUID-backed newtypes.
//!   Every completion notification carries all three, so lookups never need
//!   back-pointers.
//! - **Derived state**: a document is finished when all its pages are; a request
//!   when all its documents are. Only pages carry a stored flag.
//! - **Monotonicity**: pages only ever go from unfinished to finished. Repeated
//!   and unknown notifications leave the tree untouched.
//! - **Granularity**: each request subtree has its own lock.
//!
//! ## Submodules
//! - **`types`**: ids, node structures, snapshots, status DTOs and `TrackingError`.
//! - **`tree`**: the concurrent `CompletionTree` registry.

pub mod tree;
pub mod types;

#[cfg(test)]
mod tests;
