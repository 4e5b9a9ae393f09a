//! Splitting Types
//!
//! The contract every document format implements, the page unit it produces,
//! and the failures it may report.

use std::path::Path;

/// One decomposed page of a document.
///
/// `content` is opaque to the tracking core: for PDFs it is a standalone
/// single-page PDF, for text it is the UTF-8 bytes of that page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageUnit {
    /// 1-based page number within the source document.
    pub page_number: u32,
    pub content: Vec<u8>,
}

/// Why a document could not be decomposed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplitError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt input: {0}")]
    CorruptInput(String),
}

/// A format-specific page splitter.
///
/// Implementations must be pure: they either return every page in order or
/// fail without side effects. A document with zero pages is `CorruptInput`.
pub trait DocumentSplitter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn split(&self, bytes: &[u8]) -> Result<Vec<PageUnit>, SplitError>;
}

/// Lowercase extension of `filename` without the leading dot.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}
