//! Splitter Registry
//!
//! Maps lowercase file extensions (e.g. "pdf") to the splitter that handles
//! them, so the dispatcher never hardcodes format logic.

use super::pdf::PdfSplitter;
use super::text::TextSplitter;
use super::types::*;

use dashmap::DashMap;
use std::sync::Arc;

/// Registry holding the mapping between file extensions and splitters.
pub struct SplitterRegistry {
    splitters: DashMap<String, Arc<dyn DocumentSplitter>>,
}

impl SplitterRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registry with the built-in formats: `pdf`, `txt`.
    pub fn with_defaults() -> Arc<Self> {
        let registry = Self::default();
        registry.register("pdf", PdfSplitter);
        registry.register("txt", TextSplitter);
        Arc::new(registry)
    }

    /// Registers a splitter under an extension. A leading dot is ignored and
    /// the match is case-insensitive.
    pub fn register<S>(&self, extension: &str, splitter: S)
    where
        S: DocumentSplitter + 'static,
    {
        let key = extension.trim_start_matches('.').to_ascii_lowercase();
        tracing::info!("Registered {} splitter for .{}", splitter.name(), key);
        self.splitters.insert(key, Arc::new(splitter));
    }

    /// Looks up the splitter for `filename` by extension and runs it.
    ///
    /// # Returns
    /// * `Ok(pages)` in page order.
    /// * `Err(UnsupportedFormat)` if no splitter is registered for the extension.
    /// * `Err(CorruptInput)` if the splitter rejected the bytes.
    pub fn split(&self, filename: &str, bytes: &[u8]) -> Result<Vec<PageUnit>, SplitError> {
        let extension = file_extension(filename)
            .ok_or_else(|| SplitError::UnsupportedFormat(format!("{} has no extension", filename)))?;

        // Clone the Arc out so the shard guard is not held while splitting.
        let splitter = self
            .splitters
            .get(&extension)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SplitError::UnsupportedFormat(format!(".{}", extension)))?;

        tracing::debug!(
            "Splitting {} with {} splitter ({} bytes)",
            filename,
            splitter.name(),
            bytes.len()
        );

        splitter.split(bytes)
    }

    /// Returns all registered extensions, sorted.
    pub fn list_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self
            .splitters
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        formats.sort();
        formats
    }

    pub fn has_format(&self, extension: &str) -> bool {
        self.splitters
            .contains_key(&extension.trim_start_matches('.').to_ascii_lowercase())
    }
}

impl Default for SplitterRegistry {
    fn default() -> Self {
        Self {
            splitters: DashMap::new(),
        }
    }
}
