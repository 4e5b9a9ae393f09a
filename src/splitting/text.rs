use super::types::{DocumentSplitter, PageUnit, SplitError};

const PAGE_BREAK: char = '\u{000C}';

/// Splits UTF-8 text on form feed characters.
///
/// A trailing form feed does not open an empty last page.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextSplitter;

impl DocumentSplitter for TextSplitter {
    fn name(&self) -> &'static str {
        "text"
    }

    fn split(&self, bytes: &[u8]) -> Result<Vec<PageUnit>, SplitError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| SplitError::CorruptInput(format!("invalid UTF-8: {}", e)))?;

        if text.trim().is_empty() {
            return Err(SplitError::CorruptInput("document has no pages".to_string()));
        }

        let body = text.strip_suffix(PAGE_BREAK).unwrap_or(text);

        Ok(body
            .split(PAGE_BREAK)
            .enumerate()
            .map(|(i, page)| PageUnit {
                page_number: i as u32 + 1,
                content: page.as_bytes().to_vec(),
            })
            .collect())
    }
}
