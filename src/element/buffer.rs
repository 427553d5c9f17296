use std::sync::{PoisonError, RwLock};

use crate::error::ImageError;

use super::ImageSource;

/// Live multi-row text backing a window or the input area. Each row is
/// rendered followed by a newline.
#[derive(Debug, Default)]
pub struct TextBuffer {
    rows: RwLock<Vec<String>>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: &str) -> Self {
        let buffer = Self::new();
        buffer.add_text(text);
        buffer
    }

    /// Append `text`, one row per line.
    pub fn add_text(&self, text: &str) {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        rows.extend(text.lines().map(str::to_string));
    }

    pub fn set_text(&self, text: &str) {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        rows.clear();
        rows.extend(text.lines().map(str::to_string));
    }

    pub fn clear_text(&self) {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn row_count(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn text(&self) -> String {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();
        for row in rows.iter() {
            out.push_str(row);
            out.push('\n');
        }
        out
    }
}

impl ImageSource for TextBuffer {
    fn image(&self) -> Result<String, ImageError> {
        Ok(self.text())
    }
}
