//! Page text primitive supplied by the PDF text collaborator

use serde::{Deserialize, Serialize};

/// Text recovered from one PDF page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number within the PDF
    pub page_number: u32,

    /// Full extracted text, lines separated by '\n'
    pub full_text: String,

    /// Page width in points (0 when unknown)
    #[serde(default)]
    pub width: f64,

    /// Page height in points (0 when unknown)
    #[serde(default)]
    pub height: f64,
}

impl PageText {
    pub fn new(page_number: u32, full_text: impl Into<String>) -> Self {
        Self {
            page_number,
            full_text: full_text.into(),
            width: 0.0,
            height: 0.0,
        }
    }

    /// Whether the page carries any non-whitespace text
    pub fn has_text(&self) -> bool {
        !self.full_text.trim().is_empty()
    }

    /// Split a pdftotext-style export into pages on form feed characters
    pub fn split_export(text: &str) -> Vec<PageText> {
        let mut pages: Vec<PageText> = text
            .split('\u{000C}')
            .enumerate()
            .map(|(i, chunk)| PageText::new(i as u32 + 1, chunk))
            .collect();

        // pdftotext terminates the last page with a form feed too
        if pages.len() > 1 && pages.last().map_or(false, |p| !p.has_text()) {
            pages.pop();
        }
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_export_pages() {
        let pages = PageText::split_export("PART NO: 1\u{000C}PART NO: 2\u{000C}");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[1].page_number, 2);
        assert!(pages[1].full_text.contains("PART NO: 2"));
    }

    #[test]
    fn test_split_export_single_page() {
        let pages = PageText::split_export("NOTES:\n1. DEBURR");
        assert_eq!(pages.len(), 1);
        assert!(pages[0].has_text());
    }

    #[test]
    fn test_blank_page_has_no_text() {
        assert!(!PageText::new(1, "  \n\t").has_text());
    }
}
