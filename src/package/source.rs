//! Page text collaborators
//!
//! A [`PageSource`] turns a drawing file into [`PageText`] pages. The built-in
//! [`TextExportSource`] reads pdftotext-style exports. A [`VisionSource`] may
//! additionally read the title block from the rendered page; it is optional and
//! a missing reading never fails a scan.

use std::path::{Path, PathBuf};

use crate::core::error::ScanError;
use crate::core::page::PageText;
use crate::extract::TitleBlockInfo;

/// Supplies page text for drawing files
pub trait PageSource: Send + Sync {
    /// Name of the backend, for diagnostics
    fn backend_name(&self) -> &str;

    /// Whether a scan should hand this file to the source
    fn accepts(&self, path: &Path) -> bool;

    /// Read every page of a drawing
    fn read_pages(&self, path: &Path) -> Result<Vec<PageText>, ScanError>;

    /// Path recorded as the drawing's source PDF
    fn drawing_path(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// Reads `.txt` exports produced by `pdftotext -layout`, pages separated by form feeds.
///
/// Given a `.pdf`, the export is looked up next to it with a `.txt` extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExportSource;

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(ext))
}

impl PageSource for TextExportSource {
    fn backend_name(&self) -> &str {
        "pdftotext export"
    }

    fn accepts(&self, path: &Path) -> bool {
        has_extension(path, "txt")
    }

    fn read_pages(&self, path: &Path) -> Result<Vec<PageText>, ScanError> {
        let export = if has_extension(path, "pdf") {
            let sibling = path.with_extension("txt");
            if !sibling.is_file() {
                return Err(ScanError::NoPageText(path.to_path_buf()));
            }
            sibling
        } else {
            path.to_path_buf()
        };

        let bytes = std::fs::read(&export).map_err(|e| ScanError::io(&export, e))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(PageText::split_export(&text))
    }

    fn drawing_path(&self, path: &Path) -> PathBuf {
        if has_extension(path, "txt") {
            let pdf = path.with_extension("pdf");
            if pdf.is_file() {
                return pdf;
            }
        }
        path.to_path_buf()
    }
}

/// Reads title block fields from a rendered page image
pub trait VisionSource: Send + Sync {
    fn backend_name(&self) -> &str;

    /// Title block as read by the vision model; None when unavailable
    fn read_title_block(&self, drawing: &Path, page: &PageText) -> Option<TitleBlockInfo>;
}
