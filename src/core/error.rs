//! Error types for I/O at the library boundary

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading a drawing package
#[derive(Debug, Error, Diagnostic)]
pub enum ScanError {
    #[error("Failed to read {path}: {source}")]
    #[diagnostic(code(drawscan::scan::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a directory: {0}")]
    #[diagnostic(
        code(drawscan::scan::not_a_directory),
        help("Pass the folder that holds the drawing PDFs or their text exports")
    )]
    NotADirectory(PathBuf),

    #[error("No page text available for {0}")]
    #[diagnostic(
        code(drawscan::scan::no_text),
        help("Export page text next to the PDF, e.g. `pdftotext -layout drawing.pdf drawing.txt`")
    )]
    NoPageText(PathBuf),
}

impl ScanError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }
}
