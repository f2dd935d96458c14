//! Drawing packages - folders of multi-sheet drawings
//!
//! - [`page`] - per-page analysis and BOM parsing
//! - [`index`] - pages grouped by part number, merged per-part views
//! - [`source`] - page text and vision collaborators
//! - [`scanner`] - folder walking and (optionally parallel) scanning

pub mod index;
pub mod page;
pub mod scanner;
pub mod source;

pub use index::{normalize_part_number, DrawingData, DrawingPackageIndex};
pub use page::{analyze_page, parse_bom, BomEntry, DrawingPageInfo, PageAnalyzer};
pub use scanner::DrawingPackageScanner;
pub use source::{PageSource, TextExportSource, VisionSource};
