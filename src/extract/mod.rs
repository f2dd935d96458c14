//! Per-page text extractors
//!
//! Each extractor is a stateless transform from page text to structured facts:
//!
//! - [`title_block`] - part identity fields from the title block
//! - [`notes`] - categorized manufacturing notes and their routing hints
//! - [`specs`] - referenced industry specifications
//! - [`gdt`] - GD&T feature control callouts with severity tiers
//! - [`tolerance`] - general/specific tolerances and surface finish
//!
//! Absence is never an error: a page with nothing recognizable yields empty
//! results and zero confidence.

pub mod gdt;
pub mod notes;
pub mod specs;
pub mod title_block;
pub mod tolerance;

pub use gdt::{GdtCallout, GdtExtractor, GdtFeatureType};
pub use notes::{DrawingNote, DrawingNoteExtractor, NoteCategory, RoutingImpact};
pub use specs::{SpecCategory, SpecMatch, SpecRecognizer};
pub use title_block::{TitleBlockField, TitleBlockInfo, TitleBlockParser};
pub use tolerance::{
    DimensionTolerance, GeneralTolerance, SurfaceFinishCallout, SurfaceFinishUnit,
    ToleranceAnalysisResult, ToleranceAnalyzer, ToleranceType,
};

use regex::Regex;

/// Compile a pattern from a static table
pub(crate) fn static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern:?}: {e}"))
}

/// Parse a drawing number such as ".005", "0.005" or "5"
pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let value: f64 = s.trim().parse().ok()?;
    value.is_finite().then_some(value)
}
