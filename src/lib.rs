//! Drawscan: manufacturing intelligence from drawing text
//!
//! Turns the text recovered from PDF engineering drawings into structured,
//! cost-relevant facts: title block identity, categorized notes with routing
//! hints, tolerance and GD&T severity, referenced specifications and an overall
//! fabrication tier. Multi-sheet packages are indexed by part number and
//! matched against CAD components.

pub mod analysis;
pub mod cad;
pub mod cli;
pub mod core;
pub mod extract;
pub mod package;
