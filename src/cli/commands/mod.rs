//! CLI command implementations

pub mod analyze;
pub mod completions;
pub mod drawing;
pub mod match_components;
pub mod reconcile;
pub mod scan;
