//! CAD-side integration
//!
//! CAD facts arrive as [`ComponentInfo`] and [`PartData`] records from the
//! model walker; this module matches them to drawings and reconciles the two.

pub mod matcher;
pub mod reconcile;

pub use matcher::{
    ComponentDrawingMatcher, ComponentInfo, ComponentMatch, MatchAllResult, MatchMethod,
    MatchResult, PageRef,
};
pub use reconcile::{
    normalize_material, parse_thickness, DataConflict, GapFill, PartData, ReconcileField,
    ReconciliationEngine, ReconciliationResult, RenameSuggestion, THICKNESS_TOLERANCE,
};
