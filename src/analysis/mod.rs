//! Cross-cutting analysis over extracted facts
//!
//! - [`iso`] - ISO 13920 / ISO 2768 general tolerance tables
//! - [`fabrication`] - shop capability and machining classification
//! - [`confidence`] - text/vision confidence calibration and coverage checks

pub mod confidence;
pub mod fabrication;
pub mod iso;

pub use confidence::{check_coverage_density, cross_validate_confidence, CoverageAssessment};
pub use fabrication::{
    FabricationResult, FabricationTier, FabricationToleranceClassifier, GdtFabTier, ShopProfile,
    StackupRisk,
};
pub use iso::{
    in_to_mm, mm_to_in, Iso13920GeometricClass, Iso13920LinearClass, Iso2768Class,
    IsoToleranceStandard, UnknownClassError,
};
