//! Shared classification types - tiers, cost impact, cost flags, routing hints

use serde::{Deserialize, Serialize};

/// Tolerance severity tier, ordered loosest to tightest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceTier {
    #[default]
    Standard,
    Moderate,
    Tight,
    Precision,
}

impl ToleranceTier {
    /// Cost impact carried by a requirement at this tier
    pub fn cost_impact(self) -> CostImpact {
        match self {
            ToleranceTier::Standard => CostImpact::None,
            ToleranceTier::Moderate => CostImpact::Medium,
            ToleranceTier::Tight => CostImpact::High,
            ToleranceTier::Precision => CostImpact::Critical,
        }
    }

    /// Whether a requirement at this tier should raise a cost flag
    pub fn is_cost_relevant(self) -> bool {
        self >= ToleranceTier::Moderate
    }
}

impl std::fmt::Display for ToleranceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToleranceTier::Standard => write!(f, "standard"),
            ToleranceTier::Moderate => write!(f, "moderate"),
            ToleranceTier::Tight => write!(f, "tight"),
            ToleranceTier::Precision => write!(f, "precision"),
        }
    }
}

/// Cost impact of a flagged requirement
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum CostImpact {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for CostImpact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostImpact::None => write!(f, "none"),
            CostImpact::Low => write!(f, "low"),
            CostImpact::Medium => write!(f, "medium"),
            CostImpact::High => write!(f, "high"),
            CostImpact::Critical => write!(f, "critical"),
        }
    }
}

/// A cost-relevant finding, tagged with the extractor that raised it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostFlag {
    /// Attribution tag (e.g. "GD&T", "DIMENSION", "ISO 13920")
    pub source: String,

    /// Human-readable description of the finding
    pub description: String,

    /// Estimated cost impact
    pub impact: CostImpact,
}

impl CostFlag {
    pub fn new(source: impl Into<String>, description: impl Into<String>, impact: CostImpact) -> Self {
        Self {
            source: source.into(),
            description: description.into(),
            impact,
        }
    }
}

/// Routing operation proposed for a shop traveler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingOperation {
    Deburr,
    Weld,
    OutsideProcess,
    ProcessOverride,
    Inspect,
    Hardware,
    Machine,
    Tap,
    Drill,
    Fixture,
    Review,
}

impl std::fmt::Display for RoutingOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingOperation::Deburr => write!(f, "deburr"),
            RoutingOperation::Weld => write!(f, "weld"),
            RoutingOperation::OutsideProcess => write!(f, "outside_process"),
            RoutingOperation::ProcessOverride => write!(f, "process_override"),
            RoutingOperation::Inspect => write!(f, "inspect"),
            RoutingOperation::Hardware => write!(f, "hardware"),
            RoutingOperation::Machine => write!(f, "machine"),
            RoutingOperation::Tap => write!(f, "tap"),
            RoutingOperation::Drill => write!(f, "drill"),
            RoutingOperation::Fixture => write!(f, "fixture"),
            RoutingOperation::Review => write!(f, "review"),
        }
    }
}

/// A proposed routing step derived from drawing content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingHint {
    /// Operation to add or modify
    pub operation: RoutingOperation,

    /// Work center; None for outside processes with no in-house center
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_center: Option<String>,

    /// Drawing text that motivated the hint
    pub note_text: String,

    /// Extraction confidence (0.0 - 1.0)
    pub confidence: f64,
}

impl RoutingHint {
    pub fn new(
        operation: RoutingOperation,
        work_center: Option<&str>,
        note_text: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            operation,
            work_center: work_center.map(str::to_string),
            note_text: note_text.into(),
            confidence,
        }
    }
}

/// Units a drawing is dimensioned in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DrawingUnits {
    #[default]
    Inch,
    Millimeter,
}

impl DrawingUnits {
    /// Convert a value in these units to inches
    pub fn to_inches(self, value: f64) -> f64 {
        match self {
            DrawingUnits::Inch => value,
            DrawingUnits::Millimeter => crate::analysis::iso::mm_to_in(value),
        }
    }
}

impl std::fmt::Display for DrawingUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawingUnits::Inch => write!(f, "in"),
            DrawingUnits::Millimeter => write!(f, "mm"),
        }
    }
}

/// Normalize free text for deduplication: uppercase, single spaces, no trailing punctuation
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(|c: char| c == '.' || c == ',' || c == ';' || c == ':')
        .to_uppercase()
}
