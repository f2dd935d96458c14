//! GD&T callout extraction and severity classification
//!
//! Feature control frames arrive as flattened text, either as canonical
//! phrases ("TRUE POSITION .005 MMC A B") or as the Unicode characteristic
//! symbols ("⌖ Ø.005 Ⓜ A B"). Each characteristic family has its own tier
//! ladder; values are in inches.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{parse_number, static_regex};
use crate::analysis::iso::mm_to_in;
use crate::core::types::{
    CostFlag, CostImpact, DrawingUnits, RoutingHint, RoutingOperation, ToleranceTier,
};

/// GD&T geometric characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GdtFeatureType {
    Position,
    Flatness,
    Perpendicularity,
    Parallelism,
    Concentricity,
    CircularRunout,
    TotalRunout,
    ProfileOfSurface,
    ProfileOfLine,
    Straightness,
    Circularity,
    Cylindricity,
    Angularity,
}

/// Tolerance family sharing one tier ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GdtFamily {
    Location,
    Profile,
    Form,
    Orientation,
    Runout,
}

impl GdtFeatureType {
    pub fn family(self) -> GdtFamily {
        match self {
            GdtFeatureType::Position => GdtFamily::Location,
            GdtFeatureType::ProfileOfSurface | GdtFeatureType::ProfileOfLine => GdtFamily::Profile,
            GdtFeatureType::Flatness
            | GdtFeatureType::Straightness
            | GdtFeatureType::Circularity
            | GdtFeatureType::Cylindricity => GdtFamily::Form,
            GdtFeatureType::Perpendicularity
            | GdtFeatureType::Parallelism
            | GdtFeatureType::Angularity => GdtFamily::Orientation,
            GdtFeatureType::Concentricity
            | GdtFeatureType::CircularRunout
            | GdtFeatureType::TotalRunout => GdtFamily::Runout,
        }
    }

    /// Form tolerances are never related to datums
    pub fn uses_datums(self) -> bool {
        self.family() != GdtFamily::Form
    }

    /// Canonical drawing label
    pub fn label(self) -> &'static str {
        match self {
            GdtFeatureType::Position => "POSITION",
            GdtFeatureType::Flatness => "FLATNESS",
            GdtFeatureType::Perpendicularity => "PERPENDICULARITY",
            GdtFeatureType::Parallelism => "PARALLELISM",
            GdtFeatureType::Concentricity => "CONCENTRICITY",
            GdtFeatureType::CircularRunout => "CIRCULAR RUNOUT",
            GdtFeatureType::TotalRunout => "TOTAL RUNOUT",
            GdtFeatureType::ProfileOfSurface => "PROFILE OF A SURFACE",
            GdtFeatureType::ProfileOfLine => "PROFILE OF A LINE",
            GdtFeatureType::Straightness => "STRAIGHTNESS",
            GdtFeatureType::Circularity => "CIRCULARITY",
            GdtFeatureType::Cylindricity => "CYLINDRICITY",
            GdtFeatureType::Angularity => "ANGULARITY",
        }
    }
}

impl std::fmt::Display for GdtFeatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label().to_lowercase().replace(' ', "_"))
    }
}

/// A parsed feature control frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GdtCallout {
    pub feature_type: GdtFeatureType,

    /// Tolerance zone size in inches
    pub tolerance_value: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datum_references: Vec<String>,

    #[serde(default)]
    pub is_mmc: bool,

    #[serde(default)]
    pub is_lmc: bool,

    #[serde(default)]
    pub is_diametral: bool,

    pub tier: ToleranceTier,

    pub impact: CostImpact,

    /// Source text of the callout
    pub raw_text: String,
}

impl GdtCallout {
    fn describe(&self) -> String {
        let mut text = format!("{} {:.4}", self.feature_type.label(), self.tolerance_value);
        if self.is_mmc {
            text.push_str(" MMC");
        } else if self.is_lmc {
            text.push_str(" LMC");
        }
        for datum in &self.datum_references {
            text.push(' ');
            text.push_str(datum);
        }
        text
    }
}

/// Position tier; MMC bonus tolerance widens the effective zone by half
pub fn classify_position_tier(value: f64, is_mmc: bool) -> ToleranceTier {
    let effective = if is_mmc { value * 1.5 } else { value };
    ladder(effective, 0.002, 0.005, 0.010)
}

pub fn classify_profile_tier(value: f64) -> ToleranceTier {
    ladder(value, 0.002, 0.005, 0.010)
}

pub fn classify_form_tier(value: f64) -> ToleranceTier {
    ladder(value, 0.001, 0.002, 0.005)
}

pub fn classify_orientation_tier(value: f64) -> ToleranceTier {
    ladder(value, 0.001, 0.003, 0.008)
}

pub fn classify_runout_tier(value: f64) -> ToleranceTier {
    ladder(value, 0.0005, 0.002, 0.005)
}

/// Tier for any characteristic, dispatching to its family ladder
pub fn classify_tier(feature_type: GdtFeatureType, value: f64, is_mmc: bool) -> ToleranceTier {
    match feature_type.family() {
        GdtFamily::Location => classify_position_tier(value, is_mmc),
        GdtFamily::Profile => classify_profile_tier(value),
        GdtFamily::Form => classify_form_tier(value),
        GdtFamily::Orientation => classify_orientation_tier(value),
        GdtFamily::Runout => classify_runout_tier(value),
    }
}

fn ladder(value: f64, precision: f64, tight: f64, moderate: f64) -> ToleranceTier {
    if value <= precision {
        ToleranceTier::Precision
    } else if value <= tight {
        ToleranceTier::Tight
    } else if value <= moderate {
        ToleranceTier::Moderate
    } else {
        ToleranceTier::Standard
    }
}

static CHARACTERISTIC: Lazy<Regex> = Lazy::new(|| {
    static_regex(concat!(
        r"(?i)(?P<position>\bTRUE[ \t]+POSITION\b|\bPOSITION(?:AL)?\b|⌖)",
        r"|(?P<flatness>\bFLATNESS\b|\bFLAT[ \t]+WITHIN\b|⏥)",
        r"|(?P<perpendicularity>\bPERPENDICULARITY\b|\bPERPENDICULAR[ \t]+(?:TO|WITHIN)\b|⟂|⊥)",
        r"|(?P<parallelism>\bPARALLELISM\b|\bPARALLEL[ \t]+(?:TO|WITHIN)\b|∥)",
        r"|(?P<concentricity>\bCONCENTRICITY\b|◎)",
        r"|(?P<total_runout>\bTOTAL[ \t]+RUNOUT\b|⌰)",
        r"|(?P<circular_runout>\b(?:CIRCULAR[ \t]+)?RUNOUT\b|↗)",
        r"|(?P<profile_surface>\bPROFILE[ \t]+OF[ \t]+(?:A[ \t]+)?SURFACE\b|⌓)",
        r"|(?P<profile_line>\bPROFILE[ \t]+OF[ \t]+(?:A[ \t]+)?LINE\b|⌒)",
        r"|(?P<straightness>\bSTRAIGHTNESS\b|⏤)",
        r"|(?P<circularity>\bCIRCULARITY\b|\bROUNDNESS\b|○)",
        r"|(?P<cylindricity>\bCYLINDRICITY\b|⌭)",
        r"|(?P<angularity>\bANGULARITY\b|∠)",
    ))
});

const GROUPS: [(&str, GdtFeatureType); 13] = [
    ("position", GdtFeatureType::Position),
    ("flatness", GdtFeatureType::Flatness),
    ("perpendicularity", GdtFeatureType::Perpendicularity),
    ("parallelism", GdtFeatureType::Parallelism),
    ("concentricity", GdtFeatureType::Concentricity),
    ("total_runout", GdtFeatureType::TotalRunout),
    ("circular_runout", GdtFeatureType::CircularRunout),
    ("profile_surface", GdtFeatureType::ProfileOfSurface),
    ("profile_line", GdtFeatureType::ProfileOfLine),
    ("straightness", GdtFeatureType::Straightness),
    ("circularity", GdtFeatureType::Circularity),
    ("cylindricity", GdtFeatureType::Cylindricity),
    ("angularity", GdtFeatureType::Angularity),
];

/// Numeric token; a trailing X marks a feature count ("4X") rather than a tolerance
static NUMBER: Lazy<Regex> =
    Lazy::new(|| static_regex(r"(?i)(\d*\.\d+|\d+(?:\.\d+)?)([ \t]*X\b)?"));
static DIAMETRAL: Lazy<Regex> = Lazy::new(|| static_regex(r"(?i)Ø|⌀|\bDIA\b"));
static MMC: Lazy<Regex> = Lazy::new(|| static_regex(r"(?i)\bMMC\b|Ⓜ|\(M\)"));
static LMC: Lazy<Regex> = Lazy::new(|| static_regex(r"(?i)\bLMC\b|Ⓛ|\(L\)"));
static METRIC: Lazy<Regex> = Lazy::new(|| static_regex(r"(?i)\d[ \t]*MM\b"));
static DATUM: Lazy<Regex> = Lazy::new(|| static_regex(r"\b([A-HJ-NPR-Z])\b"));

/// Longest stretch of text after a characteristic that may belong to its frame
const MAX_FRAME_TAIL: usize = 60;
const MAX_DATUMS: usize = 3;

/// Extracts GD&T callouts from page text
pub struct GdtExtractor;

impl GdtExtractor {
    /// Extract distinct callouts, tightest first. Values read as inches unless marked MM.
    pub fn extract(text: &str) -> Vec<GdtCallout> {
        Self::extract_with_units(text, DrawingUnits::Inch)
    }

    /// Extract callouts from a page whose dimensions are in `units`
    pub fn extract_with_units(text: &str, units: DrawingUnits) -> Vec<GdtCallout> {
        let mut callouts = Vec::new();
        let mut seen = HashSet::new();

        for line in text.lines() {
            let matches: Vec<_> = CHARACTERISTIC.captures_iter(line).collect();
            for (i, caps) in matches.iter().enumerate() {
                let Some(whole) = caps.get(0) else { continue };
                let Some(feature_type) = GROUPS
                    .iter()
                    .find(|(name, _)| caps.name(name).is_some())
                    .map(|(_, t)| *t)
                else {
                    continue;
                };

                let tail_end = matches
                    .get(i + 1)
                    .and_then(|next| next.get(0))
                    .map_or(line.len(), |m| m.start());
                let tail = clip(&line[whole.end()..tail_end], MAX_FRAME_TAIL);

                let Some(callout) = parse_frame(feature_type, whole.as_str(), tail, units) else {
                    tracing::debug!("Skipping GD&T callout without a usable value: {}", whole.as_str());
                    continue;
                };
                let key = (callout.feature_type, (callout.tolerance_value * 1e6).round() as i64);
                if seen.insert(key) {
                    callouts.push(callout);
                }
            }
        }

        callouts.sort_by(|a, b| {
            b.tier.cmp(&a.tier).then(
                a.tolerance_value
                    .partial_cmp(&b.tolerance_value)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });
        callouts
    }

    /// Cost flags for callouts at Moderate or tighter
    pub fn to_cost_flags(callouts: &[GdtCallout]) -> Vec<CostFlag> {
        callouts
            .iter()
            .filter(|c| c.tier.is_cost_relevant())
            .map(|c| {
                CostFlag::new(
                    "GD&T",
                    format!("{} ({} tier)", c.describe(), c.tier),
                    c.impact,
                )
            })
            .collect()
    }

    /// Inspection, fixturing and review hints for tight callouts
    pub fn to_routing_hints(callouts: &[GdtCallout]) -> Vec<RoutingHint> {
        let tight: Vec<&GdtCallout> = callouts
            .iter()
            .filter(|c| c.tier >= ToleranceTier::Tight)
            .collect();
        if tight.is_empty() {
            return Vec::new();
        }

        let listing = tight
            .iter()
            .map(|c| c.describe())
            .collect::<Vec<_>>()
            .join("; ");

        let mut hints = vec![
            RoutingHint::new(
                RoutingOperation::Inspect,
                Some("CMM"),
                format!("CMM INSPECT: {}", listing),
                0.85,
            ),
            RoutingHint::new(
                RoutingOperation::Fixture,
                Some("MACHINE"),
                format!("FIXTURE REQUIRED: {}", listing),
                0.75,
            ),
        ];

        if tight.len() >= 2 {
            hints.push(RoutingHint::new(
                RoutingOperation::Review,
                None,
                format!(
                    "MULTIPLE TIGHT GD&T: {} callouts at tight or precision tier",
                    tight.len()
                ),
                0.9,
            ));
        }

        hints
    }
}

fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn parse_frame(
    feature_type: GdtFeatureType,
    keyword: &str,
    tail: &str,
    units: DrawingUnits,
) -> Option<GdtCallout> {
    let number = NUMBER
        .captures_iter(tail)
        .find(|caps| caps.get(2).is_none())?;
    let value_match = number.get(1)?;
    let mut value = parse_number(value_match.as_str())?;

    if units == DrawingUnits::Millimeter || METRIC.is_match(tail) {
        value = mm_to_in(value);
    }
    if value <= 0.0 || value > 1.0 {
        return None;
    }

    let is_mmc = MMC.is_match(tail);
    let is_lmc = !is_mmc && LMC.is_match(tail);
    let is_diametral = DIAMETRAL.is_match(tail);

    let datum_references = if feature_type.uses_datums() {
        let after_value = &tail[value_match.end()..];
        let cleaned = MMC.replace_all(after_value, " ");
        let cleaned = LMC.replace_all(&cleaned, " ");
        let mut datums: Vec<String> = Vec::new();
        for caps in DATUM.captures_iter(&cleaned) {
            let datum = caps[1].to_string();
            if !datums.contains(&datum) {
                datums.push(datum);
            }
            if datums.len() == MAX_DATUMS {
                break;
            }
        }
        datums
    } else {
        Vec::new()
    };

    let tier = classify_tier(feature_type, value, is_mmc);
    Some(GdtCallout {
        feature_type,
        tolerance_value: value,
        datum_references,
        is_mmc,
        is_lmc,
        is_diametral,
        tier,
        impact: tier.cost_impact(),
        raw_text: format!("{}{}", keyword, tail).trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_true_position_mmc() {
        let callouts = GdtExtractor::extract("TRUE POSITION .005 MMC A B");
        assert_eq!(callouts.len(), 1);
        let c = &callouts[0];
        assert_eq!(c.feature_type, GdtFeatureType::Position);
        assert!((c.tolerance_value - 0.005).abs() < 1e-12);
        assert!(c.is_mmc);
        assert_eq!(c.datum_references, vec!["A", "B"]);
        assert_eq!(c.tier, ToleranceTier::Moderate);
    }

    #[test]
    fn test_flatness_standard_has_no_flags() {
        let callouts = GdtExtractor::extract("FLATNESS .010");
        assert_eq!(callouts.len(), 1);
        assert_eq!(callouts[0].tier, ToleranceTier::Standard);
        assert_eq!(callouts[0].impact, CostImpact::None);
        assert!(GdtExtractor::to_cost_flags(&callouts).is_empty());
    }

    #[test]
    fn test_mmc_multiplier_never_tightens() {
        let mut value = 0.0005;
        while value < 0.02 {
            let plain = classify_position_tier(value, false);
            let mmc = classify_position_tier(value, true);
            assert!(mmc <= plain, "value {value}");
            value += 0.0005;
        }
        // .004 alone is Tight; with MMC the effective .006 is Moderate
        assert_eq!(classify_position_tier(0.004, false), ToleranceTier::Tight);
        assert_eq!(classify_position_tier(0.004, true), ToleranceTier::Moderate);
    }

    #[test]
    fn test_family_ladders_are_distinct() {
        // Same value, different verdicts per family
        assert_eq!(classify_runout_tier(0.001), ToleranceTier::Tight);
        assert_eq!(classify_form_tier(0.001), ToleranceTier::Precision);
        assert_eq!(classify_orientation_tier(0.006), ToleranceTier::Moderate);
        assert_eq!(classify_form_tier(0.006), ToleranceTier::Standard);
        assert_eq!(classify_profile_tier(0.010), ToleranceTier::Moderate);
    }

    #[test]
    fn test_symbols_and_modifiers() {
        let callouts = GdtExtractor::extract("⌖ Ø.002 Ⓜ A B C\n⏥ .0005");
        assert_eq!(callouts.len(), 2);
        let position = callouts
            .iter()
            .find(|c| c.feature_type == GdtFeatureType::Position)
            .unwrap();
        assert!(position.is_diametral);
        assert!(position.is_mmc);
        assert_eq!(position.datum_references, vec!["A", "B", "C"]);

        let flat = callouts
            .iter()
            .find(|c| c.feature_type == GdtFeatureType::Flatness)
            .unwrap();
        assert!(flat.datum_references.is_empty());
        assert_eq!(flat.tier, ToleranceTier::Precision);
    }

    #[test]
    fn test_total_runout_is_not_circular() {
        let callouts = GdtExtractor::extract("TOTAL RUNOUT .001 A\nRUNOUT .003 A");
        let types: Vec<_> = callouts.iter().map(|c| c.feature_type).collect();
        assert!(types.contains(&GdtFeatureType::TotalRunout));
        assert!(types.contains(&GdtFeatureType::CircularRunout));
    }

    #[test]
    fn test_feature_count_is_not_the_value() {
        let callouts = GdtExtractor::extract("4X POSITION 4X Ø.010 A B");
        assert_eq!(callouts.len(), 1);
        assert!((callouts[0].tolerance_value - 0.010).abs() < 1e-12);
    }

    #[test]
    fn test_metric_value_converted() {
        let callouts = GdtExtractor::extract("PROFILE OF A SURFACE 0.25 MM A");
        assert_eq!(callouts[0].feature_type, GdtFeatureType::ProfileOfSurface);
        assert!((callouts[0].tolerance_value - 0.25 / 25.4).abs() < 1e-9);
    }

    #[test]
    fn test_metric_page_converts_every_value() {
        let text = "FLATNESS 0.05\nPOSITION Ø0.1 A B";
        let inch = GdtExtractor::extract(text);
        assert!(inch.iter().all(|c| c.tier == ToleranceTier::Standard));

        let callouts = GdtExtractor::extract_with_units(text, DrawingUnits::Millimeter);
        assert_eq!(callouts.len(), 2);
        let flatness = callouts
            .iter()
            .find(|c| c.feature_type == GdtFeatureType::Flatness)
            .unwrap();
        assert!((flatness.tolerance_value - 0.05 / 25.4).abs() < 1e-9);
        assert_eq!(flatness.tier, ToleranceTier::Tight);
        let position = callouts
            .iter()
            .find(|c| c.feature_type == GdtFeatureType::Position)
            .unwrap();
        assert!((position.tolerance_value - 0.1 / 25.4).abs() < 1e-9);
        assert_eq!(position.tier, ToleranceTier::Tight);
    }

    #[test]
    fn test_dedup_and_sort_tightest_first() {
        let text = "FLATNESS .010\nPERPENDICULARITY .001 A\nFLATNESS .010\nPOSITION .003 A B";
        let callouts = GdtExtractor::extract(text);
        assert_eq!(callouts.len(), 3);
        assert_eq!(callouts[0].feature_type, GdtFeatureType::Perpendicularity);
        assert_eq!(callouts[0].tier, ToleranceTier::Precision);
        assert_eq!(callouts[2].feature_type, GdtFeatureType::Flatness);
        assert_eq!(GdtExtractor::extract(text), callouts);
    }

    #[test]
    fn test_keyword_without_value_is_skipped() {
        assert!(GdtExtractor::extract("POSITION BRACKET AS SHOWN").is_empty());
    }

    #[test]
    fn test_routing_hints_for_tight_callouts() {
        let single = GdtExtractor::extract("POSITION .002 A B C");
        let hints = GdtExtractor::to_routing_hints(&single);
        assert_eq!(hints.len(), 2);
        assert_eq!(hints[0].operation, RoutingOperation::Inspect);
        assert_eq!(hints[0].work_center.as_deref(), Some("CMM"));
        assert_eq!(hints[1].operation, RoutingOperation::Fixture);

        let multiple = GdtExtractor::extract("POSITION .002 A B C\nFLATNESS .001");
        let hints = GdtExtractor::to_routing_hints(&multiple);
        assert_eq!(hints.len(), 3);
        assert!(hints[2].note_text.starts_with("MULTIPLE TIGHT GD&T"));
    }

    #[test]
    fn test_moderate_callouts_get_flags_but_no_hints() {
        let callouts = GdtExtractor::extract("TRUE POSITION .005 MMC A B");
        assert_eq!(GdtExtractor::to_cost_flags(&callouts).len(), 1);
        assert!(GdtExtractor::to_routing_hints(&callouts).is_empty());
    }
}
