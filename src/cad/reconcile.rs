//! Reconciling CAD part data with drawing data
//!
//! Fields present in both sources are compared; disagreements are recorded as
//! [`DataConflict`]s for a reviewer and neither side is overwritten. Fields the
//! CAD model lacks are offered as [`GapFill`]s from the drawing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::analysis::confidence::cross_validate_confidence;
use crate::core::types::{normalize_text, RoutingHint};
use crate::extract::{parse_number, static_regex};
use crate::package::index::normalize_part_number;
use crate::package::DrawingData;

/// Thickness difference (in) still treated as agreement
pub const THICKNESS_TOLERANCE: f64 = 0.005;

/// Part facts read from the CAD model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    /// Sheet or plate thickness in inches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f64>,
    #[serde(default = "default_cad_confidence")]
    pub confidence: f64,
}

fn default_cad_confidence() -> f64 {
    0.9
}

impl Default for PartData {
    fn default() -> Self {
        Self {
            file_path: None,
            part_number: None,
            description: None,
            material: None,
            thickness: None,
            confidence: default_cad_confidence(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileField {
    PartNumber,
    Description,
    Material,
    Thickness,
}

impl ReconcileField {
    pub const ALL: [ReconcileField; 4] = [
        ReconcileField::PartNumber,
        ReconcileField::Description,
        ReconcileField::Material,
        ReconcileField::Thickness,
    ];
}

impl std::fmt::Display for ReconcileField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileField::PartNumber => write!(f, "part_number"),
            ReconcileField::Description => write!(f, "description"),
            ReconcileField::Material => write!(f, "material"),
            ReconcileField::Thickness => write!(f, "thickness"),
        }
    }
}

/// CAD and drawing disagree on a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConflict {
    pub field: ReconcileField,
    pub cad_value: String,
    pub drawing_value: String,
}

/// A value the drawing supplies for a field the CAD model lacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFill {
    pub field: ReconcileField,
    pub value: String,
    pub confidence: f64,
}

/// Rename the CAD file to carry the drawing's part number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameSuggestion {
    pub current: PathBuf,
    pub suggested: PathBuf,
    pub part_number: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReconciliationResult {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<DataConflict>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gap_fills: Vec<GapFill>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_suggestions: Vec<RoutingHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_suggestion: Option<RenameSuggestion>,
    pub field_confidence: BTreeMap<ReconcileField, f64>,
}

impl ReconciliationResult {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

// (pattern, canonical name); first match wins
static MATERIAL_ALIASES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\b316L?\b.*\b(?:SS|STAINLESS|CRES)\b|\b(?:SS|STAINLESS|CRES)\b.*\b316L?\b", "316 STAINLESS"),
        (r"\b304L?\b.*\b(?:SS|STAINLESS|CRES)\b|\b(?:SS|STAINLESS|CRES)[ -]?304L?\b", "304 STAINLESS"),
        (r"\b6061[ -]?T6(?:51)?\b", "6061-T6 ALUMINUM"),
        (r"\b5052[ -]?H32\b", "5052-H32 ALUMINUM"),
        (r"\bA[ -]?36\b|\bHRS\b|\bHOT[ -]ROLLED\b", "A36 STEEL"),
        (r"\bCRS\b|\bCOLD[ -]ROLLED\b|\b10(?:08|10)\b", "CRS"),
        (r"\bGALV(?:ANIZED)?\b|\bG90\b", "GALVANIZED STEEL"),
    ]
    .into_iter()
    .map(|(pattern, name)| (static_regex(&format!("(?i){pattern}")), name))
    .collect()
});

/// Canonical material name, or the normalized text when no alias applies
pub fn normalize_material(material: &str) -> String {
    MATERIAL_ALIASES
        .iter()
        .find(|(pattern, _)| pattern.is_match(material))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| normalize_text(material))
}

static THICKNESS: Lazy<Regex> = Lazy::new(|| {
    static_regex(r#"(?i)(\d*\.\d+|\d+/\d+)[ \t]*(?:"|IN\.?|INCH)?[ \t]*(?:THK|THICK)\b"#)
});

static GAUGE: Lazy<Regex> = Lazy::new(|| static_regex(r"(?i)\b(\d{1,2})[ \t]*(?:GA|GAUGE|GA\.)\b"));

// Manufacturer's standard gauge for sheet steel, inches
const STEEL_GAUGES: [(u32, f64); 10] = [
    (7, 0.1793),
    (8, 0.1644),
    (10, 0.1345),
    (11, 0.1196),
    (12, 0.1046),
    (13, 0.0897),
    (14, 0.0747),
    (16, 0.0598),
    (18, 0.0478),
    (20, 0.0359),
];

fn parse_fraction(s: &str) -> Option<f64> {
    let Some((num, den)) = s.split_once('/') else {
        return parse_number(s);
    };
    let den = parse_number(den)?;
    if den == 0.0 {
        return None;
    }
    Some(parse_number(num)? / den)
}

/// Thickness (in) stated in drawing text as ".125 THK", "1/4 THICK" or "10 GA"
pub fn parse_thickness(text: &str) -> Option<f64> {
    if let Some(caps) = THICKNESS.captures(text) {
        return parse_fraction(&caps[1]).filter(|t| *t > 0.0);
    }
    let caps = GAUGE.captures(text)?;
    let gauge: u32 = caps[1].parse().ok()?;
    STEEL_GAUGES
        .iter()
        .find(|(g, _)| *g == gauge)
        .map(|(_, t)| *t)
}

fn drawing_thickness(drawing: &DrawingData) -> Option<f64> {
    drawing
        .material
        .iter()
        .chain(drawing.description.iter())
        .map(String::as_str)
        .chain(drawing.notes.iter().map(|n| n.text.as_str()))
        .find_map(parse_thickness)
}

/// Compares CAD part data against a drawing
#[derive(Debug, Clone, Copy)]
pub struct ReconciliationEngine {
    thickness_tolerance: f64,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self {
            thickness_tolerance: THICKNESS_TOLERANCE,
        }
    }
}

impl ReconciliationEngine {
    pub fn with_thickness_tolerance(thickness_tolerance: f64) -> Self {
        Self {
            thickness_tolerance: thickness_tolerance.abs(),
        }
    }

    pub fn reconcile(&self, cad: &PartData, drawing: &DrawingData) -> ReconciliationResult {
        let mut result = ReconciliationResult {
            routing_suggestions: drawing.routing_hints.clone(),
            ..Default::default()
        };
        let drawing_confidence = drawing.overall_confidence;
        let drawing_thickness = drawing_thickness(drawing);

        for field in ReconcileField::ALL {
            let (cad_value, drawing_value, agree) = match field {
                ReconcileField::PartNumber => compare_text(
                    cad.part_number.as_deref(),
                    drawing.part_number.as_deref(),
                    normalize_part_number,
                ),
                ReconcileField::Description => compare_text(
                    cad.description.as_deref(),
                    drawing.description.as_deref(),
                    normalize_text,
                ),
                ReconcileField::Material => compare_text(
                    cad.material.as_deref(),
                    drawing.material.as_deref(),
                    normalize_material,
                ),
                ReconcileField::Thickness => (
                    cad.thickness.map(|t| format!("{t:.4}")),
                    drawing_thickness.map(|t| format!("{t:.4}")),
                    match (cad.thickness, drawing_thickness) {
                        (Some(a), Some(b)) => (a - b).abs() <= self.thickness_tolerance + 1e-9,
                        _ => false,
                    },
                ),
            };

            let confidence = match (&cad_value, &drawing_value) {
                (Some(_), Some(_)) => {
                    cross_validate_confidence(cad.confidence, true, drawing_confidence, agree)
                }
                (Some(_), None) => cross_validate_confidence(cad.confidence, true, 0.0, false),
                (None, Some(_)) => cross_validate_confidence(0.0, false, drawing_confidence, true),
                (None, None) => 0.0,
            };
            result.field_confidence.insert(field, confidence);

            match (cad_value, drawing_value) {
                (Some(cad_value), Some(drawing_value)) if !agree => {
                    tracing::debug!(%field, %cad_value, %drawing_value, "CAD and drawing disagree");
                    result.conflicts.push(DataConflict {
                        field,
                        cad_value,
                        drawing_value,
                    });
                }
                (None, Some(value)) => result.gap_fills.push(GapFill {
                    field,
                    value,
                    confidence,
                }),
                _ => {}
            }
        }

        result.rename_suggestion = rename_suggestion(cad, drawing);
        result
    }
}

fn compare_text(
    cad: Option<&str>,
    drawing: Option<&str>,
    normalize: fn(&str) -> String,
) -> (Option<String>, Option<String>, bool) {
    let cad = cad.map(str::trim).filter(|v| !v.is_empty());
    let drawing = drawing.map(str::trim).filter(|v| !v.is_empty());
    let agree = match (cad, drawing) {
        (Some(a), Some(b)) => normalize(a) == normalize(b),
        _ => false,
    };
    (cad.map(str::to_string), drawing.map(str::to_string), agree)
}

fn rename_suggestion(cad: &PartData, drawing: &DrawingData) -> Option<RenameSuggestion> {
    let current = cad.file_path.as_ref()?;
    let part_number = drawing.part_number.as_deref()?.trim();
    let stem = current.file_stem()?.to_str()?;
    if part_number.is_empty() || normalize_part_number(stem) == normalize_part_number(part_number) {
        return None;
    }

    let mut file_name = part_number.replace(['/', '\\'], "-");
    if let Some(ext) = current.extension().and_then(|e| e.to_str()) {
        file_name.push('.');
        file_name.push_str(ext);
    }
    Some(RenameSuggestion {
        current: current.clone(),
        suggested: current.with_file_name(file_name),
        part_number: part_number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::page::PageText;
    use crate::package::{analyze_page, DrawingPackageIndex};
    use std::path::Path;

    fn drawing(text: &str) -> DrawingData {
        let mut index = DrawingPackageIndex::new();
        index.add_page(analyze_page(Path::new("d.pdf"), &PageText::new(1, text)));
        let key = index.pages_by_part_number.keys().next().cloned().unwrap();
        index.build_drawing_data(&key).unwrap()
    }

    const BRACKET: &str = "PART NO: 12345-01\nDESCRIPTION: MOUNTING BRACKET\nMATERIAL: 304 STAINLESS STEEL 11 GA\nNOTES:\n1. DEBURR ALL EDGES\n";

    #[test]
    fn test_material_aliases() {
        assert_eq!(normalize_material("SS304"), "304 STAINLESS");
        assert_eq!(normalize_material("304 STAINLESS STEEL"), "304 STAINLESS");
        assert_eq!(normalize_material("ASTM A36"), "A36 STEEL");
        assert_eq!(normalize_material("AL 6061-T6"), "6061-T6 ALUMINUM");
        assert_eq!(normalize_material("titanium  grade 5"), "TITANIUM GRADE 5");
    }

    #[test]
    fn test_parse_thickness_forms() {
        assert_eq!(parse_thickness(".125 THK"), Some(0.125));
        assert_eq!(parse_thickness("1/4\" THICK PLATE"), Some(0.25));
        assert_eq!(parse_thickness("11 GA CRS"), Some(0.1196));
        assert_eq!(parse_thickness("NO THICKNESS"), None);
    }

    #[test]
    fn test_agreeing_part_has_no_conflicts() {
        let cad = PartData {
            file_path: Some(PathBuf::from("cad/12345-01.sldprt")),
            part_number: Some("12345-01".into()),
            material: Some("SS304".into()),
            thickness: Some(0.12),
            ..Default::default()
        };
        let result = ReconciliationEngine::default().reconcile(&cad, &drawing(BRACKET));
        assert!(!result.has_conflicts(), "{:?}", result.conflicts);
        assert!(result.rename_suggestion.is_none());
        assert_eq!(result.field_confidence[&ReconcileField::PartNumber], 1.0);

        // description only on the drawing
        assert_eq!(result.gap_fills.len(), 1);
        assert_eq!(result.gap_fills[0].field, ReconcileField::Description);
        assert_eq!(result.gap_fills[0].value, "MOUNTING BRACKET");
        assert!(!result.routing_suggestions.is_empty());
    }

    #[test]
    fn test_conflicts_are_recorded_not_resolved() {
        let cad = PartData {
            part_number: Some("12345-01".into()),
            material: Some("6061-T6".into()),
            thickness: Some(0.25),
            ..Default::default()
        };
        let result = ReconciliationEngine::default().reconcile(&cad, &drawing(BRACKET));
        let fields: Vec<_> = result.conflicts.iter().map(|c| c.field).collect();
        assert_eq!(fields, vec![ReconcileField::Material, ReconcileField::Thickness]);
        assert_eq!(result.conflicts[0].cad_value, "6061-T6");
        assert_eq!(result.conflicts[0].drawing_value, "304 STAINLESS STEEL 11 GA");
        assert!(result.field_confidence[&ReconcileField::Material] < cad.confidence);
    }

    #[test]
    fn test_rename_suggestion_keeps_extension() {
        let cad = PartData {
            file_path: Some(PathBuf::from("cad/Part7.SLDPRT")),
            ..Default::default()
        };
        let result = ReconciliationEngine::default().reconcile(&cad, &drawing(BRACKET));
        let rename = result.rename_suggestion.unwrap();
        assert_eq!(rename.suggested, PathBuf::from("cad/12345-01.SLDPRT"));
        assert_eq!(rename.part_number, "12345-01");
    }

    #[test]
    fn test_field_confidence_in_unit_range() {
        let cad = PartData {
            confidence: 3.0,
            part_number: Some("X".into()),
            ..Default::default()
        };
        let result = ReconciliationEngine::default().reconcile(&cad, &drawing(BRACKET));
        assert!(result
            .field_confidence
            .values()
            .all(|c| (0.0..=1.0).contains(c)));
    }
}
