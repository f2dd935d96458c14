//! Industry specification recognition
//!
//! A static database maps spec callouts (ASTM, AWS, MIL, AMS, ISO, ...) to a
//! category and, where the spec implies shop work, a routing operation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::notes::{DrawingNote, NoteCategory};
use super::static_regex;
use crate::core::types::{RoutingHint, RoutingOperation};

/// Specification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecCategory {
    Material,
    Welding,
    Coating,
    HeatTreat,
    SurfaceFinish,
    Inspection,
    Quality,
    Controlled,
}

impl SpecCategory {
    /// Material and controlled-data specs inform, they never add operations
    pub fn is_informational(self) -> bool {
        matches!(self, SpecCategory::Material | SpecCategory::Controlled)
    }
}

impl std::fmt::Display for SpecCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecCategory::Material => write!(f, "material"),
            SpecCategory::Welding => write!(f, "welding"),
            SpecCategory::Coating => write!(f, "coating"),
            SpecCategory::HeatTreat => write!(f, "heat_treat"),
            SpecCategory::SurfaceFinish => write!(f, "surface_finish"),
            SpecCategory::Inspection => write!(f, "inspection"),
            SpecCategory::Quality => write!(f, "quality"),
            SpecCategory::Controlled => write!(f, "controlled"),
        }
    }
}

/// A recognized specification reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecMatch {
    /// Canonical identifier (e.g. "AWS D1.1")
    pub spec_id: String,

    /// Full title of the specification
    pub full_name: String,

    pub category: SpecCategory,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_op: Option<RoutingOperation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_center: Option<String>,

    pub confidence: f64,
}

struct SpecEntry {
    pattern: Regex,
    spec_id: &'static str,
    full_name: &'static str,
    category: SpecCategory,
    routing: Option<(RoutingOperation, Option<&'static str>)>,
    confidence: f64,
}

const WELD: Option<(RoutingOperation, Option<&str>)> =
    Some((RoutingOperation::Weld, Some("WELD")));
const OUTSIDE: Option<(RoutingOperation, Option<&str>)> =
    Some((RoutingOperation::OutsideProcess, None));
const INSPECT: Option<(RoutingOperation, Option<&str>)> =
    Some((RoutingOperation::Inspect, Some("QC")));

static SPEC_DATABASE: Lazy<Vec<SpecEntry>> = Lazy::new(|| {
    use SpecCategory::*;

    let raw: Vec<(
        &str,
        &'static str,
        &'static str,
        SpecCategory,
        Option<(RoutingOperation, Option<&'static str>)>,
        f64,
    )> = vec![
        // Materials
        (r"ASTM[ \t-]*A[ \t-]*36\b", "ASTM A36", "Carbon Structural Steel", Material, None, 0.95),
        (r"ASTM[ \t-]*A[ \t-]*500\b", "ASTM A500", "Cold-Formed Structural Tubing", Material, None, 0.95),
        (r"ASTM[ \t-]*A[ \t-]*513\b", "ASTM A513", "Electric-Resistance-Welded Mechanical Tubing", Material, None, 0.95),
        (r"ASTM[ \t-]*A[ \t-]*1011\b", "ASTM A1011", "Hot-Rolled Sheet and Strip Steel", Material, None, 0.95),
        (r"ASTM[ \t-]*A[ \t-]*1008\b", "ASTM A1008", "Cold-Rolled Sheet Steel", Material, None, 0.95),
        (r"ASTM[ \t-]*A[ \t-]*240\b", "ASTM A240", "Stainless Steel Plate, Sheet and Strip", Material, None, 0.95),
        (r"ASTM[ \t-]*A[ \t-]*276\b", "ASTM A276", "Stainless Steel Bars and Shapes", Material, None, 0.95),
        (r"ASTM[ \t-]*A[ \t-]*479\b", "ASTM A479", "Stainless Steel Bars for Boilers and Pressure Vessels", Material, None, 0.95),
        (r"ASTM[ \t-]*A[ \t-]*572\b", "ASTM A572", "High-Strength Low-Alloy Columbium-Vanadium Steel", Material, None, 0.95),
        (r"ASTM[ \t-]*B[ \t-]*209\b", "ASTM B209", "Aluminum and Aluminum-Alloy Sheet and Plate", Material, None, 0.95),
        (r"ASTM[ \t-]*B[ \t-]*221\b", "ASTM B221", "Aluminum Extruded Bars, Rods, Wire, Profiles and Tubes", Material, None, 0.95),
        (r"ASTM[ \t-]*B[ \t-]*152\b", "ASTM B152", "Copper Sheet, Strip, Plate and Rolled Bar", Material, None, 0.95),
        (r"AMS[ \t-]*4027\b", "AMS 4027", "Aluminum Alloy 6061-T6 Sheet and Plate", Material, None, 0.9),
        (r"AMS[ \t-]*4037\b", "AMS 4037", "Aluminum Alloy 2024-T3 Sheet and Plate", Material, None, 0.9),
        (r"AMS[ \t-]*4911\b", "AMS 4911", "Titanium Alloy 6Al-4V Sheet, Strip and Plate", Material, None, 0.9),
        (r"AMS[ \t-]*5513\b", "AMS 5513", "Stainless Steel 304 Sheet, Strip and Plate", Material, None, 0.9),
        (r"AMS[ \t-]*5524\b", "AMS 5524", "Stainless Steel 316 Sheet, Strip and Plate", Material, None, 0.9),
        (r"AMS[ \t-]*6350\b", "AMS 6350", "Steel 4130 Sheet, Strip and Plate", Material, None, 0.9),
        (r"SAE[ \t-]*J[ \t-]*403\b", "SAE J403", "Chemical Compositions of SAE Carbon Steels", Material, None, 0.85),
        (r"AISI[ \t-]*4140\b", "AISI 4140", "Chromium-Molybdenum Alloy Steel", Material, None, 0.8),
        (r"AISI[ \t-]*1018\b", "AISI 1018", "Low-Carbon Steel", Material, None, 0.8),
        // Welding
        (r"AWS[ \t-]*D1\.1\b", "AWS D1.1", "Structural Welding Code - Steel", Welding, WELD, 0.95),
        (r"AWS[ \t-]*D1\.2\b", "AWS D1.2", "Structural Welding Code - Aluminum", Welding, WELD, 0.95),
        (r"AWS[ \t-]*D1\.3\b", "AWS D1.3", "Structural Welding Code - Sheet Steel", Welding, WELD, 0.95),
        (r"AWS[ \t-]*D1\.6\b", "AWS D1.6", "Structural Welding Code - Stainless Steel", Welding, WELD, 0.95),
        (r"AWS[ \t-]*D17\.1\b", "AWS D17.1", "Fusion Welding for Aerospace Applications", Welding, WELD, 0.95),
        (r"AWS[ \t-]*A2\.4\b", "AWS A2.4", "Standard Symbols for Welding, Brazing and NDE", Welding, WELD, 0.8),
        (r"ASME[ \t-]*(?:SECTION[ \t]+)?IX\b", "ASME IX", "Welding and Brazing Qualifications", Welding, WELD, 0.85),
        (r"ISO[ \t-]*3834\b", "ISO 3834", "Quality Requirements for Fusion Welding", Welding, WELD, 0.85),
        (r"ISO[ \t-]*5817\b", "ISO 5817", "Weld Imperfection Quality Levels", Welding, WELD, 0.85),
        (r"MIL-STD-1595\b", "MIL-STD-1595", "Qualification of Aircraft Welders", Welding, WELD, 0.85),
        // Coatings
        (r"MIL-(?:A|PRF)-8625\b", "MIL-A-8625", "Anodic Coatings for Aluminum", Coating, OUTSIDE, 0.95),
        (r"MIL-(?:C|DTL)-5541\b", "MIL-DTL-5541", "Chemical Conversion Coatings on Aluminum", Coating, OUTSIDE, 0.95),
        (r"ASTM[ \t-]*B[ \t-]*633\b", "ASTM B633", "Electrodeposited Zinc Coatings", Coating, OUTSIDE, 0.95),
        (r"ASTM[ \t-]*A[ \t-]*123\b", "ASTM A123", "Hot-Dip Galvanized Coatings", Coating, OUTSIDE, 0.95),
        (r"ASTM[ \t-]*A[ \t-]*153\b", "ASTM A153", "Zinc Coating on Iron and Steel Hardware", Coating, OUTSIDE, 0.9),
        (r"AMS[ \t-]*2700\b", "AMS 2700", "Passivation of Corrosion Resistant Steels", Coating, OUTSIDE, 0.95),
        (r"ASTM[ \t-]*A[ \t-]*967\b", "ASTM A967", "Chemical Passivation of Stainless Steel", Coating, OUTSIDE, 0.95),
        (r"AMS[ \t-]*2404\b", "AMS 2404", "Electroless Nickel Plating", Coating, OUTSIDE, 0.95),
        (r"ASTM[ \t-]*B[ \t-]*733\b", "ASTM B733", "Autocatalytic Nickel-Phosphorus Coatings", Coating, OUTSIDE, 0.95),
        (r"MIL-(?:C|DTL)-13924\b", "MIL-DTL-13924", "Black Oxide Coating", Coating, OUTSIDE, 0.95),
        (r"AMS[ \t-]*2485\b", "AMS 2485", "Black Oxide Coating", Coating, OUTSIDE, 0.9),
        (r"MIL-PRF-22750\b", "MIL-PRF-22750", "Epoxy High-Solids Coating", Coating, OUTSIDE, 0.9),
        (r"MIL-(?:C|DTL)-53072\b", "MIL-DTL-53072", "Chemical Agent Resistant Coating (CARC)", Coating, OUTSIDE, 0.9),
        (r"MIL-PRF-85285\b", "MIL-PRF-85285", "Polyurethane Topcoat", Coating, OUTSIDE, 0.9),
        (r"ASTM[ \t-]*B[ \t-]*456\b", "ASTM B456", "Electrodeposited Nickel plus Chromium Coatings", Coating, OUTSIDE, 0.9),
        // Heat treatment
        (r"AMS[ \t-]*2759\b", "AMS 2759", "Heat Treatment of Steel Parts", HeatTreat, OUTSIDE, 0.95),
        (r"AMS[ \t-]*2770\b", "AMS 2770", "Heat Treatment of Wrought Aluminum Alloy Parts", HeatTreat, OUTSIDE, 0.95),
        (r"AMS[ \t-]*2801\b", "AMS 2801", "Heat Treatment of Titanium Alloy Parts", HeatTreat, OUTSIDE, 0.95),
        (r"MIL-H-6875\b", "MIL-H-6875", "Heat Treatment of Steel", HeatTreat, OUTSIDE, 0.9),
        (r"MIL-H-6088\b", "MIL-H-6088", "Heat Treatment of Aluminum Alloys", HeatTreat, OUTSIDE, 0.9),
        // Surface finish
        (r"ASME[ \t-]*B46\.1\b", "ASME B46.1", "Surface Texture (Roughness, Waviness and Lay)", SurfaceFinish, None, 0.9),
        (r"ANSI[ \t-]*B46\.1\b", "ANSI B46.1", "Surface Texture", SurfaceFinish, None, 0.85),
        (r"ISO[ \t-]*1302\b", "ISO 1302", "Indication of Surface Texture", SurfaceFinish, None, 0.85),
        (r"ISO[ \t-]*21920\b", "ISO 21920", "Surface Texture: Profile", SurfaceFinish, None, 0.85),
        // Inspection and NDT
        (r"ASME[ \t-]*Y14\.5\b", "ASME Y14.5", "Dimensioning and Tolerancing", Inspection, None, 0.9),
        (r"ASTM[ \t-]*E[ \t-]*1444\b", "ASTM E1444", "Magnetic Particle Testing", Inspection, OUTSIDE, 0.95),
        (r"ASTM[ \t-]*E[ \t-]*1417\b", "ASTM E1417", "Liquid Penetrant Testing", Inspection, OUTSIDE, 0.95),
        (r"ASTM[ \t-]*E[ \t-]*165\b", "ASTM E165", "Liquid Penetrant Examination", Inspection, OUTSIDE, 0.9),
        (r"ASTM[ \t-]*E[ \t-]*18\b", "ASTM E18", "Rockwell Hardness of Metallic Materials", Inspection, INSPECT, 0.9),
        (r"ASTM[ \t-]*E[ \t-]*8\b", "ASTM E8", "Tension Testing of Metallic Materials", Inspection, OUTSIDE, 0.85),
        (r"ASTM[ \t-]*B[ \t-]*117\b", "ASTM B117", "Salt Spray (Fog) Testing", Inspection, OUTSIDE, 0.9),
        (r"ASTM[ \t-]*D[ \t-]*3359\b", "ASTM D3359", "Tape Test for Coating Adhesion", Inspection, INSPECT, 0.9),
        (r"ANSI[ \t-]*Z1\.4\b", "ANSI Z1.4", "Sampling Procedures for Inspection by Attributes", Inspection, INSPECT, 0.85),
        (r"MIL-STD-1916\b", "MIL-STD-1916", "Acceptance Sampling", Inspection, INSPECT, 0.85),
        // Quality systems
        (r"\bAS[ \t-]*9102\b", "AS9102", "First Article Inspection Requirement", Quality, INSPECT, 0.95),
        (r"\bAS[ \t-]*9100\b", "AS9100", "Quality Management Systems - Aviation, Space and Defense", Quality, None, 0.9),
        (r"ISO[ \t-]*9001\b", "ISO 9001", "Quality Management Systems", Quality, None, 0.9),
        (r"ISO[ \t-]*13485\b", "ISO 13485", "Medical Devices Quality Management", Quality, None, 0.9),
        (r"IATF[ \t-]*16949\b", "IATF 16949", "Automotive Quality Management", Quality, None, 0.9),
        (r"\bPPAP\b", "PPAP", "Production Part Approval Process", Quality, INSPECT, 0.8),
        (r"\bNADCAP\b", "NADCAP", "National Aerospace and Defense Contractors Accreditation", Quality, None, 0.85),
        // Controlled data
        (r"\bITAR\b", "ITAR", "International Traffic in Arms Regulations", Controlled, None, 0.95),
        (r"\bEAR99\b|EXPORT[ \t]+ADMINISTRATION[ \t]+REGULATIONS", "EAR", "Export Administration Regulations", Controlled, None, 0.9),
        (r"EXPORT[ \t]+CONTROLLED", "EXPORT CONTROLLED", "Export Controlled Technical Data", Controlled, None, 0.85),
        (r"\bCUI\b|CONTROLLED[ \t]+UNCLASSIFIED", "CUI", "Controlled Unclassified Information", Controlled, None, 0.85),
        (r"DFARS[ \t-]*252\.225-7009", "DFARS 252.225-7009", "Restriction on Specialty Metals", Controlled, None, 0.9),
        (r"\bRoHS\b", "RoHS", "Restriction of Hazardous Substances", Controlled, None, 0.85),
        (r"\bREACH\b[ \t]+(?:COMPLIANT|REGULATION)", "REACH", "Registration, Evaluation, Authorisation of Chemicals", Controlled, None, 0.8),
    ];

    raw.into_iter()
        .map(|(pattern, spec_id, full_name, category, routing, confidence)| SpecEntry {
            pattern: static_regex(&format!("(?i){pattern}")),
            spec_id,
            full_name,
            category,
            routing,
            confidence,
        })
        .collect()
});

/// Recognizes industry specification callouts in drawing text
pub struct SpecRecognizer;

impl SpecRecognizer {
    /// Number of specifications the recognizer knows
    pub fn database_size() -> usize {
        SPEC_DATABASE.len()
    }

    /// Recognize all referenced specs, one match per spec id, in database order
    pub fn recognize(text: &str) -> Vec<SpecMatch> {
        let mut seen = HashSet::new();
        SPEC_DATABASE
            .iter()
            .filter(|entry| entry.pattern.is_match(text))
            .filter(|entry| seen.insert(entry.spec_id))
            .map(|entry| SpecMatch {
                spec_id: entry.spec_id.to_string(),
                full_name: entry.full_name.to_string(),
                category: entry.category,
                routing_op: entry.routing.map(|(op, _)| op),
                work_center: entry.routing.and_then(|(_, wc)| wc).map(str::to_string),
                confidence: entry.confidence,
            })
            .collect()
    }

    /// Routing hints, one per distinct (operation, work center)
    pub fn to_routing_hints(specs: &[SpecMatch]) -> Vec<RoutingHint> {
        let mut hints: Vec<RoutingHint> = Vec::new();

        for spec in specs.iter().filter(|s| !s.category.is_informational()) {
            let Some(operation) = spec.routing_op else {
                continue;
            };
            match hints
                .iter_mut()
                .find(|h| h.operation == operation && h.work_center == spec.work_center)
            {
                Some(hint) => {
                    hint.note_text.push_str(", ");
                    hint.note_text.push_str(&spec.spec_id);
                    hint.confidence = hint.confidence.max(spec.confidence);
                }
                None => hints.push(RoutingHint {
                    operation,
                    work_center: spec.work_center.clone(),
                    note_text: format!("PER {}", spec.spec_id),
                    confidence: spec.confidence,
                }),
            }
        }

        hints
    }

    /// Informational notes for material and controlled-data specs
    pub fn to_informational_notes(specs: &[SpecMatch]) -> Vec<DrawingNote> {
        specs
            .iter()
            .filter(|s| s.category.is_informational())
            .map(|s| {
                DrawingNote::new(
                    format!("{} SPEC: {} ({})", s.category.to_string().to_uppercase(), s.spec_id, s.full_name),
                    NoteCategory::General,
                    s.confidence,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_has_at_least_sixty_entries() {
        assert!(SpecRecognizer::database_size() >= 60);
    }

    #[test]
    fn test_spec_ids_are_unique() {
        let mut ids = HashSet::new();
        for entry in SPEC_DATABASE.iter() {
            assert!(ids.insert(entry.spec_id), "duplicate spec id {}", entry.spec_id);
        }
    }

    #[test]
    fn test_recognize_dedups_by_id() {
        let specs = SpecRecognizer::recognize("WELD PER AWS D1.1. INSPECT WELDS PER AWS D1.1");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].spec_id, "AWS D1.1");
        assert_eq!(specs[0].category, SpecCategory::Welding);
    }

    #[test]
    fn test_recognize_spacing_variants() {
        let specs = SpecRecognizer::recognize("MATERIAL: ASTM-A36 PLATE\nANODIZE PER MIL-A-8625 TYPE II");
        let ids: Vec<_> = specs.iter().map(|s| s.spec_id.as_str()).collect();
        assert!(ids.contains(&"ASTM A36"));
        assert!(ids.contains(&"MIL-A-8625"));
    }

    #[test]
    fn test_recognize_is_idempotent() {
        let text = "AWS D1.1, AWS D1.6, ASTM A123, ITAR CONTROLLED";
        assert_eq!(SpecRecognizer::recognize(text), SpecRecognizer::recognize(text));
    }

    #[test]
    fn test_routing_hints_collapse_shared_operation() {
        let specs = SpecRecognizer::recognize("WELD PER AWS D1.1 AND AWS D1.6");
        let hints = SpecRecognizer::to_routing_hints(&specs);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].operation, RoutingOperation::Weld);
        assert!(hints[0].note_text.contains("AWS D1.1"));
        assert!(hints[0].note_text.contains("AWS D1.6"));
    }

    #[test]
    fn test_material_and_controlled_never_route() {
        let specs = SpecRecognizer::recognize("ASTM A36 STEEL. ITAR CONTROLLED DATA.");
        assert_eq!(specs.len(), 2);
        assert!(SpecRecognizer::to_routing_hints(&specs).is_empty());

        let notes = SpecRecognizer::to_informational_notes(&specs);
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.category == NoteCategory::General));
    }

    #[test]
    fn test_outside_process_has_no_work_center() {
        let specs = SpecRecognizer::recognize("PASSIVATE PER AMS 2700");
        let hints = SpecRecognizer::to_routing_hints(&specs);
        assert_eq!(hints[0].operation, RoutingOperation::OutsideProcess);
        assert!(hints[0].work_center.is_none());
    }

    #[test]
    fn test_e8_does_not_match_e18_or_e165() {
        let specs = SpecRecognizer::recognize("HARDNESS PER ASTM E18");
        let ids: Vec<_> = specs.iter().map(|s| s.spec_id.as_str()).collect();
        assert_eq!(ids, vec!["ASTM E18"]);
    }
}
