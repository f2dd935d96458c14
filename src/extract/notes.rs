//! Manufacturing note extraction and routing hint generation

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::static_regex;
use crate::core::types::{normalize_text, RoutingHint, RoutingOperation};

/// Note category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
    Deburr,
    Finish,
    HeatTreat,
    Weld,
    ProcessConstraint,
    Inspect,
    Hardware,
    General,
}

impl NoteCategory {
    /// How a note of this category affects the routing
    pub fn routing_impact(self) -> RoutingImpact {
        match self {
            NoteCategory::ProcessConstraint => RoutingImpact::ModifyOperation,
            NoteCategory::General => RoutingImpact::Informational,
            NoteCategory::Deburr
            | NoteCategory::Finish
            | NoteCategory::HeatTreat
            | NoteCategory::Weld
            | NoteCategory::Inspect
            | NoteCategory::Hardware => RoutingImpact::AddOperation,
        }
    }

    /// Routing operation and work center for notes of this category
    pub fn routing(self) -> Option<(RoutingOperation, Option<&'static str>)> {
        match self {
            NoteCategory::Deburr => Some((RoutingOperation::Deburr, Some("DEBURR"))),
            NoteCategory::Finish => Some((RoutingOperation::OutsideProcess, None)),
            NoteCategory::HeatTreat => Some((RoutingOperation::OutsideProcess, None)),
            NoteCategory::Weld => Some((RoutingOperation::Weld, Some("WELD"))),
            NoteCategory::ProcessConstraint => Some((RoutingOperation::ProcessOverride, None)),
            NoteCategory::Inspect => Some((RoutingOperation::Inspect, Some("QC"))),
            NoteCategory::Hardware => Some((RoutingOperation::Hardware, Some("HARDWARE"))),
            NoteCategory::General => None,
        }
    }
}

impl std::fmt::Display for NoteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoteCategory::Deburr => write!(f, "deburr"),
            NoteCategory::Finish => write!(f, "finish"),
            NoteCategory::HeatTreat => write!(f, "heat_treat"),
            NoteCategory::Weld => write!(f, "weld"),
            NoteCategory::ProcessConstraint => write!(f, "process_constraint"),
            NoteCategory::Inspect => write!(f, "inspect"),
            NoteCategory::Hardware => write!(f, "hardware"),
            NoteCategory::General => write!(f, "general"),
        }
    }
}

/// Effect of a note on the part routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingImpact {
    AddOperation,
    ModifyOperation,
    Informational,
}

/// A categorized manufacturing note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingNote {
    /// Note text with numbering stripped
    pub text: String,

    pub category: NoteCategory,

    /// Extraction confidence (0.0 - 1.0)
    pub confidence: f64,
}

impl DrawingNote {
    pub fn new(text: impl Into<String>, category: NoteCategory, confidence: f64) -> Self {
        Self {
            text: text.into(),
            category,
            confidence,
        }
    }

    pub fn routing_impact(&self) -> RoutingImpact {
        self.category.routing_impact()
    }

    /// Key used for deduplication
    pub fn normalized(&self) -> String {
        normalize_text(&self.text)
    }
}

// First match wins. Constraints come first so "DO NOT PAINT" is not read as a finish step.
static NOTE_PATTERNS: Lazy<Vec<(Regex, NoteCategory, f64)>> = Lazy::new(|| {
    vec![
        (
            static_regex(
                r"(?i)\b(?:DO[ \t]+NOT|NO[ \t]+SUBSTITUT\w*|ONLY[ \t]+(?:LASER|WATERJET|PLASMA)|(?:LASER|WATERJET|PLASMA)[ \t]+CUT[ \t]+ONLY|GRAIN[ \t]+DIRECTION|NO[ \t]+TOOL(?:ING)?[ \t]+MARKS|MACHINE[ \t]+AFTER|FORM[ \t]+BEFORE|PROTECT\w*[ \t]+FILM)\b",
            ),
            NoteCategory::ProcessConstraint,
            0.8,
        ),
        (
            static_regex(
                r"(?i)\b(?:DEBURR\w*|BREAK[ \t]+(?:ALL[ \t]+)?(?:SHARP[ \t]+)?(?:EDGES|CORNERS)|REMOVE[ \t]+(?:ALL[ \t]+)?BURRS|NO[ \t]+SHARP[ \t]+EDGES|TUMBLE)\b",
            ),
            NoteCategory::Deburr,
            0.9,
        ),
        (
            static_regex(
                r"(?i)\b(?:PAINT\w*|POWDER[ \t]*COAT\w*|ANODIZ\w*|PLATED|PLATING|PLATE[ \t]+PER|ZINC|GALVANIZ\w*|PASSIVAT\w*|BLACK[ \t]+OXIDE|PRIME[RD]?|CHEM(?:ICAL)?[ \t]+FILM|ALODINE|E-?COAT)\b",
            ),
            NoteCategory::Finish,
            0.85,
        ),
        (
            static_regex(
                r"(?i)\b(?:HEAT[ \t]*TREAT\w*|HARDEN\w*|TEMPER(?:ED)?|ANNEAL\w*|STRESS[ \t]+RELIEV\w*|CARBURIZ\w*|NORMALIZ\w*|HRC|ROCKWELL)\b",
            ),
            NoteCategory::HeatTreat,
            0.85,
        ),
        (
            static_regex(r"(?i)\b(?:WELD\w*|FILLET|TACK|BRAZ\w*|AWS[ \t]+D1\.\d)\b"),
            NoteCategory::Weld,
            0.85,
        ),
        (
            static_regex(
                r"(?i)\b(?:INSPECT\w*|CMM|FIRST[ \t]+ARTICLE|FAI|CERTIF\w*|CERTS?|MEASURE\w*)\b",
            ),
            NoteCategory::Inspect,
            0.8,
        ),
        (
            static_regex(
                r"(?i)\b(?:PEM|INSERT\w*|HELI-?COIL|RIVET\w*|PRESS[ \t]+FIT|CLINCH\w*|STUDS?|STANDOFFS?|NUT[ \t]*PLATES?|INSTALL\w*)\b",
            ),
            NoteCategory::Hardware,
            0.8,
        ),
    ]
});

/// Leading note numbering such as "1.", "2)", "NOTE 3:" or "NOTES:"
static NOTE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    static_regex(r"(?i)^\s*(?:NOTES?[ \t]*:?[ \t]*)?(?:\d{1,2}[.)][ \t]*|\(\d{1,2}\)[ \t]*)")
});

/// Labelled title block fields ("DESCRIPTION: COVER PLATE") are identity, not notes
static TITLE_FIELD_LINE: Lazy<Regex> = Lazy::new(|| {
    static_regex(concat!(
        r"(?i)^[ \t]*(?:(?:PART|DWG|DRAWING)[ \t]*(?:NO\.?|NUMBER|#)|P/N|DESCRIPTION|TITLE",
        r"|MAT(?:ERIA)?L|REV(?:ISION)?|DRAWN(?:[ \t]+BY)?|CHECKED(?:[ \t]+BY)?",
        r"|APPROVED(?:[ \t]+BY)?|DATE|SCALE|SHEET|SIZE|WEIGHT)[ \t]*[:#]",
    ))
});

const GENERAL_NOTE_CONFIDENCE: f64 = 0.5;
const MAX_NOTE_LEN: usize = 240;

/// Extracts categorized manufacturing notes from page text
pub struct DrawingNoteExtractor;

impl DrawingNoteExtractor {
    /// Categorize a single line; None when it is not a note
    pub fn categorize(line: &str) -> Option<(NoteCategory, f64)> {
        NOTE_PATTERNS
            .iter()
            .find(|(pattern, _, _)| pattern.is_match(line))
            .map(|(_, category, confidence)| (*category, *confidence))
    }

    /// Extract distinct notes, first occurrence wins
    pub fn extract_notes(text: &str) -> Vec<DrawingNote> {
        let mut seen = HashSet::new();
        let mut notes = Vec::new();

        for line in text.lines() {
            let numbered = NOTE_NUMBER.find(line).filter(|m| m.end() > 0);
            if numbered.is_none() && TITLE_FIELD_LINE.is_match(line) {
                continue;
            }
            let body = match numbered {
                Some(m) => &line[m.end()..],
                None => line,
            };
            let body = body.trim();
            if body.is_empty() || body.len() > MAX_NOTE_LEN {
                continue;
            }

            let (category, confidence) = match Self::categorize(body) {
                Some(found) => found,
                // Unrecognized numbered notes are still notes
                None if numbered.is_some() && body.chars().any(|c| c.is_alphabetic()) => {
                    (NoteCategory::General, GENERAL_NOTE_CONFIDENCE)
                }
                None => continue,
            };

            let note = DrawingNote::new(body, category, confidence);
            if seen.insert(note.normalized()) {
                notes.push(note);
            }
        }

        notes
    }

    /// Routing hints for each distinct note that maps to an operation
    pub fn generate_routing_hints(notes: &[DrawingNote]) -> Vec<RoutingHint> {
        let mut seen = HashSet::new();
        notes
            .iter()
            .filter(|note| seen.insert(note.normalized()))
            .filter_map(|note| {
                let (operation, work_center) = note.category.routing()?;
                Some(RoutingHint::new(
                    operation,
                    work_center,
                    note.text.clone(),
                    note.confidence,
                ))
            })
            .collect()
    }
}
