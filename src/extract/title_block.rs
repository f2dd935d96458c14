//! Title block parsing - part identity fields from labeled drawing text

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::static_regex;
use crate::analysis::confidence::cross_validate_confidence;
use crate::core::types::normalize_text;

/// One extracted title block value with its confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleBlockField {
    pub value: String,
    pub confidence: f64,
}

/// Title block field identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleField {
    PartNumber,
    Description,
    Material,
    Revision,
    DrawnBy,
    Date,
    Scale,
    Sheet,
}

impl std::fmt::Display for TitleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TitleField::PartNumber => write!(f, "part_number"),
            TitleField::Description => write!(f, "description"),
            TitleField::Material => write!(f, "material"),
            TitleField::Revision => write!(f, "revision"),
            TitleField::DrawnBy => write!(f, "drawn_by"),
            TitleField::Date => write!(f, "date"),
            TitleField::Scale => write!(f, "scale"),
            TitleField::Sheet => write!(f, "sheet"),
        }
    }
}

/// Identity metadata read from a drawing title block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitleBlockInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<TitleBlockField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<TitleBlockField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<TitleBlockField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<TitleBlockField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawn_by: Option<TitleBlockField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<TitleBlockField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<TitleBlockField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<TitleBlockField>,

    /// Mean confidence of populated fields (0 when none)
    pub overall_confidence: f64,
}

impl TitleBlockInfo {
    pub fn field(&self, field: TitleField) -> Option<&TitleBlockField> {
        match field {
            TitleField::PartNumber => self.part_number.as_ref(),
            TitleField::Description => self.description.as_ref(),
            TitleField::Material => self.material.as_ref(),
            TitleField::Revision => self.revision.as_ref(),
            TitleField::DrawnBy => self.drawn_by.as_ref(),
            TitleField::Date => self.date.as_ref(),
            TitleField::Scale => self.scale.as_ref(),
            TitleField::Sheet => self.sheet.as_ref(),
        }
    }

    fn slot(&mut self, field: TitleField) -> &mut Option<TitleBlockField> {
        match field {
            TitleField::PartNumber => &mut self.part_number,
            TitleField::Description => &mut self.description,
            TitleField::Material => &mut self.material,
            TitleField::Revision => &mut self.revision,
            TitleField::DrawnBy => &mut self.drawn_by,
            TitleField::Date => &mut self.date,
            TitleField::Scale => &mut self.scale,
            TitleField::Sheet => &mut self.sheet,
        }
    }

    /// Convenience accessor for a field's value
    pub fn value(&self, field: TitleField) -> Option<&str> {
        self.field(field).map(|f| f.value.as_str())
    }

    /// Whether any field was recognized
    pub fn is_empty(&self) -> bool {
        ALL_FIELDS.iter().all(|f| self.field(*f).is_none())
    }

    /// Recompute the mean confidence of populated fields
    pub fn recompute_confidence(&mut self) {
        let confidences: Vec<f64> = ALL_FIELDS
            .iter()
            .filter_map(|f| self.field(*f).map(|v| v.confidence))
            .collect();
        self.overall_confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };
    }

    /// Calibrate field confidences against a vision reading of the same page.
    ///
    /// Agreeing fields are boosted, single-source fields penalized. A field only
    /// the vision reading has is filled in; a disagreeing vision value never
    /// replaces the text value.
    pub fn cross_validate(&mut self, vision: &TitleBlockInfo) {
        for field in ALL_FIELDS {
            let theirs = vision.field(field).cloned();
            let slot = self.slot(field);
            *slot = match (slot.take(), theirs) {
                (Some(mut ours), Some(theirs)) => {
                    let agree = normalize_text(&ours.value) == normalize_text(&theirs.value);
                    ours.confidence = cross_validate_confidence(
                        ours.confidence,
                        true,
                        theirs.confidence,
                        agree,
                    );
                    Some(ours)
                }
                (Some(mut ours), None) => {
                    ours.confidence = cross_validate_confidence(ours.confidence, true, 0.0, false);
                    Some(ours)
                }
                (None, Some(mut theirs)) => {
                    theirs.confidence =
                        cross_validate_confidence(0.0, false, theirs.confidence, true);
                    Some(theirs)
                }
                (None, None) => None,
            };
        }
        self.recompute_confidence();
    }
}

const ALL_FIELDS: [TitleField; 8] = [
    TitleField::PartNumber,
    TitleField::Description,
    TitleField::Material,
    TitleField::Revision,
    TitleField::DrawnBy,
    TitleField::Date,
    TitleField::Scale,
    TitleField::Sheet,
];

struct FieldRule {
    field: TitleField,
    pattern: Regex,
    confidence: f64,
    /// Free-text values run to the end of the line and are cut at the next label
    free_text: bool,
}

/// Label separator: optional colon/period, horizontal whitespace only
const SEP: &str = r"[ \t]*[:.#]?[ \t]*";

// Rules for the same field are tried in order; the first valid value wins.
static FIELD_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    let rule = |field, pattern: String, confidence, free_text| FieldRule {
        field,
        pattern: static_regex(&pattern),
        confidence,
        free_text,
    };
    let id = r"([A-Z0-9][A-Z0-9\-_./]*)";
    vec![
        rule(
            TitleField::PartNumber,
            format!(r"(?i)\bPART[ \t]*(?:NO\.?|NUMBER|#){SEP}{id}"),
            0.9,
            false,
        ),
        rule(TitleField::PartNumber, format!(r"(?i)\bP/N{SEP}{id}"), 0.85, false),
        rule(
            TitleField::PartNumber,
            format!(r"(?i)\b(?:DWG|DRAWING)[ \t]*(?:NO\.?|NUMBER|#){SEP}{id}"),
            0.75,
            false,
        ),
        rule(
            TitleField::Description,
            format!(r"(?i)\b(?:DESCRIPTION|TITLE){SEP}([^\n]+)"),
            0.8,
            true,
        ),
        rule(
            TitleField::Material,
            format!(r"(?i)\bMAT(?:ERIA)?L{SEP}([^\n]+)"),
            0.85,
            true,
        ),
        rule(
            TitleField::Revision,
            r"(?i)\bREV(?:ISION)?(?:[ \t]*[:.][ \t]*|[ \t]+)([A-Z0-9]{1,3})\b".to_string(),
            0.8,
            false,
        ),
        rule(
            TitleField::DrawnBy,
            format!(r"(?i)\bDRAWN(?:[ \t]+BY)?{SEP}([A-Z][A-Z.]*(?:[ \t]+[A-Z][A-Z.]*)?)"),
            0.7,
            true,
        ),
        rule(
            TitleField::Date,
            format!(
                r"(?i)\bDATE{SEP}(\d{{1,2}}[/.-]\d{{1,2}}[/.-]\d{{2,4}}|\d{{4}}-\d{{2}}-\d{{2}}|\d{{1,2}}[ \t-][A-Z]{{3}}[ \t-]\d{{2,4}})"
            ),
            0.75,
            false,
        ),
        rule(
            TitleField::Scale,
            format!(r"(?i)\bSCALE{SEP}(\d+(?:\.\d+)?[ \t]*[:/][ \t]*\d+(?:\.\d+)?|NTS|NONE|FULL)"),
            0.8,
            false,
        ),
        rule(
            TitleField::Sheet,
            format!(r"(?i)\bSHEET{SEP}(\d+(?:[ \t]*(?:OF|/)[ \t]*\d+)?)"),
            0.8,
            false,
        ),
    ]
});

/// Column gap or the start of another title block label
static LABEL_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    static_regex(
        r"(?i)[ \t]{3,}|\b(?:FINISH|REV(?:ISION)?|SCALE|SHEET|DATE|DRAWN|CHECKED|APPROVED|PART[ \t]*(?:NO|NUMBER)|P/N|DWG|DESCRIPTION|TITLE|WEIGHT|QTY|SIZE|TOLERANCES?|UNLESS)\b",
    )
});

/// Parser for labeled title block fields
pub struct TitleBlockParser;

impl TitleBlockParser {
    /// Parse all recognizable title block fields from page text
    pub fn parse(text: &str) -> TitleBlockInfo {
        let mut info = TitleBlockInfo::default();

        for rule in FIELD_RULES.iter() {
            if info.field(rule.field).is_some() {
                continue;
            }
            let value = rule.pattern.captures_iter(text).find_map(|caps| {
                let raw = caps.get(1)?.as_str();
                clean_value(rule.field, raw, rule.free_text)
            });
            if let Some(value) = value {
                *info.slot(rule.field) = Some(TitleBlockField {
                    value,
                    confidence: rule.confidence,
                });
            }
        }

        info.recompute_confidence();
        info
    }
}

fn clean_value(field: TitleField, raw: &str, free_text: bool) -> Option<String> {
    let mut value = raw;
    if free_text {
        if let Some(m) = LABEL_BOUNDARY.find(value) {
            value = &value[..m.start()];
        }
    }
    let value = value
        .trim()
        .trim_end_matches(|c: char| c == ',' || c == ';' || c == ':')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if value.is_empty() {
        return None;
    }
    // BOM headers ("PART NUMBER  DESCRIPTION") must not yield a part number
    if field == TitleField::PartNumber && !value.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(value)
}
