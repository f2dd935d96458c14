//! Per-page analysis
//!
//! Runs every extractor over one page of text and collects the results into a
//! [`DrawingPageInfo`]. BOM tables are detected from their header row and the
//! rows below it are parsed into [`BomEntry`] records.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::analysis::confidence::{check_coverage_density, CoverageAssessment};
use crate::analysis::fabrication::{FabricationResult, FabricationToleranceClassifier};
use crate::core::page::PageText;
use crate::core::types::{normalize_text, RoutingHint};
use crate::extract::static_regex;
use crate::extract::{
    DrawingNote, DrawingNoteExtractor, GdtCallout, GdtExtractor, SpecMatch, SpecRecognizer,
    TitleBlockInfo, TitleBlockParser, ToleranceAnalysisResult, ToleranceAnalyzer,
};

/// One row of a bill of materials table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomEntry {
    pub item: u32,
    pub part_number: String,
    pub description: String,
    pub quantity: u32,
}

/// Everything extracted from a single drawing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingPageInfo {
    pub pdf_path: PathBuf,
    pub page_number: u32,
    pub title_block: TitleBlockInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<DrawingNote>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spec_matches: Vec<SpecMatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gdt_callouts: Vec<GdtCallout>,
    pub tolerance: ToleranceAnalysisResult,
    pub fabrication: FabricationResult,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_hints: Vec<RoutingHint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bom_entries: Vec<BomEntry>,
    pub has_text: bool,
    pub has_bom: bool,
    pub is_assembly_level: bool,
    /// Mean confidence of the title block, notes and spec matches that were found
    pub confidence: f64,
    pub coverage: CoverageAssessment,
}

impl DrawingPageInfo {
    /// Page record for a page that carried no text
    pub fn empty(pdf_path: impl Into<PathBuf>, page_number: u32) -> Self {
        Self {
            pdf_path: pdf_path.into(),
            page_number,
            title_block: TitleBlockInfo::default(),
            notes: Vec::new(),
            spec_matches: Vec::new(),
            gdt_callouts: Vec::new(),
            tolerance: ToleranceAnalysisResult::default(),
            fabrication: FabricationResult::default(),
            routing_hints: Vec::new(),
            bom_entries: Vec::new(),
            has_text: false,
            has_bom: false,
            is_assembly_level: false,
            confidence: 0.0,
            coverage: CoverageAssessment::default(),
        }
    }

    /// Part number from the title block, if one was read
    pub fn part_number(&self) -> Option<&str> {
        self.title_block
            .part_number
            .as_ref()
            .map(|f| f.value.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn description(&self) -> Option<&str> {
        self.title_block.description.as_ref().map(|f| f.value.as_str())
    }

    /// Recompute assembly level, confidence and coverage from the extracted facts.
    /// Needed whenever the title block changes after analysis.
    pub fn refresh_signals(&mut self) {
        if !self.has_text {
            return;
        }
        self.is_assembly_level = self.has_bom
            || self
                .description()
                .is_some_and(|d| ASSEMBLY_KEYWORD.is_match(d));

        let mut signals = Vec::new();
        if !self.title_block.is_empty() {
            signals.push(self.title_block.overall_confidence);
        }
        if !self.notes.is_empty() {
            signals.push(mean_confidence(
                &self.notes.iter().map(|n| n.confidence).collect::<Vec<_>>(),
            ));
        }
        if !self.spec_matches.is_empty() {
            signals.push(mean_confidence(
                &self.spec_matches.iter().map(|s| s.confidence).collect::<Vec<_>>(),
            ));
        }
        self.confidence = mean_confidence(&signals);

        self.coverage = check_coverage_density(
            1,
            self.notes.len(),
            self.gdt_callouts.len(),
            self.tolerance.has_tolerances(),
            !self.title_block.is_empty(),
        );
    }
}

static BOM_TITLE: Lazy<Regex> =
    Lazy::new(|| static_regex(r"(?i)\b(?:BILL[ \t]+OF[ \t]+MATERIALS?|PARTS[ \t]+LIST)\b"));

static BOM_HEADER: Lazy<Regex> = Lazy::new(|| {
    static_regex(concat!(
        r"(?i)^[ \t|]*(?:ITEM|FIND)(?:[ \t]*(?:NO\.?|#))?\b",
        r".*\b(?:PART[ \t]*(?:NO\.?|NUMBER|#)|P/N)",
        r"|^[ \t|]*(?:ITEM|FIND)(?:[ \t]*(?:NO\.?|#))?\b.*\bQTY\b",
    ))
});

static QTY_COLUMN: Lazy<Regex> = Lazy::new(|| static_regex(r"(?i)\bQTY\b|\bQUANTITY\b"));

static PART_COLUMN: Lazy<Regex> =
    Lazy::new(|| static_regex(r"(?i)\bPART[ \t]*(?:NO\.?|NUMBER|#)|\bP/N\b"));

// ITEM  PART-NO  DESCRIPTION  QTY
static ROW_QTY_LAST: Lazy<Regex> = Lazy::new(|| {
    static_regex(r"^\s*(\d{1,3})\s+([A-Za-z0-9][A-Za-z0-9._/-]*)\s+(.*?\S)\s+(\d{1,4})\s*$")
});

// ITEM  QTY  PART-NO  DESCRIPTION
static ROW_QTY_SECOND: Lazy<Regex> = Lazy::new(|| {
    static_regex(r"^\s*(\d{1,3})\s+(\d{1,4})\s+([A-Za-z0-9][A-Za-z0-9._/-]*)\s+(.*?\S)\s*$")
});

static ASSEMBLY_KEYWORD: Lazy<Regex> =
    Lazy::new(|| static_regex(r"(?i)\b(?:ASSY|ASSEMBLY|WELDMENT)\b"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BomLayout {
    QuantityLast,
    QuantitySecond,
}

fn parse_bom_row(line: &str, layout: BomLayout) -> Option<BomEntry> {
    let cleaned = line.replace('|', " ");
    match layout {
        BomLayout::QuantityLast => {
            let caps = ROW_QTY_LAST.captures(&cleaned)?;
            Some(BomEntry {
                item: caps[1].parse().ok()?,
                part_number: caps[2].to_string(),
                description: normalize_spacing(&caps[3]),
                quantity: caps[4].parse().ok()?,
            })
        }
        BomLayout::QuantitySecond => {
            let caps = ROW_QTY_SECOND.captures(&cleaned)?;
            Some(BomEntry {
                item: caps[1].parse().ok()?,
                part_number: caps[3].to_string(),
                description: normalize_spacing(&caps[4]),
                quantity: caps[2].parse().ok()?,
            })
        }
    }
}

fn normalize_spacing(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// BOM tables found on a page, with the line numbers they occupy
struct BomScan {
    has_bom: bool,
    entries: Vec<BomEntry>,
    table_lines: HashSet<usize>,
}

fn scan_bom(text: &str) -> BomScan {
    let lines: Vec<&str> = text.lines().collect();
    let mut found_header = false;
    let mut entries = Vec::new();
    let mut table_lines = HashSet::new();

    let mut i = 0;
    while i < lines.len() {
        let header = lines[i];
        i += 1;
        if !BOM_HEADER.is_match(header) {
            continue;
        }
        found_header = true;
        table_lines.insert(i - 1);

        let layout = match (QTY_COLUMN.find(header), PART_COLUMN.find(header)) {
            (Some(qty), Some(part)) if qty.start() < part.start() => BomLayout::QuantitySecond,
            _ => BomLayout::QuantityLast,
        };

        let mut rows = 0;
        while i < lines.len() {
            let line = lines[i];
            if line.trim().is_empty() {
                i += 1;
                continue;
            }
            match parse_bom_row(line, layout) {
                Some(entry) => {
                    entries.push(entry);
                    table_lines.insert(i);
                    rows += 1;
                    i += 1;
                }
                None => break,
            }
        }
        tracing::trace!(rows, ?layout, "parsed BOM table");
    }

    BomScan {
        has_bom: found_header || BOM_TITLE.is_match(text),
        entries,
        table_lines,
    }
}

/// Parse BOM rows following each header row. Returns (header found, rows).
pub fn parse_bom(text: &str) -> (bool, Vec<BomEntry>) {
    let scan = scan_bom(text);
    (scan.has_bom, scan.entries)
}

/// Page text with BOM header and row lines removed
fn without_lines(text: &str, skip: &HashSet<usize>) -> String {
    text.lines()
        .enumerate()
        .filter(|(i, _)| !skip.contains(i))
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn dedup_routing_hints(hints: Vec<RoutingHint>) -> Vec<RoutingHint> {
    let mut seen = HashSet::new();
    hints
        .into_iter()
        .filter(|h| {
            seen.insert((
                h.operation,
                h.work_center.clone(),
                normalize_text(&h.note_text),
            ))
        })
        .collect()
}

fn mean_confidence(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Runs the per-page extractors with a fixed shop profile
#[derive(Debug, Clone, Default)]
pub struct PageAnalyzer {
    classifier: FabricationToleranceClassifier,
}

impl PageAnalyzer {
    pub fn new(classifier: FabricationToleranceClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &FabricationToleranceClassifier {
        &self.classifier
    }

    /// Analyze one page of a drawing
    pub fn analyze_page(&self, pdf_path: &Path, page: &PageText) -> DrawingPageInfo {
        if !page.has_text() {
            tracing::debug!(path = %pdf_path.display(), page = page.page_number, "page has no text");
            return DrawingPageInfo::empty(pdf_path, page.page_number);
        }
        let text = page.full_text.as_str();

        let title_block = TitleBlockParser::parse(text);
        let spec_matches = SpecRecognizer::recognize(text);
        let bom = scan_bom(text);

        let note_text = if bom.table_lines.is_empty() {
            text.to_string()
        } else {
            without_lines(text, &bom.table_lines)
        };
        let mut notes = DrawingNoteExtractor::extract_notes(&note_text);
        let mut seen: HashSet<String> = notes.iter().map(DrawingNote::normalized).collect();
        for note in SpecRecognizer::to_informational_notes(&spec_matches) {
            if seen.insert(note.normalized()) {
                notes.push(note);
            }
        }

        let mut tolerance = ToleranceAnalyzer::analyze(text);
        let gdt_callouts = GdtExtractor::extract_with_units(text, tolerance.units);
        tolerance
            .cost_flags
            .extend(GdtExtractor::to_cost_flags(&gdt_callouts));
        let fabrication =
            self.classifier
                .classify(text, &tolerance.specific_tolerances, &gdt_callouts);

        let mut hints = DrawingNoteExtractor::generate_routing_hints(&notes);
        hints.extend(SpecRecognizer::to_routing_hints(&spec_matches));
        hints.extend(GdtExtractor::to_routing_hints(&gdt_callouts));
        hints.extend(fabrication.routing_hints.iter().cloned());
        let routing_hints = dedup_routing_hints(hints);

        let mut info = DrawingPageInfo {
            pdf_path: pdf_path.to_path_buf(),
            page_number: page.page_number,
            title_block,
            notes,
            spec_matches,
            gdt_callouts,
            tolerance,
            fabrication,
            routing_hints,
            bom_entries: bom.entries,
            has_text: true,
            has_bom: bom.has_bom,
            is_assembly_level: false,
            confidence: 0.0,
            coverage: CoverageAssessment::default(),
        };
        info.refresh_signals();

        tracing::debug!(
            path = %pdf_path.display(),
            page = page.page_number,
            part_number = info.part_number(),
            notes = info.notes.len(),
            gdt = info.gdt_callouts.len(),
            bom_rows = info.bom_entries.len(),
            "analyzed page"
        );
        info
    }
}

/// Analyze one page with the default shop profile
pub fn analyze_page(pdf_path: &Path, page: &PageText) -> DrawingPageInfo {
    PageAnalyzer::default().analyze_page(pdf_path, page)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSEMBLY_PAGE: &str = "\
PART NO: 500-100
DESCRIPTION: FRAME WELDMENT
MATERIAL: A36 STEEL
REV: B

ITEM  PART NUMBER   DESCRIPTION          QTY
1     500-101       SIDE RAIL            2
2     500-102       CROSS MEMBER         4
3     HW-0420       1/4-20 PEM NUT       8

NOTES:
1. WELD PER AWS D1.1
2. BREAK ALL SHARP EDGES
";

    #[test]
    fn test_parse_bom_quantity_last() {
        let (has_bom, rows) = parse_bom(ASSEMBLY_PAGE);
        assert!(has_bom);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].part_number, "500-101");
        assert_eq!(rows[0].description, "SIDE RAIL");
        assert_eq!(rows[1].quantity, 4);
        assert_eq!(rows[2].description, "1/4-20 PEM NUT");
    }

    #[test]
    fn test_parse_bom_quantity_second() {
        let text = "| ITEM | QTY | PART NO. | DESCRIPTION |\n| 1 | 2 | 7001-A | BRACKET |\n| 2 | 1 | 7002 | PLATE, BASE |\n";
        let (has_bom, rows) = parse_bom(text);
        assert!(has_bom);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].quantity, 2);
        assert_eq!(rows[0].part_number, "7001-A");
        assert_eq!(rows[1].description, "PLATE, BASE");
    }

    #[test]
    fn test_no_bom_on_detail_drawing() {
        let (has_bom, rows) = parse_bom("PART NO: 123\nNOTES:\n1. DEBURR ALL EDGES\n");
        assert!(!has_bom);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_analyze_assembly_page() {
        let info = analyze_page(Path::new("frame.pdf"), &PageText::new(1, ASSEMBLY_PAGE));
        assert!(info.has_text);
        assert!(info.has_bom);
        assert!(info.is_assembly_level);
        assert_eq!(info.part_number(), Some("500-100"));
        assert_eq!(info.bom_entries.len(), 3);
        assert!(!info.notes.is_empty());
        assert!(info.confidence > 0.0 && info.confidence <= 1.0);
    }

    #[test]
    fn test_description_marks_assembly_without_bom() {
        let text = "PART NO: 42-7\nDESCRIPTION: MOTOR MOUNT ASSY\n";
        let info = analyze_page(Path::new("mount.pdf"), &PageText::new(1, text));
        assert!(!info.has_bom);
        assert!(info.is_assembly_level);
    }

    #[test]
    fn test_identity_lines_and_bom_rows_are_not_notes() {
        let text = "PART NO: 67890\nDESCRIPTION: COVER PLATE\nREV: A\n\n\
            ITEM  PART NUMBER  DESCRIPTION  QTY\n\
            1     500-102      BASE PLATE   4\n\
            2     HW-0420      ZINC PLATED WASHER  8\n";
        let info = analyze_page(Path::new("cover.pdf"), &PageText::new(1, text));
        assert_eq!(info.bom_entries.len(), 2);
        assert!(info.notes.is_empty(), "{:?}", info.notes);
        assert!(info.routing_hints.is_empty(), "{:?}", info.routing_hints);
    }

    #[test]
    fn test_metric_page_gdt_matches_dimension_units() {
        use crate::analysis::fabrication::FabricationTier;
        use crate::core::types::{DrawingUnits, ToleranceTier};

        let text = "ALL DIMENSIONS IN MM\n25.00 ±0.05\nFLATNESS 0.05\nPOSITION Ø0.1 A B";
        let info = analyze_page(Path::new("metric.pdf"), &PageText::new(1, text));
        assert_eq!(info.tolerance.units, DrawingUnits::Millimeter);
        assert_eq!(info.gdt_callouts.len(), 2);
        assert!(info
            .gdt_callouts
            .iter()
            .all(|c| c.tier == ToleranceTier::Tight && c.tolerance_value < 0.005));
        assert_eq!(info.fabrication.overall_tier, FabricationTier::PrecisionMachining);
    }

    #[test]
    fn test_refresh_signals_follows_title_block() {
        let mut info = analyze_page(
            Path::new("mount.pdf"),
            &PageText::new(1, "NOTES:\n1. DEBURR ALL EDGES\n"),
        );
        assert!(!info.is_assembly_level);
        let before = info.confidence;

        info.title_block.description = Some(crate::extract::TitleBlockField {
            value: "MOTOR MOUNT ASSY".to_string(),
            confidence: 0.8,
        });
        info.title_block.recompute_confidence();
        info.refresh_signals();
        assert!(info.is_assembly_level);
        assert!((before - 0.9).abs() < 1e-9);
        assert!((info.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_blank_page_is_empty() {
        let info = analyze_page(Path::new("blank.pdf"), &PageText::new(3, "   \n"));
        assert!(!info.has_text);
        assert_eq!(info.page_number, 3);
        assert_eq!(info.confidence, 0.0);
        assert!(info.part_number().is_none());
    }

    #[test]
    fn test_routing_hints_are_distinct() {
        let text = "NOTES:\n1. DEBURR ALL EDGES\n2. DEBURR ALL EDGES.\n";
        let info = analyze_page(Path::new("p.pdf"), &PageText::new(1, text));
        let deburr = info
            .routing_hints
            .iter()
            .filter(|h| h.operation == crate::core::types::RoutingOperation::Deburr)
            .count();
        assert_eq!(deburr, 1);
    }
}
