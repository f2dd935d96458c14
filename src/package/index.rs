//! Drawing package index
//!
//! Groups analyzed pages by part number so multi-sheet drawings can be merged
//! into one [`DrawingData`] per part.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;

use super::page::{BomEntry, DrawingPageInfo};
use crate::analysis::confidence::{check_coverage_density, CoverageAssessment};
use crate::analysis::fabrication::FabricationTier;
use crate::core::types::{normalize_text, CostFlag, RoutingHint, ToleranceTier};
use crate::extract::{DrawingNote, GdtCallout, SpecMatch};

/// Index key for a part number: trimmed, uppercased, inner whitespace collapsed
pub fn normalize_part_number(part_number: &str) -> String {
    part_number
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// All pages of one scan, grouped by part number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawingPackageIndex {
    /// Files that contributed pages
    pub scanned_files: Vec<PathBuf>,
    pub total_pages: usize,
    /// Normalized part number -> pages in scan order
    pub pages_by_part_number: BTreeMap<String, Vec<DrawingPageInfo>>,
    /// Pages whose title block yielded no part number
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmatched_pages: Vec<DrawingPageInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_bom_entries: Vec<BomEntry>,
    pub scanned_at: DateTime<Utc>,
}

impl Default for DrawingPackageIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingPackageIndex {
    pub fn new() -> Self {
        Self {
            scanned_files: Vec::new(),
            total_pages: 0,
            pages_by_part_number: BTreeMap::new(),
            unmatched_pages: Vec::new(),
            all_bom_entries: Vec::new(),
            scanned_at: Utc::now(),
        }
    }

    /// Record a scanned file (once)
    pub fn add_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.scanned_files.contains(&path) {
            self.scanned_files.push(path);
        }
    }

    /// Add one analyzed page
    pub fn add_page(&mut self, page: DrawingPageInfo) {
        self.total_pages += 1;
        self.all_bom_entries.extend(page.bom_entries.iter().cloned());

        match page.part_number().map(normalize_part_number) {
            Some(key) => self.pages_by_part_number.entry(key).or_default().push(page),
            None => self.unmatched_pages.push(page),
        }
    }

    /// Fold another shard into this one. Shards are merged in the order given,
    /// so pages keep their per-shard order.
    pub fn merge(&mut self, other: DrawingPackageIndex) {
        for path in other.scanned_files {
            self.add_file(path);
        }
        self.total_pages += other.total_pages;
        for (key, pages) in other.pages_by_part_number {
            self.pages_by_part_number.entry(key).or_default().extend(pages);
        }
        self.unmatched_pages.extend(other.unmatched_pages);
        self.all_bom_entries.extend(other.all_bom_entries);
        self.scanned_at = self.scanned_at.max(other.scanned_at);
    }

    /// Pages for a part number: exact (case/trim-insensitive) match first,
    /// then keys containing the query or contained in it. Blank queries match nothing.
    pub fn find_pages(&self, query: &str) -> Vec<&DrawingPageInfo> {
        let key = normalize_part_number(query);
        if key.is_empty() {
            return Vec::new();
        }

        if let Some(pages) = self.pages_by_part_number.get(&key) {
            return pages.iter().collect();
        }

        self.pages_by_part_number
            .iter()
            .filter(|(k, _)| k.contains(&key) || key.contains(k.as_str()))
            .flat_map(|(_, pages)| pages.iter())
            .collect()
    }

    /// Merged view of every page for a part number, None when nothing matches
    pub fn build_drawing_data(&self, part_number: &str) -> Option<DrawingData> {
        let pages = self.find_pages(part_number);
        DrawingData::from_pages(&pages)
    }

    /// Number of pages with a part number
    pub fn matched_pages(&self) -> usize {
        self.pages_by_part_number.values().map(Vec::len).sum()
    }

    pub fn unique_part_numbers(&self) -> usize {
        self.pages_by_part_number.len()
    }

    /// One-line summary of the scan
    pub fn summary(&self) -> String {
        format!(
            "{} files, {} pages: {} part numbers, {} matched pages, {} unmatched pages, {} BOM entries",
            self.scanned_files.len(),
            self.total_pages,
            self.unique_part_numbers(),
            self.matched_pages(),
            self.unmatched_pages.len(),
            self.all_bom_entries.len()
        )
    }
}

fn first_supplied<'a>(
    pages: &[&'a DrawingPageInfo],
    get: impl Fn(&'a DrawingPageInfo) -> Option<&'a str>,
) -> Option<String> {
    pages
        .iter()
        .copied()
        .find_map(|p| get(p).filter(|v| !v.trim().is_empty()))
        .map(str::to_string)
}

/// Merged facts for one part across all of its drawing pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<DrawingNote>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gdt_callouts: Vec<GdtCallout>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_hints: Vec<RoutingHint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spec_matches: Vec<SpecMatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bom_entries: Vec<BomEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cost_flags: Vec<CostFlag>,
    pub source_pdf_path: PathBuf,
    pub page_count: usize,
    pub is_assembly_level: bool,
    pub tolerance_tier: ToleranceTier,
    pub fabrication_tier: FabricationTier,
    /// Smallest specific tolerance band across pages, in inches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tightest_dimension_band: Option<f64>,
    pub overall_confidence: f64,
    pub coverage: CoverageAssessment,
}

impl DrawingData {
    /// Merge pages of the same part, in order. None for an empty slice.
    pub fn from_pages(pages: &[&DrawingPageInfo]) -> Option<Self> {
        let first = pages.first()?;

        let mut data = DrawingData {
            part_number: first_supplied(pages, |p| p.part_number()),
            description: first_supplied(pages, |p| p.description()),
            material: first_supplied(pages, |p| {
                p.title_block.material.as_ref().map(|f| f.value.as_str())
            }),
            revision: first_supplied(pages, |p| {
                p.title_block.revision.as_ref().map(|f| f.value.as_str())
            }),
            notes: Vec::new(),
            gdt_callouts: Vec::new(),
            routing_hints: Vec::new(),
            spec_matches: Vec::new(),
            bom_entries: Vec::new(),
            cost_flags: Vec::new(),
            source_pdf_path: first.pdf_path.clone(),
            page_count: pages.len(),
            is_assembly_level: pages.iter().any(|p| p.is_assembly_level),
            tolerance_tier: ToleranceTier::default(),
            fabrication_tier: FabricationTier::default(),
            tightest_dimension_band: None,
            overall_confidence: 0.0,
            coverage: CoverageAssessment::default(),
        };

        let mut seen_notes = HashSet::new();
        let mut seen_gdt = HashSet::new();
        let mut seen_hints = HashSet::new();
        let mut seen_specs = BTreeSet::new();
        let mut seen_flags = HashSet::new();
        let mut has_tolerances = false;
        let mut confidences = Vec::new();

        for page in pages {
            for note in &page.notes {
                if seen_notes.insert(note.normalized()) {
                    data.notes.push(note.clone());
                }
            }
            for callout in &page.gdt_callouts {
                let key = (callout.feature_type, (callout.tolerance_value * 1e6).round() as i64);
                if seen_gdt.insert(key) {
                    data.gdt_callouts.push(callout.clone());
                }
            }
            for hint in &page.routing_hints {
                let key = (hint.operation, hint.work_center.clone(), normalize_text(&hint.note_text));
                if seen_hints.insert(key) {
                    data.routing_hints.push(hint.clone());
                }
            }
            for spec in &page.spec_matches {
                if seen_specs.insert(spec.spec_id.clone()) {
                    data.spec_matches.push(spec.clone());
                }
            }
            for flag in page.tolerance.cost_flags.iter().chain(&page.fabrication.cost_flags) {
                let key = (flag.source.clone(), normalize_text(&flag.description));
                if seen_flags.insert(key) {
                    data.cost_flags.push(flag.clone());
                }
            }
            data.bom_entries.extend(page.bom_entries.iter().cloned());

            data.tolerance_tier = data.tolerance_tier.max(page.tolerance.overall_tier);
            data.fabrication_tier = data.fabrication_tier.max(page.fabrication.overall_tier);
            if let Some(band) = page.tolerance.tightest_dimension_band {
                data.tightest_dimension_band =
                    Some(data.tightest_dimension_band.map_or(band, |b| b.min(band)));
            }
            has_tolerances |= page.tolerance.has_tolerances();
            if page.has_text {
                confidences.push(page.confidence);
            }
        }

        if !confidences.is_empty() {
            data.overall_confidence = confidences.iter().sum::<f64>() / confidences.len() as f64;
        }
        data.coverage = check_coverage_density(
            data.page_count,
            data.notes.len(),
            data.gdt_callouts.len(),
            has_tolerances,
            data.part_number.is_some(),
        );

        Some(data)
    }

    /// Highest cost impact among the merged flags
    pub fn max_cost_impact(&self) -> crate::core::types::CostImpact {
        self.cost_flags
            .iter()
            .map(|f| f.impact)
            .max()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::page::PageText;
    use crate::package::page::analyze_page;
    use std::path::Path;

    fn page(path: &str, number: u32, text: &str) -> DrawingPageInfo {
        analyze_page(Path::new(path), &PageText::new(number, text))
    }

    fn sample_index() -> DrawingPackageIndex {
        let mut index = DrawingPackageIndex::new();
        index.add_file("a.pdf");
        index.add_page(page("a.pdf", 1, "PART NO: 12345-01\nNOTES:\n1. DEBURR ALL EDGES"));
        index.add_page(page("a.pdf", 2, "PART NO: 12345-01\nNOTES:\n1. DEBURR ALL EDGES\n2. PAINT BLACK"));
        index.add_page(page("a.pdf", 3, "PART NO: 67890\nREV: A"));
        index
    }

    #[test]
    fn test_pages_grouped_by_part_number() {
        let index = sample_index();
        assert_eq!(index.total_pages, 3);
        assert_eq!(index.unique_part_numbers(), 2);
        assert_eq!(index.matched_pages(), 3);
        assert!(index.unmatched_pages.is_empty());
        assert_eq!(index.pages_by_part_number["12345-01"].len(), 2);
    }

    #[test]
    fn test_page_without_part_number_is_unmatched() {
        let mut index = DrawingPackageIndex::new();
        index.add_page(page("x.pdf", 1, "NOTES:\n1. DEBURR ALL EDGES"));
        assert_eq!(index.unmatched_pages.len(), 1);
        assert_eq!(index.unique_part_numbers(), 0);
    }

    #[test]
    fn test_find_pages_exact_and_containment() {
        let index = sample_index();
        assert_eq!(index.find_pages("  12345-01 ").len(), 2);
        assert_eq!(index.find_pages("12345").len(), 2);
        assert_eq!(index.find_pages("67890-XX").len(), 1);
        assert!(index.find_pages("").is_empty());
        assert!(index.find_pages("   ").is_empty());
        assert!(index.find_pages("99999").is_empty());
    }

    #[test]
    fn test_find_pages_is_case_insensitive() {
        let mut index = DrawingPackageIndex::new();
        index.add_page(page("b.pdf", 1, "PART NO: NM-1234-A"));
        assert_eq!(index.find_pages("nm-1234-a").len(), 1);
    }

    #[test]
    fn test_build_drawing_data_merges_pages() {
        let index = sample_index();
        let data = index.build_drawing_data("12345-01").unwrap();
        assert_eq!(data.page_count, 2);
        assert_eq!(data.part_number.as_deref(), Some("12345-01"));
        let deburr = data
            .notes
            .iter()
            .filter(|n| n.normalized() == "DEBURR ALL EDGES")
            .count();
        assert_eq!(deburr, 1);
        assert_eq!(data.notes.len(), 2);
        assert_eq!(data.source_pdf_path, PathBuf::from("a.pdf"));
    }

    #[test]
    fn test_build_drawing_data_missing_part() {
        assert!(sample_index().build_drawing_data("55555").is_none());
    }

    #[test]
    fn test_identity_from_first_supplying_page() {
        let mut index = DrawingPackageIndex::new();
        index.add_page(page("c.pdf", 1, "PART NO: 777-1"));
        index.add_page(page("c.pdf", 2, "PART NO: 777-1\nMATERIAL: 5052-H32 ALUMINUM\nREV: D"));
        let data = index.build_drawing_data("777-1").unwrap();
        assert_eq!(data.material.as_deref(), Some("5052-H32 ALUMINUM"));
        assert_eq!(data.revision.as_deref(), Some("D"));
    }

    #[test]
    fn test_merge_shards() {
        let mut left = DrawingPackageIndex::new();
        left.add_file("a.pdf");
        left.add_page(page("a.pdf", 1, "PART NO: 12345-01"));

        let mut right = DrawingPackageIndex::new();
        right.add_file("b.pdf");
        right.add_page(page("b.pdf", 1, "PART NO: 12345-01"));
        right.add_page(page("b.pdf", 2, "NOTES:\n1. DEBURR ALL EDGES"));

        left.merge(right);
        assert_eq!(left.scanned_files.len(), 2);
        assert_eq!(left.total_pages, 3);
        assert_eq!(left.pages_by_part_number["12345-01"].len(), 2);
        assert_eq!(left.pages_by_part_number["12345-01"][1].pdf_path, PathBuf::from("b.pdf"));
        assert_eq!(left.unmatched_pages.len(), 1);
    }

    #[test]
    fn test_summary_counts() {
        let summary = sample_index().summary();
        assert!(summary.contains("3 pages"));
        assert!(summary.contains("2 part numbers"));
    }
}
