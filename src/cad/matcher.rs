//! Matching CAD components to indexed drawings

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::package::index::normalize_part_number;
use crate::package::{DrawingPackageIndex, DrawingPageInfo};

const EXACT_PART_NUMBER_CONFIDENCE: f64 = 0.95;
const FILE_NAME_EXACT_CONFIDENCE: f64 = 0.85;
const FILE_NAME_CONTAINS_CONFIDENCE: f64 = 0.70;
const BOM_CONFIDENCE: f64 = 0.60;

/// Shortest stem considered for containment matching
const MIN_CONTAINMENT_LEN: usize = 3;

/// A component of a CAD assembly
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
}

impl ComponentInfo {
    pub fn new(file_path: Option<&str>, part_number: Option<&str>) -> Self {
        Self {
            file_path: file_path.map(PathBuf::from),
            part_number: part_number.map(str::to_string),
        }
    }

    /// File stem of the component's model file
    pub fn file_stem(&self) -> Option<String> {
        self.file_path.as_deref().and_then(file_stem)
    }

    /// Label for tables and logs
    pub fn label(&self) -> String {
        self.part_number
            .clone()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.file_path.as_ref().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "(unnamed)".to_string())
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(normalize_part_number)
        .filter(|s| !s.is_empty())
}

/// A page a component was matched to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub pdf_path: PathBuf,
    pub page_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
}

impl From<&DrawingPageInfo> for PageRef {
    fn from(page: &DrawingPageInfo) -> Self {
        Self {
            pdf_path: page.pdf_path.clone(),
            page_number: page.page_number,
            part_number: page.part_number().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    #[default]
    None,
    ExactPartNumber,
    FileName,
    Bom,
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchMethod::None => write!(f, "none"),
            MatchMethod::ExactPartNumber => write!(f, "exact_part_number"),
            MatchMethod::FileName => write!(f, "file_name"),
            MatchMethod::Bom => write!(f, "bom"),
        }
    }
}

/// Outcome of matching one component
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchResult {
    pub is_matched: bool,
    pub method: MatchMethod,
    pub confidence: f64,
    /// Index key of the matched drawing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<PageRef>,
}

impl MatchResult {
    fn unmatched() -> Self {
        Self::default()
    }

    fn matched(method: MatchMethod, confidence: f64, key: &str, pages: &[DrawingPageInfo]) -> Self {
        Self {
            is_matched: true,
            method,
            confidence,
            drawing_key: Some(key.to_string()),
            pages: pages.iter().map(PageRef::from).collect(),
        }
    }
}

/// A component paired with its match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMatch {
    pub component: ComponentInfo,
    pub result: MatchResult,
}

/// Matches for a whole assembly
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchAllResult {
    pub matched: Vec<ComponentMatch>,
    pub unmatched: Vec<ComponentInfo>,
    /// Drawing pages no component claimed, plus pages with no part number
    pub unmatched_drawings: Vec<PageRef>,
}

type Strategy = fn(&ComponentInfo, &DrawingPackageIndex) -> Option<MatchResult>;

// Tried in order; part number must win over file name.
const CASCADE: [(MatchMethod, Strategy); 3] = [
    (MatchMethod::ExactPartNumber, match_exact_part_number),
    (MatchMethod::FileName, match_file_name),
    (MatchMethod::Bom, match_bom),
];

fn match_exact_part_number(
    component: &ComponentInfo,
    index: &DrawingPackageIndex,
) -> Option<MatchResult> {
    let key = normalize_part_number(component.part_number.as_deref()?);
    let (key, pages) = index.pages_by_part_number.get_key_value(&key)?;
    Some(MatchResult::matched(
        MatchMethod::ExactPartNumber,
        EXACT_PART_NUMBER_CONFIDENCE,
        key,
        pages,
    ))
}

fn match_file_name(component: &ComponentInfo, index: &DrawingPackageIndex) -> Option<MatchResult> {
    let stem = component.file_stem()?;

    // Exact: stem equals a part number or a drawing's own file stem
    let exact = index.pages_by_part_number.iter().find(|(key, pages)| {
        **key == stem
            || pages
                .iter()
                .any(|p| file_stem(&p.pdf_path).as_deref() == Some(stem.as_str()))
    });
    if let Some((key, pages)) = exact {
        return Some(MatchResult::matched(
            MatchMethod::FileName,
            FILE_NAME_EXACT_CONFIDENCE,
            key,
            pages,
        ));
    }

    if stem.len() < MIN_CONTAINMENT_LEN {
        return None;
    }
    // Containment: prefer the longest overlapping part number
    index
        .pages_by_part_number
        .iter()
        .filter(|(key, _)| key.len() >= MIN_CONTAINMENT_LEN)
        .filter(|(key, _)| key.contains(stem.as_str()) || stem.contains(key.as_str()))
        .max_by_key(|(key, _)| key.len())
        .map(|(key, pages)| {
            MatchResult::matched(MatchMethod::FileName, FILE_NAME_CONTAINS_CONFIDENCE, key, pages)
        })
}

/// Component listed on an assembly BOM: matched to the assembly drawing
fn match_bom(component: &ComponentInfo, index: &DrawingPackageIndex) -> Option<MatchResult> {
    let wanted: Vec<String> = component
        .part_number
        .as_deref()
        .map(normalize_part_number)
        .into_iter()
        .chain(component.file_stem())
        .filter(|k| !k.is_empty())
        .collect();
    if wanted.is_empty() {
        return None;
    }

    index.pages_by_part_number.iter().find_map(|(key, pages)| {
        let listed = pages.iter().any(|page| {
            page.bom_entries
                .iter()
                .any(|entry| wanted.contains(&normalize_part_number(&entry.part_number)))
        });
        listed.then(|| MatchResult::matched(MatchMethod::Bom, BOM_CONFIDENCE, key, pages))
    })
}

/// Matches CAD components to drawings in a package index
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentDrawingMatcher;

impl ComponentDrawingMatcher {
    /// Match one component; no index means no match
    pub fn match_component(
        component: &ComponentInfo,
        index: Option<&DrawingPackageIndex>,
    ) -> MatchResult {
        let Some(index) = index else {
            return MatchResult::unmatched();
        };

        for (method, strategy) in CASCADE {
            if let Some(result) = strategy(component, index) {
                tracing::debug!(component = %component.label(), %method, confidence = result.confidence, "matched component");
                return result;
            }
        }
        tracing::debug!(component = %component.label(), "no drawing found for component");
        MatchResult::unmatched()
    }

    /// Match every component and report drawings nothing claimed
    pub fn match_all(
        components: Option<&[ComponentInfo]>,
        index: Option<&DrawingPackageIndex>,
    ) -> MatchAllResult {
        let Some(components) = components else {
            return MatchAllResult::default();
        };

        let mut result = MatchAllResult::default();
        let mut claimed = BTreeSet::new();

        for component in components {
            let matched = Self::match_component(component, index);
            if matched.is_matched {
                // A BOM match points at the parent assembly, it does not claim it
                if matched.method != MatchMethod::Bom {
                    if let Some(key) = &matched.drawing_key {
                        claimed.insert(key.clone());
                    }
                }
                result.matched.push(ComponentMatch {
                    component: component.clone(),
                    result: matched,
                });
            } else {
                result.unmatched.push(component.clone());
            }
        }

        if let Some(index) = index {
            result.unmatched_drawings = index
                .pages_by_part_number
                .iter()
                .filter(|(key, _)| !claimed.contains(*key))
                .flat_map(|(_, pages)| pages.iter().map(PageRef::from))
                .chain(index.unmatched_pages.iter().map(PageRef::from))
                .collect();
        }

        tracing::info!(
            matched = result.matched.len(),
            unmatched = result.unmatched.len(),
            unmatched_drawings = result.unmatched_drawings.len(),
            "matched components to drawings"
        );
        result
    }
}
