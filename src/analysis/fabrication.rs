//! Fabrication tolerance classification
//!
//! Judges a page against what a welding / sheet metal shop holds without
//! secondary machining: ISO 13920 and ISO 2768 general tolerance classes,
//! tolerance bands that force machining, and press brake bend stackup.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::iso::{Iso13920GeometricClass, Iso13920LinearClass, Iso2768Class};
use crate::core::types::{CostFlag, CostImpact, RoutingHint, RoutingOperation};
use crate::extract::gdt::{GdtCallout, GdtFeatureType};
use crate::extract::static_regex;
use crate::extract::tolerance::DimensionTolerance;

/// What the shop holds as standard practice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShopProfile {
    pub linear_class: Iso13920LinearClass,
    pub geometric_class: Iso13920GeometricClass,
    /// Total band (in) below which a feature needs machining
    pub machining_band: f64,
    /// Total band (in) below which a feature needs precision machining
    pub precision_band: f64,
}

impl Default for ShopProfile {
    fn default() -> Self {
        Self {
            linear_class: Iso13920LinearClass::B,
            geometric_class: Iso13920GeometricClass::F,
            machining_band: 0.020,
            precision_band: 0.010,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum FabricationTier {
    #[default]
    ShopStandard,
    Machining,
    PrecisionMachining,
}

impl std::fmt::Display for FabricationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FabricationTier::ShopStandard => write!(f, "shop_standard"),
            FabricationTier::Machining => write!(f, "machining"),
            FabricationTier::PrecisionMachining => write!(f, "precision_machining"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum StackupRisk {
    #[default]
    None,
    Low,
    High,
}

impl std::fmt::Display for StackupRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackupRisk::None => write!(f, "none"),
            StackupRisk::Low => write!(f, "low"),
            StackupRisk::High => write!(f, "high"),
        }
    }
}

/// Fabrication tier of one GD&T callout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GdtFabTier {
    pub feature_type: GdtFeatureType,
    pub tolerance_value: f64,
    pub tier: FabricationTier,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FabricationResult {
    pub iso_13920_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_13920_linear_class: Option<Iso13920LinearClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_13920_geometric_class: Option<Iso13920GeometricClass>,
    pub iso_2768_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_2768_class: Option<Iso2768Class>,
    pub linear_tighter_than_shop: bool,
    pub geometric_tighter_than_shop: bool,
    pub requires_machining: bool,
    pub overall_tier: FabricationTier,
    pub bend_count: usize,
    pub bend_ref_dim_count: usize,
    pub bend_stackup_risk: StackupRisk,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gdt_fab_tiers: Vec<GdtFabTier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cost_flags: Vec<CostFlag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_hints: Vec<RoutingHint>,
    pub summary: String,
}

static ISO_13920: Lazy<Regex> = Lazy::new(|| {
    static_regex(r"(?i)\bISO[ \t]*13920[ \t]*[-:]?[ \t]*(?:CLASS[ \t]*)?([A-D])([E-H])?\b")
});

static ISO_2768: Lazy<Regex> = Lazy::new(|| {
    static_regex(r"(?i)\bISO[ \t]*2768(?:[ \t]*-[ \t]*1)?[ \t]*[-:]?[ \t]*([fmcv])([HKL])?\b")
});

static BEND_TOKEN: Lazy<Regex> =
    Lazy::new(|| static_regex(r"(?i)\bBEND[ \t]*(?:#|NO\.?)?[ \t]*(\d{1,3})\b"));

static BEND_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    static_regex(concat!(
        r"(?i)\b(?:TO|FROM)[ \t]+(?:BEND|MOLD)[ \t]*(?:LINE|CENTERLINE|CENTER)?\b",
        r"|\bBEND[ \t]+TO[ \t]+BEND\b",
        r"|\b(?:INSIDE|OUTSIDE)[ \t]+(?:OF[ \t]+)?BEND\b",
        r"|\b(?:BEND|MOLD)[ \t]+LINE\b",
    ))
});

const STACKUP_BENDS: usize = 4;
const STACKUP_REFERENCES: usize = 2;

/// Classifies fabrication difficulty against a shop profile
#[derive(Debug, Clone, Default)]
pub struct FabricationToleranceClassifier {
    profile: ShopProfile,
}

impl FabricationToleranceClassifier {
    pub fn new(profile: ShopProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &ShopProfile {
        &self.profile
    }

    /// Fabrication tier for a total band in inches
    pub fn band_tier(&self, band: f64) -> FabricationTier {
        if band < self.profile.precision_band {
            FabricationTier::PrecisionMachining
        } else if band < self.profile.machining_band {
            FabricationTier::Machining
        } else {
            FabricationTier::ShopStandard
        }
    }

    pub fn classify(
        &self,
        text: &str,
        dimensions: &[DimensionTolerance],
        gdt: &[GdtCallout],
    ) -> FabricationResult {
        let mut result = FabricationResult::default();

        self.check_iso_13920(text, &mut result);
        check_iso_2768(text, &mut result);

        let mut machined_dims = 0;
        let mut tightest_band: Option<f64> = None;
        for dim in dimensions {
            let tier = self.band_tier(dim.total_band);
            if tier > FabricationTier::ShopStandard {
                machined_dims += 1;
                tightest_band = Some(tightest_band.map_or(dim.total_band, |b| b.min(dim.total_band)));
            }
            result.overall_tier = result.overall_tier.max(tier);
        }

        for callout in gdt {
            let tier = self.band_tier(callout.tolerance_value);
            result.overall_tier = result.overall_tier.max(tier);
            result.gdt_fab_tiers.push(GdtFabTier {
                feature_type: callout.feature_type,
                tolerance_value: callout.tolerance_value,
                tier,
            });
        }
        let machined_gdt = result
            .gdt_fab_tiers
            .iter()
            .filter(|t| t.tier > FabricationTier::ShopStandard)
            .count();

        result.requires_machining = result.overall_tier >= FabricationTier::Machining;
        if result.requires_machining {
            let impact = match result.overall_tier {
                FabricationTier::PrecisionMachining => CostImpact::High,
                _ => CostImpact::Medium,
            };
            let mut detail = format!(
                "{} dimension(s) and {} GD&T callout(s) below the {:.3} in shop band",
                machined_dims, machined_gdt, self.profile.machining_band
            );
            if let Some(band) = tightest_band {
                detail.push_str(&format!(", tightest {:.4} in", band));
            }
            result.cost_flags.push(CostFlag::new("FABRICATION", detail.clone(), impact));
            result.routing_hints.push(RoutingHint::new(
                RoutingOperation::Machine,
                Some("MACHINE"),
                format!("MACHINING REQUIRED ({}): {}", result.overall_tier, detail),
                0.8,
            ));
        }

        let bends: BTreeSet<u32> = BEND_TOKEN
            .captures_iter(text)
            .filter_map(|caps| {
                let number = caps.get(1)?;
                if is_angle_suffix(&text[number.end()..]) {
                    return None;
                }
                number.as_str().parse().ok()
            })
            .collect();
        result.bend_count = bends.len();
        result.bend_ref_dim_count = BEND_REFERENCE.find_iter(text).count();
        result.bend_stackup_risk = if result.bend_count >= STACKUP_BENDS
            && result.bend_ref_dim_count >= STACKUP_REFERENCES
        {
            StackupRisk::High
        } else if result.bend_count > 0 {
            StackupRisk::Low
        } else {
            StackupRisk::None
        };

        if result.bend_stackup_risk == StackupRisk::High {
            let detail = format!(
                "{} bends with {} bend-referenced dimensions",
                result.bend_count, result.bend_ref_dim_count
            );
            result
                .cost_flags
                .push(CostFlag::new("BEND STACKUP", detail.clone(), CostImpact::High));
            result.routing_hints.push(RoutingHint::new(
                RoutingOperation::Review,
                Some("PRESS BRAKE"),
                format!("PRESS BRAKE STACKUP: {}", detail),
                0.8,
            ));
        }

        result.summary = summarize(&result);
        tracing::debug!("Fabrication: {}", result.summary);
        result
    }

    fn check_iso_13920(&self, text: &str, result: &mut FabricationResult) {
        let Some(caps) = ISO_13920.captures(text) else {
            return;
        };
        result.iso_13920_detected = true;
        result.iso_13920_linear_class = caps[1].parse().ok();
        result.iso_13920_geometric_class = caps.get(2).and_then(|g| g.as_str().parse().ok());

        if let Some(class) = result.iso_13920_linear_class {
            result.linear_tighter_than_shop = class < self.profile.linear_class;
            result.cost_flags.push(class_flag(
                "linear",
                class,
                self.profile.linear_class,
                result.linear_tighter_than_shop,
            ));
        }
        if let Some(class) = result.iso_13920_geometric_class {
            result.geometric_tighter_than_shop = class < self.profile.geometric_class;
            result.cost_flags.push(class_flag(
                "geometric",
                class,
                self.profile.geometric_class,
                result.geometric_tighter_than_shop,
            ));
        }
    }
}

fn class_flag(
    kind: &str,
    class: impl std::fmt::Display,
    shop: impl std::fmt::Display,
    tighter: bool,
) -> CostFlag {
    if tighter {
        CostFlag::new(
            "ISO 13920",
            format!("{} class {} is tighter than shop class {}", kind, class, shop),
            CostImpact::High,
        )
    } else {
        CostFlag::new(
            "ISO 13920",
            format!("{} class {} is within shop class {}", kind, class, shop),
            CostImpact::None,
        )
    }
}

fn check_iso_2768(text: &str, result: &mut FabricationResult) {
    let Some(caps) = ISO_2768.captures(text) else {
        return;
    };
    result.iso_2768_detected = true;
    result.iso_2768_class = caps[1].parse().ok();

    if let Some(class) = result.iso_2768_class {
        let impact = if class == Iso2768Class::Fine {
            CostImpact::Medium
        } else {
            CostImpact::None
        };
        result.cost_flags.push(CostFlag::new(
            "ISO 2768",
            format!("general tolerance class {}", class),
            impact,
        ));
    }
}

fn summarize(result: &FabricationResult) -> String {
    let mut parts = Vec::new();

    if result.iso_13920_detected {
        let classes = format!(
            "{}{}",
            result
                .iso_13920_linear_class
                .map(|c| c.to_string())
                .unwrap_or_default(),
            result
                .iso_13920_geometric_class
                .map(|c| c.to_string())
                .unwrap_or_default()
        );
        if result.linear_tighter_than_shop || result.geometric_tighter_than_shop {
            parts.push(format!("ISO 13920-{} tighter than shop", classes));
        } else {
            parts.push(format!("ISO 13920-{}", classes));
        }
    }
    if let Some(class) = result.iso_2768_class {
        parts.push(format!("ISO 2768-{}", class));
    }
    if result.requires_machining {
        parts.push(format!("machining required ({})", result.overall_tier));
    }
    if result.bend_count > 0 {
        parts.push(format!(
            "{} bends, stackup risk {}",
            result.bend_count, result.bend_stackup_risk
        ));
    }

    if parts.is_empty() {
        "shop standard".to_string()
    } else {
        parts.join("; ")
    }
}

/// "BEND 90° UP" names an angle, not a bend number
fn is_angle_suffix(rest: &str) -> bool {
    let rest = rest.trim_start_matches([' ', '\t']);
    rest.starts_with(['°', '\''])
        || rest
            .get(..3)
            .is_some_and(|s| s.eq_ignore_ascii_case("DEG"))
}
