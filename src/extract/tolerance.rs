//! Dimensional tolerance and surface finish analysis
//!
//! Reads the general tolerance block, specific dimension tolerances in the
//! `±`, `+X/-Y` and `+X -Y` forms, and `Ra` / `RMS` surface finish callouts.
//! Bands are classified in inches; metric drawings are converted first.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::{parse_number, static_regex};
use crate::core::types::{CostFlag, DrawingUnits, ToleranceTier};

/// Numeric token as written on drawings (".005", "0.005", "5")
const NUM: &str = r"(\d*\.\d+|\d+(?:\.\d+)?)";

/// Plus-minus sign in its flattened spellings
const PLUS_MINUS: &str = r"(?:±|\+/-|\+-)";

/// Micrometres to microinches
const UIN_PER_UM: f64 = 39.37;

/// RMS to Ra conversion factor
const RMS_PER_RA: f64 = 1.11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceType {
    Bilateral,
    Unilateral,
}

/// A tolerance attached to one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionTolerance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal: Option<f64>,
    pub plus: f64,
    pub minus: f64,
    /// plus + minus, in inches
    pub total_band: f64,
    pub tolerance_type: ToleranceType,
    pub tier: ToleranceTier,
    pub raw_text: String,
}

/// Title block general tolerance
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneralTolerance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_place: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_place: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub three_place: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub four_place: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fractional: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fractional_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angular_degrees: Option<f64>,
    #[serde(default)]
    pub units: DrawingUnits,
    pub tier: ToleranceTier,
}

impl GeneralTolerance {
    /// Tightest populated decimal place, falling back to the fractional band
    pub fn tightest_place(&self) -> Option<f64> {
        [self.one_place, self.two_place, self.three_place, self.four_place]
            .into_iter()
            .flatten()
            .reduce(f64::min)
            .or(self.fractional)
    }

    /// Tightest place as a ± value in inches
    pub fn band_inches(&self) -> Option<f64> {
        self.tightest_place().map(|v| self.units.to_inches(v))
    }

    fn is_empty(&self) -> bool {
        self.tightest_place().is_none() && self.angular_degrees.is_none()
    }

    fn set_place(&mut self, places: usize, value: f64) {
        let slot = match places {
            1 => &mut self.one_place,
            2 => &mut self.two_place,
            3 => &mut self.three_place,
            _ => &mut self.four_place,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceFinishUnit {
    Ra,
    Rms,
}

impl std::fmt::Display for SurfaceFinishUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceFinishUnit::Ra => write!(f, "Ra"),
            SurfaceFinishUnit::Rms => write!(f, "RMS"),
        }
    }
}

/// Surface roughness requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceFinishCallout {
    /// Roughness in microinches, in the callout's own unit
    pub value: f64,
    pub unit: SurfaceFinishUnit,
    pub tier: ToleranceTier,
}

impl SurfaceFinishCallout {
    /// Equivalent Ra in microinches
    pub fn ra(&self) -> f64 {
        match self.unit {
            SurfaceFinishUnit::Ra => self.value,
            SurfaceFinishUnit::Rms => self.value / RMS_PER_RA,
        }
    }
}

/// Everything the analyzer found on one page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToleranceAnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_tolerance: Option<GeneralTolerance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specific_tolerances: Vec<DimensionTolerance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub surface_finish_callouts: Vec<SurfaceFinishCallout>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cost_flags: Vec<CostFlag>,
    pub overall_tier: ToleranceTier,
    /// Smallest specific tolerance band, in inches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tightest_dimension_band: Option<f64>,
    #[serde(default)]
    pub units: DrawingUnits,
}

impl ToleranceAnalysisResult {
    pub fn has_cost_flags(&self) -> bool {
        !self.cost_flags.is_empty()
    }

    /// Whether anything tolerance-related was found
    pub fn has_tolerances(&self) -> bool {
        self.general_tolerance.is_some()
            || !self.specific_tolerances.is_empty()
            || !self.surface_finish_callouts.is_empty()
    }
}

static PLACE_BAND: Lazy<Regex> = Lazy::new(|| {
    static_regex(&format!(
        r"(?i)(?:(?:\bX)?\.(X{{1,4}})\b|\b([1-4])[ \t]*(?:PL(?:ACES?|\.)?|PLACE)\b(?:[ \t]+DEC(?:IMALS?)?\b)?)[ \t]*[:=]?[ \t]*{PLUS_MINUS}[ \t]*{NUM}"
    ))
});

static FRACTIONAL: Lazy<Regex> = Lazy::new(|| {
    static_regex(&format!(
        r"{PLUS_MINUS}[ \t]*(\d+)[ \t]*/[ \t]*(\d+)\b"
    ))
});

static ANGULAR: Lazy<Regex> = Lazy::new(|| {
    static_regex(&format!(
        r#"(?i)\bANG(?:LES?|ULAR)\b[^±\n]*?{PLUS_MINUS}[ \t]*(?:{NUM}[ \t]*(?:°|\bDEG(?:REES?)?\b))?[ \t]*(?:(\d+)[ \t]*(?:'|′|\bMIN\b))?"#
    ))
});

static SYMMETRIC: Lazy<Regex> =
    Lazy::new(|| static_regex(&format!(r"{NUM}[ \t]*{PLUS_MINUS}[ \t]*{NUM}")));

static PLUS_THEN_MINUS: Lazy<Regex> = Lazy::new(|| {
    static_regex(&format!(
        r"(?:{NUM}[ \t]*)?\+[ \t]*{NUM}[ \t]*(?:/[ \t]*|[ \t]+)-[ \t]*{NUM}"
    ))
});

static RA_FINISH: Lazy<Regex> = Lazy::new(|| {
    static_regex(&format!(
        r"(?i)\bRa\b[ \t]*[:=]?[ \t]*{NUM}[ \t]*(µm|μm|um|µin|μin|uin|MICRO[ \t-]?IN(?:CH(?:ES)?)?)?"
    ))
});

static RMS_FINISH: Lazy<Regex> = Lazy::new(|| {
    static_regex(&format!(
        r"(?i)\b{NUM}[ \t]*(?:µin|μin|uin)?[ \t]*\bRMS\b|\bRMS\b[ \t]*[:=]?[ \t]*{NUM}"
    ))
});

static METRIC_UNITS: Lazy<Regex> = Lazy::new(|| {
    static_regex(
        r"(?i)\bDIMENSIONS[ \t]+(?:ARE[ \t]+)?(?:IN[ \t]+)?(?:MM|MILLIMET(?:ER|RE)S)\b|\bUNITS?[ \t]*[:=]?[ \t]*(?:MM|MILLIMET(?:ER|RE)S)\b|\bDIMENSIONS[ \t]*[:=][ \t]*MM\b",
    )
});

/// Analyzes tolerance requirements in page text
pub struct ToleranceAnalyzer;

impl ToleranceAnalyzer {
    /// Drawing units; inches unless the page declares millimetres
    pub fn detect_units(text: &str) -> DrawingUnits {
        if METRIC_UNITS.is_match(text) {
            DrawingUnits::Millimeter
        } else {
            DrawingUnits::Inch
        }
    }

    /// Dimension band tier; bounds are strict
    pub fn classify_dimension_tier(band: f64) -> ToleranceTier {
        if band < 0.003 {
            ToleranceTier::Precision
        } else if band < 0.006 {
            ToleranceTier::Tight
        } else if band < 0.015 {
            ToleranceTier::Moderate
        } else {
            ToleranceTier::Standard
        }
    }

    /// General tolerance tier from a ± value in inches
    pub fn classify_general_tier(plus_minus: f64) -> ToleranceTier {
        if plus_minus <= 0.0005 {
            ToleranceTier::Precision
        } else if plus_minus <= 0.001 {
            ToleranceTier::Tight
        } else if plus_minus <= 0.003 {
            ToleranceTier::Moderate
        } else {
            ToleranceTier::Standard
        }
    }

    /// Surface finish tier from Ra in microinches
    pub fn classify_surface_finish(ra: f64) -> ToleranceTier {
        if ra <= 16.0 {
            ToleranceTier::Precision
        } else if ra <= 32.0 {
            ToleranceTier::Tight
        } else if ra <= 63.0 {
            ToleranceTier::Moderate
        } else {
            ToleranceTier::Standard
        }
    }

    /// Parse the general tolerance block, if the page has one
    pub fn parse_general_tolerance(text: &str) -> Option<GeneralTolerance> {
        let units = Self::detect_units(text);
        let mut general = GeneralTolerance {
            units,
            ..Default::default()
        };

        for caps in PLACE_BAND.captures_iter(text) {
            let places = caps
                .get(1)
                .map(|x| x.as_str().len())
                .or_else(|| caps.get(2).and_then(|d| d.as_str().parse().ok()));
            let value = caps.get(3).and_then(|v| parse_number(v.as_str()));
            if let (Some(places), Some(value)) = (places, value) {
                if value > 0.0 {
                    general.set_place(places, value);
                }
            }
        }

        if let Some(caps) = FRACTIONAL.captures(text) {
            let numerator = parse_number(&caps[1]);
            let denominator = parse_number(&caps[2]).filter(|d| *d > 0.0);
            if let (Some(n), Some(d)) = (numerator, denominator) {
                general.fractional = Some(n / d);
                general.fractional_text = Some(format!("±{}/{}", &caps[1], &caps[2]));
            }
        }

        general.angular_degrees = ANGULAR.captures_iter(text).find_map(|caps| angular_value(&caps));

        if general.is_empty() {
            return None;
        }

        general.tier = general
            .band_inches()
            .map(Self::classify_general_tier)
            .unwrap_or_default();
        Some(general)
    }

    /// Full tolerance analysis of one page
    pub fn analyze(text: &str) -> ToleranceAnalysisResult {
        let units = Self::detect_units(text);
        let general_tolerance = Self::parse_general_tolerance(text);
        let specific_tolerances = extract_specific(text, units);
        let surface_finish_callouts = extract_surface_finish(text, units);

        let mut cost_flags = Vec::new();
        let mut overall_tier = ToleranceTier::Standard;

        if let Some(ref general) = general_tolerance {
            overall_tier = overall_tier.max(general.tier);
            if general.tier.is_cost_relevant() {
                let band = general.tightest_place().unwrap_or_default();
                cost_flags.push(CostFlag::new(
                    "GENERAL TOL",
                    format!("General tolerance ±{} {} ({} tier)", band, units, general.tier),
                    general.tier.cost_impact(),
                ));
            }
        }

        for tol in &specific_tolerances {
            overall_tier = overall_tier.max(tol.tier);
            if tol.tier.is_cost_relevant() {
                cost_flags.push(CostFlag::new(
                    "DIMENSION",
                    format!("{} band {:.4} in ({} tier)", tol.raw_text, tol.total_band, tol.tier),
                    tol.tier.cost_impact(),
                ));
            }
        }

        for finish in &surface_finish_callouts {
            overall_tier = overall_tier.max(finish.tier);
            if finish.tier.is_cost_relevant() {
                cost_flags.push(CostFlag::new(
                    "SURFACE FINISH",
                    format!("{} {} µin ({} tier)", finish.unit, finish.value, finish.tier),
                    finish.tier.cost_impact(),
                ));
            }
        }

        let tightest_dimension_band = specific_tolerances
            .iter()
            .map(|t| t.total_band)
            .reduce(f64::min);

        ToleranceAnalysisResult {
            general_tolerance,
            specific_tolerances,
            surface_finish_callouts,
            cost_flags,
            overall_tier,
            tightest_dimension_band,
            units,
        }
    }
}

fn angular_value(caps: &Captures<'_>) -> Option<f64> {
    let degrees = caps.get(1).and_then(|d| parse_number(d.as_str()));
    let minutes = caps.get(2).and_then(|m| parse_number(m.as_str()));
    match (degrees, minutes) {
        (None, None) => None,
        (d, m) => Some(d.unwrap_or(0.0) + m.unwrap_or(0.0) / 60.0),
    }
}

/// The character right after a match, used to reject fractions and angles
fn next_char(text: &str, end: usize) -> Option<char> {
    text[end..].chars().next()
}

fn extract_specific(text: &str, units: DrawingUnits) -> Vec<DimensionTolerance> {
    let mut tolerances: Vec<DimensionTolerance> = Vec::new();

    let mut push = |nominal: Option<f64>, plus: f64, minus: f64, raw: &str| {
        let total_band = units.to_inches(plus + minus);
        if total_band <= 0.0 || total_band >= 1.0 {
            return;
        }
        let duplicate = tolerances
            .iter()
            .any(|t| t.nominal == nominal && t.plus == plus && t.minus == minus);
        if duplicate {
            return;
        }
        let tolerance_type = if plus == 0.0 || minus == 0.0 {
            ToleranceType::Unilateral
        } else {
            ToleranceType::Bilateral
        };
        tolerances.push(DimensionTolerance {
            nominal,
            plus,
            minus,
            total_band,
            tolerance_type,
            tier: ToleranceAnalyzer::classify_dimension_tier(total_band),
            raw_text: raw.trim().to_string(),
        });
    };

    for caps in SYMMETRIC.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if matches!(next_char(text, whole.end()), Some('/' | '°' | '\'' | '′')) {
            continue;
        }
        let nominal = parse_number(&caps[1]);
        if let Some(value) = parse_number(&caps[2]) {
            push(nominal, value, value, whole.as_str());
        }
    }

    for caps in PLUS_THEN_MINUS.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let nominal = caps.get(1).and_then(|n| parse_number(n.as_str()));
        let plus = parse_number(&caps[2]);
        let minus = parse_number(&caps[3]);
        if let (Some(plus), Some(minus)) = (plus, minus) {
            push(nominal, plus, minus, whole.as_str());
        }
    }

    tolerances
}

fn extract_surface_finish(text: &str, units: DrawingUnits) -> Vec<SurfaceFinishCallout> {
    let mut callouts: Vec<SurfaceFinishCallout> = Vec::new();
    let mut push = |value: f64, unit: SurfaceFinishUnit| {
        if value <= 0.0 || callouts.iter().any(|c| c.value == value && c.unit == unit) {
            return;
        }
        let ra = match unit {
            SurfaceFinishUnit::Ra => value,
            SurfaceFinishUnit::Rms => value / RMS_PER_RA,
        };
        callouts.push(SurfaceFinishCallout {
            value,
            unit,
            tier: ToleranceAnalyzer::classify_surface_finish(ra),
        });
    };

    for caps in RA_FINISH.captures_iter(text) {
        let Some(value) = parse_number(&caps[1]) else { continue };
        let micrometres = match caps.get(2) {
            Some(unit) => unit.as_str().to_lowercase().ends_with('m'),
            None => units == DrawingUnits::Millimeter,
        };
        let value = if micrometres { value * UIN_PER_UM } else { value };
        push((value * 10.0).round() / 10.0, SurfaceFinishUnit::Ra);
    }

    for caps in RMS_FINISH.captures_iter(text) {
        let Some(value) = caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|v| parse_number(v.as_str()))
        else {
            continue;
        };
        push(value, SurfaceFinishUnit::Rms);
    }

    callouts
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL_BLOCK: &str = "UNLESS OTHERWISE SPECIFIED\n\
        TOLERANCES:\n\
        .X = ±.1\n\
        .XX = ±.01\n\
        .XXX = ±.005\n\
        FRACTIONS ±1/64\n\
        ANGLES ±0°30'\n";

    #[test]
    fn test_general_tolerance_block() {
        let general = ToleranceAnalyzer::parse_general_tolerance(TOL_BLOCK).unwrap();
        assert_eq!(general.one_place, Some(0.1));
        assert_eq!(general.two_place, Some(0.01));
        assert_eq!(general.three_place, Some(0.005));
        assert_eq!(general.four_place, None);
        assert!((general.fractional.unwrap() - 1.0 / 64.0).abs() < 1e-12);
        assert_eq!(general.fractional_text.as_deref(), Some("±1/64"));
        assert!((general.angular_degrees.unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(general.tier, ToleranceTier::Standard);
    }

    #[test]
    fn test_general_tier_from_tightest_place() {
        let general =
            ToleranceAnalyzer::parse_general_tolerance("3 PL ±.005\n4 PL ±.0005").unwrap();
        assert_eq!(general.four_place, Some(0.0005));
        assert_eq!(general.tier, ToleranceTier::Precision);
    }

    #[test]
    fn test_angular_whole_degrees() {
        let general = ToleranceAnalyzer::parse_general_tolerance("ANGLES ±1°").unwrap();
        assert_eq!(general.angular_degrees, Some(1.0));
        assert!(general.tightest_place().is_none());
    }

    #[test]
    fn test_unlabelled_angle_is_not_general() {
        assert!(ToleranceAnalyzer::parse_general_tolerance("CHAMFER 45° ±1°").is_none());
        assert!(ToleranceAnalyzer::analyze("CHAMFER 45° ±1°").general_tolerance.is_none());

        let general =
            ToleranceAnalyzer::parse_general_tolerance("ANGULAR DIMENSIONS: ±0.5°").unwrap();
        assert_eq!(general.angular_degrees, Some(0.5));
    }

    #[test]
    fn test_no_general_tolerance() {
        assert!(ToleranceAnalyzer::parse_general_tolerance("BREAK ALL EDGES").is_none());
    }

    #[test]
    fn test_general_block_is_not_a_specific_tolerance() {
        let result = ToleranceAnalyzer::analyze(TOL_BLOCK);
        assert!(result.specific_tolerances.is_empty());
    }

    #[test]
    fn test_specific_tolerance_forms() {
        let text = "1.250 ±.005\n0.500 +.002/-.000\n2.000 +.003 -.001";
        let result = ToleranceAnalyzer::analyze(text);
        assert_eq!(result.specific_tolerances.len(), 3);

        let symmetric = &result.specific_tolerances[0];
        assert_eq!(symmetric.nominal, Some(1.25));
        assert!((symmetric.total_band - 0.010).abs() < 1e-12);
        assert_eq!(symmetric.tolerance_type, ToleranceType::Bilateral);
        assert_eq!(symmetric.tier, ToleranceTier::Moderate);

        let unilateral = &result.specific_tolerances[1];
        assert_eq!(unilateral.tolerance_type, ToleranceType::Unilateral);
        assert!((unilateral.total_band - 0.002).abs() < 1e-12);
        assert_eq!(unilateral.tier, ToleranceTier::Precision);

        let split = &result.specific_tolerances[2];
        assert_eq!(split.tolerance_type, ToleranceType::Bilateral);
        assert!((split.total_band - 0.004).abs() < 1e-12);

        assert_eq!(result.tightest_dimension_band, Some(0.002));
        assert_eq!(result.overall_tier, ToleranceTier::Precision);
    }

    #[test]
    fn test_identical_tolerances_dedup() {
        let result = ToleranceAnalyzer::analyze("1.000 ±.010\n1.000 ±.010\n1.000 +/-.010");
        assert_eq!(result.specific_tolerances.len(), 1);
        assert!(!result.has_cost_flags());
    }

    #[test]
    fn test_narrow_band_never_standard() {
        let mut band = 0.0001;
        while band < 0.006 {
            let tier = ToleranceAnalyzer::classify_dimension_tier(band);
            assert!(matches!(tier, ToleranceTier::Tight | ToleranceTier::Precision));
            band += 0.0001;
        }
        assert_eq!(
            ToleranceAnalyzer::classify_dimension_tier(0.006),
            ToleranceTier::Moderate
        );
        assert_eq!(
            ToleranceAnalyzer::classify_dimension_tier(0.015),
            ToleranceTier::Standard
        );
    }

    #[test]
    fn test_surface_finish() {
        let result = ToleranceAnalyzer::analyze("Ra 32\n125 RMS\nRa 0.4 µm");
        assert_eq!(result.surface_finish_callouts.len(), 3);

        let ra = &result.surface_finish_callouts[0];
        assert_eq!(ra.unit, SurfaceFinishUnit::Ra);
        assert_eq!(ra.tier, ToleranceTier::Tight);

        let metric = &result.surface_finish_callouts[1];
        assert!((metric.value - 15.7).abs() < 1e-9);
        assert_eq!(metric.tier, ToleranceTier::Precision);

        let rms = &result.surface_finish_callouts[2];
        assert_eq!(rms.unit, SurfaceFinishUnit::Rms);
        assert_eq!(rms.tier, ToleranceTier::Standard);
    }

    #[test]
    fn test_rms_converted_before_tiering() {
        // 69 RMS is about 62 Ra
        assert_eq!(
            ToleranceAnalyzer::classify_surface_finish(69.0 / 1.11),
            ToleranceTier::Moderate
        );
        let result = ToleranceAnalyzer::analyze("69 RMS");
        assert_eq!(result.surface_finish_callouts[0].tier, ToleranceTier::Moderate);
    }

    #[test]
    fn test_metric_bands_classified_in_inches() {
        let text = "ALL DIMENSIONS IN MM\n25.00 ±0.05";
        let result = ToleranceAnalyzer::analyze(text);
        assert_eq!(result.units, DrawingUnits::Millimeter);
        let tol = &result.specific_tolerances[0];
        assert!((tol.total_band - 0.1 / 25.4).abs() < 1e-9);
        assert_eq!(tol.tier, ToleranceTier::Tight);
    }

    #[test]
    fn test_cost_flags_carry_sources() {
        let text = "4 PL ±.0005\n1.000 ±.001\nRa 16";
        let result = ToleranceAnalyzer::analyze(text);
        let sources: Vec<_> = result.cost_flags.iter().map(|f| f.source.as_str()).collect();
        assert!(sources.contains(&"GENERAL TOL"));
        assert!(sources.contains(&"DIMENSION"));
        assert!(sources.contains(&"SURFACE FINISH"));
        assert!(result.has_cost_flags());
    }

    #[test]
    fn test_empty_text() {
        let result = ToleranceAnalyzer::analyze("");
        assert!(!result.has_tolerances());
        assert_eq!(result.overall_tier, ToleranceTier::Standard);
        assert_eq!(result.units, DrawingUnits::Inch);
    }
}
