//! ISO general tolerance tables
//!
//! ISO 13920 (welded constructions) linear classes A-D and geometric classes
//! E-H, and ISO 2768-1 linear classes f/m/c/v. All table values are ± in
//! millimetres. Classes are ordered tightest first.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

const MM_PER_INCH: f64 = 25.4;

pub fn mm_to_in(mm: f64) -> f64 {
    mm / MM_PER_INCH
}

pub fn in_to_mm(inches: f64) -> f64 {
    inches * MM_PER_INCH
}

/// An unrecognized tolerance class letter
#[derive(Debug, Error, Diagnostic)]
#[error("unknown {standard} class '{value}'")]
#[diagnostic(
    code(drawscan::config::unknown_class),
    help("ISO 13920 linear classes are A-D, geometric E-H; ISO 2768 classes are f, m, c, v")
)]
pub struct UnknownClassError {
    pub standard: &'static str,
    pub value: String,
}

macro_rules! tolerance_class {
    ($name:ident, $standard:literal, [$($variant:ident => $letter:literal),+ $(,)?]) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn letter(self) -> &'static str {
                match self {
                    $($name::$variant => $letter),+
                }
            }

            fn index(self) -> usize {
                self as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.letter())
            }
        }

        impl FromStr for $name {
            type Err = UnknownClassError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|c| c.letter().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| UnknownClassError {
                        standard: $standard,
                        value: wanted.to_string(),
                    })
            }
        }
    };
}

tolerance_class!(Iso13920LinearClass, "ISO 13920 linear", [A => "A", B => "B", C => "C", D => "D"]);
tolerance_class!(Iso13920GeometricClass, "ISO 13920 geometric", [E => "E", F => "F", G => "G", H => "H"]);
tolerance_class!(Iso2768Class, "ISO 2768", [Fine => "f", Medium => "m", Coarse => "c", VeryCoarse => "v"]);

/// Upper bounds (mm, inclusive) of the ISO 13920 linear nominal ranges, from 2 mm
const LINEAR_13920_RANGES: [f64; 11] = [
    30.0, 120.0, 400.0, 1000.0, 2000.0, 4000.0, 8000.0, 12000.0, 16000.0, 20000.0,
    f64::INFINITY,
];

const LINEAR_13920: [[f64; 11]; 4] = [
    [1.0, 1.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
    [1.0, 2.0, 2.0, 3.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0],
    [1.0, 3.0, 4.0, 6.0, 8.0, 11.0, 14.0, 18.0, 21.0, 24.0, 27.0],
    [1.0, 4.0, 7.0, 9.0, 12.0, 16.0, 21.0, 27.0, 32.0, 36.0, 40.0],
];

/// Upper bounds of the ISO 13920 geometric span ranges, from 30 mm
const GEOMETRIC_13920_RANGES: [f64; 10] = [
    120.0, 400.0, 1000.0, 2000.0, 4000.0, 8000.0, 12000.0, 16000.0, 20000.0, f64::INFINITY,
];

const GEOMETRIC_13920: [[f64; 10]; 4] = [
    [0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
    [1.0, 1.5, 3.0, 4.5, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0],
    [1.5, 3.0, 5.5, 9.0, 11.0, 16.0, 20.0, 22.0, 25.0, 25.0],
    [2.5, 5.0, 9.0, 14.0, 18.0, 26.0, 32.0, 36.0, 40.0, 40.0],
];

/// Upper bounds of the ISO 2768-1 linear ranges, from 0.5 mm
const LINEAR_2768_RANGES: [f64; 8] = [3.0, 6.0, 30.0, 120.0, 400.0, 1000.0, 2000.0, 4000.0];

// NaN marks "no value" in the standard (f above 2000 mm, v below 3 mm)
const LINEAR_2768: [[f64; 8]; 4] = [
    [0.05, 0.05, 0.1, 0.15, 0.2, 0.3, 0.5, f64::NAN],
    [0.1, 0.1, 0.2, 0.3, 0.5, 0.8, 1.2, 2.0],
    [0.2, 0.3, 0.5, 0.8, 1.2, 2.0, 3.0, 4.0],
    [f64::NAN, 0.5, 1.0, 1.5, 2.5, 4.0, 6.0, 8.0],
];

fn lookup<const N: usize>(
    ranges: &[f64; N],
    row: &[f64; N],
    minimum: f64,
    size_mm: f64,
) -> Option<f64> {
    if size_mm.is_nan() || size_mm < minimum {
        return None;
    }
    let idx = ranges.iter().position(|upper| size_mm <= *upper)?;
    let value = row[idx];
    (!value.is_nan()).then_some(value)
}

/// Lookup and classification over the ISO general tolerance tables
pub struct IsoToleranceStandard;

impl IsoToleranceStandard {
    /// ISO 13920 linear tolerance (± mm) for a nominal length
    pub fn linear_13920(class: Iso13920LinearClass, nominal_mm: f64) -> Option<f64> {
        lookup(&LINEAR_13920_RANGES, &LINEAR_13920[class.index()], 2.0, nominal_mm)
    }

    /// ISO 13920 straightness/flatness/parallelism tolerance (mm) for a span
    pub fn geometric_13920(class: Iso13920GeometricClass, span_mm: f64) -> Option<f64> {
        lookup(&GEOMETRIC_13920_RANGES, &GEOMETRIC_13920[class.index()], 30.0, span_mm)
    }

    /// ISO 2768-1 linear tolerance (± mm) for a nominal length
    pub fn linear_2768(class: Iso2768Class, nominal_mm: f64) -> Option<f64> {
        lookup(&LINEAR_2768_RANGES, &LINEAR_2768[class.index()], 0.5, nominal_mm)
    }

    /// Loosest ISO 13920 linear class whose tolerance fits within `tolerance_mm`
    pub fn classify_13920_linear(nominal_mm: f64, tolerance_mm: f64) -> Option<Iso13920LinearClass> {
        loosest_fitting(
            Iso13920LinearClass::ALL,
            |c| Self::linear_13920(c, nominal_mm),
            tolerance_mm,
        )
    }

    /// Loosest ISO 13920 geometric class whose tolerance fits within `tolerance_mm`
    pub fn classify_13920_geometric(
        span_mm: f64,
        tolerance_mm: f64,
    ) -> Option<Iso13920GeometricClass> {
        loosest_fitting(
            Iso13920GeometricClass::ALL,
            |c| Self::geometric_13920(c, span_mm),
            tolerance_mm,
        )
    }

    /// Loosest ISO 2768-1 class whose tolerance fits within `tolerance_mm`
    pub fn classify_2768(nominal_mm: f64, tolerance_mm: f64) -> Option<Iso2768Class> {
        loosest_fitting(Iso2768Class::ALL, |c| Self::linear_2768(c, nominal_mm), tolerance_mm)
    }
}

fn loosest_fitting<C: Copy>(
    classes: &[C],
    table: impl Fn(C) -> Option<f64>,
    tolerance: f64,
) -> Option<C> {
    classes
        .iter()
        .rev()
        .copied()
        .find(|c| table(*c).is_some_and(|value| value <= tolerance + 1e-9))
}
