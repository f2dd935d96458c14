//! Core module - fundamental types and utilities

pub mod config;
pub mod error;
pub mod page;
pub mod types;

pub use config::Config;
pub use error::ScanError;
pub use page::PageText;
pub use types::{
    normalize_text, CostFlag, CostImpact, DrawingUnits, RoutingHint, RoutingOperation,
    ToleranceTier,
};
