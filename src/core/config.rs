//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analysis::fabrication::ShopProfile;
use crate::analysis::iso::{Iso13920GeometricClass, Iso13920LinearClass};

/// Name of the per-directory config file
pub const PROJECT_CONFIG_FILE: &str = ".drawscan.yaml";

/// Drawscan configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shop baseline ISO 13920 linear class (A-D)
    pub shop_linear_class: Option<String>,

    /// Shop baseline ISO 13920 geometric class (E-H)
    pub shop_geometric_class: Option<String>,

    /// Total band (inches) below which a dimension needs machining
    pub machining_band: Option<f64>,

    /// Total band (inches) below which a dimension needs precision machining
    pub precision_band: Option<f64>,

    /// Default output format
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_from(&cwd)
    }

    /// Load configuration using `dir` as the project directory
    pub fn load_from(dir: &Path) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/drawscan/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // 3. Project config (./.drawscan.yaml)
        if let Some(project) = Self::read_file(&dir.join(PROJECT_CONFIG_FILE)) {
            config.merge(project);
        }

        // 4. Environment variables
        if let Ok(class) = std::env::var("DRAWSCAN_SHOP_LINEAR") {
            config.shop_linear_class = Some(class);
        }
        if let Ok(class) = std::env::var("DRAWSCAN_SHOP_GEOMETRIC") {
            config.shop_geometric_class = Some(class);
        }
        if let Ok(format) = std::env::var("DRAWSCAN_FORMAT") {
            config.default_format = Some(format);
        }

        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "drawscan")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.shop_linear_class.is_some() {
            self.shop_linear_class = other.shop_linear_class;
        }
        if other.shop_geometric_class.is_some() {
            self.shop_geometric_class = other.shop_geometric_class;
        }
        if other.machining_band.is_some() {
            self.machining_band = other.machining_band;
        }
        if other.precision_band.is_some() {
            self.precision_band = other.precision_band;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
    }

    /// Build the shop profile, falling back to defaults for invalid values
    pub fn shop_profile(&self) -> ShopProfile {
        let mut profile = ShopProfile::default();

        if let Some(ref class) = self.shop_linear_class {
            match class.parse::<Iso13920LinearClass>() {
                Ok(c) => profile.linear_class = c,
                Err(e) => tracing::warn!("{}; using class {}", e, profile.linear_class),
            }
        }
        if let Some(ref class) = self.shop_geometric_class {
            match class.parse::<Iso13920GeometricClass>() {
                Ok(c) => profile.geometric_class = c,
                Err(e) => tracing::warn!("{}; using class {}", e, profile.geometric_class),
            }
        }
        if let Some(band) = self.machining_band.filter(|b| *b > 0.0) {
            profile.machining_band = band;
        }
        if let Some(band) = self.precision_band.filter(|b| *b > 0.0) {
            profile.precision_band = band;
        }
        if profile.precision_band > profile.machining_band {
            tracing::warn!(
                "precision_band {} exceeds machining_band {}; clamping",
                profile.precision_band,
                profile.machining_band
            );
            profile.precision_band = profile.machining_band;
        }

        profile
    }
}
