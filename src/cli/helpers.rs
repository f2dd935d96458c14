//! Shared helper functions for CLI commands

use clap::ValueEnum;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::analysis::fabrication::FabricationToleranceClassifier;
use crate::cli::OutputFormat;
use crate::core::Config;
use crate::package::{DrawingPackageScanner, PageAnalyzer};

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format a 0-1 confidence as a percentage
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Scanner configured from the layered config
pub fn scanner_from_config(config: &Config, jobs: usize) -> DrawingPackageScanner {
    let classifier = FabricationToleranceClassifier::new(config.shop_profile());
    DrawingPackageScanner::new(PageAnalyzer::new(classifier)).with_jobs(jobs)
}

/// Concrete output format: the flag, then the configured default, then `auto`
pub fn resolve_format(requested: OutputFormat, config: &Config, auto: OutputFormat) -> OutputFormat {
    if requested != OutputFormat::Auto {
        return requested;
    }
    let configured = config
        .default_format
        .as_deref()
        .and_then(|s| match OutputFormat::from_str(s, true) {
            Ok(format) => Some(format),
            Err(_) => {
                tracing::warn!("unknown default_format '{}' in config", s);
                None
            }
        });
    configured.unwrap_or(OutputFormat::Auto).or(auto)
}

/// Serialize a value as YAML or JSON
pub fn render_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(value).into_diagnostic()?;
            json.push('\n');
            Ok(json)
        }
        _ => serde_yml::to_string(value).into_diagnostic(),
    }
}

/// Write to a file, or stdout when no path is given
pub fn write_output(content: &str, output_path: Option<&Path>, quiet: bool) -> Result<()> {
    match output_path {
        Some(path) => {
            let file = File::create(path).into_diagnostic()?;
            let mut writer = BufWriter::new(file);
            writer.write_all(content.as_bytes()).into_diagnostic()?;
            writer.flush().into_diagnostic()?;
            if !quiet {
                eprintln!("Output written to: {}", path.display());
            }
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
        assert_eq!(truncate_str("Ø0.005 ⌖ A B C", 6), "Ø0....");
    }

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(0.856), "86%");
        assert_eq!(format_confidence(0.0), "0%");
    }

    #[test]
    fn test_resolve_format() {
        let config = Config {
            default_format: Some("JSON".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_format(OutputFormat::Md, &config, OutputFormat::Tsv), OutputFormat::Md);
        assert_eq!(resolve_format(OutputFormat::Auto, &config, OutputFormat::Tsv), OutputFormat::Json);
        assert_eq!(
            resolve_format(OutputFormat::Auto, &Config::default(), OutputFormat::Yaml),
            OutputFormat::Yaml
        );
    }

    #[test]
    fn test_render_structured_json() {
        let out = render_structured(&vec![1, 2], OutputFormat::Json).unwrap();
        assert!(out.starts_with('['));
        assert!(out.ends_with('\n'));
    }
}
