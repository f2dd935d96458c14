//! Table formatting for CLI summaries
//!
//! Rows are built from typed cells so tiers and impacts can be colored on a
//! terminal and printed plain for markdown or piping.

use console::style;
use tabled::{builder::Builder, settings::Style};

use crate::analysis::fabrication::FabricationTier;
use crate::cli::helpers::{format_confidence, truncate_str};
use crate::cli::OutputFormat;
use crate::core::types::{CostImpact, ToleranceTier};

/// A typed cell value with semantic meaning for formatting
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Part number or other key (cyan)
    Key(String),
    /// Plain text, truncated to the column width
    Text(String),
    Tier(ToleranceTier),
    Fabrication(FabricationTier),
    Impact(CostImpact),
    Number(usize),
    /// 0-1 confidence shown as a percentage
    Confidence(f64),
    /// Yes/no flag, highlighted when set
    Flag(bool),
    Empty,
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn optional(s: Option<&str>) -> Self {
        s.map_or(CellValue::Empty, |v| CellValue::Text(v.to_string()))
    }

    /// Format for terminal output (with colors if supported)
    pub fn format_tsv(&self, width: usize) -> String {
        match self {
            CellValue::Key(key) => {
                format!("{:<width$}", style(truncate_str(key, width)).cyan(), width = width)
            }
            CellValue::Text(s) => {
                format!("{:<width$}", truncate_str(s, width.saturating_sub(2)), width = width)
            }
            CellValue::Tier(tier) => {
                let s = tier.to_string();
                let styled = match tier {
                    ToleranceTier::Standard => style(s).dim(),
                    ToleranceTier::Moderate => style(s).white(),
                    ToleranceTier::Tight => style(s).yellow(),
                    ToleranceTier::Precision => style(s).red().bold(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Fabrication(tier) => {
                let s = tier.to_string();
                let styled = match tier {
                    FabricationTier::ShopStandard => style(s).dim(),
                    FabricationTier::Machining => style(s).yellow(),
                    FabricationTier::PrecisionMachining => style(s).red().bold(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Impact(impact) => {
                let s = impact.to_string();
                let styled = match impact {
                    CostImpact::None | CostImpact::Low => style(s).dim(),
                    CostImpact::Medium => style(s).white(),
                    CostImpact::High => style(s).yellow(),
                    CostImpact::Critical => style(s).red().bold(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Number(n) => format!("{:>width$}", n, width = width),
            CellValue::Confidence(c) => {
                let s = format_confidence(*c);
                let styled = if *c >= 0.8 {
                    style(s).green()
                } else if *c >= 0.5 {
                    style(s).yellow()
                } else {
                    style(s).red()
                };
                format!("{:>width$}", styled, width = width)
            }
            CellValue::Flag(set) => {
                let styled = if *set {
                    style("yes").yellow()
                } else {
                    style("no").dim()
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Empty => format!("{:<width$}", "-", width = width),
        }
    }

    /// Plain value (no colors)
    pub fn raw(&self) -> String {
        match self {
            CellValue::Key(s) | CellValue::Text(s) => s.clone(),
            CellValue::Tier(tier) => tier.to_string(),
            CellValue::Fabrication(tier) => tier.to_string(),
            CellValue::Impact(impact) => impact.to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Confidence(c) => format_confidence(*c),
            CellValue::Flag(set) => if *set { "yes" } else { "no" }.to_string(),
            CellValue::Empty => "-".to_string(),
        }
    }

    /// Format for Markdown output (escaped pipes)
    pub fn format_md(&self) -> String {
        self.raw().replace('|', "\\|")
    }

    /// Display width of the content (for dynamic column sizing)
    pub fn display_width(&self) -> usize {
        self.raw().chars().count()
    }
}

/// Column definition with header label and maximum width
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub header: &'static str,
    pub width: usize,
}

impl ColumnDef {
    pub const fn new(header: &'static str, width: usize) -> Self {
        Self { header, width }
    }
}

/// Table formatter that outputs rows as an aligned terminal table or markdown
pub struct TableFormatter<'a> {
    columns: &'a [ColumnDef],
    item_name: &'static str,
    show_summary: bool,
}

impl<'a> TableFormatter<'a> {
    pub fn new(columns: &'a [ColumnDef], item_name: &'static str) -> Self {
        Self {
            columns,
            item_name,
            show_summary: true,
        }
    }

    pub fn with_summary(mut self, show_summary: bool) -> Self {
        self.show_summary = show_summary;
        self
    }

    /// Render rows in the given format
    pub fn render(&self, rows: &[Vec<CellValue>], format: OutputFormat) -> String {
        match format {
            OutputFormat::Md => self.render_md(rows),
            _ => self.render_tsv(rows),
        }
    }

    fn widths(&self, rows: &[Vec<CellValue>]) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let content = rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(CellValue::display_width)
                    .max()
                    .unwrap_or(0);
                col.header.len().max(content.saturating_add(2)).min(col.width)
            })
            .collect()
    }

    fn render_tsv(&self, rows: &[Vec<CellValue>]) -> String {
        let widths = self.widths(rows);
        let mut out = String::new();

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| format!("{:<width$}", style(col.header).bold(), width = w))
            .collect();
        out.push_str(header.join(" ").trim_end());
        out.push('\n');
        let total: usize = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);
        out.push_str(&"-".repeat(total));
        out.push('\n');

        for row in rows {
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, w)| row.get(i).unwrap_or(&CellValue::Empty).format_tsv(*w))
                .collect();
            out.push_str(cells.join(" ").trim_end());
            out.push('\n');
        }

        if self.show_summary {
            out.push('\n');
            out.push_str(&format!("{} {}(s)\n", style(rows.len()).cyan(), self.item_name));
        }
        out
    }

    fn render_md(&self, rows: &[Vec<CellValue>]) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.columns.iter().map(|c| c.header.to_string()));
        for row in rows {
            builder.push_record(
                (0..self.columns.len())
                    .map(|i| row.get(i).unwrap_or(&CellValue::Empty).format_md()),
            );
        }
        let mut out = builder.build().with(Style::markdown()).to_string();
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[ColumnDef] = &[ColumnDef::new("PART", 20), ColumnDef::new("TIER", 12)];

    #[test]
    fn test_markdown_escapes_pipes() {
        let rows = vec![vec![CellValue::Key("A|B".into()), CellValue::Tier(ToleranceTier::Tight)]];
        let md = TableFormatter::new(COLUMNS, "part").render(&rows, OutputFormat::Md);
        assert!(md.contains("A\\|B"));
        assert!(md.contains("tight"));
    }

    #[test]
    fn test_tsv_has_header_and_summary() {
        console::set_colors_enabled(false);
        let rows = vec![
            vec![CellValue::Key("12345-01".into()), CellValue::Tier(ToleranceTier::Standard)],
            vec![CellValue::Key("67890".into()), CellValue::Empty],
        ];
        let out = TableFormatter::new(COLUMNS, "part").render(&rows, OutputFormat::Tsv);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("PART"));
        assert!(lines[2].starts_with("12345-01"));
        assert!(out.contains("2 part(s)"));
    }

    #[test]
    fn test_raw_values() {
        assert_eq!(CellValue::Confidence(0.9).raw(), "90%");
        assert_eq!(CellValue::Flag(true).raw(), "yes");
        assert_eq!(CellValue::optional(None).raw(), "-");
        assert_eq!(CellValue::Fabrication(FabricationTier::Machining).raw(), "machining");
    }
}
