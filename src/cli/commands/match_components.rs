//! `drawscan match` - pair CAD components with drawings

use console::style;
use csv::ReaderBuilder;
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::cad::{ComponentDrawingMatcher, ComponentInfo, MatchAllResult};
use crate::cli::helpers::{render_structured, resolve_format, scanner_from_config, write_output};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;

#[derive(clap::Args, Debug)]
pub struct MatchArgs {
    /// Folder holding the drawings
    pub dir: PathBuf,

    /// CSV of components with `file_path` and/or `part_number` columns
    #[arg(long, short = 'c')]
    pub components: PathBuf,

    /// Output to file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("COMPONENT", 28),
    ColumnDef::new("METHOD", 20),
    ColumnDef::new("DRAWING", 24),
    ColumnDef::new("PAGES", 6),
    ColumnDef::new("CONF", 6),
];

const FILE_HEADERS: &[&str] = &["file_path", "file", "path", "model"];
const PART_HEADERS: &[&str] = &["part_number", "part", "pn", "part_no"];

pub fn run(args: MatchArgs, global: &GlobalOpts) -> Result<()> {
    let components = read_components(&args.components)?;
    let config = Config::load();
    let index = scanner_from_config(&config, 1).scan_folder(&args.dir)?;

    let result = ComponentDrawingMatcher::match_all(Some(&components), Some(&index));

    let format = resolve_format(global.format, &config, OutputFormat::Tsv);
    let content = match format {
        OutputFormat::Yaml | OutputFormat::Json => render_structured(&result, format)?,
        _ => match_table(&result, format, !global.quiet),
    };
    write_output(&content, args.output.as_deref(), global.quiet)?;

    if !global.quiet && !result.unmatched_drawings.is_empty() {
        eprintln!(
            "{} {} drawing page(s) not claimed by any component",
            style("!").yellow(),
            result.unmatched_drawings.len()
        );
    }
    Ok(())
}

/// Read components from a CSV, tolerating common header spellings
pub fn read_components(path: &Path) -> Result<Vec<ComponentInfo>> {
    let file = File::open(path).into_diagnostic()?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = rdr.headers().into_diagnostic()?.clone();
    let header_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_lowercase().replace([' ', '-'], "_"), i))
        .collect();
    let column = |names: &[&str]| names.iter().find_map(|n| header_map.get(*n).copied());
    let file_col = column(FILE_HEADERS);
    let part_col = column(PART_HEADERS);
    if file_col.is_none() && part_col.is_none() {
        return Err(miette::miette!(
            help = "add a `file_path` or `part_number` column",
            "{} has no component columns",
            path.display()
        ));
    }

    let mut components = Vec::new();
    for record in rdr.records() {
        let record = record.into_diagnostic()?;
        let field = |col: Option<usize>| {
            col.and_then(|i| record.get(i))
                .filter(|v| !v.is_empty())
        };
        let component = ComponentInfo::new(field(file_col), field(part_col));
        if component.file_path.is_some() || component.part_number.is_some() {
            components.push(component);
        }
    }
    tracing::debug!(count = components.len(), "read components from {}", path.display());
    Ok(components)
}

fn match_table(result: &MatchAllResult, format: OutputFormat, show_summary: bool) -> String {
    let mut rows: Vec<Vec<CellValue>> = result
        .matched
        .iter()
        .map(|m| {
            vec![
                CellValue::Key(m.component.label()),
                CellValue::text(m.result.method.to_string()),
                CellValue::optional(m.result.drawing_key.as_deref()),
                CellValue::Number(m.result.pages.len()),
                CellValue::Confidence(m.result.confidence),
            ]
        })
        .collect();
    rows.extend(result.unmatched.iter().map(|c| {
        vec![
            CellValue::Key(c.label()),
            CellValue::text("unmatched"),
            CellValue::Empty,
            CellValue::Number(0),
            CellValue::Confidence(0.0),
        ]
    }));

    TableFormatter::new(COLUMNS, "component")
        .with_summary(show_summary)
        .render(&rows, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_components_with_header_aliases() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Part Number,File").unwrap();
        writeln!(file, "12345-01, parts/bracket.sldprt").unwrap();
        writeln!(file, ",parts/cover.sldprt").unwrap();
        writeln!(file, ",").unwrap();

        let components = read_components(file.path()).unwrap();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].part_number.as_deref(), Some("12345-01"));
        assert_eq!(components[1].part_number, None);
        assert_eq!(components[1].file_stem().as_deref(), Some("COVER"));
    }

    #[test]
    fn test_match_table_shows_full_method_names() {
        use crate::cad::{ComponentMatch, MatchMethod, MatchResult};

        console::set_colors_enabled(false);
        let result = MatchAllResult {
            matched: vec![ComponentMatch {
                component: ComponentInfo::new(None, Some("12345-01")),
                result: MatchResult {
                    is_matched: true,
                    method: MatchMethod::ExactPartNumber,
                    confidence: 0.95,
                    drawing_key: Some("12345-01".to_string()),
                    pages: Vec::new(),
                },
            }],
            unmatched: vec![ComponentInfo::new(None, Some("X-999"))],
            unmatched_drawings: Vec::new(),
        };
        let out = match_table(&result, OutputFormat::Tsv, true);
        assert!(out.contains("exact_part_number"), "{}", out);
        assert!(out.contains("unmatched"));
        assert!(out.contains("2 component(s)"));
    }

    #[test]
    fn test_read_components_requires_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name,qty").unwrap();
        writeln!(file, "bracket,2").unwrap();
        assert!(read_components(file.path()).is_err());
    }
}
