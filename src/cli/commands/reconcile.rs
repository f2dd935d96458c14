//! `drawscan reconcile` - compare CAD part records with their drawings

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cad::{
    ComponentDrawingMatcher, ComponentInfo, MatchMethod, PartData, ReconciliationEngine,
    ReconciliationResult,
};
use crate::cli::helpers::{render_structured, resolve_format, scanner_from_config, write_output};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::package::DrawingPackageIndex;

#[derive(clap::Args, Debug)]
pub struct ReconcileArgs {
    /// Folder holding the drawings
    pub dir: PathBuf,

    /// YAML list of CAD part records
    #[arg(long, short = 'p')]
    pub parts: PathBuf,

    /// Only show parts with conflicts
    #[arg(long)]
    pub conflicts_only: bool,

    /// Output to file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Reconciliation of one CAD part
#[derive(Debug, Serialize)]
pub struct PartReconciliation {
    pub part: String,
    pub method: MatchMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawing_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ReconciliationResult>,
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("PART", 28),
    ColumnDef::new("DRAWING", 24),
    ColumnDef::new("CONFLICTS", 10),
    ColumnDef::new("GAP FILLS", 10),
    ColumnDef::new("RENAME", 32),
];

pub fn run(args: ReconcileArgs, global: &GlobalOpts) -> Result<()> {
    let parts = read_parts(&args.parts)?;
    let config = Config::load();
    let index = scanner_from_config(&config, 1).scan_folder(&args.dir)?;

    let engine = ReconciliationEngine::default();
    let mut reports: Vec<PartReconciliation> = parts
        .iter()
        .map(|part| reconcile_part(&engine, part, &index))
        .collect();
    if args.conflicts_only {
        reports.retain(|r| r.result.as_ref().is_some_and(ReconciliationResult::has_conflicts));
    }

    let format = resolve_format(global.format, &config, OutputFormat::Yaml);
    let content = match format {
        OutputFormat::Tsv | OutputFormat::Md => report_table(&reports, format, !global.quiet),
        _ => render_structured(&reports, format)?,
    };
    write_output(&content, args.output.as_deref(), global.quiet)?;

    let missing = reports.iter().filter(|r| r.result.is_none()).count();
    if !global.quiet && missing > 0 {
        eprintln!("{} {} part(s) had no drawing", style("!").yellow(), missing);
    }
    Ok(())
}

fn read_parts(path: &Path) -> Result<Vec<PartData>> {
    let content = fs::read_to_string(path).into_diagnostic()?;
    serde_yml::from_str(&content).into_diagnostic()
}

/// Find the part's own drawing and reconcile against it
///
/// BOM matches point at the parent assembly, so they are not reconciled.
pub fn reconcile_part(
    engine: &ReconciliationEngine,
    part: &PartData,
    index: &DrawingPackageIndex,
) -> PartReconciliation {
    let component = ComponentInfo {
        file_path: part.file_path.clone(),
        part_number: part.part_number.clone(),
    };
    let matched = ComponentDrawingMatcher::match_component(&component, Some(index));
    let drawing = match (&matched.method, &matched.drawing_key) {
        (MatchMethod::Bom, _) | (_, None) => None,
        (_, Some(key)) => index.build_drawing_data(key),
    };

    PartReconciliation {
        part: component.label(),
        method: matched.method,
        drawing_key: matched.drawing_key,
        result: drawing.map(|d| engine.reconcile(part, &d)),
    }
}

fn report_table(reports: &[PartReconciliation], format: OutputFormat, show_summary: bool) -> String {
    let rows: Vec<Vec<CellValue>> = reports
        .iter()
        .map(|r| {
            let (conflicts, fills, rename) = match &r.result {
                Some(result) => (
                    CellValue::Number(result.conflicts.len()),
                    CellValue::Number(result.gap_fills.len()),
                    result
                        .rename_suggestion
                        .as_ref()
                        .map_or(CellValue::Empty, |s| {
                            CellValue::text(s.suggested.display().to_string())
                        }),
                ),
                None => (CellValue::Empty, CellValue::Empty, CellValue::Empty),
            };
            vec![
                CellValue::Key(r.part.clone()),
                CellValue::optional(r.drawing_key.as_deref()),
                conflicts,
                fills,
                rename,
            ]
        })
        .collect();
    TableFormatter::new(COLUMNS, "part")
        .with_summary(show_summary)
        .render(&rows, format)
}
