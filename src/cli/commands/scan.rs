//! `drawscan scan` - summarize a drawing package by part number

use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::cli::helpers::{render_structured, resolve_format, scanner_from_config, write_output};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::package::DrawingPackageIndex;

#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Folder holding the drawings (pdftotext `.txt` exports)
    pub dir: PathBuf,

    /// Worker threads for page analysis
    #[arg(long, short = 'j', default_value_t = 1)]
    pub jobs: usize,

    /// Output to file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("PART", 24),
    ColumnDef::new("PAGES", 6),
    ColumnDef::new("DESCRIPTION", 32),
    ColumnDef::new("TOLERANCE", 11),
    ColumnDef::new("FABRICATION", 20),
    ColumnDef::new("IMPACT", 9),
    ColumnDef::new("CONF", 6),
    ColumnDef::new("REVIEW", 7),
];

pub fn run(args: ScanArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let scanner = scanner_from_config(&config, args.jobs);
    let index = scanner.scan_folder(&args.dir)?;

    let format = resolve_format(global.format, &config, OutputFormat::Tsv);
    let content = match format {
        OutputFormat::Yaml | OutputFormat::Json => render_structured(&index, format)?,
        _ => summary_table(&index, format, !global.quiet),
    };
    write_output(&content, args.output.as_deref(), global.quiet)?;

    if !global.quiet && !index.unmatched_pages.is_empty() {
        eprintln!(
            "{} {} page(s) had no readable part number",
            style("!").yellow(),
            index.unmatched_pages.len()
        );
    }
    Ok(())
}

fn summary_table(index: &DrawingPackageIndex, format: OutputFormat, show_summary: bool) -> String {
    let rows: Vec<Vec<CellValue>> = index
        .pages_by_part_number
        .keys()
        .filter_map(|key| index.build_drawing_data(key))
        .map(|data| {
            vec![
                CellValue::Key(data.part_number.clone().unwrap_or_default()),
                CellValue::Number(data.page_count),
                CellValue::optional(data.description.as_deref()),
                CellValue::Tier(data.tolerance_tier),
                CellValue::Fabrication(data.fabrication_tier),
                CellValue::Impact(data.max_cost_impact()),
                CellValue::Confidence(data.overall_confidence),
                CellValue::Flag(data.coverage.suspicious),
            ]
        })
        .collect();

    let mut out = TableFormatter::new(COLUMNS, "part")
        .with_summary(show_summary)
        .render(&rows, format);
    if show_summary && format != OutputFormat::Md {
        out.push_str(&index.summary());
        out.push('\n');
    }
    out
}
