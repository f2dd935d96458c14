//! `drawscan analyze` - per-page facts for one drawing

use miette::Result;
use std::path::PathBuf;

use crate::cli::helpers::{render_structured, resolve_format, scanner_from_config, write_output};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::package::DrawingPageInfo;

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
    /// Drawing to analyze (`.pdf` with a sibling `.txt`, or the `.txt` export)
    pub file: PathBuf,

    /// Output to file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("PAGE", 5),
    ColumnDef::new("PART", 20),
    ColumnDef::new("REV", 5),
    ColumnDef::new("NOTES", 6),
    ColumnDef::new("SPECS", 6),
    ColumnDef::new("GD&T", 5),
    ColumnDef::new("TOLERANCE", 11),
    ColumnDef::new("FABRICATION", 20),
    ColumnDef::new("BOM", 4),
    ColumnDef::new("CONF", 6),
];

pub fn run(args: AnalyzeArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let pages = scanner_from_config(&config, 1).scan_file(&args.file)?;

    let format = resolve_format(global.format, &config, OutputFormat::Yaml);
    let content = match format {
        OutputFormat::Tsv | OutputFormat::Md => page_table(&pages, format, !global.quiet),
        _ => render_structured(&pages, format)?,
    };
    write_output(&content, args.output.as_deref(), global.quiet)
}

fn page_table(pages: &[DrawingPageInfo], format: OutputFormat, show_summary: bool) -> String {
    let rows: Vec<Vec<CellValue>> = pages
        .iter()
        .map(|page| {
            let revision = page.title_block.revision.as_ref().map(|f| f.value.as_str());
            vec![
                CellValue::Number(page.page_number as usize),
                page.part_number()
                    .map_or(CellValue::Empty, |p| CellValue::Key(p.to_string())),
                CellValue::optional(revision),
                CellValue::Number(page.notes.len()),
                CellValue::Number(page.spec_matches.len()),
                CellValue::Number(page.gdt_callouts.len()),
                CellValue::Tier(page.tolerance.overall_tier),
                CellValue::Fabrication(page.fabrication.overall_tier),
                CellValue::Number(page.bom_entries.len()),
                CellValue::Confidence(page.confidence),
            ]
        })
        .collect();
    TableFormatter::new(COLUMNS, "page")
        .with_summary(show_summary)
        .render(&rows, format)
}
