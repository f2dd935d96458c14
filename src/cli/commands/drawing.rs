//! `drawscan drawing` - merged view of one part across its pages

use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::cli::helpers::{
    format_confidence, render_structured, resolve_format, scanner_from_config, write_output,
};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::package::DrawingData;

#[derive(clap::Args, Debug)]
pub struct DrawingArgs {
    /// Folder holding the drawings
    pub dir: PathBuf,

    /// Part number (exact, then partial match)
    pub part_number: String,

    /// Output to file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

const NOTE_COLUMNS: &[ColumnDef] = &[ColumnDef::new("CATEGORY", 20), ColumnDef::new("NOTE", 72)];

const HINT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("OPERATION", 18),
    ColumnDef::new("WORK CENTER", 14),
    ColumnDef::new("FROM", 60),
    ColumnDef::new("CONF", 6),
];

pub fn run(args: DrawingArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let index = scanner_from_config(&config, 1).scan_folder(&args.dir)?;

    let data = index.build_drawing_data(&args.part_number).ok_or_else(|| {
        miette::miette!(
            help = "run `drawscan scan` to list the part numbers found",
            "No drawing found for part number '{}'",
            args.part_number
        )
    })?;

    let format = resolve_format(global.format, &config, OutputFormat::Yaml);
    let content = match format {
        OutputFormat::Tsv | OutputFormat::Md => render_report(&data, format),
        _ => render_structured(&data, format)?,
    };
    write_output(&content, args.output.as_deref(), global.quiet)
}

fn render_report(data: &DrawingData, format: OutputFormat) -> String {
    let mut out = String::new();
    let title = data.part_number.as_deref().unwrap_or("(no part number)");
    if format == OutputFormat::Md {
        out.push_str(&format!("# {}\n\n", title));
    } else {
        out.push_str(&format!("{}\n", style(title).cyan().bold()));
    }

    let fields = [
        ("Description", data.description.clone()),
        ("Material", data.material.clone()),
        ("Revision", data.revision.clone()),
        ("Source", Some(data.source_pdf_path.display().to_string())),
        ("Pages", Some(data.page_count.to_string())),
        ("Tolerance tier", Some(data.tolerance_tier.to_string())),
        ("Fabrication tier", Some(data.fabrication_tier.to_string())),
        ("Confidence", Some(format_confidence(data.overall_confidence))),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            out.push_str(&format!("{}: {}\n", label, value));
        }
    }
    for reason in &data.coverage.reasons {
        out.push_str(&format!("Review: {}\n", reason));
    }

    if !data.notes.is_empty() {
        out.push('\n');
        let rows: Vec<Vec<CellValue>> = data
            .notes
            .iter()
            .map(|n| vec![CellValue::text(n.category.to_string()), CellValue::text(&n.text)])
            .collect();
        out.push_str(&TableFormatter::new(NOTE_COLUMNS, "note").render(&rows, format));
    }

    if !data.routing_hints.is_empty() {
        out.push('\n');
        let rows: Vec<Vec<CellValue>> = data
            .routing_hints
            .iter()
            .map(|h| {
                vec![
                    CellValue::text(h.operation.to_string()),
                    CellValue::optional(h.work_center.as_deref()),
                    CellValue::text(&h.note_text),
                    CellValue::Confidence(h.confidence),
                ]
            })
            .collect();
        out.push_str(&TableFormatter::new(HINT_COLUMNS, "routing hint").render(&rows, format));
    }

    if !data.cost_flags.is_empty() {
        out.push_str("\nCost flags:\n");
        for flag in &data.cost_flags {
            out.push_str(&format!("  [{}] {}: {}\n", flag.impact, flag.source, flag.description));
        }
    }
    out
}
