//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::commands::{
    analyze::AnalyzeArgs, completions::CompletionsArgs, drawing::DrawingArgs,
    match_components::MatchArgs, reconcile::ReconcileArgs, scan::ScanArgs,
};

#[derive(Parser)]
#[command(name = "drawscan")]
#[command(author, version, about = "Manufacturing intelligence from engineering drawing text")]
#[command(long_about = "Extracts title blocks, notes, tolerances, GD&T and referenced specifications from pdftotext exports of engineering drawings, and rates their fabrication cost impact.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose (debug) logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a folder of drawings and summarize it by part number
    Scan(ScanArgs),

    /// Show per-page facts for one drawing
    Analyze(AnalyzeArgs),

    /// Show the merged view of one part across its drawing pages
    Drawing(DrawingArgs),

    /// Match CAD components (CSV) to drawings
    Match(MatchArgs),

    /// Reconcile CAD part records (YAML) against drawings
    Reconcile(ReconcileArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Table for summaries, YAML for details
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// JSON format (for programming)
    Json,
    /// Tab-separated table (for piping)
    Tsv,
    /// Markdown tables
    Md,
}

impl OutputFormat {
    /// Resolve `Auto` to a concrete format
    pub fn or(self, auto: OutputFormat) -> OutputFormat {
        match self {
            OutputFormat::Auto => auto,
            other => other,
        }
    }
}
