//! `ccview summarize`

use std::path::PathBuf;

use anyhow::{Context, Result};
use ccview_core::diff::{DiffFilter, DiffRecord, DiffStatus, HighlightSummary};
use ccview_core::{ComparisonExport, ExportFormat};
use clap::Parser;
use serde::Serialize;

use crate::output::{Printer, Tone, print_json};
use crate::{parse_enum, read_json};

#[derive(Debug, Parser)]
pub struct SummarizeArgs {
    /// JSON array of diff records from a project comparison.
    pub records: PathBuf,

    /// Hide records that match on both sides.
    #[arg(long = "only-differences")]
    pub only_differences: bool,

    /// Hide records only present in the left project.
    #[arg(long = "hide-a")]
    pub hide_a: bool,

    /// Hide records only present in the right project.
    #[arg(long = "hide-b")]
    pub hide_b: bool,

    /// Hide records whose values differ.
    #[arg(long = "hide-different")]
    pub hide_different: bool,

    /// Write every record to a file: json, markdown or csv.
    #[arg(long = "export", value_parser = parse_enum::<ExportFormat>)]
    pub export: Option<ExportFormat>,

    /// Directory the export is written to.
    #[arg(long = "out", default_value = ".")]
    pub out: PathBuf,

    /// Left project root, used in the export and its file name.
    #[arg(long = "left", default_value = "a")]
    pub left: String,

    /// Right project root, used in the export and its file name.
    #[arg(long = "right", default_value = "b")]
    pub right: String,

    /// Output as JSON.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

impl SummarizeArgs {
    fn filter(&self) -> DiffFilter {
        DiffFilter {
            show_only_differences: self.only_differences,
            show_only_a: !self.hide_a,
            show_only_b: !self.hide_b,
            show_different: !self.hide_different,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryReport<'a> {
    summary: HighlightSummary,
    records: Vec<&'a DiffRecord>,
}

fn tone(status: DiffStatus) -> Tone {
    match status {
        DiffStatus::OnlyLeft => Tone::Blue,
        DiffStatus::OnlyRight => Tone::Green,
        DiffStatus::Different => Tone::Yellow,
        DiffStatus::Match => Tone::Dim,
    }
}

pub async fn run(args: &SummarizeArgs) -> Result<()> {
    let records: Vec<DiffRecord> = read_json(&args.records)?;

    if let Some(format) = args.export {
        // display filters do not apply to exports
        let export = ComparisonExport::new(&args.left, &args.right, records, chrono::Utc::now());
        let result = export
            .save(&args.out, format)
            .await
            .context("Failed to export comparison")?;
        if args.json {
            return print_json(&result);
        }
        return Printer::stdout().line(&format!(
            "exported {} records to {}",
            result.record_count,
            result.file_path.display()
        ));
    }

    let summary = HighlightSummary::from_records(&records);
    let visible = args.filter().apply(&records);

    if args.json {
        return print_json(&SummaryReport {
            summary,
            records: visible,
        });
    }

    let printer = Printer::stdout();
    printer.line(&format!(
        "{} differences: {} only in A, {} only in B, {} different",
        summary.total_differences,
        printer.paint(&summary.only_in_a.to_string(), Tone::Blue),
        printer.paint(&summary.only_in_b.to_string(), Tone::Green),
        printer.paint(&summary.different_values.to_string(), Tone::Yellow),
    ))?;
    for record in visible {
        let status = format!("{:<10}", record.status.as_str());
        printer.line(&format!(
            "  {} {:<6} {}",
            printer.paint(&status, tone(record.status)),
            record.severity.as_str(),
            record.capability_id
        ))?;
    }
    Ok(())
}
