//! Comparison export as JSON, Markdown or CSV.
//!
//! An export carries both project names, the highlight counts and every diff
//! record. Files are named `<left>-vs-<right>-comparison-<date>.<ext>` after
//! the project names have been made filesystem safe.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::{ComparisonSnapshot, DiffRecord, HighlightSummary};
use crate::error::{CoreError, Result};

/// Layout version written into JSON exports.
pub const EXPORT_VERSION: &str = "1.0";

/// Sanitized project names are cut to this many characters.
const MAX_NAME_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Markdown,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replace characters that are unsafe in file names, hyphenate spaces,
/// lowercase, and cap the length.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '-',
            _ => c,
        })
        .flat_map(char::to_lowercase)
        .take(MAX_NAME_CHARS)
        .collect()
}

/// Display name for a project root: its last path component.
pub fn project_name(root: &str) -> String {
    Path::new(root)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.to_string())
}

/// File name for a single project export.
pub fn export_filename(project: &str, format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "{}-config-{}.{}",
        sanitize_name(project),
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// File name for a comparison export.
pub fn comparison_filename(
    left: &str,
    right: &str,
    format: ExportFormat,
    date: NaiveDate,
) -> String {
    format!(
        "{}-comparison-{}.{}",
        sanitize_name(&format!("{left}-vs-{right}")),
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Everything written by a comparison export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonExport {
    pub version: &'static str,
    pub exported_at: DateTime<Utc>,
    pub left_project: String,
    pub right_project: String,
    pub summary: HighlightSummary,
    pub diff_results: Vec<DiffRecord>,
}

/// Where an export landed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub file_path: PathBuf,
    pub format: ExportFormat,
    pub record_count: usize,
    pub file_size: u64,
}

impl ComparisonExport {
    pub fn new(
        left: impl Into<String>,
        right: impl Into<String>,
        records: Vec<DiffRecord>,
        exported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: EXPORT_VERSION,
            exported_at,
            left_project: left.into(),
            right_project: right.into(),
            summary: HighlightSummary::from_records(&records),
            diff_results: records,
        }
    }

    pub fn from_snapshot(snapshot: &ComparisonSnapshot, exported_at: DateTime<Utc>) -> Self {
        Self {
            version: EXPORT_VERSION,
            exported_at,
            left_project: snapshot.left.clone(),
            right_project: snapshot.right.clone(),
            summary: snapshot.summary,
            diff_results: snapshot.records.clone(),
        }
    }

    pub fn filename(&self, format: ExportFormat) -> String {
        comparison_filename(
            &project_name(&self.left_project),
            &project_name(&self.right_project),
            format,
            self.exported_at.date_naive(),
        )
    }

    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            ExportFormat::Markdown => Ok(self.to_markdown()),
            ExportFormat::Csv => Ok(self.to_csv()),
        }
    }

    /// Render as `format` and write it into `dir`, creating the directory
    /// when missing.
    pub async fn save(&self, dir: &Path, format: ExportFormat) -> Result<ExportResult> {
        let content = self.render(format)?;
        let path = dir.join(self.filename(format));

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|err| CoreError::export(dir, err))?;
        tokio::fs::write(&path, content.as_bytes())
            .await
            .map_err(|err| CoreError::export(&path, err))?;

        tracing::info!(
            path = %path.display(),
            format = format.as_str(),
            records = self.diff_results.len(),
            "comparison exported"
        );
        Ok(ExportResult {
            file_path: path,
            format,
            record_count: self.diff_results.len(),
            file_size: content.len() as u64,
        })
    }

    fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "# Comparison: {} vs {}\n\n",
            self.left_project, self.right_project
        ));
        md.push_str(&format!(
            "**Exported:** {}\n\n",
            self.exported_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        md.push_str("## Summary\n\n");
        md.push_str("| Category | Count |\n");
        md.push_str("|----------|-------|\n");
        md.push_str(&format!("| Only in A | {} |\n", self.summary.only_in_a));
        md.push_str(&format!("| Only in B | {} |\n", self.summary.only_in_b));
        md.push_str(&format!(
            "| Different | {} |\n",
            self.summary.different_values
        ));
        md.push_str(&format!(
            "| Total differences | {} |\n\n",
            self.summary.total_differences
        ));

        md.push_str("## Records\n\n");
        if self.diff_results.is_empty() {
            md.push_str("_No records._\n");
            return md;
        }
        md.push_str("| Capability | Status | Severity | A | B |\n");
        md.push_str("|------------|--------|----------|---|---|\n");
        for record in &self.diff_results {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                markdown_cell(&record.capability_id),
                record.status.as_str(),
                record.severity.as_str(),
                markdown_value(record.left_value.as_ref()),
                markdown_value(record.right_value.as_ref()),
            ));
        }
        md
    }

    fn to_csv(&self) -> String {
        let mut csv = String::from("capabilityId,status,severity,leftValue,rightValue\n");
        for record in &self.diff_results {
            let row = [
                csv_field(&record.capability_id),
                csv_field(record.status.as_str()),
                csv_field(record.severity.as_str()),
                csv_field(&compact(record.left_value.as_ref())),
                csv_field(&compact(record.right_value.as_ref())),
            ];
            csv.push_str(&row.join(","));
            csv.push('\n');
        }
        csv
    }
}

fn compact(value: Option<&Value>) -> String {
    value.map(Value::to_string).unwrap_or_default()
}

fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn markdown_value(value: Option<&Value>) -> String {
    match value {
        Some(value) => format!("`{}`", markdown_cell(&value.to_string())),
        None => String::new(),
    }
}

/// RFC 4180 quoting: only fields with a comma, quote or line break are
/// quoted, and quotes inside are doubled.
fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}
