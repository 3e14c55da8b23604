// ==============================================================================
// output.rs - Metrics Report Writers
// ==============================================================================
// Description: Tab-delimited metrics files and JSON report, written atomically
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-16
// Version: 2.0.0
// ==============================================================================
// Files (for output prefix P):
//   P.arrays_variant_calling_detail_metrics    one row per sample
//   P.arrays_variant_calling_summary_metrics   one aggregate row
//   P.arrays_control_code_summary_metrics      one row per control probe
//   P.arrays_variant_calling_metrics.json      all of the above (optional)
// Every file goes to a temporary sibling first; renames happen only after
// all of them were written; a failed rename removes what was already moved.
// ==============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics::fields::{CONTROL_COLUMNS, DETAIL_COLUMNS, SUMMARY_COLUMNS};
use crate::metrics::{DerivedParams, FieldValue, ResolvedMetrics, ResolvedRecord};
use crate::models::ControlInfo;

pub const DETAIL_EXTENSION: &str = "arrays_variant_calling_detail_metrics";
pub const SUMMARY_EXTENSION: &str = "arrays_variant_calling_summary_metrics";
pub const CONTROL_EXTENSION: &str = "arrays_control_code_summary_metrics";
pub const JSON_EXTENSION: &str = "arrays_variant_calling_metrics.json";

/// One output file of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportKind {
    Detail,
    Summary,
    Control,
    Json,
}

impl ReportKind {
    fn extension(self) -> &'static str {
        match self {
            ReportKind::Detail => DETAIL_EXTENSION,
            ReportKind::Summary => SUMMARY_EXTENSION,
            ReportKind::Control => CONTROL_EXTENSION,
            ReportKind::Json => JSON_EXTENSION,
        }
    }
}

/// Report formats to write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Tab-delimited metrics files
    Tsv,
    /// Single JSON document
    Json,
    /// Both
    All,
}

impl OutputFormat {
    pub fn includes_tsv(&self) -> bool {
        matches!(self, OutputFormat::Tsv | OutputFormat::All)
    }

    pub fn includes_json(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::All)
    }
}

/// Everything a report needs, borrowed from the finished run
#[derive(Debug, Clone, Copy)]
pub struct MetricsReport<'a> {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub input: &'a Path,
    pub params: DerivedParams,
    pub metrics: &'a ResolvedMetrics,
    pub controls: &'a [ControlInfo],
}

#[derive(Serialize)]
struct JsonReport<'a> {
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    input: String,
    call_rate_pf_threshold: f64,
    summary: BTreeMap<&'static str, FieldValue>,
    samples: Vec<BTreeMap<&'static str, FieldValue>>,
    controls: &'a [ControlInfo],
}

/// Writes all reports for one output prefix
#[derive(Debug, Clone)]
pub struct ReportWriter {
    prefix: PathBuf,
    format: OutputFormat,
}

impl ReportWriter {
    pub fn new(prefix: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            prefix: prefix.into(),
            format,
        }
    }

    /// Final paths this writer produces, in write order
    pub fn report_paths(&self) -> Vec<PathBuf> {
        self.reports().into_iter().map(|(_, path)| path).collect()
    }

    fn reports(&self) -> Vec<(ReportKind, PathBuf)> {
        let mut kinds = Vec::new();
        if self.format.includes_tsv() {
            kinds.extend([ReportKind::Detail, ReportKind::Summary, ReportKind::Control]);
        }
        if self.format.includes_json() {
            kinds.push(ReportKind::Json);
        }
        kinds
            .into_iter()
            .map(|kind| (kind, self.path_for(kind.extension())))
            .collect()
    }

    fn path_for(&self, extension: &str) -> PathBuf {
        let mut name = self.prefix.as_os_str().to_os_string();
        name.push(".");
        name.push(extension);
        PathBuf::from(name)
    }

    /// Write every report, or none of them
    pub fn write(&self, report: &MetricsReport<'_>) -> Result<Vec<PathBuf>> {
        let reports = self.reports();
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(reports.len());

        let result = reports.iter().try_for_each(|(kind, target)| {
            let temp = temp_sibling(target, report.run_id);
            staged.push((temp.clone(), target.clone()));
            debug!("Rendering {:?}", target);
            render(*kind, &temp, report)
        });

        if let Err(e) = result {
            discard(staged.iter().map(|(temp, _)| temp));
            return Err(e);
        }

        for (i, (temp, target)) in staged.iter().enumerate() {
            if let Err(e) = std::fs::rename(temp, target) {
                // Reports already moved into place belong to this failed run too
                discard(staged[..i].iter().map(|(_, target)| target));
                discard(staged[i..].iter().map(|(temp, _)| temp));
                return Err(e).with_context(|| format!("Failed to move report into place: {:?}", target));
            }
        }

        let targets: Vec<PathBuf> = reports.into_iter().map(|(_, path)| path).collect();
        info!("Wrote {} metrics reports with prefix {:?}", targets.len(), self.prefix);
        Ok(targets)
    }
}

fn render(kind: ReportKind, temp: &Path, report: &MetricsReport<'_>) -> Result<()> {
    match kind {
        ReportKind::Detail => {
            let rows: Vec<&ResolvedRecord> = report.metrics.samples.iter().map(|s| &s.record).collect();
            write_metrics_file(temp, report, "ArraysVariantCallingDetailMetrics", DETAIL_COLUMNS, &rows)
        }
        ReportKind::Summary => write_metrics_file(
            temp,
            report,
            "ArraysVariantCallingSummaryMetrics",
            SUMMARY_COLUMNS,
            &[&report.metrics.summary],
        ),
        ReportKind::Control => write_control_file(temp, report),
        ReportKind::Json => write_json(temp, report),
    }
}

fn temp_sibling(target: &Path, run_id: Uuid) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(format!(".{}.tmp", run_id.simple()));
    PathBuf::from(name)
}

fn discard<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        if path.is_file() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Failed to remove report {:?}: {}", path, e);
            }
        }
    }
}

/// Tab-delimited writer with no quoting; comment lines are written raw
fn metrics_writer(path: &Path, report: &MetricsReport<'_>, class: &str) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(path).with_context(|| format!("Failed to create report file: {:?}", path))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "## RUN")?;
    writeln!(
        out,
        "# arrays-metrics {} INPUT={} CALL_RATE_PF_THRESHOLD={} RUN_ID={}",
        env!("CARGO_PKG_VERSION"),
        report.input.display(),
        report.params.call_rate_pf_threshold,
        report.run_id
    )?;
    writeln!(out, "# Started on: {}", report.generated_at.to_rfc2822())?;
    writeln!(out)?;
    writeln!(out, "## METRICS CLASS\t{}", class)?;

    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .has_headers(false)
        .from_writer(out))
}

fn write_metrics_file(
    path: &Path,
    report: &MetricsReport<'_>,
    class: &str,
    columns: &[&'static str],
    rows: &[&ResolvedRecord],
) -> Result<()> {
    let mut writer = metrics_writer(path, report, class)?;
    writer.write_record(columns)?;

    for row in rows {
        writer.write_record(columns.iter().map(|&c| render_value(row.value(c))))?;
    }

    writer.flush().with_context(|| format!("Failed to write report: {:?}", path))?;
    Ok(())
}

fn write_control_file(path: &Path, report: &MetricsReport<'_>) -> Result<()> {
    let mut writer = metrics_writer(path, report, "ArraysControlCodesSummaryMetrics")?;
    writer.write_record(CONTROL_COLUMNS)?;

    for control in report.controls {
        writer.write_record([
            control.control.clone(),
            control.category.clone(),
            control.red.to_string(),
            control.green.to_string(),
        ])?;
    }

    writer.flush().with_context(|| format!("Failed to write report: {:?}", path))?;
    Ok(())
}

/// Unset invariants are blank; undefined rates are `?`
pub fn render_value(value: Option<&FieldValue>) -> String {
    value.map(FieldValue::to_string).unwrap_or_default()
}

fn write_json(path: &Path, report: &MetricsReport<'_>) -> Result<()> {
    info!("Generating JSON output: {:?}", path);

    let document = JsonReport {
        run_id: report.run_id,
        generated_at: report.generated_at,
        input: report.input.display().to_string(),
        call_rate_pf_threshold: report.params.call_rate_pf_threshold,
        summary: report.metrics.summary.row(SUMMARY_COLUMNS),
        samples: report
            .metrics
            .samples
            .iter()
            .map(|s| s.record.row(DETAIL_COLUMNS))
            .collect(),
        controls: report.controls,
    };

    let file = File::create(path).with_context(|| format!("Failed to create JSON output file: {:?}", path))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &document).context("Failed to write JSON output")?;
    out.flush()?;
    Ok(())
}
