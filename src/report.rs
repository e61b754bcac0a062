//! Sync report rendering
//!
//! Markdown for humans and PR comments, JSON for tooling, and an optional
//! unified diff of the store.

use serde::Serialize;
use serde_json::Value;
use similar::TextDiff;
use std::path::Path;

use crate::error::Result;
use crate::reconcile::SyncReport;

/// Most lines rendered per report section
pub const SECTION_LIMIT: usize = 200;

/// Files involved in a sync run, for the report header
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub input: &'a Path,
    pub map: &'a Path,
    pub output: &'a Path,
    pub dry_run: bool,
}

/// Render a report as Markdown
pub fn render_markdown(report: &SyncReport, ctx: &ReportContext<'_>) -> String {
    let mut md: Vec<String> = Vec::new();
    md.push("# Design tokens sync report".to_string());
    md.push(String::new());
    md.push(format!("- input: `{}`", ctx.input.display()));
    md.push(format!("- map: `{}`", ctx.map.display()));
    let output_label = if ctx.dry_run { "output (preview)" } else { "output" };
    md.push(format!("- {}: `{}`", output_label, ctx.output.display()));
    md.push(String::new());

    md.push("## Summary".to_string());
    md.push(String::new());
    md.push(format!("- Added: {}", report.added.len()));
    md.push(format!("- Updated: {}", report.updated.len()));
    md.push(format!("- Unchanged: {}", report.unchanged.len()));
    md.push(format!("- Unmapped / skipped: {}", report.unmapped.len()));
    md.push(format!("- Warnings: {}", report.warnings.len()));
    md.push(String::new());

    section(
        &mut md,
        "Added tokens",
        report.added.iter().map(|a| {
            format!("- `{}` <- `{}` = `{}`", a.dot_path, a.name, display_value(&a.value))
        }),
        report.added.len(),
    );
    section(
        &mut md,
        "Updated tokens",
        report.updated.iter().map(|u| {
            format!(
                "- `{}`: `{}` => `{}` (from `{}`)",
                u.dot_path,
                u.previous.as_ref().map(display_value).unwrap_or_default(),
                display_value(&u.value),
                u.name
            )
        }),
        report.updated.len(),
    );
    section(
        &mut md,
        "Unchanged (same value)",
        report
            .unchanged
            .iter()
            .map(|c| format!("- `{}` = `{}`", c.dot_path, display_value(&c.value))),
        report.unchanged.len(),
    );
    section(
        &mut md,
        "Unmapped or skipped",
        report.unmapped.iter().map(|s| match &s.dot_path {
            Some(path) => format!("- `{}` ({}): {}", s.name, path, s.reason),
            None => format!("- `{}`: {}", s.name, s.reason),
        }),
        report.unmapped.len(),
    );
    section(
        &mut md,
        "Warnings",
        report.warnings.iter().map(|w| format!("- {}", w)),
        report.warnings.len(),
    );

    md.join("\n")
}

fn section(md: &mut Vec<String>, title: &str, lines: impl Iterator<Item = String>, total: usize) {
    if total == 0 {
        return;
    }
    md.push(format!("### {}", title));
    md.push(String::new());
    md.extend(lines.take(SECTION_LIMIT));
    if total > SECTION_LIMIT {
        md.push(format!("- ... and {} more", total - SECTION_LIMIT));
    }
    md.push(String::new());
}

/// Strings unquoted, everything else as compact JSON
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    input: String,
    map: String,
    output: String,
    dry_run: bool,
    #[serde(flatten)]
    report: &'a SyncReport,
}

/// Render a report as pretty JSON
pub fn render_json(report: &SyncReport, ctx: &ReportContext<'_>) -> Result<String> {
    let doc = JsonReport {
        input: ctx.input.display().to_string(),
        map: ctx.map.display().to_string(),
        output: ctx.output.display().to_string(),
        dry_run: ctx.dry_run,
        report,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Unified diff between two store serializations
pub fn store_diff(before: &str, after: &str, label: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", label), &format!("b/{}", label))
        .to_string()
}
