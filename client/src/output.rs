//! Output formatting for run reports.

use std::collections::BTreeMap;

use chrono::SecondsFormat;
use launch_report_core::{FailedTestRecord, Launch, LaunchStatus, Summary, summarize};

use crate::error::{ReportError, Result};
use crate::report::RunReport;

pub const NO_LAUNCHES: &str = "No launches found.";
pub const NO_FAILED_TESTS: &str = "No failed tests found.";

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
    Summary,
    Detailed,
    Html,
    Csv,
}

impl OutputFormat {
    /// Whether the pipeline should compute status counts for this format.
    pub fn needs_summary(self) -> bool {
        matches!(self, Self::Summary | Self::Detailed | Self::Html)
    }
}

/// Formats a report in the requested output format.
pub fn render(report: &RunReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map(|mut json| {
                json.push('\n');
                json
            })
            .map_err(|e| ReportError::render(format!("JSON serialization failed: {e}"))),
        OutputFormat::Yaml => serde_yaml::to_string(report)
            .map_err(|e| ReportError::render(format!("YAML serialization failed: {e}"))),
        OutputFormat::Table => Ok(report_to_table(report)),
        OutputFormat::Summary => Ok(report_to_summary(report)),
        OutputFormat::Detailed => Ok(report_to_detailed(report)),
        OutputFormat::Html => Ok(report_to_html(report)),
        OutputFormat::Csv => report_to_csv(report),
    }
}

fn summary_of(report: &RunReport) -> Summary {
    report
        .summary
        .clone()
        .unwrap_or_else(|| summarize(&report.launches))
}

fn format_time(launch: &Launch) -> String {
    launch.start_time.format("%Y-%m-%d %H:%M").to_string()
}

fn suite_label(record: &FailedTestRecord) -> String {
    match (&record.suite_name, record.suite_id) {
        (Some(name), _) => name.clone(),
        (None, Some(id)) => format!("#{id}"),
        (None, None) => String::new(),
    }
}

/// Renders rows as space-padded columns. The last column is not padded.
fn aligned(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let last = cells.len().saturating_sub(1);
        let mut out = String::new();
        for (i, cell) in cells.into_iter().enumerate() {
            if i == last {
                out.push_str(cell);
            } else {
                out.push_str(&format!("{:<width$}  ", cell, width = widths[i]));
            }
        }
        out.trim_end().to_string()
    };

    let mut out = String::new();
    out.push_str(&line(headers.to_vec()));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

fn report_to_table(report: &RunReport) -> String {
    if let Some(failed) = &report.failed_tests {
        if failed.records.is_empty() {
            return format!("{NO_FAILED_TESTS}\n");
        }
        let rows: Vec<Vec<String>> = failed
            .records
            .iter()
            .map(|r| {
                vec![
                    format!("{} ({})", r.launch_name, r.launch_id),
                    suite_label(r),
                    r.test_name.clone(),
                    r.status.to_string(),
                    r.link.clone(),
                ]
            })
            .collect();
        let mut out = aligned(&["LAUNCH", "SUITE", "TEST", "STATUS", "LINK"], &rows);
        out.push_str(&format!(
            "\n{} failed tests in {} of {} launches\n",
            failed.total_failed_tests, failed.launches_with_failures, failed.launches_inspected
        ));
        out.push_str(&format!("{} suites with failures\n", failed.suites_with_failures));
        return out;
    }

    if report.launches.is_empty() {
        return format!("{NO_LAUNCHES}\n");
    }
    let rows: Vec<Vec<String>> = report
        .launches
        .iter()
        .map(|l| {
            vec![
                l.id.to_string(),
                l.number.map(|n| n.to_string()).unwrap_or_default(),
                l.name.clone(),
                l.status.to_string(),
                format_time(l),
                l.failed_count.to_string(),
                l.tags.join(","),
            ]
        })
        .collect();
    aligned(&["ID", "#", "NAME", "STATUS", "START", "FAILED", "TAGS"], &rows)
}

fn report_to_summary(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Project: {}\n", report.project));

    if let Some(failed) = &report.failed_tests {
        out.push_str(&format!("Launches inspected: {}\n", failed.launches_inspected));
        out.push_str(&format!(
            "Launches with failures: {}\n",
            failed.launches_with_failures
        ));
        out.push_str(&format!("Suites with failures: {}\n", failed.suites_with_failures));
        out.push_str(&format!("Failed tests: {}\n", failed.total_failed_tests));
        return out;
    }

    let summary = summary_of(report);
    out.push_str(&format!("Total launches: {}\n", summary.total));
    for status in LaunchStatus::ALL {
        out.push_str(&format!("  {:<12} {}\n", status.as_str(), summary.count(status)));
    }
    out
}

fn launch_block(out: &mut String, launch: &Launch) {
    match launch.number {
        Some(number) => out.push_str(&format!("\n{} #{} (id {})\n", launch.name, number, launch.id)),
        None => out.push_str(&format!("\n{} (id {})\n", launch.name, launch.id)),
    }
    out.push_str(&format!("  Status:     {}\n", launch.status));
    out.push_str(&format!(
        "  Started:    {}\n",
        launch.start_time.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("  Failed:     {}\n", launch.failed_count));
    if !launch.tags.is_empty() {
        out.push_str(&format!("  Tags:       {}\n", launch.tags.join(", ")));
    }
    if !launch.attributes.is_empty() {
        let attrs: Vec<String> = launch.attributes.iter().map(ToString::to_string).collect();
        out.push_str(&format!("  Attributes: {}\n", attrs.join(", ")));
    }
    if let Some(ref desc) = launch.description {
        out.push_str(&format!("  {desc}\n"));
    }
}

/// Failed-test records grouped by launch, in first-seen launch order.
fn group_by_launch(records: &[FailedTestRecord]) -> Vec<(i64, &str, Vec<&FailedTestRecord>)> {
    let mut order: Vec<i64> = Vec::new();
    let mut groups: BTreeMap<i64, (&str, Vec<&FailedTestRecord>)> = BTreeMap::new();
    for record in records {
        let group = groups.entry(record.launch_id).or_insert_with(|| {
            order.push(record.launch_id);
            (record.launch_name.as_str(), Vec::new())
        });
        group.1.push(record);
    }
    order
        .into_iter()
        .filter_map(|id| groups.remove(&id).map(|(name, recs)| (id, name, recs)))
        .collect()
}

fn report_to_detailed(report: &RunReport) -> String {
    let mut out = report_to_summary(report);

    if let Some(failed) = &report.failed_tests {
        if failed.records.is_empty() {
            out.push_str(&format!("\n{NO_FAILED_TESTS}\n"));
            return out;
        }
        for (launch_id, launch_name, records) in group_by_launch(&failed.records) {
            out.push_str(&format!("\n{launch_name} (id {launch_id}): {} failed\n", records.len()));
            for record in records {
                let suite = suite_label(record);
                if suite.is_empty() {
                    out.push_str(&format!("  - {}\n    {}\n", record.test_name, record.link));
                } else {
                    out.push_str(&format!(
                        "  - {} [{}]\n    {}\n",
                        record.test_name, suite, record.link
                    ));
                }
            }
        }
        return out;
    }

    if report.launches.is_empty() {
        out.push_str(&format!("\n{NO_LAUNCHES}\n"));
        return out;
    }
    for launch in &report.launches {
        launch_block(&mut out, launch);
    }
    out
}

/// Escapes text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn status_class(status: &str) -> String {
    format!("status-{}", status.to_ascii_lowercase().replace('_', "-"))
}

const HTML_STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}\
.status-passed{color:#2e7d32}.status-failed{color:#c62828}\
.status-stopped,.status-interrupted{color:#ef6c00}.status-in-progress{color:#1565c0}";

fn report_to_html(report: &RunReport) -> String {
    let project = escape_html(&report.project);
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>Launch report: {project}</title>\n"));
    out.push_str(&format!("<style>{HTML_STYLE}</style>\n</head>\n<body>\n"));
    out.push_str(&format!("<h1>Launch report: {project}</h1>\n"));
    out.push_str(&format!(
        "<p>Generated {}{}</p>\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        if report.from_cache { " (from cache)" } else { "" }
    ));

    out.push_str("<h2>Summary</h2>\n<ul>\n");
    if let Some(failed) = &report.failed_tests {
        out.push_str(&format!(
            "<li>Launches inspected: {}</li>\n<li>Launches with failures: {}</li>\n<li>Suites with failures: {}</li>\n<li>Failed tests: {}</li>\n",
            failed.launches_inspected,
            failed.launches_with_failures,
            failed.suites_with_failures,
            failed.total_failed_tests
        ));
    } else {
        let summary = summary_of(report);
        out.push_str(&format!("<li>Total launches: {}</li>\n", summary.total));
        for status in LaunchStatus::ALL {
            out.push_str(&format!(
                "<li class=\"{}\">{}: {}</li>\n",
                status_class(status.as_str()),
                status.as_str(),
                summary.count(status)
            ));
        }
    }
    out.push_str("</ul>\n");

    if let Some(failed) = &report.failed_tests {
        out.push_str("<h2>Failed tests</h2>\n");
        if failed.records.is_empty() {
            out.push_str(&format!("<p>{NO_FAILED_TESTS}</p>\n"));
        } else {
            out.push_str("<table>\n<tr><th>Launch</th><th>Suite</th><th>Test</th><th>Status</th><th>Log</th></tr>\n");
            for r in &failed.records {
                out.push_str(&format!(
                    "<tr><td>{} ({})</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td><a href=\"{}\">log</a></td></tr>\n",
                    escape_html(&r.launch_name),
                    r.launch_id,
                    escape_html(&suite_label(r)),
                    escape_html(&r.test_name),
                    status_class(r.status.as_str()),
                    r.status,
                    escape_html(&r.link),
                ));
            }
            out.push_str("</table>\n");
        }
    } else {
        out.push_str("<h2>Launches</h2>\n");
        if report.launches.is_empty() {
            out.push_str(&format!("<p>{NO_LAUNCHES}</p>\n"));
        } else {
            out.push_str("<table>\n<tr><th>ID</th><th>#</th><th>Name</th><th>Status</th><th>Start</th><th>Failed</th><th>Tags</th><th>Attributes</th></tr>\n");
            for l in &report.launches {
                let attrs: Vec<String> = l.attributes.iter().map(ToString::to_string).collect();
                out.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                    l.id,
                    l.number.map(|n| n.to_string()).unwrap_or_default(),
                    escape_html(&l.name),
                    status_class(l.status.as_str()),
                    l.status,
                    format_time(l),
                    l.failed_count,
                    escape_html(&l.tags.join(", ")),
                    escape_html(&attrs.join(", ")),
                ));
            }
            out.push_str("</table>\n");
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn csv_error(err: impl std::fmt::Display) -> ReportError {
    ReportError::render(format!("CSV serialization failed: {err}"))
}

/// One row per failed test in failed-tests mode, one row per launch
/// otherwise. An empty result is a header-only document.
fn report_to_csv(report: &RunReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    if let Some(failed) = &report.failed_tests {
        writer
            .write_record(["launch_id", "launch_name", "suite_name", "test_name", "status", "link"])
            .map_err(csv_error)?;
        for r in &failed.records {
            writer
                .write_record([
                    r.launch_id.to_string(),
                    r.launch_name.clone(),
                    suite_label(r),
                    r.test_name.clone(),
                    r.status.to_string(),
                    r.link.clone(),
                ])
                .map_err(csv_error)?;
        }
    } else {
        writer
            .write_record([
                "id", "number", "name", "status", "start_time", "failed", "tags", "attributes",
            ])
            .map_err(csv_error)?;
        for l in &report.launches {
            let attrs: Vec<String> = l.attributes.iter().map(ToString::to_string).collect();
            writer
                .write_record([
                    l.id.to_string(),
                    l.number.map(|n| n.to_string()).unwrap_or_default(),
                    l.name.clone(),
                    l.status.to_string(),
                    l.start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
                    l.failed_count.to_string(),
                    l.tags.join(";"),
                    attrs.join(";"),
                ])
                .map_err(csv_error)?;
        }
    }

    let bytes = writer.into_inner().map_err(csv_error)?;
    String::from_utf8(bytes).map_err(csv_error)
}
