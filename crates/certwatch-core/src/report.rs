//! Report emission: the JSON mirror of an [`AggregateReport`], the rendered
//! HTML health page and the health-check email body.
//!
//! Rendering never fails on absent per-environment detail; such rows read
//! `N/A` instead of being left out.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::aggregator::{AggregateReport, EnvironmentOutcome, OutcomeStatus};
use crate::artifact::write_json_pretty;

pub const AGGREGATE_JSON_FILE: &str = "combined-results.json";
pub const HTML_REPORT_FILE: &str = "health-check-report.html";

const NOT_AVAILABLE: &str = "N/A";

/// Files written by [`emit_reports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub html: PathBuf,
}

/// Write `combined-results.json` and `health-check-report.html` into
/// `report_dir`, replacing earlier versions.
pub fn emit_reports(report_dir: &Path, report: &AggregateReport) -> Result<ReportPaths> {
    let paths = ReportPaths {
        json: report_dir.join(AGGREGATE_JSON_FILE),
        html: report_dir.join(HTML_REPORT_FILE),
    };
    write_aggregate_json(&paths.json, report)?;
    write_html_report(&paths.html, report)?;
    Ok(paths)
}

/// Write the aggregate report as pretty JSON.
pub fn write_aggregate_json(path: &Path, report: &AggregateReport) -> Result<()> {
    write_json_pretty(path, report).with_context(|| format!("write {:?}", path))
}

/// Write the rendered HTML health page.
pub fn write_html_report(path: &Path, report: &AggregateReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
    }
    std::fs::write(path, render_html_report(report)).with_context(|| format!("write {:?}", path))
}

/// Escape text for HTML element and attribute content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn status_icon(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Passed => "✅",
        OutcomeStatus::Failed => "❌",
        OutcomeStatus::Error => "⚠️",
    }
}

/// `passed/total`, or `N/A` when the environment never reported.
fn pass_ratio(outcome: &EnvironmentOutcome) -> String {
    match outcome.status {
        OutcomeStatus::Error => NOT_AVAILABLE.to_string(),
        _ => format!("{}/{} passed", outcome.passed, outcome.total),
    }
}

fn render_list(items: Option<&[String]>) -> String {
    match items {
        None => NOT_AVAILABLE.to_string(),
        Some([]) => "None".to_string(),
        Some(items) => {
            let mut out = String::from("<ul>");
            for item in items {
                out.push_str(&format!("<li>{}</li>", escape_html(item)));
            }
            out.push_str("</ul>");
            out
        }
    }
}

fn render_environment(outcome: &EnvironmentOutcome) -> String {
    let detail = outcome.detail.as_ref();
    let validated = detail
        .map(|d| format!("{} certifications", d.expected.len()))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let run_status = detail
        .map(|d| d.status.as_str().to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    format!(
        r#"
    <div class="environment {class}">
        <h2>{icon} {name} Environment - {status}</h2>
        <p><strong>Tests:</strong> {ratio}</p>
        <p><strong>URL:</strong> {url}</p>
        <p><strong>Certifications Validated:</strong> {validated}</p>
        <p><strong>Run Status:</strong> {run_status}</p>
        <p><strong>Missing Certifications:</strong> {missing}</p>
        <p><strong>Unexpected Certifications:</strong> {extra}</p>
    </div>
"#,
        class = outcome.status.as_str().to_lowercase(),
        icon = status_icon(outcome.status),
        name = escape_html(&outcome.name),
        status = outcome.status,
        ratio = pass_ratio(outcome),
        url = escape_html(&outcome.url),
        validated = validated,
        run_status = run_status,
        missing = render_list(detail.map(|d| d.missing.as_slice())),
        extra = render_list(detail.map(|d| d.extra.as_slice())),
    )
}

/// Render the standalone HTML health page.
pub fn render_html_report(report: &AggregateReport) -> String {
    let environments: String = report.environments.iter().map(render_environment).collect();
    let overall = if report.is_healthy() {
        format!("✅ {}", report.overall_label())
    } else {
        format!("❌ {}", report.overall_label())
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Certification Health Check Report</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        .header {{ background-color: #f0f0f0; padding: 20px; border-radius: 5px; }}
        .environment {{ margin: 20px 0; padding: 15px; border: 1px solid #ddd; border-radius: 5px; }}
        .passed {{ background-color: #d4edda; border-color: #c3e6cb; }}
        .failed {{ background-color: #f8d7da; border-color: #f5c6cb; }}
        .error {{ background-color: #fff3cd; border-color: #ffeaa7; }}
    </style>
</head>
<body>
    <div class="header">
        <h1>Certification Health Check Report</h1>
        <p><strong>Generated:</strong> {generated}</p>
        <p><strong>Overall Status:</strong> {overall}</p>
        <p><strong>Total Tests:</strong> {total} ({passed} passed, {failed} failed, {errored} environment(s) without results)</p>
    </div>
{environments}</body>
</html>
"#,
        generated = report.timestamp.to_rfc3339(),
        overall = overall,
        total = report.summary.total_tests,
        passed = report.summary.total_passed,
        failed = report.summary.total_failed,
        errored = report.summary.total_errored,
        environments = environments,
    )
}

/// Subject and HTML body of the health-check email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthEmail {
    pub subject: String,
    pub html: String,
}

/// Per-environment figures as the email reports them.
///
/// An environment without results counts as one failed test here, so a
/// silent environment always shows up in the subject line.
fn email_figures(outcome: &EnvironmentOutcome) -> (u64, u64, u64, String) {
    match outcome.status {
        OutcomeStatus::Error => (0, 1, 1, "No test results found".to_string()),
        _ => (
            outcome.passed,
            outcome.failed,
            outcome.total,
            format!("{}/{} tests passed", outcome.passed, outcome.total),
        ),
    }
}

/// Render the health-check email for `report`.
pub fn render_health_email(report: &AggregateReport) -> HealthEmail {
    let rows: Vec<(&EnvironmentOutcome, (u64, u64, u64, String))> = report
        .environments
        .iter()
        .map(|o| (o, email_figures(o)))
        .collect();

    let total_passed: u64 = rows.iter().map(|(_, f)| f.0).sum();
    let total_failed: u64 = rows.iter().map(|(_, f)| f.1).sum();
    let total_tests = total_passed + total_failed;
    let overall = if total_failed == 0 && report.is_healthy() {
        "✅ ALL SYSTEMS HEALTHY"
    } else {
        "❌ ISSUES DETECTED"
    };

    let subject = format!(
        "Certification Health Check (Frontend) - {overall} ({total_passed}/{total_tests} tests passed)"
    );

    let mut table_rows = String::new();
    let mut validation = String::new();
    for (outcome, (_, _, _, details)) in &rows {
        let badge = match outcome.status {
            OutcomeStatus::Passed => "✅ PASSED",
            _ => "❌ FAILED",
        };
        table_rows.push_str(&format!(
            "\n      <tr>\n        <td><strong>{}</strong></td>\n        <td>{}</td>\n        <td>{}</td>\n        <td>{}</td>\n      </tr>",
            escape_html(&outcome.name),
            badge,
            escape_html(details),
            escape_html(&outcome.url),
        ));

        let validated = outcome
            .detail
            .as_ref()
            .map(|d| {
                let missing = if d.missing.is_empty() {
                    String::new()
                } else {
                    format!(" (missing: {})", escape_html(&d.missing.join(", ")))
                };
                format!(
                    "Validates {} certification options in dropdown{}",
                    d.expected.len(),
                    missing
                )
            })
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        validation.push_str(&format!(
            "\n      <li><strong>{}:</strong> {}</li>",
            escape_html(&outcome.name),
            validated
        ));
    }

    let html = format!(
        r#"
    <h2>Daily Certification Health Check Report</h2>
    <p><strong>Overall Status:</strong> {overall}</p>
    <p><strong>Total Tests:</strong> {total_tests} ({total_passed} passed, {total_failed} failed)</p>
    <p><strong>Generated:</strong> {generated}</p>

    <h3>Environment Status:</h3>
    <table border="1" cellpadding="8" cellspacing="0" style="border-collapse: collapse; width: 100%;">
      <tr style="background-color: #f0f0f0;">
        <th>Environment</th>
        <th>Status</th>
        <th>Details</th>
        <th>URL</th>
      </tr>{table_rows}
    </table>

    <h3>Certification Validation Details:</h3>
    <ul>{validation}
    </ul>

    <p><em>This is an automated health check report. If any environment shows ❌ FAILED, please investigate the certification dropdown functionality.</em></p>
"#,
        generated = report.timestamp.to_rfc3339(),
    );

    HealthEmail { subject, html }
}
