//! # HTML Reporting Module / HTML 报告模块
//!
//! Renders the outcomes of a matrix run as a single self-contained HTML file.
//!
//! 将矩阵运行的结果渲染为单个独立的 HTML 文件。

use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::fs;
use std::path::Path;

use crate::core::execution::MatrixRun;
use crate::core::models::{CommitRef, LegOutcome, StatusState};
use crate::infra::t;
use crate::reporting::console::status_label;

const HTML_STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 2rem; color: #24292f; }
h1 { font-size: 1.6rem; }
.meta { color: #57606a; margin-bottom: 1.5rem; }
.summary-container { display: flex; gap: 1rem; margin-bottom: 1.5rem; }
.summary-item { border: 1px solid #d0d7de; border-radius: 6px; padding: 0.75rem 1.25rem; text-align: center; }
.summary-item .count { display: block; font-size: 1.5rem; font-weight: 600; }
table { border-collapse: collapse; width: 100%; }
th, td { border-bottom: 1px solid #d0d7de; padding: 0.5rem; text-align: left; vertical-align: top; }
.status-cell { font-weight: 600; }
.success { color: #1a7f37; }
.failure { color: #cf222e; }
.error { color: #8250df; }
.pending, .skipped { color: #6e7781; }
details pre { background: #f6f8fa; padding: 0.75rem; overflow-x: auto; max-height: 30rem; }
"#;

fn state_class(state: StatusState) -> &'static str {
    match state {
        StatusState::Success => "success",
        StatusState::Failure => "failure",
        StatusState::Error => "error",
        StatusState::Pending => "pending",
    }
}

fn outcome_row(outcome: &LegOutcome, locale: &str) -> Markup {
    let state = outcome.state();
    let duration = outcome
        .duration()
        .map(|d| format!("{:.2}s", d.as_secs_f64()))
        .unwrap_or_else(|| "N/A".to_string());

    html! {
        tr {
            td { (outcome.leg().to_string()) }
            td class={ "status-cell " (state_class(state)) } { (status_label(state, locale)) }
            td { (duration) }
            td {
                (outcome.summary())
                @if !outcome.is_success() && !outcome.output().trim().is_empty() {
                    details {
                        summary { (t!("html_report.toggle_output", locale = locale).to_string()) }
                        pre { (outcome.output()) }
                    }
                }
            }
        }
    }
}

/// Renders the report page for a run.
///
/// 为一次运行渲染报告页面。
pub fn render_html_report(run: &MatrixRun, commit: &CommitRef, locale: &str) -> String {
    let total = run.outcomes.len() + run.skipped.len();
    let passed = run.outcomes.iter().filter(|o| o.is_success()).count();
    let failed = run.outcomes.len() - passed;
    let skipped_label = t!("report.status_skipped", locale = locale).to_string();

    let page = html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report.title", locale = locale).to_string()) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("html_report.main_header", locale = locale).to_string()) }
                p class="meta" {
                    (commit.repository) " @ " code { (commit.sha) }
                    @if let Some(branch) = &commit.branch {
                        " (" (branch) ")"
                    }
                }
                div class="summary-container" {
                    div class="summary-item" {
                        span class="count" { (total) }
                        span class="label" { (t!("html_report.summary.total", locale = locale).to_string()) }
                    }
                    div class="summary-item" {
                        span class="count success" { (passed) }
                        span class="label" { (t!("html_report.summary.passed", locale = locale).to_string()) }
                    }
                    div class="summary-item" {
                        span class="count failure" { (failed) }
                        span class="label" { (t!("html_report.summary.failed", locale = locale).to_string()) }
                    }
                    div class="summary-item" {
                        span class="count skipped" { (run.skipped.len()) }
                        span class="label" { (t!("html_report.summary.skipped", locale = locale).to_string()) }
                    }
                }
                table {
                    thead {
                        tr {
                            th { (t!("html_report.table.leg", locale = locale).to_string()) }
                            th { (t!("html_report.table.status", locale = locale).to_string()) }
                            th { (t!("html_report.table.duration", locale = locale).to_string()) }
                            th { (t!("html_report.table.details", locale = locale).to_string()) }
                        }
                    }
                    tbody {
                        @for outcome in &run.outcomes {
                            (outcome_row(outcome, locale))
                        }
                        @for leg in &run.skipped {
                            tr {
                                td { (leg.to_string()) }
                                td class="status-cell skipped" { (skipped_label) }
                                td { "N/A" }
                                td {}
                            }
                        }
                    }
                }
            }
        }
    };
    page.into_string()
}

/// Writes the HTML report for a run to `output_path`.
///
/// # Errors / 错误
/// Fails when the file cannot be written.
/// 当文件无法写入时失败。
pub fn generate_html_report(
    run: &MatrixRun,
    commit: &CommitRef,
    output_path: &Path,
    locale: &str,
) -> Result<()> {
    fs::write(output_path, render_html_report(run, commit, locale))
        .with_context(|| format!("Failed to write HTML report: {}", output_path.display()))
}
