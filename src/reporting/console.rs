//! # Console Reporting Module / 控制台报告模块
//!
//! Prints the end-of-run summary table and the captured output of legs that
//! did not succeed.
//!
//! 打印运行结束时的摘要表，以及未成功分支的捕获输出。

use colored::*;

use crate::core::execution::MatrixRun;
use crate::core::models::{LegOutcome, StatusState};
use crate::infra::t;

/// Localized label for a leg's state.
pub fn status_label(state: StatusState, locale: &str) -> String {
    match state {
        StatusState::Success => t!("report.status_success", locale = locale).to_string(),
        StatusState::Failure => t!("report.status_failure", locale = locale).to_string(),
        StatusState::Error => t!("report.status_error", locale = locale).to_string(),
        StatusState::Pending => t!("report.status_pending", locale = locale).to_string(),
    }
}

/// Prints a formatted summary of leg outcomes to the console.
///
/// # Output Format / 输出格式
/// ```text
/// --- Matrix Summary ---
///   - Success  | python-version=3.10, os=ubuntu        |      41.20s | tests passed
///   - Failure  | python-version=3.11, os=ubuntu        |       3.02s | dependency installation failed
///   - Skipped  | python-version=3.12, os=ubuntu        |         N/A |
/// ```
pub fn print_summary(run: &MatrixRun, locale: &str) {
    println!("\n{}", t!("report.summary_banner", locale = locale).bold());

    for outcome in &run.outcomes {
        let state = outcome.state();
        let label = status_label(state, locale);
        let label = match state {
            StatusState::Success => label.green(),
            StatusState::Failure => label.red(),
            StatusState::Error => label.red().bold(),
            StatusState::Pending => label.normal(),
        };
        let duration = outcome
            .duration()
            .map(|d| format!("{:.2?}", d))
            .unwrap_or_else(|| "N/A".to_string());

        println!(
            "  - {:<10} | {:<40} | {:>10} | {}",
            label,
            outcome.leg().to_string(),
            duration,
            outcome.summary()
        );
    }

    let skipped = t!("report.status_skipped", locale = locale).to_string();
    for leg in &run.skipped {
        println!(
            "  - {:<10} | {:<40} | {:>10} |",
            skipped.dimmed(),
            leg.to_string(),
            "N/A"
        );
    }
}

/// Prints the captured output of every leg that did not succeed.
///
/// 打印每个未成功分支的捕获输出。
pub fn print_failure_details(failures: &[&LegOutcome], locale: &str) {
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("report.failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, outcome) in failures.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}' ({})",
            i + 1,
            failures.len(),
            t!("report.failure_header", locale = locale).red(),
            outcome.leg().to_string().cyan(),
            outcome.summary()
        );
        println!("\n--- {} ---\n", t!("report.leg_log", locale = locale).yellow());
        println!("{}", outcome.output().trim_end());
        println!("\n{}", "-".repeat(80));
    }
}
