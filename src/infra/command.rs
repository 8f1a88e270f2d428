//! # Command Execution Module / 命令执行模块
//!
//! Spawning child processes with captured output, and turning configured
//! command templates into argument vectors.
//!
//! 派生子进程并捕获输出，以及将配置的命令模板转换为参数向量。

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// Splits a command template into arguments, expands `~` and environment
/// variables in every argument, then substitutes `{placeholder}` values.
///
/// Splitting happens before substitution, so substituted paths containing
/// spaces stay one argument.
///
/// 将命令模板拆分为参数，展开每个参数中的 `~` 和环境变量，然后替换 `{placeholder}` 的值。
///
/// # Arguments
/// * `template` - e.g. `{python} -m pytest`
/// * `vars` - `(placeholder, value)` pairs, placeholder without braces
pub fn render_command(template: &str, vars: &[(&str, &str)]) -> Result<Vec<String>> {
    let parts = shlex::split(template)
        .ok_or_else(|| anyhow!("Failed to parse command: {}", template))?;
    if parts.is_empty() {
        return Err(anyhow!("Empty command after parsing."));
    }

    parts
        .into_iter()
        .map(|part| {
            let expanded = shellexpand::full(&part)
                .with_context(|| format!("Failed to expand argument: {part}"))?
                .into_owned();
            Ok(vars.iter().fold(expanded, |acc, (key, value)| {
                acc.replace(&format!("{{{key}}}"), value)
            }))
        })
        .collect()
}

/// A shell-quoted rendering of a command line, for logs.
/// 用于日志的、经过 shell 引号处理的命令行表示。
pub fn display_command(parts: &[String]) -> String {
    shlex::try_join(parts.iter().map(String::as_str)).unwrap_or_else(|_| parts.join(" "))
}

/// Spawns a command, captures its stdout and stderr.
/// The output streams are read concurrently and combined into a single string.
///
/// # Returns
/// A tuple containing:
/// - The `ExitStatus` of the process wrapped in an `io::Result`.
/// - The combined stdout and stderr as a `String`.
///
/// 派生一个命令，捕获其 stdout 和 stderr。
/// 输出流被并发读取并合并到一个字符串中。
pub async fn spawn_and_capture(
    mut cmd: tokio::process::Command,
) -> (std::io::Result<std::process::ExitStatus>, String) {
    let mut child = match cmd
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return (Err(e), String::new()),
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return (
            Err(std::io::Error::other("Failed to capture child process output")),
            String::new(),
        );
    };

    let output = Arc::new(tokio::sync::Mutex::new(String::new()));

    let stdout_output = Arc::clone(&output);
    let stdout_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut output = stdout_output.lock().await;
            output.push_str(&line);
            output.push('\n');
        }
    });

    let stderr_output = Arc::clone(&output);
    let stderr_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut output = stderr_output.lock().await;
            output.push_str(&line);
            output.push('\n');
        }
    });

    let status = child.wait().await;

    // Drain both readers so no trailing output is lost.
    if let Err(e) = stdout_handle.await {
        warn!(error = %e, "failed to join stdout reader");
    }
    if let Err(e) = stderr_handle.await {
        warn!(error = %e, "failed to join stderr reader");
    }

    let captured = output.lock().await.clone();
    (status, captured)
}
