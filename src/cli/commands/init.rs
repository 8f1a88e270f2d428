//! # Init Command Module / 初始化命令模块
//!
//! This module implements the `init` command, which writes a new
//! `Pipeline.toml`, either from an interactive wizard or from defaults.
//!
//! 此模块实现了 `init` 命令，通过交互式向导或默认值写入新的 `Pipeline.toml`。
//!
//! ## Features / 功能特性
//!
//! - **Interactive Wizard**: interpreter versions, coverage target and status context
//! - **Overwrite Protection**: an existing file is kept unless confirmed or `--force` is given
//!
//! - **交互式向导**: 解释器版本、覆盖率目标和状态上下文
//! - **覆盖保护**: 除非确认或使用 `--force`，否则保留现有文件

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use std::fs;
use std::path::Path;

use crate::core::config::{MatrixConfig, PipelineConfig, TestConfig};
use crate::core::matrix::MatrixDimension;
use crate::infra::t;

/// Interpreter versions offered by default.
pub const DEFAULT_VERSIONS: &[&str] = &["3.10", "3.11", "3.12", "3.13"];
/// Operating systems offered by default.
pub const DEFAULT_OS: &[&str] = &["ubuntu-latest"];

/// The configuration written by `init --non-interactive`.
/// Coverage is scoped to `package`.
pub fn default_pipeline(language: &str, package: &str) -> PipelineConfig {
    let test = TestConfig {
        coverage_target: package.to_string(),
        ..Default::default()
    };
    PipelineConfig {
        language: language.to_string(),
        triggers: Default::default(),
        matrix: MatrixConfig {
            dimensions: vec![
                MatrixDimension::new("python-version", DEFAULT_VERSIONS),
                MatrixDimension::new("os", DEFAULT_OS),
            ],
            exclude: vec![],
        },
        env: Default::default(),
        environment: Default::default(),
        install: Default::default(),
        test,
        coverage: Default::default(),
        status: Default::default(),
    }
}

/// Guesses the importable package name from the directory the
/// configuration is written to: `my-project` becomes `my_project`.
pub fn package_name(output: &Path) -> String {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())
        .and_then(|dir| fs::canonicalize(&dir).ok().or(Some(dir)));

    let name: String = dir
        .as_deref()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();

    match name.trim_matches('_') {
        "" => "src".to_string(),
        n if n.starts_with(|c: char| c.is_ascii_digit()) => format!("_{n}"),
        n => n.to_string(),
    }
}

/// Executes the init command.
///
/// # Arguments
/// * `output` - Path of the file to write
/// * `non_interactive` - Write defaults without prompting
/// * `force` - Overwrite an existing file without asking
/// * `language` - Console language, also stored in the generated file
pub fn execute(output: &Path, non_interactive: bool, force: bool, language: &str) -> Result<()> {
    let theme = ColorfulTheme::default();

    if !non_interactive {
        println!("\n{}", t!("init.welcome", locale = language).cyan().bold());
        println!("{}", t!("init.description", locale = language));
    }

    if output.exists() && !force {
        let overwrite = if non_interactive {
            false
        } else {
            Confirm::with_theme(&theme)
                .with_prompt(t!("init.overwrite_prompt", locale = language, path = output.display()).to_string())
                .default(false)
                .interact()
                .context(t!("init.confirmation_failed", locale = language).to_string())?
        };
        if !overwrite {
            println!(
                "{}",
                t!("init.file_exists", locale = language, path = output.display()).yellow()
            );
            println!("{}", t!("init.use_force", locale = language));
            return Ok(());
        }
    }

    let package = package_name(output);
    let pipeline = if non_interactive {
        default_pipeline(language, &package)
    } else {
        prompt_for_pipeline(&theme, language, &package)?
    };

    let toml_string = toml::to_string_pretty(&pipeline)
        .context(t!("init.serialize_failed", locale = language).to_string())?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            t!("init.write_failed", locale = language, path = parent.display()).to_string()
        })?;
    }
    fs::write(output, toml_string)
        .with_context(|| t!("init.write_failed", locale = language, path = output.display()).to_string())?;

    println!(
        "\n{} {}",
        "✔".green(),
        t!("init.success", locale = language, path = output.display()).bold()
    );
    println!("{}", t!("init.next_steps", locale = language));

    Ok(())
}

fn split_list(input: &str) -> Vec<String> {
    input
        .split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Asks for the few settings that differ between projects.
fn prompt_for_pipeline(theme: &ColorfulTheme, language: &str, package: &str) -> Result<PipelineConfig> {
    let mut pipeline = default_pipeline(language, package);

    let versions: String = Input::with_theme(theme)
        .with_prompt(t!("init.versions_prompt", locale = language).to_string())
        .default(DEFAULT_VERSIONS.join(", "))
        .interact_text()?;
    let versions = split_list(&versions);
    if versions.is_empty() {
        println!("{}", t!("init.no_versions", locale = language).yellow());
    }
    pipeline.matrix.dimensions[0] = MatrixDimension {
        name: pipeline.environment.interpreter_dimension.clone(),
        values: versions,
    };

    let systems: String = Input::with_theme(theme)
        .with_prompt(t!("init.os_prompt", locale = language).to_string())
        .default(DEFAULT_OS.join(", "))
        .interact_text()?;
    let systems = split_list(&systems);
    if systems.is_empty() {
        pipeline.matrix.dimensions.truncate(1);
    } else {
        pipeline.matrix.dimensions[1].values = systems;
    }

    let empty_target = t!("init.coverage_target_required", locale = language).to_string();
    pipeline.test.coverage_target = Input::with_theme(theme)
        .with_prompt(t!("init.coverage_target_prompt", locale = language).to_string())
        .default(pipeline.test.coverage_target.clone())
        .validate_with(move |input: &String| -> std::result::Result<(), String> {
            if input.trim().is_empty() {
                Err(empty_target.clone())
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let branches: String = Input::with_theme(theme)
        .with_prompt(t!("init.branches_prompt", locale = language).to_string())
        .default(pipeline.triggers.branches.join(", "))
        .interact_text()?;
    pipeline.triggers.branches = split_list(&branches);

    pipeline.status.context = Input::with_theme(theme)
        .with_prompt(t!("init.context_prompt", locale = language).to_string())
        .default(pipeline.status.context.clone())
        .interact_text()?;

    pipeline.coverage.enabled = Confirm::with_theme(theme)
        .with_prompt(t!("init.coverage_prompt", locale = language).to_string())
        .default(true)
        .interact()?;

    Ok(pipeline)
}
