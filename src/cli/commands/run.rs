//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command: it checks the trigger, expands
//! and plans the matrix, runs every leg and reports each one.
//!
//! 此模块实现了 `run` 命令：检查触发条件，展开并规划矩阵，运行每个分支并报告其结果。

use anyhow::{bail, Context, Result};
use colored::*;
use std::{env, fs, path::PathBuf, sync::Arc};
use tempfile::TempDir;
use tokio::{signal, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    core::{
        config::{self, PipelineConfig, ReportMode},
        credentials::{Credential, Credentials},
        execution::Orchestrator,
        models::CommitRef,
        planner,
        reporter::StatusReporter,
        trigger::TriggerEvent,
    },
    infra::{
        codecov::CodecovUploader, github::GitHubStatusPublisher, memory::{DryRunUploader, StatusBoard},
        t, toolchain::ProcessToolchain,
    },
    reporting::{print_failure_details, print_summary, generate_html_report},
    resolve_locale,
};

/// Placeholder commit used by `--dry-run` when none is known.
const DRY_RUN_SHA: &str = "0000000000000000000000000000000000000000";
const DRY_RUN_REPO: &str = "local/project";

/// Arguments of the `run` command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: PathBuf,
    pub project_dir: PathBuf,
    pub jobs: Option<usize>,
    pub total_runners: Option<usize>,
    pub runner_index: Option<usize>,
    pub html: Option<PathBuf>,
    pub event: Option<String>,
    pub branch: Option<String>,
    pub sha: Option<String>,
    pub repo: Option<String>,
    pub target_url: Option<String>,
    pub force: bool,
    pub dry_run: bool,
    pub aggregate: bool,
    /// Explicit `--lang`; overrides the config's `language`.
    pub lang: Option<String>,
}

/// Executes the run command with the provided arguments.
///
/// # Returns
/// `Ok` when every leg succeeded or the event does not trigger the pipeline;
/// an error otherwise, so that the process exits non-zero.
pub async fn execute(opts: RunOptions) -> Result<()> {
    let (pipeline, config_path) = setup_and_parse_config(&opts.config)?;
    let locale = resolve_locale(opts.lang.as_deref().unwrap_or(&pipeline.language));
    rust_i18n::set_locale(&locale);

    let project_root = fs::canonicalize(&opts.project_dir).with_context(|| {
        t!("run.project_dir_not_found", locale = &locale, path = opts.project_dir.display()).to_string()
    })?;

    println!(
        "{}",
        t!("run.project_root_detected", locale = &locale, path = project_root.display())
    );
    println!(
        "{}",
        t!("run.loading_config", locale = &locale, path = config_path.display())
    );

    let event = resolve_event(&opts);
    if !should_run(&pipeline, event.as_ref(), opts.force, &locale) {
        return Ok(());
    }

    let commit = resolve_commit(&opts, event.as_ref())?;
    let board = opts.dry_run.then(|| Arc::new(StatusBoard::new()));
    let reporter = build_reporter(&pipeline, &opts, board.clone(), &commit, &locale)?;

    let plan = planner::plan_execution(&pipeline.matrix, opts.total_runners, opts.runner_index)?;

    if plan.excluded_count > 0 {
        println!(
            "{}",
            t!("run.excluded_legs", locale = &locale, count = plan.excluded_count).cyan()
        );
    }
    if let (Some(total), Some(index)) = (opts.total_runners, opts.runner_index) {
        println!(
            "{}",
            t!(
                "run.split_runner",
                locale = &locale,
                index = index + 1,
                total = total,
                count = plan.legs.len()
            )
            .bold()
        );
    } else {
        println!(
            "{}",
            t!("run.single_runner", locale = &locale, count = plan.legs.len()).bold()
        );
    }

    if plan.legs.is_empty() {
        println!("{}", t!("run.no_legs", locale = &locale).green());
        return Ok(());
    }

    let stop_token = setup_signal_handler(&locale);

    // Provisioned leg directories are parked here until reporting is over.
    let (keeper_tx, keeper_rx) = mpsc::unbounded_channel::<TempDir>();
    let toolchain = Arc::new(ProcessToolchain::new(project_root, &pipeline, keeper_tx));
    let jobs = opts.jobs.unwrap_or(num_cpus::get() / 2 + 1);
    info!(jobs, legs = plan.legs.len(), "starting matrix");

    let orchestrator = Orchestrator::new(toolchain, Arc::new(reporter), jobs, stop_token);
    let run = orchestrator.run(plan.legs, &commit).await;
    drop(orchestrator);
    drop(keeper_rx);

    print_summary(&run, &locale);

    if let Some(report_path) = &opts.html {
        println!(
            "\n{}",
            t!("run.html_generating", locale = &locale, path = report_path.display())
        );
        if let Err(e) = generate_html_report(&run, &commit, report_path, &locale) {
            eprintln!("{} {:#}", t!("run.html_failed", locale = &locale).red(), e);
        }
    }

    if let Some(board) = &board {
        print_status_board(board, &locale);
    }

    if !run.skipped.is_empty() {
        println!(
            "\n{}",
            t!("run.legs_skipped", locale = &locale, count = run.skipped.len()).yellow()
        );
    }

    if run.all_succeeded() {
        println!("\n{}", t!("run.matrix_passed", locale = &locale).green().bold());
        Ok(())
    } else {
        let failures: Vec<_> = run.outcomes.iter().filter(|o| !o.is_success()).collect();
        print_failure_details(&failures, &locale);
        bail!(t!("run.matrix_failed", locale = &locale).to_string());
    }
}

/// Sets up and parses the pipeline configuration file.
fn setup_and_parse_config(config_path_arg: &PathBuf) -> Result<(PipelineConfig, PathBuf)> {
    // The configured language is unknown until the file is parsed.
    let locale = rust_i18n::locale();
    let config_path = fs::canonicalize(config_path_arg).with_context(|| {
        t!("run.config_read_failed", locale = &*locale, path = config_path_arg.display()).to_string()
    })?;

    let pipeline = config::load_pipeline_config(&config_path)
        .with_context(|| t!("run.config_parse_failed", locale = &*locale).to_string())?;

    Ok((pipeline, config_path))
}

/// The triggering event: `--event`/`--branch` when given, the CI environment otherwise.
fn resolve_event(opts: &RunOptions) -> Option<TriggerEvent> {
    let mut event = match &opts.event {
        Some(kind) => Some(TriggerEvent::new(kind, opts.branch.as_deref())),
        None => TriggerEvent::from_env(),
    }?;
    if event.branch.is_none() {
        event.branch = opts.branch.clone();
    }
    Some(event)
}

/// Decides whether the pipeline runs for `event`.
/// A run without any event information is a manual run and always proceeds.
fn should_run(pipeline: &PipelineConfig, event: Option<&TriggerEvent>, force: bool, locale: &str) -> bool {
    let Some(event) = event else {
        println!("{}", t!("run.manual_run", locale = locale).cyan());
        return true;
    };

    if pipeline.triggers.matches(event) {
        println!(
            "{}",
            t!("run.trigger_matched", locale = locale, event = event).cyan()
        );
        true
    } else if force {
        println!(
            "{}",
            t!("run.trigger_forced", locale = locale, event = event).yellow()
        );
        true
    } else {
        println!(
            "{}",
            t!("run.trigger_skipped", locale = locale, event = event).yellow()
        );
        false
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Builds the commit reference from flags, falling back to the CI environment.
fn resolve_commit(opts: &RunOptions, event: Option<&TriggerEvent>) -> Result<CommitRef> {
    let sha = opts.sha.clone().or_else(|| env_value("GITHUB_SHA"));
    let repository = opts.repo.clone().or_else(|| env_value("GITHUB_REPOSITORY"));

    let (repository, sha) = match (repository, sha) {
        (Some(repository), Some(sha)) => (repository, sha),
        (repository, sha) if opts.dry_run => (
            repository.unwrap_or_else(|| DRY_RUN_REPO.to_string()),
            sha.unwrap_or_else(|| DRY_RUN_SHA.to_string()),
        ),
        _ => bail!(t!("run.commit_unknown").to_string()),
    };

    let run_id = env_value("GITHUB_RUN_ID");
    let target_url = opts.target_url.clone().or_else(|| {
        let server = env_value("GITHUB_SERVER_URL")?;
        let run_id = run_id.as_ref()?;
        Some(format!("{server}/{repository}/actions/runs/{run_id}"))
    });
    let branch = opts
        .branch
        .clone()
        .or_else(|| env_value("GITHUB_HEAD_REF"))
        .or_else(|| event.and_then(|e| e.branch.clone()));

    Ok(CommitRef {
        repository,
        sha,
        branch,
        build: run_id,
        target_url,
    })
}

/// Wires the reporting sinks: the real services, or in-memory stand-ins for `--dry-run`.
/// A sink whose token is missing is disabled with a warning.
fn build_reporter(
    pipeline: &PipelineConfig,
    opts: &RunOptions,
    board: Option<Arc<StatusBoard>>,
    commit: &CommitRef,
    locale: &str,
) -> Result<StatusReporter> {
    let mode = if opts.aggregate {
        ReportMode::Aggregate
    } else {
        pipeline.status.mode
    };
    let mut reporter = StatusReporter::new(pipeline.status.context.clone(), mode)
        .with_pending(pipeline.status.post_pending);

    if let Some(board) = board {
        let placeholder = Credential::new("dry-run");
        if pipeline.coverage.enabled {
            reporter = reporter.with_uploader(Arc::new(DryRunUploader), placeholder.clone());
        }
        if pipeline.status.enabled {
            reporter = reporter.with_publisher(board, placeholder);
        }
        println!("{}", t!("run.dry_run", locale = locale, sha = &commit.sha).yellow());
        return Ok(reporter);
    }

    let credentials = Credentials::resolve(
        &pipeline.coverage.token_env,
        &pipeline.status.token_env,
        env_value,
    );

    if pipeline.coverage.enabled {
        match credentials.coverage {
            Some(token) => {
                let uploader = CodecovUploader::new(&pipeline.coverage.url, &pipeline.coverage.service)?;
                reporter = reporter.with_uploader(Arc::new(uploader), token);
            }
            None => {
                println!(
                    "{}",
                    t!("run.missing_token", locale = locale, var = &pipeline.coverage.token_env).yellow()
                );
                warn!(var = %pipeline.coverage.token_env, "coverage upload disabled: no token");
            }
        }
    }

    if pipeline.status.enabled {
        match credentials.status {
            Some(token) => {
                let publisher = GitHubStatusPublisher::new(&pipeline.status.api_url)?;
                reporter = reporter.with_publisher(Arc::new(publisher), token);
            }
            None => {
                println!(
                    "{}",
                    t!("run.missing_token", locale = locale, var = &pipeline.status.token_env).yellow()
                );
                warn!(var = %pipeline.status.token_env, "commit status disabled: no token");
            }
        }
    }

    Ok(reporter)
}

/// Sets up a signal handler for graceful shutdown.
/// Legs that have not started are skipped; running legs finish and report.
fn setup_signal_handler(locale: &str) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("\n{}", t!("run.shutdown_signal", locale = &locale).yellow());
                token_clone.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });

    token
}

fn print_status_board(board: &StatusBoard, locale: &str) {
    println!("\n{}", t!("run.status_board", locale = locale).bold());
    for ((sha, context), report) in board.entries() {
        println!(
            "  {} [{}] {}: {}",
            sha.chars().take(7).collect::<String>(),
            context,
            report.state,
            report.description
        );
    }
}
