//! # Leg Execution Engine Module / 分支执行引擎模块
//!
//! Runs the legs of a matrix. Each leg goes through provisioning, dependency
//! installation and the test step, strictly in order; the first failing step
//! ends the leg. Every leg that started is then handed to the status
//! reporter, whatever happened to it, including a panic inside the leg task.
//!
//! 运行矩阵中的分支。每个分支严格按顺序经过环境准备、依赖安装和测试步骤；
//! 第一个失败的步骤会结束该分支。每个已开始的分支随后都会交给状态报告器，
//! 无论其发生了什么，包括分支任务内部的 panic。

use async_trait::async_trait;
use chrono::Utc;
use colored::*;
use futures::{stream, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    core::{
        error::StepError,
        matrix::Leg,
        models::{CommitRef, LegOutcome, LegPhase, LegResult, LegStatus},
        reporter::StatusReporter,
    },
    infra::t,
};

/// A provisioned, isolated environment for one leg.
/// 为单个分支准备好的隔离环境。
#[derive(Debug, Clone)]
pub struct LegEnvironment {
    /// Directory the commands run in / 命令运行的目录
    pub workspace: PathBuf,
    /// Interpreter inside the isolated environment / 隔离环境中的解释器
    pub interpreter: PathBuf,
    /// Directory private to this leg; reports that must not collide with
    /// other legs are written here.
    pub artifacts: PathBuf,
    /// Variables exported to every command of the leg.
    pub env_vars: Vec<(String, String)>,
    /// Output captured while provisioning.
    pub log: String,
}

/// Outcome of the test step.
#[derive(Debug, Clone)]
pub struct TestRun {
    pub passed: bool,
    pub output: String,
    pub coverage: Option<PathBuf>,
}

/// The three leg steps, as seen by the orchestration core.
///
/// The process-backed implementation lives in `infra::toolchain`; tests and
/// benchmarks plug in scripted implementations.
///
/// 编排核心所看到的三个分支步骤。
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Acquires an isolated environment for the leg's interpreter version.
    async fn provision(&self, leg: &Leg) -> Result<LegEnvironment, StepError>;

    /// Installs tooling, then the project's declared dependencies. Returns the install log.
    async fn install(&self, env: &LegEnvironment) -> Result<String, StepError>;

    /// Runs the test command with parallelism and coverage enabled.
    async fn run_tests(&self, env: &LegEnvironment) -> Result<TestRun, StepError>;
}

fn enter_phase(leg: &Leg, phase: LegPhase) {
    info!(leg = %leg, phase = %phase, "leg phase");
}

async fn run_steps(
    leg: &Leg,
    toolchain: &dyn Toolchain,
    output: &mut String,
) -> Result<TestRun, (LegPhase, StepError)> {
    enter_phase(leg, LegPhase::Provisioning);
    let env = toolchain
        .provision(leg)
        .await
        .map_err(|e| (LegPhase::Provisioning, e))?;
    output.push_str(&env.log);

    enter_phase(leg, LegPhase::Installing);
    let install_log = toolchain
        .install(&env)
        .await
        .map_err(|e| (LegPhase::Installing, e))?;
    output.push_str(&install_log);

    enter_phase(leg, LegPhase::Testing);
    toolchain
        .run_tests(&env)
        .await
        .map_err(|e| (LegPhase::Testing, e))
}

/// Runs one leg through its steps and produces its result.
/// Never returns early without a result: a failed step becomes a `Failure`.
///
/// 运行单个分支的所有步骤并生成结果。失败的步骤会成为 `Failure`。
pub async fn run_leg(leg: Leg, toolchain: &dyn Toolchain) -> LegResult {
    let started_at = Utc::now();
    let start = Instant::now();
    let mut output = String::new();

    println!("{}", t!("run.leg_started", leg = &leg).blue());

    let (status, failed_phase, coverage, diagnostic) =
        match run_steps(&leg, toolchain, &mut output).await {
            Ok(run) => {
                output.push_str(&run.output);
                if run.passed {
                    enter_phase(&leg, LegPhase::Succeeded);
                    (LegStatus::Success, None, run.coverage, None)
                } else {
                    enter_phase(&leg, LegPhase::Failed);
                    (LegStatus::Failure, Some(LegPhase::Testing), run.coverage, None)
                }
            }
            Err((phase, err)) => {
                warn!(leg = %leg, phase = %phase, error = %err, "leg step failed");
                enter_phase(&leg, LegPhase::Failed);
                output.push_str(err.output());
                (
                    LegStatus::Failure,
                    Some(phase),
                    None,
                    Some(err.diagnostic().to_string()),
                )
            }
        };

    let duration = start.elapsed();
    let secs = format!("{:.2}", duration.as_secs_f64());
    match status {
        LegStatus::Success => {
            println!("{}", t!("run.leg_passed", leg = &leg, duration = &secs).green())
        }
        LegStatus::Failure => {
            println!("{}", t!("run.leg_failed", leg = &leg, duration = &secs).red())
        }
    }

    LegResult {
        leg,
        status,
        failed_phase,
        coverage,
        diagnostic,
        output,
        started_at,
        duration,
    }
}

/// The result of running a set of legs.
/// 运行一组分支的结果。
#[derive(Debug, Default)]
pub struct MatrixRun {
    /// Outcomes in expansion order / 按展开顺序排列的结果
    pub outcomes: Vec<LegOutcome>,
    /// Legs that never started because the run was interrupted.
    /// 因运行被中断而从未开始的分支。
    pub skipped: Vec<Leg>,
}

impl MatrixRun {
    pub fn all_succeeded(&self) -> bool {
        self.skipped.is_empty() && self.outcomes.iter().all(LegOutcome::is_success)
    }
}

/// Drives legs concurrently and reports each one as it finishes.
/// 并发驱动分支，并在每个分支完成时进行报告。
pub struct Orchestrator {
    toolchain: Arc<dyn Toolchain>,
    reporter: Arc<StatusReporter>,
    jobs: usize,
    stop_token: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        toolchain: Arc<dyn Toolchain>,
        reporter: Arc<StatusReporter>,
        jobs: usize,
        stop_token: CancellationToken,
    ) -> Self {
        Self {
            toolchain,
            reporter,
            jobs: jobs.max(1),
            stop_token,
        }
    }

    /// Runs every leg, up to `jobs` at a time, then performs the aggregate
    /// report when the reporter is configured for it.
    pub async fn run(&self, legs: Vec<Leg>, commit: &CommitRef) -> MatrixRun {
        if legs.is_empty() {
            return MatrixRun::default();
        }

        self.reporter.report_pending(commit).await;

        let mut finished: Vec<(usize, Result<LegOutcome, Leg>)> =
            stream::iter(legs.into_iter().enumerate().map(|(index, leg)| {
                let toolchain = Arc::clone(&self.toolchain);
                let reporter = Arc::clone(&self.reporter);
                let stop_token = self.stop_token.clone();
                let commit = commit.clone();

                async move {
                    if stop_token.is_cancelled() {
                        debug!(leg = %leg, "leg skipped after interrupt");
                        return (index, Err(leg));
                    }
                    let outcome = execute_leg(leg, toolchain).await;
                    reporter.report_leg(&outcome, &commit).await;
                    (index, Ok(outcome))
                }
            }))
            .buffer_unordered(self.jobs)
            .collect()
            .await;

        finished.sort_by_key(|(index, _)| *index);

        let mut run = MatrixRun::default();
        for (_, entry) in finished {
            match entry {
                Ok(outcome) => run.outcomes.push(outcome),
                Err(leg) => run.skipped.push(leg),
            }
        }

        self.reporter
            .report_aggregate(&run.outcomes, run.skipped.len(), commit)
            .await;
        run
    }
}

/// Runs the leg in its own task so that a panic surfaces as a fault
/// instead of tearing down the orchestrator.
async fn execute_leg(leg: Leg, toolchain: Arc<dyn Toolchain>) -> LegOutcome {
    let task_leg = leg.clone();
    let handle = tokio::spawn(async move { run_leg(task_leg, toolchain.as_ref()).await });

    match handle.await {
        Ok(result) => LegOutcome::Completed(result),
        Err(join_error) => {
            let message = if join_error.is_panic() {
                "leg task panicked".to_string()
            } else {
                join_error.to_string()
            };
            println!("{}", t!("run.leg_fault", leg = &leg, error = &message).red().bold());
            warn!(leg = %leg, error = %message, "leg fault");
            LegOutcome::Fault { leg, message }
        }
    }
}
