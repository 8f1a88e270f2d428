//! # Data Models Module / 数据模型模块
//!
//! Leg results, outcomes and the commit status projection sent to the
//! hosting platform.
//!
//! 分支结果、结局以及发送给托管平台的提交状态投影。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::matrix::Leg;

/// Maximum description length accepted by the commit status API.
pub const MAX_DESCRIPTION_LEN: usize = 140;

/// The phases a leg moves through.
///
/// `Pending → Provisioning → Installing → Testing → {Succeeded | Failed} → Reporting → Done`;
/// a fault jumps from any phase straight to `Reporting`.
///
/// 分支经历的阶段。故障会从任意阶段直接跳转到 `Reporting`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegPhase {
    Pending,
    Provisioning,
    Installing,
    Testing,
    Succeeded,
    Failed,
    Reporting,
    Done,
}

impl fmt::Display for LegPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LegPhase::Pending => "pending",
            LegPhase::Provisioning => "provisioning",
            LegPhase::Installing => "installing",
            LegPhase::Testing => "testing",
            LegPhase::Succeeded => "succeeded",
            LegPhase::Failed => "failed",
            LegPhase::Reporting => "reporting",
            LegPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Terminal status of a leg that ran to completion.
/// 运行完成的分支的最终状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegStatus {
    Success,
    Failure,
}

/// The record produced by the Leg Runner for one leg.
/// 分支运行器为单个分支生成的记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegResult {
    pub leg: Leg,
    pub status: LegStatus,
    /// The step that failed, when `status` is `Failure`.
    /// 当 `status` 为 `Failure` 时失败的步骤。
    pub failed_phase: Option<LegPhase>,
    /// Path of the coverage report, when the test step produced one.
    /// 覆盖率报告的路径（如果测试步骤生成了报告）。
    pub coverage: Option<PathBuf>,
    /// Short diagnostic, e.g. "dependency installation failed".
    pub diagnostic: Option<String>,
    /// Combined output of every command the leg ran.
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl LegResult {
    pub fn is_success(&self) -> bool {
        self.status == LegStatus::Success
    }
}

/// What the reporter receives for a leg: a clean result, or an
/// infrastructure fault that prevented one.
///
/// 报告器为每个分支接收的内容：一个完整的结果，或阻止生成结果的基础设施故障。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LegOutcome {
    Completed(LegResult),
    Fault { leg: Leg, message: String },
}

impl LegOutcome {
    pub fn leg(&self) -> &Leg {
        match self {
            LegOutcome::Completed(result) => &result.leg,
            LegOutcome::Fault { leg, .. } => leg,
        }
    }

    /// The commit status this outcome maps to.
    pub fn state(&self) -> StatusState {
        match self {
            LegOutcome::Completed(result) if result.is_success() => StatusState::Success,
            LegOutcome::Completed(_) => StatusState::Failure,
            LegOutcome::Fault { .. } => StatusState::Error,
        }
    }

    pub fn coverage(&self) -> Option<&PathBuf> {
        match self {
            LegOutcome::Completed(result) => result.coverage.as_ref(),
            LegOutcome::Fault { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state() == StatusState::Success
    }

    /// One-line summary used for status descriptions and the console table.
    pub fn summary(&self) -> String {
        match self {
            LegOutcome::Completed(result) => match (&result.status, &result.diagnostic) {
                (LegStatus::Success, _) => "tests passed".to_string(),
                (LegStatus::Failure, Some(diagnostic)) => diagnostic.clone(),
                (LegStatus::Failure, None) => "tests failed".to_string(),
            },
            LegOutcome::Fault { message, .. } => format!("infrastructure fault: {message}"),
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            LegOutcome::Completed(result) => Some(result.duration),
            LegOutcome::Fault { .. } => None,
        }
    }

    pub fn output(&self) -> &str {
        match self {
            LegOutcome::Completed(result) => &result.output,
            LegOutcome::Fault { message, .. } => message,
        }
    }
}

/// Commit status states understood by the hosting platform.
/// 托管平台可识别的提交状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Pending,
    Success,
    Failure,
    Error,
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusState::Pending => "pending",
            StatusState::Success => "success",
            StatusState::Failure => "failure",
            StatusState::Error => "error",
        };
        f.write_str(name)
    }
}

/// The external projection of a leg outcome.
/// 分支结果的对外投影。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: StatusState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    pub description: String,
    pub context: String,
}

impl StatusReport {
    /// Builds a report, truncating the description to the platform limit.
    pub fn new(
        state: StatusState,
        target_url: Option<String>,
        description: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            state,
            target_url,
            description: truncate(&description.into(), MAX_DESCRIPTION_LEN),
            context: context.into(),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}

/// The commit every report is attached to.
/// 所有报告所附加的提交。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    /// `owner/name`
    pub repository: String,
    pub sha: String,
    pub branch: Option<String>,
    /// CI run identifier, forwarded to the coverage service.
    pub build: Option<String>,
    /// Link shown next to the commit status.
    pub target_url: Option<String>,
}

impl CommitRef {
    pub fn new(repository: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            sha: sha.into(),
            branch: None,
            build: None,
            target_url: None,
        }
    }
}
