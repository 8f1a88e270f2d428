//! # Status Reporter Module / 状态报告模块
//!
//! The reporting phase of every leg: coverage upload, then commit status.
//! Both steps are best effort. Their errors are logged and swallowed so that
//! neither can hide the other or change a leg's reported state.
//!
//! 每个分支的报告阶段：先上传覆盖率，再发布提交状态。
//! 两个步骤都是尽力而为的，其错误会被记录并忽略，互不影响，也不会改变分支的报告状态。

use async_trait::async_trait;
use colored::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    core::{
        config::ReportMode,
        credentials::Credential,
        error::ReportError,
        matrix::Leg,
        models::{CommitRef, LegOutcome, LegPhase, StatusReport, StatusState},
    },
    infra::t,
};

/// Sends a coverage report to the coverage-tracking service.
/// 将覆盖率报告发送到覆盖率跟踪服务。
#[async_trait]
pub trait CoverageUploader: Send + Sync {
    async fn upload(
        &self,
        credential: &Credential,
        artifact: &Path,
        commit: &CommitRef,
        leg: &Leg,
    ) -> Result<(), ReportError>;
}

/// Posts a commit status to the hosting platform.
/// Later posts for the same `(commit, context)` overwrite earlier ones.
///
/// 向托管平台发布提交状态。同一 `(commit, context)` 的后续发布会覆盖之前的发布。
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(
        &self,
        credential: &Credential,
        commit: &CommitRef,
        report: &StatusReport,
    ) -> Result<(), ReportError>;
}

/// Reduces a run to a single state: any fault or any leg skipped by an
/// interrupt gives `error`, otherwise any failure gives `failure`,
/// otherwise `success`. Returns `None` when no leg was planned.
///
/// 将一次运行归约为单一状态：任何故障或被中断跳过的分支都会得到 `error`。
pub fn aggregate_state(outcomes: &[LegOutcome], skipped: usize) -> Option<StatusState> {
    if outcomes.is_empty() && skipped == 0 {
        return None;
    }
    if skipped > 0 {
        return Some(StatusState::Error);
    }
    let states = outcomes.iter().map(LegOutcome::state);
    let state = states.fold(StatusState::Success, |acc, s| match (acc, s) {
        (StatusState::Error, _) | (_, StatusState::Error) => StatusState::Error,
        (StatusState::Failure, _) | (_, StatusState::Failure) => StatusState::Failure,
        _ => StatusState::Success,
    });
    Some(state)
}

/// Uploads coverage and publishes commit statuses for legs.
/// 为分支上传覆盖率并发布提交状态。
pub struct StatusReporter {
    context: String,
    mode: ReportMode,
    post_pending: bool,
    uploader: Option<(Arc<dyn CoverageUploader>, Credential)>,
    publisher: Option<(Arc<dyn StatusPublisher>, Credential)>,
}

impl StatusReporter {
    pub fn new(context: impl Into<String>, mode: ReportMode) -> Self {
        Self {
            context: context.into(),
            mode,
            post_pending: false,
            uploader: None,
            publisher: None,
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn CoverageUploader>, credential: Credential) -> Self {
        self.uploader = Some((uploader, credential));
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn StatusPublisher>, credential: Credential) -> Self {
        self.publisher = Some((publisher, credential));
        self
    }

    pub fn with_pending(mut self, post_pending: bool) -> Self {
        self.post_pending = post_pending;
        self
    }

    /// The status a single leg outcome projects to.
    pub fn leg_report(&self, outcome: &LegOutcome, commit: &CommitRef) -> StatusReport {
        StatusReport::new(
            outcome.state(),
            commit.target_url.clone(),
            format!("{}: {}", outcome.leg(), outcome.summary()),
            &self.context,
        )
    }

    /// The single status summarizing a whole run, if there is anything to
    /// summarize. `skipped` counts planned legs that never started.
    pub fn aggregate_report(
        &self,
        outcomes: &[LegOutcome],
        skipped: usize,
        commit: &CommitRef,
    ) -> Option<StatusReport> {
        let state = aggregate_state(outcomes, skipped)?;
        let passed = outcomes.iter().filter(|o| o.is_success()).count();
        let planned = outcomes.len() + skipped;
        let description = if skipped > 0 {
            format!("{passed}/{planned} legs passed, {skipped} skipped")
        } else {
            format!("{passed}/{planned} legs passed")
        };
        Some(StatusReport::new(
            state,
            commit.target_url.clone(),
            description,
            &self.context,
        ))
    }

    /// Posts `pending` once before the legs start, when enabled.
    pub async fn report_pending(&self, commit: &CommitRef) {
        if !self.post_pending {
            return;
        }
        let report = StatusReport::new(
            StatusState::Pending,
            commit.target_url.clone(),
            "matrix running",
            &self.context,
        );
        self.post(&report, commit).await;
    }

    /// The reporting phase of one leg. Runs for every outcome, including faults.
    ///
    /// 单个分支的报告阶段。对每个结果都会运行，包括故障。
    pub async fn report_leg(&self, outcome: &LegOutcome, commit: &CommitRef) {
        let leg = outcome.leg();
        info!(leg = %leg, phase = %LegPhase::Reporting, "leg phase");

        self.upload_coverage(outcome, commit).await;

        if self.mode == ReportMode::PerLeg {
            let report = self.leg_report(outcome, commit);
            self.post(&report, commit).await;
        }

        info!(leg = %leg, phase = %LegPhase::Done, "leg phase");
    }

    /// Posts the single aggregated status when running in aggregate mode.
    pub async fn report_aggregate(&self, outcomes: &[LegOutcome], skipped: usize, commit: &CommitRef) {
        if self.mode != ReportMode::Aggregate {
            return;
        }
        match self.aggregate_report(outcomes, skipped, commit) {
            Some(report) => self.post(&report, commit).await,
            None => debug!("no legs ran, aggregate status not posted"),
        }
    }

    async fn upload_coverage(&self, outcome: &LegOutcome, commit: &CommitRef) {
        let leg = outcome.leg();
        let Some(artifact) = outcome.coverage() else {
            debug!(leg = %leg, "no coverage artifact to upload");
            return;
        };
        let Some((uploader, credential)) = &self.uploader else {
            debug!(leg = %leg, "coverage upload not configured");
            return;
        };

        match uploader.upload(credential, artifact, commit, leg).await {
            Ok(()) => info!(leg = %leg, artifact = %artifact.display(), "coverage uploaded"),
            Err(err) => {
                println!("{}", t!("report.upload_failed", leg = leg, error = &err).yellow());
                warn!(
                    leg = %leg,
                    artifact = %artifact.display(),
                    commit = %commit.sha,
                    error = ?err,
                    "coverage upload failed"
                );
            }
        }
    }

    async fn post(&self, report: &StatusReport, commit: &CommitRef) {
        let Some((publisher, credential)) = &self.publisher else {
            debug!(state = %report.state, "commit status not configured");
            return;
        };

        match publisher.publish(credential, commit, report).await {
            Ok(()) => info!(
                state = %report.state,
                context = %report.context,
                commit = %commit.sha,
                "commit status posted"
            ),
            Err(err) => {
                println!("{}", t!("report.status_failed", state = report.state, error = &err).yellow());
                warn!(
                    state = %report.state,
                    context = %report.context,
                    commit = %commit.sha,
                    error = ?err,
                    "commit status post failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{LegResult, LegStatus};
    use chrono::Utc;
    use std::time::Duration;

    fn completed(version: &str, status: LegStatus) -> LegOutcome {
        LegOutcome::Completed(LegResult {
            leg: Leg::new([("python-version", version)]),
            status,
            failed_phase: None,
            coverage: None,
            diagnostic: None,
            output: String::new(),
            started_at: Utc::now(),
            duration: Duration::from_secs(1),
        })
    }

    #[test]
    fn aggregate_of_nothing_is_none() {
        assert_eq!(aggregate_state(&[], 0), None);
    }

    #[test]
    fn aggregate_prefers_error_then_failure() {
        let ok = completed("3.12", LegStatus::Success);
        let failed = completed("3.11", LegStatus::Failure);
        let fault = LegOutcome::Fault {
            leg: Leg::new([("python-version", "3.10")]),
            message: "leg task panicked".to_string(),
        };

        assert_eq!(aggregate_state(&[ok.clone()], 0), Some(StatusState::Success));
        assert_eq!(
            aggregate_state(&[ok.clone(), failed.clone()], 0),
            Some(StatusState::Failure)
        );
        assert_eq!(aggregate_state(&[fault, failed, ok], 0), Some(StatusState::Error));
    }

    #[test]
    fn aggregate_with_skipped_legs_is_an_error() {
        let ok = completed("3.12", LegStatus::Success);
        assert_eq!(aggregate_state(&[ok.clone()], 2), Some(StatusState::Error));
        assert_eq!(aggregate_state(&[], 3), Some(StatusState::Error));

        let reporter = StatusReporter::new("ci/matrix", ReportMode::Aggregate);
        let report = reporter
            .aggregate_report(&[ok], 3, &CommitRef::new("acme/widgets", "abc"))
            .unwrap();
        assert_eq!(report.state, StatusState::Error);
        assert_eq!(report.description, "1/4 legs passed, 3 skipped");
    }

    #[test]
    fn leg_report_names_the_leg() {
        let reporter = StatusReporter::new("ci/matrix", ReportMode::PerLeg);
        let report = reporter.leg_report(
            &completed("3.11", LegStatus::Failure),
            &CommitRef::new("acme/widgets", "abc"),
        );
        assert_eq!(report.state, StatusState::Failure);
        assert_eq!(report.description, "python-version=3.11: tests failed");
        assert_eq!(report.context, "ci/matrix");
    }
}
