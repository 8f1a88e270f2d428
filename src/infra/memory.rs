//! # In-Memory Reporting Sinks / 内存报告接收器
//!
//! Local stand-ins for the external services, used by `run --dry-run`.
//! `StatusBoard` keeps the latest status per `(commit, context)` exactly the
//! way the hosting platform does, so the final board shows what a real run
//! would have left behind.
//!
//! 外部服务的本地替身，供 `run --dry-run` 使用。

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::info;

use crate::core::{
    credentials::Credential,
    error::ReportError,
    matrix::Leg,
    models::{CommitRef, StatusReport},
    reporter::{CoverageUploader, StatusPublisher},
};

/// Commit statuses keyed by `(sha, context)`; last write wins.
/// 以 `(sha, context)` 为键的提交状态；后写入者覆盖先写入者。
#[derive(Debug, Default)]
pub struct StatusBoard {
    entries: Mutex<BTreeMap<(String, String), StatusReport>>,
    history: Mutex<Vec<StatusReport>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current status for a commit and context.
    pub fn get(&self, sha: &str, context: &str) -> Option<StatusReport> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(sha.to_string(), context.to_string()))
            .cloned()
    }

    /// Every current entry, ordered by `(sha, context)`.
    pub fn entries(&self) -> Vec<((String, String), StatusReport)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, report)| (key.clone(), report.clone()))
            .collect()
    }

    /// Every post received, in arrival order.
    pub fn history(&self) -> Vec<StatusReport> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl StatusPublisher for StatusBoard {
    async fn publish(
        &self,
        _credential: &Credential,
        commit: &CommitRef,
        report: &StatusReport,
    ) -> Result<(), ReportError> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((commit.sha.clone(), report.context.clone()), report.clone());
        Ok(())
    }
}

/// Logs uploads instead of sending them.
#[derive(Debug, Default)]
pub struct DryRunUploader;

#[async_trait]
impl CoverageUploader for DryRunUploader {
    async fn upload(
        &self,
        _credential: &Credential,
        artifact: &Path,
        commit: &CommitRef,
        leg: &Leg,
    ) -> Result<(), ReportError> {
        let size = tokio::fs::metadata(artifact)
            .await
            .map_err(|e| ReportError::CoverageUpload(format!("cannot read {}: {e}", artifact.display())))?
            .len();
        info!(
            leg = %leg,
            artifact = %artifact.display(),
            bytes = size,
            commit = %commit.sha,
            "dry run: coverage upload skipped"
        );
        Ok(())
    }
}
