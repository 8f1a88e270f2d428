//! # Commit Status Client / 提交状态客户端
//!
//! Posts commit statuses through the GitHub REST API
//! (`POST /repos/{owner}/{repo}/statuses/{sha}`).
//!
//! 通过 GitHub REST API 发布提交状态。

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::core::{
    credentials::Credential,
    error::ReportError,
    models::{CommitRef, StatusReport},
    reporter::StatusPublisher,
};

pub struct GitHubStatusPublisher {
    api_url: String,
    http_client: reqwest::Client,
}

impl GitHubStatusPublisher {
    pub fn new(api_url: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("matrix-pipeline/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn status_url(&self, commit: &CommitRef) -> String {
        format!(
            "{}/repos/{}/statuses/{}",
            self.api_url, commit.repository, commit.sha
        )
    }
}

#[async_trait]
impl StatusPublisher for GitHubStatusPublisher {
    async fn publish(
        &self,
        credential: &Credential,
        commit: &CommitRef,
        report: &StatusReport,
    ) -> Result<(), ReportError> {
        let response = self
            .http_client
            .post(self.status_url(commit))
            .bearer_auth(credential.expose())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(report)
            .send()
            .await
            .map_err(|e| ReportError::StatusPost(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ReportError::StatusPost(format!("{status}: {}", body.trim())))
    }
}
