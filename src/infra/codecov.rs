//! # Coverage Upload Client / 覆盖率上传客户端
//!
//! Uploads coverage reports with the Codecov v4 upload protocol: a `POST`
//! announcing the upload, whose plain-text response names a storage URL on
//! its second line, followed by a `PUT` of the report to that URL.
//!
//! 使用 Codecov v4 上传协议上传覆盖率报告：先 `POST` 声明上传，其纯文本响应的第二行
//! 给出存储 URL，然后将报告 `PUT` 到该 URL。

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::core::{
    credentials::Credential,
    error::ReportError,
    matrix::Leg,
    models::CommitRef,
    reporter::CoverageUploader,
};

/// Longest flag name the service accepts.
const MAX_FLAG_LEN: usize = 45;

pub struct CodecovUploader {
    base_url: String,
    service: String,
    http_client: reqwest::Client,
}

impl CodecovUploader {
    pub fn new(base_url: &str, service: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("matrix-pipeline/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service: service.to_string(),
            http_client,
        })
    }

    /// Query parameters announcing an upload for `leg` at `commit`.
    pub fn upload_params(&self, commit: &CommitRef, leg: &Leg) -> Vec<(&'static str, String)> {
        let flag: String = leg.slug().chars().take(MAX_FLAG_LEN).collect();
        let mut params = vec![
            ("commit", commit.sha.clone()),
            ("slug", commit.repository.clone()),
            ("service", self.service.clone()),
            ("flags", flag),
            ("name", leg.to_string()),
            ("package", concat!("matrix-pipeline-", env!("CARGO_PKG_VERSION")).to_string()),
        ];
        if let Some(branch) = &commit.branch {
            params.push(("branch", branch.clone()));
        }
        if let Some(build) = &commit.build {
            params.push(("build", build.clone()));
        }
        params
    }
}

/// Extracts the storage URL from the announce response body.
pub fn storage_url(body: &str) -> Option<&str> {
    body.lines()
        .nth(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

#[async_trait]
impl CoverageUploader for CodecovUploader {
    async fn upload(
        &self,
        credential: &Credential,
        artifact: &Path,
        commit: &CommitRef,
        leg: &Leg,
    ) -> Result<(), ReportError> {
        let report = tokio::fs::read(artifact).await.map_err(|e| {
            ReportError::CoverageUpload(format!("cannot read {}: {e}", artifact.display()))
        })?;

        let announce_url = format!("{}/upload/v4", self.base_url);
        let response = self
            .http_client
            .post(&announce_url)
            .header(reqwest::header::AUTHORIZATION, format!("token {}", credential.expose()))
            .header(reqwest::header::ACCEPT, "text/plain")
            .query(&self.upload_params(commit, leg))
            .send()
            .await
            .map_err(|e| ReportError::CoverageUpload(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReportError::CoverageUpload(e.to_string()))?;
        if !status.is_success() {
            return Err(ReportError::CoverageUpload(format!("{status}: {}", body.trim())));
        }

        let target = storage_url(&body).ok_or(ReportError::MissingStorageUrl)?;
        debug!(leg = %leg, "uploading coverage report to storage");

        let response = self
            .http_client
            .put(target)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .header("x-amz-acl", "public-read")
            .body(report)
            .send()
            .await
            .map_err(|e| ReportError::CoverageUpload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ReportError::CoverageUpload(format!(
                "storage rejected report: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_url_is_second_line() {
        let body = "https://codecov.io/github/o/r/commit/abc\nhttps://storage.example/put?sig=1\n";
        assert_eq!(storage_url(body), Some("https://storage.example/put?sig=1"));
        assert_eq!(storage_url("only-one-line"), None);
    }

    #[test]
    fn flags_are_capped() {
        let uploader = CodecovUploader::new("https://codecov.io/", "github-actions").unwrap();
        let leg = Leg::new([("python-version", "3.11"), ("os", "a-very-long-operating-system-label")]);
        let params = uploader.upload_params(&CommitRef::new("o/r", "abc"), &leg);
        let flag = &params.iter().find(|(k, _)| *k == "flags").unwrap().1;
        assert!(flag.len() <= MAX_FLAG_LEN);
    }
}
