//! # Trigger Matching Module / 触发匹配模块
//!
//! Decides whether an incoming event (push or pull request) activates the
//! pipeline.
//!
//! 判断传入的事件（推送或拉取请求）是否激活流水线。

use std::env;
use std::fmt;

use crate::core::config::TriggerConfig;

/// The kind of event that started the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Push,
    PullRequest,
    Other(String),
}

impl EventKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "push" => EventKind::Push,
            "pull_request" => EventKind::PullRequest,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::Other(name) => name,
        }
    }
}

/// An event together with the branch it targets.
///
/// For a push this is the pushed branch; for a pull request it is the base
/// branch the pull request wants to merge into.
///
/// 一个事件及其目标分支。推送时为被推送的分支；拉取请求时为目标基础分支。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub kind: EventKind,
    pub branch: Option<String>,
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.branch {
            Some(branch) => write!(f, "{} -> {}", self.kind.as_str(), branch),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

impl TriggerEvent {
    pub fn new(kind: &str, branch: Option<&str>) -> Self {
        Self {
            kind: EventKind::parse(kind),
            branch: branch.map(strip_ref),
        }
    }

    /// Reads the event from the hosting platform's standard variables
    /// (`GITHUB_EVENT_NAME`, `GITHUB_REF`, `GITHUB_BASE_REF`).
    /// Returns `None` when no event information is present.
    pub fn from_env() -> Option<Self> {
        let name = env::var("GITHUB_EVENT_NAME").ok()?;
        let kind = EventKind::parse(&name);
        let branch = match kind {
            EventKind::PullRequest => env::var("GITHUB_BASE_REF").ok(),
            _ => env::var("GITHUB_REF").ok(),
        };
        Some(Self {
            kind,
            branch: branch.as_deref().map(strip_ref),
        })
    }
}

fn strip_ref(reference: &str) -> String {
    reference
        .strip_prefix("refs/heads/")
        .unwrap_or(reference)
        .to_string()
}

impl TriggerConfig {
    /// True when the event is one of the configured events and targets one
    /// of the configured branches.
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        let event_listed = self.events.iter().any(|e| e == event.kind.as_str());
        let branch_listed = event
            .branch
            .as_ref()
            .is_some_and(|b| self.branches.iter().any(|configured| configured == b));
        event_listed && branch_listed
    }
}
