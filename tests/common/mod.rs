// Shared test helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio_util::sync::CancellationToken;

use matrix_pipeline::core::{
    credentials::Credential,
    error::{ReportError, StepError},
    execution::{LegEnvironment, TestRun, Toolchain},
    matrix::{Leg, MatrixDimension},
    models::{CommitRef, StatusReport},
    reporter::{CoverageUploader, StatusPublisher},
};

/// Where a scripted leg goes wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fail {
    Provision,
    Install,
    /// The test command runs and reports failing tests.
    Tests,
    /// The test command cannot be started.
    TestStart,
    /// The leg task panics while provisioning.
    Panic,
}

const LEG_VAR: &str = "SCRIPTED_LEG";

/// A `Toolchain` that never spawns processes. Each leg succeeds unless a
/// failure is scripted for it; every call is counted.
pub struct ScriptedToolchain {
    scratch: TempDir,
    script: HashMap<String, Fail>,
    step_delay: Duration,
    cancel_on_first_provision: Option<CancellationToken>,
    pub provision_calls: AtomicUsize,
    pub install_calls: AtomicUsize,
    pub test_calls: AtomicUsize,
    running: AtomicUsize,
    pub max_running: AtomicUsize,
}

impl ScriptedToolchain {
    pub fn new() -> Self {
        Self {
            scratch: tempdir().expect("Failed to create scratch directory"),
            script: HashMap::new(),
            step_delay: Duration::ZERO,
            cancel_on_first_provision: None,
            provision_calls: AtomicUsize::new(0),
            install_calls: AtomicUsize::new(0),
            test_calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    /// Scripts a failure for the leg whose display form is `leg`
    /// (e.g. `"python-version=3.11"`).
    pub fn failing(mut self, leg: &str, fail: Fail) -> Self {
        self.script.insert(leg.to_string(), fail);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Cancels `token` as soon as the first leg starts provisioning.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_first_provision = Some(token);
        self
    }

    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.provision_calls.load(Ordering::SeqCst),
            self.install_calls.load(Ordering::SeqCst),
            self.test_calls.load(Ordering::SeqCst),
        )
    }

    fn fail_for(&self, leg: &str) -> Option<Fail> {
        self.script.get(leg).copied()
    }

    fn leg_of(env: &LegEnvironment) -> String {
        env.env_vars
            .iter()
            .find(|(k, _)| k == LEG_VAR)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Toolchain for ScriptedToolchain {
    async fn provision(&self, leg: &Leg) -> Result<LegEnvironment, StepError> {
        let first = self.provision_calls.fetch_add(1, Ordering::SeqCst) == 0;
        if first {
            if let Some(token) = &self.cancel_on_first_provision {
                token.cancel();
            }
        }

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.step_delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        let name = leg.to_string();
        match self.fail_for(&name) {
            Some(Fail::Panic) => panic!("scripted panic for {name}"),
            Some(Fail::Provision) => {
                return Err(StepError::EnvironmentProvisioning {
                    detail: "interpreter not found".to_string(),
                    output: format!("no interpreter for {name}\n"),
                });
            }
            _ => {}
        }

        let workspace = self.scratch.path().join(leg.slug());
        fs::create_dir_all(&workspace).expect("Failed to create leg workspace");
        let mut env_vars = vec![(LEG_VAR.to_string(), name.clone())];
        env_vars.extend(leg.env_vars());
        Ok(LegEnvironment {
            interpreter: workspace.join("bin").join("python"),
            artifacts: workspace.clone(),
            workspace,
            env_vars,
            log: format!("provisioned {name}\n"),
        })
    }

    async fn install(&self, env: &LegEnvironment) -> Result<String, StepError> {
        self.install_calls.fetch_add(1, Ordering::SeqCst);
        let name = Self::leg_of(env);
        if self.fail_for(&name) == Some(Fail::Install) {
            return Err(StepError::DependencyInstall {
                detail: "could not install requirements.txt".to_string(),
                output: "ERROR: No matching distribution found\n".to_string(),
            });
        }
        Ok("installed\n".to_string())
    }

    async fn run_tests(&self, env: &LegEnvironment) -> Result<TestRun, StepError> {
        self.test_calls.fetch_add(1, Ordering::SeqCst);
        let name = Self::leg_of(env);
        if self.fail_for(&name) == Some(Fail::TestStart) {
            return Err(StepError::TestExecution {
                detail: "could not start pytest".to_string(),
                output: String::new(),
            });
        }

        let report = env.workspace.join("coverage.xml");
        fs::write(&report, format!("<coverage leg=\"{name}\"/>")).expect("Failed to write coverage");
        let passed = self.fail_for(&name) != Some(Fail::Tests);
        Ok(TestRun {
            passed,
            output: if passed { "4 passed\n" } else { "1 failed, 3 passed\n" }.to_string(),
            coverage: Some(report),
        })
    }
}

/// Records uploads; optionally rejects every one of them.
#[derive(Default)]
pub struct RecordingUploader {
    pub fail: bool,
    pub uploads: Mutex<Vec<(String, PathBuf)>>,
}

impl RecordingUploader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn legs(&self) -> Vec<String> {
        let mut legs: Vec<_> = self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(leg, _)| leg.clone())
            .collect();
        legs.sort();
        legs
    }
}

#[async_trait]
impl CoverageUploader for RecordingUploader {
    async fn upload(
        &self,
        _credential: &Credential,
        artifact: &Path,
        _commit: &CommitRef,
        leg: &Leg,
    ) -> Result<(), ReportError> {
        self.uploads
            .lock()
            .unwrap()
            .push((leg.to_string(), artifact.to_path_buf()));
        if self.fail {
            return Err(ReportError::CoverageUpload("503 Service Unavailable".to_string()));
        }
        Ok(())
    }
}

/// Records every status post; optionally rejects all of them.
#[derive(Default)]
pub struct RecordingPublisher {
    pub fail: bool,
    pub posts: Mutex<Vec<StatusReport>>,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn posts(&self) -> Vec<StatusReport> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusPublisher for RecordingPublisher {
    async fn publish(
        &self,
        _credential: &Credential,
        _commit: &CommitRef,
        report: &StatusReport,
    ) -> Result<(), ReportError> {
        self.posts.lock().unwrap().push(report.clone());
        if self.fail {
            return Err(ReportError::StatusPost("401 Unauthorized".to_string()));
        }
        Ok(())
    }
}

pub fn token() -> Credential {
    Credential::new("test-token")
}

pub fn commit() -> CommitRef {
    let mut commit = CommitRef::new("acme/widgets", "0123456789abcdef0123456789abcdef01234567");
    commit.branch = Some("main".to_string());
    commit
}

pub fn python_versions(versions: &[&str]) -> Vec<MatrixDimension> {
    vec![MatrixDimension::new("python-version", versions)]
}

pub fn python_legs(versions: &[&str]) -> Vec<Leg> {
    matrix_pipeline::core::matrix::expand(&python_versions(versions))
}

/// Interpreter versions crossed with operating systems.
pub fn matrix_legs(versions: &[&str], systems: &[&str]) -> Vec<Leg> {
    matrix_pipeline::core::matrix::expand(&[
        MatrixDimension::new("python-version", versions),
        MatrixDimension::new("os", systems),
    ])
}

/// Writes a pipeline file into `dir` and returns its path.
pub fn write_pipeline(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("Pipeline.toml");
    fs::write(&path, content).expect("Failed to write Pipeline.toml");
    path
}

pub const MINIMAL_PIPELINE: &str = r#"
language = "en"

[[matrix.dimensions]]
name = "python-version"
values = ["3.10", "3.11", "3.12", "3.13"]

[[matrix.dimensions]]
name = "os"
values = ["ubuntu-latest"]

[test]
coverage_target = "widgets"
"#;
