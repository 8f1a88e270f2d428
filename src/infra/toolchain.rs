//! # Process Toolchain Module / 进程工具链模块
//!
//! The real Leg Runner steps: a virtual environment per leg, pip for
//! dependencies and the configured test command for the test step.
//!
//! 真实的分支运行步骤：每个分支一个虚拟环境，使用 pip 安装依赖，并使用配置的测试命令进行测试。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    core::{
        config::{EnvConfig, EnvironmentConfig, InstallConfig, PipelineConfig, TestConfig},
        error::StepError,
        execution::{LegEnvironment, TestRun, Toolchain},
        matrix::Leg,
    },
    infra::{command, fs},
};

/// Runs leg steps as child processes.
///
/// Temporary leg directories are handed to `keeper` once provisioned, so
/// they outlive the leg and its coverage file stays readable until the
/// receiving side drops them at the end of the run.
///
/// 以子进程方式运行分支步骤。
/// 准备好的临时分支目录会交给 `keeper`，使其在分支结束后依然存在，
/// 覆盖率文件在运行结束前都保持可读。
pub struct ProcessToolchain {
    project_root: PathBuf,
    env: EnvConfig,
    environment: EnvironmentConfig,
    install: InstallConfig,
    test: TestConfig,
    keeper: mpsc::UnboundedSender<TempDir>,
}

impl ProcessToolchain {
    pub fn new(
        project_root: PathBuf,
        config: &PipelineConfig,
        keeper: mpsc::UnboundedSender<TempDir>,
    ) -> Self {
        Self {
            project_root,
            env: config.env.clone(),
            environment: config.environment.clone(),
            install: config.install.clone(),
            test: config.test.clone(),
            keeper,
        }
    }

    fn interpreter_command(&self, leg: &Leg) -> Result<Vec<String>, StepError> {
        let dimension = &self.environment.interpreter_dimension;
        let version = leg.get(dimension).ok_or_else(|| StepError::EnvironmentProvisioning {
            detail: format!("leg has no value for '{dimension}'"),
            output: String::new(),
        })?;
        command::render_command(&self.environment.interpreter, &[("version", version)]).map_err(
            |e| StepError::EnvironmentProvisioning {
                detail: format!("{e:#}"),
                output: String::new(),
            },
        )
    }

    /// Where the test step writes this leg's coverage report.
    /// With a shared workspace it goes to the leg's own directory.
    fn coverage_report(&self, env: &LegEnvironment) -> PathBuf {
        if self.environment.isolate_workspace {
            env.workspace.join(&self.test.coverage_file)
        } else {
            env.artifacts.join(&self.test.coverage_file)
        }
    }

    async fn provision_in(&self, leg: &Leg, root: &Path) -> Result<LegEnvironment, StepError> {
        let provisioning = |detail: String, output: String| StepError::EnvironmentProvisioning { detail, output };

        let interpreter = self.interpreter_command(leg)?;
        let workspace = if self.environment.isolate_workspace {
            let workspace = root.join("workspace");
            fs::copy_workspace(&self.project_root, &workspace)
                .map_err(|e| provisioning(format!("{e:#}"), String::new()))?;
            workspace
        } else {
            self.project_root.clone()
        };

        let mut env_vars = vec![(
            self.env.workspace_var.clone(),
            workspace.display().to_string(),
        )];
        env_vars.extend(leg.env_vars());

        let mut log = String::new();

        let mut probe = interpreter.clone();
        probe.push("--version".to_string());
        let (ok, output) = run_logged(&probe, &workspace, &env_vars).await;
        log.push_str(&output);
        if !ok {
            return Err(provisioning(
                format!("interpreter '{}' is not available", command::display_command(&interpreter)),
                log,
            ));
        }

        let venv = root.join("venv");
        let mut create = interpreter;
        create.extend(["-m".to_string(), "venv".to_string(), venv.display().to_string()]);
        let (ok, output) = run_logged(&create, &workspace, &env_vars).await;
        log.push_str(&output);
        if !ok {
            return Err(provisioning("virtual environment creation failed".to_string(), log));
        }

        env_vars.push(("VIRTUAL_ENV".to_string(), venv.display().to_string()));

        Ok(LegEnvironment {
            workspace,
            interpreter: venv_python(&venv),
            artifacts: root.to_path_buf(),
            env_vars,
            log,
        })
    }
}

#[async_trait]
impl Toolchain for ProcessToolchain {
    async fn provision(&self, leg: &Leg) -> Result<LegEnvironment, StepError> {
        let root = fs::create_leg_dir(&leg.slug()).map_err(|e| StepError::EnvironmentProvisioning {
            detail: format!("{e:#}"),
            output: String::new(),
        })?;

        let env = self.provision_in(leg, root.path()).await?;

        self.keeper.send(root).map_err(|_| StepError::EnvironmentProvisioning {
            detail: "environment keeper is closed".to_string(),
            output: env.log.clone(),
        })?;
        Ok(env)
    }

    async fn install(&self, env: &LegEnvironment) -> Result<String, StepError> {
        let python = env.interpreter.display().to_string();
        let mut log = String::new();

        // Tooling first so project requirements cannot shadow its pins.
        if !self.install.tooling.is_empty() {
            let cmd = pip_install(&python, &self.install.tooling);
            let (ok, output) = run_logged(&cmd, &env.workspace, &env.env_vars).await;
            log.push_str(&output);
            if !ok {
                return Err(StepError::DependencyInstall {
                    detail: "tooling installation failed".to_string(),
                    output: log,
                });
            }
        }

        let manifest = env.workspace.join(&self.install.manifest);
        if !manifest.is_file() {
            return Err(StepError::DependencyInstall {
                detail: format!("manifest not found: {}", manifest.display()),
                output: log,
            });
        }
        let cmd = pip_install(&python, &["-r".to_string(), manifest.display().to_string()]);
        let (ok, output) = run_logged(&cmd, &env.workspace, &env.env_vars).await;
        log.push_str(&output);
        if !ok {
            return Err(StepError::DependencyInstall {
                detail: format!("could not install {}", self.install.manifest),
                output: log,
            });
        }

        Ok(log)
    }

    async fn run_tests(&self, env: &LegEnvironment) -> Result<TestRun, StepError> {
        let python = env.interpreter.display().to_string();
        let mut parts = command::render_command(&self.test.command, &[("python", python.as_str())]).map_err(
            |e| StepError::TestExecution {
                detail: format!("{e:#}"),
                output: String::new(),
            },
        )?;
        let report = self.coverage_report(env);
        // A report left in the project by an earlier run must not pass for this leg's.
        fs::remove_stale_file(&report).map_err(|e| StepError::TestExecution {
            detail: format!("{e:#}"),
            output: String::new(),
        })?;
        parts.extend(self.test.runner_args(&report));

        let mut cmd = tokio::process::Command::new(&parts[0]);
        cmd.args(&parts[1..])
            .current_dir(&env.workspace)
            .envs(env.env_vars.iter().cloned());

        let command_line = command::display_command(&parts);
        debug!(command = %command_line, "running tests");
        let (status, output) = command::spawn_and_capture(cmd).await;
        let output = format!("$ {command_line}\n{output}");

        let status = status.map_err(|e| StepError::TestExecution {
            detail: format!("could not start '{command_line}': {e}"),
            output: output.clone(),
        })?;

        Ok(TestRun {
            passed: status.success(),
            output,
            coverage: report.is_file().then_some(report),
        })
    }
}

/// Runs one command and returns whether it exited successfully, with its
/// output prefixed by the command line. Spawn failures count as failures.
async fn run_logged(parts: &[String], cwd: &Path, env_vars: &[(String, String)]) -> (bool, String) {
    let command_line = command::display_command(parts);
    debug!(command = %command_line, "running step command");

    let mut cmd = tokio::process::Command::new(&parts[0]);
    cmd.args(&parts[1..])
        .current_dir(cwd)
        .envs(env_vars.iter().cloned());

    let (status, output) = command::spawn_and_capture(cmd).await;
    match status {
        Ok(status) => (status.success(), format!("$ {command_line}\n{output}")),
        Err(e) => (false, format!("$ {command_line}\n{e}\n")),
    }
}

fn pip_install(python: &str, args: &[String]) -> Vec<String> {
    let mut cmd = vec![
        python.to_string(),
        "-m".to_string(),
        "pip".to_string(),
        "install".to_string(),
    ];
    cmd.extend(args.iter().cloned());
    cmd
}

fn venv_python(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}
