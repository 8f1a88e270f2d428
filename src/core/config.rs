//! # Pipeline Configuration Module / 流水线配置模块
//!
//! Defines the `Pipeline.toml` schema and its loading and validation.
//! Only `[[matrix.dimensions]]` is mandatory; every other section falls back
//! to the defaults of a pytest + pytest-cov project reporting to Codecov and
//! GitHub commit statuses.
//!
//! 定义 `Pipeline.toml` 的结构及其加载与验证。
//! 只有 `[[matrix.dimensions]]` 是必需的；其他部分都会回退到默认值。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::core::error::ConfigError;
use crate::core::matrix::MatrixDimension;

/// The complete pipeline definition, loaded from a TOML file.
/// 从 TOML 文件加载的完整流水线定义。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// The language for console messages (e.g. "en", "zh-CN").
    /// 控制台消息的语言（例如 "en", "zh-CN"）。
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub triggers: TriggerConfig,

    pub matrix: MatrixConfig,

    #[serde(default)]
    pub env: EnvConfig,

    #[serde(default)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub install: InstallConfig,

    #[serde(default)]
    pub test: TestConfig,

    #[serde(default)]
    pub coverage: CoverageConfig,

    #[serde(default)]
    pub status: StatusConfig,
}

fn default_language() -> String {
    "en".to_string()
}

/// Events and branches that activate the pipeline.
/// 激活流水线的事件和分支。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub events: Vec<String>,
    pub branches: Vec<String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            events: vec!["push".to_string(), "pull_request".to_string()],
            branches: vec!["main".to_string()],
        }
    }
}

/// Matrix dimensions plus optional exclusions.
/// 矩阵维度以及可选的排除项。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatrixConfig {
    pub dimensions: Vec<MatrixDimension>,
    /// Partial assignments; a leg matching every pair of an entry is dropped.
    /// 部分赋值；与某一条目全部键值对匹配的分支将被移除。
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<BTreeMap<String, String>>,
}

/// Process-wide environment shared by every step.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Variable that receives the workspace root path / 接收工作区根路径的变量
    pub workspace_var: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            workspace_var: "PYTHONPATH".to_string(),
        }
    }
}

/// How each leg's isolated environment is provisioned.
/// 每个分支隔离环境的创建方式。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// The matrix dimension that carries the interpreter version.
    pub interpreter_dimension: String,
    /// Interpreter executable template; `{version}` is replaced by the leg's value.
    pub interpreter: String,
    /// Copy the project into the leg's temporary directory before running.
    pub isolate_workspace: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            interpreter_dimension: "python-version".to_string(),
            interpreter: "python{version}".to_string(),
            isolate_workspace: true,
        }
    }
}

/// Tooling installed before the project's own dependency manifest.
/// 在项目依赖清单之前安装的工具。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallConfig {
    pub tooling: Vec<String>,
    pub manifest: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            tooling: vec![
                "pytest".to_string(),
                "pytest-xdist".to_string(),
                "pytest-cov".to_string(),
            ],
            manifest: "requirements.txt".to_string(),
        }
    }
}

/// The test invocation contract.
/// 测试调用约定。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TestConfig {
    /// Command template; `{python}` is replaced by the environment's interpreter.
    pub command: String,
    /// Worker count handed to the test runner; "auto" lets the runner decide.
    pub parallelism: String,
    /// Module or package that coverage is scoped to. Required.
    pub coverage_target: String,
    pub coverage_format: String,
    /// Report file name. Relative to the workspace root when legs run in
    /// their own copy of the project, to the leg's directory otherwise.
    pub coverage_file: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            command: "{python} -m pytest".to_string(),
            parallelism: "auto".to_string(),
            coverage_target: String::new(),
            coverage_format: "xml".to_string(),
            coverage_file: "coverage.xml".to_string(),
            extra_args: vec![],
        }
    }
}

impl TestConfig {
    /// The arguments appended to the test command, in order, writing the
    /// coverage report to `report`.
    pub fn runner_args(&self, report: &Path) -> Vec<String> {
        let mut args = vec![
            "-n".to_string(),
            self.parallelism.clone(),
            format!("--cov={}", self.coverage_target),
            format!("--cov-report={}:{}", self.coverage_format, report.display()),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Coverage service settings.
/// 覆盖率服务设置。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoverageConfig {
    pub enabled: bool,
    pub url: String,
    /// Name of the environment variable holding the upload token.
    pub token_env: String,
    pub service: String,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://codecov.io".to_string(),
            token_env: "CODECOV_TOKEN".to_string(),
            service: "github-actions".to_string(),
        }
    }
}

/// How leg outcomes are published as commit statuses.
/// 分支结果如何发布为提交状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReportMode {
    /// Every leg posts its own status under the shared context.
    #[default]
    PerLeg,
    /// One status per commit, posted after every leg finished.
    Aggregate,
}

/// Commit status settings.
/// 提交状态设置。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    pub enabled: bool,
    pub api_url: String,
    /// Context label identifying this pipeline; shared by all legs.
    pub context: String,
    pub token_env: String,
    pub mode: ReportMode,
    /// Post a `pending` status before the first leg starts.
    pub post_pending: bool,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://api.github.com".to_string(),
            context: "matrix-pipeline".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            mode: ReportMode::PerLeg,
            post_pending: false,
        }
    }
}

impl PipelineConfig {
    /// Checks the cross-field invariants serde cannot express.
    ///
    /// 检查 serde 无法表达的跨字段约束。
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for dim in &self.matrix.dimensions {
            if dim.name.trim().is_empty() {
                return Err(ConfigError::EmptyDimensionName);
            }
            if !seen.insert(dim.name.as_str()) {
                return Err(ConfigError::DuplicateDimension(dim.name.clone()));
            }
        }

        if !seen.contains(self.environment.interpreter_dimension.as_str()) {
            return Err(ConfigError::UnknownInterpreterDimension(
                self.environment.interpreter_dimension.clone(),
            ));
        }

        for entry in &self.matrix.exclude {
            if let Some(unknown) = entry.keys().find(|k| !seen.contains(k.as_str())) {
                return Err(ConfigError::UnknownExclusionDimension(unknown.clone()));
            }
        }

        match shlex::split(&self.test.command) {
            Some(parts) if !parts.is_empty() => {}
            _ => return Err(ConfigError::InvalidCommand(self.test.command.clone())),
        }

        if self.status.context.trim().is_empty() {
            return Err(ConfigError::EmptyContext);
        }

        if self.test.coverage_target.trim().is_empty() {
            return Err(ConfigError::MissingCoverageTarget);
        }

        Ok(())
    }
}

/// Reads, parses and validates a pipeline configuration file.
///
/// 读取、解析并验证流水线配置文件。
pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: PipelineConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}
