//! # Error Types Module / 错误类型模块
//!
//! Domain errors for the pipeline. Step errors are fatal to the leg that
//! raised them; report errors are logged and swallowed by the reporter;
//! configuration errors stop the run before any leg starts.
//!
//! 流水线的领域错误。步骤错误对引发它的分支是致命的；
//! 报告错误会被记录并忽略；配置错误会在任何分支开始之前终止运行。

use thiserror::Error;

/// A fatal failure of one Leg Runner step.
/// 单个分支运行步骤的致命失败。
#[derive(Debug, Error)]
pub enum StepError {
    /// The interpreter could not be found or the isolated environment could not be created.
    #[error("environment provisioning failed: {detail}")]
    EnvironmentProvisioning { detail: String, output: String },

    /// Tooling or project dependencies could not be installed.
    #[error("dependency installation failed: {detail}")]
    DependencyInstall { detail: String, output: String },

    /// The test command could not be started.
    #[error("test execution failed: {detail}")]
    TestExecution { detail: String, output: String },
}

impl StepError {
    /// The fixed, human-readable diagnostic attached to the leg result.
    pub fn diagnostic(&self) -> &'static str {
        match self {
            StepError::EnvironmentProvisioning { .. } => "environment provisioning failed",
            StepError::DependencyInstall { .. } => "dependency installation failed",
            StepError::TestExecution { .. } => "test execution failed",
        }
    }

    /// Captured command output, if any.
    pub fn output(&self) -> &str {
        match self {
            StepError::EnvironmentProvisioning { output, .. }
            | StepError::DependencyInstall { output, .. }
            | StepError::TestExecution { output, .. } => output,
        }
    }
}

/// A non-fatal failure of the reporting phase.
/// 报告阶段的非致命失败。
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("coverage upload failed: {0}")]
    CoverageUpload(String),

    #[error("coverage service returned no storage URL")]
    MissingStorageUrl,

    #[error("commit status post failed: {0}")]
    StatusPost(String),
}

/// Problems found while validating a pipeline configuration.
/// 验证流水线配置时发现的问题。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("matrix dimension '{0}' is declared more than once")]
    DuplicateDimension(String),

    #[error("matrix dimension name must not be empty")]
    EmptyDimensionName,

    #[error("interpreter dimension '{0}' is not declared in the matrix")]
    UnknownInterpreterDimension(String),

    #[error("matrix exclusion refers to unknown dimension '{0}'")]
    UnknownExclusionDimension(String),

    #[error("invalid command template '{0}'")]
    InvalidCommand(String),

    #[error("status context must not be empty")]
    EmptyContext,

    #[error("test.coverage_target must name the module or package to measure")]
    MissingCoverageTarget,
}
