//! # Matrix Pipeline Library / Matrix Pipeline 库
//!
//! This library provides the core functionality for the Matrix Pipeline tool,
//! a configuration-driven CI orchestrator: it expands a version matrix into
//! legs, runs every leg through provisioning, dependency installation and
//! tests with coverage, then uploads coverage and posts a commit status for
//! each leg.
//!
//! 此库为 Matrix Pipeline 工具提供核心功能。这是一个配置驱动的 CI 编排器：
//! 它将版本矩阵展开为分支，让每个分支依次完成环境准备、依赖安装和带覆盖率的测试，
//! 然后为每个分支上传覆盖率并发布提交状态。
//!
//! ## Modules / 模块
//!
//! - `core` - Configuration, matrix expansion, leg execution and status reporting
//! - `infra` - Child processes, file system, HTTP clients and tracing
//! - `reporting` - Console and HTML summaries of a run
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 配置、矩阵展开、分支执行和状态报告
//! - `infra` - 子进程、文件系统、HTTP 客户端和日志
//! - `reporting` - 运行的控制台和 HTML 摘要
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;

/// Picks the best available locale for `requested` (e.g. "zh-CN" or "en-US").
///
/// The full locale is tried first, then its language part, and finally the
/// default language ("en").
pub fn resolve_locale(requested: &str) -> String {
    let available_locales = rust_i18n::available_locales!();

    if available_locales.contains(&requested) {
        return requested.to_string();
    }
    requested
        .split(['-', '_'])
        .next()
        .filter(|lang_code| available_locales.contains(lang_code))
        .unwrap_or("en")
        .to_string()
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
