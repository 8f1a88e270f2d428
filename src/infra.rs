//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for Matrix Pipeline:
//! command execution, file system operations, the process-backed toolchain,
//! HTTP clients for the coverage and commit status services, and tracing setup.
//!
//! 此模块为 Matrix Pipeline 提供基础设施服务：
//! 命令执行、文件系统操作、基于进程的工具链、覆盖率和提交状态服务的 HTTP 客户端以及日志初始化。

pub mod codecov;
pub mod command;
pub mod fs;
pub mod github;
pub mod memory;
pub mod telemetry;
pub mod toolchain;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
