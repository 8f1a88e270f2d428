//! # Core Module / 核心模块
//!
//! This module contains the orchestration logic of Matrix Pipeline:
//! configuration, matrix expansion, planning, leg execution and status reporting.
//!
//! 此模块包含 Matrix Pipeline 的编排逻辑：
//! 配置、矩阵展开、执行计划、分支执行和状态报告。

pub mod config;
pub mod credentials;
pub mod error;
pub mod execution;
pub mod matrix;
pub mod models;
pub mod planner;
pub mod reporter;
pub mod trigger;

// Re-exports
pub use config::PipelineConfig;
pub use execution::{run_leg, Orchestrator, Toolchain};
pub use matrix::{expand, Leg, MatrixDimension};
pub use models::{LegOutcome, LegResult, StatusReport, StatusState};
pub use reporter::StatusReporter;
