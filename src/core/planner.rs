//! # Execution Planner Module / 执行计划模块
//!
//! Expands the matrix, drops excluded legs and, when the run is split across
//! several CI runners, keeps only this runner's share.
//!
//! 展开矩阵，移除被排除的分支；当运行被拆分到多个 CI 运行器时，只保留当前运行器负责的部分。

use anyhow::{bail, Result};

use crate::core::config::MatrixConfig;
use crate::core::matrix::{self, Leg};

/// Represents the complete execution plan for one runner.
/// 表示单个运行器的完整执行计划。
#[derive(Debug)]
pub struct ExecutionPlan {
    /// Legs to run, in expansion order / 要运行的分支（按展开顺序）
    pub legs: Vec<Leg>,
    /// Legs removed by `matrix.exclude` / 被 `matrix.exclude` 移除的分支数量
    pub excluded_count: usize,
    /// Whether legs were distributed across multiple runners.
    /// 分支是否被分配到多个运行器上。
    pub is_distributed: bool,
}

/// Creates an execution plan for the given matrix.
///
/// # Arguments
/// * `matrix` - The matrix section of the pipeline configuration
/// * `total_runners` - Optional total number of runners for distributed execution
/// * `runner_index` - Optional index of this runner (0-based)
pub fn plan_execution(
    matrix: &MatrixConfig,
    total_runners: Option<usize>,
    runner_index: Option<usize>,
) -> Result<ExecutionPlan> {
    let (kept, excluded): (Vec<_>, Vec<_>) = matrix::expand(&matrix.dimensions)
        .into_iter()
        .partition(|leg| !matrix.exclude.iter().any(|entry| leg.matches(entry)));

    let (legs, is_distributed) = match (total_runners, runner_index) {
        (Some(total), Some(index)) => {
            if total == 0 || index >= total {
                bail!("Runner index must be less than total runners.");
            }
            let distributed: Vec<_> = kept
                .into_iter()
                .enumerate()
                .filter(|(i, _)| i % total == index)
                .map(|(_, leg)| leg)
                .collect();
            (distributed, true)
        }
        (None, None) => (kept, false),
        _ => bail!("Both --total-runners and --runner-index must be provided."),
    };

    Ok(ExecutionPlan {
        legs,
        excluded_count: excluded.len(),
        is_distributed,
    })
}
