//! # Validate Command Module / 验证命令模块
//!
//! Parses and validates a pipeline file, then prints the legs it expands to.
//!
//! 解析并验证流水线文件，然后打印其展开后的分支。

use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

use crate::{
    core::{config, planner},
    infra::t,
};

pub fn execute(config_path: &Path, locale: &str) -> Result<()> {
    let pipeline = config::load_pipeline_config(config_path).with_context(|| {
        t!("run.config_parse_failed", locale = locale).to_string()
    })?;
    let plan = planner::plan_execution(&pipeline.matrix, None, None)?;

    println!(
        "{}",
        t!("validate.ok", locale = locale, path = config_path.display()).green()
    );
    println!(
        "{}",
        t!(
            "validate.triggers",
            locale = locale,
            events = pipeline.triggers.events.join(", "),
            branches = pipeline.triggers.branches.join(", ")
        )
    );
    println!(
        "{}",
        t!(
            "validate.legs",
            locale = locale,
            count = plan.legs.len(),
            excluded = plan.excluded_count
        )
        .bold()
    );
    for (i, leg) in plan.legs.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, leg);
    }
    Ok(())
}
