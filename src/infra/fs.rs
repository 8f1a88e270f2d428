//! # File System Operations Module / 文件系统操作模块
//!
//! Per-leg temporary directories and workspace copies.
//!
//! 每个分支的临时目录和工作区副本。

use anyhow::{Context, Result};
use fs_extra::dir::{copy, CopyOptions};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Directory names never copied into a leg workspace.
const SKIPPED_ENTRIES: &[&str] = &[".git", "target", ".venv", "venv", "__pycache__", ".pytest_cache"];

/// Creates a unique temporary directory for a leg.
///
/// # Arguments
/// * `leg_slug` - Filesystem-safe leg identifier, used in the directory name
pub fn create_leg_dir(leg_slug: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("matrix_pipeline_{leg_slug}_"))
        .tempdir()
        .context("Failed to create temporary leg directory")
}

/// Copies the project into `to`, skipping VCS metadata, build output and
/// local virtual environments.
///
/// 将项目复制到 `to`，跳过版本控制元数据、构建输出和本地虚拟环境。
pub fn copy_workspace(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)
        .with_context(|| format!("Failed to create workspace: {}", to.display()))?;

    let mut options = CopyOptions::new();
    options.overwrite = true;

    let entries = fs::read_dir(from)
        .with_context(|| format!("Failed to read project directory: {}", from.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if SKIPPED_ENTRIES.iter().any(|skip| name == *skip) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            copy(&path, to, &options)
                .with_context(|| format!("Failed to copy directory: {}", path.display()))?;
        } else {
            fs::copy(&path, to.join(&name))
                .with_context(|| format!("Failed to copy file: {}", path.display()))?;
        }
    }
    Ok(())
}

/// Deletes `path` if it exists, so that a later check only sees a fresh file.
pub fn remove_stale_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("Failed to remove stale file: {}", path.display()))
        }
        _ => Ok(()),
    }
}
