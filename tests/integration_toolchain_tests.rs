//! The process-backed toolchain against a fake interpreter.
//!
//! The fake is a shell script standing in for `python`: it answers
//! `--version`, builds a "virtual environment" whose `bin/python` calls back
//! into the script, pretends to run pip and pytest, and appends every
//! invocation to a log file.
//!
//! 使用伪造解释器测试基于进程的工具链。
#![cfg(unix)]

mod common;

use std::fs;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};
use tokio::sync::mpsc;

use common::matrix_legs;
use matrix_pipeline::core::{
    config::PipelineConfig,
    execution::run_leg,
    models::{LegPhase, LegStatus},
};
use matrix_pipeline::infra::toolchain::ProcessToolchain;

const FAKE_PYTHON: &str = r#"#!/bin/sh
role="$1"
shift
echo "$role $*" >> '@LOG@'
if [ "$1" = "--version" ]; then
  echo "Python $role"
  exit 0
fi
if [ "$1" != "-m" ]; then
  exit 2
fi
case "$2" in
  venv)
    mkdir -p "$3/bin" || exit 1
    printf '#!/bin/sh\nexec sh %s venv "$@"\n' "'@SCRIPT@'" > "$3/bin/python"
    chmod +x "$3/bin/python"
    exit 0
    ;;
  pip)
    case "$*" in
      *" -r "*) echo "installing manifest"; exit @MANIFEST_EXIT@ ;;
    esac
    echo "installing tooling"
    exit 0
    ;;
  pytest)
    echo "env PYTHONPATH=$PYTHONPATH MATRIX_PYTHON_VERSION=$MATRIX_PYTHON_VERSION MATRIX_OS=$MATRIX_OS" >> '@LOG@'
    report=""
    for arg in "$@"; do
      case "$arg" in
        --cov-report=*) report="${arg#--cov-report=*:}" ;;
      esac
    done
    if [ "@WRITE_REPORT@" = "yes" ]; then
      echo "<coverage fresh/>" > "$report"
    fi
    echo "collected 4 items"
    exit @PYTEST_EXIT@
    ;;
esac
exit 2
"#;

/// How the fake interpreter behaves.
struct Behaviour {
    manifest_exit: i32,
    pytest_exit: i32,
    write_report: bool,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            manifest_exit: 0,
            pytest_exit: 0,
            write_report: true,
        }
    }
}

struct FakePython {
    bin: TempDir,
    project: TempDir,
}

impl FakePython {
    fn new(behaviour: Behaviour) -> Self {
        let bin = tempdir().unwrap();
        let project = tempdir().unwrap();
        fs::write(project.path().join("requirements.txt"), "requests\n").unwrap();
        fs::create_dir_all(project.path().join("widgets")).unwrap();
        fs::write(project.path().join("widgets/__init__.py"), "").unwrap();

        let fake = Self { bin, project };
        let script = FAKE_PYTHON
            .replace("@LOG@", &fake.log_path().display().to_string())
            .replace("@SCRIPT@", &fake.script().display().to_string())
            .replace("@MANIFEST_EXIT@", &behaviour.manifest_exit.to_string())
            .replace("@PYTEST_EXIT@", &behaviour.pytest_exit.to_string())
            .replace("@WRITE_REPORT@", if behaviour.write_report { "yes" } else { "no" });
        fs::write(fake.script(), script).unwrap();
        fake
    }

    fn script(&self) -> PathBuf {
        self.bin.path().join("python.sh")
    }

    fn log_path(&self) -> PathBuf {
        self.bin.path().join("calls.log")
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.log_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn config(&self, interpreter: &str, isolate_workspace: bool) -> PipelineConfig {
        let content = format!(
            r#"
[[matrix.dimensions]]
name = "python-version"
values = ["3.11", "3.12"]

[[matrix.dimensions]]
name = "os"
values = ["ubuntu-latest"]

[environment]
interpreter = "{interpreter}"
isolate_workspace = {isolate_workspace}

[test]
coverage_target = "widgets"
"#
        );
        let config: PipelineConfig = toml::from_str(&content).unwrap();
        config.validate().unwrap();
        config
    }

    /// The default setup: every leg gets its own copy of the project.
    fn toolchain(&self) -> (ProcessToolchain, mpsc::UnboundedReceiver<TempDir>) {
        let interpreter = format!("sh '{}' {{version}}", self.script().display());
        self.toolchain_with(&self.config(&interpreter, true))
    }

    fn toolchain_with(
        &self,
        config: &PipelineConfig,
    ) -> (ProcessToolchain, mpsc::UnboundedReceiver<TempDir>) {
        let (keeper_tx, keeper_rx) = mpsc::unbounded_channel();
        let toolchain = ProcessToolchain::new(self.project.path().to_path_buf(), config, keeper_tx);
        (toolchain, keeper_rx)
    }
}

fn leg(version: &str) -> matrix_pipeline::core::matrix::Leg {
    matrix_legs(&[version], &["ubuntu-latest"]).remove(0)
}

#[tokio::test]
async fn steps_run_in_order_with_parallelism_and_coverage() {
    let fake = FakePython::new(Behaviour::default());
    let (toolchain, _keeper) = fake.toolchain();

    let result = run_leg(leg("3.12"), &toolchain).await;

    assert!(result.is_success(), "output:\n{}", result.output);
    let report = result.coverage.clone().expect("coverage report");
    assert_eq!(fs::read_to_string(&report).unwrap().trim(), "<coverage fresh/>");
    let workspace = report.parent().unwrap().to_path_buf();
    assert_ne!(workspace, fake.project.path());

    let calls = fake.calls();
    assert_eq!(calls.len(), 6, "calls: {calls:#?}");
    assert_eq!(calls[0], "3.12 --version");
    assert!(calls[1].starts_with("3.12 -m venv "));
    assert_eq!(calls[2], "venv -m pip install pytest pytest-xdist pytest-cov");
    assert_eq!(
        calls[3],
        format!("venv -m pip install -r {}", workspace.join("requirements.txt").display())
    );
    assert_eq!(
        calls[4],
        format!(
            "venv -m pytest -n auto --cov=widgets --cov-report=xml:{}",
            report.display()
        )
    );
    assert_eq!(
        calls[5],
        format!(
            "env PYTHONPATH={} MATRIX_PYTHON_VERSION=3.12 MATRIX_OS=ubuntu-latest",
            workspace.display()
        )
    );

    assert!(result.output.contains("installing tooling"));
    assert!(result.output.contains("collected 4 items"));
}

#[tokio::test]
async fn stale_report_in_the_project_is_not_attached() {
    let fake = FakePython::new(Behaviour {
        pytest_exit: 4,
        write_report: false,
        ..Behaviour::default()
    });
    let stale = fake.project.path().join("coverage.xml");
    fs::write(&stale, "<coverage stale/>").unwrap();
    let (toolchain, _keeper) = fake.toolchain();

    let result = run_leg(leg("3.12"), &toolchain).await;

    assert_eq!(result.status, LegStatus::Failure);
    assert_eq!(result.failed_phase, Some(LegPhase::Testing));
    assert!(result.coverage.is_none(), "got {:?}", result.coverage);
    // The project itself is left alone.
    assert_eq!(fs::read_to_string(&stale).unwrap(), "<coverage stale/>");
}

#[tokio::test]
async fn failing_tests_still_attach_their_own_report() {
    let fake = FakePython::new(Behaviour {
        pytest_exit: 1,
        ..Behaviour::default()
    });
    fs::write(fake.project.path().join("coverage.xml"), "<coverage stale/>").unwrap();
    let (toolchain, _keeper) = fake.toolchain();

    let result = run_leg(leg("3.11"), &toolchain).await;

    assert_eq!(result.status, LegStatus::Failure);
    assert_eq!(result.failed_phase, Some(LegPhase::Testing));
    assert_eq!(result.diagnostic, None);
    let report = result.coverage.expect("coverage report");
    assert_eq!(fs::read_to_string(report).unwrap().trim(), "<coverage fresh/>");
}

#[tokio::test]
async fn shared_workspace_keeps_one_report_per_leg() {
    let fake = FakePython::new(Behaviour::default());
    let interpreter = format!("sh '{}' {{version}}", fake.script().display());
    let config = fake.config(&interpreter, false);
    let (toolchain, _keeper) = fake.toolchain_with(&config);

    let (first, second) = tokio::join!(
        run_leg(leg("3.11"), &toolchain),
        run_leg(leg("3.12"), &toolchain)
    );

    let first = first.coverage.expect("first report");
    let second = second.coverage.expect("second report");
    assert_ne!(first, second);
    assert!(!first.starts_with(fake.project.path()));
    assert!(!second.starts_with(fake.project.path()));
    assert!(!fake.project.path().join("coverage.xml").exists());

    // Both legs ran their tests in the project itself.
    let project = fake.project.path().display().to_string();
    let envs: Vec<_> = fake
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("env "))
        .collect();
    assert_eq!(envs.len(), 2);
    assert!(envs.iter().all(|c| c.contains(&format!("PYTHONPATH={project} "))));
}

#[tokio::test]
async fn missing_interpreter_fails_provisioning() {
    let fake = FakePython::new(Behaviour::default());
    let config = fake.config("/nonexistent/bin/python{version}", true);
    let (toolchain, _keeper) = fake.toolchain_with(&config);

    let result = run_leg(leg("3.13"), &toolchain).await;

    assert_eq!(result.status, LegStatus::Failure);
    assert_eq!(result.failed_phase, Some(LegPhase::Provisioning));
    assert_eq!(result.diagnostic.as_deref(), Some("environment provisioning failed"));
    assert!(result.output.contains("/nonexistent/bin/python3.13"));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn missing_manifest_fails_install_after_tooling() {
    let fake = FakePython::new(Behaviour::default());
    fs::remove_file(fake.project.path().join("requirements.txt")).unwrap();
    let (toolchain, _keeper) = fake.toolchain();

    let result = run_leg(leg("3.12"), &toolchain).await;

    assert_eq!(result.failed_phase, Some(LegPhase::Installing));
    assert_eq!(result.diagnostic.as_deref(), Some("dependency installation failed"));
    assert!(result.coverage.is_none());

    let calls = fake.calls();
    assert_eq!(
        calls.last().map(String::as_str),
        Some("venv -m pip install pytest pytest-xdist pytest-cov")
    );
    assert!(!calls.iter().any(|c| c.contains("pytest -n")));
}

#[tokio::test]
async fn manifest_install_failure_skips_tests() {
    let fake = FakePython::new(Behaviour {
        manifest_exit: 1,
        ..Behaviour::default()
    });
    let (toolchain, _keeper) = fake.toolchain();

    let result = run_leg(leg("3.12"), &toolchain).await;

    assert_eq!(result.failed_phase, Some(LegPhase::Installing));
    assert_eq!(result.diagnostic.as_deref(), Some("dependency installation failed"));
    assert!(result.output.contains("installing manifest"));
    assert!(!fake.calls().iter().any(|c| c.contains("-m pytest")));
}

#[tokio::test]
async fn closed_keeper_fails_provisioning() {
    let fake = FakePython::new(Behaviour::default());
    let (toolchain, keeper) = fake.toolchain();
    drop(keeper);

    let result = run_leg(leg("3.12"), &toolchain).await;

    assert_eq!(result.failed_phase, Some(LegPhase::Provisioning));
    assert_eq!(result.diagnostic.as_deref(), Some("environment provisioning failed"));
    assert_eq!(fake.calls().len(), 2, "no step runs after provisioning");
}
