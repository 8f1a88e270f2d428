//! # Command-Line Interface / 命令行接口
//!
//! Builds the `clap` command tree and dispatches to `cli::commands`.
//! The language is resolved before the tree is built so that help texts are
//! localized too.
//!
//! 构建 `clap` 命令树并分派到 `cli::commands`。
//! 语言在构建命令树之前确定，以便帮助文本也能本地化。

pub mod commands;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf};
use tracing::Level;

use crate::{
    cli::commands::run::RunOptions,
    infra::{t, telemetry},
    resolve_locale,
};

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// Returns the explicit `--lang` value, if any.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter()
        .position(|arg| arg == "--lang")
        .and_then(|pos| args.get(pos + 1))
        .cloned()
}

fn config_arg(locale: &str) -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .help(t!("cli.arg_config", locale = locale).to_string())
        .value_name("CONFIG")
        .default_value("Pipeline.toml")
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

fn text_arg(id: &'static str, value_name: &'static str, help: String) -> Arg {
    Arg::new(id)
        .long(id)
        .help(help)
        .value_name(value_name)
        .action(ArgAction::Set)
}

pub fn build_cli(locale: &str) -> Command {
    Command::new("matrix-pipeline")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli.about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli.arg_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .help(t!("cli.arg_log_json", locale = locale).to_string())
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help(t!("cli.arg_verbose", locale = locale).to_string())
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cli.cmd_run_about", locale = locale).to_string())
                .arg(config_arg(locale))
                .arg(
                    Arg::new("project-dir")
                        .long("project-dir")
                        .help(t!("cli.arg_project_dir", locale = locale).to_string())
                        .value_name("PROJECT_DIR")
                        .default_value(".")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help(t!("cli.arg_jobs", locale = locale).to_string())
                        .value_name("JOBS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("total-runners")
                        .long("total-runners")
                        .help(t!("cli.arg_total_runners", locale = locale).to_string())
                        .value_name("TOTAL_RUNNERS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("runner-index"),
                )
                .arg(
                    Arg::new("runner-index")
                        .long("runner-index")
                        .help(t!("cli.arg_runner_index", locale = locale).to_string())
                        .value_name("RUNNER_INDEX")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("total-runners"),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("cli.arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(text_arg("event", "EVENT", t!("cli.arg_event", locale = locale).to_string()))
                .arg(text_arg("branch", "BRANCH", t!("cli.arg_branch", locale = locale).to_string()))
                .arg(text_arg("sha", "SHA", t!("cli.arg_sha", locale = locale).to_string()))
                .arg(text_arg("repo", "OWNER/NAME", t!("cli.arg_repo", locale = locale).to_string()))
                .arg(text_arg(
                    "target-url",
                    "URL",
                    t!("cli.arg_target_url", locale = locale).to_string(),
                ))
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help(t!("cli.arg_force_run", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help(t!("cli.arg_dry_run", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("aggregate")
                        .long("aggregate")
                        .help(t!("cli.arg_aggregate", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cli.cmd_init_about", locale = locale).to_string())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help(t!("cli.arg_output", locale = locale).to_string())
                        .value_name("OUTPUT")
                        .default_value("Pipeline.toml")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("cli.arg_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help(t!("cli.arg_force_init", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about(t!("cli.cmd_validate_about", locale = locale).to_string())
                .arg(config_arg(locale)),
        )
}

fn path_arg(matches: &ArgMatches, id: &str) -> PathBuf {
    matches.get_one::<PathBuf>(id).cloned().unwrap_or_default()
}

fn string_arg(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

fn run_options(matches: &ArgMatches, lang: Option<String>) -> RunOptions {
    RunOptions {
        config: path_arg(matches, "config"),
        project_dir: path_arg(matches, "project-dir"),
        jobs: matches.get_one::<usize>("jobs").copied(),
        total_runners: matches.get_one::<usize>("total-runners").copied(),
        runner_index: matches.get_one::<usize>("runner-index").copied(),
        html: matches.get_one::<PathBuf>("html").cloned(),
        event: string_arg(matches, "event"),
        branch: string_arg(matches, "branch"),
        sha: string_arg(matches, "sha"),
        repo: string_arg(matches, "repo"),
        target_url: string_arg(matches, "target-url"),
        force: matches.get_flag("force"),
        dry_run: matches.get_flag("dry-run"),
        aggregate: matches.get_flag("aggregate"),
        lang,
    }
}

/// Parses the command line and runs the selected command.
pub async fn run() -> Result<()> {
    // Pre-parse language and initialize i18n first.
    let explicit_lang = pre_parse_language();
    let detected = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    let language = resolve_locale(explicit_lang.as_deref().unwrap_or(&detected));
    rust_i18n::set_locale(&language);

    let matches = build_cli(&language).get_matches();

    let level = if matches.get_flag("verbose") {
        Level::DEBUG
    } else {
        Level::WARN
    };
    telemetry::init_tracing(matches.get_flag("log-json"), level);

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            commands::run::execute(run_options(run_matches, explicit_lang)).await?;
        }
        Some(("init", init_matches)) => {
            commands::init::execute(
                &path_arg(init_matches, "output"),
                init_matches.get_flag("non-interactive"),
                init_matches.get_flag("force"),
                &language,
            )?;
        }
        Some(("validate", validate_matches)) => {
            commands::validate::execute(&path_arg(validate_matches, "config"), &language)?;
        }
        _ => {
            // Clap has already printed the help text.
        }
    }
    Ok(())
}
