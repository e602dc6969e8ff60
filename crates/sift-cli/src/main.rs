mod commands;
mod error;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

use crate::commands::{completions, tasks, Context};
use crate::error::{exit_code_for, report_error};
use sift_config as config;
use sift_config::{AppConfig, ConfigError};
use sift_store::{paths, Store};

#[derive(Debug, Parser)]
#[command(name = "sift", version, about = "sift task list")]
struct Cli {
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    json: bool,
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add a task: description words, name:value attributes and +tags
    Add(tasks::AddArgs),
    /// List tasks matching a filter
    List(tasks::FilterArgs),
    /// Count tasks matching a filter
    Count(tasks::FilterArgs),
    /// Mark matching tasks completed
    Done(tasks::FilterArgs),
    /// Mark matching tasks deleted
    Delete(tasks::FilterArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    let app_config = match cli.command {
        Command::Completions(_) => Ok(AppConfig::default()),
        _ => config::load(cli.config.clone()),
    };
    let config_debug = app_config.as_ref().is_ok_and(|config| config.debug);
    init_logging(verbose || config_debug);
    match run(cli, app_config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err, verbose);
            exit_code_for(&err)
        }
    }
}

fn run(cli: Cli, app_config: std::result::Result<AppConfig, ConfigError>) -> Result<()> {
    let Cli {
        db_path,
        config: config_path,
        json,
        verbose,
        command,
    } = cli;

    match command {
        Command::Completions(args) => completions::emit(args),
        command => {
            let app_config = app_config.with_context(|| "load config")?;
            if verbose {
                match config::resolve_config_path(config_path.clone()) {
                    Ok(path) => {
                        if path.exists() {
                            debug!(path = %path.display(), "config resolved");
                        } else {
                            debug!(path = %path.display(), "config missing, using defaults");
                        }
                    }
                    Err(err) => {
                        debug!(error = %err, "config unavailable");
                    }
                }
            }
            let db_path =
                paths::resolve_db_path(db_path).with_context(|| "resolve database path")?;

            if verbose {
                debug!(path = %db_path.display(), "database path resolved");
            }

            let store = Store::open(&db_path)
                .with_context(|| format!("open database {}", db_path.display()))?;
            store.migrate().with_context(|| "run migrations")?;

            let ctx = Context {
                store: &store,
                json,
                config: &app_config,
            };

            match command {
                Command::Add(args) => tasks::add_task(&ctx, args),
                Command::List(args) => tasks::list_tasks(&ctx, args),
                Command::Count(args) => tasks::count_tasks(&ctx, args),
                Command::Done(args) => tasks::complete_tasks(&ctx, args),
                Command::Delete(args) => tasks::delete_tasks(&ctx, args),
                Command::Completions(_) => {
                    unreachable!("completions command handled before store initialization")
                }
            }
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}
