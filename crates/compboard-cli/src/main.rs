//! compboard - school competition results in the terminal.
//!
//! Loads competition catalogues and results from the configured endpoints
//! (or a static mirror), caches them locally for an hour, and prints lists,
//! result tables and statistics.

mod render;

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use compboard_core::{
    ApiClient, CacheStore, Category, CompetitionManager, Config, InitSource, LoadState,
    LocalStorage, PreloadOutcome,
};

const USAGE: &str = "\
Usage: compboard [--json] [--log-file PATH] <command>

Commands:
  list [--category science|gem]            List competitions
  show <id>                                Show a competition's results
  stats                                    Show aggregate statistics
  search <query> [--category science|gem]  Search by name, level or status
  refresh                                  Refetch everything from the network
  reset                                    Clear the local cache and reload
  config [save]                            Print (or save) the effective configuration
  help                                     Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List { category: Option<Category> },
    Show { id: String },
    Stats,
    Search { query: String, category: Option<Category> },
    Refresh,
    Reset,
    Config { save: bool },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Options {
    json: bool,
    log_file: Option<PathBuf>,
    command: Command,
}

fn parse_category(value: Option<&String>) -> Result<Category> {
    let value = value.ok_or_else(|| anyhow!("--category needs a value"))?;
    Ok(value.parse::<Category>()?)
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut json = false;
    let mut log_file = None;
    let mut category = None;
    let mut positional: Vec<&str> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--log-file" => {
                let path = iter.next().ok_or_else(|| anyhow!("--log-file needs a path"))?;
                log_file = Some(PathBuf::from(path));
            }
            "--category" | "-c" => category = Some(parse_category(iter.next())?),
            "--help" | "-h" => positional.insert(0, "help"),
            other if other.starts_with('-') => bail!("unknown option: {}", other),
            other => positional.push(other),
        }
    }

    let command = match positional.as_slice() {
        [] | ["help", ..] => Command::Help,
        ["list"] => Command::List { category },
        ["show", id] => Command::Show { id: id.to_string() },
        ["show"] => bail!("show needs a competition id"),
        ["stats"] => Command::Stats,
        ["search", words @ ..] => Command::Search {
            query: words.join(" "),
            category,
        },
        ["refresh"] => Command::Refresh,
        ["reset"] => Command::Reset,
        ["config"] => Command::Config { save: false },
        ["config", "save"] => Command::Config { save: true },
        other => bail!("unknown command: {}", other.join(" ")),
    };

    Ok(Options {
        json,
        log_file,
        command,
    })
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr unless a log file is given. The returned guard flushes
/// the file writer and must live until exit.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path.file_name().unwrap_or_else(|| OsStr::new("compboard.log"));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

fn build_manager(config: &Config) -> Result<CompetitionManager<ApiClient>> {
    let client = ApiClient::new(config).context("Failed to create API client")?;

    let store = match config.cache_dir().and_then(LocalStorage::new) {
        Ok(storage) => CacheStore::new(storage, config.cache_ttl(), Config::app_version()),
        Err(e) => {
            warn!(error = %e, "Local cache unavailable, keeping data in memory only");
            CacheStore::in_memory(config.cache_ttl(), Config::app_version())
        }
    };

    Ok(CompetitionManager::new(
        client,
        Arc::new(RwLock::new(store)),
        config.preload_stagger(),
    ))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print warnings for partially loaded data. Returns false when nothing loaded.
fn report_load_state(manager: &CompetitionManager<ApiClient>) -> bool {
    match manager.load_state() {
        LoadState::Failed => {
            for line in render::load_errors(&manager.errors()) {
                eprintln!("Error: {}", line);
            }
            false
        }
        LoadState::Partial(_) => {
            for line in render::load_errors(&manager.errors()) {
                eprintln!("Warning: {}", line);
            }
            true
        }
        LoadState::Complete | LoadState::NotLoaded => true,
    }
}

/// Which preload, if any, `initialize` ran.
fn preload_of(source: InitSource) -> Option<PreloadOutcome> {
    match source {
        InitSource::Preloaded(outcome) => Some(outcome),
        cached => {
            info!(source = ?cached, "Using cached data");
            None
        }
    }
}

async fn run(manager: &CompetitionManager<ApiClient>, options: &Options) -> Result<ExitCode> {
    let outcome = match &options.command {
        Command::Refresh => Some(manager.refresh().await),
        Command::Reset => {
            manager.reset_cache();
            preload_of(manager.initialize().await)
        }
        _ => preload_of(manager.initialize().await),
    };

    let explicit_reload = matches!(options.command, Command::Refresh | Command::Reset);
    match outcome {
        Some(PreloadOutcome::Completed(summary)) if explicit_reload && !options.json => {
            print!("{}", render::preload_summary(&summary));
        }
        Some(PreloadOutcome::AlreadyInProgress) => {
            eprintln!("Warning: a reload is already in progress");
        }
        _ => {}
    }

    if !report_load_state(manager) {
        return Ok(ExitCode::FAILURE);
    }

    match &options.command {
        Command::List { category } => {
            let competitions = match category {
                Some(c) => manager.competitions_by_category(*c),
                None => manager.all_competitions(),
            };
            if options.json {
                print_json(&competitions)?;
            } else {
                print!("{}", render::competition_list(&competitions));
                println!("Last updated {}", manager.cache_age());
            }
        }
        Command::Show { id } => {
            let competition = manager.competition(id)?;
            let sections = manager.results_table(id).await?;
            if options.json {
                print_json(&serde_json::json!({
                    "competition": competition,
                    "sections": sections,
                }))?;
            } else {
                print!("{}", render::competition_detail(&competition, &sections));
            }
        }
        Command::Stats => {
            let stats = manager.statistics();
            if options.json {
                print_json(&stats)?;
            } else {
                print!("{}", render::statistics(&stats));
            }
        }
        Command::Search { query, category } => {
            let hits = manager.search(query, *category);
            if options.json {
                print_json(&hits)?;
            } else {
                print!("{}", render::competition_list(&hits));
            }
        }
        Command::Refresh | Command::Reset => {
            if options.json {
                print_json(&manager.statistics())?;
            }
        }
        Command::Config { .. } | Command::Help => {}
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            return Ok(ExitCode::from(2));
        }
    };

    let _log_guard = init_tracing(options.log_file.as_deref());
    info!("compboard starting");

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    });

    match &options.command {
        Command::Help => {
            println!("{}", USAGE);
            return Ok(ExitCode::SUCCESS);
        }
        Command::Config { save } => {
            if *save {
                config.save().context("Failed to save configuration")?;
                eprintln!("Configuration saved");
            }
            print_json(&config)?;
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let manager = build_manager(&config)?;
    let code = run(&manager, &options).await?;

    info!("compboard shutting down");
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_defaults_to_help() {
        assert_eq!(parse_args(&[]).unwrap().command, Command::Help);
        assert_eq!(parse_args(&args("list --help")).unwrap().command, Command::Help);
    }

    #[test]
    fn test_parse_flags_anywhere() {
        let options = parse_args(&args("--json list --category academic --log-file /tmp/c.log")).unwrap();
        assert!(options.json);
        assert_eq!(options.log_file, Some(PathBuf::from("/tmp/c.log")));
        assert_eq!(
            options.command,
            Command::List {
                category: Some(Category::Gem)
            }
        );
    }

    #[test]
    fn test_parse_search_joins_words() {
        let options = parse_args(&args("search science fair -c science")).unwrap();
        assert_eq!(
            options.command,
            Command::Search {
                query: "science fair".to_string(),
                category: Some(Category::Science),
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_args(&args("show")).is_err());
        assert!(parse_args(&args("list --category art")).is_err());
        assert!(parse_args(&args("list --verbose")).is_err());
        assert!(parse_args(&args("frobnicate")).is_err());
        assert_eq!(
            parse_args(&args("config save")).unwrap().command,
            Command::Config { save: true }
        );
    }
}
