//! ascension - achievement name scraper for db.ascension.gg
//!
//! Walks a range of achievement IDs and writes an ID-sorted `ID,Name` CSV.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "ascension")]
#[command(about = "Scrape achievement names from db.ascension.gg")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./ascension.toml or ~/.config/ascension/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch an ID range into the CSV store
    Scrape(cmd::scrape::ScrapeArgs),
    /// Merge stores from separate runs into one sorted store
    Merge(cmd::merge::MergeArgs),
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(ascension_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, the progress bar shows activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    if let Err(e) = ascension_core::init_logging(quiet, cli.debug, multi) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::from(2);
    }

    match dispatch(cli, &progress) {
        Ok(code) => code,
        Err(e) => {
            log::error!("Fatal error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn dispatch(cli: Cli, progress: &ascension_core::SharedProgress) -> Result<ExitCode> {
    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Scrape(args) => {
            ascension_core::install_signal_handlers()?;
            cmd::scrape::run(args, &config, progress)
        }
        Command::Merge(args) => cmd::merge::run(args).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            print_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_config(config: &Config) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec!["Output", &config.output.path.display().to_string()]);
    table.add_row(vec!["Base URL", &config.source.base_url]);
    table.add_row(vec![
        "ID range",
        &format!("{}..={}", config.source.start_id, config.source.end_id),
    ]);
    table.add_row(vec![
        "Workers",
        &format!("{} (max: {})", config.workers.default, config.workers.max),
    ]);
    table.add_row(vec!["Request timeout", &format!("{}s", config.http.timeout)]);
    table.add_row(vec!["Request delay", &format!("{}ms", config.http.delay_ms)]);
    table.add_row(vec!["Max retries", &config.http.max_retries.to_string()]);
    table.add_row(vec![
        "Maintenance backoff",
        &format!("{}s", config.http.maintenance_backoff),
    ]);
    table.add_row(vec![
        "Flush interval",
        &format!("{}s", config.persist.flush_interval),
    ]);

    eprintln!("\n{table}");
}
