//! Scrape subcommand - walk an ID range and write the achievement store

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use ascension_achievements::Summary;
use ascension_core::{SharedProgress, fmt_num};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// First achievement ID (inclusive)
    #[arg(short, long)]
    pub start: Option<u32>,

    /// Last achievement ID (inclusive)
    #[arg(short, long)]
    pub end: Option<u32>,

    /// Number of concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Output CSV file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep rows of an existing output file and skip their IDs
    #[arg(long)]
    pub resume: bool,

    /// Seconds between incremental flushes
    #[arg(long)]
    pub flush_interval: Option<u64>,

    /// Retries for network failures
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Source endpoint
    #[arg(long)]
    pub base_url: Option<String>,
}

impl ScrapeArgs {
    /// Apply command-line overrides on top of file configuration
    fn pipeline_config(self, config: &Config) -> ascension_achievements::Config {
        let mut pipeline = config.pipeline();
        if let Some(start) = self.start {
            pipeline.start_id = start;
        }
        if let Some(end) = self.end {
            pipeline.end_id = end;
        }
        if let Some(workers) = self.workers {
            if workers > config.workers.max {
                log::warn!(
                    "{workers} workers requested, capping at {}",
                    config.workers.max
                );
            }
            pipeline.workers = workers.min(config.workers.max);
        }
        if let Some(output) = self.output {
            pipeline.output = output;
        }
        if let Some(secs) = self.flush_interval {
            pipeline.flush_interval = Duration::from_secs(secs);
        }
        if let Some(max_retries) = self.max_retries {
            pipeline.retry.max_retries = max_retries;
        }
        if let Some(base_url) = self.base_url {
            pipeline.base_url = base_url;
        }
        pipeline.resume = self.resume;
        pipeline
    }
}

pub fn run(args: ScrapeArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let pipeline = args.pipeline_config(config);

    log::info!("Scraping achievements {}..={}", pipeline.start_id, pipeline.end_id);
    log::info!("  Output: {}", pipeline.output.display());

    let summary = ascension_achievements::run(&pipeline, progress)?;

    if progress.is_tty() {
        print_summary(&summary);
    } else {
        summary.log();
    }

    if summary.aborted {
        log::warn!("Shutdown requested, partial results written");
        return Ok(ExitCode::from(130));
    }
    Ok(ExitCode::SUCCESS)
}

/// Print the run summary as a table on stderr
fn print_summary(summary: &Summary) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Achievements").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let rows = [
        (
            "IDs",
            format!(
                "{}/{} resolved ({} skipped)",
                fmt_num(summary.resolved()),
                fmt_num(summary.total_ids),
                fmt_num(summary.skipped_ids)
            ),
        ),
        ("Found", fmt_num(summary.found)),
        ("Not found", fmt_num(summary.not_found)),
        ("Failed", fmt_num(summary.failed)),
        (
            "Retries",
            format!(
                "{} maintenance, {} transient",
                fmt_num(summary.maintenance_retries),
                fmt_num(summary.transient_retries)
            ),
        ),
        ("Rows written", fmt_num(summary.rows_written)),
        ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}
