//! Main runner: seeds the queue, drives workers and persistence, writes the final store

use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ascension_core::{ProgressContext, RetryQueue, fmt_num, is_shutdown_requested};

use crate::config::Config;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::persist::PersistenceStage;
use crate::record::{ResultRecord, WorkItem};
use crate::sink::ResultSink;
use crate::store::CsvStore;
use crate::worker::{self, Stats, WorkerContext};

/// How often the orchestrator re-checks the shutdown flag while waiting
const SHUTDOWN_POLL: Duration = Duration::from_millis(500);

/// Pipeline execution summary
#[derive(Debug, Clone, Default)]
pub struct Summary {
    /// IDs handed to workers (range minus resumed IDs)
    pub total_ids: usize,
    /// IDs skipped because the store already had them
    pub skipped_ids: usize,
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
    pub maintenance_retries: usize,
    pub transient_retries: usize,
    /// Rows in the final store
    pub rows_written: usize,
    /// Stopped early by a shutdown request
    pub aborted: bool,
    pub elapsed: Duration,
}

impl Summary {
    /// IDs resolved one way or another
    pub fn resolved(&self) -> usize {
        self.found + self.not_found + self.failed
    }

    pub fn log(&self) {
        log::info!("=== Achievement Scrape Summary ===");
        log::info!(
            "IDs: {}/{} resolved ({} skipped)",
            fmt_num(self.resolved()),
            fmt_num(self.total_ids),
            fmt_num(self.skipped_ids)
        );
        log::info!(
            "Found: {}  Not found: {}  Failed: {}",
            fmt_num(self.found),
            fmt_num(self.not_found),
            fmt_num(self.failed)
        );
        log::info!(
            "Retries: {} maintenance, {} transient",
            fmt_num(self.maintenance_retries),
            fmt_num(self.transient_retries)
        );
        log::info!("Rows written: {}", fmt_num(self.rows_written));
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        if self.aborted {
            log::warn!("Run was interrupted; store holds partial results");
        }
    }
}

/// Run the achievement pipeline against the live source
pub fn run(config: &Config, progress: &ProgressContext) -> Result<Summary> {
    let fetcher = HttpFetcher::from_config(config);
    run_with_fetcher(config, &fetcher, progress)
}

/// Run the pipeline with any [`Fetcher`]
pub fn run_with_fetcher(
    config: &Config,
    fetcher: &dyn Fetcher,
    progress: &ProgressContext,
) -> Result<Summary> {
    config.validate()?;
    let start = Instant::now();

    let (store, previous) = open_store(config)?;
    let done: HashSet<u32> = previous.iter().map(|r| r.id).collect();
    let items: Vec<WorkItem> = (config.start_id..=config.end_id)
        .map(WorkItem::new)
        .collect();
    let queue = RetryQueue::filtered(items, |item| !done.contains(&item.id));
    let skipped_ids = config.id_count() - queue.total();

    log::info!(
        "achievement scrape starting: ids={}..={}, workers={}, output={}",
        config.start_id,
        config.end_id,
        config.workers,
        store.path().display()
    );
    if skipped_ids > 0 {
        log::info!("Resuming: {} IDs already in store", fmt_num(skipped_ids));
    }

    let sink = ResultSink::new();
    let stats = Stats::default();
    let pb = progress.count_bar("achievements", queue.total() as u64);
    let ctx = WorkerContext {
        queue: &queue,
        sink: &sink,
        fetcher,
        stats: &stats,
        retry: config.retry,
        maintenance_backoff: config.maintenance_backoff,
        pb: pb.clone(),
    };

    let flushed = std::thread::scope(|s| -> Result<Vec<ResultRecord>> {
        let persist = PersistenceStage::new(&store, &sink).spawn_scoped(s, config.flush_interval)?;

        let ctx = &ctx;
        let mut workers = Vec::with_capacity(config.workers);
        for i in 0..config.workers {
            let spawned = std::thread::Builder::new()
                .name(format!("worker-{i}"))
                .spawn_scoped(s, move || worker::run(ctx));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Release the workers already running
                    queue.abort();
                    return Err(e).context("Failed to spawn worker");
                }
            }
        }

        while !queue.wait_drained_timeout(SHUTDOWN_POLL) {
            if is_shutdown_requested() {
                let discarded = queue.abort();
                if discarded > 0 {
                    log::warn!("Shutdown requested, dropped {discarded} pending IDs");
                }
            } else if workers.iter().all(|w| w.is_finished()) {
                log::error!("All workers exited with work outstanding");
                queue.abort();
            }
        }
        queue.close();

        for handle in workers {
            if handle.join().is_err() {
                log::error!("Worker panicked");
            }
        }
        persist.stop()
    })?;

    // Final authoritative write: earlier rows, flushed rows, and what is still buffered
    let mut records = previous;
    records.extend(flushed);
    records.extend(sink.drain_all());
    let rows_written = store
        .rewrite(records)
        .with_context(|| format!("Failed to write {}", store.path().display()))?;
    pb.finish_and_clear();

    let summary = Summary {
        total_ids: queue.total(),
        skipped_ids,
        found: Stats::get(&stats.found),
        not_found: Stats::get(&stats.not_found),
        failed: Stats::get(&stats.failed),
        maintenance_retries: Stats::get(&stats.maintenance_retries),
        transient_retries: Stats::get(&stats.transient_retries),
        rows_written,
        aborted: is_shutdown_requested(),
        elapsed: start.elapsed(),
    };
    log::info!(
        "Achievements saved to {} ({} rows)",
        store.path().display(),
        fmt_num(rows_written)
    );
    Ok(summary)
}

/// Create the store, or reopen it and load its rows when resuming
fn open_store(config: &Config) -> Result<(CsvStore, Vec<ResultRecord>)> {
    if config.resume {
        let store = CsvStore::open_existing(&config.output)
            .with_context(|| format!("Cannot open store {}", config.output.display()))?;
        let previous = store
            .read_all()
            .with_context(|| format!("Cannot read store {}", config.output.display()))?;
        Ok((store, previous))
    } else {
        let store = CsvStore::create(&config.output)
            .with_context(|| format!("Cannot create store {}", config.output.display()))?;
        Ok((store, Vec::new()))
    }
}
