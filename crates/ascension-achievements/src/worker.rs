//! Worker loop: pop an ID, fetch it, route the outcome

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ascension_core::{RetryPolicy, RetryQueue, is_shutdown_requested};
use indicatif::ProgressBar;

use crate::fetcher::{FetchOutcome, Fetcher};
use crate::record::{ResultRecord, WorkItem};
use crate::sink::ResultSink;

/// Outcome counters shared by all workers
#[derive(Debug, Default)]
pub struct Stats {
    pub found: AtomicUsize,
    pub not_found: AtomicUsize,
    pub failed: AtomicUsize,
    pub maintenance_retries: AtomicUsize,
    pub transient_retries: AtomicUsize,
}

impl Stats {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

/// Everything a worker borrows from the pipeline
pub struct WorkerContext<'a> {
    pub queue: &'a RetryQueue<WorkItem>,
    pub sink: &'a ResultSink,
    pub fetcher: &'a dyn Fetcher,
    pub stats: &'a Stats,
    pub retry: RetryPolicy,
    pub maintenance_backoff: Duration,
    pub pb: ProgressBar,
}

/// Process items until the queue is closed and empty.
pub fn run(ctx: &WorkerContext<'_>) {
    while let Some(claim) = ctx.queue.pop() {
        if is_shutdown_requested() {
            let discarded = ctx.queue.abort();
            log::debug!("shutdown requested, discarded {discarded} pending IDs");
            break;
        }

        let item = *claim.item();
        let id = item.id;
        match ctx.fetcher.fetch(id) {
            FetchOutcome::Found(name) => {
                log::info!("Found achievement: ID = {id}, Name = {name}");
                ctx.sink.submit(ResultRecord::new(id, name));
                Stats::bump(&ctx.stats.found);
                ctx.pb.inc(1);
                // Submit happens-before retire
                claim.retire();
            }
            FetchOutcome::NotFound => {
                log::info!("No achievement found for ID = {id}");
                Stats::bump(&ctx.stats.not_found);
                ctx.pb.inc(1);
                claim.retire();
            }
            FetchOutcome::Maintenance => {
                log::warn!(
                    "#{id}: source under maintenance, retrying in {}s",
                    ctx.maintenance_backoff.as_secs()
                );
                Stats::bump(&ctx.stats.maintenance_retries);
                claim.requeue_after(item, ctx.maintenance_backoff);
            }
            FetchOutcome::TransientError(detail) => {
                let next = item.next_attempt();
                match ctx.retry.next_delay(next.attempt) {
                    Some(delay) => {
                        log::warn!(
                            "#{id}: {detail}, retry {}/{} in {}s",
                            next.attempt,
                            ctx.retry.max_retries,
                            delay.as_secs()
                        );
                        Stats::bump(&ctx.stats.transient_retries);
                        claim.requeue_after(next, delay);
                    }
                    None => {
                        log::error!("#{id}: failed permanently: {detail}");
                        Stats::bump(&ctx.stats.failed);
                        ctx.pb.inc(1);
                        claim.retire();
                    }
                }
            }
            FetchOutcome::FatalError(detail) => {
                log::error!("Failed to get achievement #{id}: {detail}");
                Stats::bump(&ctx.stats.failed);
                ctx.pb.inc(1);
                claim.retire();
            }
        }
    }
}
