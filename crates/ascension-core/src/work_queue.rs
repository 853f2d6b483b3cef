//! Blocking work queue with explicit retirement and delayed re-delivery

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Item scheduled for re-delivery at `due`.
struct Delayed<S> {
    due: Instant,
    seq: u64,
    item: S,
}

impl<S> PartialEq for Delayed<S> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<S> Eq for Delayed<S> {}

impl<S> PartialOrd for Delayed<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so that `BinaryHeap` pops the earliest deadline first
impl<S> Ord for Delayed<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct State<S> {
    ready: VecDeque<S>,
    delayed: BinaryHeap<Delayed<S>>,
    /// Pushed but not yet retired (ready + delayed + claimed)
    outstanding: usize,
    closed: bool,
    aborted: bool,
    seq: u64,
}

impl<S> State<S> {
    /// Move every delayed item whose deadline has passed to the ready list
    fn promote_due(&mut self, now: Instant) {
        while self.delayed.peek().is_some_and(|d| d.due <= now) {
            if let Some(d) = self.delayed.pop() {
                self.ready.push_back(d.item);
            }
        }
    }

    fn next_due(&self) -> Option<Instant> {
        self.delayed.peek().map(|d| d.due)
    }
}

/// Work queue distributing items to a fixed set of blocking workers.
///
/// Every pushed item must be retired exactly once, either through
/// [`Claim::retire`], [`Claim::requeue_after`] (which re-pushes before
/// retiring) or by dropping the claim. [`wait_drained`](RetryQueue::wait_drained)
/// returns once the outstanding count reaches zero, independently of
/// [`close`](RetryQueue::close).
pub struct RetryQueue<S> {
    state: Mutex<State<S>>,
    available: Condvar,
    drained: Condvar,
    total: usize,
}

impl<S> RetryQueue<S> {
    /// Create queue from all items (no filtering)
    pub fn new(items: Vec<S>) -> Self {
        let total = items.len();
        Self {
            state: Mutex::new(State {
                outstanding: total,
                ready: items.into(),
                delayed: BinaryHeap::new(),
                closed: false,
                aborted: false,
                seq: 0,
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
            total,
        }
    }

    /// Create queue, keeping only items that pass the filter (resume support)
    pub fn filtered(items: Vec<S>, keep: impl Fn(&S) -> bool) -> Self {
        let filtered: Vec<S> = items.into_iter().filter(|s| keep(s)).collect();
        log::debug!("{} items in work queue", filtered.len());
        Self::new(filtered)
    }

    fn lock(&self) -> MutexGuard<'_, State<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a new item
    pub fn push(&self, item: S) {
        self.schedule(item, Duration::ZERO);
    }

    fn schedule(&self, item: S, delay: Duration) {
        let mut state = self.lock();
        if state.aborted {
            log::debug!("work queue aborted, dropping re-pushed item");
            return;
        }
        state.outstanding += 1;
        if delay.is_zero() {
            state.ready.push_back(item);
            self.available.notify_one();
        } else {
            state.seq += 1;
            let seq = state.seq;
            state.delayed.push(Delayed {
                due: Instant::now() + delay,
                seq,
                item,
            });
            // Waiters without a deadline must recompute their timeout
            self.available.notify_all();
        }
    }

    fn retire_one(&self) {
        let mut state = self.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        if state.outstanding == 0 {
            self.drained.notify_all();
        }
    }

    /// Block until an item is ready.
    ///
    /// Returns `None` once the queue is closed and holds no ready or
    /// delayed items.
    pub fn pop(&self) -> Option<Claim<'_, S>> {
        let mut state = self.lock();
        loop {
            state.promote_due(Instant::now());
            if let Some(item) = state.ready.pop_front() {
                return Some(Claim {
                    queue: self,
                    item,
                    retired: false,
                });
            }
            if state.closed && state.delayed.is_empty() {
                return None;
            }
            state = match state.next_due() {
                Some(due) => {
                    let timeout = due.saturating_duration_since(Instant::now());
                    self.available
                        .wait_timeout(state, timeout)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| e.into_inner().0)
                }
                None => self
                    .available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Block until every pushed item (including re-pushes) has been retired
    pub fn wait_drained(&self) {
        let mut state = self.lock();
        while state.outstanding > 0 {
            state = self
                .drained
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// [`wait_drained`](RetryQueue::wait_drained) bounded by `timeout`; returns whether drained
    pub fn wait_drained_timeout(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .drained
            .wait_timeout_while(state, timeout, |s| s.outstanding > 0)
            .unwrap_or_else(PoisonError::into_inner);
        state.outstanding == 0
    }

    /// Stop handing out work once the queue is empty
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Discard all pending items, retire them and close.
    ///
    /// Items already claimed stay outstanding until their workers retire
    /// them; re-pushes after this point are dropped. Returns the number of
    /// discarded items.
    pub fn abort(&self) -> usize {
        let mut state = self.lock();
        let discarded = state.ready.len() + state.delayed.len();
        state.ready.clear();
        state.delayed.clear();
        state.outstanding = state.outstanding.saturating_sub(discarded);
        state.closed = true;
        state.aborted = true;
        if state.outstanding == 0 {
            self.drained.notify_all();
        }
        self.available.notify_all();
        discarded
    }

    /// Items pushed but not yet retired
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Items the queue was seeded with
    pub fn total(&self) -> usize {
        self.total
    }
}

/// Exclusive handle on a popped item.
///
/// Dropping the claim retires the item.
pub struct Claim<'a, S> {
    queue: &'a RetryQueue<S>,
    item: S,
    retired: bool,
}

impl<S> Claim<'_, S> {
    pub fn item(&self) -> &S {
        &self.item
    }

    /// Mark the item as fully resolved
    pub fn retire(mut self) {
        self.release();
    }

    /// Re-push `item` for delivery no earlier than `delay` from now, then retire this claim
    pub fn requeue_after(mut self, item: S, delay: Duration) {
        self.queue.schedule(item, delay);
        self.release();
    }

    fn release(&mut self) {
        if !self.retired {
            self.retired = true;
            self.queue.retire_one();
        }
    }
}

impl<S> Drop for Claim<'_, S> {
    fn drop(&mut self) {
        self.release();
    }
}
