//! Periodic flush of buffered results into the store

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{Scope, ScopedJoinHandle};
use std::time::Duration;

use anyhow::Context;

use crate::record::ResultRecord;
use crate::sink::ResultSink;
use crate::store::CsvStore;

/// Moves results from the sink into the store on a timer.
///
/// Every flushed record is also kept in memory so the final rewrite can
/// include rows appended earlier in the run. If an append fails the rows
/// are still kept and reach disk with the final rewrite.
pub struct PersistenceStage<'a> {
    store: &'a CsvStore,
    sink: &'a ResultSink,
    flushed: BTreeMap<u32, String>,
    flushes: usize,
}

impl<'a> PersistenceStage<'a> {
    pub fn new(store: &'a CsvStore, sink: &'a ResultSink) -> Self {
        Self {
            store,
            sink,
            flushed: BTreeMap::new(),
            flushes: 0,
        }
    }

    /// Drain the sink and append what it held. Returns the number of rows drained.
    pub fn flush(&mut self) -> usize {
        let records = self.sink.drain_all();
        if records.is_empty() {
            return 0;
        }
        match self.store.append(&records) {
            Ok(()) => {
                self.flushes += 1;
                log::debug!(
                    "flush #{}: appended {} rows to {}",
                    self.flushes,
                    records.len(),
                    self.store.path().display()
                );
            }
            Err(e) => log::error!(
                "flush: append of {} rows failed, keeping them for final write: {e}",
                records.len()
            ),
        }
        let count = records.len();
        for record in records {
            self.flushed.insert(record.id, record.name);
        }
        count
    }

    /// Flush every `interval` until `stop` fires or its sender is dropped
    fn run(mut self, stop: Receiver<()>, interval: Duration) -> BTreeMap<u32, String> {
        loop {
            match stop.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    self.flush();
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::debug!("persistence stage stopped after {} flushes", self.flushes);
        self.flushed
    }

    /// Run on a dedicated thread within `scope`.
    pub fn spawn_scoped<'scope, 'env>(
        self,
        scope: &'scope Scope<'scope, 'env>,
        interval: Duration,
    ) -> anyhow::Result<PersistHandle<'scope>>
    where
        'a: 'scope,
    {
        let (stop, rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("persist".into())
            .spawn_scoped(scope, move || self.run(rx, interval))
            .context("Failed to spawn persistence stage")?;
        Ok(PersistHandle { stop, handle })
    }
}

/// Handle to a running [`PersistenceStage`]. Dropping it also stops the stage.
pub struct PersistHandle<'scope> {
    stop: Sender<()>,
    handle: ScopedJoinHandle<'scope, BTreeMap<u32, String>>,
}

impl PersistHandle<'_> {
    /// Stop the timer loop and return every record flushed so far.
    ///
    /// Buffered records not yet flushed stay in the sink.
    pub fn stop(self) -> anyhow::Result<Vec<ResultRecord>> {
        let _ = self.stop.send(());
        let flushed = self
            .handle
            .join()
            .map_err(|_| anyhow::anyhow!("persistence stage panicked"))?;
        Ok(flushed
            .into_iter()
            .map(|(id, name)| ResultRecord { id, name })
            .collect())
    }
}
