//! In-memory buffer between workers and the persistence stage

use std::sync::{Mutex, PoisonError};

use crate::record::ResultRecord;

/// Thread-safe append buffer of found achievements.
///
/// Workers [`submit`](ResultSink::submit); the persistence stage takes
/// everything with [`drain_all`](ResultSink::drain_all). Drain order is
/// unspecified.
#[derive(Debug, Default)]
pub struct ResultSink {
    buffer: Mutex<Vec<ResultRecord>>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&self, record: ResultRecord) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Atomically remove and return everything buffered
    pub fn drain_all(&self) -> Vec<ResultRecord> {
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
