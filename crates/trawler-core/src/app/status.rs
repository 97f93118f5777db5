//! Status - 実行中・実行後の集計

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::EventKind;

/// Snapshot of the counters of a crawler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub queued: usize,
    pub filtered_out: usize,
    pub unmatched: usize,
    pub started: usize,
    pub finished: usize,
    pub failed: usize,
    pub rescheduled: usize,
    /// Admitted work not completed when the snapshot was taken: tasks still
    /// queued, tasks executing, and after a cancellation tasks that were
    /// popped but dropped unexecuted.
    pub pending: usize,
}

/// Lock-free counters, one per event kind.
#[derive(Debug, Default)]
pub(crate) struct Stats {
    queued: AtomicUsize,
    filtered_out: AtomicUsize,
    unmatched: AtomicUsize,
    started: AtomicUsize,
    finished: AtomicUsize,
    failed: AtomicUsize,
    rescheduled: AtomicUsize,
}

impl Stats {
    pub(crate) fn record(&self, kind: &EventKind) {
        let counter = match kind {
            EventKind::Queued { .. } => &self.queued,
            EventKind::FilteredOut => &self.filtered_out,
            EventKind::Unmatched => &self.unmatched,
            EventKind::Started { .. } => &self.started,
            EventKind::Finished { .. } => &self.finished,
            EventKind::Failed { .. } => &self.failed,
            EventKind::Rescheduled { .. } => &self.rescheduled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, pending: usize) -> RunReport {
        RunReport {
            queued: self.queued.load(Ordering::Relaxed),
            filtered_out: self.filtered_out.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            finished: self.finished.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rescheduled: self.rescheduled.load(Ordering::Relaxed),
            pending,
        }
    }
}
