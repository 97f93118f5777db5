//! Lifecycle events emitted to the observability hook.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Admitted and pushed onto the queue.
    Queued { priority: i64 },
    /// Rejected by the filter chain.
    FilteredOut,
    /// No handler matched the target.
    Unmatched,
    Started { worker: usize },
    Finished { worker: usize, follow_ups: usize },
    Failed { worker: usize, error: String },
    /// Pushed back by its own routine (retry).
    Rescheduled { worker: usize, priority: i64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlEvent {
    pub at: DateTime<Utc>,
    pub task_id: Option<TaskId>,
    pub target: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl CrawlEvent {
    pub fn new(
        at: DateTime<Utc>,
        task_id: Option<TaskId>,
        target: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            at,
            task_id,
            target: target.into(),
            kind,
        }
    }

    /// Short lowercase name of the event kind, as used in log lines.
    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::Queued { .. } => "queued",
            EventKind::FilteredOut => "filtered_out",
            EventKind::Unmatched => "unmatched",
            EventKind::Started { .. } => "started",
            EventKind::Finished { .. } => "finished",
            EventKind::Failed { .. } => "failed",
            EventKind::Rescheduled { .. } => "rescheduled",
        }
    }
}
