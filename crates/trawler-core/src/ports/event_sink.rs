//! EventSink port - イベント記録の抽象化
//!
//! # 実装
//! - TracingSink: tracing の debug / trace として流す（デフォルト）
//! - NoopSink: 何もしない
//!
//! 呼び出し側（Crawler）は emit を `catch_unwind` で囲むので、sink の
//! panic がディスパッチ処理に影響することはない。

use tracing::{debug, trace};

use crate::domain::{CrawlEvent, EventKind};

/// Receives every task lifecycle event. Must not block for long: it runs on
/// the submitting or executing thread.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &CrawlEvent);
}

impl<F> EventSink for F
where
    F: Fn(&CrawlEvent) + Send + Sync,
{
    fn emit(&self, event: &CrawlEvent) {
        self(event)
    }
}

/// Logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &CrawlEvent) {
        let task_id = event.task_id.map(|id| id.to_string()).unwrap_or_default();
        match &event.kind {
            EventKind::Finished { worker, follow_ups } => debug!(
                task_id,
                url = %event.target,
                worker,
                follow_ups,
                event = event.name()
            ),
            EventKind::Failed { worker, error } => debug!(
                task_id,
                url = %event.target,
                worker,
                error = %error,
                event = event.name()
            ),
            kind => trace!(task_id, url = %event.target, ?kind, event = event.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &CrawlEvent) {}
}
