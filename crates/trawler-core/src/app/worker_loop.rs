//! Worker loop - pop → execute → resubmit
//!
//! # 状態遷移
//! `Idle → pop → Executing → {Continue | Stop}`
//! - Stop / Abort を pop したら終了（Abort はプール全体のキャンセルも起動する）
//! - pop 直後にキャンセルフラグを確認し、立っていれば実行せずに終了
//! - routine の失敗・panic はタスク単位で握りつぶし、ワーカーは続行する

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::crawler::Crawler;
use crate::domain::task::Binding;
use crate::domain::{EventKind, Outcome, Signal, Task, TaskError};
use crate::ports::Client;
use crate::routing::Context;

/// Body of one worker thread. A panic escaping the loop cancels the crawl
/// before it propagates to the joining thread. Either way the exit is
/// counted, so the last worker out releases `run`.
pub(super) fn run_guarded<C: Client>(crawler: &Crawler<C>, worker: usize) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| run(crawler, worker)));
    if result.is_err() {
        error!(worker, "worker panicked, cancelling crawl");
        crawler.shutdown.trigger();
    }
    crawler.shutdown.worker_exited();
    if let Err(payload) = result {
        panic::resume_unwind(payload);
    }
}

fn run<C: Client>(crawler: &Crawler<C>, worker: usize) {
    debug!(worker, "worker started");
    loop {
        let task = crawler.queue.pop();
        match task.signal() {
            Some(Signal::Abort) => {
                debug!(worker, "abort received");
                crawler.shutdown.trigger();
                break;
            }
            Some(Signal::Stop) => {
                debug!(worker, "stop received");
                break;
            }
            None => {}
        }
        if crawler.shutdown.is_cancelled() {
            // not marked done: it stays counted as pending in the report
            debug!(worker, url = task.target().unwrap_or_default(), "cancelled, task dropped");
            break;
        }

        execute(crawler, worker, task);
        crawler.queue.task_done();
    }
    debug!(worker, "worker exiting");
}

/// Run one work task and feed its outcome back into the crawler.
///
/// Follow-ups and reschedules are pushed before the caller marks the task
/// done, so the outstanding count never reaches zero while work is still
/// being produced.
fn execute<C: Client>(crawler: &Crawler<C>, worker: usize, task: Task<C>) {
    let Some(work) = task.work() else {
        return;
    };
    let task_id = task.id();
    crawler.emit(task_id, &work.target, EventKind::Started { worker });

    let (routine, captures) = match &work.binding {
        Binding::Matched { handler, captures } => (Some(handler.routine()), Some(captures)),
        Binding::Direct(routine) => (Some(Arc::clone(routine)), None),
        Binding::Unresolved => (None, None),
    };

    let result = match routine {
        Some(routine) => {
            let ctx = Context {
                task_id,
                target: &work.target,
                payload: &work.payload,
                captures,
                client: &crawler.client,
                priority: task.priority(),
            };
            panic::catch_unwind(AssertUnwindSafe(|| {
                crawler.client.execute(routine.as_ref(), &ctx)
            }))
            .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))))
        }
        None => Err(TaskError::Unbound),
    };

    match result {
        Ok(Outcome::Completed(follow_ups)) => {
            let count = follow_ups.len();
            for follow in follow_ups {
                if let Err(err) = crawler.submit(follow) {
                    warn!(worker, url = %work.target, error = %err, "follow-up rejected");
                }
            }
            crawler.emit(
                task_id,
                &work.target,
                EventKind::Finished {
                    worker,
                    follow_ups: count,
                },
            );
        }
        Ok(Outcome::Reschedule { payload, priority }) => {
            // already admitted once: straight back onto the queue
            if let Some(next) = task.rescheduled(payload, priority) {
                crawler.queue.push(next);
            }
            crawler.emit(
                task_id,
                &work.target,
                EventKind::Rescheduled { worker, priority },
            );
        }
        Err(err) => {
            error!(
                worker,
                task_id = task_id.map(|id| id.to_string()).unwrap_or_default(),
                url = %work.target,
                priority = task.priority(),
                error = %err,
                "task failed"
            );
            crawler.emit(
                task_id,
                &work.target,
                EventKind::Failed {
                    worker,
                    error: err.to_string(),
                },
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
