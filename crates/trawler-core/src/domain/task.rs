use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::TaskId;
use crate::routing::{Captures, Handler, Routine};

/// Opaque task data. Only routines interpret it.
pub type Payload = Map<String, Value>;

/// Priority given to bare targets returned by routines.
pub const DEFAULT_PRIORITY: i64 = 0;

/// Stop sentinels drain after every real task queued before them.
pub const STOP_PRIORITY: i64 = i64::MIN;

/// Abort sentinels are dequeued ahead of any backlog.
pub const ABORT_PRIORITY: i64 = i64::MAX;

/// Clamp `priority` into the range open to work tasks, strictly between the
/// two sentinels.
pub fn work_priority(priority: i64) -> i64 {
    priority.clamp(STOP_PRIORITY + 1, ABORT_PRIORITY - 1)
}

/// Pool control signal carried by a sentinel task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Graceful: the worker exits once the queue ahead of it is drained.
    Stop,
    /// Immediate: preempts queued work and cancels the pool.
    Abort,
}

impl Signal {
    pub fn priority(self) -> i64 {
        match self {
            Signal::Stop => STOP_PRIORITY,
            Signal::Abort => ABORT_PRIORITY,
        }
    }
}

/// How a work task reaches its routine.
pub(crate) enum Binding<C> {
    /// Not yet resolved against the handler registry.
    Unresolved,
    /// Resolved by pattern; captures are computed once at resolution.
    Matched {
        handler: Arc<Handler<C>>,
        captures: Captures,
    },
    /// Routine attached to the task itself. No captures.
    Direct(Arc<dyn Routine<C>>),
}

impl<C> Clone for Binding<C> {
    fn clone(&self) -> Self {
        match self {
            Binding::Unresolved => Binding::Unresolved,
            Binding::Matched { handler, captures } => Binding::Matched {
                handler: Arc::clone(handler),
                captures: captures.clone(),
            },
            Binding::Direct(routine) => Binding::Direct(Arc::clone(routine)),
        }
    }
}

pub(crate) struct Work<C> {
    pub(crate) target: String,
    pub(crate) payload: Payload,
    pub(crate) binding: Binding<C>,
}

enum Body<C> {
    Work(Work<C>),
    Signal(Signal),
}

/// Unit of work.
///
/// A task is either work (a target, a payload and eventually a routine) or a
/// sentinel. Sentinels have neither target nor handler.
///
/// `C` is the client type routines run against.
pub struct Task<C> {
    id: Option<TaskId>,
    body: Body<C>,
    priority: i64,
}

impl<C> Task<C> {
    /// Work task for `target` with the default priority and an empty payload.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            id: None,
            body: Body::Work(Work {
                target: target.into(),
                payload: Payload::new(),
                binding: Binding::Unresolved,
            }),
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Stop sentinel (drain).
    pub fn stop() -> Self {
        Self::signal_task(Signal::Stop)
    }

    /// Abort sentinel (cancel now).
    pub fn abort() -> Self {
        Self::signal_task(Signal::Abort)
    }

    fn signal_task(signal: Signal) -> Self {
        Self {
            id: None,
            body: Body::Signal(signal),
            priority: signal.priority(),
        }
    }

    /// Set the priority of a work task, clamped strictly between the
    /// sentinel priorities. No-op on sentinels: their priority is fixed.
    pub fn with_priority(mut self, priority: i64) -> Self {
        if let Body::Work(_) = self.body {
            self.priority = work_priority(priority);
        }
        self
    }

    /// Replace the payload. No-op on sentinels.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        if let Body::Work(work) = &mut self.body {
            work.payload = payload;
        }
        self
    }

    /// Insert one payload entry. No-op on sentinels.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Body::Work(work) = &mut self.body {
            work.payload.insert(key.into(), value.into());
        }
        self
    }

    /// Attach a routine directly. The task then skips handler resolution
    /// (but still passes through the filter chain).
    pub fn with_routine<R>(mut self, routine: R) -> Self
    where
        R: Routine<C> + 'static,
    {
        if let Body::Work(work) = &mut self.body {
            work.binding = Binding::Direct(Arc::new(routine));
        }
        self
    }

    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn target(&self) -> Option<&str> {
        match &self.body {
            Body::Work(work) => Some(&work.target),
            Body::Signal(_) => None,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.body {
            Body::Work(work) => Some(&work.payload),
            Body::Signal(_) => None,
        }
    }

    pub fn signal(&self) -> Option<Signal> {
        match &self.body {
            Body::Signal(signal) => Some(*signal),
            Body::Work(_) => None,
        }
    }

    /// Resolved pattern handler, if any.
    pub fn handler(&self) -> Option<&Arc<Handler<C>>> {
        match &self.body {
            Body::Work(Work {
                binding: Binding::Matched { handler, .. },
                ..
            }) => Some(handler),
            _ => None,
        }
    }

    /// Captures of the resolved pattern handler.
    pub fn captures(&self) -> Option<&Captures> {
        match &self.body {
            Body::Work(Work {
                binding: Binding::Matched { captures, .. },
                ..
            }) => Some(captures),
            _ => None,
        }
    }

    /// True iff the task has neither target nor handler.
    pub fn is_sentinel(&self) -> bool {
        self.target().is_none() && self.handler().is_none()
    }

    /// True when the task has a routine to run (matched or direct).
    pub fn is_bound(&self) -> bool {
        matches!(
            &self.body,
            Body::Work(Work {
                binding: Binding::Matched { .. } | Binding::Direct(_),
                ..
            })
        )
    }

    pub(crate) fn assign_id(&mut self, id: TaskId) {
        if self.id.is_none() {
            self.id = Some(id);
        }
    }

    pub(crate) fn work(&self) -> Option<&Work<C>> {
        match &self.body {
            Body::Work(work) => Some(work),
            Body::Signal(_) => None,
        }
    }

    pub(crate) fn bind(&mut self, handler: Arc<Handler<C>>, captures: Captures) {
        if let Body::Work(work) = &mut self.body {
            work.binding = Binding::Matched { handler, captures };
        }
    }

    /// Same task (id, target, binding) with an updated payload and priority.
    pub(crate) fn rescheduled(&self, payload: Payload, priority: i64) -> Option<Self> {
        let work = self.work()?;
        Some(Self {
            id: self.id,
            body: Body::Work(Work {
                target: work.target.clone(),
                payload,
                binding: work.binding.clone(),
            }),
            priority: work_priority(priority),
        })
    }
}

impl<C> fmt::Debug for Task<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Task");
        if let Some(id) = &self.id {
            s.field("id", &format_args!("{id}"));
        }
        match &self.body {
            Body::Work(work) => s.field("target", &work.target),
            Body::Signal(signal) => s.field("signal", signal),
        };
        s.field("priority", &self.priority).finish()
    }
}

/// A task-like value returned by routines and seeders.
///
/// Bare targets are wrapped into a [`Task`] with the default priority (or the
/// seed priority when produced by a seeder). Tasks pass through unchanged.
pub enum Follow<C> {
    Target(String),
    Task(Task<C>),
}

impl<C> Follow<C> {
    pub(crate) fn into_task(self, target_priority: i64) -> Task<C> {
        match self {
            Follow::Target(target) => Task::new(target).with_priority(target_priority),
            Follow::Task(task) => task,
        }
    }
}

impl<C> fmt::Debug for Follow<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Follow::Target(target) => f.debug_tuple("Target").field(target).finish(),
            Follow::Task(task) => f.debug_tuple("Task").field(task).finish(),
        }
    }
}

impl<C> From<&str> for Follow<C> {
    fn from(target: &str) -> Self {
        Follow::Target(target.to_string())
    }
}

impl<C> From<String> for Follow<C> {
    fn from(target: String) -> Self {
        Follow::Target(target)
    }
}

impl<C> From<Task<C>> for Follow<C> {
    fn from(task: Task<C>) -> Self {
        Follow::Task(task)
    }
}
