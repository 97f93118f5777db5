//! Retry: a routine wrapper that turns failures into reschedules.

use serde_json::Value;
use tracing::warn;

use super::handler::{Context, Routine};
use crate::domain::{Outcome, Payload, TaskError, work_priority};

/// Retry policy for failing routines.
///
/// The remaining budget lives in the task payload under `budget_key`, so it
/// travels with the task. Each retry decrements it and raises the priority by
/// `priority_step`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub budget_key: String,
    pub priority_step: i64,
}

impl RetryPolicy {
    pub fn new(budget_key: impl Into<String>) -> Self {
        Self {
            budget_key: budget_key.into(),
            priority_step: 1,
        }
    }

    pub fn with_priority_step(mut self, step: i64) -> Self {
        self.priority_step = step;
        self
    }

    /// Remaining budget in `payload` (0 when absent or not a non-negative integer).
    pub fn remaining(&self, payload: &Payload) -> u64 {
        payload
            .get(&self.budget_key)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    /// Payload and priority for the next attempt, or `None` when the budget
    /// is spent. The raised priority stays below the abort sentinel.
    pub fn next_attempt(&self, payload: &Payload, priority: i64) -> Option<(Payload, i64)> {
        let remaining = self.remaining(payload);
        if remaining == 0 {
            return None;
        }
        let mut next = payload.clone();
        next.insert(self.budget_key.clone(), Value::from(remaining - 1));
        let raised = work_priority(priority.saturating_add(self.priority_step));
        Some((next, raised))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new("retry")
    }
}

/// Wraps a routine; a failure with budget left becomes `Outcome::Reschedule`.
pub struct Retrying<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R> Retrying<R> {
    pub fn new(inner: R) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    pub fn with_policy(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<C, R> Routine<C> for Retrying<R>
where
    R: Routine<C>,
{
    fn call(&self, ctx: &Context<'_, C>) -> Result<Outcome<C>, TaskError> {
        let err = match self.inner.call(ctx) {
            Ok(outcome) => return Ok(outcome),
            Err(err) => err,
        };
        match self.policy.next_attempt(ctx.payload, ctx.priority) {
            Some((payload, priority)) => {
                warn!(
                    url = ctx.target,
                    error = %err,
                    remaining = self.policy.remaining(&payload),
                    priority,
                    "routine failed, rescheduling"
                );
                Ok(Outcome::reschedule(payload, priority))
            }
            None => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct FailTimes(AtomicU32);

    impl Routine<()> for FailTimes {
        fn call(&self, _ctx: &Context<'_, ()>) -> Result<Outcome<()>, TaskError> {
            let left = self.0.load(Ordering::SeqCst);
            if left > 0 {
                self.0.fetch_sub(1, Ordering::SeqCst);
                return Err(TaskError::msg(format!("intentional failure (left={left})")));
            }
            Ok(Outcome::done())
        }
    }

    fn ctx<'a>(payload: &'a Payload, priority: i64) -> Context<'a, ()> {
        Context {
            task_id: None,
            target: "https://example.com/flaky",
            payload,
            captures: None,
            client: &(),
            priority,
        }
    }

    #[test]
    fn failure_with_budget_reschedules_with_bumped_priority() {
        let routine = Retrying::new(FailTimes(AtomicU32::new(1)));
        let mut payload = Payload::new();
        payload.insert("retry".into(), 2.into());

        let outcome = routine.call(&ctx(&payload, 0)).unwrap();
        match outcome {
            Outcome::Reschedule { payload, priority } => {
                assert_eq!(payload["retry"], 1);
                assert_eq!(priority, 1);
            }
            other => panic!("expected reschedule, got {other:?}"),
        }
    }

    #[test]
    fn failure_without_budget_propagates() {
        let routine = Retrying::new(FailTimes(AtomicU32::new(1)));
        let mut payload = Payload::new();
        payload.insert("retry".into(), 0.into());

        let err = routine.call(&ctx(&payload, 0)).unwrap_err();
        assert!(err.to_string().contains("intentional failure"));
    }

    #[test]
    fn success_passes_through_untouched() {
        let routine = Retrying::new(FailTimes(AtomicU32::new(0)));
        let payload = Payload::new();
        assert!(routine.call(&ctx(&payload, 5)).unwrap().is_completed());
    }

    #[test]
    fn custom_policy_uses_its_key_and_step() {
        let policy = RetryPolicy::new("attempts_left").with_priority_step(10);
        let mut payload = Payload::new();
        payload.insert("attempts_left".into(), 1.into());

        let (next, priority) = policy.next_attempt(&payload, i64::MAX - 3).unwrap();
        assert_eq!(next["attempts_left"], 0);
        assert_eq!(priority, i64::MAX - 1);
        assert!(policy.next_attempt(&next, 0).is_none());
    }

    #[test]
    fn non_integer_budget_counts_as_spent() {
        let policy = RetryPolicy::default();
        let mut payload = Payload::new();
        payload.insert("retry".into(), "three".into());
        assert_eq!(policy.remaining(&payload), 0);
    }
}
