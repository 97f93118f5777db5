//! Outcome of one routine execution.

use std::fmt;

use super::task::{Follow, Payload};

/// What a routine asks the dispatcher to do after it ran.
///
/// - `Completed`: the task is done; the follow-ups go through the normal
///   resolve / filter / push path.
/// - `Reschedule`: push the same task again with an updated payload and
///   priority (the retry path). The rescheduled task keeps its id and binding.
pub enum Outcome<C> {
    Completed(Vec<Follow<C>>),
    Reschedule { payload: Payload, priority: i64 },
}

impl<C> Outcome<C> {
    /// Completed, no follow-ups.
    pub fn done() -> Self {
        Outcome::Completed(Vec::new())
    }

    /// Completed with follow-up tasks or bare targets.
    pub fn follow<I, F>(items: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Follow<C>>,
    {
        Outcome::Completed(items.into_iter().map(Into::into).collect())
    }

    pub fn reschedule(payload: Payload, priority: i64) -> Self {
        Outcome::Reschedule { payload, priority }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }
}

impl<C> From<Vec<Follow<C>>> for Outcome<C> {
    fn from(follow_ups: Vec<Follow<C>>) -> Self {
        Outcome::Completed(follow_ups)
    }
}

impl<C> fmt::Debug for Outcome<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed(follow_ups) => {
                f.debug_tuple("Completed").field(follow_ups).finish()
            }
            Outcome::Reschedule { payload, priority } => f
                .debug_struct("Reschedule")
                .field("payload", payload)
                .field("priority", priority)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;

    #[test]
    fn follow_accepts_mixed_task_likes() {
        let outcome: Outcome<()> = Outcome::follow(vec![
            Follow::from("https://example.com/a"),
            Follow::from(Task::new("https://example.com/b").with_priority(4)),
        ]);

        let Outcome::Completed(items) = outcome else {
            panic!("expected Completed");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Follow::Target(t) if t == "https://example.com/a"));
        assert!(matches!(&items[1], Follow::Task(t) if t.priority() == 4));
    }

    #[test]
    fn done_has_no_follow_ups() {
        let outcome: Outcome<()> = Outcome::done();
        assert!(outcome.is_completed());
        assert!(matches!(outcome, Outcome::Completed(v) if v.is_empty()));
    }
}
