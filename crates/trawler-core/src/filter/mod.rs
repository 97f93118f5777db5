//! Admission filters.
//!
//! A task enters the queue only if every filter of the chain admits it.
//! Filters may keep state (see [`DedupFilter`]); the crawler evaluates the
//! whole chain for one task under a single lock, so state updates of two
//! concurrent submissions never interleave.

mod dedup;

pub use self::dedup::DedupFilter;

use crate::domain::Task;

/// Admission predicate.
///
/// Closures `FnMut(&Task<C>) -> bool + Send` are filters.
pub trait Filter<C>: Send {
    fn admit(&mut self, task: &Task<C>) -> bool;
}

impl<C, F> Filter<C> for F
where
    F: FnMut(&Task<C>) -> bool + Send,
{
    fn admit(&mut self, task: &Task<C>) -> bool {
        self(task)
    }
}

/// Ordered conjunction of filters. Empty chain admits everything.
pub struct FilterChain<C> {
    filters: Vec<Box<dyn Filter<C>>>,
}

impl<C> FilterChain<C> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Append; evaluation follows insertion order.
    pub fn add<F>(&mut self, filter: F)
    where
        F: Filter<C> + 'static,
    {
        self.filters.push(Box::new(filter));
    }

    /// True iff every filter admits `task`. Stops at the first rejection, so
    /// later filters never see (or record) a rejected task.
    pub fn evaluate(&mut self, task: &Task<C>) -> bool {
        self.filters.iter_mut().all(|f| f.admit(task))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl<C> Default for FilterChain<C> {
    fn default() -> Self {
        Self::new()
    }
}
