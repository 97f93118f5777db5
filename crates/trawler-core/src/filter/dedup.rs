use std::collections::HashSet;

use super::Filter;
use crate::domain::Task;

/// Rejects targets that were already admitted once.
///
/// Place it last in the chain: a target rejected by an earlier filter is
/// never recorded.
#[derive(Debug, Default)]
pub struct DedupFilter {
    seen: HashSet<String>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl<C> Filter<C> for DedupFilter {
    fn admit(&mut self, task: &Task<C>) -> bool {
        match task.target() {
            Some(target) => self.seen.insert(target.to_string()),
            None => true,
        }
    }
}
