//! HandlerRegistry - ordered handler collection.
//!
//! Built during configuration (mutable), read-only while the crawler runs.
//! Handlers are kept sorted by descending priority; equal priorities keep
//! their registration order.

use std::sync::Arc;

use super::handler::{Captures, Handler, RoutineFactory};
use crate::domain::CrawlerError;

pub struct HandlerRegistry<C> {
    handlers: Vec<Arc<Handler<C>>>,
}

impl<C> HandlerRegistry<C> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Insert `handler` after every handler whose priority is >= its own.
    pub fn register(&mut self, handler: Handler<C>) -> Arc<Handler<C>> {
        let index = self
            .handlers
            .partition_point(|h| h.priority() >= handler.priority());
        let handler = Arc::new(handler);
        self.handlers.insert(index, Arc::clone(&handler));
        handler
    }

    /// Compile and register in one step.
    pub fn add(
        &mut self,
        pattern: &str,
        priority: i64,
        routine: RoutineFactory<C>,
    ) -> Result<Arc<Handler<C>>, CrawlerError> {
        let handler = Handler::new(pattern, priority, routine)?;
        Ok(self.register(handler))
    }

    /// First handler (in priority order) whose pattern matches `target`,
    /// together with its captures.
    pub fn resolve(&self, target: &str) -> Option<(Arc<Handler<C>>, Captures)> {
        self.handlers
            .iter()
            .find_map(|h| h.captures(target).map(|caps| (Arc::clone(h), caps)))
    }

    /// Like `resolve` without computing captures.
    pub fn find_match(&self, target: &str) -> Option<&Arc<Handler<C>>> {
        self.handlers.iter().find(|h| h.is_match(target))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Handler<C>>> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<C> Default for HandlerRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Outcome;

    fn noop() -> RoutineFactory<()> {
        RoutineFactory::from_fn(|_ctx| Ok(Outcome::done()))
    }

    fn names(reg: &HandlerRegistry<()>) -> Vec<&str> {
        reg.iter().map(|h| h.name()).collect()
    }

    #[test]
    fn handlers_are_sorted_by_descending_priority() {
        let mut reg = HandlerRegistry::new();
        for p in [1, 2, 3] {
            reg.register(Handler::new(".*", p, noop()).unwrap().named(format!("h{p}")));
        }
        assert_eq!(names(&reg), vec!["h3", "h2", "h1"]);
    }

    #[test]
    fn equal_priorities_keep_registration_order() {
        let mut reg = HandlerRegistry::new();
        reg.register(Handler::new("a", 1, noop()).unwrap().named("first"));
        reg.register(Handler::new("a", 5, noop()).unwrap().named("high"));
        reg.register(Handler::new("a", 1, noop()).unwrap().named("second"));
        reg.register(Handler::new("a", 1, noop()).unwrap().named("third"));

        assert_eq!(names(&reg), vec!["high", "first", "second", "third"]);
    }

    #[test]
    fn resolve_returns_first_match_in_order() {
        let mut reg = HandlerRegistry::new();
        reg.add("a", 0, noop()).unwrap();
        reg.add("b", 0, noop()).unwrap();
        reg.add("c", 0, noop()).unwrap();

        let (handler, caps) = reg.resolve("a").unwrap();
        assert_eq!(handler.pattern(), "a");
        assert_eq!(caps.whole(), Some("a"));
        assert!(reg.resolve("x").is_none());
        assert!(reg.find_match("x").is_none());
    }

    #[test]
    fn resolve_prefers_higher_priority() {
        let mut reg = HandlerRegistry::new();
        let h1 = reg.add("/x/", 1, noop()).unwrap();
        let h2 = reg.add("/x/", 5, noop()).unwrap();

        let (found, _) = reg.resolve("/x/").unwrap();
        assert!(Arc::ptr_eq(&found, &h2));
        assert!(!Arc::ptr_eq(&found, &h1));
    }

    #[test]
    fn resolve_ties_go_to_earliest_registration() {
        let mut reg = HandlerRegistry::new();
        let first = reg.add("example", 2, noop()).unwrap();
        let _second = reg.add("example", 2, noop()).unwrap();

        let found = reg.find_match("https://example.com/").unwrap();
        assert!(Arc::ptr_eq(found, &first));
    }

    #[test]
    fn invalid_pattern_leaves_registry_untouched() {
        let mut reg = HandlerRegistry::new();
        assert!(reg.add("[", 0, noop()).is_err());
        assert!(reg.is_empty());
    }
}
