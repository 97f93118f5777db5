//! Handler: a pattern-matched routing rule plus its processing routine.
//!
//! # 設計メモ
//! - Routine は固定の `Context` を受け取る（引数の有無で呼び分けない）
//! - 生成戦略は登録時に明示する: `shared`（単一インスタンス）/ `per_task`（タスク毎に生成）

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;

use crate::domain::{CrawlerError, Outcome, Payload, TaskError, TaskId};

/// Everything a routine gets to see about the task it runs.
///
/// The shape is fixed; routines that don't need a field simply don't read it.
pub struct Context<'a, C> {
    pub task_id: Option<TaskId>,
    pub target: &'a str,
    pub payload: &'a Payload,
    /// Present when the task was routed by a pattern handler.
    pub captures: Option<&'a Captures>,
    pub client: &'a C,
    pub priority: i64,
}

impl<C> Context<'_, C> {
    /// Capture group by index or name. `None` when the task was not routed by
    /// pattern or the group did not participate in the match.
    pub fn capture(&self, key: impl Into<CaptureKey>) -> Option<&str> {
        self.captures.and_then(|c| c.get(key))
    }
}

/// Processing routine of a handler.
///
/// Closures `Fn(&Context<'_, C>) -> Result<Outcome<C>, TaskError>` are routines.
pub trait Routine<C>: Send + Sync {
    fn call(&self, ctx: &Context<'_, C>) -> Result<Outcome<C>, TaskError>;
}

impl<C, F> Routine<C> for F
where
    F: Fn(&Context<'_, C>) -> Result<Outcome<C>, TaskError> + Send + Sync,
{
    fn call(&self, ctx: &Context<'_, C>) -> Result<Outcome<C>, TaskError> {
        self(ctx)
    }
}

/// How the routine instance is obtained for each executed task.
pub enum RoutineFactory<C> {
    /// One instance shared by every task.
    Shared(Arc<dyn Routine<C>>),
    /// A fresh instance per task.
    PerTask(Arc<dyn Fn() -> Box<dyn Routine<C>> + Send + Sync>),
}

impl<C: 'static> RoutineFactory<C> {
    pub fn shared<R>(routine: R) -> Self
    where
        R: Routine<C> + 'static,
    {
        RoutineFactory::Shared(Arc::new(routine))
    }

    /// Shared closure routine.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Context<'_, C>) -> Result<Outcome<C>, TaskError> + Send + Sync + 'static,
    {
        Self::shared(f)
    }

    pub fn per_task<R, M>(make: M) -> Self
    where
        M: Fn() -> R + Send + Sync + 'static,
        R: Routine<C> + 'static,
    {
        RoutineFactory::PerTask(Arc::new(move || Box::new(make()) as Box<dyn Routine<C>>))
    }
}

impl<C> RoutineFactory<C> {
    pub(crate) fn instantiate(&self) -> Arc<dyn Routine<C>> {
        match self {
            RoutineFactory::Shared(routine) => Arc::clone(routine),
            RoutineFactory::PerTask(make) => Arc::from(make()),
        }
    }
}

impl<C> fmt::Debug for RoutineFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutineFactory::Shared(_) => f.write_str("Shared"),
            RoutineFactory::PerTask(_) => f.write_str("PerTask"),
        }
    }
}

/// Key of a capture group: positional (0 = whole match) or named.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum CaptureKey {
    Index(usize),
    Name(String),
}

impl From<usize> for CaptureKey {
    fn from(index: usize) -> Self {
        CaptureKey::Index(index)
    }
}

impl From<&str> for CaptureKey {
    fn from(name: &str) -> Self {
        CaptureKey::Name(name.to_string())
    }
}

/// Capture groups of a handler match.
///
/// Named groups appear both under their name and their position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Captures(BTreeMap<CaptureKey, String>);

impl Captures {
    fn from_match(pattern: &Regex, caps: &regex::Captures<'_>) -> Self {
        let mut map = BTreeMap::new();
        for (index, group) in caps.iter().enumerate() {
            if let Some(m) = group {
                map.insert(CaptureKey::Index(index), m.as_str().to_string());
            }
        }
        for name in pattern.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                map.insert(CaptureKey::Name(name.to_string()), m.as_str().to_string());
            }
        }
        Self(map)
    }

    pub fn get(&self, key: impl Into<CaptureKey>) -> Option<&str> {
        self.0.get(&key.into()).map(String::as_str)
    }

    /// Whole match (group 0).
    pub fn whole(&self) -> Option<&str> {
        self.get(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CaptureKey, &str)> {
        self.0.iter().map(|(k, v)| (k, v.as_str()))
    }
}

/// A routing rule: pattern + priority + routine.
///
/// Immutable once built. Higher priority wins when several handlers match.
pub struct Handler<C> {
    name: String,
    pattern: Regex,
    priority: i64,
    routine: RoutineFactory<C>,
}

impl<C> Handler<C> {
    /// Compile `pattern`. An invalid pattern is a configuration error.
    pub fn new(
        pattern: &str,
        priority: i64,
        routine: RoutineFactory<C>,
    ) -> Result<Self, CrawlerError> {
        let compiled = Regex::new(pattern).map_err(|source| CrawlerError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            name: pattern.to_string(),
            pattern: compiled,
            priority,
            routine,
        })
    }

    /// Name used in logs; defaults to the pattern source.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Search semantics: the pattern may match anywhere in `target`.
    pub fn is_match(&self, target: &str) -> bool {
        self.pattern.is_match(target)
    }

    /// Capture groups of the first match, or `None` when it doesn't match.
    pub fn captures(&self, target: &str) -> Option<Captures> {
        self.pattern
            .captures(target)
            .map(|caps| Captures::from_match(&self.pattern, &caps))
    }

    pub(crate) fn routine(&self) -> Arc<dyn Routine<C>> {
        self.routine.instantiate()
    }
}

impl<C> fmt::Debug for Handler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("priority", &self.priority)
            .field("routine", &self.routine)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rstest::rstest;

    use super::*;

    fn noop() -> RoutineFactory<()> {
        RoutineFactory::from_fn(|_ctx| Ok(Outcome::done()))
    }

    #[rstest]
    #[case("//google.com/", true)]
    #[case("https://google.com/", true)]
    #[case("https://google.com/?q=query", true)]
    #[case("//wikipedia.org/", false)]
    fn matches_anywhere_in_target(#[case] target: &str, #[case] expected: bool) {
        let handler = Handler::new(r"//google\.com/", 0, noop()).unwrap();
        assert_eq!(handler.is_match(target), expected);
    }

    #[test]
    fn captures_expose_whole_positional_and_named_groups() {
        let handler = Handler::new(r"//google\.com/\?q=(?P<query>.+)", 0, noop()).unwrap();
        let caps = handler.captures("https://google.com/?q=search").unwrap();

        assert_eq!(caps.whole(), Some("//google.com/?q=search"));
        assert_eq!(caps.get(1), Some("search"));
        assert_eq!(caps.get("query"), Some("search"));
        assert_eq!(caps.len(), 3);
        assert!(handler.captures("https://duckduckgo.com/").is_none());
    }

    #[test]
    fn optional_group_that_did_not_participate_is_absent() {
        let handler = Handler::new(r"/page(/(\d+))?", 0, noop()).unwrap();
        let caps = handler.captures("https://example.com/page").unwrap();
        assert_eq!(caps.whole(), Some("/page"));
        assert_eq!(caps.get(2), None);
    }

    #[test]
    fn invalid_pattern_is_a_configuration_error() {
        let err = Handler::new(r"(unclosed", 0, noop()).unwrap_err();
        assert!(matches!(err, CrawlerError::InvalidPattern { ref pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn per_task_factory_builds_a_fresh_routine_each_time() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        struct Fresh;
        impl Routine<()> for Fresh {
            fn call(&self, _ctx: &Context<'_, ()>) -> Result<Outcome<()>, TaskError> {
                Ok(Outcome::done())
            }
        }

        let factory = RoutineFactory::per_task(|| {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Fresh
        });
        let handler = Handler::new("x", 0, factory).unwrap();
        let _ = handler.routine();
        let _ = handler.routine();
        assert_eq!(BUILT.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn context_capture_reads_through_to_the_match() {
        let handler = Handler::new(r"/item/(?P<id>\d+)", 0, noop()).unwrap();
        let caps = handler.captures("https://shop.example/item/42").unwrap();
        let payload = Payload::new();
        let ctx = Context {
            task_id: None,
            target: "https://shop.example/item/42",
            payload: &payload,
            captures: Some(&caps),
            client: &(),
            priority: 0,
        };
        assert_eq!(ctx.capture("id"), Some("42"));
        assert_eq!(ctx.capture(0), Some("/item/42"));
    }
}
