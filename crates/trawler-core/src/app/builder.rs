//! CrawlerBuilder - Crawler の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//!   - パターンのコンパイルエラーは `handler()` の時点で返す
//!   - `expect_routes()` に渡したターゲットがどのハンドラにもマッチしなければ `build()` が失敗する

use super::config::CrawlerConfig;
use super::crawler::Crawler;
use crate::domain::{CrawlerError, Outcome, TaskError};
use crate::filter::Filter;
use crate::ports::{Client, Clock, EventSink, Seeder};
use crate::routing::{Context, RoutineFactory};

/// Builds a [`Crawler`].
///
/// # 使用例
/// ```ignore
/// let crawler = CrawlerBuilder::new(DirectClient::new())
///     .config(CrawlerConfig { workers: 4, ..Default::default() })
///     .handler_fn(r"//example\.com/", 0, |ctx| Ok(Outcome::done()))?
///     .filter(DedupFilter::new())
///     .expect_routes(&["https://example.com/"])
///     .build()?;
/// ```
pub struct CrawlerBuilder<C: Client> {
    crawler: Crawler<C>,
    config: Option<CrawlerConfig>,
    expected_routes: Vec<String>,
}

impl<C: Client> CrawlerBuilder<C> {
    pub fn new(client: C) -> Self {
        Self {
            crawler: Crawler::new(client),
            config: None,
            expected_routes: Vec::new(),
        }
    }

    /// Validated in `build`.
    pub fn config(mut self, config: CrawlerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn handler(
        mut self,
        pattern: &str,
        priority: i64,
        routine: RoutineFactory<C>,
    ) -> Result<Self, CrawlerError> {
        self.crawler.register_handler(pattern, priority, routine)?;
        Ok(self)
    }

    pub fn handler_fn<F>(self, pattern: &str, priority: i64, routine: F) -> Result<Self, CrawlerError>
    where
        F: Fn(&Context<'_, C>) -> Result<Outcome<C>, TaskError> + Send + Sync + 'static,
    {
        self.handler(pattern, priority, RoutineFactory::from_fn(routine))
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Filter<C> + 'static,
    {
        self.crawler.register_filter(filter);
        self
    }

    pub fn seeder<S>(mut self, seeder: S) -> Self
    where
        S: Seeder<C> + 'static,
    {
        self.crawler.set_seeder(seeder);
        self
    }

    pub fn event_sink<S>(mut self, sink: S) -> Self
    where
        S: EventSink + 'static,
    {
        self.crawler.set_event_sink(sink);
        self
    }

    pub fn clock<K>(mut self, clock: K) -> Self
    where
        K: Clock + 'static,
    {
        self.crawler.set_clock(clock);
        self
    }

    /// Targets that must be routable once the crawler is built.
    pub fn expect_routes(mut self, targets: &[&str]) -> Self {
        self.expected_routes
            .extend(targets.iter().map(|target| target.to_string()));
        self
    }

    /// # 検証
    /// - config の検証（`CrawlerConfig::validate`）
    /// - `expect_routes()` の全ターゲットがいずれかのハンドラにマッチするか
    pub fn build(mut self) -> Result<Crawler<C>, CrawlerError> {
        if let Some(config) = self.config.take() {
            self.crawler.set_config(config)?;
        }
        let unrouted: Vec<String> = self
            .expected_routes
            .into_iter()
            .filter(|target| self.crawler.registry().find_match(target).is_none())
            .collect();
        if !unrouted.is_empty() {
            return Err(CrawlerError::UnroutedTargets(unrouted));
        }
        Ok(self.crawler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DedupFilter;
    use crate::ports::NoopSink;

    fn noop(_ctx: &Context<'_, ()>) -> Result<Outcome<()>, TaskError> {
        Ok(Outcome::done())
    }

    #[test]
    fn build_success() {
        let crawler = CrawlerBuilder::new(())
            .handler_fn(r"//example\.com/", 0, noop)
            .unwrap()
            .filter(DedupFilter::new())
            .event_sink(NoopSink)
            .expect_routes(&["https://example.com/"])
            .build()
            .unwrap();
        assert_eq!(crawler.registry().len(), 1);
    }

    #[test]
    fn build_reports_unrouted_targets() {
        let result = CrawlerBuilder::new(())
            .handler_fn(r"//example\.com/", 0, noop)
            .unwrap()
            .expect_routes(&["https://example.com/", "https://example.org/"])
            .build();
        assert!(matches!(
            result,
            Err(CrawlerError::UnroutedTargets(missing)) if missing == vec!["https://example.org/".to_string()]
        ));
    }

    #[test]
    fn invalid_pattern_fails_at_registration() {
        let result = CrawlerBuilder::new(()).handler_fn("(", 0, noop);
        assert!(matches!(result, Err(CrawlerError::InvalidPattern { .. })));
    }

    #[test]
    fn config_is_validated_on_build() {
        let result = CrawlerBuilder::new(())
            .config(CrawlerConfig {
                workers: 0,
                ..CrawlerConfig::default()
            })
            .build();
        assert!(matches!(result, Err(CrawlerError::InvalidWorkerCount)));

        let crawler = CrawlerBuilder::new(())
            .config(CrawlerConfig {
                workers: 3,
                ..CrawlerConfig::default()
            })
            .build()
            .unwrap();
        assert_eq!(crawler.config().workers, 3);
    }
}
