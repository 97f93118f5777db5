//! Demo routines for the simulated site.

use regex::Regex;
use tracing::info;
use trawler_core::domain::{CrawlerError, Follow, Outcome, Task, TaskError};
use trawler_core::routing::{Context, Routine};
use trawler_core::util::{strip_white, url_join};

use crate::site::DemoClient;

/// Retry budget given to item pages.
pub const ITEM_RETRIES: u64 = 2;

fn compile(pattern: &str) -> Result<Regex, CrawlerError> {
    Regex::new(pattern).map_err(|source| CrawlerError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Listing page: follows every link. Item links carry a retry budget and
/// jump ahead of further listings.
pub struct ListPage {
    links: Regex,
}

impl ListPage {
    pub fn new() -> Result<Self, CrawlerError> {
        Ok(Self {
            links: compile(r#"href="([^"]+)""#)?,
        })
    }
}

impl Routine<DemoClient> for ListPage {
    fn call(&self, ctx: &Context<'_, DemoClient>) -> Result<Outcome<DemoClient>, TaskError> {
        let body = ctx.client.fetch(ctx.target)?;
        let mut follow_ups = Vec::new();
        for href in self.links.captures_iter(body).filter_map(|caps| caps.get(1)) {
            let url = url_join(ctx.target, &[href.as_str()]).map_err(TaskError::from_error)?;
            if url.contains("/item/") {
                let task = Task::new(url)
                    .with_priority(1)
                    .with_value("retry", ITEM_RETRIES);
                follow_ups.push(Follow::from(task));
            } else {
                follow_ups.push(Follow::from(url));
            }
        }
        info!(
            url = ctx.target,
            page = ctx.capture("page").unwrap_or_default(),
            links = follow_ups.len(),
            "listing crawled"
        );
        Ok(Outcome::Completed(follow_ups))
    }
}

/// Item page: extracts the title.
pub struct ItemPage {
    title: Regex,
}

impl ItemPage {
    pub fn new() -> Result<Self, CrawlerError> {
        Ok(Self {
            title: compile(r"(?s)<title>(.*?)</title>")?,
        })
    }
}

impl Routine<DemoClient> for ItemPage {
    fn call(&self, ctx: &Context<'_, DemoClient>) -> Result<Outcome<DemoClient>, TaskError> {
        let body = ctx.client.fetch(ctx.target)?;
        let title = self
            .title
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| strip_white(m.as_str()))
            .ok_or_else(|| TaskError::msg(format!("no title on {}", ctx.target)))?;
        info!(
            url = ctx.target,
            id = ctx.capture("id").unwrap_or_default(),
            title,
            "item scraped"
        );
        Ok(Outcome::done())
    }
}
