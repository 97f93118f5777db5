//! Simulated website served from memory, used as the demo client.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use trawler_core::domain::{Outcome, TaskError};
use trawler_core::ports::Client;
use trawler_core::routing::{Context, Routine};

const BUILTIN_SITE: &str = r#"{
  "pages": {
    "https://demo.test/list/1": {
      "body": "<h1>Catalogue</h1><a href=\"/item/1\">one</a> <a href=\"/item/2\">two</a> <a href=\"/list/2\">next</a> <a href=\"http://demo.test/legacy\">legacy</a> <a href=\"https://elsewhere.test/\">partner</a>"
    },
    "https://demo.test/list/2": {
      "body": "<h1>Catalogue, page 2</h1><a href=\"/item/2\">two</a> <a href=\"/item/3\">three</a> <a href=\"/list/1\">back</a>"
    },
    "https://demo.test/item/1": { "body": "<title>Brass compass</title>" },
    "https://demo.test/item/2": { "body": "<title>Tide table</title>", "failures": 2 },
    "https://demo.test/item/3": { "body": "<title>Sextant</title>", "failures": 5 }
  }
}"#;

#[derive(Debug, Deserialize)]
struct SiteSpec {
    pages: HashMap<String, PageSpec>,
}

#[derive(Debug, Deserialize)]
struct PageSpec {
    body: String,
    /// Fetches that fail before the page is served.
    #[serde(default)]
    failures: u32,
}

struct Page {
    body: String,
    failures_left: AtomicU32,
}

pub struct DemoClient {
    pages: HashMap<String, Page>,
    requests: AtomicUsize,
    delay: Duration,
}

impl DemoClient {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let spec: SiteSpec = serde_json::from_str(raw)?;
        let pages = spec
            .pages
            .into_iter()
            .map(|(url, page)| {
                let page = Page {
                    body: page.body,
                    failures_left: AtomicU32::new(page.failures),
                };
                (url, page)
            })
            .collect();
        Ok(Self {
            pages,
            requests: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    pub fn builtin() -> Result<Self, serde_json::Error> {
        Self::from_json(BUILTIN_SITE)
    }

    /// Latency added to every routine call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fetch(&self, url: &str) -> Result<&str, TaskError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let page = self
            .pages
            .get(url)
            .ok_or_else(|| TaskError::msg(format!("404 not found: {url}")))?;
        let flaked = page
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if flaked {
            return Err(TaskError::from(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("connection reset while fetching {url}"),
            )));
        }
        Ok(&page.body)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

impl Client for DemoClient {
    fn execute(
        &self,
        routine: &dyn Routine<Self>,
        ctx: &Context<'_, Self>,
    ) -> Result<Outcome<Self>, TaskError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        routine.call(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flaky_page_fails_then_serves() {
        let client = DemoClient::from_json(
            r#"{"pages": {"https://demo.test/a": {"body": "ok", "failures": 1}}}"#,
        )
        .unwrap();

        assert!(client.fetch("https://demo.test/a").is_err());
        assert_eq!(client.fetch("https://demo.test/a").unwrap(), "ok");
        assert!(client.fetch("https://demo.test/missing").is_err());
        assert_eq!(client.requests(), 3);
    }

    #[test]
    fn builtin_site_parses() {
        assert!(DemoClient::builtin().is_ok());
    }
}
