//! trawler demo: crawls a simulated in-memory site.
//!
//! ```text
//! RUST_LOG=debug cargo run -p trawler-cli -- https://demo.test/list/1
//! TRAWLER_CONFIG=trawler.json cargo run -p trawler-cli
//! ```

mod routes;
mod site;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use trawler_core::domain::Task;
use trawler_core::routing::{Retrying, RoutineFactory};
use trawler_core::{Crawler, CrawlerConfig, CrawlerError, DedupFilter, RunReport};

use crate::routes::{ItemPage, ListPage};
use crate::site::DemoClient;

const DEFAULT_SEED: &str = "https://demo.test/list/1";

/// Exit status of a crawl cancelled with Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

fn load_config() -> Result<CrawlerConfig, CrawlerError> {
    match std::env::var_os("TRAWLER_CONFIG") {
        Some(path) => CrawlerConfig::from_json_file(path),
        None => Ok(CrawlerConfig {
            workers: 4,
            ..CrawlerConfig::default()
        }),
    }
}

fn build_crawler(config: CrawlerConfig) -> Result<Crawler<DemoClient>, CrawlerError> {
    let client = DemoClient::builtin()?.with_delay(Duration::from_millis(20));
    let mut crawler = Crawler::with_config(client, config)?;

    crawler.register_handler(
        r"^https://demo\.test/list/(?P<page>\d+)$",
        0,
        RoutineFactory::shared(ListPage::new()?),
    )?;
    crawler.register_handler(
        r"^https://demo\.test/item/(?P<id>\d+)$",
        0,
        RoutineFactory::shared(Retrying::new(ItemPage::new()?)),
    )?;

    crawler.register_filter(|task: &Task<DemoClient>| {
        !task.target().is_some_and(|url| url.starts_with("http://"))
    });
    crawler.register_filter(DedupFilter::new());
    Ok(crawler)
}

fn print_report(report: &RunReport, requests: usize) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(e) => error!(error = %e, "failed to render report"),
    }
    info!(requests, "simulated requests served");
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .init();

    let crawler = match load_config().and_then(build_crawler) {
        Ok(crawler) => Arc::new(crawler),
        Err(e) => {
            error!(error = %e, "failed to set up crawler");
            return ExitCode::FAILURE;
        }
    };

    let mut seeds: Vec<String> = std::env::args().skip(1).collect();
    if seeds.is_empty() {
        seeds.push(DEFAULT_SEED.to_string());
    }

    let cancel = crawler.cancel_handle();
    let runner = Arc::clone(&crawler);
    let mut crawl = tokio::task::spawn_blocking(move || runner.run_default(&seeds));

    let joined = tokio::select! {
        joined = &mut crawl => joined,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("Ctrl-C received, cancelling crawl");
            cancel.cancel();
            crawl.await
        }
    };

    let result = match joined {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "crawl thread failed");
            return ExitCode::FAILURE;
        }
    };

    print_report(&crawler.report(), crawler.client().requests());
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(CrawlerError::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            error!(error = %e, "crawl failed");
            ExitCode::FAILURE
        }
    }
}
