//! App layer: configuration, wiring and the dispatcher runtime.

pub mod builder;
pub mod config;
pub mod crawler;
pub mod status;
mod worker_loop;

pub use self::builder::CrawlerBuilder;
pub use self::config::CrawlerConfig;
pub use self::crawler::{Admission, CancelHandle, Crawler};
pub use self::status::RunReport;
