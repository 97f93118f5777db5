//! trawler-core
//!
//! Task dispatch engine for crawlers: pattern-routed handlers, admission
//! filters, a priority queue and a pool of worker threads.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, outcome, events, errors）
//! - **routing**: Handler / HandlerRegistry / Retrying
//! - **filter**: FilterChain と DedupFilter
//! - **queue**: TaskQueue（優先度 + FIFO、outstanding 管理）
//! - **ports**: 抽象化レイヤー（Client, Seeder, EventSink, Clock, IdGenerator）
//! - **app**: 設定・構築・ディスパッチャ本体（config, builder, crawler, worker_loop, status）
//! - **util**: routine 向けの URL / テキスト補助関数

pub mod app;
pub mod domain;
pub mod filter;
pub mod ports;
pub mod queue;
pub mod routing;
pub mod util;

pub use self::app::{
    Admission, CancelHandle, Crawler, CrawlerBuilder, CrawlerConfig, RunReport,
};
pub use self::domain::{CrawlerError, Follow, Outcome, Payload, Task, TaskError};
pub use self::filter::{DedupFilter, Filter, FilterChain};
pub use self::ports::{Client, DirectClient};
pub use self::routing::{Context, Handler, Retrying, RetryPolicy, Routine, RoutineFactory};
