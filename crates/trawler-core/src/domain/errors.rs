//! Error taxonomy.
//!
//! - `CrawlerError`: configuration errors (fail fast at registration),
//!   misuse (fails synchronously to the caller), pool-level interruption.
//! - `TaskError`: failures raised by a routine. Caught at the worker
//!   boundary, never fatal for the pool.
//!
//! "No matching handler" and "filtered out" are not errors; see
//! `app::crawler::Admission`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("invalid handler pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("task target must not be empty")]
    EmptyTarget,

    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("no handler matches expected targets: {0:?}")]
    UnroutedTargets(Vec<String>),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("crawler is already running")]
    AlreadyRunning,

    #[error("crawl interrupted")]
    Interrupted,

    #[error("{0} worker thread(s) panicked")]
    WorkerPanicked(usize),
}

/// Failure raised while executing a task's routine.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Message(String),

    #[error("routine panicked: {0}")]
    Panicked(String),

    #[error("no routine bound to task")]
    Unbound,

    #[error(transparent)]
    Source(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    pub fn msg(message: impl Into<String>) -> Self {
        TaskError::Message(message.into())
    }

    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TaskError::Source(Box::new(error))
    }
}

impl From<std::io::Error> for TaskError {
    fn from(error: std::io::Error) -> Self {
        TaskError::from_error(error)
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(error: serde_json::Error) -> Self {
        TaskError::from_error(error)
    }
}
