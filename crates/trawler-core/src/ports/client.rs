//! Client port - 外部リソースへのアクセス手段
//!
//! Client は routine に `Context::client` として渡されます。HTTP クライアントや
//! ブラウザセッションなど、具体的な中身は利用側が決めます。

use std::thread;
use std::time::Duration;

use crate::domain::{Outcome, TaskError};
use crate::routing::{Context, Routine};

/// Capability every routine runs against.
///
/// `execute` wraps each routine call; override it to add per-call behavior
/// (politeness delay, session checkout, metrics). The default just calls the
/// routine.
pub trait Client: Send + Sync + Sized + 'static {
    fn execute(
        &self,
        routine: &dyn Routine<Self>,
        ctx: &Context<'_, Self>,
    ) -> Result<Outcome<Self>, TaskError> {
        routine.call(ctx)
    }
}

/// Client with no resources of its own.
impl Client for () {}

/// Calls routines directly, optionally sleeping before each call.
#[derive(Debug, Clone, Default)]
pub struct DirectClient {
    delay: Option<Duration>,
}

impl DirectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep `delay` before every routine call.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay) }
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }
}

impl Client for DirectClient {
    fn execute(
        &self,
        routine: &dyn Routine<Self>,
        ctx: &Context<'_, Self>,
    ) -> Result<Outcome<Self>, TaskError> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        routine.call(ctx)
    }
}
