//! Routing: pattern handlers, their registry and the retry wrapper.

pub mod handler;
pub mod registry;
pub mod retry;

pub use self::handler::{CaptureKey, Captures, Context, Handler, Routine, RoutineFactory};
pub use self::registry::HandlerRegistry;
pub use self::retry::{RetryPolicy, Retrying};
