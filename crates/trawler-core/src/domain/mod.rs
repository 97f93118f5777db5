//! Domain model: tasks, identifiers, outcomes, events, errors.

pub mod errors;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod task;

pub use self::errors::{CrawlerError, TaskError};
pub use self::events::{CrawlEvent, EventKind};
pub use self::ids::{RunId, TaskId};
pub use self::outcome::Outcome;
pub use self::task::{
    ABORT_PRIORITY, DEFAULT_PRIORITY, Follow, Payload, STOP_PRIORITY, Signal, Task,
    work_priority,
};
