//! Error types raised by the scheduler.
//!
//! Every variant is a caller contract violation. The infallible entry points
//! (`add_action`, `update`, tag lookups) panic with these messages; the
//! `try_*` variants hand them back instead.

use thiserror::Error;

/// Contract violations detected by [`ActionManager`](crate::ActionManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("action (tag {tag}) is already scheduled on this target")]
    DuplicateAction { tag: i32 },

    #[error("action (tag {tag}) is running and cannot be started again")]
    ActionBusy { tag: i32 },

    #[error("the invalid tag cannot be used as a lookup key")]
    InvalidTag,

    #[error("update called while a tick is already in progress")]
    ReentrantUpdate,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
