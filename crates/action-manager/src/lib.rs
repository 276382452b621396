//! Per-frame action scheduler.
//!
//! Associates steppable actions (tweens, timers, animations) with the targets
//! they mutate, steps every action of every unpaused target once per tick,
//! and removes actions and targets safely, including from inside an action's
//! own `step`.
//!
//! - **Single-threaded**: the scheduler is `!Send`; all calls happen between
//!   ticks or reentrantly from a `step` on the same stack
//! - **Insertion order**: actions on a target run in the order they were added
//! - **Owned targets**: a target stays alive while it has scheduled actions
//!
//! # Architecture
//!
//! - [`Action`]: Capability set the scheduler drives (`start`, `step`, `is_done`, `stop`)
//! - [`ActionHandle`]: Shared, identity-compared handle that is queued on a target
//! - [`ActionManager`]: Target registry, mutation operations and the update loop
//! - [`Updatable`]: Seam the host frame loop drives the manager through
pub mod action;
pub mod config;
pub mod error;
pub mod manager;
pub mod target;
pub mod tick;

mod record;

// Re-export core types for ergonomic API
pub use action::{Action, ActionHandle, INVALID_TAG, StepContext};
pub use config::ActionManagerConfig;
pub use error::{Result, SchedulerError};
pub use manager::ActionManager;
pub use target::TargetId;
pub use tick::Updatable;
