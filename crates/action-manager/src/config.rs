//! Scheduler configuration.

use std::env;

/// Initial per-target queue capacity.
pub const DEFAULT_INITIAL_CAPACITY: usize = 4;

/// Tunables for [`ActionManager`](crate::ActionManager).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionManagerConfig {
    /// Capacity reserved for a target's queue when its record is created.
    /// Full queues double from here.
    pub initial_capacity: usize,
}

impl Default for ActionManagerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl ActionManagerConfig {
    pub const fn new(initial_capacity: usize) -> Self {
        Self { initial_capacity }
    }

    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `ACTION_MANAGER_INITIAL_CAPACITY` - Queue capacity per new target (default: 4)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(capacity) = read_env::<usize>("ACTION_MANAGER_INITIAL_CAPACITY") {
            config.initial_capacity = capacity.max(1);
        }

        config
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
