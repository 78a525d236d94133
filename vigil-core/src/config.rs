//! Runtime Configuration
//!
//! Plain settings that shape how a [`Runtime`](crate::reactive::Runtime)
//! schedules and reports. Handlers (error and warning hooks) are closures and
//! are installed on the runtime directly rather than through this struct.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which tick driver a runtime is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickDriverKind {
    /// Ticks flush only when `Runtime::flush_ticks` is called.
    #[default]
    Manual,
    /// Ticks wake a `Runtime::drive` loop running on a tokio executor.
    Tokio,
}

/// Settings for a reactive runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// When false, queued watchers flush synchronously instead of on the next tick.
    pub async_updates: bool,

    /// Suppress all warnings.
    pub silent: bool,

    /// Server-rendering mode: no new observers are created.
    pub server_rendering: bool,

    /// How many times one watcher may re-queue itself within a single flush
    /// before the flush is aborted as an infinite update loop.
    pub max_update_count: usize,

    /// Tick driver to build the runtime with.
    pub tick_driver: TickDriverKind,

    /// Largest length `Runtime::set` may pad an array to. Arrays are dense,
    /// so every skipped index is stored.
    pub max_array_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            async_updates: true,
            silent: false,
            server_rendering: false,
            max_update_count: 100,
            tick_driver: TickDriverKind::Manual,
            max_array_length: 1 << 24,
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
