//! Vigil Core
//!
//! This crate provides the runtime for Vigil, a fine-grained reactive
//! dependency-tracking engine. It implements:
//!
//! - A dynamic value model with observable objects and arrays
//! - Transparent dependency collection through reactive property cells
//! - Watchers with lazy, sync and queued semantics
//! - A batched flush queue and a deferred tick queue
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: `Value`, `Object` and `Array`, the state being observed
//! - `observer`: makes values reactive in place and intercepts array mutation
//! - `reactive`: dependencies, watchers, owners and the runtime
//! - `scheduler`: the flush queue and the tick queue with its drivers
//! - `config` / `error`: runtime settings and the crate error type
//!
//! # Example
//!
//! ```rust
//! use vigil_core::{Object, Owner, Runtime, Value, WatcherOptions};
//!
//! let runtime = Runtime::new();
//! let state = Object::from_entries([("count", 0)]);
//! let owner = Owner::with_data(&runtime, Value::Object(state.clone()));
//!
//! owner
//!     .watch(
//!         "count",
//!         |new, old| {
//!             println!("count: {old:?} -> {new:?}");
//!             Ok(())
//!         },
//!         WatcherOptions::default(),
//!     )
//!     .unwrap();
//!
//! state.set("count", 1);
//! state.set("count", 2);
//!
//! // The watcher runs once, on the next tick.
//! runtime.flush_ticks();
//! ```

pub mod config;
pub mod error;
pub mod observer;
pub mod reactive;
pub mod scheduler;
pub mod value;

pub use config::{Config, TickDriverKind};
pub use error::{Error, Result};
pub use observer::{traverse, Key, Observer, ReactiveCell, WriteHook};
pub use reactive::{
    parse_path, Callback, Computed, Dep, Equality, Owner, Runtime, WatchSource, Watcher,
    WatcherOptions,
};
pub use scheduler::{NextTick, TickDriver};
pub use value::{Array, Object, ObjectKind, Value};
