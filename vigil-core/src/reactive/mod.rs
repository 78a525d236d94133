//! Reactive Primitives
//!
//! This module implements the dependency-tracking half of the engine:
//! dependencies, watchers, the target stack and the runtime that owns them.
//!
//! # Concepts
//!
//! ## Dependencies
//!
//! A [`Dep`] is a broadcast node. Every reactive property cell and every
//! observed container owns one. Reading the cell while a watcher is
//! collecting subscribes that watcher; writing the cell notifies every
//! subscriber.
//!
//! ## Watchers
//!
//! A [`Watcher`] evaluates a getter and keeps its subscriptions in sync with
//! what the getter actually read. Watchers come in three flavours:
//!
//! - **lazy** watchers only mark themselves dirty (see [`Computed`]),
//! - **sync** watchers re-run as soon as a dependency changes,
//! - everything else is queued and flushed once per tick.
//!
//! ## Owners
//!
//! An [`Owner`] holds root data and the watchers created against it, and
//! tears them down together.
//!
//! # Implementation Notes
//!
//! Collection uses a target stack owned by the [`Runtime`]. Reading a
//! reactive cell checks the top of the stack and, if a watcher is there,
//! registers the cell's dependency with it.

mod computed;
mod context;
mod dep;
mod owner;
mod path;
mod runtime;
mod subscriber;
mod watcher;

pub use computed::{Computed, Setter};
pub use context::TargetGuard;
pub use dep::Dep;
pub use owner::Owner;
pub use path::parse_path;
pub use runtime::{ErrorHandler, ObservingGuard, Runtime, WarnHandler};
pub use subscriber::{DepId, WatcherId};
pub use watcher::{Callback, Equality, Getter, Hook, WatchSource, Watcher, WatcherOptions};

pub(crate) use runtime::WeakRuntime;
