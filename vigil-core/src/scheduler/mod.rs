//! Scheduling
//!
//! Two queues decide *when* reactive work happens:
//!
//! - the **flush queue** batches watcher re-runs so each watcher runs at
//!   most once per flush, in creation order;
//! - the **tick queue** defers arbitrary callbacks (including the flush
//!   queue itself) to the next tick, as decided by a [`TickDriver`].
//!
//! # Drivers
//!
//! [`ManualDriver`] leaves flushing to the caller (`Runtime::flush_ticks`),
//! which suits tests and embedders with their own event loop.
//! [`TokioDriver`] wakes an async `Runtime::drive` loop.

mod queue;
mod tick;

pub(crate) use queue::FlushQueue;
pub(crate) use tick::TickQueue;
pub use tick::{ManualDriver, NextTick, TickDriver, TokioDriver};
