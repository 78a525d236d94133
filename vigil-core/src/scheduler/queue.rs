//! Watcher flush queue.
//!
//! Watchers that are neither lazy nor sync are queued when a dependency
//! notifies. The queue is flushed on the next tick (or immediately when
//! `async_updates` is off), running each queued watcher once, in ascending
//! ID order.
//!
//! # Ordering
//!
//! Sorting by ID before the flush means:
//!
//! 1. watchers run in creation order, so a watcher created earlier always
//!    sees its state settle before one created later,
//! 2. a watcher queued while the flush is running is inserted at its ID
//!    position after the current index, so it still runs in this flush.
//!
//! # Infinite Loops
//!
//! A watcher that keeps re-queueing itself during a single flush is cut off
//! after `Config::max_update_count` re-runs with a warning.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::reactive::{Runtime, Watcher, WatcherId};

#[derive(Default)]
struct QueueState {
    queue: Vec<Watcher>,
    has: HashSet<WatcherId>,
    circular: HashMap<WatcherId, usize>,
    waiting: bool,
    flushing: bool,
    index: usize,
}

#[derive(Default)]
pub(crate) struct FlushQueue {
    state: RefCell<QueueState>,
}

impl FlushQueue {
    fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.queue.clear();
        state.has.clear();
        state.circular.clear();
        state.waiting = false;
        state.flushing = false;
        state.index = 0;
    }
}

/// Resets the queue when the flush ends, even by unwinding.
struct ResetOnDrop<'a>(&'a FlushQueue);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.reset();
    }
}

impl Runtime {
    /// Queue `watcher` to run in the next flush. Repeated calls before the
    /// watcher runs are coalesced.
    pub fn queue_watcher(&self, watcher: &Watcher) {
        let id = watcher.id();
        {
            let mut state = self.queue().state.borrow_mut();
            if !state.has.insert(id) {
                return;
            }

            if state.flushing {
                let mut pos = state.queue.len();
                while pos > state.index + 1 && state.queue[pos - 1].id() > id {
                    pos -= 1;
                }
                state.queue.insert(pos, watcher.clone());
            } else {
                state.queue.push(watcher.clone());
            }
            tracing::trace!(watcher = %id, queued = state.queue.len(), "watcher queued");

            if state.waiting {
                return;
            }
            state.waiting = true;
        }

        if self.config().async_updates {
            let runtime = self.downgrade();
            self.next_tick(move || {
                if let Some(runtime) = runtime.upgrade() {
                    runtime.flush_queue();
                }
                Ok(())
            });
        } else {
            self.flush_queue();
        }
    }

    /// Number of watchers waiting for the next flush.
    pub fn pending_watchers(&self) -> usize {
        let state = self.queue().state.borrow();
        state.queue.len().saturating_sub(state.index)
    }

    /// Run every queued watcher now. A nested call during a flush does
    /// nothing; the running flush picks up anything queued meanwhile.
    pub(crate) fn flush_queue(&self) {
        let queue = self.queue();
        if queue.state.borrow().flushing {
            return;
        }
        let _reset = ResetOnDrop(queue);
        let count = {
            let mut state = queue.state.borrow_mut();
            state.flushing = true;
            state.queue.sort_by_key(Watcher::id);
            state.queue.len()
        };
        tracing::debug!(watchers = count, "flushing watcher queue");
        let max_update_count = self.config().max_update_count;

        loop {
            let watcher = {
                let state = queue.state.borrow();
                match state.queue.get(state.index) {
                    Some(watcher) => watcher.clone(),
                    None => break,
                }
            };

            if let Some(before) = watcher.before() {
                before();
            }
            let id = watcher.id();
            queue.state.borrow_mut().has.remove(&id);

            if let Err(err) = watcher.run() {
                let info = format!("watcher \"{}\"", watcher.expression());
                self.report_error(&err, watcher.owner().as_ref(), &info);
            }

            let mut state = queue.state.borrow_mut();
            if state.has.contains(&id) {
                let runs = state.circular.entry(id).or_insert(0);
                *runs += 1;
                if *runs > max_update_count {
                    drop(state);
                    let message = if watcher.is_user() {
                        format!(
                            "You may have an infinite update loop in watcher with expression \"{}\"",
                            watcher.expression()
                        )
                    } else {
                        "You may have an infinite update loop in a render function.".to_string()
                    };
                    self.warn(&message);
                    break;
                }
            }
            state.index += 1;
        }
    }
}
