//! Target Stack
//!
//! The target stack tracks which watcher is currently collecting
//! dependencies. When a reactive cell is read, its dependency registers with
//! the watcher on top of the stack.
//!
//! # Implementation
//!
//! The stack lives on a [`Runtime`] instance rather than in a global, so
//! independent runtimes never see each other's evaluations. Entering an
//! evaluation pushes the watcher; the returned [`TargetGuard`] pops it when
//! dropped, including during unwinding.
//!
//! An entry may be empty: pushing `None` suspends collection for a nested
//! section (see `Runtime::untracked`) without losing the outer target.

use std::cell::RefCell;

use super::runtime::Runtime;
use super::subscriber::WatcherId;
use super::watcher::Watcher;

#[derive(Default)]
pub(crate) struct TargetStack {
    stack: RefCell<Vec<Option<Watcher>>>,
}

impl TargetStack {
    pub(crate) fn push(&self, target: Option<Watcher>) {
        self.stack.borrow_mut().push(target);
    }

    pub(crate) fn pop(&self) -> Option<Option<Watcher>> {
        self.stack.borrow_mut().pop()
    }

    /// The watcher currently collecting, if any.
    pub(crate) fn current(&self) -> Option<Watcher> {
        self.stack.borrow().last().cloned().flatten()
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.borrow().len()
    }
}

/// Guard that pops the target stack when dropped.
pub struct TargetGuard {
    runtime: Runtime,
    target: Option<WatcherId>,
}

impl TargetGuard {
    /// Push `target` (or an empty entry) onto the runtime's target stack.
    pub fn enter(runtime: &Runtime, target: Option<Watcher>) -> Self {
        let id = target.as_ref().map(Watcher::id);
        runtime.targets().push(target);
        Self {
            runtime: runtime.clone(),
            target: id,
        }
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        let popped = self.runtime.targets().pop();

        // Catch guards dropped out of order.
        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.as_ref().map(Watcher::id),
                self.target,
                "target stack mismatch"
            );
        }
    }
}
