//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects dependencies,
//! watchers and the schedulers. Every piece of process-wide state the engine
//! needs lives here, on an instance:
//!
//! - the target stack (which watcher is collecting right now),
//! - the observation switch (whether new observers may be created),
//! - the flush queue of pending watcher runs,
//! - the tick queue of deferred callbacks,
//! - the error and warning hooks.
//!
//! # Handles
//!
//! `Runtime` is a cheap, clonable handle. Dependencies and watchers keep a
//! weak reference back to it, so dropping the last `Runtime` handle turns
//! further collection and scheduling into no-ops.
//!
//! # Threading
//!
//! The engine is single-threaded and run-to-completion. Handles are `!Send`;
//! build one runtime per thread if you need several.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use super::context::{TargetGuard, TargetStack};
use super::owner::Owner;
use super::watcher::Watcher;
use crate::config::{Config, TickDriverKind};
use crate::error::Error;
use crate::scheduler::{FlushQueue, ManualDriver, TickDriver, TickQueue, TokioDriver};

/// Hook receiving errors raised by user computations. Must not propagate.
pub type ErrorHandler = Rc<dyn Fn(&Error, Option<&Owner>, &str)>;

/// Hook receiving warnings. Replaces the default `tracing` output.
pub type WarnHandler = Rc<dyn Fn(&str)>;

pub(crate) struct RuntimeInner {
    config: RefCell<Config>,
    targets: TargetStack,
    observing: Cell<bool>,
    queue: FlushQueue,
    ticks: TickQueue,
    error_handler: RefCell<Option<ErrorHandler>>,
    warn_handler: RefCell<Option<WarnHandler>>,
}

/// Handle to a reactive runtime instance.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a runtime, picking the tick driver named by the configuration.
    pub fn with_config(config: Config) -> Self {
        let driver: Box<dyn TickDriver> = match config.tick_driver {
            TickDriverKind::Manual => Box::new(ManualDriver),
            TickDriverKind::Tokio => Box::new(TokioDriver::new()),
        };
        Self::with_driver(config, driver)
    }

    /// Create a runtime with a custom tick driver.
    pub fn with_driver(config: Config, driver: Box<dyn TickDriver>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config: RefCell::new(config),
                targets: TargetStack::default(),
                observing: Cell::new(true),
                queue: FlushQueue::default(),
                ticks: TickQueue::new(driver),
                error_handler: RefCell::new(None),
                warn_handler: RefCell::new(None),
            }),
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.inner.config.borrow().clone()
    }

    /// Change configuration in place. The tick driver is fixed at construction.
    pub fn update_config(&self, f: impl FnOnce(&mut Config)) {
        f(&mut self.inner.config.borrow_mut());
    }

    /// Install the hook that receives errors from user computations.
    pub fn set_error_handler(&self, handler: impl Fn(&Error, Option<&Owner>, &str) + 'static) {
        *self.inner.error_handler.borrow_mut() = Some(Rc::new(handler));
    }

    /// Install the hook that receives warnings.
    pub fn set_warn_handler(&self, handler: impl Fn(&str) + 'static) {
        *self.inner.warn_handler.borrow_mut() = Some(Rc::new(handler));
    }

    /// Route an error through the error hook. Never panics; a panicking hook
    /// is logged and swallowed.
    pub fn report_error(&self, error: &Error, owner: Option<&Owner>, info: &str) {
        let handler = self.inner.error_handler.borrow().clone();
        match handler {
            Some(handler) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(error, owner, info)));
                if let Err(payload) = outcome {
                    let hook_error = Error::from_panic(payload);
                    tracing::error!(error = %hook_error, "error handler panicked");
                    tracing::error!(error = %error, info, "error in reactive computation");
                }
            }
            None => tracing::error!(error = %error, info, "error in reactive computation"),
        }
    }

    /// Emit a diagnostic. Suppressed when the configuration is silent.
    pub fn warn(&self, message: &str) {
        if self.inner.config.borrow().silent {
            return;
        }
        let handler = self.inner.warn_handler.borrow().clone();
        match handler {
            Some(handler) => handler(message),
            None => tracing::warn!("{message}"),
        }
    }

    /// The watcher currently collecting dependencies, if any.
    pub fn current_target(&self) -> Option<Watcher> {
        self.inner.targets.current()
    }

    /// Whether a watcher is collecting dependencies right now.
    pub fn is_collecting(&self) -> bool {
        self.current_target().is_some()
    }

    /// Run `f` with dependency collection suspended.
    pub fn untracked<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = TargetGuard::enter(self, None);
        f()
    }

    /// Whether new observers may be created.
    pub fn is_observing(&self) -> bool {
        self.inner.observing.get()
    }

    /// Disable observer creation until the returned guard is dropped.
    pub fn pause_observing(&self) -> ObservingGuard {
        let previous = self.inner.observing.replace(false);
        ObservingGuard {
            runtime: self.clone(),
            previous,
        }
    }

    /// Run `f` with observer creation disabled, restoring the previous
    /// setting afterwards even if `f` panics.
    pub fn without_observing<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.pause_observing();
        f()
    }

    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn targets(&self) -> &TargetStack {
        &self.inner.targets
    }

    pub(crate) fn queue(&self) -> &FlushQueue {
        &self.inner.queue
    }

    pub(crate) fn ticks(&self) -> &TickQueue {
        &self.inner.ticks
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.inner))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &*self.inner.config.borrow())
            .field("observing", &self.inner.observing.get())
            .field("target_depth", &self.inner.targets.depth())
            .finish()
    }
}

/// Weak handle held by dependencies, observers and watchers.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

/// Restores the observation switch when dropped.
pub struct ObservingGuard {
    runtime: Runtime,
    previous: bool,
}

impl Drop for ObservingGuard {
    fn drop(&mut self) {
        self.runtime.inner.observing.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn observing_guard_restores_previous_value() {
        let runtime = Runtime::new();
        assert!(runtime.is_observing());

        runtime.without_observing(|| {
            assert!(!runtime.is_observing());
            runtime.without_observing(|| assert!(!runtime.is_observing()));
            assert!(!runtime.is_observing());
        });
        assert!(runtime.is_observing());
    }

    #[test]
    fn observing_guard_restores_on_panic() {
        let runtime = Runtime::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            runtime.without_observing(|| panic!("init failed"));
        }));
        assert!(result.is_err());
        assert!(runtime.is_observing());
    }

    #[test]
    fn warnings_go_to_the_handler_unless_silent() {
        let runtime = Runtime::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        runtime.set_warn_handler(move |msg| sink.borrow_mut().push(msg.to_string()));

        runtime.warn("first");
        runtime.update_config(|c| c.silent = true);
        runtime.warn("second");

        assert_eq!(*seen.borrow(), vec!["first".to_string()]);
    }

    #[test]
    fn panicking_error_handler_is_contained() {
        let runtime = Runtime::new();
        runtime.set_error_handler(|_, _, _| panic!("handler bug"));
        runtime.report_error(&Error::user("boom"), None, "test");
    }

    #[test]
    fn untracked_hides_the_current_target() {
        let runtime = Runtime::new();
        runtime.untracked(|| assert!(!runtime.is_collecting()));
        assert_eq!(runtime.targets().depth(), 0);
    }

    #[test]
    fn weak_handle_expires_with_runtime() {
        let runtime = Runtime::new();
        let weak = runtime.downgrade();
        assert!(weak.upgrade().is_some());
        drop(runtime);
        assert!(weak.upgrade().is_none());
    }
}
