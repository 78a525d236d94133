//! Deferred callbacks.
//!
//! `Runtime::next_tick` appends a callback to a FIFO queue. The first
//! callback queued after a flush asks the runtime's [`TickDriver`] for a new
//! flush; everything queued before that flush happens runs in it, in order.
//!
//! Flushing takes the whole queue before running anything, so callbacks
//! queued by a running callback wait for the next flush. Each callback runs
//! in isolation: an error or panic is reported and the rest still run.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tokio::sync::{oneshot, Notify};

use crate::error::{Error, Result};
use crate::reactive::Runtime;

/// Decides when queued tick callbacks get flushed.
pub trait TickDriver {
    /// Called once each time the queue goes from empty to non-empty.
    fn request_flush(&self);

    /// Whether flushes happen on a microtask-like continuation of the
    /// current task.
    fn uses_microtask(&self) -> bool {
        false
    }

    /// Wake-up signal awaited by `Runtime::drive`, for async drivers.
    fn notifier(&self) -> Option<Rc<Notify>> {
        None
    }
}

/// Flushes only when `Runtime::flush_ticks` is called.
#[derive(Debug, Default)]
pub struct ManualDriver;

impl TickDriver for ManualDriver {
    fn request_flush(&self) {
        tracing::trace!("tick flush requested");
    }
}

/// Wakes a `Runtime::drive` loop running on a tokio executor.
#[derive(Debug, Default)]
pub struct TokioDriver {
    notify: Rc<Notify>,
}

impl TokioDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TickDriver for TokioDriver {
    fn request_flush(&self) {
        self.notify.notify_one();
    }

    fn uses_microtask(&self) -> bool {
        true
    }

    fn notifier(&self) -> Option<Rc<Notify>> {
        Some(Rc::clone(&self.notify))
    }
}

enum TickCallback {
    Call(Box<dyn FnOnce() -> Result<()>>),
    Resolve(oneshot::Sender<()>),
}

pub(crate) struct TickQueue {
    callbacks: RefCell<Vec<TickCallback>>,
    pending: Cell<bool>,
    driver: Box<dyn TickDriver>,
}

impl TickQueue {
    pub(crate) fn new(driver: Box<dyn TickDriver>) -> Self {
        Self {
            callbacks: RefCell::new(Vec::new()),
            pending: Cell::new(false),
            driver,
        }
    }

    fn push(&self, callback: TickCallback) {
        self.callbacks.borrow_mut().push(callback);
        if !self.pending.replace(true) {
            self.driver.request_flush();
        }
    }
}

/// Resolves after the tick flush that follows its creation.
pub struct NextTick {
    rx: oneshot::Receiver<()>,
}

impl Future for NextTick {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| Error::TickCancelled))
    }
}

impl fmt::Debug for NextTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NextTick").finish_non_exhaustive()
    }
}

impl Runtime {
    /// Run `callback` on the next tick flush.
    pub fn next_tick(&self, callback: impl FnOnce() -> Result<()> + 'static) {
        self.ticks().push(TickCallback::Call(Box::new(callback)));
    }

    /// A future that resolves once the next tick flush has run.
    pub fn tick(&self) -> NextTick {
        let (tx, rx) = oneshot::channel();
        self.ticks().push(TickCallback::Resolve(tx));
        NextTick { rx }
    }

    /// Whether the tick driver flushes on a microtask-like continuation.
    pub fn is_using_microtask(&self) -> bool {
        self.ticks().driver.uses_microtask()
    }

    /// Whether a flush has been requested and not run yet.
    pub fn has_pending_ticks(&self) -> bool {
        self.ticks().pending.get()
    }

    /// Run every callback queued so far. Returns how many ran.
    pub fn flush_ticks(&self) -> usize {
        let ticks = self.ticks();
        ticks.pending.set(false);
        let callbacks = std::mem::take(&mut *ticks.callbacks.borrow_mut());
        let count = callbacks.len();
        if count > 0 {
            tracing::debug!(callbacks = count, "flushing tick queue");
        }

        for callback in callbacks {
            match callback {
                TickCallback::Call(f) => {
                    let error = match panic::catch_unwind(AssertUnwindSafe(f)) {
                        Ok(Ok(())) => None,
                        Ok(Err(err)) => Some(err),
                        Err(payload) => Some(Error::from_panic(payload)),
                    };
                    if let Some(err) = error {
                        self.report_error(&err, None, "nextTick");
                    }
                }
                TickCallback::Resolve(tx) => {
                    let _ = tx.send(());
                }
            }
        }
        count
    }

    /// Flush ticks whenever the driver signals, forever.
    ///
    /// Only async drivers provide a signal; with any other driver this
    /// returns immediately after a warning.
    pub async fn drive(&self) {
        let Some(notify) = self.ticks().driver.notifier() else {
            self.warn("Runtime::drive needs an async tick driver");
            return;
        };
        loop {
            notify.notified().await;
            self.flush_ticks();
        }
    }
}
