//! Owner Context
//!
//! An [`Owner`] stands in for the component instance that watchers belong
//! to: it holds the root data object, keeps its watchers alive, and tears
//! them all down when destroyed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::computed::Computed;
use super::runtime::Runtime;
use super::watcher::{Callback, WatchSource, Watcher, WatcherOptions};
use crate::error::Result;
use crate::observer::WriteHook;
use crate::value::{Object, Value};

struct OwnerInner {
    runtime: Runtime,
    data: Value,
    watchers: RefCell<Vec<Watcher>>,
    render_watcher: RefCell<Option<Watcher>>,
    being_destroyed: Cell<bool>,
    destroyed: Cell<bool>,
}

/// The context a group of watchers belongs to.
#[derive(Clone)]
pub struct Owner {
    inner: Rc<OwnerInner>,
}

impl Owner {
    /// Create an owner with an empty, observed data object.
    pub fn new(runtime: &Runtime) -> Self {
        Self::with_data(runtime, Value::Object(Object::new()))
    }

    /// Create an owner around `data`, observing it as root data.
    pub fn with_data(runtime: &Runtime, data: Value) -> Self {
        runtime.observe(&data, true);
        Self {
            inner: Rc::new(OwnerInner {
                runtime: runtime.clone(),
                data,
                watchers: RefCell::new(Vec::new()),
                render_watcher: RefCell::new(None),
                being_destroyed: Cell::new(false),
                destroyed: Cell::new(false),
            }),
        }
    }

    /// The root data value getters receive.
    pub fn data(&self) -> Value {
        self.inner.data.clone()
    }

    pub fn runtime(&self) -> Runtime {
        self.inner.runtime.clone()
    }

    /// Watchers registered with this owner, in creation order.
    pub fn watchers(&self) -> Vec<Watcher> {
        self.inner.watchers.borrow().clone()
    }

    pub fn render_watcher(&self) -> Option<Watcher> {
        self.inner.render_watcher.borrow().clone()
    }

    pub fn is_being_destroyed(&self) -> bool {
        self.inner.being_destroyed.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Watch `source` and call `callback` with `(new, old)` on change.
    ///
    /// The watcher is always a user watcher. With `options.immediate` the
    /// callback also runs once right away with the initial value. Call
    /// `teardown()` on the returned watcher to stop watching.
    pub fn watch(
        &self,
        source: impl Into<WatchSource>,
        callback: impl Fn(&Value, &Value) -> Result<()> + 'static,
        options: WatcherOptions,
    ) -> Result<Watcher> {
        let options = WatcherOptions {
            user: true,
            ..options
        };
        let immediate = options.immediate;
        let callback = Callback::new(callback);
        let watcher = Watcher::new(self, source.into(), Some(callback.clone()), options, false)?;

        if immediate {
            let value = watcher.value();
            let result = self
                .inner
                .runtime
                .untracked(|| callback.call(&value, &Value::Undefined));
            if let Err(err) = result {
                let info = format!("callback for immediate watcher \"{}\"", watcher.expression());
                self.inner.runtime.report_error(&err, Some(self), &info);
            }
        }
        Ok(watcher)
    }

    /// A cached value derived from this owner's data.
    pub fn computed(&self, getter: impl Fn(&Value) -> Result<Value> + 'static) -> Result<Computed> {
        Computed::new(self, getter)
    }

    /// Like [`Owner::computed`], with a handler for assignments.
    pub fn computed_with_setter(
        &self,
        getter: impl Fn(&Value) -> Result<Value> + 'static,
        setter: impl Fn(Value) -> Result<()> + 'static,
    ) -> Result<Computed> {
        Computed::with_setter(self, getter, setter)
    }

    /// Define `key` on the data object as a reactive property holding an
    /// injected value. The value itself is not observed, and writing to the
    /// property warns.
    pub fn inject(&self, key: &str, value: impl Into<Value>) {
        let Some(data) = self.inner.data.as_object() else {
            self.inner
                .runtime
                .warn(&format!("Cannot inject \"{key}\": owner data is not an object"));
            return;
        };

        let runtime = self.inner.runtime.downgrade();
        let name = key.to_string();
        let on_write: WriteHook = Rc::new(move || {
            if let Some(runtime) = runtime.upgrade() {
                runtime.warn(&format!(
                    "Avoid mutating an injected value directly since the changes will be \
                     overwritten whenever the provider re-renders. injection being mutated: \"{name}\""
                ));
            }
        });

        let value = value.into();
        self.inner.runtime.without_observing(|| {
            self.inner
                .runtime
                .define_reactive(data, key, Some(value), Some(on_write), false);
        });
    }

    /// Tear down every watcher. Idempotent.
    pub fn destroy(&self) {
        if self.inner.being_destroyed.replace(true) {
            return;
        }
        tracing::debug!(watchers = self.inner.watchers.borrow().len(), "destroying owner");

        if let Some(render) = self.render_watcher() {
            render.teardown();
        }
        let watchers = std::mem::take(&mut *self.inner.watchers.borrow_mut());
        for watcher in watchers.iter().rev() {
            watcher.teardown();
        }
        if let Some(observer) = self.inner.data.observer() {
            observer.release_root();
        }
        self.inner.destroyed.set(true);
    }

    pub(crate) fn register_watcher(&self, watcher: &Watcher, is_render_watcher: bool) {
        if is_render_watcher {
            *self.inner.render_watcher.borrow_mut() = Some(watcher.clone());
        }
        self.inner.watchers.borrow_mut().push(watcher.clone());
    }

    pub(crate) fn remove_watcher(&self, watcher: &Watcher) {
        let mut watchers = self.inner.watchers.borrow_mut();
        if let Some(pos) = watchers.iter().position(|w| w.id() == watcher.id()) {
            watchers.remove(pos);
        }
    }

    pub(crate) fn downgrade(&self) -> WeakOwner {
        WeakOwner(Rc::downgrade(&self.inner))
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("watchers", &self.inner.watchers.borrow().len())
            .field("being_destroyed", &self.inner.being_destroyed.get())
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct WeakOwner(Weak<OwnerInner>);

impl WeakOwner {
    pub(crate) fn upgrade(&self) -> Option<Owner> {
        self.0.upgrade().map(|inner| Owner { inner })
    }
}
