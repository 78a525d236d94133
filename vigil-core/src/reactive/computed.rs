//! Computed Values
//!
//! A [`Computed`] wraps a lazy watcher. Reading it re-evaluates only when a
//! dependency changed since the last read, and a watcher reading it inherits
//! its dependencies, so changes propagate through the computed value.
//!
//! In server-rendering mode nothing is cached: every read calls the getter
//! directly. Writes go to an optional setter.

use std::fmt;
use std::rc::Rc;

use super::owner::Owner;
use super::watcher::{WatchSource, Watcher, WatcherOptions};
use crate::error::Result;
use crate::value::Value;

/// Write handler for a computed value.
pub type Setter = Rc<dyn Fn(Value) -> Result<()>>;

/// A cached, lazily re-evaluated derived value.
#[derive(Clone)]
pub struct Computed {
    watcher: Watcher,
    setter: Option<Setter>,
}

impl Computed {
    pub fn new(owner: &Owner, getter: impl Fn(&Value) -> Result<Value> + 'static) -> Result<Self> {
        Self::build(owner, WatchSource::getter(getter), None)
    }

    /// A computed value that can also be assigned to.
    pub fn with_setter(
        owner: &Owner,
        getter: impl Fn(&Value) -> Result<Value> + 'static,
        setter: impl Fn(Value) -> Result<()> + 'static,
    ) -> Result<Self> {
        Self::build(owner, WatchSource::getter(getter), Some(Rc::new(setter)))
    }

    fn build(owner: &Owner, source: WatchSource, setter: Option<Setter>) -> Result<Self> {
        let watcher = Watcher::new(
            owner,
            source,
            None,
            WatcherOptions {
                lazy: true,
                ..Default::default()
            },
            false,
        )?;
        Ok(Self { watcher, setter })
    }

    /// Current value, evaluating first if stale.
    pub fn get(&self) -> Result<Value> {
        let runtime = self.watcher.runtime();
        if runtime.as_ref().is_some_and(|rt| rt.config().server_rendering) {
            return self.watcher.call_getter();
        }
        if self.watcher.dirty() {
            self.watcher.evaluate()?;
        }
        if runtime.is_some_and(|rt| rt.is_collecting()) {
            self.watcher.depend();
        }
        Ok(self.watcher.value())
    }

    /// Pass `value` to the setter. Without one, warns and does nothing.
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        match &self.setter {
            Some(setter) => setter(value.into()),
            None => {
                if let Some(runtime) = self.watcher.runtime() {
                    runtime.warn("Computed value was assigned to but it has no setter.");
                }
                Ok(())
            }
        }
    }

    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.watcher.dirty()
    }

    /// The underlying lazy watcher.
    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("watcher", &self.watcher)
            .field("setter", &self.setter.is_some())
            .finish()
    }
}
