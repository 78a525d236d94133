//! Reactive property cells.
//!
//! A [`ReactiveCell`] replaces a property once its object is observed. Reads
//! register the cell's dependency with the collecting watcher; writes compare,
//! store and notify.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::Observer;
use crate::reactive::{Dep, Runtime};
use crate::value::{AccessorGet, AccessorSet, Array, Value};

/// Diagnostic hook called before a changing write is applied.
pub type WriteHook = Rc<dyn Fn()>;

/// The reactive replacement for one property.
pub struct ReactiveCell {
    dep: Dep,
    slot: RefCell<Value>,
    get: Option<AccessorGet>,
    set: Option<AccessorSet>,
    child: RefCell<Option<Observer>>,
    shallow: bool,
    on_write: Option<WriteHook>,
}

impl ReactiveCell {
    pub(crate) fn new(
        runtime: &Runtime,
        slot: Value,
        get: Option<AccessorGet>,
        set: Option<AccessorSet>,
        child: Option<Observer>,
        shallow: bool,
        on_write: Option<WriteHook>,
    ) -> Self {
        Self {
            dep: Dep::new(runtime),
            slot: RefCell::new(slot),
            get,
            set,
            child: RefCell::new(child),
            shallow,
            on_write,
        }
    }

    /// Tracked read.
    ///
    /// Besides the cell's own dependency, the collecting watcher also
    /// depends on the nested value's observer, and for arrays on every
    /// observed element reachable through nested arrays.
    pub fn read(&self) -> Value {
        let value = self.peek();
        let collecting = self.dep.runtime().is_some_and(|rt| rt.is_collecting());
        if collecting {
            self.dep.depend();
            let child = self.child.borrow().clone();
            if let Some(child) = child {
                child.dep().depend();
                if let Value::Array(array) = &value {
                    depend_array(array);
                }
            }
        }
        value
    }

    /// Untracked read.
    pub fn peek(&self) -> Value {
        match &self.get {
            Some(get) => get(),
            None => self.slot.borrow().clone(),
        }
    }

    /// Store `value` and notify, unless it is the same value already held.
    ///
    /// A getter-only accessor ignores writes.
    pub fn write(&self, value: Value) {
        if value.same_value(&self.peek()) {
            return;
        }
        if let Some(hook) = &self.on_write {
            hook();
        }
        if self.get.is_some() && self.set.is_none() {
            return;
        }

        match &self.set {
            Some(set) => set(value.clone()),
            None => *self.slot.borrow_mut() = value.clone(),
        }
        if !self.shallow {
            let child = self.dep.runtime().and_then(|rt| rt.observe(&value, false));
            *self.child.borrow_mut() = child;
        }
        self.dep.notify();
    }

    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// The observer of the value currently held, when it was observed
    /// through this cell.
    pub fn child_observer(&self) -> Option<Observer> {
        self.child.borrow().clone()
    }

    pub fn is_shallow(&self) -> bool {
        self.shallow
    }
}

impl fmt::Debug for ReactiveCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveCell")
            .field("dep", &self.dep)
            .field("accessor", &self.get.is_some())
            .field("shallow", &self.shallow)
            .finish()
    }
}

/// Depend on every observed element of `array`, recursing into nested arrays.
pub(crate) fn depend_array(array: &Array) {
    let mut seen = HashSet::new();
    depend_items(array, &mut seen);
}

fn depend_items(array: &Array, seen: &mut HashSet<usize>) {
    if !seen.insert(array.addr()) {
        return;
    }
    for item in array.to_vec() {
        if let Some(observer) = item.observer() {
            observer.dep().depend();
        }
        if let Value::Array(nested) = &item {
            depend_items(nested, seen);
        }
    }
}
