//! Observation
//!
//! Observing a value makes it reactive in place:
//!
//! - a plain object has every own property replaced by a [`ReactiveCell`],
//! - an array switches to the intercepting mutation record and has every
//!   element observed,
//! - either way the value is tagged with an [`Observer`] that owns one
//!   container-level [`Dep`], notified on structural changes (array
//!   mutations, keys added or removed through `Runtime::set`/`delete`).
//!
//! Observation is recursive and idempotent: observing an already observed
//! value returns its existing observer.

mod array;
mod cell;
mod mutate;
mod traverse;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

pub use array::InterceptedArrayMethods;
pub use cell::{ReactiveCell, WriteHook};
pub use mutate::Key;
pub use traverse::traverse;

use crate::reactive::{Dep, Runtime};
use crate::value::{AccessorGet, AccessorSet, Object, ObjectKind, Property, Value, WeakValue};

struct ObserverInner {
    dep: Dep,
    root_count: Cell<usize>,
    value: WeakValue,
}

/// The tag attached to an observed object or array.
#[derive(Clone)]
pub struct Observer {
    inner: Rc<ObserverInner>,
}

impl Observer {
    fn attach(runtime: &Runtime, value: &Value) -> Option<Self> {
        let weak = match value {
            Value::Object(object) => WeakValue::Object(object.downgrade()),
            Value::Array(array) => WeakValue::Array(array.downgrade()),
            _ => return None,
        };
        let observer = Self {
            inner: Rc::new(ObserverInner {
                dep: Dep::new(runtime),
                root_count: Cell::new(0),
                value: weak,
            }),
        };

        match value {
            Value::Array(list) => {
                list.attach_observer(observer.clone(), &array::INTERCEPTED);
                runtime.observe_items(&list.to_vec());
            }
            Value::Object(object) => {
                object.attach_observer(observer.clone());
                for key in object.keys() {
                    runtime.define_reactive(object, &key, None, None, false);
                }
            }
            _ => {}
        }
        Some(observer)
    }

    /// The container-level dependency.
    pub fn dep(&self) -> &Dep {
        &self.inner.dep
    }

    /// How many owners use the observed value as their root data.
    pub fn root_count(&self) -> usize {
        self.inner.root_count.get()
    }

    /// The observed value, if it is still alive.
    pub fn value(&self) -> Option<Value> {
        self.inner.value.upgrade()
    }

    pub fn ptr_eq(&self, other: &Observer) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn retain_root(&self) {
        self.inner.root_count.set(self.inner.root_count.get() + 1);
    }

    pub(crate) fn release_root(&self) {
        self.inner
            .root_count
            .set(self.inner.root_count.get().saturating_sub(1));
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("dep", &self.inner.dep.id())
            .field("root_count", &self.inner.root_count.get())
            .finish()
    }
}

impl Runtime {
    /// Observe `value`, returning its observer.
    ///
    /// An already observed value returns its existing observer. Otherwise an
    /// observer is only created for plain objects and arrays that are
    /// extensible, while observing is enabled and outside server rendering.
    /// With `as_root_data` the observer's root counter is incremented.
    pub fn observe(&self, value: &Value, as_root_data: bool) -> Option<Observer> {
        let observer = match value.observer() {
            Some(existing) => Some(existing),
            None if self.may_observe(value) => Observer::attach(self, value),
            None => None,
        };
        if as_root_data {
            if let Some(observer) = &observer {
                observer.retain_root();
            }
        }
        observer
    }

    fn may_observe(&self, value: &Value) -> bool {
        if !self.is_observing() || self.config().server_rendering {
            return false;
        }
        match value {
            Value::Object(object) => {
                object.kind() == ObjectKind::Plain && object.is_extensible() && !object.is_frozen()
            }
            Value::Array(array) => array.is_extensible() && !array.is_frozen(),
            _ => false,
        }
    }

    /// Observe each of `items`.
    pub fn observe_items(&self, items: &[Value]) {
        for item in items {
            self.observe(item, false);
        }
    }

    /// Install a reactive cell for `key` on `object`.
    ///
    /// `initial` overrides the current value. A non-configurable property is
    /// left untouched. An existing accessor keeps routing reads and writes
    /// through its getter and setter; one with only a getter ignores writes.
    /// With `shallow`, neither the value nor later assignments are observed.
    pub fn define_reactive(
        &self,
        object: &Object,
        key: &str,
        initial: Option<Value>,
        on_write: Option<WriteHook>,
        shallow: bool,
    ) {
        let existing = object.property(key);
        if existing.as_ref().is_some_and(|p| !p.configurable()) {
            return;
        }
        if existing.is_none() && !object.is_extensible() {
            return;
        }

        let (slot, get, set): (Value, Option<AccessorGet>, Option<AccessorSet>) = match existing {
            None => (Value::Undefined, None, None),
            Some(Property::Data { value, .. }) => (value, None, None),
            Some(Property::Accessor { get, set, .. }) => (Value::Undefined, get, set),
            Some(Property::Reactive { cell, .. }) => {
                let reader = Rc::clone(&cell);
                let get: AccessorGet = Rc::new(move || reader.read());
                let set: AccessorSet = Rc::new(move |v: Value| cell.write(v));
                (Value::Undefined, Some(get), Some(set))
            }
        };

        // The initial value seeds the slot; an accessor with a setter is read
        // once so its current value can be observed.
        let value = match initial {
            Some(value) => value,
            None if get.is_none() => slot.clone(),
            None if set.is_some() => get.as_ref().map(|g| g()).unwrap_or_default(),
            None => Value::Undefined,
        };
        let slot = if get.is_none() { value.clone() } else { slot };
        let child = if shallow { None } else { self.observe(&value, false) };

        let cell = ReactiveCell::new(self, slot, get, set, child, shallow, on_write);
        object.install(
            key,
            Property::Reactive {
                cell: Rc::new(cell),
                configurable: true,
            },
        );
    }
}
