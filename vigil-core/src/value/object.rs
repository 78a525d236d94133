//! Object Values
//!
//! An [`Object`] is an ordered property map behind a shared handle. Each
//! property is plain data, a user accessor, or a reactive cell installed by
//! an observer. Plain assignment through [`Object::set`] never makes a new
//! key reactive; adding reactive keys after observation goes through
//! `Runtime::set`.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::Value;
use crate::observer::{Observer, ReactiveCell};

/// Getter half of a user accessor.
pub type AccessorGet = Rc<dyn Fn() -> Value>;

/// Setter half of a user accessor.
pub type AccessorSet = Rc<dyn Fn(Value)>;

/// What sort of object this is, as far as observation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// An ordinary record. Eligible for observation.
    Plain,
    /// An owning object with its own lifecycle (for example a component).
    /// Never observed, and `Runtime::set`/`delete` refuse to add or remove keys.
    Raw,
    /// A non-plain value such as a finished render node. Never observed and
    /// skipped by deep traversal.
    Opaque,
}

/// A single property slot.
#[derive(Clone)]
pub(crate) enum Property {
    Data {
        value: Value,
        configurable: bool,
    },
    Accessor {
        get: Option<AccessorGet>,
        set: Option<AccessorSet>,
        configurable: bool,
    },
    Reactive {
        cell: Rc<ReactiveCell>,
        configurable: bool,
    },
}

impl Property {
    pub(crate) fn configurable(&self) -> bool {
        match self {
            Self::Data { configurable, .. }
            | Self::Accessor { configurable, .. }
            | Self::Reactive { configurable, .. } => *configurable,
        }
    }

    fn set_configurable(&mut self, value: bool) {
        match self {
            Self::Data { configurable, .. }
            | Self::Accessor { configurable, .. }
            | Self::Reactive { configurable, .. } => *configurable = value,
        }
    }
}

pub(crate) struct ObjectData {
    props: IndexMap<String, Property>,
    observer: Option<Observer>,
    extensible: bool,
    frozen: bool,
    kind: ObjectKind,
}

/// A shared, ordered property map.
#[derive(Clone)]
pub struct Object(Rc<RefCell<ObjectData>>);

impl Object {
    /// Create an empty plain object.
    pub fn new() -> Self {
        Self::with_kind(ObjectKind::Plain)
    }

    /// Create an empty object of the given kind.
    pub fn with_kind(kind: ObjectKind) -> Self {
        Self(Rc::new(RefCell::new(ObjectData {
            props: IndexMap::new(),
            observer: None,
            extensible: true,
            frozen: false,
            kind,
        })))
    }

    /// Create a plain object from key/value pairs.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let object = Self::new();
        {
            let mut data = object.0.borrow_mut();
            for (key, value) in entries {
                data.props.insert(
                    key.into(),
                    Property::Data {
                        value: value.into(),
                        configurable: true,
                    },
                );
            }
        }
        object
    }

    pub fn kind(&self) -> ObjectKind {
        self.0.borrow().kind
    }

    /// Read a property. Reactive cells register dependencies while a watcher
    /// is collecting. Missing keys read as `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        match self.property(key) {
            None => Value::Undefined,
            Some(Property::Data { value, .. }) => value,
            Some(Property::Accessor { get, .. }) => get.map(|g| g()).unwrap_or_default(),
            Some(Property::Reactive { cell, .. }) => cell.read(),
        }
    }

    /// Read a property without registering any dependency.
    pub fn peek(&self, key: &str) -> Value {
        match self.property(key) {
            None => Value::Undefined,
            Some(Property::Data { value, .. }) => value,
            Some(Property::Accessor { get, .. }) => get.map(|g| g()).unwrap_or_default(),
            Some(Property::Reactive { cell, .. }) => cell.peek(),
        }
    }

    /// Plain assignment.
    ///
    /// Existing reactive cells and accessor setters fire as usual. A missing
    /// key is added as plain data (if the object is extensible) and is not
    /// reactive. Writes to data properties of frozen objects are ignored.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let existing = {
            let data = self.0.borrow();
            data.props.get(key).cloned()
        };

        match existing {
            Some(Property::Reactive { cell, .. }) => cell.write(value),
            Some(Property::Accessor { set: Some(set), .. }) => set(value),
            Some(Property::Accessor { set: None, .. }) => {}
            Some(Property::Data { .. }) => {
                let mut data = self.0.borrow_mut();
                if data.frozen {
                    return;
                }
                if let Some(Property::Data { value: slot, .. }) = data.props.get_mut(key) {
                    *slot = value;
                }
            }
            None => {
                let mut data = self.0.borrow_mut();
                if data.extensible {
                    data.props.insert(
                        key.to_string(),
                        Property::Data {
                            value,
                            configurable: true,
                        },
                    );
                }
            }
        }
    }

    /// Plain delete. Returns false when the key is non-configurable.
    /// Removing an absent key succeeds.
    pub fn remove(&self, key: &str) -> bool {
        let mut data = self.0.borrow_mut();
        match data.props.get(key) {
            None => true,
            Some(prop) if !prop.configurable() => false,
            Some(_) => {
                data.props.shift_remove(key);
                true
            }
        }
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.borrow().props.contains_key(key)
    }

    /// Own keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().props.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Define (or redefine) a data property.
    pub fn define_data(&self, key: &str, value: impl Into<Value>, configurable: bool) {
        self.install(
            key,
            Property::Data {
                value: value.into(),
                configurable,
            },
        );
    }

    /// Define (or redefine) an accessor property.
    pub fn define_accessor(
        &self,
        key: &str,
        get: Option<AccessorGet>,
        set: Option<AccessorSet>,
        configurable: bool,
    ) {
        self.install(
            key,
            Property::Accessor {
                get,
                set,
                configurable,
            },
        );
    }

    /// `Some(configurable)` for an own key, `None` when absent.
    pub fn is_configurable(&self, key: &str) -> Option<bool> {
        self.0.borrow().props.get(key).map(Property::configurable)
    }

    /// The reactive cell backing `key`, if the key is reactive.
    pub fn reactive_cell(&self, key: &str) -> Option<Rc<ReactiveCell>> {
        match self.0.borrow().props.get(key) {
            Some(Property::Reactive { cell, .. }) => Some(Rc::clone(cell)),
            _ => None,
        }
    }

    /// Freeze: no new keys, data writes ignored, every property non-configurable.
    pub fn freeze(&self) {
        let mut data = self.0.borrow_mut();
        data.frozen = true;
        data.extensible = false;
        for prop in data.props.values_mut() {
            prop.set_configurable(false);
        }
    }

    /// Forbid adding new keys.
    pub fn prevent_extensions(&self) {
        self.0.borrow_mut().extensible = false;
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub fn is_extensible(&self) -> bool {
        self.0.borrow().extensible
    }

    /// The observer attached to this object, if any.
    pub fn observer(&self) -> Option<Observer> {
        self.0.borrow().observer.clone()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn attach_observer(&self, observer: Observer) {
        self.0.borrow_mut().observer = Some(observer);
    }

    pub(crate) fn property(&self, key: &str) -> Option<Property> {
        self.0.borrow().props.get(key).cloned()
    }

    pub(crate) fn install(&self, key: &str, prop: Property) {
        self.0.borrow_mut().props.insert(key.to_string(), prop);
    }

    pub(crate) fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Object")
            .field("kind", &data.kind)
            .field("keys", &data.props.keys().collect::<Vec<_>>())
            .field("observed", &data.observer.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct WeakObject(Weak<RefCell<ObjectData>>);

impl WeakObject {
    pub(crate) fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(Object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn plain_assignment_adds_and_replaces() {
        let obj = Object::new();
        obj.set("a", 1);
        assert_eq!(obj.get("a"), Value::from(1));
        obj.set("a", 2);
        assert_eq!(obj.get("a"), Value::from(2));
        assert_eq!(obj.keys(), vec!["a".to_string()]);
    }

    #[test]
    fn frozen_objects_ignore_writes() {
        let obj = Object::from_entries([("a", 1)]);
        obj.freeze();
        obj.set("a", 2);
        obj.set("b", 3);
        assert_eq!(obj.get("a"), Value::from(1));
        assert!(!obj.has_own("b"));
        assert!(!obj.remove("a"));
    }

    #[test]
    fn accessors_route_reads_and_writes() {
        let store = Rc::new(Cell::new(5.0));
        let obj = Object::new();
        let read = Rc::clone(&store);
        let write = Rc::clone(&store);
        obj.define_accessor(
            "n",
            Some(Rc::new(move || Value::from(read.get()))),
            Some(Rc::new(move |v: Value| write.set(v.as_f64().unwrap_or(0.0)))),
            true,
        );
        assert_eq!(obj.get("n"), Value::from(5));
        obj.set("n", 9);
        assert_eq!(store.get(), 9.0);
    }

    #[test]
    fn non_configurable_keys_cannot_be_removed() {
        let obj = Object::new();
        obj.define_data("fixed", 1, false);
        assert_eq!(obj.is_configurable("fixed"), Some(false));
        assert!(!obj.remove("fixed"));
        assert!(obj.remove("missing"));
    }

    #[test]
    fn keys_keep_insertion_order() {
        let obj = Object::from_entries([("z", 1), ("a", 2), ("m", 3)]);
        obj.remove("a");
        obj.set("b", 4);
        assert_eq!(obj.keys(), vec!["z", "m", "b"]);
    }
}
