//! Adding and removing reactive keys after observation.
//!
//! Plain assignment of a new key never makes it reactive. `Runtime::set`
//! defines the key as a reactive cell and notifies the container's observer,
//! and `Runtime::delete` removes a key and notifies.

use std::fmt;

use super::Observer;
use crate::reactive::Runtime;
use crate::value::{Object, ObjectKind, Value};

const MAX_INDEX: usize = u32::MAX as usize;

/// A property name or array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl Key {
    /// The key as an array index, if it is one.
    ///
    /// Numeric names count when they denote a non-negative integer, so
    /// `"2"` and `"2.0"` are both index 2. Indexes stop below `u32::MAX`,
    /// whichever form they come in.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => (*i < MAX_INDEX).then_some(*i),
            Self::Name(name) => {
                let n: f64 = name.trim().parse().ok()?;
                (n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n < MAX_INDEX as f64)
                    .then_some(n as usize)
            }
        }
    }

    /// The key as a property name.
    pub fn name(&self) -> String {
        match self {
            Self::Index(i) => i.to_string(),
            Self::Name(name) => name.clone(),
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Owning objects and root data keep a fixed key set.
fn refuses_new_keys(object: &Object, observer: Option<&Observer>) -> bool {
    object.kind() == ObjectKind::Raw || observer.is_some_and(|o| o.root_count() > 0)
}

impl Runtime {
    /// Set `key` on `target`, adding a reactive property if the key is new.
    ///
    /// Returns the value that was set.
    pub fn set(&self, target: &Value, key: impl Into<Key>, value: impl Into<Value>) -> Value {
        let key = key.into();
        let value = value.into();

        match target {
            Value::Array(array) => match key.as_index() {
                Some(index) => {
                    let max = self.config().max_array_length;
                    if index >= max || !array.grow_to(index) {
                        self.warn(&format!(
                            "Cannot set index {index} on an array: it would grow past the \
                             maximum array length of {max}"
                        ));
                        return value;
                    }
                    array.splice(index, 1, [value.clone()]);
                }
                None => self.warn(&format!("Cannot set non-index key \"{key}\" on an array")),
            },
            Value::Object(object) => {
                let name = key.name();
                if object.has_own(&name) {
                    object.set(&name, value.clone());
                    return value;
                }

                let observer = object.observer();
                if refuses_new_keys(object, observer.as_ref()) {
                    self.warn(
                        "Avoid adding reactive properties to an owner or its root data at \
                         runtime - declare it upfront instead.",
                    );
                    return value;
                }
                match observer {
                    None => object.set(&name, value.clone()),
                    Some(observer) => {
                        self.define_reactive(object, &name, Some(value.clone()), None, false);
                        observer.dep().notify();
                    }
                }
            }
            _ => self.warn(&format!(
                "Cannot set reactive property on undefined, null, or primitive value: {}",
                target.to_js_string()
            )),
        }
        value
    }

    /// Delete `key` from `target`, notifying its observer.
    pub fn delete(&self, target: &Value, key: impl Into<Key>) {
        let key = key.into();

        match target {
            Value::Array(array) => match key.as_index() {
                Some(index) => {
                    array.splice(index, 1, Vec::<Value>::new());
                }
                None => self.warn(&format!("Cannot delete non-index key \"{key}\" from an array")),
            },
            Value::Object(object) => {
                let observer = object.observer();
                if refuses_new_keys(object, observer.as_ref()) {
                    self.warn(
                        "Avoid deleting properties on an owner or its root data - just set it to null.",
                    );
                    return;
                }

                let name = key.name();
                if !object.has_own(&name) || !object.remove(&name) {
                    return;
                }
                if let Some(observer) = observer {
                    observer.dep().notify();
                }
            }
            _ => self.warn(&format!(
                "Cannot delete reactive property on undefined, null, or primitive value: {}",
                target.to_js_string()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Callback, Owner, WatchSource, Watcher, WatcherOptions};
    use crate::value::Array;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn capture_warnings(runtime: &Runtime) -> Rc<RefCell<Vec<String>>> {
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&warnings);
        runtime.set_warn_handler(move |msg| sink.borrow_mut().push(msg.to_string()));
        warnings
    }

    /// A sync watcher over `data.inner.<key>` that counts callback runs.
    fn watch_key(owner: &Owner, key: &'static str) -> Rc<Cell<usize>> {
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        Watcher::new(
            owner,
            WatchSource::getter(move |d| {
                let inner = d.as_object().map(|o| o.get("inner")).unwrap_or_default();
                Ok(inner.as_object().map(|o| o.get(key)).unwrap_or_default())
            }),
            Some(Callback::new(move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            })),
            WatcherOptions {
                sync: true,
                ..Default::default()
            },
            false,
        )
        .unwrap();
        fired
    }

    fn nested_state(runtime: &Runtime) -> (Owner, Object) {
        let inner = Object::new();
        let data = Object::from_entries([("inner", Value::Object(inner.clone()))]);
        (Owner::with_data(runtime, Value::Object(data)), inner)
    }

    #[test]
    fn oversized_array_indexes_are_refused() {
        let runtime = Runtime::new();
        runtime.update_config(|c| c.max_array_length = 100);
        let warnings = capture_warnings(&runtime);
        let list = Array::from_vec(vec![Value::from(1)]);
        let target = Value::Array(list.clone());

        runtime.set(&target, usize::MAX, 2);
        runtime.set(&target, "4000000000", 2);
        runtime.set(&target, 100usize, 2);
        assert_eq!(list.len(), 1);
        assert_eq!(warnings.borrow().len(), 3);
        assert!(warnings.borrow()[2].contains("maximum array length of 100"));

        runtime.set(&target, 99usize, 2);
        assert_eq!(list.len(), 100);
        assert_eq!(list.get(99), Value::from(2));
        assert_eq!(Key::from(usize::MAX).as_index(), None);
    }

    #[test]
    fn set_adds_a_reactive_key_and_notifies() {
        let runtime = Runtime::new();
        let (owner, inner) = nested_state(&runtime);
        let fired = watch_key(&owner, "x");

        let returned = runtime.set(&Value::Object(inner.clone()), "x", 1);
        assert_eq!(returned, Value::from(1));
        assert_eq!(fired.get(), 1);
        assert!(inner.reactive_cell("x").is_some());

        inner.set("x", 2);
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn plain_assignment_of_a_new_key_is_not_reactive() {
        let runtime = Runtime::new();
        let (owner, inner) = nested_state(&runtime);
        let fired = watch_key(&owner, "y");

        inner.set("y", 1);
        assert_eq!(fired.get(), 0);
        assert!(inner.reactive_cell("y").is_none());
    }

    #[test]
    fn set_on_arrays_grows_and_notifies() {
        let runtime = Runtime::new();
        let list = Array::new();
        let data = Object::from_entries([("list", Value::Array(list.clone()))]);
        let owner = Owner::with_data(&runtime, Value::Object(data));
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        owner
            .watch(
                "list",
                move |_, _| {
                    counter.set(counter.get() + 1);
                    Ok(())
                },
                WatcherOptions {
                    sync: true,
                    ..Default::default()
                },
            )
            .unwrap();

        runtime.set(&Value::Array(list.clone()), 2usize, "c");
        assert_eq!(list.to_vec(), vec![Value::Undefined, Value::Undefined, Value::from("c")]);
        assert_eq!(fired.get(), 1);

        runtime.set(&Value::Array(list.clone()), "0", "a");
        assert_eq!(list.get(0), Value::from("a"));
        assert_eq!(list.len(), 3);
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn delete_removes_and_notifies() {
        let runtime = Runtime::new();
        let (owner, inner) = nested_state(&runtime);
        runtime.set(&Value::Object(inner.clone()), "x", 1);
        let fired = watch_key(&owner, "x");

        runtime.delete(&Value::Object(inner.clone()), "x");
        assert!(!inner.has_own("x"));
        assert_eq!(fired.get(), 1);

        runtime.delete(&Value::Object(inner), "missing");
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn root_data_and_raw_objects_refuse_new_keys() {
        let runtime = Runtime::new();
        let warnings = capture_warnings(&runtime);
        let owner = Owner::new(&runtime);

        runtime.set(&owner.data(), "late", 1);
        runtime.delete(&owner.data(), "late");
        let raw = Value::Object(Object::with_kind(ObjectKind::Raw));
        runtime.set(&raw, "x", 1);

        assert!(!owner.data().as_object().unwrap().has_own("late"));
        assert!(!raw.as_object().unwrap().has_own("x"));
        assert_eq!(warnings.borrow().len(), 3);
    }

    #[test]
    fn primitive_targets_warn() {
        let runtime = Runtime::new();
        let warnings = capture_warnings(&runtime);

        runtime.set(&Value::Null, "a", 1);
        runtime.delete(&Value::from(3), "a");
        assert_eq!(
            *warnings.borrow(),
            vec![
                "Cannot set reactive property on undefined, null, or primitive value: null"
                    .to_string(),
                "Cannot delete reactive property on undefined, null, or primitive value: 3"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn numeric_names_are_indices() {
        assert_eq!(Key::from("3").as_index(), Some(3));
        assert_eq!(Key::from("3.0").as_index(), Some(3));
        assert_eq!(Key::from("-1").as_index(), None);
        assert_eq!(Key::from("1.5").as_index(), None);
        assert_eq!(Key::from("length").as_index(), None);
    }
}
