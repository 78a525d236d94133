//! Array Values
//!
//! An [`Array`] dispatches its seven mutating operations through an
//! [`ArrayMethods`] record. Unobserved arrays use [`NativeArrayMethods`];
//! observing an array swaps in an intercepting record for that instance
//! only, so no other array is affected.
//!
//! Index reads ([`Array::get`], [`Array::to_vec`]) never track dependencies.
//! Element-level tracking happens through the property that holds the array.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};

use super::Value;
use crate::observer::Observer;

/// The mutating operations an array routes through its dispatch record.
///
/// Implementations receive the array handle so they can call the raw
/// operations and look up the attached observer.
pub trait ArrayMethods: Sync {
    fn push(&self, array: &Array, items: Vec<Value>) -> usize;
    fn pop(&self, array: &Array) -> Value;
    fn shift(&self, array: &Array) -> Value;
    fn unshift(&self, array: &Array, items: Vec<Value>) -> usize;
    fn splice(&self, array: &Array, start: usize, delete_count: usize, items: Vec<Value>)
        -> Vec<Value>;
    fn sort(&self, array: &Array, compare: &dyn Fn(&Value, &Value) -> Ordering);
    fn reverse(&self, array: &Array);

    /// Whether this record does more than the native operations.
    fn intercepts(&self) -> bool {
        false
    }
}

/// The unintercepted operations.
pub struct NativeArrayMethods;

pub(crate) static NATIVE: NativeArrayMethods = NativeArrayMethods;

impl ArrayMethods for NativeArrayMethods {
    fn push(&self, array: &Array, items: Vec<Value>) -> usize {
        let mut data = array.0.borrow_mut();
        if !data.frozen {
            data.items.extend(items);
        }
        data.items.len()
    }

    fn pop(&self, array: &Array) -> Value {
        let mut data = array.0.borrow_mut();
        if data.frozen {
            return Value::Undefined;
        }
        data.items.pop().unwrap_or_default()
    }

    fn shift(&self, array: &Array) -> Value {
        let mut data = array.0.borrow_mut();
        if data.frozen || data.items.is_empty() {
            return Value::Undefined;
        }
        data.items.remove(0)
    }

    fn unshift(&self, array: &Array, items: Vec<Value>) -> usize {
        let mut data = array.0.borrow_mut();
        if !data.frozen {
            data.items.splice(0..0, items);
        }
        data.items.len()
    }

    fn splice(
        &self,
        array: &Array,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Vec<Value> {
        let mut data = array.0.borrow_mut();
        if data.frozen {
            return Vec::new();
        }
        let len = data.items.len();
        let start = start.min(len);
        let end = start + delete_count.min(len - start);
        data.items.splice(start..end, items).collect()
    }

    fn sort(&self, array: &Array, compare: &dyn Fn(&Value, &Value) -> Ordering) {
        // Sort outside the borrow so the comparator may read the array.
        let mut items = {
            let mut data = array.0.borrow_mut();
            if data.frozen {
                return;
            }
            std::mem::take(&mut data.items)
        };
        items.sort_by(|a, b| compare(a, b));
        array.0.borrow_mut().items = items;
    }

    fn reverse(&self, array: &Array) {
        let mut data = array.0.borrow_mut();
        if !data.frozen {
            data.items.reverse();
        }
    }
}

pub(crate) struct ArrayData {
    items: Vec<Value>,
    observer: Option<Observer>,
    extensible: bool,
    frozen: bool,
    methods: &'static dyn ArrayMethods,
}

/// A shared, growable list of values.
#[derive(Clone)]
pub struct Array(Rc<RefCell<ArrayData>>);

impl Array {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(ArrayData {
            items,
            observer: None,
            extensible: true,
            frozen: false,
            methods: &NATIVE,
        })))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, or `Undefined` when out of bounds. Never tracks.
    pub fn get(&self, index: usize) -> Value {
        self.0.borrow().items.get(index).cloned().unwrap_or_default()
    }

    /// Snapshot of the elements. Never tracks.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().items.clone()
    }

    /// Plain index assignment. Not intercepted: observers are not notified
    /// and the value is not observed. Writing past the end pads with
    /// `Undefined` when the array is extensible.
    pub fn assign(&self, index: usize, value: impl Into<Value>) {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return;
        }
        if index < data.items.len() {
            data.items[index] = value.into();
        } else if data.extensible {
            data.items.resize(index, Value::Undefined);
            data.items.push(value.into());
        }
    }

    /// Append items; returns the new length.
    pub fn push(&self, items: impl IntoIterator<Item = Value>) -> usize {
        let methods = self.methods();
        methods.push(self, items.into_iter().collect())
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Value {
        let methods = self.methods();
        methods.pop(self)
    }

    /// Remove and return the first item.
    pub fn shift(&self) -> Value {
        let methods = self.methods();
        methods.shift(self)
    }

    /// Prepend items; returns the new length.
    pub fn unshift(&self, items: impl IntoIterator<Item = Value>) -> usize {
        let methods = self.methods();
        methods.unshift(self, items.into_iter().collect())
    }

    /// Remove `delete_count` items at `start` and insert `items` there.
    /// Returns the removed items. `start` and `delete_count` are clamped.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        let methods = self.methods();
        methods.splice(self, start, delete_count, items.into_iter().collect())
    }

    /// Sort by host string order, `Undefined` last.
    pub fn sort(&self) {
        self.sort_by(default_order);
    }

    /// Stable sort with a comparator.
    pub fn sort_by(&self, compare: impl Fn(&Value, &Value) -> Ordering) {
        let methods = self.methods();
        methods.sort(self, &compare);
    }

    pub fn reverse(&self) {
        let methods = self.methods();
        methods.reverse(self);
    }

    pub fn freeze(&self) {
        let mut data = self.0.borrow_mut();
        data.frozen = true;
        data.extensible = false;
    }

    pub fn prevent_extensions(&self) {
        self.0.borrow_mut().extensible = false;
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub fn is_extensible(&self) -> bool {
        self.0.borrow().extensible
    }

    /// The observer attached to this array, if any.
    pub fn observer(&self) -> Option<Observer> {
        self.0.borrow().observer.clone()
    }

    /// Whether mutations currently go through something other than the
    /// native record.
    pub fn is_intercepted(&self) -> bool {
        self.methods().intercepts()
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Pad with `Undefined` up to `len` without going through interception.
    /// Returns false when the storage cannot be reserved.
    pub(crate) fn grow_to(&self, len: usize) -> bool {
        let mut data = self.0.borrow_mut();
        if data.frozen || data.items.len() >= len {
            return true;
        }
        let extra = len - data.items.len();
        if data.items.try_reserve(extra).is_err() {
            return false;
        }
        data.items.resize(len, Value::Undefined);
        true
    }

    pub(crate) fn attach_observer(&self, observer: Observer, methods: &'static dyn ArrayMethods) {
        let mut data = self.0.borrow_mut();
        data.observer = Some(observer);
        data.methods = methods;
    }

    pub(crate) fn downgrade(&self) -> WeakArray {
        WeakArray(Rc::downgrade(&self.0))
    }

    fn methods(&self) -> &'static dyn ArrayMethods {
        self.0.borrow().methods
    }
}

fn default_order(a: &Value, b: &Value) -> Ordering {
    match (a.is_undefined(), b.is_undefined()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.to_js_string().cmp(&b.to_js_string()),
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Array")
            .field("len", &data.items.len())
            .field("observed", &data.observer.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct WeakArray(Weak<RefCell<ArrayData>>);

impl WeakArray {
    pub(crate) fn upgrade(&self) -> Option<Array> {
        self.0.upgrade().map(Array)
    }
}
