//! Dynamic Values
//!
//! The reactive engine works over a small dynamic value model: primitives,
//! plus shared [`Object`] and [`Array`] handles. Objects and arrays have
//! reference semantics: cloning a handle aliases the same storage, and
//! identity comparisons use pointer equality.
//!
//! Reads through [`Object::get`] go through reactive cells and therefore
//! register dependencies while a watcher is collecting. [`Object::peek`] and
//! [`Array::get`] never track.

mod array;
mod object;

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

pub use array::{Array, ArrayMethods, NativeArrayMethods};
pub use object::{AccessorGet, AccessorSet, Object, ObjectKind};

pub(crate) use array::WeakArray;
pub(crate) use object::{Property, WeakObject};

use crate::observer::Observer;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Object),
    Array(Array),
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        Self::String(Rc::from(s.as_ref()))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// `Undefined` or `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// True for objects and arrays, the values compared by reference.
    pub fn is_object_like(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Array(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The observer attached to this value, if it is an observed object or array.
    pub fn observer(&self) -> Option<Observer> {
        match self {
            Self::Object(o) => o.observer(),
            Self::Array(a) => a.observer(),
            _ => None,
        }
    }

    /// Identity comparison used for change detection.
    ///
    /// Objects and arrays compare by reference, strings by content, and a
    /// `NaN` number is considered the same as another `NaN`.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Deep comparison of contents. Never registers dependencies.
    pub fn structural_eq(&self, other: &Value) -> bool {
        let mut seen = HashSet::new();
        structural_eq(self, other, &mut seen)
    }

    /// Host-style string conversion, used by the default array sort order.
    ///
    /// An array nested inside itself renders as an empty string.
    pub fn to_js_string(&self) -> String {
        let mut open = HashSet::new();
        js_string(self, &mut open)
    }

    /// Build a value tree from JSON. The result is not observed.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::string(s),
            serde_json::Value::Array(items) => {
                Self::Array(Array::from_vec(items.into_iter().map(Self::from_json).collect()))
            }
            serde_json::Value::Object(map) => Self::Object(Object::from_entries(
                map.into_iter().map(|(k, v)| (k, Self::from_json(v))),
            )),
        }
    }

    /// Snapshot the value as JSON without registering dependencies.
    ///
    /// `Undefined` and non-finite numbers become `null`. The value graph must
    /// be acyclic.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serde_json::Value::Number(serde_json::Number::from(*n as i64))
            }
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.to_string()),
            Self::Array(a) => {
                serde_json::Value::Array(a.to_vec().iter().map(Self::to_json).collect())
            }
            Self::Object(o) => serde_json::Value::Object(
                o.keys()
                    .into_iter()
                    .map(|k| {
                        let v = o.peek(&k).to_json();
                        (k, v)
                    })
                    .collect(),
            ),
        }
    }
}

fn structural_eq(a: &Value, b: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            if x.ptr_eq(y) || !seen.insert((x.addr(), y.addr())) {
                return true;
            }
            let keys = x.keys();
            keys == y.keys()
                && keys
                    .iter()
                    .all(|k| structural_eq(&x.peek(k), &y.peek(k), seen))
        }
        (Value::Array(x), Value::Array(y)) => {
            if x.ptr_eq(y) || !seen.insert((x.addr(), y.addr())) {
                return true;
            }
            let (xs, ys) = (x.to_vec(), y.to_vec());
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|(l, r)| structural_eq(l, r, seen))
        }
        _ => a.same_value(b),
    }
}

fn js_string(value: &Value, open: &mut HashSet<usize>) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.to_string(),
        Value::Object(_) => "[object Object]".to_string(),
        Value::Array(a) => {
            // `open` holds the arrays currently being joined.
            if !open.insert(a.addr()) {
                return String::new();
            }
            let joined = a
                .to_vec()
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { js_string(v, open) })
                .collect::<Vec<_>>()
                .join(",");
            open.remove(&a.addr());
            joined
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Object(o) => o.fmt(f),
            Self::Array(a) => a.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::string(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Self::Array(a)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(Array::from_vec(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Weak back-reference from an observer to the value it is attached to.
#[derive(Clone)]
pub(crate) enum WeakValue {
    Object(WeakObject),
    Array(WeakArray),
}

impl WeakValue {
    pub(crate) fn upgrade(&self) -> Option<Value> {
        match self {
            Self::Object(o) => o.upgrade().map(Value::Object),
            Self::Array(a) => a.upgrade().map(Value::Array),
        }
    }
}
