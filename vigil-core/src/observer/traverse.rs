//! Deep traversal for deep watchers.

use std::collections::HashSet;

use crate::reactive::DepId;
use crate::value::{ObjectKind, Value};

#[derive(Default)]
struct Seen {
    observed: HashSet<DepId>,
    plain: HashSet<usize>,
}

/// Read every reachable member of `value` so the collecting watcher
/// subscribes to every nested reactive cell.
///
/// Frozen values and opaque objects are skipped. Observed containers are
/// visited once per call, keyed by their observer's dependency.
pub fn traverse(value: &Value) {
    let mut seen = Seen::default();
    walk(value, &mut seen);
}

fn first_visit(value: &Value, addr: usize, seen: &mut Seen) -> bool {
    match value.observer() {
        Some(observer) => seen.observed.insert(observer.dep().id()),
        None => seen.plain.insert(addr),
    }
}

fn walk(value: &Value, seen: &mut Seen) {
    match value {
        Value::Array(array) => {
            if array.is_frozen() || !first_visit(value, array.addr(), seen) {
                return;
            }
            for item in array.to_vec() {
                walk(&item, seen);
            }
        }
        Value::Object(object) => {
            if object.is_frozen()
                || object.kind() == ObjectKind::Opaque
                || !first_visit(value, object.addr(), seen)
            {
                return;
            }
            for key in object.keys() {
                walk(&object.get(&key), seen);
            }
        }
        _ => {}
    }
}
