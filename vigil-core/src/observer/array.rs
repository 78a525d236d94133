//! Array mutation interception.
//!
//! Observed arrays dispatch through [`InterceptedArrayMethods`]: each
//! operation runs natively, newly inserted items are observed, and the
//! array's observer is notified once.

use std::cmp::Ordering;

use crate::value::{Array, ArrayMethods, NativeArrayMethods, Value};

/// The mutation record installed on observed arrays.
pub struct InterceptedArrayMethods;

pub(crate) static INTERCEPTED: InterceptedArrayMethods = InterceptedArrayMethods;

fn after_mutation(array: &Array, inserted: &[Value]) {
    let Some(observer) = array.observer() else {
        return;
    };
    if !inserted.is_empty() {
        if let Some(runtime) = observer.dep().runtime() {
            runtime.observe_items(inserted);
        }
    }
    observer.dep().notify();
}

impl ArrayMethods for InterceptedArrayMethods {
    fn push(&self, array: &Array, items: Vec<Value>) -> usize {
        let len = NativeArrayMethods.push(array, items.clone());
        after_mutation(array, &items);
        len
    }

    fn pop(&self, array: &Array) -> Value {
        let removed = NativeArrayMethods.pop(array);
        after_mutation(array, &[]);
        removed
    }

    fn shift(&self, array: &Array) -> Value {
        let removed = NativeArrayMethods.shift(array);
        after_mutation(array, &[]);
        removed
    }

    fn unshift(&self, array: &Array, items: Vec<Value>) -> usize {
        let len = NativeArrayMethods.unshift(array, items.clone());
        after_mutation(array, &items);
        len
    }

    fn splice(
        &self,
        array: &Array,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Vec<Value> {
        let removed = NativeArrayMethods.splice(array, start, delete_count, items.clone());
        after_mutation(array, &items);
        removed
    }

    fn sort(&self, array: &Array, compare: &dyn Fn(&Value, &Value) -> Ordering) {
        NativeArrayMethods.sort(array, compare);
        after_mutation(array, &[]);
    }

    fn reverse(&self, array: &Array) {
        NativeArrayMethods.reverse(array);
        after_mutation(array, &[]);
    }

    fn intercepts(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Callback, Owner, Runtime, WatchSource, Watcher, WatcherOptions};
    use crate::value::Object;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_watcher(owner: &Owner, fired: &Rc<Cell<usize>>) -> Watcher {
        let counter = Rc::clone(fired);
        Watcher::new(
            owner,
            WatchSource::getter(|d| Ok(d.as_object().map(|o| o.get("list")).unwrap_or_default())),
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
        .unwrap()
    }

    #[test]
    fn each_mutation_notifies_once_and_returns_the_native_result() {
        let runtime = Runtime::new();
        let list = Array::from_vec(vec![Value::from(3), Value::from(1), Value::from(2)]);
        let data = Object::from_entries([("list", Value::Array(list.clone()))]);
        let owner = Owner::with_data(&runtime, Value::Object(data));
        let fired = Rc::new(Cell::new(0));
        let _watcher = counting_watcher(&owner, &fired);

        assert_eq!(list.push([Value::from(4), Value::from(5)]), 5);
        assert_eq!(fired.get(), 1);
        assert_eq!(list.pop(), Value::from(5));
        assert_eq!(list.shift(), Value::from(3));
        assert_eq!(list.unshift([Value::from(0)]), 4);
        assert_eq!(list.splice(1, 2, [Value::from(9)]), vec![Value::from(1), Value::from(2)]);
        list.sort();
        list.reverse();
        assert_eq!(fired.get(), 7);
        assert_eq!(
            list.to_vec(),
            vec![Value::from(9), Value::from(4), Value::from(0)]
        );
    }

    #[test]
    fn inserted_items_become_reactive() {
        let runtime = Runtime::new();
        let list = Array::new();
        runtime.observe(&Value::Array(list.clone()), false);

        let pushed = Object::from_entries([("a", 1)]);
        let spliced = Object::from_entries([("b", 2)]);
        list.push([Value::Object(pushed.clone())]);
        list.splice(0, 0, [Value::Object(spliced.clone())]);

        assert!(pushed.observer().is_some());
        assert!(spliced.observer().is_some());
        assert!(pushed.reactive_cell("a").is_some());
    }
}
