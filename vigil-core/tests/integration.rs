//! Integration Tests for the Reactive System
//!
//! These tests verify that observation, watchers and the schedulers work
//! together correctly through the public API.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;
use vigil_core::{
    Array, Computed, Config, Equality, Error, Object, Owner, Runtime, TickDriverKind, Value,
    WatchSource, Watcher, WatcherOptions,
};

/// Build an owner whose root data comes from a JSON document.
fn owner_from_json(runtime: &Runtime, json: serde_json::Value) -> (Owner, Object) {
    let data = Value::from_json(json);
    let object = data.as_object().cloned().expect("root must be an object");
    (Owner::with_data(runtime, data), object)
}

fn sync() -> WatcherOptions {
    WatcherOptions {
        sync: true,
        ..Default::default()
    }
}

/// Record every `(new, old)` pair a watcher reports.
fn recorder() -> (
    Rc<RefCell<Vec<(Value, Value)>>>,
    impl Fn(&Value, &Value) -> vigil_core::Result<()>,
) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    (log, move |new: &Value, old: &Value| {
        sink.borrow_mut().push((new.clone(), old.clone()));
        Ok(())
    })
}

fn field(data: &Value, key: &str) -> Value {
    data.as_object().map(|o| o.get(key)).unwrap_or_default()
}

/// Test that a watcher's subscriptions match exactly what it read last time.
#[test]
fn subscriptions_match_the_last_evaluation() {
    let runtime = Runtime::new();
    let (owner, state) = owner_from_json(&runtime, json!({"use_a": true, "a": 1, "b": 2}));

    let watcher = Watcher::new(
        &owner,
        WatchSource::getter(|d| {
            Ok(if field(d, "use_a").as_bool() == Some(true) {
                field(d, "a")
            } else {
                field(d, "b")
            })
        }),
        None,
        sync(),
        false,
    )
    .unwrap();

    let subs = |key: &str| state.reactive_cell(key).unwrap().dep().subscriber_count();
    assert_eq!((subs("use_a"), subs("a"), subs("b")), (1, 1, 0));

    // Switching branches drops the old subscription
    state.set("use_a", false);
    assert_eq!((subs("use_a"), subs("a"), subs("b")), (1, 0, 1));
    assert_eq!(watcher.value(), Value::from(2));

    // Writes to the abandoned branch no longer reach the watcher
    state.set("a", 100);
    assert_eq!(watcher.value(), Value::from(2));
}

/// Test that a queued watcher runs at most once per flush.
#[test]
fn queued_watcher_runs_once_per_flush() {
    let runtime = Runtime::new();
    let (owner, state) = owner_from_json(&runtime, json!({"a": 0, "b": 0}));
    let (log, callback) = recorder();

    owner
        .watch(
            WatchSource::getter(|d| {
                let a = field(d, "a").as_f64().unwrap_or(0.0);
                let b = field(d, "b").as_f64().unwrap_or(0.0);
                Ok(Value::from(a + b))
            }),
            callback,
            WatcherOptions::default(),
        )
        .unwrap();

    for n in 1..=5 {
        state.set("a", n);
        state.set("b", n);
    }
    assert!(log.borrow().is_empty());
    assert_eq!(runtime.pending_watchers(), 1);

    runtime.flush_ticks();
    assert_eq!(*log.borrow(), vec![(Value::from(10), Value::from(0))]);
}

/// Test that writing the same value (including NaN) never notifies.
#[test]
fn same_value_writes_are_ignored() {
    let runtime = Runtime::new();
    let (owner, state) = owner_from_json(&runtime, json!({"n": 1, "s": "x"}));
    let (log, callback) = recorder();
    owner.watch("n", callback, sync()).unwrap();

    state.set("n", 1);
    state.set("n", f64::NAN);
    state.set("n", f64::NAN);
    state.set("s", "x");

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert!(log[0].0.as_f64().is_some_and(f64::is_nan));
}

/// Test that array mutations behave natively and notify exactly once.
#[test]
fn array_mutations_are_intercepted() {
    let runtime = Runtime::new();
    let (owner, state) = owner_from_json(&runtime, json!({"items": [1, 2, 3]}));
    let items = state.peek("items").as_array().cloned().unwrap();
    let unobserved = Array::from_vec(vec![Value::from(1)]);

    let fired = Rc::new(Cell::new(0));
    let counter = Rc::clone(&fired);
    owner
        .watch(
            "items",
            move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            },
            sync(),
        )
        .unwrap();

    assert_eq!(items.push([Value::from(4)]), 4);
    assert_eq!(fired.get(), 1);
    assert_eq!(items.splice(0, 1, Vec::<Value>::new()), vec![Value::from(1)]);
    assert_eq!(fired.get(), 2);

    // Only the observed instance is intercepted
    assert!(items.is_intercepted());
    assert!(!unobserved.is_intercepted());
    unobserved.push([Value::from(2)]);
    assert_eq!(fired.get(), 2);
}

/// Test that objects pushed into an observed array are themselves reactive.
#[test]
fn pushed_objects_are_reactive() {
    let runtime = Runtime::new();
    let (owner, state) = owner_from_json(&runtime, json!({"todos": []}));
    let todos = state.peek("todos").as_array().cloned().unwrap();

    let todo = Object::from_entries([("done", false)]);
    todos.push([Value::Object(todo.clone())]);

    let (log, callback) = recorder();
    owner
        .watch(
            WatchSource::getter(|d| {
                let todos = field(d, "todos");
                let first = todos.as_array().map(|a| a.get(0)).unwrap_or_default();
                Ok(field(&first, "done"))
            }),
            callback,
            sync(),
        )
        .unwrap();

    todo.set("done", true);
    assert_eq!(*log.borrow(), vec![(Value::from(true), Value::from(false))]);
}

/// Test that a deep watcher fires on nested writes a shallow one misses.
#[test]
fn deep_watch_sees_nested_changes() {
    let runtime = Runtime::new();
    let (owner, state) =
        owner_from_json(&runtime, json!({"form": {"user": {"name": "ada"}, "tags": ["a"]}}));

    let deep_hits = Rc::new(Cell::new(0));
    let shallow_hits = Rc::new(Cell::new(0));
    for (deep, hits) in [(true, &deep_hits), (false, &shallow_hits)] {
        let counter = Rc::clone(hits);
        owner
            .watch(
                "form",
                move |_, _| {
                    counter.set(counter.get() + 1);
                    Ok(())
                },
                WatcherOptions {
                    deep,
                    sync: true,
                    ..Default::default()
                },
            )
            .unwrap();
    }

    let form = state.peek("form");
    let user = form.as_object().unwrap().peek("user");
    user.as_object().unwrap().set("name", "grace");
    assert_eq!((deep_hits.get(), shallow_hits.get()), (1, 0));

    let tags = form.as_object().unwrap().peek("tags");
    tags.as_array().unwrap().push([Value::from("b")]);
    assert_eq!((deep_hits.get(), shallow_hits.get()), (2, 0));
}

/// Test that `Runtime::set` makes a new key reactive while plain assignment
/// does not.
#[test]
fn dynamic_add_versus_plain_assignment() {
    let runtime = Runtime::new();
    let (owner, state) = owner_from_json(&runtime, json!({"profile": {}}));
    let profile = state.peek("profile");

    let (log, callback) = recorder();
    owner.watch("profile.email", callback, sync()).unwrap();

    // Plain assignment adds a non-reactive key
    profile.as_object().unwrap().set("nickname", "ada");
    assert!(log.borrow().is_empty());

    // Reactive add notifies the container and subscribes the new key
    runtime.set(&profile, "email", "ada@example.com");
    runtime.flush_ticks();
    assert_eq!(log.borrow().len(), 1);

    profile.as_object().unwrap().set("email", "grace@example.com");
    assert_eq!(log.borrow().len(), 2);
    assert_eq!(log.borrow()[1].0, Value::from("grace@example.com"));

    runtime.delete(&profile, "email");
    assert_eq!(log.borrow()[2], (Value::Undefined, Value::from("grace@example.com")));
}

/// Test lazy evaluation through `Computed`.
#[test]
fn computed_is_lazy_and_cached() {
    let runtime = Runtime::new();
    let (owner, state) = owner_from_json(&runtime, json!({"price": 10, "qty": 2}));
    let evaluations = Rc::new(Cell::new(0));
    let counter = Rc::clone(&evaluations);

    let total: Computed = owner
        .computed(move |d| {
            counter.set(counter.get() + 1);
            let price = field(d, "price").as_f64().unwrap_or(0.0);
            let qty = field(d, "qty").as_f64().unwrap_or(0.0);
            Ok(Value::from(price * qty))
        })
        .unwrap();
    assert_eq!(evaluations.get(), 0);

    assert_eq!(total.get().unwrap(), Value::from(20));
    assert_eq!(total.get().unwrap(), Value::from(20));
    assert_eq!(evaluations.get(), 1);

    state.set("qty", 3);
    state.set("price", 5);
    assert!(total.is_dirty());
    assert_eq!(total.get().unwrap(), Value::from(15));
    assert_eq!(evaluations.get(), 2);
}

/// Test that teardown is idempotent and detaches the watcher everywhere.
#[test]
fn teardown_is_idempotent() {
    let runtime = Runtime::new();
    let (owner, state) = owner_from_json(&runtime, json!({"n": 0}));
    let (log, callback) = recorder();
    let watcher = owner.watch("n", callback, WatcherOptions::default()).unwrap();

    state.set("n", 1);
    watcher.teardown();
    watcher.teardown();
    runtime.flush_ticks();

    assert!(log.borrow().is_empty());
    assert!(!watcher.active());
    assert!(owner.watchers().is_empty());
    assert_eq!(state.reactive_cell("n").unwrap().dep().subscriber_count(), 0);
}

/// Test that structural equality suppresses callbacks for equal snapshots.
#[test]
fn structural_equality_policy() {
    let runtime = Runtime::new();
    let (owner, state) = owner_from_json(&runtime, json!({"a": 1, "b": 2}));
    let (log, callback) = recorder();

    owner
        .watch(
            WatchSource::getter(|d| {
                let mut keys: Vec<Value> = Vec::new();
                if field(d, "a").as_f64().is_some() {
                    keys.push(Value::from("a"));
                }
                if field(d, "b").as_f64().is_some() {
                    keys.push(Value::from("b"));
                }
                Ok(Value::from(keys))
            }),
            callback,
            WatcherOptions {
                sync: true,
                equality: Equality::Structural,
                ..Default::default()
            },
        )
        .unwrap();

    state.set("a", 10);
    assert!(log.borrow().is_empty());
    state.set("b", Value::Null);
    assert_eq!(log.borrow().len(), 1);
}

/// Test that user watcher errors go to the error hook and flushing goes on.
#[test]
fn user_errors_are_reported_and_do_not_stop_the_flush() {
    let runtime = Runtime::new();
    let reports = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&reports);
    runtime.set_error_handler(move |err, owner, info| {
        sink.borrow_mut().push((err.clone(), owner.is_some(), info.to_string()));
    });
    let (owner, state) = owner_from_json(&runtime, json!({"n": 0}));

    owner
        .watch("n", |_, _| Err(Error::user("boom")), WatcherOptions::default())
        .unwrap();
    let (log, callback) = recorder();
    owner.watch("n", callback, WatcherOptions::default()).unwrap();

    state.set("n", 1);
    runtime.flush_ticks();

    assert_eq!(
        *reports.borrow(),
        vec![(Error::user("boom"), true, "callback for watcher \"n\"".to_string())]
    );
    assert_eq!(log.borrow().len(), 1);
}

/// Test that independent runtimes never see each other's collection.
#[test]
fn runtimes_are_independent() {
    let first = Runtime::new();
    let second = Runtime::new();
    let (owner, _) = owner_from_json(&first, json!({"n": 0}));
    let (_, other_state) = owner_from_json(&second, json!({"m": 0}));

    let watcher = Watcher::new(
        &owner,
        WatchSource::getter(move |d| {
            // Reads from a different runtime do not subscribe this watcher
            let _ = other_state.get("m");
            Ok(field(d, "n"))
        }),
        None,
        WatcherOptions::default(),
        false,
    )
    .unwrap();

    assert_eq!(watcher.dep_ids().len(), 1);
    assert!(!second.is_collecting());
}

/// Test that reads inside `untracked` do not subscribe the watcher.
#[test]
fn untracked_reads_do_not_subscribe() {
    let runtime = Runtime::new();
    let (owner, state) = owner_from_json(&runtime, json!({"tracked": 1, "ignored": 1}));
    let handle = runtime.clone();

    let watcher = Watcher::new(
        &owner,
        WatchSource::getter(move |d| {
            let ignored = handle.untracked(|| field(d, "ignored"));
            let tracked = field(d, "tracked");
            Ok(Value::from(
                tracked.as_f64().unwrap_or(0.0) + ignored.as_f64().unwrap_or(0.0),
            ))
        }),
        None,
        sync(),
        false,
    )
    .unwrap();

    state.set("ignored", 5);
    assert_eq!(watcher.value(), Value::from(2));
    state.set("tracked", 2);
    assert_eq!(watcher.value(), Value::from(7));
}

/// Test that a runtime configured from JSON picks up its settings.
#[test]
fn runtime_from_json_config() {
    let config = Config::from_json(r#"{"async_updates": false, "max_update_count": 5}"#).unwrap();
    let runtime = Runtime::with_config(config);
    let (owner, state) = owner_from_json(&runtime, json!({"n": 0}));
    let (log, callback) = recorder();
    owner.watch("n", callback, WatcherOptions::default()).unwrap();

    // Synchronous flushing: no tick needed
    state.set("n", 3);
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(runtime.config().max_update_count, 5);
    assert_eq!(Value::Object(state).to_json(), json!({"n": 3}));
}

/// Test the full async chain: mutation -> queue -> tick -> callback.
#[tokio::test]
async fn tokio_driver_flushes_watchers() {
    let runtime = Runtime::with_config(Config {
        tick_driver: TickDriverKind::Tokio,
        ..Config::default()
    });
    assert!(runtime.is_using_microtask());
    let (owner, state) = owner_from_json(&runtime, json!({"n": 0}));
    let (log, callback) = recorder();
    owner.watch("n", callback, WatcherOptions::default()).unwrap();

    state.set("n", 1);
    state.set("n", 2);
    let tick = runtime.tick();

    tokio::select! {
        _ = runtime.drive() => unreachable!("drive loop never returns"),
        res = tick => res.unwrap(),
    }
    assert_eq!(*log.borrow(), vec![(Value::from(2), Value::from(0))]);
}
