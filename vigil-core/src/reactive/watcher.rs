//! Watcher Implementation
//!
//! A Watcher evaluates a getter, records every dependency the getter read,
//! and reacts when any of them notifies.
//!
//! # How Watchers Work
//!
//! 1. `get()` pushes the watcher onto the runtime's target stack and runs the
//!    getter. Each reactive read calls back into `add_dep`, which fills the
//!    *new* dependency set.
//!
//! 2. When the getter returns (or unwinds), the target is popped and
//!    `cleanup_deps` unsubscribes from every dependency that was not read
//!    this time. Subscriptions therefore always match the last evaluation.
//!
//! 3. When a dependency notifies, `update()` either marks the watcher dirty
//!    (lazy), runs it immediately (sync) or hands it to the flush queue.
//!
//! # Error Boundary
//!
//! Getters and callbacks return [`Result`]. For user watchers a failure is
//! reported through the runtime's error hook and evaluation continues; for
//! internal watchers the error is returned to the caller.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::context::TargetGuard;
use super::dep::Dep;
use super::owner::{Owner, WeakOwner};
use super::path::parse_path;
use super::runtime::{Runtime, WeakRuntime};
use super::subscriber::{DepId, WatcherId};
use crate::error::{Error, Result};
use crate::observer::traverse;
use crate::value::Value;

/// A getter receives the owner's data object.
pub type Getter = Rc<dyn Fn(&Value) -> Result<Value>>;

/// A hook with no arguments, such as `before`.
pub type Hook = Rc<dyn Fn()>;

/// What a watcher evaluates.
#[derive(Clone)]
pub enum WatchSource {
    /// A dot-delimited path into the owner's data, e.g. `a.b[0].c`.
    Path(String),
    /// An arbitrary getter.
    Getter(Getter),
}

impl WatchSource {
    pub fn getter(f: impl Fn(&Value) -> Result<Value> + 'static) -> Self {
        Self::Getter(Rc::new(f))
    }
}

impl From<&str> for WatchSource {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for WatchSource {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

/// Change callback, invoked with `(new, old)`.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&Value, &Value) -> Result<()>>);

impl Callback {
    pub fn new(f: impl Fn(&Value, &Value) -> Result<()> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub(crate) fn call(&self, new: &Value, old: &Value) -> Result<()> {
        (self.0)(new, old)
    }
}

/// How `run()` decides whether the value changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Equality {
    /// `Value::same_value`. Objects and arrays always count as changed,
    /// since they may have been mutated in place.
    #[default]
    SameValue,
    /// Deep comparison of contents.
    Structural,
}

impl Equality {
    fn unchanged(self, new: &Value, old: &Value) -> bool {
        match self {
            Self::SameValue => new.same_value(old) && !new.is_object_like(),
            Self::Structural => new.structural_eq(old),
        }
    }
}

/// Construction flags.
#[derive(Clone, Default)]
pub struct WatcherOptions {
    /// Traverse the value so every nested cell is a dependency.
    pub deep: bool,
    /// User-created: errors are reported instead of returned.
    pub user: bool,
    /// Do not evaluate until asked; notifications only mark dirty.
    pub lazy: bool,
    /// Run synchronously on notification instead of queueing.
    pub sync: bool,
    /// Used by `Owner::watch`: invoke the callback once right away.
    pub immediate: bool,
    /// Called by the flush queue right before each run.
    pub before: Option<Hook>,
    pub equality: Equality,
}

#[derive(Default)]
struct DepSet {
    ids: HashSet<DepId>,
    list: SmallVec<[Dep; 4]>,
}

impl DepSet {
    fn contains(&self, id: DepId) -> bool {
        self.ids.contains(&id)
    }

    fn insert(&mut self, dep: &Dep) -> bool {
        if self.ids.insert(dep.id()) {
            self.list.push(dep.clone());
            true
        } else {
            false
        }
    }

    fn clear(&mut self) {
        self.ids.clear();
        self.list.clear();
    }
}

struct WatcherInner {
    id: WatcherId,
    runtime: WeakRuntime,
    owner: WeakOwner,
    expression: String,
    getter: Getter,
    callback: Option<Callback>,
    deep: bool,
    user: bool,
    lazy: bool,
    sync: bool,
    before: Option<Hook>,
    equality: Equality,
    dirty: Cell<bool>,
    active: Cell<bool>,
    value: RefCell<Value>,
    deps: RefCell<DepSet>,
    new_deps: RefCell<DepSet>,
}

/// A computation subscribed to the dependencies it reads.
#[derive(Clone)]
pub struct Watcher {
    inner: Rc<WatcherInner>,
}

impl Watcher {
    /// Create a watcher owned by `owner`.
    ///
    /// Unless `lazy`, the getter is evaluated immediately; an internal
    /// watcher whose first evaluation fails is torn down and the error
    /// returned.
    pub fn new(
        owner: &Owner,
        source: WatchSource,
        callback: Option<Callback>,
        options: WatcherOptions,
        is_render_watcher: bool,
    ) -> Result<Self> {
        let runtime = owner.runtime();
        let (expression, getter) = match source {
            WatchSource::Getter(getter) => ("function".to_string(), getter),
            WatchSource::Path(path) => match parse_path(&path) {
                Some(getter) => (path, getter),
                None => {
                    runtime.warn(&format!(
                        "Failed watching path: \"{path}\". Watcher only accepts simple \
                         dot-delimited paths. For full control, use a function instead."
                    ));
                    let noop: Getter =
                        Rc::new(|_: &Value| -> Result<Value> { Ok(Value::Undefined) });
                    (path, noop)
                }
            },
        };

        let watcher = Self {
            inner: Rc::new(WatcherInner {
                id: WatcherId::next(),
                runtime: runtime.downgrade(),
                owner: owner.downgrade(),
                expression,
                getter,
                callback,
                deep: options.deep,
                user: options.user,
                lazy: options.lazy,
                sync: options.sync,
                before: options.before,
                equality: options.equality,
                dirty: Cell::new(options.lazy),
                active: Cell::new(true),
                value: RefCell::new(Value::Undefined),
                deps: RefCell::new(DepSet::default()),
                new_deps: RefCell::new(DepSet::default()),
            }),
        };
        owner.register_watcher(&watcher, is_render_watcher);

        if !watcher.inner.lazy {
            match watcher.get() {
                Ok(value) => *watcher.inner.value.borrow_mut() = value,
                Err(err) => {
                    watcher.teardown();
                    return Err(err);
                }
            }
        }

        tracing::trace!(
            watcher = %watcher.id(),
            expression = %watcher.expression(),
            "watcher created"
        );
        Ok(watcher)
    }

    pub fn id(&self) -> WatcherId {
        self.inner.id
    }

    /// The watched path, or `"function"` for getter sources.
    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    /// Evaluate the getter and re-collect dependencies.
    ///
    /// A torn-down watcher returns its cached value and subscribes to nothing.
    pub fn get(&self) -> Result<Value> {
        if !self.inner.active.get() {
            return Ok(self.value());
        }
        let runtime = self.runtime().ok_or(Error::RuntimeReleased)?;
        let owner = self.owner().ok_or(Error::OwnerReleased)?;
        let data = owner.data();

        let _evaluation = Evaluation::enter(self, &runtime);
        match (self.inner.getter)(&data) {
            Ok(value) => {
                if self.inner.deep {
                    traverse(&value);
                }
                Ok(value)
            }
            Err(err) if self.inner.user => {
                let info = format!("getter for watcher \"{}\"", self.inner.expression);
                runtime.report_error(&err, Some(&owner), &info);
                Ok(Value::Undefined)
            }
            Err(err) => Err(err),
        }
    }

    /// Call the getter on the owner's data as-is: no target is pushed and
    /// nothing is cached, so reads depend on whatever is collecting.
    pub(crate) fn call_getter(&self) -> Result<Value> {
        let owner = self.owner().ok_or(Error::OwnerReleased)?;
        (self.inner.getter)(&owner.data())
    }

    /// Record `dep` as read during the current evaluation.
    pub fn add_dep(&self, dep: &Dep) {
        let added = self.inner.new_deps.borrow_mut().insert(dep);
        if added && !self.inner.deps.borrow().contains(dep.id()) {
            dep.add_sub(self);
        }
    }

    /// Drop subscriptions not renewed by the last evaluation, then promote
    /// the new set to current.
    fn cleanup_deps(&self) {
        let stale: Vec<Dep> = {
            let deps = self.inner.deps.borrow();
            let new_deps = self.inner.new_deps.borrow();
            deps.list
                .iter()
                .filter(|dep| !new_deps.contains(dep.id()))
                .cloned()
                .collect()
        };
        for dep in &stale {
            dep.remove_sub(self);
        }

        let mut deps = self.inner.deps.borrow_mut();
        let mut new_deps = self.inner.new_deps.borrow_mut();
        std::mem::swap(&mut *deps, &mut *new_deps);
        new_deps.clear();
    }

    /// React to a dependency change.
    pub fn update(&self) {
        if self.inner.lazy {
            self.inner.dirty.set(true);
        } else if self.inner.sync {
            if let Err(err) = self.run() {
                self.report(&err, &format!("watcher \"{}\"", self.inner.expression));
            }
        } else if let Some(runtime) = self.runtime() {
            runtime.queue_watcher(self);
        }
    }

    /// Re-evaluate and fire the callback if the value changed.
    pub fn run(&self) -> Result<()> {
        if !self.inner.active.get() {
            return Ok(());
        }

        let value = self.get()?;
        let changed = {
            let old = self.inner.value.borrow();
            self.inner.deep || !self.inner.equality.unchanged(&value, &old)
        };
        if !changed {
            return Ok(());
        }

        let old = self.inner.value.replace(value.clone());
        if let Some(callback) = &self.inner.callback {
            match callback.call(&value, &old) {
                Ok(()) => {}
                Err(err) if self.inner.user => {
                    let info = format!("callback for watcher \"{}\"", self.inner.expression);
                    self.report(&err, &info);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Evaluate a lazy watcher and clear its dirty flag.
    pub fn evaluate(&self) -> Result<()> {
        if !self.inner.active.get() {
            return Ok(());
        }
        let value = self.get()?;
        *self.inner.value.borrow_mut() = value;
        self.inner.dirty.set(false);
        Ok(())
    }

    /// Make the collecting watcher depend on everything this watcher depends on.
    pub fn depend(&self) {
        let deps: SmallVec<[Dep; 4]> = self.inner.deps.borrow().list.clone();
        for dep in &deps {
            dep.depend();
        }
    }

    /// Unsubscribe from everything and stop reacting. Idempotent.
    pub fn teardown(&self) {
        if !self.inner.active.get() {
            return;
        }

        if let Some(owner) = self.owner() {
            if !owner.is_being_destroyed() {
                owner.remove_watcher(self);
            }
        }

        let deps = std::mem::take(&mut *self.inner.deps.borrow_mut());
        for dep in &deps.list {
            dep.remove_sub(self);
        }
        self.inner.active.set(false);
        tracing::trace!(watcher = %self.id(), "watcher torn down");
    }

    /// The cached value from the last evaluation.
    pub fn value(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    pub fn dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn is_user(&self) -> bool {
        self.inner.user
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.lazy
    }

    /// IDs of the dependencies collected by the last evaluation.
    pub fn dep_ids(&self) -> Vec<DepId> {
        self.inner.deps.borrow().list.iter().map(Dep::id).collect()
    }

    pub fn owner(&self) -> Option<Owner> {
        self.inner.owner.upgrade()
    }

    pub fn ptr_eq(&self, other: &Watcher) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn before(&self) -> Option<Hook> {
        self.inner.before.clone()
    }

    pub(crate) fn runtime(&self) -> Option<Runtime> {
        self.inner.runtime.upgrade()
    }

    pub(crate) fn downgrade(&self) -> WeakWatcher {
        WeakWatcher {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn report(&self, err: &Error, info: &str) {
        if let Some(runtime) = self.runtime() {
            runtime.report_error(err, self.owner().as_ref(), info);
        }
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("expression", &self.inner.expression)
            .field("lazy", &self.inner.lazy)
            .field("dirty", &self.inner.dirty.get())
            .field("active", &self.inner.active.get())
            .finish()
    }
}

/// One evaluation in progress. Pops the target and then cleans up
/// dependencies when dropped, in that order.
struct Evaluation {
    target: Option<TargetGuard>,
    watcher: Watcher,
}

impl Evaluation {
    fn enter(watcher: &Watcher, runtime: &Runtime) -> Self {
        Self {
            target: Some(TargetGuard::enter(runtime, Some(watcher.clone()))),
            watcher: watcher.clone(),
        }
    }
}

impl Drop for Evaluation {
    fn drop(&mut self) {
        drop(self.target.take());
        self.watcher.cleanup_deps();
    }
}

/// Non-owning subscriber entry held by dependencies.
#[derive(Clone)]
pub(crate) struct WeakWatcher {
    id: WatcherId,
    inner: Weak<WatcherInner>,
}

impl WeakWatcher {
    pub(crate) fn id(&self) -> WatcherId {
        self.id
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub(crate) fn upgrade(&self) -> Option<Watcher> {
        self.inner.upgrade().map(|inner| Watcher { inner })
    }
}
