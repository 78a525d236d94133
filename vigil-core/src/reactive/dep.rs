//! Dependencies
//!
//! A [`Dep`] is the broadcast node behind one reactive cell (or one observed
//! container as a whole). It keeps the list of watchers subscribed to it and
//! tells each of them to update when notified.
//!
//! # Subscribers
//!
//! Subscribers are held weakly: a dependency never keeps a watcher alive.
//! Duplicate subscriptions are prevented by the watcher's dependency sets,
//! not here, so `add_sub` is a plain append.
//!
//! # Notification order
//!
//! `notify` works on a snapshot of the subscriber list, since an update may
//! subscribe or unsubscribe watchers on this very dependency. The snapshot is
//! sorted by watcher ID so watchers always fire in creation order, whether or
//! not the scheduler sorts them again later.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::runtime::{Runtime, WeakRuntime};
use super::subscriber::DepId;
use super::watcher::{WeakWatcher, Watcher};

struct DepInner {
    id: DepId,
    runtime: WeakRuntime,
    subs: RefCell<Vec<WeakWatcher>>,
}

/// A broadcast node that subscribed watchers listen to.
#[derive(Clone)]
pub struct Dep {
    inner: Rc<DepInner>,
}

impl Dep {
    /// Create a dependency bound to `runtime`'s target stack.
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            inner: Rc::new(DepInner {
                id: DepId::next(),
                runtime: runtime.downgrade(),
                subs: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Append a subscriber.
    pub fn add_sub(&self, watcher: &Watcher) {
        self.inner.subs.borrow_mut().push(watcher.downgrade());
    }

    /// Remove the first subscription held by `watcher`, if any.
    pub fn remove_sub(&self, watcher: &Watcher) {
        let id = watcher.id();
        let mut subs = self.inner.subs.borrow_mut();
        if let Some(pos) = subs.iter().position(|s| s.id() == id) {
            subs.remove(pos);
        }
    }

    /// Register this dependency with the watcher currently collecting, if any.
    pub fn depend(&self) {
        if let Some(target) = self.runtime().and_then(|rt| rt.current_target()) {
            target.add_dep(self);
        }
    }

    /// Tell every subscriber that this dependency changed.
    pub fn notify(&self) {
        let mut subs: Vec<Watcher> = {
            let mut list = self.inner.subs.borrow_mut();
            list.retain(WeakWatcher::is_alive);
            list.iter().filter_map(WeakWatcher::upgrade).collect()
        };
        subs.sort_by_key(Watcher::id);

        tracing::trace!(dep = self.id().raw(), subscribers = subs.len(), "notify");

        for watcher in subs {
            watcher.update();
        }
    }

    /// Live subscribers in subscription order.
    pub fn subscribers(&self) -> Vec<Watcher> {
        self.inner
            .subs
            .borrow()
            .iter()
            .filter_map(WeakWatcher::upgrade)
            .collect()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subs
            .borrow()
            .iter()
            .filter(|s| s.is_alive())
            .count()
    }

    pub(crate) fn runtime(&self) -> Option<Runtime> {
        self.inner.runtime.upgrade()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.inner.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
