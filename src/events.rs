//! Observer plumbing shared by the terminal and website managers.
//!
//! Listeners are plain closures. Emitting clones the listener list under the
//! lock and calls them after releasing it, so a listener may call back into
//! the manager that emitted (e.g. kill a session from its exit handler).

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

type Listener<T: ?Sized> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

/// A set of listeners for events of type `T`.
pub struct ListenerSet<T: ?Sized> {
    inner: Arc<Mutex<Listeners<T>>>,
}

impl<T: ?Sized + 'static> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Listeners {
                next_id: 1,
                entries: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<Listeners<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    pub fn emit(&self, event: &T) {
        let listeners: Vec<Listener<T>> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

impl<T: ?Sized + 'static> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by every `on*` registration.
///
/// Dropping it leaves the listener registered; call [`Subscription::unsubscribe`]
/// to stop delivery. Unsubscribing never touches the underlying resource.
pub struct Subscription {
    disposer: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(disposer: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            disposer: Some(Box::new(disposer)),
        }
    }

    /// A subscription to something that will never fire.
    pub fn inert() -> Self {
        Self { disposer: None }
    }

    /// False for subscriptions that can never fire again.
    pub fn is_active(&self) -> bool {
        self.disposer.is_some()
    }

    pub fn unsubscribe(mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.disposer.is_some())
            .finish()
    }
}
