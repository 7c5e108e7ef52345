use deskbridge::Subscription;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Id handed back for a stream that has nothing left to deliver.
pub const NO_SUBSCRIPTION: u64 = 0;

struct Entry {
    session: String,
    subscription: Subscription,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    active: Mutex<HashMap<u64, Entry>>,
}

/// Terminal stream subscriptions opened by the webview, keyed by the id
/// handed back to it so it can unsubscribe later. Entries for a session are
/// dropped once that session exits.
#[derive(Clone, Default)]
pub struct Subscriptions {
    inner: Arc<Inner>,
}

impl Subscriptions {
    /// Track `subscription` for `session`. Inactive subscriptions are not
    /// stored and get [`NO_SUBSCRIPTION`].
    pub fn insert(&self, session: &str, subscription: Subscription) -> u64 {
        if !subscription.is_active() {
            return NO_SUBSCRIPTION;
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.active.lock().insert(
            id,
            Entry {
                session: session.to_string(),
                subscription,
            },
        );
        id
    }

    pub fn remove(&self, id: u64) -> bool {
        let entry = self.inner.active.lock().remove(&id);
        match entry {
            Some(e) => {
                e.subscription.unsubscribe();
                true
            }
            None => false,
        }
    }

    /// Forget every subscription of `session`. Returns how many were held.
    pub fn release_session(&self, session: &str) -> usize {
        let released: Vec<Entry> = {
            let mut active = self.inner.active.lock();
            let ids: Vec<u64> = active
                .iter()
                .filter(|(_, e)| e.session == session)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter().filter_map(|id| active.remove(&id)).collect()
        };
        let count = released.len();
        for entry in released {
            entry.subscription.unsubscribe();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.inner.active.lock().len()
    }

    pub fn clear(&self) {
        let drained: Vec<Entry> = self.inner.active.lock().drain().map(|(_, e)| e).collect();
        for entry in drained {
            entry.subscription.unsubscribe();
        }
    }
}
