//! Events<O, A>: per-name listener buckets for one owning object.
//!
//! Each event name keeps its own ordered bucket of `(ListenerId, callback)`
//! pairs; a bucket disappears with its last listener. `trigger` hands every
//! callback the owner as its context, then repeats the delivery to the
//! catch-all `"all"` bucket. Callers that need a different context bind it
//! with [`Events::on_with_context`].
//!
//! The buckets for a trigger are copied out under the lock and called after
//! it is released. A listener may therefore register, remove, or trigger on
//! the same dispatcher; such changes take effect from the next trigger. A
//! panicking listener unwinds through `trigger` and stops the remaining
//! calls of that round.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Listeners registered under this name receive every triggered event,
/// after the event's own listeners.
pub const ALL_EVENTS: &str = "all";

/// A listener ID returned by [`Events::on`] that can be passed to
/// [`Events::off_listener`] to remove that one registration.
pub type ListenerId = u64;

/// Closure type for listeners. The first argument is the dispatcher's owner,
/// which is the default invocation context.
pub type Callback<O, A> = dyn Fn(&O, &A) + Send + Sync;

type Bucket<O, A> = Vec<(ListenerId, Arc<Callback<O, A>>)>;

/// Named-event dispatcher owned by a single object (`O`).
///
/// Event names map to ordered listener lists; the last listener removed from
/// a name removes the name itself.
pub struct Events<O: ?Sized, A> {
    registry: Mutex<IndexMap<String, Bucket<O, A>>>,
    next_id: AtomicU64,
}

impl<O: ?Sized, A> Events<O, A> {
    /// Create a new, empty dispatcher.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(IndexMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` under `event` and return its [`ListenerId`].
    ///
    /// Every call adds a new slot, even for an identical callback.
    pub fn on(
        &self,
        event: &str,
        callback: impl Fn(&O, &A) + Send + Sync + 'static,
    ) -> ListenerId {
        self.on_shared(event, Arc::new(callback))
    }

    /// Register a shared callback handle. Keep a clone of the `Arc` to remove
    /// it later with [`Events::off`].
    pub fn on_shared(&self, event: &str, callback: Arc<Callback<O, A>>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, callback));
        id
    }

    /// Register `callback` with an explicit invocation context. The context
    /// is moved into the registration and handed to the callback on every
    /// call, ahead of the owner.
    pub fn on_with_context<C>(
        &self,
        event: &str,
        context: C,
        callback: impl Fn(&C, &O, &A) + Send + Sync + 'static,
    ) -> ListenerId
    where
        C: Send + Sync + 'static,
    {
        self.on(event, move |owner, args| callback(&context, owner, args))
    }

    /// Remove listeners from `event`.
    ///
    /// With `Some(callback)`, removes every registration of that exact
    /// allocation (pointer identity). With `None`, removes all listeners for
    /// `event`. Unknown events are ignored.
    pub fn off(&self, event: &str, callback: Option<&Arc<Callback<O, A>>>) {
        let mut registry = self.registry.lock();
        let Some(callback) = callback else {
            registry.shift_remove(event);
            return;
        };
        let target = Arc::as_ptr(callback).cast::<()>();
        if let Some(bucket) = registry.get_mut(event) {
            bucket.retain(|(_, cb)| Arc::as_ptr(cb).cast::<()>() != target);
            if bucket.is_empty() {
                registry.shift_remove(event);
            }
        }
    }

    /// Remove the single registration identified by `id`.
    ///
    /// Does nothing if `id` is not registered under `event` (safe to call
    /// multiple times).
    pub fn off_listener(&self, event: &str, id: ListenerId) {
        let mut registry = self.registry.lock();
        if let Some(bucket) = registry.get_mut(event) {
            bucket.retain(|(lid, _)| *lid != id);
            if bucket.is_empty() {
                registry.shift_remove(event);
            }
        }
    }

    /// Invoke every listener registered for `event`, in registration order,
    /// then every [`ALL_EVENTS`] listener.
    ///
    /// A snapshot of the listener lists is taken before iteration so that
    /// additions or removals during a callback do not affect this round.
    pub fn trigger(&self, event: &str, owner: &O, args: &A) {
        let snapshot: Vec<Arc<Callback<O, A>>> = {
            let registry = self.registry.lock();
            let named = registry.get(event).into_iter().flatten();
            let catch_all = if event == ALL_EVENTS {
                None
            } else {
                registry.get(ALL_EVENTS)
            };
            named
                .chain(catch_all.into_iter().flatten())
                .map(|(_, cb)| Arc::clone(cb))
                .collect()
        };
        if snapshot.is_empty() {
            return;
        }
        tracing::trace!(event, listeners = snapshot.len(), "trigger");
        for cb in snapshot {
            cb(owner, args);
        }
    }

    /// Remove every event and listener.
    pub fn clear(&self) {
        self.registry.lock().clear();
    }

    /// Number of listeners registered directly under `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry.lock().get(event).map_or(0, Vec::len)
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.registry.lock().contains_key(event)
    }

    /// Registered event names, in first-registration order.
    pub fn event_names(&self) -> Vec<String> {
        self.registry.lock().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }
}

impl<O: ?Sized, A> Default for Events<O, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: ?Sized, A> std::fmt::Debug for Events<O, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock();
        let mut map = f.debug_map();
        for (name, bucket) in registry.iter() {
            map.entry(name, &bucket.len());
        }
        map.finish()
    }
}
