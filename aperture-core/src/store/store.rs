//! Store Implementation
//!
//! A Store is the single owner of one state record. It is the authoritative
//! source of truth: every mutation goes through [`Store::set_state`], which
//! merges a partial record into the current one, installs the result as a
//! brand-new record, and synchronously notifies every registered listener.
//!
//! # How Change Detection Stays Cheap
//!
//! 1. `set_state` never mutates the current record in place. It installs a
//!    new `Arc<StateRecord>` built by shallow merge.
//!
//! 2. Fields not named by the partial keep their value AND identity across
//!    the merge.
//!
//! 3. Consumers therefore detect "nothing changed" by comparing references
//!    ([`Arc::ptr_eq`] at the record level, [`Value::same`] per field)
//!    without ever inspecting deep structure.
//!
//! [`Value::same`]: super::value::Value::same
//!
//! # Listener Semantics
//!
//! Listeners are callbacks taking no arguments, keyed by the identity of
//! their `Arc` allocation and de-duplicated: subscribing the same `Arc`
//! twice registers it once. The listener set is snapshotted at the start of
//! each notification pass, so a listener registered from inside a callback
//! waits for the next `set_state`, while one removed from inside a callback
//! still receives the in-flight notification. Notification order is not part
//! of the contract.
//!
//! # Read Contract
//!
//! [`Store::get_state`] hands out the current record by reference. Treat it
//! as immutable; the record type itself has no interior mutability, but an
//! application object smuggled in behind a `Shared` value and mutated in
//! place will silently defeat identity comparison. That is a usage error
//! this crate cannot detect.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::trace;

use super::record::StateRecord;

/// A change listener. Invoked with no arguments after every state
/// replacement.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Create a store seeded with `initial`. Any record shape is accepted.
pub fn create_store(initial: StateRecord) -> Store {
    Store::new(initial)
}

/// The single owner of a state record.
///
/// Cloning a `Store` produces another handle to the same state and listener
/// set.
///
/// # Example
///
/// ```rust,ignore
/// let store = create_store(record! { "count" => 0 });
///
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let seen = Arc::clone(&ticks);
/// let subscription = store.subscribe(Arc::new(move || {
///     seen.fetch_add(1, Ordering::SeqCst);
/// }));
///
/// store.set_state(record! { "count" => 1 });
/// assert_eq!(ticks.load(Ordering::SeqCst), 1);
/// ```
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    /// Current record. Replaced wholesale on every write, never mutated.
    state: RwLock<Arc<StateRecord>>,

    /// Registered listeners, keyed by the identity of their allocation.
    listeners: Mutex<IndexMap<usize, Listener>>,
}

impl Store {
    /// Create a store seeded with `initial`.
    pub fn new(initial: StateRecord) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(Arc::new(initial)),
                listeners: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// Get the current state record by reference. O(1), no side effects.
    ///
    /// Two calls with no intervening [`Store::set_state`] return the same
    /// reference.
    pub fn get_state(&self) -> Arc<StateRecord> {
        Arc::clone(&self.inner.state.read())
    }

    /// Merge `partial` into the current record, install the result as a new
    /// record, and synchronously notify every registered listener.
    ///
    /// Keys in `partial` override; all other fields keep value and identity.
    /// Keys the record never held are simply added. The merge and the full
    /// notification pass complete before this returns.
    pub fn set_state(&self, partial: StateRecord) {
        {
            let mut state = self.inner.state.write();
            let next = Arc::new(state.merged(&partial));
            *state = next;
        }
        trace!(fields = partial.len(), "state replaced");
        self.notify();
    }

    /// Register `listener` to run after every future `set_state`.
    ///
    /// Listeners are de-duplicated by `Arc` identity: subscribing a clone of
    /// an already-registered listener is a no-op that hands back another
    /// [`Subscription`] addressing the same single registration, so any one
    /// of those subscriptions removes it.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        let key = listener_key(&listener);
        {
            let mut listeners = self.inner.listeners.lock();
            if !listeners.contains_key(&key) {
                listeners.insert(key, Arc::clone(&listener));
                trace!(listeners = listeners.len(), "listener registered");
            }
        }
        Subscription {
            store: Arc::downgrade(&self.inner),
            key,
            // Pins the allocation so the key stays unambiguous for as long
            // as any disposer for it exists.
            _listener: listener,
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Run every currently-registered listener.
    ///
    /// The set is snapshotted before the first callback runs, so listeners
    /// may subscribe, unsubscribe, or write back into the store without
    /// deadlocking this pass.
    fn notify(&self) {
        let listeners: SmallVec<[Listener; 8]> =
            self.inner.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }
}

impl Clone for Store {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("fields", &self.get_state().len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Identity key for a listener: the address of its `Arc` allocation.
fn listener_key(listener: &Listener) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

/// Disposer for one listener registration.
///
/// Calling [`Subscription::unsubscribe`] removes exactly that registration;
/// repeated calls are no-ops. The registration is also removed when the
/// subscription is dropped.
#[must_use = "dropping a Subscription removes the listener registration"]
pub struct Subscription {
    store: Weak<StoreInner>,
    key: usize,
    _listener: Listener,
}

impl Subscription {
    /// Remove the registration. Idempotent.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.store.upgrade() {
            let mut listeners = inner.listeners.lock();
            if listeners.swap_remove(&self.key).is_some() {
                trace!(listeners = listeners.len(), "listener removed");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::store::Value;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn set_state_merges_partial_into_current_record() {
        let store = create_store(record! { "count" => 0, "name" => "x" });

        store.set_state(record! { "count" => 1 });

        let state = store.get_state();
        assert_eq!(state.get("count"), Some(&Value::Int(1)));
        assert_eq!(state.get("name").and_then(Value::as_str), Some("x"));
    }

    #[test]
    fn set_state_installs_a_new_record_object() {
        let store = create_store(record! { "count" => 0 });
        let before = store.get_state();

        store.set_state(record! { "count" => 0 });
        let after = store.get_state();

        // A new record is produced even when no value changed.
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn get_state_is_stable_between_writes() {
        let store = create_store(record! { "count" => 0 });

        let a = store.get_state();
        let b = store.get_state();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unmerged_fields_keep_identity_across_writes() {
        let shared = Value::shared(String::from("payload"));
        let store = create_store(
            StateRecord::new()
                .with("obj", shared.clone())
                .with("count", 0),
        );

        store.set_state(record! { "count" => 1 });

        assert!(store.get_state().get("obj").unwrap().same(&shared));
    }

    #[test]
    fn set_state_adds_unknown_keys() {
        let store = create_store(record! { "count" => 0 });

        store.set_state(record! { "brand_new" => true });

        assert_eq!(
            store.get_state().get("brand_new"),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn listener_runs_once_per_set_state() {
        let store = create_store(record! { "count" => 0 });
        let calls = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&calls);
        let _subscription = store.subscribe(Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(calls.load(Ordering::SeqCst), 0);

        store.set_state(record! { "count" => 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.set_state(record! { "count" => 2 });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn duplicate_subscribe_does_not_double_invoke() {
        let store = create_store(record! { "count" => 0 });
        let calls = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&calls);
        let listener: Listener = Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let _first = store.subscribe(Arc::clone(&listener));
        let _second = store.subscribe(listener);
        assert_eq!(store.listener_count(), 1);

        store.set_state(record! { "count" => 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribed_listener_is_not_invoked() {
        let store = create_store(record! { "count" => 0 });
        let calls = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&calls);
        let subscription = store.subscribe(Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        store.set_state(record! { "count" => 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        store.set_state(record! { "count" => 2 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Removing again is a no-op.
        subscription.unsubscribe();
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn dropping_a_subscription_unregisters() {
        let store = create_store(record! { "count" => 0 });
        let calls = Arc::new(AtomicUsize::new(0));

        {
            let seen = Arc::clone(&calls);
            let _subscription = store.subscribe(Arc::new(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            }));
            assert_eq!(store.listener_count(), 1);
        }

        assert_eq!(store.listener_count(), 0);
        store.set_state(record! { "count" => 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_added_during_notify_waits_for_next_pass() {
        let store = create_store(record! { "count" => 0 });
        let late_calls = Arc::new(AtomicUsize::new(0));

        let late: Listener = {
            let seen = Arc::clone(&late_calls);
            Arc::new(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        };

        // First listener registers the second one from inside the pass.
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let _registrar = {
            let store = store.clone();
            let slot = Arc::clone(&slot);
            store.clone().subscribe(Arc::new(move || {
                let mut slot = slot.lock();
                if slot.is_none() {
                    *slot = Some(store.subscribe(Arc::clone(&late)));
                }
            }))
        };

        store.set_state(record! { "count" => 1 });
        // The late listener was registered mid-pass and must not have run.
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        store.set_state(record! { "count" => 2 });
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reentrant_set_state_from_listener_does_not_deadlock() {
        let store = create_store(record! { "count" => 0 });

        let _subscription = {
            let store = store.clone();
            store.clone().subscribe(Arc::new(move || {
                let count = store.get_state().get("count").unwrap().as_int().unwrap();
                if count < 3 {
                    store.set_state(record! { "count" => count + 1 });
                }
            }))
        };

        store.set_state(record! { "count" => 1 });
        assert_eq!(
            store.get_state().get("count"),
            Some(&Value::Int(3))
        );
    }
}
