//! Selective Binding
//!
//! A Binding bridges one consumer to a [`Store`], offering field-level
//! change granularity in both directions: reads are restricted to the fields
//! the consumer selected at construction, and writes are narrowed to that
//! same selection.
//!
//! # How the Comparator Works
//!
//! 1. At construction, the optional picker runs once against the store's
//!    current state to seed the cached snapshot. The selected key set is
//!    fixed for the binding's lifetime.
//!
//! 2. Each call to [`Binding::snapshot`] reads the store's current full
//!    state and compares it field-by-field against the cache using the
//!    binding's equality predicate (default [`Value::same`]).
//!
//! 3. If nothing relevant changed, the existing cached reference is returned
//!    unchanged. If any selected field changed, one new record is built with
//!    exactly the differing fields replaced, installed as the new cache, and
//!    returned.
//!
//! A host runtime that treats "same reference" as "nothing changed" will
//! therefore re-render a consumer exactly when one of its selected fields
//! changed. Fields the store gains after construction are invisible to the
//! binding; a selected field the store no longer reports keeps its cached
//! value.
//!
//! # The Write Path
//!
//! [`Binding::dispatch`] accepts a literal partial or a function of the most
//! recently delivered snapshot, then forwards to the store an edit record
//! containing only keys inside the current selection. Keys outside the
//! selection are dropped silently, so a consumer can never write a field it
//! does not observe. Use the store's own [`Store::set_state`] to write
//! outside a selection.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::update::Update;
use crate::store::{Listener, StateRecord, Store, Subscription, Value};

/// Equality predicate used by the comparator to decide whether a field
/// changed. Defaults to [`Value::same`].
pub type Equality = fn(&Value, &Value) -> bool;

/// Observe a store through an optional picker.
///
/// Returns the initial selected snapshot together with the [`Binding`] that
/// serves as the updater (and carries the comparator for a host runtime to
/// poll). With no picker the whole record is observed and the updater can
/// write any field.
pub fn use_bound_state(
    store: &Store,
    picker: Option<&dyn Fn(&StateRecord) -> StateRecord>,
) -> (Arc<StateRecord>, Binding) {
    let binding = match picker {
        Some(picker) => Binding::with_picker(store, picker),
        None => Binding::new(store),
    };
    (binding.current(), binding)
}

/// A per-consumer adapter over a [`Store`].
///
/// Constructed once per consumer lifetime. Cloning produces another handle
/// to the same cached snapshot.
///
/// # Example
///
/// ```rust,ignore
/// let store = create_store(record! { "count" => 0, "name" => "x" });
/// let counter = Binding::with_picker(&store, |s| s.select(&["count"]));
///
/// store.set_state(record! { "name" => "y" });
/// // Unrelated write: the snapshot reference is unchanged.
/// assert!(Arc::ptr_eq(&counter.snapshot(), &counter.snapshot()));
///
/// counter.dispatch(record! { "count" => 1 });
/// assert_eq!(counter.snapshot().get("count"), Some(&Value::Int(1)));
/// ```
pub struct Binding {
    store: Store,
    inner: Arc<BindingInner>,
}

struct BindingInner {
    /// Most recently delivered selected snapshot. Doubles as the comparator
    /// cache: the reference is replaced only when a selected field fails the
    /// equality predicate.
    cache: Mutex<Arc<StateRecord>>,

    /// Field-level change predicate.
    same: Equality,
}

impl Binding {
    /// Bind to the whole record.
    pub fn new(store: &Store) -> Self {
        let seed = (*store.get_state()).clone();
        Self::seeded(store, seed, Value::same)
    }

    /// Bind to the fields selected by `picker`, which runs once against the
    /// store's current state. The selected key set is fixed for this
    /// binding's lifetime. A panicking picker propagates to the caller.
    pub fn with_picker<F>(store: &Store, picker: F) -> Self
    where
        F: FnOnce(&StateRecord) -> StateRecord,
    {
        let seed = picker(&store.get_state());
        Self::seeded(store, seed, Value::same)
    }

    /// Like [`Binding::with_picker`], with a custom equality predicate in
    /// place of [`Value::same`].
    pub fn with_equality<F>(store: &Store, picker: F, same: Equality) -> Self
    where
        F: FnOnce(&StateRecord) -> StateRecord,
    {
        let seed = picker(&store.get_state());
        Self::seeded(store, seed, same)
    }

    fn seeded(store: &Store, seed: StateRecord, same: Equality) -> Self {
        Self {
            store: store.clone(),
            inner: Arc::new(BindingInner {
                cache: Mutex::new(Arc::new(seed)),
                same,
            }),
        }
    }

    /// The comparator: produce the latest selected snapshot.
    ///
    /// Reads the store's current state and compares every cached field
    /// against it. Returns the same reference as the previous call when no
    /// selected field changed; otherwise builds, caches, and returns a new
    /// record with exactly the differing fields replaced (unchanged fields
    /// keep their identity).
    pub fn snapshot(&self) -> Arc<StateRecord> {
        let mut cache = self.inner.cache.lock();
        let state = self.store.get_state();

        let mut next: Option<StateRecord> = None;
        let mut changed = 0usize;
        for (key, cached) in cache.iter() {
            if let Some(fresh) = state.get(key) {
                if !(self.inner.same)(fresh, cached) {
                    next.get_or_insert_with(|| (**cache).clone())
                        .insert(Arc::clone(key), fresh.clone());
                    changed += 1;
                }
            }
        }

        if let Some(next) = next {
            trace!(changed, "selected snapshot rebuilt");
            *cache = Arc::new(next);
        }
        Arc::clone(&*cache)
    }

    /// The most recently delivered snapshot, without re-reading the store.
    ///
    /// This is the record the functional form of [`Binding::dispatch`] is
    /// invoked with. It advances only when [`Binding::snapshot`] runs.
    pub fn current(&self) -> Arc<StateRecord> {
        Arc::clone(&*self.inner.cache.lock())
    }

    /// Subscribe to the underlying store's raw change notifications.
    ///
    /// Delegates to [`Store::subscribe`]; the subscription target is the
    /// store instance this binding was constructed with, so a host runtime
    /// holding this binding never needs to re-subscribe.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        self.store.subscribe(listener)
    }

    /// The store this binding observes.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Write through the selection.
    ///
    /// Resolves `update` (invoking the functional form with the most
    /// recently delivered snapshot), then forwards to the store an edit
    /// containing only the keys of the current selection that appear in the
    /// update. Keys outside the selection never reach the store through this
    /// path; selected keys absent from the update keep their store value.
    pub fn dispatch(&self, update: impl Into<Update>) {
        let current = self.current();
        let patch = update.into().resolve(&current);

        let mut edit = StateRecord::new();
        for (key, _) in current.iter() {
            if let Some(value) = patch.get(key) {
                edit.insert(Arc::clone(key), value.clone());
            }
        }

        if edit.len() < patch.len() {
            debug!(
                dropped = patch.len() - edit.len(),
                "update keys outside the selection ignored"
            );
        }
        self.store.set_state(edit);
    }

    /// Sugar for dispatching the functional form.
    pub fn dispatch_with<F>(&self, f: F)
    where
        F: FnOnce(&StateRecord) -> StateRecord + Send + 'static,
    {
        self.dispatch(Update::with(f));
    }
}

impl Clone for Binding {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("selected", &self.current().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
