//! Polling Host
//!
//! A hand-rolled [`HostRuntime`] for contexts without a UI scheduler. Each
//! mounted consumer holds its binding, its render callback, and a dirty
//! flag; the store subscription only sets the flag. Nothing re-renders until
//! [`PollingHost::flush`] runs, which makes render timing fully
//! deterministic under test.
//!
//! # How Flushing Works
//!
//! 1. Snapshot the consumer list, so render callbacks may mount or unmount
//!    reentrantly.
//!
//! 2. For each consumer whose dirty flag is set: clear it, poll the
//!    binding's comparator, and compare the result by reference against the
//!    last delivered snapshot.
//!
//! 3. Re-render only on a reference change. A store write that left every
//!    selected field alone costs one comparison, not a render.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::trace;

use super::HostRuntime;
use crate::binding::Binding;
use crate::store::{StateRecord, Subscription};

/// Counter for generating unique mount IDs.
static MOUNT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique mount ID.
fn next_mount_id() -> u64 {
    MOUNT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Render callback invoked with each newly delivered snapshot.
pub type RenderFn = Box<dyn FnMut(Arc<StateRecord>) + Send>;

/// A polling driver satisfying the [`HostRuntime`] contract.
///
/// # Example
///
/// ```rust,ignore
/// let host = PollingHost::new();
/// let handle = host.mount(&binding, |snapshot| {
///     println!("rendering with {snapshot}");
/// });
///
/// store.set_state(record! { "count" => 1 });
/// assert_eq!(host.flush(), 1);
/// ```
pub struct PollingHost {
    inner: Arc<HostInner>,
}

#[derive(Default)]
struct HostInner {
    consumers: Mutex<IndexMap<u64, Arc<Consumer>>>,
}

struct Consumer {
    binding: Binding,
    render: Mutex<RenderFn>,

    /// Last snapshot handed to `render`; the reference the flush pass
    /// compares against.
    delivered: Mutex<Arc<StateRecord>>,

    /// Set by the store subscription, cleared by the flush pass.
    dirty: Arc<AtomicBool>,

    render_count: AtomicUsize,

    /// Held so unmounting detaches from the store.
    _subscription: Subscription,
}

impl PollingHost {
    /// Create an empty host.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HostInner::default()),
        }
    }

    /// Mount a consumer. Renders once immediately with the binding's
    /// current snapshot, then marks the consumer dirty on every store
    /// notification until unmounted.
    pub fn mount_boxed(&self, binding: &Binding, mut render: RenderFn) -> MountHandle {
        let id = next_mount_id();

        let dirty = Arc::new(AtomicBool::new(false));
        let subscription = {
            let flag = Arc::clone(&dirty);
            binding.subscribe(Arc::new(move || {
                flag.store(true, Ordering::SeqCst);
            }))
        };

        // Initial frame.
        let seed = binding.current();
        render(Arc::clone(&seed));

        let consumer = Arc::new(Consumer {
            binding: binding.clone(),
            render: Mutex::new(render),
            delivered: Mutex::new(seed),
            dirty,
            render_count: AtomicUsize::new(1),
            _subscription: subscription,
        });
        self.inner.consumers.lock().insert(id, consumer);
        trace!(id, "consumer mounted");

        MountHandle {
            host: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Drain dirty consumers, re-rendering those whose snapshot reference
    /// changed. Returns the number of renders performed.
    pub fn flush(&self) -> usize {
        let consumers: SmallVec<[Arc<Consumer>; 8]> =
            self.inner.consumers.lock().values().cloned().collect();

        let mut rendered = 0;
        for consumer in consumers {
            if !consumer.dirty.swap(false, Ordering::SeqCst) {
                continue;
            }

            let snapshot = consumer.binding.snapshot();
            {
                let mut delivered = consumer.delivered.lock();
                if Arc::ptr_eq(&*delivered, &snapshot) {
                    continue;
                }
                *delivered = Arc::clone(&snapshot);
            }

            {
                let mut render = consumer.render.lock();
                (*render)(snapshot);
            }
            consumer.render_count.fetch_add(1, Ordering::SeqCst);
            rendered += 1;
        }

        trace!(rendered, "flush completed");
        rendered
    }

    /// Number of mounted consumers.
    pub fn consumer_count(&self) -> usize {
        self.inner.consumers.lock().len()
    }
}

impl Default for PollingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime for PollingHost {
    type Handle = MountHandle;

    fn mount<F>(&self, binding: &Binding, render: F) -> MountHandle
    where
        F: FnMut(Arc<StateRecord>) + Send + 'static,
    {
        self.mount_boxed(binding, Box::new(render))
    }
}

impl fmt::Debug for PollingHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingHost")
            .field("consumers", &self.consumer_count())
            .finish()
    }
}

/// Handle to a mounted consumer.
///
/// Dropping the handle unmounts the consumer, which also detaches its store
/// subscription.
#[must_use = "dropping a MountHandle unmounts the consumer"]
pub struct MountHandle {
    host: Weak<HostInner>,
    id: u64,
}

impl MountHandle {
    /// Unmount the consumer. Idempotent.
    pub fn unmount(&self) {
        if let Some(inner) = self.host.upgrade() {
            if inner.consumers.lock().swap_remove(&self.id).is_some() {
                trace!(id = self.id, "consumer unmounted");
            }
        }
    }

    /// Number of times the consumer has rendered, counting the initial
    /// frame.
    pub fn render_count(&self) -> usize {
        self.host
            .upgrade()
            .and_then(|inner| {
                inner
                    .consumers
                    .lock()
                    .get(&self.id)
                    .map(|consumer| consumer.render_count.load(Ordering::SeqCst))
            })
            .unwrap_or(0)
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl fmt::Debug for MountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountHandle").field("id", &self.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
