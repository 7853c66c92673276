//! Host Synchronization
//!
//! The store and binding layers do not decide when a consumer re-renders.
//! That job belongs to a host runtime supplying one capability: given a way
//! to subscribe to raw change notifications and a way to produce the latest
//! snapshot, re-invoke a consumer's computation whenever the subscription
//! fires and the snapshot reference actually changed. Two snapshot calls
//! returning the same reference mean "nothing changed".
//!
//! [`HostRuntime`] is that capability as an injected interface. Any
//! scheduler honoring the contract can drive bindings; this crate does not
//! reimplement a UI runtime. [`PollingHost`] is the bundled hand-rolled
//! driver for non-UI contexts: it marks consumers dirty on notification and
//! re-renders the changed ones when explicitly flushed, which is exactly
//! what tests need.

mod polling;

use std::sync::Arc;

use crate::binding::Binding;
use crate::store::StateRecord;

pub use polling::{MountHandle, PollingHost, RenderFn};

/// The external synchronization capability a host runtime must supply.
///
/// Contract: after `mount` returns, the host re-invokes `render` with the
/// binding's latest snapshot whenever the binding's store signals a change
/// AND the comparator returns a reference different from the previously
/// delivered one. An identical reference must be treated as "nothing
/// changed" and produce no render.
pub trait HostRuntime {
    /// Handle controlling the mounted consumer's lifetime.
    type Handle;

    /// Mount a consumer driven by `binding`.
    fn mount<F>(&self, binding: &Binding, render: F) -> Self::Handle
    where
        F: FnMut(Arc<StateRecord>) + Send + 'static;
}
