//! Aperture Core
//!
//! This crate provides the core runtime for the Aperture observable state
//! container. It implements:
//!
//! - A store owning one open-shape state record, updated by shallow merge
//!   and observed through a de-duplicated listener set
//! - Selective bindings that hand each consumer an identity-stable snapshot
//!   of just the fields it cares about, plus a write path narrowed to that
//!   same selection
//! - The host-runtime seam: an injected synchronization capability that
//!   decides when consumers re-render, with a polling implementation for
//!   non-UI hosts
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - `store`: values, records, and the store itself (the source of truth)
//! - `binding`: the per-consumer adapter carrying the memoized comparator
//!   and the narrowed dispatcher
//! - `host`: the synchronization contract and the bundled polling driver
//!
//! Everything is synchronous: a write merges, replaces the record, and
//! finishes notifying listeners before it returns. Re-render scheduling is
//! the host runtime's job, not this crate's.
//!
//! # Example
//!
//! ```rust,ignore
//! use aperture_core::{create_store, record, use_bound_state, HostRuntime, PollingHost};
//!
//! let store = create_store(record! { "count" => 0, "name" => "x" });
//!
//! // Observe only the counter.
//! let (_initial, counter) =
//!     use_bound_state(&store, Some(&|s| s.select(&["count"])));
//!
//! let host = PollingHost::new();
//! let _handle = host.mount(&counter, |snapshot| {
//!     println!("count is now {:?}", snapshot.get("count"));
//! });
//!
//! counter.dispatch(record! { "count" => 1 });
//! host.flush(); // re-renders the counter consumer only
//! ```

pub mod binding;
pub mod host;
pub mod store;

// Re-export the main types for convenience
pub use binding::{use_bound_state, Binding, Equality, Update};
pub use host::{HostRuntime, MountHandle, PollingHost, RenderFn};
pub use store::{
    create_store, KindError, Listener, StateRecord, Store, Subscription, Value, ValueKind,
};
