//! Consumer Bindings
//!
//! This module implements the consumer side of the system: the adapter that
//! sits between one UI consumer and a store.
//!
//! A [`Binding`] memoizes a selected subset of the store's record and keeps
//! that snapshot's reference stable for as long as none of the selected
//! fields change, so a host runtime comparing references re-renders a
//! consumer exactly when relevant state changed. Writes go back through the
//! same selection: [`Binding::dispatch`] narrows any [`Update`] to the
//! observed key set before forwarding it to the store.
//!
//! The free function [`use_bound_state`] mirrors how a consumer acquires the
//! pair at mount time: the initial snapshot plus the updater handle.

mod binding;
mod update;

pub use binding::{use_bound_state, Binding, Equality};
pub use update::Update;
