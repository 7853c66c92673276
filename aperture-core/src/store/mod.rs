//! Observable State Store
//!
//! This module implements the ownership side of the system: one mutable
//! state record per store, updated by shallow merge and observed through a
//! flat listener set.
//!
//! # Concepts
//!
//! ## Records and Values
//!
//! A [`StateRecord`] is an open-shape mapping from field name to [`Value`].
//! Records are replaced wholesale on every write; fields untouched by a
//! write keep their identity, which is what makes reference comparison a
//! sound change-detection strategy downstream.
//!
//! ## Stores
//!
//! A [`Store`] owns exactly one record plus a set of change listeners.
//! [`Store::set_state`] merges a partial record in, installs the result as a
//! new record, and synchronously notifies every listener before returning.
//!
//! ## Subscriptions
//!
//! [`Store::subscribe`] registers an identity-keyed, de-duplicated callback
//! and returns a [`Subscription`] disposer. Removal is idempotent and also
//! happens when the disposer is dropped.
//!
//! There are no failure paths here: no validation, no I/O, no schema. A
//! write may introduce new field names; that is accepted behavior.

mod record;
mod store;
mod value;

pub use record::StateRecord;
pub use store::{create_store, Listener, Store, Subscription};
pub use value::{KindError, Value, ValueKind};
