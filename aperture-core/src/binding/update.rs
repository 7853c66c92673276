//! Binding Updates
//!
//! The write path of a binding accepts two shapes: a literal partial record,
//! or a function of the most recently delivered snapshot. Both arrive here
//! as one [`Update`] so [`Binding::dispatch`] has a single entry point.
//!
//! [`Binding::dispatch`]: super::binding::Binding::dispatch

use std::fmt;

use crate::store::StateRecord;

/// An update accepted by a binding's dispatcher.
pub enum Update {
    /// A literal partial snapshot, merged into the selection as-is.
    Merge(StateRecord),

    /// A function invoked with the most recently delivered snapshot; its
    /// result is merged like a literal partial.
    With(Box<dyn FnOnce(&StateRecord) -> StateRecord + Send>),
}

impl Update {
    /// Functional form: build the partial from the current snapshot.
    pub fn with<F>(f: F) -> Self
    where
        F: FnOnce(&StateRecord) -> StateRecord + Send + 'static,
    {
        Update::With(Box::new(f))
    }

    /// Resolve to a literal partial, invoking the functional form with
    /// `current` if needed.
    pub(crate) fn resolve(self, current: &StateRecord) -> StateRecord {
        match self {
            Update::Merge(partial) => partial,
            Update::With(f) => f(current),
        }
    }
}

impl From<StateRecord> for Update {
    fn from(partial: StateRecord) -> Self {
        Update::Merge(partial)
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Merge(partial) => f.debug_tuple("Merge").field(partial).finish(),
            Update::With(_) => f.write_str("With(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::store::Value;

    #[test]
    fn literal_update_resolves_to_itself() {
        let update = Update::from(record! { "count" => 1 });
        let resolved = update.resolve(&record! { "count" => 0 });

        assert_eq!(resolved.get("count"), Some(&Value::Int(1)));
    }

    #[test]
    fn functional_update_sees_the_current_snapshot() {
        let update = Update::with(|current: &StateRecord| {
            let count = current.get("count").and_then(Value::as_int).unwrap_or(0);
            record! { "count" => count + 1 }
        });

        let resolved = update.resolve(&record! { "count" => 41 });
        assert_eq!(resolved.get("count"), Some(&Value::Int(42)));
    }
}
