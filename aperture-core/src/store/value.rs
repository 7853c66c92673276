//! Field Values
//!
//! A Value is what a state record stores under each field name. Records are
//! open-shape, so values are a small tagged union: a handful of primitive
//! kinds plus a `Shared` escape hatch that carries any application object
//! behind an `Arc`.
//!
//! # Two Notions of Equality
//!
//! Values support two distinct comparisons, and change detection depends on
//! the difference:
//!
//! - [`Value::same`] is the identity predicate used to decide whether a field
//!   "changed". Primitives compare by value (floats by bit pattern, with
//!   every NaN equal to every NaN and `+0.0` distinct from `-0.0`); strings
//!   compare by value after a pointer short-circuit; `Shared` values compare
//!   strictly by allocation pointer.
//!
//! - `PartialEq` is ordinary value equality with IEEE float semantics
//!   (`NaN != NaN`, `+0.0 == -0.0`). Convenient in tests and assertions, but
//!   it is NOT what drives notifications.
//!
//! Values of different kinds are never `same`: `Int(1)` and `Float(1.0)` are
//! distinct. There is no numeric coercion between kinds.
//!
//! # Cost Model
//!
//! Cloning a value is cheap (a scalar copy or an `Arc` refcount bump), which
//! is what makes whole-record shallow copies on every write affordable.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, Serializer};
use thiserror::Error;

/// The kind of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Shared,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "str",
            ValueKind::Shared => "shared",
        };
        f.write_str(name)
    }
}

/// Error returned by the fallible value conversions when the value holds a
/// different kind than the one requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected {expected} value, found {found}")]
pub struct KindError {
    /// The kind the conversion asked for.
    pub expected: ValueKind,
    /// The kind the value actually holds.
    pub found: ValueKind,
}

/// A single field value in a state record.
///
/// # Example
///
/// ```rust,ignore
/// let count = Value::from(3);
/// let label = Value::from("items");
/// let config = Value::shared(AppConfig::default());
///
/// assert!(count.same(&Value::from(3)));
/// assert!(!config.same(&Value::shared(AppConfig::default())));
/// ```
#[derive(Clone)]
pub enum Value {
    /// The absent/neutral value.
    Null,

    /// A boolean.
    Bool(bool),

    /// A signed integer.
    Int(i64),

    /// A double-precision float. Compared by bit pattern in [`Value::same`].
    Float(f64),

    /// An immutable string, shared by reference.
    Str(Arc<str>),

    /// Any application object, shared by reference. Identity is the `Arc`
    /// allocation, so clones of one `Value` stay `same` while two
    /// independently constructed wrappers around equal data do not.
    Shared(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap an application object in a new shared allocation.
    pub fn shared<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Value::Shared(Arc::new(value))
    }

    /// Wrap an existing shared allocation without copying it.
    ///
    /// Use this when several records or values should observe the same
    /// identity.
    pub fn from_shared(value: Arc<dyn Any + Send + Sync>) -> Self {
        Value::Shared(value)
    }

    /// Get the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Shared(_) => ValueKind::Shared,
        }
    }

    /// Identity comparison: the predicate that decides whether a field
    /// counts as changed.
    ///
    /// - `Bool`/`Int` by value.
    /// - `Float` by bit pattern, except any NaN is `same` as any other NaN.
    ///   `+0.0` and `-0.0` are NOT `same`.
    /// - `Str` by pointer identity, falling back to string value.
    /// - `Shared` strictly by allocation pointer.
    /// - Different kinds are never `same`.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Shared(a), Value::Shared(b)) => shared_ptr_eq(a, b),
            _ => false,
        }
    }

    /// Get the boolean, if this value is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the integer, if this value is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the float, if this value is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the string slice, if this value is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Check whether this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the shared object as a concrete type, if this value is a
    /// `Shared` holding a `T`.
    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: Any,
    {
        match self {
            Value::Shared(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }
}

/// Pointer identity for shared values.
///
/// Compares the data addresses rather than the full fat pointers so that two
/// `Arc`s over one allocation always agree regardless of vtable.
fn shared_ptr_eq(a: &Arc<dyn Any + Send + Sync>, b: &Arc<dyn Any + Send + Sync>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl PartialEq for Value {
    /// Ordinary value equality. Diverges from [`Value::same`] on floats:
    /// `NaN != NaN` and `+0.0 == -0.0` here.
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Shared(a), Value::Shared(b)) => shared_ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Value::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Value::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Value::Shared(_) => f.write_str("Shared(..)"),
        }
    }
}

impl Serialize for Value {
    /// Diagnostic serialization. `Shared` values have no portable form and
    /// serialize as the opaque marker `"<shared>"`.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Str(v) => serializer.serialize_str(v),
            Value::Shared(_) => serializer.serialize_str("<shared>"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<Arc<str>> for Value {
    fn from(v: Arc<str>) -> Self {
        Value::Str(v)
    }
}

impl TryFrom<&Value> for bool {
    type Error = KindError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value.as_bool().ok_or(KindError {
            expected: ValueKind::Bool,
            found: value.kind(),
        })
    }
}

impl TryFrom<&Value> for i64 {
    type Error = KindError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value.as_int().ok_or(KindError {
            expected: ValueKind::Int,
            found: value.kind(),
        })
    }
}

impl TryFrom<&Value> for f64 {
    type Error = KindError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value.as_float().ok_or(KindError {
            expected: ValueKind::Float,
            found: value.kind(),
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_compare_by_value() {
        assert!(Value::from(3).same(&Value::from(3)));
        assert!(!Value::from(3).same(&Value::from(4)));
        assert!(Value::from(true).same(&Value::from(true)));
        assert!(Value::Null.same(&Value::Null));
    }

    #[test]
    fn nan_is_same_as_nan() {
        let a = Value::from(f64::NAN);
        let b = Value::from(f64::NAN);

        // Identity says changed-detection should treat these as one value...
        assert!(a.same(&b));
        // ...while ordinary equality keeps IEEE semantics.
        assert!(a != b);
    }

    #[test]
    fn signed_zeros_are_distinct() {
        let pos = Value::from(0.0);
        let neg = Value::from(-0.0);

        assert!(!pos.same(&neg));
        assert!(pos == neg);
    }

    #[test]
    fn strings_compare_by_value() {
        let a = Value::from("hello");
        let b = Value::from(String::from("hello"));

        assert!(a.same(&b));
        assert!(!a.same(&Value::from("world")));
    }

    #[test]
    fn shared_values_compare_by_pointer() {
        let arc: Arc<dyn std::any::Any + Send + Sync> = Arc::new(vec![1, 2, 3]);
        let a = Value::from_shared(Arc::clone(&arc));
        let b = Value::from_shared(arc);

        // Same allocation: same identity.
        assert!(a.same(&b));
        assert!(a.same(&a.clone()));

        // Equal contents in a fresh allocation: different identity.
        let c = Value::shared(vec![1, 2, 3]);
        assert!(!a.same(&c));
    }

    #[test]
    fn different_kinds_are_never_same() {
        assert!(!Value::from(1).same(&Value::from(1.0)));
        assert!(!Value::from(0).same(&Value::from(false)));
        assert!(!Value::Null.same(&Value::from(0)));
    }

    #[test]
    fn downcast_recovers_shared_object() {
        let value = Value::shared(vec![10u8, 20]);

        assert_eq!(value.downcast_ref::<Vec<u8>>(), Some(&vec![10u8, 20]));
        assert!(value.downcast_ref::<String>().is_none());
        assert!(Value::from(1).downcast_ref::<i64>().is_none());
    }

    #[test]
    fn conversions_report_kind_mismatch() {
        let value = Value::from("three");

        assert_eq!(i64::try_from(&Value::from(3)), Ok(3));

        let err = i64::try_from(&value).unwrap_err();
        assert_eq!(err.expected, ValueKind::Int);
        assert_eq!(err.found, ValueKind::Str);
        assert_eq!(err.to_string(), "expected int value, found str");
    }

    #[test]
    fn serializes_for_diagnostics() {
        assert_eq!(serde_json::to_string(&Value::from(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&Value::from("x")).unwrap(), "\"x\"");
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&Value::shared(7u32)).unwrap(),
            "\"<shared>\""
        );
    }
}
