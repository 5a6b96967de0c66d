//! In-memory MessagePack value tree.
//!
//! A [`Value`] is an acyclic, owned tree: every container (`Array`, `Map`)
//! takes ownership of its elements at construction time, so there is no
//! shared subtree and no reference counting. Cloning a `Value` performs a
//! full deep copy; dropping one releases every descendant exactly once
//! (for free, via the derived `Drop` glue on `Vec`/`String`).

use crate::error::{DecodeError, Error, Result};

/// A single MessagePack value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The `nil` value.
    Nil,
    /// A boolean.
    Bool(bool),
    /// A signed integer, as read off the wire or constructed by a caller
    /// who knows the value is signed.
    Int(i64),
    /// An unsigned integer that does not fit in `i64` (or was explicitly
    /// constructed as unsigned).
    UInt(u64),
    /// A 32- or 64-bit float, always widened to `f64`.
    Float(f64),
    /// A string. UTF-8 by convention but not enforced — the wire format's
    /// `str` family carries arbitrary bytes.
    Str(Vec<u8>),
    /// Binary data (the wire format's `bin` family).
    Bin(Vec<u8>),
    /// An ordered sequence of values.
    Array(Vec<Value>),
    /// An ordered sequence of key/value pairs. The wire format permits
    /// arbitrary keys; this crate does not restrict them, but callers
    /// exchanging editor RPC payloads will typically only see `Str` keys.
    Map(Vec<(Value, Value)>),
    /// A MessagePack extension value: an 8-bit type tag plus opaque bytes.
    Ext {
        /// The extension type tag.
        typ: i8,
        /// The extension payload.
        data: Vec<u8>,
    },
    /// The MessagePack timestamp extension (type -1), decoded into its
    /// component fields rather than left as an opaque `Ext`.
    Timestamp {
        /// Seconds since the Unix epoch.
        seconds: i64,
        /// Nanosecond component, `0..1_000_000_000`.
        nanoseconds: u32,
    },
}

impl Value {
    /// Construct a string value from anything convertible to `String`.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into().into_bytes())
    }

    /// Construct a binary value.
    pub fn bin(data: impl Into<Vec<u8>>) -> Self {
        Value::Bin(data.into())
    }

    /// Construct an array value.
    pub fn array(items: impl Into<Vec<Value>>) -> Self {
        Value::Array(items.into())
    }

    /// Construct a map value from key/value pairs, preserving the order
    /// given.
    pub fn map(entries: impl Into<Vec<(Value, Value)>>) -> Self {
        Value::Map(entries.into())
    }

    /// `true` if this is `Value::Nil`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Borrow this value as a UTF-8 `str`, lossily-decoding `Str` bytes.
    pub fn as_str(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            Value::Str(bytes) => Some(String::from_utf8_lossy(bytes)),
            _ => None,
        }
    }

    /// Borrow this value as an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow this value as a map.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Require this value to be a string, failing with
    /// [`DecodeError::InvalidFieldType`] otherwise.
    pub fn expect_str(&self) -> Result<std::borrow::Cow<'_, str>> {
        self.as_str()
            .ok_or_else(|| field_type_error("expected a string", self))
    }

    /// Require this value to be an array.
    pub fn expect_array(&self) -> Result<&[Value]> {
        self.as_array()
            .ok_or_else(|| field_type_error("expected an array", self))
    }

    /// Require this value to be a map.
    pub fn expect_map(&self) -> Result<&[(Value, Value)]> {
        self.as_map()
            .ok_or_else(|| field_type_error("expected a map", self))
    }

    /// Require this value to be a boolean.
    pub fn expect_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(field_type_error("expected a bool", self)),
        }
    }

    /// Coerce this value to `i64`. Fails with `Overflow` (surfaced as
    /// [`DecodeError::InvalidFieldType`]) if it is an unsigned integer
    /// wider than `i64::MAX`.
    pub fn expect_i64(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::UInt(u) => i64::try_from(*u)
                .map_err(|_| field_type_error("integer overflow (u64 -> i64)", self)),
            _ => Err(field_type_error("expected an integer", self)),
        }
    }

    /// Coerce this value to `u64`. Fails with `Overflow` if it is a
    /// negative signed integer.
    pub fn expect_u64(&self) -> Result<u64> {
        match self {
            Value::UInt(u) => Ok(*u),
            Value::Int(i) => u64::try_from(*i)
                .map_err(|_| field_type_error("integer overflow (negative i64 -> u64)", self)),
            _ => Err(field_type_error("expected an integer", self)),
        }
    }

    /// Coerce this value to `f64`.
    pub fn expect_f64(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::UInt(u) => Ok(*u as f64),
            _ => Err(field_type_error("expected a float", self)),
        }
    }
}

fn field_type_error(msg: &str, got: &Value) -> Error {
    Error::Decode(DecodeError::InvalidFieldType(format!(
        "{msg}, got {got:?}"
    )))
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into_bytes())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(data: Vec<u8>) -> Self {
        Value::Bin(data)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_clone_is_independent() {
        let original = Value::array(vec![Value::str("a"), Value::bin(vec![1, 2, 3])]);
        let mut cloned = original.clone();
        if let Value::Array(items) = &mut cloned {
            items.push(Value::Nil);
        }
        assert_eq!(original.as_array().unwrap().len(), 2);
        assert_eq!(cloned.as_array().unwrap().len(), 3);
    }

    #[test]
    fn expect_i64_overflow_on_large_uint() {
        let v = Value::UInt(u64::MAX);
        assert!(v.expect_i64().is_err());
    }

    #[test]
    fn expect_u64_overflow_on_negative_int() {
        let v = Value::Int(-1);
        assert!(v.expect_u64().is_err());
    }

    #[test]
    fn expect_u64_accepts_nonnegative_int() {
        let v = Value::Int(42);
        assert_eq!(v.expect_u64().unwrap(), 42);
    }

    #[test]
    fn as_str_lossily_decodes() {
        let v = Value::Str(vec![0x68, 0x69]);
        assert_eq!(v.as_str().unwrap(), "hi");
    }

    #[test]
    fn map_preserves_insertion_order() {
        let m = Value::map(vec![
            (Value::str("b"), Value::Int(2)),
            (Value::str("a"), Value::Int(1)),
        ]);
        let entries = m.as_map().unwrap();
        assert_eq!(entries[0].0.as_str().unwrap(), "b");
        assert_eq!(entries[1].0.as_str().unwrap(), "a");
    }
}
