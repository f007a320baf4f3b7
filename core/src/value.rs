//! Untyped parameter and result values exchanged with the tracker.
//!
//! # Design
//! XML-RPC carries a small closed set of scalar types plus two containers.
//! `Value` mirrors that set one-to-one so nothing is lost between the wire and
//! the caller. Parameter mappings are `BTreeMap`s: keys are unique and the
//! encoded request is deterministic, which keeps request bodies comparable in
//! tests.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

/// A string-keyed mapping of values; the shape of every request and result.
pub type Params = BTreeMap<String, Value>;

/// A single XML-RPC value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Boolean(bool),
    String(String),
    Double(f64),
    /// ISO-8601 timestamp, kept exactly as the server sent it.
    DateTime(String),
    Base64(Vec<u8>),
    Struct(Params),
    Array(Vec<Value>),
    Nil,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::DateTime(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Int(i) => Some(f64::from(*i)),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Params> {
        match self {
            Value::Struct(members) => Some(members),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Params> for Value {
    fn from(members: Params) -> Self {
        Value::Struct(members)
    }
}

/// Read-only result mapping handed to a method after a successful call.
///
/// Cloning shares the underlying map. There is no way to mutate it, so a
/// result observed by one holder stays fixed even if the method is executed
/// again and receives a fresh `ResultMap`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultMap(Arc<Params>);

impl ResultMap {
    pub fn new(params: Params) -> Self {
        Self(Arc::new(params))
    }

    /// Coerce a raw response value into a result mapping.
    ///
    /// Anything other than a struct becomes the empty mapping.
    pub fn from_response(value: Value) -> Self {
        match value {
            Value::Struct(members) => Self::new(members),
            _ => Self::default(),
        }
    }

    /// Whether two handles point at the same underlying mapping.
    pub fn ptr_eq(&self, other: &ResultMap) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for ResultMap {
    type Target = Params;

    fn deref(&self) -> &Params {
        &self.0
    }
}
