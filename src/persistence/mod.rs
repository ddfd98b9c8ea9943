//! Output sinks
//!
//! Visitors write rows of [`Value`]s to a [`PersistenceMechanism`]. A sink is
//! shared by every worker thread, so implementations serialize writes
//! internally: one `write` call is one row and rows never interleave.

/// CSV file sink
pub mod csv;

pub use csv::CsvFile;

use crate::error::PersistenceError;
use std::fmt;

/// One cell of an output row
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Int(i64),
    UInt(u64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Text(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{}", n),
            Value::UInt(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::UInt(n as u64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Destination for rows produced by visitors
pub trait PersistenceMechanism: Send + Sync {
    /// Append one row; safe to call from several threads
    fn write(&self, row: &[Value]) -> Result<(), PersistenceError>;

    /// Release the destination; later calls are no-ops
    fn close(&self) -> Result<(), PersistenceError>;
}

/// Sink that discards every row
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPersistence;

impl PersistenceMechanism for NoPersistence {
    fn write(&self, _row: &[Value]) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn close(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}
