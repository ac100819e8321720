//! The row value type shared by the storage core and the SQL layer.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single cell in a row.
///
/// This is the only value representation the storage core understands;
/// everything the heap encodes or the B+Tree indexes is built out of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// A row is just the ordered values for a table's columns; the schema
/// supplies the column names that give each position meaning.
pub type Row = Vec<Value>;

/// Encode a row as compact, self-describing UTF-8 text.
///
/// Encoding is JSON so that decode is exactly the inverse of encode for
/// every supported value, and so that two equal rows always encode to the
/// same byte length (serde_json's array/enum encoding is a pure function
/// of the value, not of insertion history).
pub fn encode_row(row: &[Value]) -> Vec<u8> {
    // `to_vec` never fails for this value type: no maps, no non-finite
    // float special-casing beyond what serde_json already supports.
    serde_json::to_vec(row).expect("row values are always JSON-serializable")
}

pub fn decode_row(bytes: &[u8]) -> Result<Row, serde_json::Error> {
    serde_json::from_slice(bytes)
}
