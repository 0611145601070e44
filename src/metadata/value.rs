//! Metadata value types.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A metadata value that can be attached to a document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    /// Free-form text.
    Text(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Boolean value.
    Boolean(bool),
    /// Ordered sequence of strings (tags, authors, ...).
    List(Vec<String>),
}

impl Eq for MetadataValue {}

impl Hash for MetadataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash discriminant first to distinguish types
        std::mem::discriminant(self).hash(state);

        match self {
            MetadataValue::Text(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => {
                // 0.0 == -0.0, so they must hash alike
                let f = if *f == 0.0 { 0.0f64 } else { *f };
                f.to_bits().hash(state);
            }
            MetadataValue::Boolean(b) => b.hash(state),
            MetadataValue::List(items) => items.hash(state),
        }
    }
}

impl MetadataValue {
    /// Get the type name as a string (for error messages).
    pub fn type_name(&self) -> &'static str {
        match self {
            MetadataValue::Text(_) => "text",
            MetadataValue::Integer(_) => "integer",
            MetadataValue::Float(_) => "float",
            MetadataValue::Boolean(_) => "boolean",
            MetadataValue::List(_) => "list",
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(f) => Some(*f),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            MetadataValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// False only for a NaN or infinite float.
    ///
    /// Such values have no stable identity as a hash key and no JSON form.
    pub fn is_finite(&self) -> bool {
        match self {
            MetadataValue::Float(f) => f.is_finite(),
            _ => true,
        }
    }

    /// Compare two values for ordering (used in range queries).
    /// Returns None if types are incompatible.
    pub fn partial_cmp_value(&self, other: &MetadataValue) -> Option<Ordering> {
        match (self, other) {
            (MetadataValue::Integer(a), MetadataValue::Integer(b)) => a.partial_cmp(b),
            (MetadataValue::Float(a), MetadataValue::Float(b)) => a.partial_cmp(b),
            (MetadataValue::Integer(a), MetadataValue::Float(b)) => (*a as f64).partial_cmp(b),
            (MetadataValue::Float(a), MetadataValue::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (MetadataValue::Text(a), MetadataValue::Text(b)) => a.partial_cmp(b),
            (MetadataValue::Boolean(a), MetadataValue::Boolean(b)) => a.partial_cmp(b),
            (MetadataValue::List(a), MetadataValue::List(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(s) => f.write_str(s),
            MetadataValue::Integer(i) => write!(f, "{}", i),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::Boolean(b) => write!(f, "{}", b),
            MetadataValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Text(s)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Text(s.to_string())
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        MetadataValue::Integer(i)
    }
}

impl From<i32> for MetadataValue {
    fn from(i: i32) -> Self {
        MetadataValue::Integer(i as i64)
    }
}

impl From<u32> for MetadataValue {
    fn from(i: u32) -> Self {
        MetadataValue::Integer(i as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(f: f64) -> Self {
        MetadataValue::Float(f)
    }
}

impl From<f32> for MetadataValue {
    fn from(f: f32) -> Self {
        MetadataValue::Float(f as f64)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Boolean(b)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(v: Vec<String>) -> Self {
        MetadataValue::List(v)
    }
}

impl From<Vec<&str>> for MetadataValue {
    fn from(v: Vec<&str>) -> Self {
        MetadataValue::List(v.into_iter().map(str::to_string).collect())
    }
}
