//! Literal values staged for insertion or used in update assignments.

use crate::error::{UpsertError, UpsertResult};
use crate::escape::escape_str;
use std::fmt;

/// Dynamic value type for staged rows and extra update fields.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`, e.g. `BIGINT UNSIGNED` keys.
    UInt(u64),
    Float(f64),
    String(String),
    /// SQL expression embedded verbatim, e.g. `NOW()`.
    Raw(String),
}

impl SqlValue {
    /// Wrap a SQL expression that must not be quoted.
    pub fn raw(expr: impl Into<String>) -> Self {
        SqlValue::Raw(expr.into())
    }

    /// Convert a JSON scalar into a value.
    ///
    /// Arrays and objects have no MySQL literal form and are rejected.
    pub fn from_json(value: &serde_json::Value) -> UpsertResult<Self> {
        match value {
            serde_json::Value::Null => Ok(SqlValue::Null),
            serde_json::Value::Bool(b) => Ok(SqlValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlValue::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(SqlValue::UInt(u))
                } else if let Some(f) = n.as_f64() {
                    Ok(SqlValue::Float(f))
                } else {
                    Err(UpsertError::InvalidValue(format!("number out of range: {}", n)))
                }
            }
            serde_json::Value::String(s) => Ok(SqlValue::String(s.clone())),
            other => Err(UpsertError::InvalidValue(format!(
                "expected a scalar, found {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(n) => write!(f, "{}", n),
            SqlValue::UInt(n) => write!(f, "{}", n),
            SqlValue::Float(n) => write!(f, "{}", n),
            SqlValue::String(s) => write!(f, "'{}'", escape_str(s)),
            SqlValue::Raw(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => SqlValue::Int(i),
            Err(_) => SqlValue::UInt(v),
        }
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
