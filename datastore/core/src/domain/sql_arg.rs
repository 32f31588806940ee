// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Positional SQL Arguments
//!
//! Owned, ordered argument values for `$N` placeholders. Query fragments are
//! built as `(String, Vec<SqlArg>)` pairs so the tenant rewriter can append
//! the site ULID and compute its position before anything is bound.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A single positional argument for a PostgreSQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(Value),
    /// Bound as a text-typed NULL
    Null,
}

impl SqlArg {
    /// Text view of the argument, if it is textual
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlArg::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Plain JSON rendering used in statement logs
    pub fn to_json(&self) -> Value {
        match self {
            SqlArg::Text(s) => Value::String(s.clone()),
            SqlArg::Int(i) => Value::from(*i),
            SqlArg::Float(f) => Value::from(*f),
            SqlArg::Bool(b) => Value::Bool(*b),
            SqlArg::Uuid(u) => Value::String(u.to_string()),
            SqlArg::Timestamp(t) => Value::String(t.to_rfc3339()),
            SqlArg::Json(v) => v.clone(),
            SqlArg::Null => Value::Null,
        }
    }
}

impl From<&str> for SqlArg {
    fn from(value: &str) -> Self {
        SqlArg::Text(value.to_string())
    }
}

impl From<String> for SqlArg {
    fn from(value: String) -> Self {
        SqlArg::Text(value)
    }
}

impl From<&String> for SqlArg {
    fn from(value: &String) -> Self {
        SqlArg::Text(value.clone())
    }
}

impl From<i64> for SqlArg {
    fn from(value: i64) -> Self {
        SqlArg::Int(value)
    }
}

impl From<i32> for SqlArg {
    fn from(value: i32) -> Self {
        SqlArg::Int(value.into())
    }
}

impl From<f64> for SqlArg {
    fn from(value: f64) -> Self {
        SqlArg::Float(value)
    }
}

impl From<bool> for SqlArg {
    fn from(value: bool) -> Self {
        SqlArg::Bool(value)
    }
}

impl From<Uuid> for SqlArg {
    fn from(value: Uuid) -> Self {
        SqlArg::Uuid(value)
    }
}

impl From<DateTime<Utc>> for SqlArg {
    fn from(value: DateTime<Utc>) -> Self {
        SqlArg::Timestamp(value)
    }
}

impl From<Value> for SqlArg {
    fn from(value: Value) -> Self {
        SqlArg::Json(value)
    }
}

impl<T: Into<SqlArg>> From<Option<T>> for SqlArg {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlArg::Null)
    }
}

/// Build a `Vec<SqlArg>` from heterogeneous values.
///
/// ```
/// use sitestore_core::sql_args;
/// let args = sql_args!["draft", 10_i64, true];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! sql_args {
    () => { ::std::vec::Vec::<$crate::domain::sql_arg::SqlArg>::new() };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::domain::sql_arg::SqlArg::from($arg)),+]
    };
}
