// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed extraction from rows.
//!
//! Destinations are chosen at compile time: a tuple of [`FromValue`] types
//! says how many columns a row must carry and how each one converts.

use chrono::{DateTime, Utc};

use crate::error::SluiceError;
use crate::value::{parse_timestamp, Value};

/// Conversion from a single column value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, SluiceError>;
}

/// Conversion from a whole row.
pub trait FromRow: Sized {
    fn from_row(row: &[Value]) -> Result<Self, SluiceError>;
}

/// Extract column `index` of `row` as `T`.
pub fn column<T: FromValue>(row: &[Value], index: usize) -> Result<T, SluiceError> {
    let value = row.get(index).ok_or(SluiceError::Scan {
        expected: index + 1,
        actual: row.len(),
    })?;
    T::from_value(value)
}

fn unsupported(value: &Value, target: &'static str) -> SluiceError {
    SluiceError::UnsupportedType {
        type_name: value.type_name().to_string(),
        target,
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, SluiceError> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, SluiceError> {
        match value {
            Value::Integer(i) => Ok(*i),
            Value::Timestamp(ts) => Ok(ts.timestamp()),
            other => Err(unsupported(other, "i64")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, SluiceError> {
        match value {
            Value::Integer(i) => i32::try_from(*i).map_err(|_| SluiceError::UnsupportedType {
                type_name: format!("integer {i}"),
                target: "i32",
            }),
            other => Err(unsupported(other, "i32")),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, SluiceError> {
        match value {
            Value::Real(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            other => Err(unsupported(other, "f64")),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, SluiceError> {
        match value {
            Value::Integer(i) => Ok(*i != 0),
            other => Err(unsupported(other, "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, SluiceError> {
        match value {
            Value::Null => Err(unsupported(value, "String")),
            other => Ok(other.to_text()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, SluiceError> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(unsupported(other, "bytes")),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, SluiceError> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            Value::Integer(i) => {
                DateTime::from_timestamp(*i, 0).ok_or_else(|| unsupported(value, "timestamp"))
            }
            Value::Text(s) => parse_timestamp(s).ok_or_else(|| unsupported(value, "timestamp")),
            other => Err(unsupported(other, "timestamp")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, SluiceError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromRow for Vec<Value> {
    fn from_row(row: &[Value]) -> Result<Self, SluiceError> {
        Ok(row.to_vec())
    }
}

macro_rules! tuple_from_row {
    ($len:expr => $($name:ident $idx:tt),+) => {
        impl<$($name: FromValue),+> FromRow for ($($name,)+) {
            fn from_row(row: &[Value]) -> Result<Self, SluiceError> {
                if row.len() != $len {
                    return Err(SluiceError::Scan {
                        expected: $len,
                        actual: row.len(),
                    });
                }
                Ok(($($name::from_value(&row[$idx])?,)+))
            }
        }
    };
}

tuple_from_row!(1 => A 0);
tuple_from_row!(2 => A 0, B 1);
tuple_from_row!(3 => A 0, B 1, C 2);
tuple_from_row!(4 => A 0, B 1, C 2, D 3);
tuple_from_row!(5 => A 0, B 1, C 2, D 3, E 4);
tuple_from_row!(6 => A 0, B 1, C 2, D 3, E 4, F 5);
tuple_from_row!(7 => A 0, B 1, C 2, D 3, E 4, F 5, G 6);
tuple_from_row!(8 => A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
