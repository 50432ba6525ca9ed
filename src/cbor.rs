//! Thin layer over [ciborium] used by every wire structure in this crate.
//!
//! Decoded CBOR is always handled as a [ciborium::Value], a closed set of variants
//! (integer, byte string, text string, array, map, tag, bool, float, null).
//! Wire structures convert to and from it by hand, using the map helpers below.
use std::io::Cursor;

use ciborium::Value;
use serde::{de, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CborError {
    /// CBOR decoding failure.
    #[error("CBOR decoding failure: {0}")]
    DecodeFailed(String),
    /// CBOR encoding failure.
    #[error("CBOR encoding failure")]
    EncodeFailed,
}

pub fn to_vec<T>(value: &T) -> Result<Vec<u8>, CborError>
where
    T: Serialize,
{
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|_| CborError::EncodeFailed)?;
    Ok(buf)
}

/// Decodes exactly one data item. Bytes left over after it are an error.
pub fn from_slice<T>(slice: &[u8]) -> Result<T, CborError>
where
    T: de::DeserializeOwned,
{
    let mut cursor = Cursor::new(slice);
    let value = ciborium::from_reader(&mut cursor)
        .map_err(|e| CborError::DecodeFailed(e.to_string()))?;
    let consumed = cursor.position() as usize;
    if consumed != slice.len() {
        return Err(CborError::DecodeFailed(format!(
            "{} trailing bytes",
            slice.len() - consumed
        )));
    }
    Ok(value)
}

/// Removes the entry stored under `key` from a decoded CBOR map and returns its value.
pub(crate) fn remove_entry(map: &mut Vec<(Value, Value)>, key: &Value) -> Option<Value> {
    let index = map.iter().position(|(k, _)| k == key)?;
    Some(map.remove(index).1)
}

pub(crate) fn int_key(label: i64) -> Value {
    Value::Integer(label.into())
}

pub(crate) fn text_key(label: &str) -> Value {
    Value::Text(label.to_string())
}

/// The value as an unsigned integer, if it is one.
pub fn as_u64(value: &Value) -> Option<u64> {
    value.as_integer().and_then(|i| u64::try_from(i).ok())
}

pub fn into_map(value: Value) -> Option<Vec<(Value, Value)>> {
    value.into_map().ok()
}

/// Name of the variant, used in error messages.
pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "int",
        Value::Bytes(_) => "bstr",
        Value::Float(_) => "float",
        Value::Text(_) => "tstr",
        Value::Bool(_) => "bool",
        Value::Null => "null",
        Value::Tag(_, _) => "tag",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        _ => "unknown",
    }
}
