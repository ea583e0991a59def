//! JSON encoding of field values.
//!
//! Plain JSON has no byte strings and no sets, so both are written as a
//! tagged wrapper object:
//!
//! ```json
//! {"ext": "bytes", "data": [104, 105]}
//! {"ext": "set",   "data": ["a", "b"]}
//! ```
//!
//! Text and integers use their native JSON form.

use crate::{Error, FieldValue, Result};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Key holding the extension tag.
pub const EXT_TAG: &str = "ext";
/// Tag for byte blobs.
pub const EXT_BYTES: &str = "bytes";
/// Tag for unordered string collections.
pub const EXT_SET: &str = "set";

const EXT_DATA: &str = "data";

fn wrap(tag: &str, data: Vec<Value>) -> Value {
    let mut obj = Map::with_capacity(2);
    obj.insert(EXT_TAG.to_string(), Value::String(tag.to_string()));
    obj.insert(EXT_DATA.to_string(), Value::Array(data));
    Value::Object(obj)
}

/// Encodes a value into its persistent JSON form.
#[must_use]
pub fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Integer(i) => Value::from(*i),
        FieldValue::Bytes(b) => wrap(EXT_BYTES, b.iter().map(|&x| Value::from(x)).collect()),
        FieldValue::Set(s) => wrap(EXT_SET, s.iter().map(|x| Value::String(x.clone())).collect()),
    }
}

/// Decodes a value from its persistent JSON form.
///
/// Unknown extension tags fail with [`Error::UnknownExtension`]. A bare JSON
/// array of strings is accepted as a set.
pub fn decode_value(value: &Value) -> Result<FieldValue> {
    match value {
        Value::String(s) => Ok(FieldValue::Text(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(FieldValue::Integer)
            .ok_or_else(|| Error::MalformedValue(format!("non-integer number {n}"))),
        Value::Array(items) => decode_strings(items).map(FieldValue::Set),
        Value::Object(obj) => decode_extension(obj),
        other => Err(Error::MalformedValue(format!("unsupported JSON value {other}"))),
    }
}

fn decode_extension(obj: &Map<String, Value>) -> Result<FieldValue> {
    let tag = obj
        .get(EXT_TAG)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedValue("object without extension tag".to_string()))?;
    let data = obj
        .get(EXT_DATA)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedValue(format!("extension {tag} without data array")))?;

    match tag {
        EXT_BYTES => data
            .iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| Error::MalformedValue(format!("invalid byte {v}")))
            })
            .collect::<Result<Vec<u8>>>()
            .map(FieldValue::Bytes),
        EXT_SET => decode_strings(data).map(FieldValue::Set),
        other => Err(Error::UnknownExtension(other.to_string())),
    }
}

fn decode_strings(items: &[Value]) -> Result<BTreeSet<String>> {
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::MalformedValue(format!("non-string set element {v}")))
        })
        .collect()
}
