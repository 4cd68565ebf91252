//! Strict accessors for JSON object fields.
//!
//! `null` is read as absent. A present value of the wrong JSON type is an
//! error; nothing is coerced.

use serde_json::{Map, Value};

use super::error::{DecodeError, DecodeResult};
use crate::model::DateTime;

pub(crate) type Object = Map<String, Value>;

/// View a value as an object.
pub(crate) fn as_object<'a>(value: &'a Value, field: &'static str) -> DecodeResult<&'a Object> {
    value.as_object().ok_or(DecodeError::InvalidDataType {
        field,
        expected: "object",
    })
}

/// Look up a field, treating `null` as absent.
pub(crate) fn get<'a>(json: &'a Object, field: &str) -> Option<&'a Value> {
    json.get(field).filter(|v| !v.is_null())
}

pub(crate) fn required<'a>(json: &'a Object, field: &'static str) -> DecodeResult<&'a Value> {
    get(json, field).ok_or(DecodeError::MissingField(field))
}

pub(crate) fn string_value(value: &Value, field: &'static str) -> DecodeResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(DecodeError::InvalidDataType {
            field,
            expected: "string",
        })
}

pub(crate) fn int_value(value: &Value, field: &'static str) -> DecodeResult<i64> {
    value.as_i64().ok_or(DecodeError::InvalidDataType {
        field,
        expected: "integer",
    })
}

pub(crate) fn optional_string(json: &Object, field: &'static str) -> DecodeResult<Option<String>> {
    get(json, field).map(|v| string_value(v, field)).transpose()
}

pub(crate) fn optional_int(json: &Object, field: &'static str) -> DecodeResult<Option<i64>> {
    get(json, field).map(|v| int_value(v, field)).transpose()
}

pub(crate) fn optional_u8(json: &Object, field: &'static str) -> DecodeResult<Option<u8>> {
    optional_int(json, field)?
        .map(|value| u8::try_from(value).map_err(|_| DecodeError::OutOfRange { field, value }))
        .transpose()
}

pub(crate) fn optional_bool(json: &Object, field: &'static str) -> DecodeResult<Option<bool>> {
    get(json, field)
        .map(|v| {
            v.as_bool().ok_or(DecodeError::InvalidDataType {
                field,
                expected: "boolean",
            })
        })
        .transpose()
}

pub(crate) fn optional_string_array(
    json: &Object,
    field: &'static str,
) -> DecodeResult<Option<Vec<String>>> {
    get(json, field)
        .map(|v| string_array(v, field))
        .transpose()
}

pub(crate) fn string_array(value: &Value, field: &'static str) -> DecodeResult<Vec<String>> {
    let invalid = DecodeError::InvalidDataType {
        field,
        expected: "array of strings",
    };
    let items = value.as_array().ok_or_else(|| invalid.clone())?;
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(|| invalid.clone()))
        .collect()
}

pub(crate) fn timestamp_value(value: &Value, field: &'static str) -> DecodeResult<DateTime> {
    let text = string_value(value, field)?;
    DateTime::from_rfc3339(&text).map_err(|_| DecodeError::InvalidTimestamp { field, value: text })
}

pub(crate) fn optional_timestamp(
    json: &Object,
    field: &'static str,
) -> DecodeResult<Option<DateTime>> {
    get(json, field)
        .map(|v| timestamp_value(v, field))
        .transpose()
}
