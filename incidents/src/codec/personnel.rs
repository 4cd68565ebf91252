//! Reference data and index JSON: personnel records, incident types, and the
//! incident list of `[number, etag]` pairs.

use serde_json::Value;

use super::error::{DecodeError, DecodeResult};
use super::fields::{as_object, optional_string, required, string_array, string_value};
use super::incident::decode_number;
use crate::model::{IncidentNumber, Ranger};

/// Decode a personnel record: `{"handle": ..., "name": ..., "status": ...}`.
pub fn decode_ranger(value: &Value) -> DecodeResult<Ranger> {
    let json = as_object(value, "personnel")?;

    Ok(Ranger {
        handle: string_value(required(json, "handle")?, "handle")?,
        name: optional_string(json, "name")?,
        status: optional_string(json, "status")?,
    })
}

/// Decode the incident type list: a JSON array of strings.
pub fn decode_incident_types(value: &Value) -> DecodeResult<Vec<String>> {
    string_array(value, "incident_types")
}

/// Decode one entry of the incident list: `[number, etag]`.
pub fn decode_incident_etag(value: &Value) -> DecodeResult<(IncidentNumber, String)> {
    match value.as_array().map(Vec::as_slice) {
        Some([number, etag]) => Ok((
            decode_number(number, "number")?,
            string_value(etag, "etag")?,
        )),
        _ => Err(DecodeError::InvalidDataType {
            field: "incidents",
            expected: "[number, etag] pair",
        }),
    }
}
