//! Incident JSON.
//!
//! ```text
//! {
//!     "number": 101,                              // int >= 0
//!     "priority": 3,                              // int {1,3,5}
//!     "summary": "Diapers, please",
//!     "location": { ... },                        // see location.rs
//!     "ranger_handles": ["Santa Cruz"],
//!     "incident_types": ["Law Enforcement"],
//!     "report_entries": [
//!         {
//!             "author": "Hot Yogi",
//!             "created": "2014-08-30T21:12:50Z",
//!             "system_entry": false,
//!             "text": "Need diapers\nPronto"
//!         }
//!     ],
//!     "created": "2014-08-30T21:38:11Z",
//!     "state": "closed"
//! }
//! ```

use serde_json::{Map, Value};
use tracing::warn;

use super::error::{DecodeError, DecodeResult};
use super::fields::{
    as_object, get, optional_bool, optional_int, optional_string, optional_string_array,
    optional_timestamp, required, string_value, timestamp_value,
};
use super::location::{decode_location, encode_location};
use crate::model::{
    Incident, IncidentNumber, IncidentPriority, IncidentState, Ranger, ReportEntry,
};

/// Decode an incident number, rejecting negatives and non-integers.
pub(crate) fn decode_number(value: &Value, field: &'static str) -> DecodeResult<IncidentNumber> {
    if let Some(number) = value.as_u64() {
        return Ok(number);
    }
    match value.as_i64() {
        Some(negative) => Err(DecodeError::NegativeIncidentNumber(negative)),
        None => Err(DecodeError::InvalidDataType {
            field,
            expected: "integer",
        }),
    }
}

fn decode_priority(value: i64) -> DecodeResult<IncidentPriority> {
    match value {
        1 | 2 => Ok(IncidentPriority::High),
        3 => Ok(IncidentPriority::Normal),
        4 | 5 => Ok(IncidentPriority::Low),
        other => Err(DecodeError::UnknownPriority(other)),
    }
}

fn state_name(state: IncidentState) -> &'static str {
    match state {
        IncidentState::New => "new",
        IncidentState::OnHold => "on_hold",
        IncidentState::Dispatched => "dispatched",
        IncidentState::OnScene => "on_scene",
        IncidentState::Closed => "closed",
    }
}

fn decode_state(name: String) -> DecodeResult<IncidentState> {
    IncidentState::ALL
        .into_iter()
        .find(|state| state_name(*state) == name)
        .ok_or(DecodeError::UnknownIncidentState(name))
}

fn decode_report_entry(value: &Value, number: IncidentNumber) -> DecodeResult<ReportEntry> {
    let json = as_object(value, "report_entries")?;

    let author = string_value(required(json, "author")?, "author")?;
    let created = timestamp_value(required(json, "created")?, "created")?;
    let system_entry = optional_bool(json, "system_entry")?.unwrap_or(false);
    let text = match get(json, "text") {
        Some(text) => string_value(text, "text")?,
        None => {
            warn!(incident = number, "Report entry has no text");
            String::new()
        }
    };

    Ok(ReportEntry::with_created(
        Ranger::new(author),
        text,
        created,
        system_entry,
    ))
}

/// Decode an incident object.
pub fn decode_incident(value: &Value) -> DecodeResult<Incident> {
    let json = as_object(value, "incident")?;

    let number = decode_number(required(json, "number")?, "number")?;

    let priority = optional_int(json, "priority")?
        .map(decode_priority)
        .transpose()?;

    let location = get(json, "location").map(decode_location).transpose()?;

    let rangers = optional_string_array(json, "ranger_handles")?
        .map(|handles| handles.into_iter().map(Ranger::new).collect());

    let incident_types =
        optional_string_array(json, "incident_types")?.map(|types| types.into_iter().collect());

    let report_entries = match get(json, "report_entries") {
        None => None,
        Some(entries) => {
            let entries = entries.as_array().ok_or(DecodeError::InvalidDataType {
                field: "report_entries",
                expected: "array of objects",
            })?;
            Some(
                entries
                    .iter()
                    .map(|entry| decode_report_entry(entry, number))
                    .collect::<DecodeResult<Vec<_>>>()?,
            )
        }
    };

    let state = optional_string(json, "state")?
        .map(decode_state)
        .transpose()?;

    let mut incident = Incident::new(Some(number));
    incident.priority = priority;
    incident.summary = optional_string(json, "summary")?;
    incident.location = location;
    incident.rangers = rangers;
    incident.incident_types = incident_types;
    incident.report_entries = report_entries;
    incident.created = optional_timestamp(json, "created")?;
    incident.state = state;
    Ok(incident)
}

fn encode_report_entry(entry: &ReportEntry) -> Value {
    let mut json = Map::new();
    json.insert("author".into(), Value::from(entry.author().handle.as_str()));
    json.insert("created".into(), Value::from(entry.created().to_rfc3339()));
    json.insert("system_entry".into(), Value::from(entry.is_system_entry()));
    json.insert("text".into(), Value::from(entry.text()));
    Value::Object(json)
}

/// Encode an incident object.
///
/// Absent fields are omitted (never `null`); ranger handles and incident
/// types are emitted in lexicographic order.
pub fn encode_incident(incident: &Incident) -> Value {
    let mut json = Map::new();

    if let Some(number) = incident.number() {
        json.insert("number".into(), Value::from(number));
    }
    if let Some(priority) = incident.priority {
        json.insert("priority".into(), Value::from(priority.value()));
    }
    if let Some(summary) = &incident.summary {
        json.insert("summary".into(), Value::from(summary.as_str()));
    }
    if let Some(location) = &incident.location {
        json.insert("location".into(), encode_location(location));
    }
    if let Some(rangers) = &incident.rangers {
        let mut handles: Vec<&str> = rangers.iter().map(|r| r.handle.as_str()).collect();
        handles.sort_unstable();
        json.insert("ranger_handles".into(), Value::from(handles));
    }
    if let Some(incident_types) = &incident.incident_types {
        let mut types: Vec<&str> = incident_types.iter().map(String::as_str).collect();
        types.sort_unstable();
        json.insert("incident_types".into(), Value::from(types));
    }
    if let Some(entries) = &incident.report_entries {
        json.insert(
            "report_entries".into(),
            Value::Array(entries.iter().map(encode_report_entry).collect()),
        );
    }
    if let Some(created) = incident.created {
        json.insert("created".into(), Value::from(created.to_rfc3339()));
    }
    if let Some(state) = incident.state {
        json.insert("state".into(), Value::from(state_name(state)));
    }

    Value::Object(json)
}
