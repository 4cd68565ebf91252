//! Location JSON.
//!
//! ```text
//! {
//!     "name": "Camp Fishes",
//!     "type": "garett",              // "text" (default) or "garett"
//!     "concentric": 11,              // garett only
//!     "radial_hour": 8,              // garett only
//!     "radial_minute": 15,           // garett only
//!     "description": "Large dome"
//! }
//! ```

use serde_json::{Map, Value};

use super::error::{DecodeError, DecodeResult};
use super::fields::{as_object, optional_int, optional_string, optional_u8};
use crate::model::{Address, ConcentricStreet, Location};

const TYPE_TEXT: &str = "text";
const TYPE_GARETT: &str = "garett";

/// Decode a location object.
pub fn decode_location(value: &Value) -> DecodeResult<Location> {
    let json = as_object(value, "location")?;

    let location_type = optional_string(json, "type")?.unwrap_or_else(|| TYPE_TEXT.to_string());
    let description = optional_string(json, "description")?;

    let address = match location_type.as_str() {
        TYPE_TEXT => Address::TextOnly { description },
        TYPE_GARETT => {
            let concentric = optional_int(json, "concentric")?
                .map(|value| {
                    ConcentricStreet::from_value(value)
                        .ok_or(DecodeError::UnknownConcentricStreet(value))
                })
                .transpose()?;

            Address::RodGarett {
                concentric,
                radial_hour: optional_u8(json, "radial_hour")?,
                radial_minute: optional_u8(json, "radial_minute")?,
                description,
            }
        }
        _ => return Err(DecodeError::UnknownLocationType(location_type)),
    };

    Ok(Location {
        name: optional_string(json, "name")?,
        address: Some(address),
    })
}

/// Encode a location object. Absent fields are omitted.
pub fn encode_location(location: &Location) -> Value {
    let mut json = Map::new();

    if let Some(name) = &location.name {
        json.insert("name".into(), Value::from(name.as_str()));
    }

    match &location.address {
        None => {
            json.insert("type".into(), Value::from(TYPE_TEXT));
        }
        Some(Address::TextOnly { description }) => {
            json.insert("type".into(), Value::from(TYPE_TEXT));
            if let Some(description) = description {
                json.insert("description".into(), Value::from(description.as_str()));
            }
        }
        Some(Address::RodGarett {
            concentric,
            radial_hour,
            radial_minute,
            description,
        }) => {
            json.insert("type".into(), Value::from(TYPE_GARETT));
            if let Some(concentric) = concentric {
                json.insert("concentric".into(), Value::from(concentric.value()));
            }
            if let Some(hour) = radial_hour {
                json.insert("radial_hour".into(), Value::from(*hour));
            }
            if let Some(minute) = radial_minute {
                json.insert("radial_minute".into(), Value::from(*minute));
            }
            if let Some(description) = description {
                json.insert("description".into(), Value::from(description.as_str()));
            }
        }
    }

    Value::Object(json)
}
