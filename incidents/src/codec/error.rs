//! Decode errors for the wire codec.

use thiserror::Error;

/// Result type for decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors produced while decoding wire JSON.
///
/// Each variant names the offending field so a bad record can be reported
/// precisely. A decode error aborts only the one record being decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A required field is absent or null.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field has the wrong JSON type.
    #[error("invalid data type for {field}: expected {expected}")]
    InvalidDataType {
        field: &'static str,
        expected: &'static str,
    },

    /// An integer field is outside its allowed range.
    #[error("value out of range for {field}: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    /// The incident number is negative.
    #[error("negative incident number: {0}")]
    NegativeIncidentNumber(i64),

    /// The priority is not in 1..=5.
    #[error("unknown priority: {0}")]
    UnknownPriority(i64),

    /// The location type is not "text" or "garett".
    #[error("unknown location type: {0:?}")]
    UnknownLocationType(String),

    /// The concentric street value is not a known street.
    #[error("unknown concentric street: {0}")]
    UnknownConcentricStreet(i64),

    /// The state string is not a known incident state.
    #[error("unknown incident state: {0:?}")]
    UnknownIncidentState(String),

    /// A timestamp is not valid RFC 3339.
    #[error("invalid timestamp for {field}: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },
}

impl DecodeError {
    /// The name of the field this error concerns, when there is one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField(field)
            | Self::InvalidDataType { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::InvalidTimestamp { field, .. } => Some(field),
            Self::NegativeIncidentNumber(_) => Some("number"),
            Self::UnknownPriority(_) => Some("priority"),
            Self::UnknownLocationType(_) => Some("type"),
            Self::UnknownConcentricStreet(_) => Some("concentric"),
            Self::UnknownIncidentState(_) => Some("state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_field() {
        let err = DecodeError::InvalidDataType {
            field: "summary",
            expected: "string",
        };
        assert_eq!(
            err.to_string(),
            "invalid data type for summary: expected string"
        );
        assert_eq!(err.field(), Some("summary"));
    }

    #[test]
    fn test_field_for_value_errors() {
        assert_eq!(DecodeError::UnknownPriority(9).field(), Some("priority"));
        assert_eq!(DecodeError::NegativeIncidentNumber(-1).field(), Some("number"));
    }
}
