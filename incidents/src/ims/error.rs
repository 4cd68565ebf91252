//! Error types for incident management systems.

use thiserror::Error;

use crate::codec::DecodeError;
use crate::http::{JsonError, TransportError};
use crate::model::IncidentNumber;

/// Result type for incident management operations.
pub type ImsResult<T> = Result<T, ImsError>;

/// Errors raised by an [`IncidentManagementSystem`](super::IncidentManagementSystem).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImsError {
    /// A draft passed to create already carries a number.
    #[error("Incident to create already has number {0}")]
    IncidentNumberPresent(IncidentNumber),

    /// An incident passed to update has no number.
    #[error("Incident to update has no number")]
    IncidentNumberMissing,

    /// No incident with this number is known.
    #[error("No such incident: {0}")]
    NoSuchIncident(IncidentNumber),

    /// A write was attempted without an established connection.
    #[error("Not connected to the incident server")]
    NotConnected,

    /// The request could not be delivered.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered, but not as expected.
    #[error(transparent)]
    Response(#[from] JsonError),

    /// A response body did not match the wire schema.
    #[error("Invalid incident data: {0}")]
    Decode(#[from] DecodeError),

    /// A required response header was absent or malformed.
    #[error("Missing or invalid {header} header from {url}")]
    MissingHeader { header: &'static str, url: String },

    /// A response described a different incident than the one requested.
    #[error("Expected incident {expected}, received {received:?}")]
    IncidentNumberMismatch {
        expected: IncidentNumber,
        received: Option<IncidentNumber>,
    },

    /// A response that should carry a document had none.
    #[error("Empty response from {url}")]
    EmptyResponse { url: String },

    /// The connection was reset before the operation finished.
    #[error("Connection reset before the request completed")]
    ConnectionReset,
}
