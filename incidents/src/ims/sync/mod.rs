//! Synchronization with a remote incident server.

mod engine;
mod state;

pub use engine::{HttpIncidentManagementSystem, ETAG_HEADER, INCIDENT_NUMBER_HEADER};
pub use state::{ConnectionId, ConnectionStatus, LoadingGroup};
