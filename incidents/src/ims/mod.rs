//! Incident management systems.
//!
//! An [`IncidentManagementSystem`] owns a replica of the dispatch desk's
//! data: incident types, rangers, named locations and incidents. Two
//! backends are provided:
//!
//! - [`HttpIncidentManagementSystem`] keeps the replica synchronized with a
//!   remote server over HTTP+JSON.
//! - [`InMemoryIncidentManagementSystem`] keeps everything local, for tests
//!   and offline use.
//!
//! Changes to individual incidents are reported through an [`ImsDelegate`].

mod error;
mod in_memory;
pub mod sync;

use std::collections::{BTreeSet, HashMap};
use std::fmt;

pub use error::{ImsError, ImsResult};
pub use in_memory::InMemoryIncidentManagementSystem;
pub use sync::{
    ConnectionId, ConnectionStatus, HttpIncidentManagementSystem, LoadingGroup,
};

use crate::model::{Incident, IncidentNumber, Location, Ranger};

/// Receives the number assigned to a newly created incident.
pub type CreateCallback = Box<dyn FnOnce(ImsResult<IncidentNumber>) + Send + 'static>;

/// Username and password supplied in answer to an authentication challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Observer of an incident management system.
///
/// Methods are called from whichever thread completed the triggering
/// request, never while the system holds an internal lock.
pub trait ImsDelegate: Send + Sync {
    /// An incident was added or changed in the replica.
    fn incident_did_update(&self, incident: &Incident);

    /// The server demands credentials.
    ///
    /// Returning `None` abandons the connection attempt. With the reqwest
    /// session this runs on a tokio worker thread, so implementations that
    /// wait on user input should do so inside `tokio::task::block_in_place`.
    fn handle_auth(&self, host: &str, port: u16, realm: Option<&str>) -> Option<Credential> {
        let _ = (host, port, realm);
        None
    }
}

/// A store of incidents and the reference data they point at.
///
/// Accessors return copies of the current replica.
pub trait IncidentManagementSystem: Send + Sync {
    /// Known incident types.
    fn incident_types(&self) -> BTreeSet<String>;

    /// Known rangers keyed by handle.
    fn rangers_by_handle(&self) -> HashMap<String, Ranger>;

    /// Known named locations keyed by name.
    fn locations_by_name(&self) -> HashMap<String, Location>;

    /// Known incidents keyed by number.
    fn incidents_by_number(&self) -> HashMap<IncidentNumber, Incident>;

    /// Refresh the replica from its source.
    fn reload(&self);

    /// Create an incident from a draft with no number.
    ///
    /// An `Err` return means the request was never issued and `callback`
    /// will not be called. Otherwise `callback` eventually receives the
    /// assigned number or the reason creation failed.
    fn create_incident(&self, draft: Incident, callback: CreateCallback) -> ImsResult<()>;

    /// Replace an existing incident.
    fn update_incident(&self, incident: Incident) -> ImsResult<()>;

    /// Incidents ordered by number.
    fn incidents_in_order(&self) -> Vec<Incident> {
        let mut incidents: Vec<Incident> = self.incidents_by_number().into_values().collect();
        incidents.sort_by_key(|incident| incident.number());
        incidents
    }
}
