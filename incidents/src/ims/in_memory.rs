//! Local incident store with no server behind it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{CreateCallback, ImsDelegate, ImsError, ImsResult, IncidentManagementSystem};
use crate::model::{Incident, IncidentNumber, Location, Ranger};

#[derive(Default)]
struct Store {
    incident_types: BTreeSet<String>,
    rangers_by_handle: HashMap<String, Ranger>,
    extra_locations: HashMap<String, Location>,
    incidents_by_number: HashMap<IncidentNumber, Incident>,
}

/// An [`IncidentManagementSystem`] holding everything in memory.
///
/// Numbers are assigned sequentially from 1. Creation completes
/// synchronously, before `create_incident` returns.
#[derive(Default)]
pub struct InMemoryIncidentManagementSystem {
    store: RwLock<Store>,
    delegate: RwLock<Option<Arc<dyn ImsDelegate>>>,
}

impl InMemoryIncidentManagementSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_delegate(&self, delegate: Arc<dyn ImsDelegate>) {
        *self.delegate.write() = Some(delegate);
    }

    pub fn add_incident_type(&self, incident_type: impl Into<String>) {
        self.store.write().incident_types.insert(incident_type.into());
    }

    pub fn add_ranger(&self, ranger: Ranger) {
        self.store
            .write()
            .rangers_by_handle
            .insert(ranger.handle.clone(), ranger);
    }

    /// Register a named location not yet used by any incident.
    ///
    /// Unnamed locations are ignored.
    pub fn add_location(&self, location: Location) {
        match location.name.clone() {
            Some(name) => {
                self.store.write().extra_locations.insert(name, location);
            }
            None => debug!("Ignoring unnamed location"),
        }
    }

    /// Re-announce an incident to the delegate.
    pub fn reload_incident(&self, number: IncidentNumber) -> ImsResult<()> {
        let incident = self
            .store
            .read()
            .incidents_by_number
            .get(&number)
            .cloned()
            .ok_or(ImsError::NoSuchIncident(number))?;
        self.notify(&incident);
        Ok(())
    }

    fn notify(&self, incident: &Incident) {
        let delegate = self.delegate.read().clone();
        if let Some(delegate) = delegate {
            delegate.incident_did_update(incident);
        }
    }
}

impl IncidentManagementSystem for InMemoryIncidentManagementSystem {
    fn incident_types(&self) -> BTreeSet<String> {
        self.store.read().incident_types.clone()
    }

    fn rangers_by_handle(&self) -> HashMap<String, Ranger> {
        self.store.read().rangers_by_handle.clone()
    }

    fn locations_by_name(&self) -> HashMap<String, Location> {
        let store = self.store.read();
        let mut locations = store.extra_locations.clone();
        for incident in store.incidents_by_number.values() {
            if let Some(location) = &incident.location {
                if let Some(name) = &location.name {
                    locations.insert(name.clone(), location.clone());
                }
            }
        }
        locations
    }

    fn incidents_by_number(&self) -> HashMap<IncidentNumber, Incident> {
        self.store.read().incidents_by_number.clone()
    }

    fn reload(&self) {}

    fn create_incident(&self, draft: Incident, callback: CreateCallback) -> ImsResult<()> {
        if let Some(number) = draft.number() {
            return Err(ImsError::IncidentNumberPresent(number));
        }

        let mut incident = draft;
        let number = {
            let mut store = self.store.write();
            let number = store.incidents_by_number.len() as IncidentNumber + 1;
            incident.set_number(number);
            store.incidents_by_number.insert(number, incident.clone());
            number
        };

        info!(number, "Created incident");
        callback(Ok(number));
        self.notify(&incident);
        Ok(())
    }

    fn update_incident(&self, incident: Incident) -> ImsResult<()> {
        let number = incident.number().ok_or(ImsError::IncidentNumberMissing)?;

        {
            let mut store = self.store.write();
            let entry = store
                .incidents_by_number
                .get_mut(&number)
                .ok_or(ImsError::NoSuchIncident(number))?;
            *entry = incident.clone();
        }

        debug!(number, "Updated incident");
        self.notify(&incident);
        Ok(())
    }
}
