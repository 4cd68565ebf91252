//! Incident management system synchronized with a server over HTTP+JSON.
//!
//! The engine pulls four collections from the server (incident types,
//! personnel, locations and incidents) and keeps them in an in-memory
//! replica. Incident details are fetched only when the server's entity tag
//! differs from the cached one.
//!
//! # State machine
//!
//! ```text
//! Reset ──reload──▶ Trying ──ping ok──▶ Idle ──reload──▶ Loading
//!   ▲                  │                  ▲                 │
//!   └──transport error─┴──────────────────┴──last group done┘
//! ```
//!
//! Requests complete on transport threads. Each completion carries the
//! generation of the session that issued it; completions from an abandoned
//! session are dropped.

use std::collections::{BTreeSet, HashMap};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use reqwest::Url;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::state::{ConnectionId, ConnectionStatus, LoadingGroup, LoadingState};
use crate::codec::{
    decode_incident, decode_incident_etag, decode_incident_types, decode_location, decode_ranger,
    encode_incident,
};
use crate::http::{JsonError, JsonHandler, JsonResponse, JsonSession, SessionFactory, TransportError};
use crate::ims::{
    CreateCallback, Credential, ImsDelegate, ImsError, ImsResult, IncidentManagementSystem,
};
use crate::model::{Incident, IncidentNumber, Location, Ranger};

/// Response header carrying an entity tag.
pub const ETAG_HEADER: &str = "ETag";

/// Response header carrying the number of a created incident.
pub const INCIDENT_NUMBER_HEADER: &str = "Incident-Number";

const PING_PATH: &str = "ping/";
const INCIDENT_TYPES_PATH: &str = "incident_types/";
const PERSONNEL_PATH: &str = "personnel/";
const LOCATIONS_PATH: &str = "locations/";
const INCIDENTS_PATH: &str = "incidents/";

#[derive(Default)]
struct Replica {
    incident_types: BTreeSet<String>,
    rangers_by_handle: HashMap<String, Ranger>,
    locations_by_name: HashMap<String, Location>,
    incidents_by_number: HashMap<IncidentNumber, Incident>,
    etags_by_number: HashMap<IncidentNumber, String>,
}

struct Control {
    state: LoadingState,
    session: Option<JsonSession>,
    generation: u64,
}

/// Lock on [`Control`] that publishes the connection status when released.
struct ControlGuard<'a> {
    control: MutexGuard<'a, Control>,
    status: &'a watch::Sender<ConnectionStatus>,
}

impl Deref for ControlGuard<'_> {
    type Target = Control;

    fn deref(&self) -> &Control {
        &self.control
    }
}

impl DerefMut for ControlGuard<'_> {
    fn deref_mut(&mut self) -> &mut Control {
        &mut self.control
    }
}

impl Drop for ControlGuard<'_> {
    fn drop(&mut self) {
        let current = self.control.state.status();
        self.status.send_if_modified(|published| {
            if *published == current {
                false
            } else {
                *published = current;
                true
            }
        });
    }
}

type LoadHandler = fn(&Arc<Engine>, &mut Control, JsonResponse);

struct Engine {
    base_url: Url,
    factory: Arc<dyn SessionFactory>,
    delegate: RwLock<Option<Arc<dyn ImsDelegate>>>,
    control: Mutex<Control>,
    replica: RwLock<Replica>,
    status: watch::Sender<ConnectionStatus>,
}

impl Engine {
    fn lock_control(&self) -> ControlGuard<'_> {
        ControlGuard {
            control: self.control.lock(),
            status: &self.status,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn incident_endpoint(&self, number: IncidentNumber) -> String {
        self.endpoint(&format!("{}{}", INCIDENTS_PATH, number))
    }

    fn notify(&self, incident: &Incident) {
        let delegate = self.delegate.read().clone();
        match delegate {
            Some(delegate) => delegate.incident_did_update(incident),
            None => debug!(number = ?incident.number(), "No delegate to notify"),
        }
    }

    // Connection

    fn reload(self: &Arc<Self>) {
        let mut control = self.lock_control();

        match control.state.status() {
            ConnectionStatus::Reset => {
                info!(url = %self.base_url, "Connecting to incident server");
                self.connect(&mut control, None);
            }
            ConnectionStatus::Trying => debug!("Connection attempt in progress; not reloading"),
            ConnectionStatus::Loading => debug!("Reload already in progress"),
            ConnectionStatus::Idle => {
                debug!("Reloading");
                control.state.transition(LoadingState::loading());
                self.load_incident_types(&mut control);
                self.load_personnel(&mut control);
                self.load_locations(&mut control);
                self.load_incidents(&mut control);
            }
        }
    }

    /// Open a fresh session and ping the server, with credentials if given.
    fn connect(self: &Arc<Self>, control: &mut Control, credential: Option<Credential>) {
        if let Some(previous) = control.session.take() {
            previous.invalidate();
        }

        let session = match self.factory.create_session() {
            Ok(session) => JsonSession::new(session),
            Err(e) => {
                error!(error = %e, "Unable to create HTTP session");
                self.reset(control);
                return;
            }
        };

        control.generation += 1;
        let generation = control.generation;
        let authenticated = credential.is_some();
        let url = self.endpoint(PING_PATH);

        let engine = Arc::clone(self);
        let handler: JsonHandler = Box::new(move |result: Result<JsonResponse, JsonError>| {
            engine.complete_ping(generation, authenticated, result);
        });

        let sent = match &credential {
            None => session.get(&url, handler),
            Some(credential) => session.post(
                &url,
                &json!({
                    "username": credential.username,
                    "password": credential.password,
                }),
                handler,
            ),
        };
        control.session = Some(session);

        match sent {
            Ok(connection) => control.state.transition(LoadingState::Trying(connection)),
            Err(e) => self.transport_failed(control, &e),
        }
    }

    fn complete_ping(
        self: &Arc<Self>,
        generation: u64,
        authenticated: bool,
        result: Result<JsonResponse, JsonError>,
    ) {
        let mut control = self.lock_control();
        if control.generation != generation {
            debug!("Ignoring ping response from an abandoned session");
            return;
        }

        match result {
            Ok(_) => {
                info!(url = %self.base_url, "Connected to incident server");
                control.state.transition(LoadingState::Idle);
            }
            Err(JsonError::AuthenticationRequired { realm }) if !authenticated => {
                info!(realm = ?realm, "Server requires authentication");
                if let Some(session) = control.session.take() {
                    session.invalidate();
                }
                // The hook may block on user input.
                drop(control);

                let credential = self.request_credential(realm.as_deref());

                let mut control = self.lock_control();
                if control.generation != generation {
                    debug!("Connection reset while awaiting credentials");
                    return;
                }
                match credential {
                    Some(credential) => {
                        info!(username = %credential.username, "Retrying with credentials");
                        self.connect(&mut control, Some(credential));
                    }
                    None => {
                        warn!("No credentials supplied");
                        self.reset(&mut control);
                    }
                }
            }
            Err(JsonError::AuthenticationRequired { .. }) => {
                error!("Authentication failed");
                self.reset(&mut control);
            }
            Err(e) => {
                error!(error = %e, "Unable to connect to incident server");
                self.reset(&mut control);
            }
        }
    }

    fn request_credential(&self, realm: Option<&str>) -> Option<Credential> {
        let delegate = self.delegate.read().clone()?;
        let host = self.base_url.host_str().unwrap_or_default();
        let port = self.base_url.port_or_known_default().unwrap_or_default();
        delegate.handle_auth(host, port, realm)
    }

    /// Drop the session and return to `Reset`.
    fn reset(&self, control: &mut Control) {
        if let Some(session) = control.session.take() {
            session.invalidate();
        }
        control.generation += 1;
        control.state.transition(LoadingState::Reset);
    }

    fn transport_failed(&self, control: &mut Control, error: &TransportError) {
        error!(error = %error, "Transport error; resetting connection");
        self.reset(control);
    }

    /// Reset the connection if `error` means the session is unusable.
    fn reset_on_failure(&self, control: &mut Control, error: &JsonError) -> bool {
        match error {
            JsonError::Transport(e) => {
                self.transport_failed(control, e);
                true
            }
            JsonError::AuthenticationRequired { .. } => {
                warn!("Server demands authentication; resetting connection");
                self.reset(control);
                true
            }
            _ => false,
        }
    }

    // Bulk loads

    fn load_incident_types(self: &Arc<Self>, control: &mut Control) {
        self.load_group(
            control,
            LoadingGroup::IncidentTypes,
            ConnectionId::Singleton,
            INCIDENT_TYPES_PATH,
            Engine::apply_incident_types,
        );
    }

    fn load_personnel(self: &Arc<Self>, control: &mut Control) {
        self.load_group(
            control,
            LoadingGroup::Personnel,
            ConnectionId::Singleton,
            PERSONNEL_PATH,
            Engine::apply_personnel,
        );
    }

    fn load_locations(self: &Arc<Self>, control: &mut Control) {
        self.load_group(
            control,
            LoadingGroup::Locations,
            ConnectionId::Singleton,
            LOCATIONS_PATH,
            Engine::apply_locations,
        );
    }

    fn load_incidents(self: &Arc<Self>, control: &mut Control) {
        self.load_group(
            control,
            LoadingGroup::Incidents,
            ConnectionId::IncidentList,
            INCIDENTS_PATH,
            Engine::apply_incident_list,
        );
    }

    fn load_group(
        self: &Arc<Self>,
        control: &mut Control,
        group: LoadingGroup,
        id: ConnectionId,
        path: &str,
        apply: LoadHandler,
    ) {
        let Some(session) = control.session.as_ref() else {
            debug!(%group, "No session; skipping load");
            return;
        };

        let generation = control.generation;
        let engine = Arc::clone(self);
        let handler: JsonHandler = Box::new(move |result: Result<JsonResponse, JsonError>| {
            engine.complete_load(generation, group, id, result, apply);
        });

        match session.get(&self.endpoint(path), handler) {
            Ok(connection) => {
                control.state.add_connection(group, id, connection);
            }
            Err(e) => self.transport_failed(control, &e),
        }
    }

    fn complete_load(
        self: &Arc<Self>,
        generation: u64,
        group: LoadingGroup,
        id: ConnectionId,
        result: Result<JsonResponse, JsonError>,
        apply: LoadHandler,
    ) {
        let mut control = self.lock_control();
        if control.generation != generation {
            debug!(%group, %id, "Ignoring response from an abandoned session");
            return;
        }

        match result {
            Ok(response) => apply(self, &mut control, response),
            Err(e) => {
                if self.reset_on_failure(&mut control, &e) {
                    return;
                }
                warn!(%group, error = %e, "Unable to load");
            }
        }

        control.state.remove_connection(group, id);
    }

    fn apply_incident_types(self: &Arc<Self>, _control: &mut Control, response: JsonResponse) {
        let Some(json) = response.json else {
            warn!(url = %response.url, "No incident types in response");
            return;
        };

        match decode_incident_types(&json) {
            Ok(incident_types) => {
                let incident_types: BTreeSet<String> = incident_types.into_iter().collect();
                info!(count = incident_types.len(), "Loaded incident types");
                self.replica.write().incident_types = incident_types;
            }
            Err(e) => warn!(error = %e, "Invalid incident types"),
        }
    }

    fn apply_personnel(self: &Arc<Self>, _control: &mut Control, response: JsonResponse) {
        let Some(records) = array_body(&response) else {
            return;
        };

        let mut rangers_by_handle = HashMap::with_capacity(records.len());
        for record in records {
            match decode_ranger(record) {
                Ok(ranger) => {
                    rangers_by_handle.insert(ranger.handle.clone(), ranger);
                }
                Err(e) => warn!(error = %e, "Skipping invalid personnel record"),
            }
        }

        info!(count = rangers_by_handle.len(), "Loaded personnel");
        self.replica.write().rangers_by_handle = rangers_by_handle;
    }

    fn apply_locations(self: &Arc<Self>, _control: &mut Control, response: JsonResponse) {
        let Some(records) = array_body(&response) else {
            return;
        };

        let mut locations_by_name = HashMap::with_capacity(records.len());
        for record in records {
            match decode_location(record) {
                Ok(location) => match location.name.clone() {
                    Some(name) => {
                        locations_by_name.insert(name, location);
                    }
                    None => debug!("Skipping unnamed location"),
                },
                Err(e) => warn!(error = %e, "Skipping invalid location"),
            }
        }

        info!(count = locations_by_name.len(), "Loaded locations");
        self.replica.write().locations_by_name = locations_by_name;
    }

    fn apply_incident_list(self: &Arc<Self>, control: &mut Control, response: JsonResponse) {
        let Some(entries) = array_body(&response) else {
            return;
        };

        debug!(count = entries.len(), "Loaded incident list");

        // Detail fetches join the group before the list request leaves it.
        for entry in entries {
            match decode_incident_etag(entry) {
                Ok((number, etag)) => self.fetch_incident(control, number, Some(etag.as_str()), false),
                Err(e) => warn!(error = %e, "Skipping invalid incident list entry"),
            }
        }
    }

    // Incidents

    /// Fetch one incident unless `etag` is already cached.
    ///
    /// Non-solo fetches are tracked in the `Incidents` loading group.
    fn fetch_incident(
        self: &Arc<Self>,
        control: &mut Control,
        number: IncidentNumber,
        etag: Option<&str>,
        solo: bool,
    ) {
        if let Some(etag) = etag {
            let cached = self.replica.read().etags_by_number.get(&number).cloned();
            if cached.as_deref() == Some(etag) {
                debug!(number, etag, "Incident unchanged; not fetching");
                return;
            }
        }

        if !solo
            && control
                .state
                .is_tracked(LoadingGroup::Incidents, ConnectionId::Incident(number))
        {
            debug!(number, "Incident fetch already in flight");
            return;
        }

        let Some(session) = control.session.as_ref() else {
            debug!(number, "No session; not fetching incident");
            return;
        };

        let generation = control.generation;
        let engine = Arc::clone(self);
        let handler: JsonHandler = Box::new(move |result: Result<JsonResponse, JsonError>| {
            engine.complete_incident(generation, number, solo, result);
        });

        match session.get(&self.incident_endpoint(number), handler) {
            Ok(connection) => {
                if !solo {
                    control.state.add_connection(
                        LoadingGroup::Incidents,
                        ConnectionId::Incident(number),
                        connection,
                    );
                }
            }
            Err(e) => self.transport_failed(control, &e),
        }
    }

    fn complete_incident(
        self: &Arc<Self>,
        generation: u64,
        number: IncidentNumber,
        solo: bool,
        result: Result<JsonResponse, JsonError>,
    ) {
        let updated = {
            let mut control = self.lock_control();
            if control.generation != generation {
                debug!(number, "Ignoring incident from an abandoned session");
                return;
            }

            let updated = match result {
                Ok(response) => match self.store_incident(number, response) {
                    Ok(updated) => updated,
                    Err(e) => {
                        warn!(number, error = %e, "Rejected incident response");
                        None
                    }
                },
                Err(e) => {
                    if self.reset_on_failure(&mut control, &e) {
                        return;
                    }
                    warn!(number, error = %e, "Unable to load incident");
                    None
                }
            };

            if !solo {
                control
                    .state
                    .remove_connection(LoadingGroup::Incidents, ConnectionId::Incident(number));
            }
            updated
        };

        if let Some(incident) = updated {
            self.notify(&incident);
        }
    }

    /// Cache an incident document and its entity tag.
    ///
    /// Returns `None` when the tag matches the cached one.
    fn store_incident(
        &self,
        number: IncidentNumber,
        response: JsonResponse,
    ) -> ImsResult<Option<Incident>> {
        let etag = response
            .headers
            .first(ETAG_HEADER)
            .map(str::to_string)
            .ok_or_else(|| ImsError::MissingHeader {
                header: ETAG_HEADER,
                url: response.url.clone(),
            })?;

        let json = response.json.as_ref().ok_or_else(|| ImsError::EmptyResponse {
            url: response.url.clone(),
        })?;

        let incident = decode_incident(json)?;
        if incident.number() != Some(number) {
            return Err(ImsError::IncidentNumberMismatch {
                expected: number,
                received: incident.number(),
            });
        }

        let mut replica = self.replica.write();
        if replica.etags_by_number.get(&number) == Some(&etag) {
            debug!(number, %etag, "Incident unchanged");
            return Ok(None);
        }

        debug!(number, %etag, "Stored incident");
        replica.etags_by_number.insert(number, etag);
        replica.incidents_by_number.insert(number, incident.clone());
        Ok(Some(incident))
    }

    // Writes

    fn live_session(&self, control: &Control) -> ImsResult<JsonSession> {
        match &control.session {
            Some(session) if control.state.status().is_connected() => Ok(session.clone()),
            _ => Err(ImsError::NotConnected),
        }
    }

    fn create_incident(self: &Arc<Self>, draft: Incident, callback: CreateCallback) -> ImsResult<()> {
        if let Some(number) = draft.number() {
            return Err(ImsError::IncidentNumberPresent(number));
        }

        let mut control = self.lock_control();
        let session = self.live_session(&control)?;
        let generation = control.generation;

        let engine = Arc::clone(self);
        let handler: JsonHandler = Box::new(move |result: Result<JsonResponse, JsonError>| {
            engine.complete_create(generation, result, callback);
        });

        match session.post(&self.endpoint(INCIDENTS_PATH), &encode_incident(&draft), handler) {
            Ok(_) => {
                debug!("Creating incident");
                Ok(())
            }
            Err(e) => {
                self.transport_failed(&mut control, &e);
                Err(ImsError::Transport(e))
            }
        }
    }

    fn complete_create(
        self: &Arc<Self>,
        generation: u64,
        result: Result<JsonResponse, JsonError>,
        callback: CreateCallback,
    ) {
        let outcome = {
            let mut control = self.lock_control();
            if control.generation != generation {
                debug!("Create completed on an abandoned session");
                Err(ImsError::ConnectionReset)
            } else {
                match result {
                    Ok(response) => incident_number(&response),
                    Err(e) => {
                        if !self.reset_on_failure(&mut control, &e) {
                            warn!(error = %e, "Unable to create incident");
                        }
                        Err(match e {
                            JsonError::Transport(e) => ImsError::Transport(e),
                            other => ImsError::Response(other),
                        })
                    }
                }
            }
        };

        let created = outcome.as_ref().ok().copied();
        if let Some(number) = created {
            info!(number, "Created incident");
        }
        callback(outcome);

        if let Some(number) = created {
            let mut control = self.lock_control();
            if control.generation == generation {
                self.fetch_incident(&mut control, number, None, true);
            }
        }
    }

    fn update_incident(self: &Arc<Self>, incident: Incident) -> ImsResult<()> {
        let number = incident.number().ok_or(ImsError::IncidentNumberMissing)?;

        let mut control = self.lock_control();
        let session = self.live_session(&control)?;
        let generation = control.generation;

        let engine = Arc::clone(self);
        let handler: JsonHandler = Box::new(move |result: Result<JsonResponse, JsonError>| {
            engine.complete_update(generation, number, result);
        });

        match session.post(&self.incident_endpoint(number), &encode_incident(&incident), handler) {
            Ok(_) => {
                debug!(number, "Updating incident");
                Ok(())
            }
            Err(e) => {
                self.transport_failed(&mut control, &e);
                Err(ImsError::Transport(e))
            }
        }
    }

    fn complete_update(
        self: &Arc<Self>,
        generation: u64,
        number: IncidentNumber,
        result: Result<JsonResponse, JsonError>,
    ) {
        let updated = {
            let mut control = self.lock_control();
            if control.generation != generation {
                debug!(number, "Update completed on an abandoned session");
                return;
            }

            match result {
                Ok(response) => match self.store_incident(number, response) {
                    Ok(updated) => updated,
                    Err(e) => {
                        debug!(number, error = %e, "Update response not cached");
                        None
                    }
                },
                Err(e) => {
                    if self.reset_on_failure(&mut control, &e) {
                        return;
                    }
                    warn!(number, error = %e, "Unable to update incident");
                    None
                }
            }
        };

        if let Some(incident) = &updated {
            self.notify(incident);
        }

        // The server's copy is authoritative.
        let mut control = self.lock_control();
        if control.generation == generation {
            self.fetch_incident(&mut control, number, None, true);
        }
    }
}

fn array_body(response: &JsonResponse) -> Option<&Vec<Value>> {
    let array = response.json.as_ref().and_then(Value::as_array);
    if array.is_none() {
        warn!(url = %response.url, "Expected a JSON array");
    }
    array
}

fn incident_number(response: &JsonResponse) -> ImsResult<IncidentNumber> {
    response
        .headers
        .first(INCIDENT_NUMBER_HEADER)
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| ImsError::MissingHeader {
            header: INCIDENT_NUMBER_HEADER,
            url: response.url.clone(),
        })
}

/// An [`IncidentManagementSystem`] backed by a remote server.
///
/// Cloning yields another handle to the same replica.
#[derive(Clone)]
pub struct HttpIncidentManagementSystem {
    engine: Arc<Engine>,
}

impl HttpIncidentManagementSystem {
    /// Create a disconnected system. The first [`reload`] connects.
    ///
    /// Endpoint paths are resolved relative to `base_url`.
    ///
    /// [`reload`]: IncidentManagementSystem::reload
    pub fn new(mut base_url: Url, factory: Arc<dyn SessionFactory>) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let (status, _) = watch::channel(ConnectionStatus::Reset);

        Self {
            engine: Arc::new(Engine {
                base_url,
                factory,
                delegate: RwLock::new(None),
                control: Mutex::new(Control {
                    state: LoadingState::Reset,
                    session: None,
                    generation: 0,
                }),
                replica: RwLock::new(Replica::default()),
                status,
            }),
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn ImsDelegate>) {
        *self.engine.delegate.write() = Some(delegate);
    }

    pub fn base_url(&self) -> &Url {
        &self.engine.base_url
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.engine.control.lock().state.status()
    }

    /// Subscribe to connection status changes.
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.engine.status.subscribe()
    }

    /// Groups with requests in flight.
    pub fn loading_groups(&self) -> Vec<LoadingGroup> {
        self.engine.control.lock().state.groups()
    }

    /// Number of tracked requests in flight for `group`.
    pub fn outstanding_requests(&self, group: LoadingGroup) -> usize {
        self.engine.control.lock().state.outstanding(group)
    }

    /// The cached entity tag of an incident.
    pub fn cached_etag(&self, number: IncidentNumber) -> Option<String> {
        self.engine.replica.read().etags_by_number.get(&number).cloned()
    }

    /// Fetch one incident.
    ///
    /// Skipped when `etag` matches the cached tag. A non-solo fetch is
    /// tracked as part of the current reload and is only valid while
    /// loading.
    pub fn load_incident(&self, number: IncidentNumber, etag: Option<&str>, solo: bool) {
        let mut control = self.engine.lock_control();
        self.engine.fetch_incident(&mut control, number, etag, solo);
    }

    /// Abandon the session and every request in flight.
    pub fn reset_connection(&self) {
        let mut control = self.engine.lock_control();
        info!("Resetting connection");
        self.engine.reset(&mut control);
    }
}

impl IncidentManagementSystem for HttpIncidentManagementSystem {
    fn incident_types(&self) -> BTreeSet<String> {
        self.engine.replica.read().incident_types.clone()
    }

    fn rangers_by_handle(&self) -> HashMap<String, Ranger> {
        self.engine.replica.read().rangers_by_handle.clone()
    }

    fn locations_by_name(&self) -> HashMap<String, Location> {
        self.engine.replica.read().locations_by_name.clone()
    }

    fn incidents_by_number(&self) -> HashMap<IncidentNumber, Incident> {
        self.engine.replica.read().incidents_by_number.clone()
    }

    fn reload(&self) {
        self.engine.reload();
    }

    fn create_incident(&self, draft: Incident, callback: CreateCallback) -> ImsResult<()> {
        self.engine.create_incident(draft, callback)
    }

    fn update_incident(&self, incident: Incident) -> ImsResult<()> {
        self.engine.update_incident(incident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockSession, MockSessionFactory};
    use crate::http::{HttpMethod, HttpResponse, HttpStatus, JSON_CONTENT_TYPE};
    use crate::model::IncidentPriority;

    const BASE_URL: &str = "https://ims.example.com/ims/api";

    #[derive(Default)]
    struct Recorder {
        updates: Mutex<Vec<Incident>>,
        auth_requests: Mutex<Vec<(String, u16, Option<String>)>>,
        credential: Mutex<Option<Credential>>,
    }

    impl Recorder {
        fn updated_numbers(&self) -> Vec<IncidentNumber> {
            self.updates
                .lock()
                .iter()
                .filter_map(Incident::number)
                .collect()
        }
    }

    impl ImsDelegate for Recorder {
        fn incident_did_update(&self, incident: &Incident) {
            self.updates.lock().push(incident.clone());
        }

        fn handle_auth(&self, host: &str, port: u16, realm: Option<&str>) -> Option<Credential> {
            self.auth_requests
                .lock()
                .push((host.to_string(), port, realm.map(str::to_string)));
            self.credential.lock().clone()
        }
    }

    struct Fixture {
        ims: HttpIncidentManagementSystem,
        factory: Arc<MockSessionFactory>,
        recorder: Arc<Recorder>,
    }

    impl Fixture {
        fn new() -> Self {
            let factory = MockSessionFactory::new();
            let ims = HttpIncidentManagementSystem::new(Url::parse(BASE_URL).unwrap(), factory.clone());
            let recorder = Arc::new(Recorder::default());
            ims.set_delegate(recorder.clone());
            Self {
                ims,
                factory,
                recorder,
            }
        }

        fn session(&self) -> Arc<MockSession> {
            self.factory.current()
        }

        fn connect(&self) {
            self.ims.reload();
            assert!(self.session().respond_json("ping/", json!("ack")));
            assert_eq!(self.ims.connection_status(), ConnectionStatus::Idle);
        }

        /// Connect and start a reload.
        fn start_loading(&self) {
            self.connect();
            self.ims.reload();
            assert_eq!(self.ims.connection_status(), ConnectionStatus::Loading);
        }

        fn finish_reference_loads(&self) {
            let session = self.session();
            assert!(session.respond_json("incident_types/", json!(["Medical", "Fire"])));
            assert!(session.respond_json(
                "personnel/",
                json!([
                    {"handle": "Tool", "name": "Wilfredo Sánchez Vega", "status": "vintage"},
                    {"handle": "Splinter", "name": "Angela Sawyer"},
                ])
            ));
            assert!(session.respond_json(
                "locations/",
                json!([
                    {"name": "Camp Fishbowl", "type": "garett", "concentric": 3, "radial_hour": 8, "radial_minute": 45},
                    {"name": "Ranger HQ"},
                ])
            ));
        }
    }

    fn incident_json(number: IncidentNumber, summary: &str) -> Value {
        json!({
            "number": number,
            "priority": 3,
            "summary": summary,
            "state": "new",
        })
    }

    fn sent_since(session: &MockSession, start: usize) -> Vec<(HttpMethod, String)> {
        session.sent_urls().into_iter().skip(start).collect()
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let fixture = Fixture::new();
        assert_eq!(fixture.ims.base_url().as_str(), "https://ims.example.com/ims/api/");
    }

    #[test]
    fn test_first_reload_pings() {
        let fixture = Fixture::new();
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Reset);

        fixture.ims.reload();
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Trying);
        assert_eq!(
            fixture.session().sent_urls(),
            vec![(HttpMethod::Get, format!("{}/ping/", BASE_URL))]
        );

        // Reload while trying does nothing.
        fixture.ims.reload();
        assert_eq!(fixture.factory.sessions().len(), 1);
        assert_eq!(fixture.session().sent_urls().len(), 1);

        assert!(fixture.session().respond_json("ping/", json!("ack")));
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Idle);
        assert_eq!(fixture.session().sent_urls().len(), 1);
    }

    #[test]
    fn test_requests_negotiate_json() {
        let fixture = Fixture::new();
        fixture.ims.reload();
        let ping = &fixture.session().sent()[0];
        assert_eq!(ping.headers.first("accept"), Some(JSON_CONTENT_TYPE));
    }

    #[test]
    fn test_status_watch_follows_transitions() {
        let fixture = Fixture::new();
        let status = fixture.ims.status_watch();
        assert_eq!(*status.borrow(), ConnectionStatus::Reset);

        fixture.ims.reload();
        assert_eq!(*status.borrow(), ConnectionStatus::Trying);

        fixture.session().respond_json("ping/", json!("ack"));
        assert_eq!(*status.borrow(), ConnectionStatus::Idle);

        fixture.ims.reload();
        assert_eq!(*status.borrow(), ConnectionStatus::Loading);
    }

    #[test]
    fn test_reload_fires_four_loads() {
        let fixture = Fixture::new();
        fixture.start_loading();

        assert_eq!(fixture.ims.loading_groups(), LoadingGroup::ALL.to_vec());
        for group in LoadingGroup::ALL {
            assert_eq!(fixture.ims.outstanding_requests(group), 1);
        }

        let mut pending = fixture.session().pending_urls();
        pending.sort();
        assert_eq!(
            pending,
            vec![
                format!("{}/incident_types/", BASE_URL),
                format!("{}/incidents/", BASE_URL),
                format!("{}/locations/", BASE_URL),
                format!("{}/personnel/", BASE_URL),
            ]
        );

        // Reload while loading does nothing.
        fixture.ims.reload();
        assert_eq!(fixture.session().pending_urls().len(), 4);
    }

    #[test]
    fn test_full_reload_populates_replica() {
        let fixture = Fixture::new();
        fixture.start_loading();
        fixture.finish_reference_loads();

        assert_eq!(fixture.ims.loading_groups(), vec![LoadingGroup::Incidents]);

        let session = fixture.session();
        assert!(session.respond_json("incidents/", json!([[1, "e1"], [2, "e2"]])));
        assert_eq!(fixture.ims.outstanding_requests(LoadingGroup::Incidents), 2);

        assert!(session.respond_json_with_etag("incidents/1", incident_json(1, "Medical"), "e1"));
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Loading);
        assert!(session.respond_json_with_etag("incidents/2", incident_json(2, "Fire"), "e2"));
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Idle);

        let types: Vec<String> = fixture.ims.incident_types().into_iter().collect();
        assert_eq!(types, vec!["Fire".to_string(), "Medical".to_string()]);
        assert_eq!(fixture.ims.rangers_by_handle().len(), 2);
        assert_eq!(fixture.ims.locations_by_name().len(), 2);

        let incidents = fixture.ims.incidents_by_number();
        assert_eq!(incidents[&1].summary.as_deref(), Some("Medical"));
        assert_eq!(incidents[&2].priority, Some(IncidentPriority::Normal));
        assert_eq!(fixture.ims.cached_etag(1).as_deref(), Some("e1"));
        assert_eq!(fixture.recorder.updated_numbers(), vec![1, 2]);
    }

    #[test]
    fn test_malformed_records_skipped() {
        let fixture = Fixture::new();
        fixture.start_loading();
        let session = fixture.session();

        session.respond_json(
            "personnel/",
            json!([{"handle": "Tool"}, {"name": "No Handle"}, 42]),
        );
        session.respond_json(
            "locations/",
            json!([
                {"name": "Good"},
                {"type": "text", "description": "unnamed"},
                {"name": "Bad", "type": "teleport"},
            ]),
        );
        session.respond_json("incidents/", json!([[1, "e1"], ["x", "y"], [2]]));

        assert_eq!(
            fixture.ims.rangers_by_handle().keys().collect::<Vec<_>>(),
            vec!["Tool"]
        );
        assert_eq!(
            fixture.ims.locations_by_name().keys().collect::<Vec<_>>(),
            vec!["Good"]
        );
        assert_eq!(fixture.ims.outstanding_requests(LoadingGroup::Incidents), 1);
    }

    #[test]
    fn test_etag_suppresses_detail_fetch() {
        let fixture = Fixture::new();
        fixture.start_loading();
        fixture.finish_reference_loads();
        let session = fixture.session();
        session.respond_json("incidents/", json!([[1, "e1"]]));
        session.respond_json_with_etag("incidents/1", incident_json(1, "Medical"), "e1");
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Idle);

        fixture.ims.reload();
        let start = session.sent_urls().len();
        fixture.finish_reference_loads();
        session.respond_json("incidents/", json!([[1, "e1"], [2, "e2"]]));

        assert_eq!(
            sent_since(&session, start),
            vec![(HttpMethod::Get, format!("{}/incidents/2", BASE_URL))]
        );
        assert_eq!(fixture.ims.outstanding_requests(LoadingGroup::Incidents), 1);
    }

    #[test]
    fn test_repeated_list_entry_fetched_once() {
        let fixture = Fixture::new();
        fixture.start_loading();
        fixture.finish_reference_loads();
        let session = fixture.session();

        let start = session.sent_urls().len();
        session.respond_json("incidents/", json!([[1, "a"], [1, "a"]]));
        assert_eq!(
            sent_since(&session, start),
            vec![(HttpMethod::Get, format!("{}/incidents/1", BASE_URL))]
        );
        assert_eq!(fixture.ims.outstanding_requests(LoadingGroup::Incidents), 1);
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Loading);

        assert!(session.respond_json_with_etag("incidents/1", incident_json(1, "Medical"), "a"));
        assert!(session.pending_urls().is_empty());
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Idle);
    }

    #[test]
    fn test_unchanged_incident_not_renotified() {
        let fixture = Fixture::new();
        fixture.connect();
        let session = fixture.session();

        fixture.ims.load_incident(4, None, true);
        session.respond_json_with_etag("incidents/4", incident_json(4, "Lost child"), "a");
        assert_eq!(fixture.recorder.updated_numbers(), vec![4]);

        fixture.ims.load_incident(4, None, true);
        session.respond_json_with_etag("incidents/4", incident_json(4, "Lost child"), "a");
        assert_eq!(fixture.recorder.updated_numbers(), vec![4]);

        fixture.ims.load_incident(4, None, true);
        session.respond_json_with_etag("incidents/4", incident_json(4, "Found child"), "b");
        assert_eq!(fixture.recorder.updated_numbers(), vec![4, 4]);
        assert_eq!(
            fixture.ims.incidents_by_number()[&4].summary.as_deref(),
            Some("Found child")
        );
    }

    #[test]
    fn test_load_incident_skips_cached_etag() {
        let fixture = Fixture::new();
        fixture.connect();
        let session = fixture.session();

        fixture.ims.load_incident(4, None, true);
        session.respond_json_with_etag("incidents/4", incident_json(4, "x"), "a");

        let start = session.sent_urls().len();
        fixture.ims.load_incident(4, Some("a"), true);
        assert!(sent_since(&session, start).is_empty());
    }

    #[test]
    fn test_solo_fetch_not_tracked() {
        let fixture = Fixture::new();
        fixture.connect();

        fixture.ims.load_incident(9, None, true);
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Idle);
        assert!(fixture.ims.loading_groups().is_empty());
    }

    #[test]
    fn test_partial_failure_isolated() {
        let fixture = Fixture::new();
        fixture.start_loading();
        let session = fixture.session();

        assert!(session.respond_status("personnel/", HttpStatus::INTERNAL_SERVER_ERROR));
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Loading);
        assert_eq!(
            fixture.ims.loading_groups(),
            vec![
                LoadingGroup::IncidentTypes,
                LoadingGroup::Locations,
                LoadingGroup::Incidents
            ]
        );

        session.respond_json("incident_types/", json!(["Medical"]));
        session.respond_json("locations/", json!([]));
        session.respond_json("incidents/", json!([]));

        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Idle);
        assert!(fixture.ims.rangers_by_handle().is_empty());
        assert_eq!(fixture.ims.incident_types().len(), 1);
        assert!(!session.is_invalidated());
    }

    #[test]
    fn test_incident_response_validation() {
        let fixture = Fixture::new();
        fixture.start_loading();
        fixture.finish_reference_loads();
        let session = fixture.session();
        session.respond_json("incidents/", json!([[1, "e1"], [2, "e2"], [3, "e3"]]));

        // Number mismatch.
        session.respond_json_with_etag("incidents/1", incident_json(5, "wrong"), "e1");
        // Missing ETag.
        session.respond_json("incidents/2", incident_json(2, "no tag"));
        // Undecodable.
        session.respond_json_with_etag("incidents/3", json!({"number": -3}), "e3");

        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Idle);
        assert!(fixture.ims.incidents_by_number().is_empty());
        assert!(fixture.ims.cached_etag(1).is_none());
        assert!(fixture.recorder.updated_numbers().is_empty());
    }

    #[test]
    fn test_transport_error_resets() {
        let fixture = Fixture::new();
        fixture.start_loading();
        let first = fixture.session();

        assert!(first.fail(
            "personnel/",
            TransportError::Network {
                url: "personnel/".to_string(),
                reason: "connection refused".to_string(),
            }
        ));
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Reset);
        assert!(first.is_invalidated());
        assert!(fixture.ims.loading_groups().is_empty());

        // Responses from the abandoned session are ignored.
        assert!(first.respond_json("incident_types/", json!(["Medical"])));
        assert!(fixture.ims.incident_types().is_empty());
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Reset);

        // The next reload starts over with a new session.
        fixture.ims.reload();
        assert_eq!(fixture.factory.sessions().len(), 2);
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Trying);
    }

    #[test]
    fn test_stale_completion_after_reset_ignored() {
        let fixture = Fixture::new();
        fixture.start_loading();
        let session = fixture.session();

        fixture.ims.reset_connection();
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Reset);

        session.respond_json("incidents/", json!([[1, "e1"]]));
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Reset);
        assert_eq!(session.sent_urls().len(), 5);
    }

    #[test]
    fn test_session_creation_failure_resets() {
        let fixture = Fixture::new();
        fixture
            .factory
            .fail_with(TransportError::SessionSetup("no TLS".to_string()));
        fixture.ims.reload();
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Reset);
    }

    #[test]
    fn test_ping_failure_resets() {
        let fixture = Fixture::new();
        fixture.ims.reload();
        fixture
            .session()
            .respond_status("ping/", HttpStatus::SERVICE_UNAVAILABLE);
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Reset);
    }

    #[test]
    fn test_auth_retry_succeeds() {
        let fixture = Fixture::new();
        *fixture.recorder.credential.lock() = Some(Credential::new("Tool", "hunter2"));

        fixture.ims.reload();
        let first = fixture.session();
        assert!(first.respond_auth_required("ping/", "IMS"));

        assert!(first.is_invalidated());
        assert_eq!(
            *fixture.recorder.auth_requests.lock(),
            vec![("ims.example.com".to_string(), 443, Some("IMS".to_string()))]
        );
        assert_eq!(fixture.factory.sessions().len(), 2);
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Trying);

        let second = fixture.session();
        let login = &second.sent()[0];
        assert_eq!(login.method, HttpMethod::Post);
        assert!(login.url.ends_with("/ping/"));
        let body: Value = serde_json::from_slice(&login.body).unwrap();
        assert_eq!(body, json!({"username": "Tool", "password": "hunter2"}));
        assert_eq!(login.headers.first("content-type"), Some(JSON_CONTENT_TYPE));

        assert!(second.respond_json("ping/", json!("authenticated")));
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Idle);
    }

    #[test]
    fn test_auth_retry_rejected() {
        let fixture = Fixture::new();
        *fixture.recorder.credential.lock() = Some(Credential::new("Tool", "wrong"));

        fixture.ims.reload();
        fixture.session().respond_auth_required("ping/", "IMS");
        fixture.session().respond_auth_required("ping/", "IMS");

        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Reset);
        assert_eq!(fixture.recorder.auth_requests.lock().len(), 1);
        assert_eq!(fixture.factory.sessions().len(), 2);
    }

    #[test]
    fn test_auth_without_credential_resets() {
        let fixture = Fixture::new();
        fixture.ims.reload();
        fixture.session().respond_auth_required("ping/", "");

        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Reset);
        assert_eq!(
            *fixture.recorder.auth_requests.lock(),
            vec![("ims.example.com".to_string(), 443, None)]
        );
        assert_eq!(fixture.factory.sessions().len(), 1);
    }

    #[test]
    fn test_create_then_refetch() {
        let fixture = Fixture::new();
        fixture.connect();
        let session = fixture.session();

        let assigned = Arc::new(Mutex::new(Vec::new()));
        let slot = assigned.clone();
        let observed = session.clone();
        fixture
            .ims
            .create_incident(
                Incident::draft().with_summary("Lost keys"),
                Box::new(move |result: ImsResult<IncidentNumber>| {
                    // The re-fetch has not been issued yet.
                    slot.lock().push((result, observed.sent_urls().len()));
                }),
            )
            .unwrap();

        let create = session.sent().last().cloned().unwrap();
        assert_eq!(create.method, HttpMethod::Post);
        assert_eq!(create.url, format!("{}/incidents/", BASE_URL));
        let body: Value = serde_json::from_slice(&create.body).unwrap();
        assert_eq!(body, json!({"summary": "Lost keys"}));

        let sent_before = session.sent_urls().len();
        assert!(session.respond(
            "incidents/",
            HttpResponse::new("incidents/", HttpStatus::CREATED).with_header("Incident-Number", "7"),
        ));

        assert_eq!(*assigned.lock(), vec![(Ok(7), sent_before)]);
        assert_eq!(
            sent_since(&session, sent_before),
            vec![(HttpMethod::Get, format!("{}/incidents/7", BASE_URL))]
        );
        assert_eq!(fixture.ims.connection_status(), ConnectionStatus::Idle);

        session.respond_json_with_etag("incidents/7", incident_json(7, "Lost keys"), "n7");
        assert_eq!(fixture.recorder.updated_numbers(), vec![7]);
    }

    #[test]
    fn test_create_without_number_header_fails() {
        let fixture = Fixture::new();
        fixture.connect();
        let session = fixture.session();

        let outcome = Arc::new(Mutex::new(None));
        let slot = outcome.clone();
        fixture
            .ims
            .create_incident(
                Incident::draft(),
                Box::new(move |result: ImsResult<IncidentNumber>| *slot.lock() = Some(result)),
            )
            .unwrap();
        session.respond_status("incidents/", HttpStatus::CREATED);

        assert!(matches!(
            outcome.lock().take(),
            Some(Err(ImsError::MissingHeader {
                header: INCIDENT_NUMBER_HEADER,
                ..
            }))
        ));
    }

    #[test]
    fn test_write_preconditions() {
        let fixture = Fixture::new();

        assert_eq!(
            fixture
                .ims
                .create_incident(Incident::new(Some(3)), Box::new(|_| {})),
            Err(ImsError::IncidentNumberPresent(3))
        );
        assert_eq!(
            fixture.ims.update_incident(Incident::draft()),
            Err(ImsError::IncidentNumberMissing)
        );
        assert_eq!(
            fixture.ims.create_incident(Incident::draft(), Box::new(|_| {})),
            Err(ImsError::NotConnected)
        );
        assert_eq!(
            fixture.ims.update_incident(Incident::new(Some(3))),
            Err(ImsError::NotConnected)
        );
    }

    #[test]
    fn test_update_notifies_then_refetches() {
        let fixture = Fixture::new();
        fixture.connect();
        let session = fixture.session();

        let incident = Incident::new(Some(3))
            .with_summary("Dust storm")
            .with_priority(IncidentPriority::High);
        fixture.ims.update_incident(incident).unwrap();

        let update = session.sent().last().cloned().unwrap();
        assert_eq!(update.method, HttpMethod::Post);
        assert_eq!(update.url, format!("{}/incidents/3", BASE_URL));

        let start = session.sent_urls().len();
        session.respond_json_with_etag(
            "incidents/3",
            json!({"number": 3, "summary": "Dust storm", "priority": 1}),
            "u1",
        );

        assert_eq!(fixture.recorder.updated_numbers(), vec![3]);
        assert_eq!(fixture.ims.cached_etag(3).as_deref(), Some("u1"));
        assert_eq!(
            sent_since(&session, start),
            vec![(HttpMethod::Get, format!("{}/incidents/3", BASE_URL))]
        );
    }

    #[test]
    fn test_update_without_etag_still_refetches() {
        let fixture = Fixture::new();
        fixture.connect();
        let session = fixture.session();

        fixture.ims.update_incident(Incident::new(Some(3))).unwrap();
        let start = session.sent_urls().len();
        session.respond_status("incidents/3", HttpStatus::NO_CONTENT);

        assert!(fixture.recorder.updated_numbers().is_empty());
        assert_eq!(
            sent_since(&session, start),
            vec![(HttpMethod::Get, format!("{}/incidents/3", BASE_URL))]
        );
    }
}
