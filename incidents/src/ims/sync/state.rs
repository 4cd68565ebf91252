//! Connection and loading state of the synchronization engine.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, error};

use crate::http::HttpConnection;
use crate::model::IncidentNumber;

/// Independent collections fetched during a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadingGroup {
    IncidentTypes,
    Personnel,
    Locations,
    Incidents,
}

impl LoadingGroup {
    pub const ALL: [LoadingGroup; 4] = [
        Self::IncidentTypes,
        Self::Personnel,
        Self::Locations,
        Self::Incidents,
    ];
}

impl fmt::Display for LoadingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IncidentTypes => "incident types",
            Self::Personnel => "personnel",
            Self::Locations => "locations",
            Self::Incidents => "incidents",
        })
    }
}

/// Identifies one tracked request within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionId {
    /// The only request of its group.
    Singleton,
    /// The `[number, etag]` listing of all incidents.
    IncidentList,
    /// Detail fetch for one incident.
    Incident(IncidentNumber),
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singleton => f.write_str("singleton"),
            Self::IncidentList => f.write_str("incident list"),
            Self::Incident(number) => write!(f, "incident #{}", number),
        }
    }
}

/// Summary of [`LoadingState`] published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// No session.
    Reset,
    /// Connecting or authenticating.
    Trying,
    /// Connected, nothing in flight.
    Idle,
    /// Connected, reload in progress.
    Loading,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Idle | Self::Loading)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reset => "reset",
            Self::Trying => "trying",
            Self::Idle => "idle",
            Self::Loading => "loading",
        })
    }
}

pub(crate) type GroupConnections = HashMap<ConnectionId, HttpConnection>;

/// The engine's state machine.
///
/// `Loading` holds the in-flight requests of a reload, grouped so that each
/// collection completes independently.
#[derive(Debug)]
pub(crate) enum LoadingState {
    Reset,
    Trying(HttpConnection),
    Idle,
    Loading(HashMap<LoadingGroup, GroupConnections>),
}

impl LoadingState {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            Self::Reset => ConnectionStatus::Reset,
            Self::Trying(_) => ConnectionStatus::Trying,
            Self::Idle => ConnectionStatus::Idle,
            Self::Loading(_) => ConnectionStatus::Loading,
        }
    }

    /// Enter the empty `Loading` state.
    pub fn loading() -> Self {
        Self::Loading(HashMap::new())
    }

    /// Move to `next`. Every state change goes through here.
    pub fn transition(&mut self, next: LoadingState) {
        let from = self.status();
        let to = next.status();
        if from == to {
            debug!(state = %to, "Loading state refreshed");
        } else {
            debug!(%from, %to, "Loading state transition");
        }
        *self = next;
    }

    /// Groups with requests in flight, in declaration order.
    pub fn groups(&self) -> Vec<LoadingGroup> {
        match self {
            Self::Loading(groups) => {
                let mut keys: Vec<LoadingGroup> = groups.keys().copied().collect();
                keys.sort();
                keys
            }
            _ => Vec::new(),
        }
    }

    /// Number of requests in flight for `group`.
    pub fn outstanding(&self, group: LoadingGroup) -> usize {
        match self {
            Self::Loading(groups) => groups.get(&group).map_or(0, HashMap::len),
            _ => 0,
        }
    }

    /// Whether `id` is already in flight for `group`.
    pub fn is_tracked(&self, group: LoadingGroup, id: ConnectionId) -> bool {
        match self {
            Self::Loading(groups) => groups
                .get(&group)
                .is_some_and(|connections| connections.contains_key(&id)),
            _ => false,
        }
    }

    /// Track a request. Ignored outside `Loading`.
    pub fn add_connection(
        &mut self,
        group: LoadingGroup,
        id: ConnectionId,
        connection: HttpConnection,
    ) -> bool {
        match self {
            Self::Loading(groups) => {
                groups.entry(group).or_default().insert(id, connection);
                true
            }
            other => {
                error!(
                    %group,
                    %id,
                    state = %other.status(),
                    "Cannot track a request outside the loading state"
                );
                false
            }
        }
    }

    /// Stop tracking a request.
    ///
    /// Emptied groups are dropped, and dropping the last group returns the
    /// machine to `Idle`.
    pub fn remove_connection(&mut self, group: LoadingGroup, id: ConnectionId) {
        let groups = match self {
            Self::Loading(groups) => groups,
            other => {
                debug!(%group, %id, state = %other.status(), "No loading state to remove request from");
                return;
            }
        };

        let Some(connections) = groups.get_mut(&group) else {
            debug!(%group, %id, "Group is not loading");
            return;
        };

        if connections.remove(&id).is_none() {
            debug!(%group, %id, "Request was not tracked");
        }

        if connections.is_empty() {
            groups.remove(&group);
            debug!(%group, "Group finished loading");
        }

        if groups.is_empty() {
            self.transition(Self::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> HttpConnection {
        HttpConnection::new().0
    }

    #[test]
    fn test_add_outside_loading_is_ignored() {
        let mut state = LoadingState::Idle;
        assert!(!state.add_connection(
            LoadingGroup::Personnel,
            ConnectionId::Singleton,
            connection()
        ));
        assert_eq!(state.status(), ConnectionStatus::Idle);

        let mut state = LoadingState::Reset;
        assert!(!state.add_connection(
            LoadingGroup::Personnel,
            ConnectionId::Singleton,
            connection()
        ));
        assert_eq!(state.status(), ConnectionStatus::Reset);
    }

    #[test]
    fn test_group_bookkeeping() {
        let mut state = LoadingState::loading();
        state.add_connection(LoadingGroup::Incidents, ConnectionId::IncidentList, connection());
        state.add_connection(LoadingGroup::Incidents, ConnectionId::Incident(1), connection());
        state.add_connection(LoadingGroup::Personnel, ConnectionId::Singleton, connection());

        assert_eq!(
            state.groups(),
            vec![LoadingGroup::Personnel, LoadingGroup::Incidents]
        );
        assert_eq!(state.outstanding(LoadingGroup::Incidents), 2);

        state.remove_connection(LoadingGroup::Incidents, ConnectionId::IncidentList);
        assert_eq!(state.outstanding(LoadingGroup::Incidents), 1);

        state.remove_connection(LoadingGroup::Incidents, ConnectionId::Incident(1));
        assert_eq!(state.groups(), vec![LoadingGroup::Personnel]);
        assert_eq!(state.status(), ConnectionStatus::Loading);

        state.remove_connection(LoadingGroup::Personnel, ConnectionId::Singleton);
        assert_eq!(state.status(), ConnectionStatus::Idle);
        assert!(state.groups().is_empty());
    }

    #[test]
    fn test_is_tracked() {
        let mut state = LoadingState::loading();
        assert!(!state.is_tracked(LoadingGroup::Incidents, ConnectionId::Incident(1)));

        state.add_connection(LoadingGroup::Incidents, ConnectionId::Incident(1), connection());
        assert!(state.is_tracked(LoadingGroup::Incidents, ConnectionId::Incident(1)));
        assert!(!state.is_tracked(LoadingGroup::Incidents, ConnectionId::Incident(2)));
        assert!(!state.is_tracked(LoadingGroup::Personnel, ConnectionId::Incident(1)));

        state.remove_connection(LoadingGroup::Incidents, ConnectionId::Incident(1));
        assert!(!state.is_tracked(LoadingGroup::Incidents, ConnectionId::Incident(1)));
        assert!(!LoadingState::Idle.is_tracked(LoadingGroup::Incidents, ConnectionId::Incident(1)));
    }

    #[test]
    fn test_remove_unknown_is_harmless() {
        let mut state = LoadingState::loading();
        state.add_connection(LoadingGroup::Locations, ConnectionId::Singleton, connection());
        state.remove_connection(LoadingGroup::Personnel, ConnectionId::Singleton);
        assert_eq!(state.outstanding(LoadingGroup::Locations), 1);

        let mut idle = LoadingState::Idle;
        idle.remove_connection(LoadingGroup::Locations, ConnectionId::Singleton);
        assert_eq!(idle.status(), ConnectionStatus::Idle);
    }

    #[test]
    fn test_status_connected() {
        assert!(ConnectionStatus::Idle.is_connected());
        assert!(ConnectionStatus::Loading.is_connected());
        assert!(!ConnectionStatus::Trying.is_connected());
        assert!(!ConnectionStatus::Reset.is_connected());
        assert_eq!(LoadingState::Trying(connection()).status(), ConnectionStatus::Trying);
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionId::Incident(7).to_string(), "incident #7");
        assert_eq!(LoadingGroup::IncidentTypes.to_string(), "incident types");
        assert_eq!(ConnectionStatus::Loading.to_string(), "loading");
    }
}
