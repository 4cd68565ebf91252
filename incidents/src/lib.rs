//! Incidents - dispatch desk replica for the Ranger Incident Management System
//!
//! This library keeps a local copy of a dispatch desk's data (incident types,
//! personnel, named locations and incidents) synchronized with a remote
//! server over HTTP+JSON, using entity tags to skip unchanged records.
//!
//! # Layers
//!
//! - [`model`]: incidents, locations, rangers and report entries
//! - [`codec`]: the server's JSON schema
//! - [`http`]: request/response primitives, sessions and JSON negotiation
//! - [`ims`]: the [`ims::IncidentManagementSystem`] trait with an HTTP
//!   synchronizing backend and an in-memory backend
//! - [`config`] and [`logging`]: INI configuration and tracing setup
//!
//! # Example
//!
//! ```
//! use incidents::ims::{ImsResult, IncidentManagementSystem, InMemoryIncidentManagementSystem};
//! use incidents::model::{Incident, IncidentNumber};
//!
//! let ims = InMemoryIncidentManagementSystem::new();
//! ims.create_incident(
//!     Incident::draft().with_summary("Lost child at Center Camp"),
//!     Box::new(|number: ImsResult<IncidentNumber>| println!("created #{:?}", number)),
//! )
//! .unwrap();
//! assert_eq!(ims.incidents_in_order().len(), 1);
//! ```

pub mod codec;
pub mod config;
pub mod http;
pub mod ims;
pub mod logging;
pub mod model;

/// Base URL type accepted by [`ims::HttpIncidentManagementSystem`].
pub use reqwest::Url;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
