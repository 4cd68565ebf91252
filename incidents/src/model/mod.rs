//! Domain model for the dispatch desk.
//!
//! All types are plain values: they are cloned out of the synchronized
//! collections rather than shared, so no interior mutability is needed here.
//!
//! # Equality
//!
//! Several comparisons are "nillish-aware": an absent value and a value whose
//! fields are all absent (or an empty collection) compare equal. This lets a
//! record fetched from the server compare equal to one built locally even
//! when the two spell "nothing" differently.

mod address;
mod datetime;
mod incident;
mod location;
mod ranger;
mod report_entry;

pub use address::{address_is_nillish, Address, ConcentricStreet};
pub use datetime::{DateTime, DateTimeParseError};
pub use incident::{Incident, IncidentNumber, IncidentPriority, IncidentState};
pub use location::{location_is_nillish, locations_equal, Location};
pub use ranger::Ranger;
pub use report_entry::ReportEntry;
