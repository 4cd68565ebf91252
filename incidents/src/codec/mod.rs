//! Wire codec: domain model to and from the server's JSON schema.
//!
//! Decoding is strict. A field of the wrong JSON type is an error naming the
//! field; values are never coerced. `null` is read as absent. Encoding omits
//! absent fields entirely and never emits `null`.
//!
//! # Example
//!
//! ```
//! use incidents::codec::{decode_incident, encode_incident};
//! use incidents::model::Incident;
//!
//! let incident = Incident::new(Some(7)).with_summary("Lost child");
//! let json = encode_incident(&incident);
//! assert_eq!(decode_incident(&json).unwrap(), incident);
//! ```

mod error;
mod fields;
mod incident;
mod location;
mod personnel;

pub use error::{DecodeError, DecodeResult};
pub use incident::{decode_incident, encode_incident};
pub use location::{decode_location, encode_location};
pub use personnel::{decode_incident_etag, decode_incident_types, decode_ranger};
