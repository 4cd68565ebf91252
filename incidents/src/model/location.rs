//! Named places an incident can be attached to.

use std::cmp::Ordering;
use std::fmt;

use super::address::{address_is_nillish, Address};

/// A location: an optional name plus an optional address.
#[derive(Debug, Clone, Default)]
pub struct Location {
    pub name: Option<String>,
    pub address: Option<Address>,
}

impl Location {
    /// Create a location.
    pub fn new(name: Option<String>, address: Option<Address>) -> Self {
        Self { name, address }
    }

    /// A location with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: None,
        }
    }

    /// Set the address.
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// True when there is no name and the address is absent or nillish.
    pub fn is_nillish(&self) -> bool {
        self.name.is_none() && address_is_nillish(self.address.as_ref())
    }
}

/// True when the location is absent or nillish.
pub fn location_is_nillish(location: Option<&Location>) -> bool {
    location.map_or(true, Location::is_nillish)
}

/// Equality for optional locations where two nillish values are equal.
pub fn locations_equal(a: Option<&Location>, b: Option<&Location>) -> bool {
    if location_is_nillish(a) && location_is_nillish(b) {
        return true;
    }
    a == b
}

fn addresses_equal(a: Option<&Address>, b: Option<&Address>) -> bool {
    if address_is_nillish(a) && address_is_nillish(b) {
        return true;
    }
    a == b
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && addresses_equal(self.address.as_ref(), other.address.as_ref())
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        Some(
            self.name
                .cmp(&other.name)
                .then_with(|| self.address.cmp(&other.address)),
        )
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = self.address.as_ref().filter(|a| !a.is_nillish());

        match (&self.name, address) {
            (Some(name), Some(address)) => {
                let address_text = address.to_string();
                if &address_text == name {
                    f.write_str(name)
                } else {
                    write!(f, "{} ({})", name, address_text)
                }
            }
            (Some(name), None) => f.write_str(name),
            (None, Some(address)) => write!(f, "({})", address),
            (None, None) => Ok(()),
        }
    }
}
