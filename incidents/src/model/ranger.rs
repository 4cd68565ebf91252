//! Rangers: the personnel incidents are assigned to.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Status value marked with a trailing `*` when displayed.
const VINTAGE_STATUS: &str = "vintage";

/// A ranger, identified by handle.
///
/// Equality, ordering and hashing consider the handle only; name and status
/// are descriptive.
#[derive(Debug, Clone)]
pub struct Ranger {
    pub handle: String,
    pub name: Option<String>,
    pub status: Option<String>,
}

impl Ranger {
    /// A ranger known only by handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            name: None,
            status: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

impl PartialEq for Ranger {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Ranger {}

impl Hash for Ranger {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl PartialOrd for Ranger {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranger {
    fn cmp(&self, other: &Self) -> Ordering {
        self.handle.cmp(&other.handle)
    }
}

impl fmt::Display for Ranger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.handle)?;
        if let Some(name) = &self.name {
            write!(f, " ({})", name)?;
        }
        if self.status.as_deref() == Some(VINTAGE_STATUS) {
            f.write_str("*")?;
        }
        Ok(())
    }
}
