//! Incidents and their state/priority enumerations.

use std::collections::BTreeSet;
use std::fmt;

use super::datetime::DateTime;
use super::location::{locations_equal, Location};
use super::ranger::Ranger;
use super::report_entry::ReportEntry;

/// Incident numbers are assigned by the server and never negative.
pub type IncidentNumber = u64;

/// Lifecycle state of an incident, in workflow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IncidentState {
    New,
    OnHold,
    Dispatched,
    OnScene,
    Closed,
}

impl IncidentState {
    pub const ALL: [IncidentState; 5] = [
        Self::New,
        Self::OnHold,
        Self::Dispatched,
        Self::OnScene,
        Self::Closed,
    ];
}

impl fmt::Display for IncidentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "new",
            Self::OnHold => "on hold",
            Self::Dispatched => "dispatched",
            Self::OnScene => "on scene",
            Self::Closed => "closed",
        })
    }
}

/// Incident priority. Lower values are more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum IncidentPriority {
    High = 1,
    Normal = 3,
    Low = 5,
}

impl IncidentPriority {
    /// Numeric value as sent on the wire.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Single-glyph marker for tables.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::High => "↑",
            Self::Normal => "•",
            Self::Low => "↓",
        }
    }
}

impl fmt::Display for IncidentPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        })
    }
}

/// An incident record.
///
/// Every field other than the number is optional so that the same type can
/// describe a full record, a draft awaiting a number, or a diff carrying only
/// changed fields.
#[derive(Debug, Clone, Default)]
pub struct Incident {
    number: Option<IncidentNumber>,
    pub priority: Option<IncidentPriority>,
    pub summary: Option<String>,
    pub location: Option<Location>,
    pub rangers: Option<BTreeSet<Ranger>>,
    pub incident_types: Option<BTreeSet<String>>,
    pub report_entries: Option<Vec<ReportEntry>>,
    pub created: Option<DateTime>,
    pub state: Option<IncidentState>,
}

impl Incident {
    /// Create an incident with only a number (or a numberless draft).
    pub fn new(number: Option<IncidentNumber>) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }

    /// A draft with no number, to be submitted for creation.
    pub fn draft() -> Self {
        Self::default()
    }

    pub fn number(&self) -> Option<IncidentNumber> {
        self.number
    }

    /// Assign the incident number.
    ///
    /// # Panics
    ///
    /// Panics if a number is already set. Numbers are write-once.
    pub fn set_number(&mut self, number: IncidentNumber) {
        assert!(
            self.number.is_none(),
            "incident number is write-once (already {:?}, attempted {})",
            self.number,
            number
        );
        self.number = Some(number);
    }

    pub fn with_priority(mut self, priority: IncidentPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_rangers(mut self, rangers: impl IntoIterator<Item = Ranger>) -> Self {
        self.rangers = Some(rangers.into_iter().collect());
        self
    }

    pub fn with_incident_types<S: Into<String>>(
        mut self,
        incident_types: impl IntoIterator<Item = S>,
    ) -> Self {
        self.incident_types = Some(incident_types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_report_entries(mut self, entries: impl IntoIterator<Item = ReportEntry>) -> Self {
        self.report_entries = Some(entries.into_iter().collect());
        self
    }

    pub fn with_created(mut self, created: DateTime) -> Self {
        self.created = Some(created);
        self
    }

    pub fn with_state(mut self, state: IncidentState) -> Self {
        self.state = Some(state);
        self
    }

    /// Sorted, comma-separated ranger handles.
    pub fn rangers_text(&self) -> String {
        self.rangers
            .iter()
            .flatten()
            .map(|r| r.handle.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Sorted, comma-separated incident types.
    pub fn incident_types_text(&self) -> String {
        self.incident_types
            .iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The summary, falling back to the first non-blank line of the report.
    pub fn summary_text(&self) -> &str {
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.is_empty()) {
            return summary;
        }
        self.report_entries
            .iter()
            .flatten()
            .find_map(|entry| entry.text().lines().find(|line| !line.trim().is_empty()))
            .unwrap_or("")
    }

    /// The fields of `self` that differ from `other`.
    ///
    /// Equal fields are absent in the result. The number is always copied
    /// from `self`.
    pub fn diff_from(&self, other: &Incident) -> Incident {
        fn changed<T: PartialEq + Clone>(mine: &Option<T>, theirs: &Option<T>) -> Option<T> {
            if mine == theirs {
                None
            } else {
                mine.clone()
            }
        }

        Incident {
            number: self.number,
            priority: changed(&self.priority, &other.priority),
            summary: changed(&self.summary, &other.summary),
            location: if locations_equal(self.location.as_ref(), other.location.as_ref()) {
                None
            } else {
                self.location.clone()
            },
            rangers: if collections_equal(&self.rangers, &other.rangers) {
                None
            } else {
                self.rangers.clone()
            },
            incident_types: if collections_equal(&self.incident_types, &other.incident_types) {
                None
            } else {
                self.incident_types.clone()
            },
            report_entries: if vecs_equal(&self.report_entries, &other.report_entries) {
                None
            } else {
                self.report_entries.clone()
            },
            created: changed(&self.created, &other.created),
            state: changed(&self.state, &other.state),
        }
    }

    /// Overlay the present fields of `diff` onto a copy of `self`.
    ///
    /// The number of `self` is kept.
    pub fn apply_diff(&self, diff: &Incident) -> Incident {
        let mut result = self.clone();
        if diff.priority.is_some() {
            result.priority = diff.priority;
        }
        if diff.summary.is_some() {
            result.summary = diff.summary.clone();
        }
        if diff.location.is_some() {
            result.location = diff.location.clone();
        }
        if diff.rangers.is_some() {
            result.rangers = diff.rangers.clone();
        }
        if diff.incident_types.is_some() {
            result.incident_types = diff.incident_types.clone();
        }
        if diff.report_entries.is_some() {
            result.report_entries = diff.report_entries.clone();
        }
        if diff.created.is_some() {
            result.created = diff.created;
        }
        if diff.state.is_some() {
            result.state = diff.state;
        }
        result
    }
}

fn collections_equal<T: Ord>(a: &Option<BTreeSet<T>>, b: &Option<BTreeSet<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), None) | (None, Some(a)) => a.is_empty(),
        (Some(a), Some(b)) => a == b,
    }
}

fn vecs_equal<T: PartialEq>(a: &Option<Vec<T>>, b: &Option<Vec<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), None) | (None, Some(a)) => a.is_empty(),
        (Some(a), Some(b)) => a == b,
    }
}

impl PartialEq for Incident {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
            && self.priority == other.priority
            && self.summary == other.summary
            && self.created == other.created
            && self.state == other.state
            && locations_equal(self.location.as_ref(), other.location.as_ref())
            && collections_equal(&self.rangers, &other.rangers)
            && collections_equal(&self.incident_types, &other.incident_types)
            && vecs_equal(&self.report_entries, &other.report_entries)
    }
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Incident")?;
        if let Some(number) = self.number {
            write!(f, " #{}", number)?;
        }
        if let Some(state) = self.state {
            write!(f, " ({})", state)?;
        }
        if let Some(summary) = &self.summary {
            write!(f, ": {}", summary)?;
        }
        Ok(())
    }
}
