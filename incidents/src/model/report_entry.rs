//! Report entries: the running log attached to an incident.

use std::fmt;

use super::datetime::DateTime;
use super::ranger::Ranger;

/// One entry in an incident's report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportEntry {
    author: Ranger,
    text: String,
    created: DateTime,
    system_entry: bool,
}

impl ReportEntry {
    /// A user-authored entry created now.
    pub fn new(author: Ranger, text: impl Into<String>) -> Self {
        Self::with_created(author, text, DateTime::now(), false)
    }

    /// An entry with every field given.
    pub fn with_created(
        author: Ranger,
        text: impl Into<String>,
        created: DateTime,
        system_entry: bool,
    ) -> Self {
        Self {
            author,
            text: text.into(),
            created,
            system_entry,
        }
    }

    pub fn author(&self) -> &Ranger {
        &self.author
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created(&self) -> DateTime {
        self.created
    }

    /// True for entries generated by the server rather than typed by a user.
    pub fn is_system_entry(&self) -> bool {
        self.system_entry
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.system_entry {
            write!(f, "{} @ {}: {}", self.author.handle, self.created, self.text)
        } else {
            write!(f, "{} @ {}:\n{}", self.author.handle, self.created, self.text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> DateTime {
        DateTime::from_rfc3339("1972-06-29T08:04:15Z").unwrap()
    }

    #[test]
    fn test_display_user_entry() {
        let entry = ReportEntry::with_created(Ranger::new("Tool"), "Need diapers\nPronto", created(), false);
        assert_eq!(
            entry.to_string(),
            "Tool @ 1972-06-29T08:04:15Z:\nNeed diapers\nPronto"
        );
    }

    #[test]
    fn test_display_system_entry() {
        let entry = ReportEntry::with_created(Ranger::new("Tool"), "State changed", created(), true);
        assert_eq!(entry.to_string(), "Tool @ 1972-06-29T08:04:15Z: State changed");
    }

    #[test]
    fn test_new_defaults() {
        let entry = ReportEntry::new(Ranger::new("Tool"), "hi");
        assert!(!entry.is_system_entry());
        assert!(entry.created() <= DateTime::now());
    }
}
