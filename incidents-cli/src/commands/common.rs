//! Formatting shared across commands.

use clap::ValueEnum;
use console::style;
use incidents::model::{location_is_nillish, Incident, IncidentPriority, IncidentState};

/// Priority selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum PriorityArg {
    High,
    Normal,
    Low,
}

impl From<PriorityArg> for IncidentPriority {
    fn from(priority: PriorityArg) -> Self {
        match priority {
            PriorityArg::High => IncidentPriority::High,
            PriorityArg::Normal => IncidentPriority::Normal,
            PriorityArg::Low => IncidentPriority::Low,
        }
    }
}

/// Whether an incident belongs in the open dispatch queue.
pub fn is_open(incident: &Incident) -> bool {
    incident.state != Some(IncidentState::Closed)
}

/// One unstyled row of the dispatch queue.
pub fn queue_row(incident: &Incident) -> String {
    let number = incident
        .number()
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".to_string());
    let priority = incident.priority.map(IncidentPriority::symbol).unwrap_or(" ");
    let created = incident
        .created
        .map(|c| c.to_short_string())
        .unwrap_or_default();
    let state = incident.state.map(|s| s.to_string()).unwrap_or_default();
    let location = match &incident.location {
        Some(location) if !location_is_nillish(Some(location)) => location.to_string(),
        _ => String::new(),
    };

    format!(
        "{:>5} {} {:<14} {:<10} {:<20} {:<24} {:<20} {}",
        number,
        priority,
        created,
        state,
        truncate(&incident.rangers_text(), 20),
        truncate(&location, 24),
        truncate(&incident.incident_types_text(), 20),
        incident.summary_text(),
    )
}

/// Header matching [`queue_row`].
pub fn queue_header() -> String {
    format!(
        "{:>5} {} {:<14} {:<10} {:<20} {:<24} {:<20} {}",
        "#", " ", "Created", "State", "Rangers", "Location", "Types", "Summary"
    )
}

/// Print a table of incidents, most urgent marked in color.
pub fn print_queue<'a>(incidents: impl IntoIterator<Item = &'a Incident>) {
    println!("{}", style(queue_header()).bold());
    let mut count = 0;
    for incident in incidents {
        let row = queue_row(incident);
        match incident.priority {
            Some(IncidentPriority::High) => println!("{}", style(row).red()),
            Some(IncidentPriority::Low) => println!("{}", style(row).dim()),
            _ => println!("{}", row),
        }
        count += 1;
    }
    println!();
    println!("{} incident(s)", count);
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
    short.push('…');
    short
}
