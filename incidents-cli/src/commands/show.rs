//! Show command - print one incident in full.

use console::style;
use incidents::ims::IncidentManagementSystem;
use incidents::model::{Incident, IncidentNumber};

use crate::error::CliError;
use crate::runner::{CliRunner, ServerArgs};

/// Run the show command.
pub fn run(server: ServerArgs, number: IncidentNumber) -> Result<(), CliError> {
    let runner = CliRunner::new(&server)?;
    runner.log_startup("show");
    runner.load()?;

    let incident = runner
        .ims()
        .incidents_by_number()
        .remove(&number)
        .ok_or(CliError::NoSuchIncident(number))?;

    print!("{}", describe(&incident));
    Ok(())
}

fn field(out: &mut String, label: &str, value: impl std::fmt::Display) {
    out.push_str(&format!("{:<10} {}\n", format!("{}:", label), value));
}

fn describe(incident: &Incident) -> String {
    let mut out = String::new();
    let number = incident.number().map(|n| n.to_string()).unwrap_or_default();
    out.push_str(&format!(
        "{} {}\n\n",
        style(format!("Incident #{}", number)).bold(),
        incident.summary_text()
    ));

    if let Some(state) = incident.state {
        field(&mut out, "State", state);
    }
    if let Some(priority) = incident.priority {
        field(&mut out, "Priority", priority);
    }
    if let Some(created) = incident.created {
        field(&mut out, "Created", created.to_medium_string());
    }
    if let Some(location) = &incident.location {
        field(&mut out, "Location", location);
    }
    field(&mut out, "Rangers", incident.rangers_text());
    field(&mut out, "Types", incident.incident_types_text());

    let entries = incident.report_entries.as_deref().unwrap_or_default();
    if !entries.is_empty() {
        out.push_str("\nReport:\n");
        for entry in entries {
            let line = format!("  {}\n", entry);
            if entry.is_system_entry() {
                out.push_str(&style(line).dim().to_string());
            } else {
                out.push_str(&line);
            }
        }
    }
    out
}
