//! Create command - file a new incident.

use std::sync::mpsc;

use incidents::ims::{ImsResult, IncidentManagementSystem};
use incidents::model::{DateTime, Incident, IncidentNumber, IncidentState, Location, Ranger};
use tracing::warn;

use super::common::PriorityArg;
use crate::error::CliError;
use crate::runner::{CliRunner, ServerArgs, SETTLE_TIMEOUT};

/// Arguments for the create command.
pub struct CreateArgs {
    pub summary: String,
    pub priority: Option<PriorityArg>,
    pub incident_types: Vec<String>,
    pub rangers: Vec<String>,
    pub location: Option<String>,
}

/// Run the create command.
pub fn run(server: ServerArgs, args: CreateArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(&server)?;
    runner.log_startup("create");
    runner.load()?;

    let ims = runner.ims();
    let draft = build_draft(args, ims)?;

    let (sender, receiver) = mpsc::channel();
    ims.create_incident(
        draft,
        Box::new(move |result: ImsResult<IncidentNumber>| {
            let _ = sender.send(result);
        }),
    )?;

    let number = receiver
        .recv_timeout(SETTLE_TIMEOUT)
        .map_err(|_| CliError::Timeout(SETTLE_TIMEOUT.as_secs()))??;

    println!("Created incident #{}", number);
    Ok(())
}

/// Assemble a draft, resolving rangers and locations against the replica.
///
/// Unknown rangers are an error. Unknown incident types and locations are
/// sent as given.
fn build_draft(args: CreateArgs, ims: &dyn IncidentManagementSystem) -> Result<Incident, CliError> {
    let rangers_by_handle = ims.rangers_by_handle();
    let rangers = args
        .rangers
        .iter()
        .map(|handle| {
            rangers_by_handle
                .get(handle)
                .cloned()
                .ok_or_else(|| CliError::InvalidArgument(format!("Unknown ranger '{}'", handle)))
        })
        .collect::<Result<Vec<Ranger>, CliError>>()?;

    let known_types = ims.incident_types();
    for incident_type in &args.incident_types {
        if !known_types.contains(incident_type) {
            warn!(incident_type = %incident_type, "Incident type not known to the server");
        }
    }

    let mut draft = Incident::draft()
        .with_summary(args.summary)
        .with_state(IncidentState::New)
        .with_created(DateTime::now())
        .with_rangers(rangers)
        .with_incident_types(args.incident_types);

    if let Some(priority) = args.priority {
        draft = draft.with_priority(priority.into());
    }

    if let Some(name) = args.location {
        let location = ims
            .locations_by_name()
            .remove(&name)
            .unwrap_or_else(|| Location::named(name));
        draft = draft.with_location(location);
    }

    Ok(draft)
}
