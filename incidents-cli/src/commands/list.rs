//! List command - print the dispatch queue once.

use incidents::ims::IncidentManagementSystem;

use super::common::{is_open, print_queue};
use crate::error::CliError;
use crate::runner::{CliRunner, ServerArgs};

/// Run the list command.
pub fn run(server: ServerArgs, all: bool) -> Result<(), CliError> {
    let runner = CliRunner::new(&server)?;
    runner.log_startup("list");
    runner.load()?;

    let incidents = runner.ims().incidents_in_order();
    print_queue(incidents.iter().filter(|incident| all || is_open(incident)));
    Ok(())
}
