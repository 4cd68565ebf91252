//! Watch command - keep the replica synchronized and reprint the queue
//! whenever an incident changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use console::{style, Term};
use incidents::ims::{ConnectionStatus, IncidentManagementSystem};
use tracing::{info, warn};

use super::common::{is_open, print_queue};
use crate::error::CliError;
use crate::runner::{CliRunner, ServerArgs};

/// Arguments for the watch command.
pub struct WatchArgs {
    /// Seconds between reloads, overriding `sync.reload_interval`.
    pub interval: Option<u64>,
    pub all: bool,
}

/// Run the watch command until Ctrl-C.
pub fn run(server: ServerArgs, args: WatchArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(&server)?;
    runner.log_startup("watch");

    let config = runner.config();
    let interval = match args.interval {
        Some(0) => return Err(CliError::InvalidArgument("--interval must be at least 1".to_string())),
        Some(seconds) => Duration::from_secs(seconds),
        None => config.sync.reload_interval,
    };
    if args.interval.is_none() && !config.sync.reload_timer {
        return Err(CliError::Config(
            "sync.reload_timer is off; pass --interval to watch anyway".to_string(),
        ));
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    println!(
        "{} {} watching {} every {}s (Ctrl-C to stop)",
        style("incidents").bold(),
        incidents::VERSION,
        runner.ims().base_url(),
        interval.as_secs()
    );

    let term = Term::stdout();
    let mut printed = false;
    let mut last_status = ConnectionStatus::Reset;

    while !shutdown.load(Ordering::SeqCst) {
        let connecting = runner.ims().connection_status() == ConnectionStatus::Reset;
        let status = match runner.reload() {
            Ok(status) => status,
            Err(CliError::Timeout(seconds)) => {
                warn!(seconds, "Reload did not finish; resetting connection");
                runner.ims().reset_connection();
                ConnectionStatus::Reset
            }
            Err(e) => return Err(e),
        };

        if status != last_status {
            info!(%status, "Connection status");
            if status == ConnectionStatus::Reset {
                eprintln!("{}", style("Connection lost; retrying").yellow());
            }
            last_status = status;
        }

        // Connecting only opens the session; load right away.
        if connecting && status.is_connected() {
            continue;
        }

        let updated = runner.delegate().take_updated();
        if status.is_connected() && (!printed || !updated.is_empty()) {
            printed = true;
            term.clear_screen().ok();
            let incidents = runner.ims().incidents_in_order();
            print_queue(incidents.iter().filter(|incident| args.all || is_open(incident)));
            if !updated.is_empty() {
                let numbers: Vec<String> = updated.iter().map(|n| format!("#{}", n)).collect();
                println!("Updated: {}", numbers.join(", "));
            }
        }

        sleep_unless_shutdown(interval, &shutdown);
    }

    println!();
    println!("Stopped.");
    Ok(())
}

fn sleep_unless_shutdown(duration: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !shutdown.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(100)));
    }
}
