//! Incidents CLI - terminal dispatch queue for the Ranger Incident
//! Management System.

mod commands;
mod error;
mod runner;

use clap::{Args, Parser, Subcommand};
use console::style;
use incidents::model::IncidentNumber;

use commands::common::PriorityArg;
use commands::config::ConfigCommands;
use error::CliError;
use runner::ServerArgs;

#[derive(Debug, Parser)]
#[command(name = "incidents", version, about = "Dispatch queue for the Ranger IMS")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Connection options for commands that reach the server.
#[derive(Debug, Args)]
struct ServerOptions {
    /// Server base URL (e.g. https://ims.example.com/ims/api/), overriding the config file
    #[arg(long, env = "IMS_SERVER")]
    server: Option<String>,

    /// Username to authenticate with, overriding server.username
    #[arg(long, short = 'u', env = "IMS_USERNAME")]
    username: Option<String>,

    /// Password to authenticate with; prompted for when needed if absent
    #[arg(long, env = "IMS_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl From<ServerOptions> for ServerArgs {
    fn from(options: ServerOptions) -> Self {
        ServerArgs {
            server: options.server,
            username: options.username,
            password: options.password,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Keep synchronized and reprint the queue when incidents change
    Watch {
        #[command(flatten)]
        server: ServerOptions,

        /// Seconds between reloads
        #[arg(long, short = 'i')]
        interval: Option<u64>,

        /// Include closed incidents
        #[arg(long, short = 'a')]
        all: bool,
    },

    /// Print the dispatch queue once
    List {
        #[command(flatten)]
        server: ServerOptions,

        /// Include closed incidents
        #[arg(long, short = 'a')]
        all: bool,
    },

    /// Print one incident in full
    Show {
        #[command(flatten)]
        server: ServerOptions,

        /// Incident number
        number: IncidentNumber,
    },

    /// File a new incident
    Create {
        #[command(flatten)]
        server: ServerOptions,

        /// One-line summary
        #[arg(long, short = 's')]
        summary: String,

        /// Priority
        #[arg(long, short = 'p', value_enum)]
        priority: Option<PriorityArg>,

        /// Incident type (repeatable)
        #[arg(long = "type", short = 't')]
        incident_types: Vec<String>,

        /// Ranger handle to attach (repeatable)
        #[arg(long = "ranger", short = 'r')]
        rangers: Vec<String>,

        /// Location name
        #[arg(long, short = 'l')]
        location: Option<String>,
    },

    /// View or edit configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Watch {
            server,
            interval,
            all,
        } => commands::watch::run(server.into(), commands::watch::WatchArgs { interval, all }),
        Commands::List { server, all } => commands::list::run(server.into(), all),
        Commands::Show { server, number } => commands::show::run(server.into(), number),
        Commands::Create {
            server,
            summary,
            priority,
            incident_types,
            rangers,
            location,
        } => commands::create::run(
            server.into(),
            commands::create::CreateArgs {
                summary,
                priority,
                incident_types,
                rangers,
                location,
            },
        ),
        Commands::Config { command } => commands::config::run(command),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "incidents", "create", "-s", "Lost child", "-p", "high", "-t", "Lost Child", "-r",
            "Tool", "-r", "Splinter",
        ])
        .unwrap();

        match cli.command {
            Commands::Create {
                summary,
                priority,
                rangers,
                ..
            } => {
                assert_eq!(summary, "Lost child");
                assert_eq!(priority, Some(PriorityArg::High));
                assert_eq!(rangers, vec!["Tool", "Splinter"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from(["incidents", "config", "set", "server.host", "ims.example.com"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Set { .. }
            }
        ));
    }
}
