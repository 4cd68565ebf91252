//! CLI error type.

use incidents::config::ConfigError;
use incidents::ims::ImsError;
use incidents::logging::LoggingError;
use incidents::model::IncidentNumber;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("Failed to start runtime: {0}")]
    Runtime(String),

    #[error("Unable to reach incident server at {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Timed out after {0} seconds waiting for the server")]
    Timeout(u64),

    #[error(transparent)]
    Ims(#[from] ImsError),

    #[error("No incident #{0}")]
    NoSuchIncident(IncidentNumber),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}
