//! Shared setup for commands that talk to the server.
//!
//! [`CliRunner`] loads configuration, installs logging, owns the tokio
//! runtime that drives HTTP requests, and wraps the synchronizing incident
//! management system with blocking connect/load helpers.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use dialoguer::{Input, Password};
use incidents::config::ConfigFile;
use incidents::http::ReqwestSessionFactory;
use incidents::ims::{
    ConnectionStatus, Credential, HttpIncidentManagementSystem, ImsDelegate,
    IncidentManagementSystem,
};
use incidents::logging::{self, LoggingGuard};
use incidents::model::{Incident, IncidentNumber};
use incidents::Url;
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::error::CliError;

/// How long to wait for a connection attempt or reload to settle.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Server options shared by every networked command.
#[derive(Debug, Clone, Default)]
pub struct ServerArgs {
    /// Full base URL, overriding `[server]` in the config file.
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Delegate for the terminal: collects changed incident numbers and
/// prompts for credentials.
pub struct DeskDelegate {
    username: Option<String>,
    password: Option<String>,
    updated: Mutex<BTreeSet<IncidentNumber>>,
}

impl DeskDelegate {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self {
            username,
            password,
            updated: Mutex::new(BTreeSet::new()),
        }
    }

    /// Numbers updated since the last call.
    pub fn take_updated(&self) -> BTreeSet<IncidentNumber> {
        std::mem::take(&mut *self.updated.lock())
    }
}

impl ImsDelegate for DeskDelegate {
    fn incident_did_update(&self, incident: &Incident) {
        if let Some(number) = incident.number() {
            self.updated.lock().insert(number);
        }
    }

    fn handle_auth(&self, host: &str, port: u16, realm: Option<&str>) -> Option<Credential> {
        // Called on a runtime worker; hand it over while waiting on the terminal.
        tokio::task::block_in_place(|| self.prompt_credential(host, port, realm))
    }
}

impl DeskDelegate {
    fn prompt_credential(&self, host: &str, port: u16, realm: Option<&str>) -> Option<Credential> {
        let place = match realm {
            Some(realm) => format!("{} ({}:{})", realm, host, port),
            None => format!("{}:{}", host, port),
        };

        let username = match &self.username {
            Some(username) => username.clone(),
            None => Input::<String>::new()
                .with_prompt(format!("Username for {}", place))
                .interact_text()
                .ok()?,
        };

        let password = match &self.password {
            Some(password) => password.clone(),
            None => Password::new()
                .with_prompt(format!("Password for {}@{}", username, place))
                .interact()
                .ok()?,
        };

        Some(Credential::new(username, password))
    }
}

/// Owns everything a networked command needs.
pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    ims: HttpIncidentManagementSystem,
    delegate: Arc<DeskDelegate>,
    _logging: LoggingGuard,
}

impl CliRunner {
    pub fn new(args: &ServerArgs) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;
        let logging = logging::init(&config.logging)?;

        let base_url = match &args.server {
            Some(server) => Url::parse(server)
                .map_err(|e| CliError::Config(format!("Invalid --server URL {}: {}", server, e)))?,
            None => config.server.base_url()?,
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("incidents-http")
            .build()
            .map_err(|e| CliError::Runtime(e.to_string()))?;

        let factory = ReqwestSessionFactory::new(config.session_config(), runtime.handle().clone());
        let ims = HttpIncidentManagementSystem::new(base_url, Arc::new(factory));

        let username = args.username.clone().or_else(|| config.server.username.clone());
        let delegate = Arc::new(DeskDelegate::new(username, args.password.clone()));
        ims.set_delegate(delegate.clone());

        Ok(Self {
            config,
            runtime,
            ims,
            delegate,
            _logging: logging,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn ims(&self) -> &HttpIncidentManagementSystem {
        &self.ims
    }

    pub fn delegate(&self) -> &DeskDelegate {
        &self.delegate
    }

    /// Log the command being run.
    pub fn log_startup(&self, command: &str) {
        info!(
            version = incidents::VERSION,
            command,
            server = %self.ims.base_url(),
            "Starting"
        );
    }

    /// Block until the connection is neither trying nor loading.
    pub fn wait_settled(&self, timeout: Duration) -> Result<ConnectionStatus, CliError> {
        let mut status = self.ims.status_watch();
        self.runtime.block_on(async move {
            let settled = tokio::time::timeout(
                timeout,
                status.wait_for(|s| matches!(s, ConnectionStatus::Idle | ConnectionStatus::Reset)),
            )
            .await;
            match settled {
                Ok(Ok(current)) => Ok(*current),
                Ok(Err(_)) => Err(CliError::Runtime("status channel closed".to_string())),
                Err(_) => Err(CliError::Timeout(timeout.as_secs())),
            }
        })
    }

    /// Reload once and wait for it to finish.
    ///
    /// From a reset connection this only connects.
    pub fn reload(&self) -> Result<ConnectionStatus, CliError> {
        self.ims.reload();
        self.wait_settled(SETTLE_TIMEOUT)
    }

    /// Connect if needed, then load every collection.
    pub fn load(&self) -> Result<(), CliError> {
        if self.ims.connection_status() == ConnectionStatus::Reset {
            debug!("Connecting");
            self.require_connected(self.reload()?)?;
        }
        self.require_connected(self.reload()?)
    }

    fn require_connected(&self, status: ConnectionStatus) -> Result<(), CliError> {
        if status.is_connected() {
            Ok(())
        } else {
            Err(CliError::Connection {
                url: self.ims.base_url().to_string(),
                reason: "connection reset; see the log for details".to_string(),
            })
        }
    }

    /// Run a future on the runtime.
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
