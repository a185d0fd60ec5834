//! Application context
//!
//! Bundles the frozen configuration snapshot, the operation timeout handed
//! to external collaborators, and the lifecycle [`Supervisor`]. Construct one
//! per process and pass it to whatever needs it.

use crate::classifier::Classifier;
use crate::config::Config;
use crate::error::Result;
use crate::lifecycle::{CloseReport, Closer, ShutdownSignal, Supervisor};
use crate::rules::CountryLookup;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default per-operation timeout for collaborators
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppContext {
    config: Arc<Config>,
    timeout: Duration,
    supervisor: Supervisor,
}

impl AppContext {
    /// Load the configuration from `path`
    pub fn from_file<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        let config = Config::load(path)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(Self::from_config(config, timeout))
    }

    /// Parse a JSON configuration document
    pub fn from_slice(bytes: &[u8], timeout: Duration) -> Result<Self> {
        Ok(Self::from_config(Config::from_slice(bytes)?, timeout))
    }

    /// Wrap an already parsed configuration
    pub fn from_config(config: Config, timeout: Duration) -> Self {
        Self {
            config: Arc::new(config.normalized()),
            timeout,
            supervisor: Supervisor::new(),
        }
    }

    /// Configuration snapshot
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Timeout for collaborator operations
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Lifecycle supervisor
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Build the flow classifier from the snapshot
    pub fn build_classifier(&self, lookup: Arc<dyn CountryLookup>) -> Result<Classifier> {
        Classifier::from_config(&self.config, lookup)
    }

    /// Register a resource with the supervisor
    pub fn attach<C>(&self, closer: C) -> Result<()>
    where
        C: Closer + 'static,
    {
        self.supervisor.register(closer)
    }

    /// Shutdown signal
    pub fn done(&self) -> ShutdownSignal {
        self.supervisor.done()
    }

    /// Shut everything down
    pub fn close(&self) -> CloseReport {
        self.supervisor.close()
    }
}
