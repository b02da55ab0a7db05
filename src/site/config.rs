use tokio::time;

use crate::{
    shared::{Identified, Identifier, Siblings, error::ConfigError},
    source::SourceConfig,
};

/// Configuration of one probe: the radio sources deployed at it.
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    id: Identifier,
    sources: Siblings<SourceConfig>,
    monitor_shutdown_timeout: time::Duration,
}

impl ProbeConfig {
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            sources: Siblings::new(),
            monitor_shutdown_timeout: time::Duration::from_secs(5),
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn sources(&self) -> &Siblings<SourceConfig> {
        &self.sources
    }

    /// Returns how long the probe monitor may take to forward buffered messages on shutdown.
    pub fn monitor_shutdown_timeout(&self) -> time::Duration {
        self.monitor_shutdown_timeout
    }

    /// Adds a radio source. Fails if a source with the same identifier is already configured.
    pub fn append_source(&mut self, source: SourceConfig) -> Result<(), ConfigError> {
        self.sources.append(source)?;
        Ok(())
    }

    pub fn with_source(mut self, source: SourceConfig) -> Result<Self, ConfigError> {
        self.append_source(source)?;
        Ok(self)
    }

    /// Sets how long the probe monitor may take to forward buffered messages on shutdown.
    ///
    /// Default: `5` seconds
    pub fn with_monitor_shutdown_timeout(mut self, secs: u64) -> Self {
        self.monitor_shutdown_timeout = time::Duration::from_secs(secs);
        self
    }
}

impl Identified for ProbeConfig {
    const KIND: &'static str = "probe";

    fn id(&self) -> &Identifier {
        &self.id
    }
}

/// Configuration of one site: the probes deployed at it.
#[derive(Clone, Debug)]
pub struct SiteConfig {
    id: Identifier,
    probes: Siblings<ProbeConfig>,
}

impl SiteConfig {
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            probes: Siblings::new(),
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn probes(&self) -> &Siblings<ProbeConfig> {
        &self.probes
    }

    /// Adds a probe. Fails if a probe with the same identifier is already configured.
    pub fn append_probe(&mut self, probe: ProbeConfig) -> Result<(), ConfigError> {
        self.probes.append(probe)?;
        Ok(())
    }

    pub fn with_probe(mut self, probe: ProbeConfig) -> Result<Self, ConfigError> {
        self.append_probe(probe)?;
        Ok(self)
    }
}
