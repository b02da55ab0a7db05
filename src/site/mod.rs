use std::sync::{Arc, Mutex};

use futures::future;

use crate::{
    frontend::RadioFrontend,
    logging::LogContext,
    probe::{ProbeMonitor, ProbeMonitorController, SourceLink},
    shared::{Identified, Identifier, error::ConfigError},
    signal::SystemStatus,
    source::{SourceAggregator, SourceConfig, SourceController, error::SourceError},
    store::{StateReader, StateStore, StateStoreController, StoreConfig},
};

mod config;
pub(crate) mod error;

use error::{Result, SiteError};

pub use config::{ProbeConfig, SiteConfig};

/// Supplies the frontend that backs each configured radio source.
///
/// Closures taking `(&Identifier, &SourceConfig)`, the probe id and the source configuration,
/// implement this trait.
pub trait FrontendProvider: Send + Sync {
    fn frontend(&self, probe: &Identifier, source: &SourceConfig) -> Arc<dyn RadioFrontend>;
}

impl<F> FrontendProvider for F
where
    F: Fn(&Identifier, &SourceConfig) -> Arc<dyn RadioFrontend> + Send + Sync,
{
    fn frontend(&self, probe: &Identifier, source: &SourceConfig) -> Arc<dyn RadioFrontend> {
        self(probe, source)
    }
}

/// Operational status of one radio source, as seen by its controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatusEntry {
    pub probe: Identifier,
    pub source: Identifier,
    pub status: SystemStatus,
}

#[derive(Debug)]
struct RunningProbe {
    monitor: Arc<ProbeMonitorController>,
    sources: Vec<Arc<SourceController>>,
}

/// Controller for a running site.
#[derive(Debug)]
pub struct SiteController {
    id: Identifier,
    store: Arc<StateStoreController>,
    probes: Mutex<Option<Vec<RunningProbe>>>,
}

impl SiteController {
    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// Read access to the site's state tree. Stays valid after shutdown.
    pub fn reader(&self) -> Arc<dyn StateReader> {
        self.store.reader()
    }

    /// Returns the status of every radio source of the site, in configuration order.
    ///
    /// Empty once the site has been shut down.
    pub fn source_statuses(&self) -> Vec<SourceStatusEntry> {
        let probes = self
            .probes
            .lock()
            .expect("`SiteController` mutex can't be poisoned");

        let Some(probes) = probes.as_ref() else {
            return Vec::new();
        };

        probes
            .iter()
            .flat_map(|probe| {
                probe.sources.iter().map(|source| SourceStatusEntry {
                    probe: probe.monitor.probe().clone(),
                    source: source.id().clone(),
                    status: source.status_snapshot(),
                })
            })
            .collect()
    }

    /// Stops every radio source, lets each probe monitor forward what its sources emitted while
    /// stopping, then stops the state store once it has applied it all.
    ///
    /// Every step is attempted even if an earlier one failed; the first failure is returned.
    /// Sources that had already terminated on their own are not failures. This method can only be
    /// called once per controller instance.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(probes) = self
            .probes
            .lock()
            .expect("`SiteController` mutex can't be poisoned")
            .take()
        else {
            return Err(SiteError::AlreadyShutdown);
        };

        let log_ctx = LogContext::new().with_site(&self.id);
        log::info!("{} SITE_SHUTDOWN_STARTED", log_ctx);

        let mut first_error: Option<SiteError> = None;
        let mut record = |e: SiteError| {
            log::error!("{} SITE_SHUTDOWN_STEP_FAILED error={}", log_ctx, e);
            first_error.get_or_insert(e);
        };

        let stops = probes
            .iter()
            .flat_map(|probe| probe.sources.iter().map(|source| source.stop()));

        for res in future::join_all(stops).await {
            match res {
                Ok(()) | Err(SourceError::AlreadyTerminated { .. }) => {}
                Err(e) => record(e.into()),
            }
        }

        let shutdowns = probes.iter().map(|probe| probe.monitor.shutdown());

        for res in future::join_all(shutdowns).await {
            if let Err(e) = res {
                record(e.into());
            }
        }

        if let Err(e) = self.store.shutdown().await {
            record(e.into());
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                log::info!("{} SITE_SHUTDOWN_COMPLETED", log_ctx);
                Ok(())
            }
        }
    }
}

/// Assembles a whole site: the state store, every probe's radio sources and probe monitors.
pub struct SiteEngine<P: FrontendProvider> {
    config: SiteConfig,
    store_config: StoreConfig,
    provider: P,
}

impl<P: FrontendProvider> SiteEngine<P> {
    pub fn new(config: SiteConfig, store_config: StoreConfig, provider: P) -> Self {
        Self {
            config,
            store_config,
            provider,
        }
    }

    /// Registers every probe with a new state store and starts the store, then each radio
    /// source and each probe monitor.
    pub fn start(self) -> Result<Arc<SiteController>> {
        let site = self.config.id().clone();
        let log_ctx = LogContext::new().with_site(&site);

        let store = StateStore::new(self.store_config);
        for probe in self.config.probes().iter() {
            store.register_probe(&site, probe.id());
        }

        let store_input = store.input();
        let store = store.start();

        let mut probes = Vec::with_capacity(self.config.probes().len());

        for probe_config in self.config.probes().iter() {
            let probe = probe_config.id();
            let mut monitor = ProbeMonitor::new(site.clone(), probe.clone())
                .with_shutdown_timeout(probe_config.monitor_shutdown_timeout().as_secs());
            let mut sources = Vec::with_capacity(probe_config.sources().len());

            for source_config in probe_config.sources().iter() {
                let frontend = self.provider.frontend(probe, source_config);
                let source_log_ctx = log_ctx.with_probe(probe).with_source(source_config.id());

                let (controller, outbound) =
                    SourceAggregator::new(probe.clone(), source_config.clone(), frontend)
                        .with_log_context(source_log_ctx)
                        .start();

                monitor
                    .add_source(SourceLink::new(controller.id().clone(), outbound))
                    .map_err(ConfigError::from)?;
                sources.push(controller);
            }

            probes.push(RunningProbe {
                monitor: monitor.start(store_input.clone()),
                sources,
            });
        }

        log::info!(
            "{} SITE_STARTED probes={} sources={}",
            log_ctx,
            probes.len(),
            probes.iter().map(|p| p.sources.len()).sum::<usize>()
        );

        Ok(Arc::new(SiteController {
            id: site,
            store,
            probes: Mutex::new(Some(probes)),
        }))
    }
}

#[cfg(test)]
mod tests;
