use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    envelope::{MsgType, RoutedUpdate, UpdatePath, UpdatePayload},
    shared::Identifier,
    signal::{SignalHistory, SignalSample, SystemHistory, SystemSample},
};

use super::error::{QueryError, StoreApplyError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerNode {
    id: Identifier,
    signal_state: SignalHistory,
    system_state: SystemHistory,
}

impl ListenerNode {
    fn new(id: Identifier, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            signal_state: SignalHistory::pre_init(created_at),
            system_state: SystemHistory::pre_init(created_at),
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn signal_state(&self) -> &SignalHistory {
        &self.signal_state
    }

    pub fn system_state(&self) -> &SystemHistory {
        &self.system_state
    }

    /// Records a signal sample. Returns `true` if it replaced the current sample, `false` if it
    /// refreshed it in place.
    fn apply_signal(&mut self, msg_type: MsgType, sample: SignalSample) -> bool {
        let replacing = msg_type == MsgType::SignalStatusChange
            || self.signal_state.current().status() != sample.status();

        if replacing {
            self.signal_state.replace(sample);
        } else {
            self.signal_state.refresh(sample);
        }

        replacing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceNode {
    id: Identifier,
    system_state: SystemHistory,
    listeners: BTreeMap<Identifier, ListenerNode>,
}

impl SourceNode {
    fn new(id: Identifier, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            system_state: SystemHistory::pre_init(created_at),
            listeners: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn system_state(&self) -> &SystemHistory {
        &self.system_state
    }

    pub fn listeners(&self) -> &BTreeMap<Identifier, ListenerNode> {
        &self.listeners
    }

    fn listener(&self, listener: &Identifier) -> Result<&ListenerNode, QueryError> {
        self.listeners
            .get(listener)
            .ok_or_else(|| QueryError::UnknownListener(listener.clone()))
    }

    fn listener_mut(&mut self, id: &Identifier, now: DateTime<Utc>) -> &mut ListenerNode {
        self.listeners
            .entry(id.clone())
            .or_insert_with(|| ListenerNode::new(id.clone(), now))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeNode {
    id: Identifier,
    radio_sources: BTreeMap<Identifier, SourceNode>,
}

impl ProbeNode {
    fn new(id: Identifier) -> Self {
        Self {
            id,
            radio_sources: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn radio_sources(&self) -> &BTreeMap<Identifier, SourceNode> {
        &self.radio_sources
    }

    fn source_mut(&mut self, id: &Identifier, now: DateTime<Utc>) -> &mut SourceNode {
        self.radio_sources
            .entry(id.clone())
            .or_insert_with(|| SourceNode::new(id.clone(), now))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteNode {
    id: Identifier,
    probes: BTreeMap<Identifier, ProbeNode>,
}

impl SiteNode {
    fn new(id: Identifier) -> Self {
        Self {
            id,
            probes: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn probes(&self) -> &BTreeMap<Identifier, ProbeNode> {
        &self.probes
    }
}

/// Outcome of applying one update to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Applied {
    Replaced,
    Refreshed,
}

/// Scoped selection of the state tree, as addressed by the read surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateQuery {
    Sites,
    Site {
        site: Identifier,
    },
    Probes {
        site: Identifier,
    },
    Probe {
        site: Identifier,
        probe: Identifier,
    },
    Sources {
        site: Identifier,
        probe: Identifier,
    },
    Source {
        site: Identifier,
        probe: Identifier,
        source: Identifier,
    },
    Listeners {
        site: Identifier,
        probe: Identifier,
        source: Identifier,
    },
    Listener {
        site: Identifier,
        probe: Identifier,
        source: Identifier,
        listener: Identifier,
    },
    CurrentSignalState {
        site: Identifier,
        probe: Identifier,
        source: Identifier,
        listener: Identifier,
    },
}

/// Point-in-time copy of the part of the tree selected by a [`StateQuery`].
///
/// Collections serialize as a single-key object named after the collection (`sites`, `probes`,
/// `radio_sources`, `listeners`); nodes serialize as themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum StateView {
    Sites(BTreeMap<Identifier, SiteNode>),
    Site(SiteNode),
    Probes(BTreeMap<Identifier, ProbeNode>),
    Probe(ProbeNode),
    Sources(BTreeMap<Identifier, SourceNode>),
    Source(SourceNode),
    Listeners(BTreeMap<Identifier, ListenerNode>),
    Listener(ListenerNode),
    CurrentSignalState(SignalSample),
}

impl Serialize for StateView {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        fn single<S: serde::Serializer, T: Serialize>(
            serializer: S,
            key: &str,
            value: &T,
        ) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry(key, value)?;
            map.end()
        }

        match self {
            Self::Sites(sites) => single(serializer, "sites", sites),
            Self::Site(site) => site.serialize(serializer),
            Self::Probes(probes) => single(serializer, "probes", probes),
            Self::Probe(probe) => probe.serialize(serializer),
            Self::Sources(sources) => single(serializer, "radio_sources", sources),
            Self::Source(source) => source.serialize(serializer),
            Self::Listeners(listeners) => single(serializer, "listeners", listeners),
            Self::Listener(listener) => listener.serialize(serializer),
            Self::CurrentSignalState(sample) => single(serializer, "current_signal_state", sample),
        }
    }
}

/// Live site → probe → source → listener structure backing the read surface.
///
/// Sites and probes exist only once registered. Sources and listeners appear the first time an
/// update addressed to them is applied, with `PRE_INIT` histories stamped at that moment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateTree {
    sites: BTreeMap<Identifier, SiteNode>,
}

impl StateTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sites(&self) -> &BTreeMap<Identifier, SiteNode> {
        &self.sites
    }

    /// Announces a probe and its owning site. Returns `false` if the pair was already known.
    pub(crate) fn register_probe(&mut self, site: &Identifier, probe: &Identifier) -> bool {
        let site_node = self
            .sites
            .entry(site.clone())
            .or_insert_with(|| SiteNode::new(site.clone()));

        if site_node.probes.contains_key(probe) {
            return false;
        }

        site_node
            .probes
            .insert(probe.clone(), ProbeNode::new(probe.clone()));
        true
    }

    pub fn listener(&self, path: &UpdatePath) -> Option<&ListenerNode> {
        self.sites
            .get(&path.site)?
            .probes
            .get(&path.probe)?
            .radio_sources
            .get(&path.source)?
            .listeners
            .get(path.listener.as_ref()?)
    }

    /// Applies one fully unwrapped update to the leaf its path addresses.
    pub(crate) fn apply(
        &mut self,
        update: RoutedUpdate,
        now: DateTime<Utc>,
    ) -> Result<Applied, StoreApplyError> {
        let (path, msg_type, payload) = update.into_parts();

        let site = self
            .sites
            .get_mut(&path.site)
            .ok_or_else(|| StoreApplyError::UnknownSite(path.site.clone()))?;

        let probe = site
            .probes
            .get_mut(&path.probe)
            .ok_or_else(|| StoreApplyError::UnknownProbe {
                site: path.site.clone(),
                probe: path.probe.clone(),
            })?;

        let source = probe.source_mut(&path.source, now);

        let applied = match (&path.listener, payload) {
            (Some(listener), UpdatePayload::Signal(sample)) => {
                if source.listener_mut(listener, now).apply_signal(msg_type, sample) {
                    Applied::Replaced
                } else {
                    Applied::Refreshed
                }
            }
            (Some(listener), UpdatePayload::System(sample)) => {
                replace_system(&mut source.listener_mut(listener, now).system_state, sample)
            }
            (None, UpdatePayload::System(sample)) => {
                replace_system(&mut source.system_state, sample)
            }
            (None, UpdatePayload::Signal(_)) => {
                return Err(StoreApplyError::MissingListener(path.clone()));
            }
        };

        Ok(applied)
    }

    pub fn query(&self, query: &StateQuery) -> Result<StateView, QueryError> {
        let view = match query {
            StateQuery::Sites => StateView::Sites(self.sites.clone()),
            StateQuery::Site { site } => StateView::Site(self.site(site)?.clone()),
            StateQuery::Probes { site } => StateView::Probes(self.site(site)?.probes.clone()),
            StateQuery::Probe { site, probe } => StateView::Probe(self.probe(site, probe)?.clone()),
            StateQuery::Sources { site, probe } => {
                StateView::Sources(self.probe(site, probe)?.radio_sources.clone())
            }
            StateQuery::Source {
                site,
                probe,
                source,
            } => StateView::Source(self.source(site, probe, source)?.clone()),
            StateQuery::Listeners {
                site,
                probe,
                source,
            } => StateView::Listeners(self.source(site, probe, source)?.listeners.clone()),
            StateQuery::Listener {
                site,
                probe,
                source,
                listener,
            } => {
                let node = self.source(site, probe, source)?.listener(listener)?;
                StateView::Listener(node.clone())
            }
            StateQuery::CurrentSignalState {
                site,
                probe,
                source,
                listener,
            } => {
                let node = self.source(site, probe, source)?.listener(listener)?;
                StateView::CurrentSignalState(node.signal_state.current().clone())
            }
        };

        Ok(view)
    }

    fn site(&self, site: &Identifier) -> Result<&SiteNode, QueryError> {
        self.sites
            .get(site)
            .ok_or_else(|| QueryError::UnknownSite(site.clone()))
    }

    fn probe(&self, site: &Identifier, probe: &Identifier) -> Result<&ProbeNode, QueryError> {
        self.site(site)?
            .probes
            .get(probe)
            .ok_or_else(|| QueryError::UnknownProbe(probe.clone()))
    }

    fn source(
        &self,
        site: &Identifier,
        probe: &Identifier,
        source: &Identifier,
    ) -> Result<&SourceNode, QueryError> {
        self.probe(site, probe)?
            .radio_sources
            .get(source)
            .ok_or_else(|| QueryError::UnknownSource(source.clone()))
    }
}

fn replace_system(history: &mut SystemHistory, sample: SystemSample) -> Applied {
    history.replace(sample);
    Applied::Replaced
}
