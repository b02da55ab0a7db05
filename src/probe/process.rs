use futures::{
    FutureExt, StreamExt,
    stream::{self, BoxStream, SelectAll},
};
use tokio::sync::broadcast;

use crate::{
    envelope::Envelope,
    logging::LogContext,
    shared::Identifier,
    source::SourceOutbound,
    store::StoreInput,
    util::AbortOnDropHandle,
};

use super::error::{ProbeMonitorFatalError, ProbeMonitorRecoverableError};

type FanIn = SelectAll<BoxStream<'static, (Identifier, String)>>;

/// Merges the outbound channels of every source into one stream tagged with the source id.
///
/// Messages of one source keep their channel order. Messages of different sources interleave in
/// whatever order they become ready.
pub(super) fn fan_in(links: Vec<(Identifier, SourceOutbound)>) -> FanIn {
    stream::select_all(links.into_iter().map(|(source, outbound)| {
        stream::unfold(outbound, |mut outbound| async move {
            outbound.recv().await.map(|text| (text, outbound))
        })
        .map(move |text| (source.clone(), text))
        .boxed()
    }))
}

pub(super) struct ProbeMonitorProcess {
    site: Identifier,
    probe: Identifier,
    store_tx: StoreInput,
    forwarded: u64,
    dropped: u64,
    log_ctx: LogContext,
}

impl ProbeMonitorProcess {
    pub fn spawn(
        site: Identifier,
        probe: Identifier,
        links: Vec<(Identifier, SourceOutbound)>,
        store_tx: StoreInput,
        shutdown_tx: &broadcast::Sender<()>,
    ) -> AbortOnDropHandle<()> {
        let shutdown_rx = shutdown_tx.subscribe();
        let log_ctx = LogContext::new().with_site(&site).with_probe(&probe);

        let process = Self {
            site,
            probe,
            store_tx,
            forwarded: 0,
            dropped: 0,
            log_ctx,
        };

        tokio::spawn(process.run(fan_in(links), shutdown_rx)).into()
    }

    async fn run(mut self, mut fan_in: FanIn, mut shutdown_rx: broadcast::Receiver<()>) {
        log::info!("{} PROBE_MONITOR_STARTED sources={}", self.log_ctx, fan_in.len());

        let res = loop {
            tokio::select! {
                next = fan_in.next() => match next {
                    Some((source, text)) => {
                        if let Err(e) = self.forward(&source, text).await {
                            break Err(e);
                        }
                    }
                    None => {
                        log::info!("{} PROBE_SOURCES_CLOSED", self.log_ctx);
                        break Ok(());
                    }
                },
                _ = shutdown_rx.recv() => {
                    break self.drain(&mut fan_in).await;
                }
            }
        };

        match res {
            Ok(()) => log::info!(
                "{} PROBE_MONITOR_STOPPED forwarded={} dropped={}",
                self.log_ctx,
                self.forwarded,
                self.dropped
            ),
            Err(e) => log::error!(
                "{} PROBE_MONITOR_FAILED forwarded={} dropped={} error={}",
                self.log_ctx,
                self.forwarded,
                self.dropped,
                e
            ),
        }
    }

    /// Forwards whatever is already buffered in the source channels, without waiting for more.
    async fn drain(&mut self, fan_in: &mut FanIn) -> Result<(), ProbeMonitorFatalError> {
        log::info!("{} PROBE_MONITOR_DRAINING", self.log_ctx);

        while let Some(Some((source, text))) = fan_in.next().now_or_never() {
            self.forward(&source, text).await?;
        }

        Ok(())
    }

    /// Re-addresses a source-tier envelope into the site tier, carrying it verbatim as payload.
    fn rewrap(
        &self,
        source: &Identifier,
        text: String,
    ) -> Result<String, ProbeMonitorRecoverableError> {
        let envelope = Envelope::decode(&text)?;

        if envelope.id() != source {
            return Err(ProbeMonitorRecoverableError::OriginMismatch {
                expected: source.clone(),
                found: envelope.id().clone(),
            });
        }

        let site_tier = Envelope::wrap_site(
            envelope.msg_type(),
            self.site.clone(),
            self.probe.clone(),
            text,
        );

        Ok(site_tier.encode()?)
    }

    async fn forward(
        &mut self,
        source: &Identifier,
        text: String,
    ) -> Result<(), ProbeMonitorFatalError> {
        let site_tier = match self.rewrap(source, text) {
            Ok(site_tier) => site_tier,
            Err(e) => {
                self.dropped += 1;
                log::warn!(
                    "{} MESSAGE_DROPPED source={} error={}",
                    self.log_ctx,
                    source,
                    e
                );
                return Ok(());
            }
        };

        self.store_tx
            .send(site_tier)
            .await
            .map_err(|_| ProbeMonitorFatalError::StoreClosed)?;

        self.forwarded += 1;
        log::trace!("{} MESSAGE_FORWARDED source={}", self.log_ctx, source);

        Ok(())
    }
}
