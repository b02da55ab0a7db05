use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use futures::{FutureExt, StreamExt, future::BoxFuture, stream::FuturesUnordered};
use serde::Serialize;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinError,
    time::{self, MissedTickBehavior},
};

use crate::{
    envelope::{MsgType, encode_source_update},
    frontend::{ListenerTuning, WrappedFrontend},
    logging::LogContext,
    shared::{Identified, Identifier},
    signal::{
        ClassifierTask, ListenerNotification, SignalSample, SignalStatus, SystemSample,
        SystemStatus,
    },
    tap::DataTap,
    util::AbortOnDropHandle,
};

use super::{
    config::{ListenerConfig, SourceConfig, SourceProcessConfig},
    state::SourceStatusManager,
};

pub(crate) mod error;

use error::{ProcessResult, SourceProcessFatalError, SourceProcessRecoverableError};

/// How long classifier tasks get to wind down before they are aborted.
const LISTENER_STOP_GRACE: time::Duration = time::Duration::from_secs(1);

/// Instruction accepted on a source's inbound control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SourceControl {
    Stop,
}

type ClassifierExit = BoxFuture<'static, (Identifier, Result<(), JoinError>)>;

/// Classifier tasks and the channels that connect them to the aggregator.
struct RunningListeners {
    shutdown_tx: broadcast::Sender<()>,
    // Held so that `notification_rx` stays open for as long as the listeners run
    _notification_tx: mpsc::Sender<String>,
    notification_rx: mpsc::Receiver<String>,
    classifiers: FuturesUnordered<ClassifierExit>,
    spectrum_tap: Option<AbortOnDropHandle<()>>,
}

impl RunningListeners {
    async fn stop(mut self, log_ctx: &LogContext) {
        // Ignore no-receivers errors
        let _ = self.shutdown_tx.send(());

        let classifiers = &mut self.classifiers;
        let drain = async move { while classifiers.next().await.is_some() {} };
        if time::timeout(LISTENER_STOP_GRACE, drain).await.is_err() {
            log::warn!("{} CLASSIFIER_STOP_TIMEOUT", log_ctx);
        }

        if let Some(handle) = self.spectrum_tap.take()
            && time::timeout(LISTENER_STOP_GRACE, handle).await.is_err()
        {
            log::warn!("{} SPECTRUM_TAP_STOP_TIMEOUT", log_ctx);
        }
    }
}

/// Worker task of one radio source.
///
/// Owns the frontend lifecycle and every classifier of the source. Its only links to the rest of
/// the system are the control channel it reads and the outbound channel it writes serialized
/// source-tier envelopes to.
pub(super) struct SourceProcess {
    config: SourceProcessConfig,
    probe: Identifier,
    source: Identifier,
    frontend: WrappedFrontend,
    outbound_tx: mpsc::Sender<String>,
    status_manager: Arc<SourceStatusManager>,
    last_signal: HashMap<Identifier, SignalStatus>,
    log_ctx: LogContext,
}

impl SourceProcess {
    pub fn spawn(
        config: &SourceConfig,
        probe: Identifier,
        frontend: WrappedFrontend,
        control_rx: mpsc::Receiver<SourceControl>,
        outbound_tx: mpsc::Sender<String>,
        status_manager: Arc<SourceStatusManager>,
        log_ctx: LogContext,
    ) -> AbortOnDropHandle<()> {
        let last_signal = config
            .listeners()
            .ids()
            .map(|id| (id.clone(), SignalStatus::PreInit))
            .collect();

        let process = Self {
            config: config.into(),
            probe,
            source: config.id().clone(),
            frontend,
            outbound_tx,
            status_manager,
            last_signal,
            log_ctx,
        };

        tokio::spawn(process.run(control_rx)).into()
    }

    async fn run(mut self, mut control_rx: mpsc::Receiver<SourceControl>) {
        match self.lifecycle(&mut control_rx).await {
            Ok(()) => log::info!("{} SOURCE_EXITED", self.log_ctx),
            Err(e) => {
                log::error!("{} SOURCE_FAILED error={}", self.log_ctx, e);
                self.status_manager.update(SystemStatus::Failed);
            }
        }
    }

    async fn lifecycle(
        &mut self,
        control_rx: &mut mpsc::Receiver<SourceControl>,
    ) -> ProcessResult<()> {
        self.transition(SystemStatus::Init, Some(SignalStatus::Init))
            .await?;

        if let Err(e) = self.start_frontend().await {
            // Best-effort report, the outbound channel may already be gone
            let _ = self
                .transition(SystemStatus::Failed, Some(SignalStatus::Inop))
                .await;
            return Err(e);
        }

        self.transition(SystemStatus::Start, Some(SignalStatus::Start))
            .await?;

        let mut listeners = self.start_listeners();

        let run_res = match self.transition(SystemStatus::Run, None).await {
            Ok(()) => self.event_loop(&mut listeners, control_rx).await,
            Err(e) => Err(e),
        };

        let shutdown_res = self
            .transition(SystemStatus::Shutdown, Some(SignalStatus::Shutdown))
            .await;

        listeners.stop(&self.log_ctx).await;

        if let Err(e) = self.frontend.stop().await {
            let e = SourceProcessRecoverableError::FrontendStop(e);
            log::warn!("{} FRONTEND_STOP_FAILED error={}", self.log_ctx, e);
        }

        run_res?;
        shutdown_res?;

        self.transition(SystemStatus::Stop, None).await
    }

    async fn start_frontend(&self) -> ProcessResult<()> {
        let tunings: Vec<ListenerTuning> = self
            .config
            .listeners()
            .iter()
            .map(ListenerConfig::tuning)
            .collect();

        self.frontend
            .start(&tunings)
            .await
            .map_err(SourceProcessFatalError::FrontendStart)?;

        let center_hz = self.config.center_frequency_hz();
        if let Err(source) = self.frontend.set_center_frequency(center_hz).await {
            if let Err(e) = self.frontend.stop().await {
                let e = SourceProcessRecoverableError::FrontendStop(e);
                log::warn!("{} FRONTEND_STOP_FAILED error={}", self.log_ctx, e);
            }
            return Err(SourceProcessFatalError::FrontendTune { center_hz, source });
        }

        let demodulated = tunings
            .iter()
            .filter(|tuning| tuning.demodulation.is_enabled())
            .count();

        log::info!(
            "{} FRONTEND_STARTED listeners={} demodulated={} center_hz={}",
            self.log_ctx,
            tunings.len(),
            demodulated,
            center_hz
        );

        Ok(())
    }

    fn open_tap(&self, listener: Option<&Identifier>, log_ctx: &LogContext) -> Option<DataTap> {
        let path = self.config.tap_path(&self.probe, &self.source, listener);

        match DataTap::spawn(path, log_ctx.clone()) {
            Ok(tap) => Some(tap),
            Err(e) => {
                let e = SourceProcessRecoverableError::Tap(e);
                log::warn!("{} TAP_UNAVAILABLE error={}", log_ctx, e);
                None
            }
        }
    }

    fn start_listeners(&self) -> RunningListeners {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let (notification_tx, notification_rx) =
            mpsc::channel(self.config.notification_capacity().get());

        let classifiers = FuturesUnordered::new();

        for listener in self.config.listeners() {
            let log_ctx = self.log_ctx.with_listener(listener.id());

            let tap = if listener.tap_enabled() {
                self.open_tap(Some(listener.id()), &log_ctx)
            } else {
                None
            };

            let handle = ClassifierTask::new(
                listener.id().clone(),
                listener.threshold(),
                self.config.classify_interval(),
                self.frontend.clone(),
                notification_tx.clone(),
                tap,
                log_ctx,
            )
            .spawn(&shutdown_tx);

            let id = listener.id().clone();
            classifiers.push(handle.map(move |res| (id, res)).boxed());
        }

        let spectrum_tap = if self.config.spectrum_tap_enabled() {
            self.open_tap(None, &self.log_ctx)
                .map(|tap| self.spawn_spectrum_tap(tap, &shutdown_tx))
        } else {
            None
        };

        RunningListeners {
            shutdown_tx,
            _notification_tx: notification_tx,
            notification_rx,
            classifiers,
            spectrum_tap,
        }
    }

    fn spawn_spectrum_tap(
        &self,
        tap: DataTap,
        shutdown_tx: &broadcast::Sender<()>,
    ) -> AbortOnDropHandle<()> {
        let mut shutdown_rx = shutdown_tx.subscribe();
        let frontend = self.frontend.clone();
        let period = self.config.spectrum_tap_interval();
        let log_ctx = self.log_ctx.clone();

        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => match frontend.source_spectrum().await {
                        Ok(slice) => tap.update_value(slice),
                        Err(e) => {
                            let e = SourceProcessRecoverableError::SourceSpectrum(e);
                            log::debug!("{} SPECTRUM_SKIPPED error={}", log_ctx, e);
                        }
                    },
                    _ = shutdown_rx.recv() => break,
                }
            }
        })
        .into()
    }

    async fn event_loop(
        &mut self,
        listeners: &mut RunningListeners,
        control_rx: &mut mpsc::Receiver<SourceControl>,
    ) -> ProcessResult<()> {
        loop {
            // Notifications a classifier queued before exiting are handled ahead of its exit
            tokio::select! {
                biased;

                control = control_rx.recv() => {
                    match control {
                        Some(SourceControl::Stop) => {
                            log::info!("{} SOURCE_STOP_REQUESTED", self.log_ctx);
                        }
                        None => {
                            log::warn!("{} SOURCE_CONTROL_CLOSED", self.log_ctx);
                        }
                    }
                    return Ok(());
                }
                Some(text) = listeners.notification_rx.recv() => {
                    self.handle_notification(&text).await?;
                }
                Some((listener, join_res)) = listeners.classifiers.next() => {
                    self.mark_inop(&listener, join_res).await?;
                }
            }
        }
    }

    fn parse_notification(
        &self,
        text: &str,
    ) -> Result<ListenerNotification, SourceProcessRecoverableError> {
        let notification: ListenerNotification = text.parse()?;

        match self.last_signal.get(notification.listener()) {
            None => {
                return Err(SourceProcessRecoverableError::UnknownListener(
                    notification.listener().clone(),
                ));
            }
            Some(SignalStatus::Inop) => {
                return Err(SourceProcessRecoverableError::InoperativeListener(
                    notification.listener().clone(),
                ));
            }
            Some(_) => {}
        }

        Ok(notification)
    }

    async fn handle_notification(&mut self, text: &str) -> ProcessResult<()> {
        let notification = match self.parse_notification(text) {
            Ok(notification) => notification,
            Err(e) => {
                log::warn!("{} NOTIFICATION_DROPPED error={}", self.log_ctx, e);
                return Ok(());
            }
        };

        // Samples are timestamped when the aggregator receives them
        let sample = SignalSample::new(notification.status(), notification.level(), Utc::now());

        self.emit_signal(notification.listener(), sample).await
    }

    async fn mark_inop(
        &mut self,
        listener: &Identifier,
        join_res: Result<(), JoinError>,
    ) -> ProcessResult<()> {
        let log_ctx = self.log_ctx.with_listener(listener);
        match join_res {
            Ok(()) => log::error!("{} LISTENER_INOP reason=classifier_exited", log_ctx),
            Err(e) => log::error!("{} LISTENER_INOP reason=classifier_died error={}", log_ctx, e),
        }

        let now = Utc::now();
        self.emit_signal(listener, SignalSample::marker(SignalStatus::Inop, now))
            .await?;
        self.emit(
            MsgType::ListenerSysStateChange,
            Some(listener),
            &SystemSample::new(SystemStatus::Failed, now),
        )
        .await
    }

    /// Records a lifecycle transition of the source and of each of its listeners.
    ///
    /// Listener signal states get a marker sample when `signal` is given.
    async fn transition(
        &mut self,
        status: SystemStatus,
        signal: Option<SignalStatus>,
    ) -> ProcessResult<()> {
        self.status_manager.update(status);
        log::info!("{} SOURCE_STATE status={}", self.log_ctx, status);

        let now = Utc::now();
        let sample = SystemSample::new(status, now);

        self.emit(MsgType::ReceiverSysStateChange, None, &sample)
            .await?;

        // Inoperative listeners keep their INOP signal and FAILED system state
        let listener_ids: Vec<Identifier> = self
            .config
            .listeners()
            .iter()
            .map(|l| l.id().clone())
            .filter(|id| self.last_signal.get(id) != Some(&SignalStatus::Inop))
            .collect();

        for listener in &listener_ids {
            self.emit(MsgType::ListenerSysStateChange, Some(listener), &sample)
                .await?;

            if let Some(signal) = signal {
                self.emit_signal(listener, SignalSample::marker(signal, now))
                    .await?;
            }
        }

        Ok(())
    }

    /// Forwards a listener's signal sample, as a status change if its status differs from the last
    /// one forwarded, or as an in-place refresh otherwise.
    async fn emit_signal(
        &mut self,
        listener: &Identifier,
        sample: SignalSample,
    ) -> ProcessResult<()> {
        let previous = self.last_signal.insert(listener.clone(), sample.status());

        let msg_type = if previous == Some(sample.status()) {
            MsgType::SignalState
        } else {
            log::debug!(
                "{} SIGNAL_STATUS_CHANGE listener={} status={}",
                self.log_ctx,
                listener,
                sample.status()
            );
            MsgType::SignalStatusChange
        };

        self.emit(msg_type, Some(listener), &sample).await
    }

    async fn emit<T: Serialize>(
        &self,
        msg_type: MsgType,
        listener: Option<&Identifier>,
        payload: &T,
    ) -> ProcessResult<()> {
        let text = match encode_source_update(msg_type, &self.source, listener, payload) {
            Ok(text) => text,
            Err(e) => {
                let e = SourceProcessRecoverableError::Envelope(e);
                log::warn!("{} ENVELOPE_DROPPED error={}", self.log_ctx, e);
                return Ok(());
            }
        };

        self.outbound_tx
            .send(text)
            .await
            .map_err(|_| SourceProcessFatalError::OutboundClosed)
    }
}
