use std::{fmt, ops::ControlFlow, str::FromStr};

use tokio::{
    sync::{
        broadcast,
        mpsc::{self, error::TrySendError},
    },
    time::{self, MissedTickBehavior},
};

use crate::{
    frontend::{WrappedFrontend, error::FrontendError},
    logging::LogContext,
    shared::Identifier,
    tap::DataTap,
    util::AbortOnDropHandle,
};

use super::{
    error::{ClassifierError, NotificationParseError, ThresholdValidationError},
    spectrum::SpectrumSlice,
    state::SignalStatus,
};

/// Fraction of the slice, centred on the listener frequency, that is averaged for classification.
pub const CENTRAL_FRACTION: f64 = 0.1;

const NOTIFICATION_KIND: &str = "SIG_STATUS";

/// Validated presence threshold, in dBm. Always finite and negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct SignalThreshold(f64);

impl SignalThreshold {
    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for SignalThreshold {
    type Error = ThresholdValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value >= 0.0 {
            return Err(ThresholdValidationError::NotNegative(value));
        }

        Ok(Self(value))
    }
}

impl fmt::Display for SignalThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dBm", self.0)
    }
}

/// Result of classifying one spectrum slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    status: SignalStatus,
    level: f64,
}

impl Classification {
    pub fn status(&self) -> SignalStatus {
        self.status
    }

    /// Mean power over the central window, in dBm.
    pub fn level(&self) -> f64 {
        self.level
    }
}

/// Mean of the central [`CENTRAL_FRACTION`] of `bins`.
///
/// The window is at least one bin wide and is centred on the middle of the slice.
pub fn central_mean(bins: &[f32]) -> Result<f64, ClassifierError> {
    if bins.is_empty() {
        return Err(ClassifierError::EmptySlice);
    }

    if let Some(index) = bins.iter().position(|b| !b.is_finite()) {
        return Err(ClassifierError::NonFiniteBin { index });
    }

    let width = ((bins.len() as f64 * CENTRAL_FRACTION).round() as usize).max(1);
    let start = (bins.len() - width) / 2;
    let window = &bins[start..start + width];

    let sum: f64 = window.iter().map(|b| *b as f64).sum();
    Ok(sum / width as f64)
}

/// Classifies `bins` against `threshold`. A mean exactly at the threshold counts as present.
pub fn classify(bins: &[f32], threshold: SignalThreshold) -> Result<Classification, ClassifierError> {
    let level = central_mean(bins)?;

    let status = if level >= threshold.as_f64() {
        SignalStatus::Present
    } else {
        SignalStatus::Absent
    };

    Ok(Classification { status, level })
}

/// Raw classifier notification, `<listener_id>:SIG_STATUS:<PRESENT|ABSENT>:<level>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerNotification {
    listener: Identifier,
    status: SignalStatus,
    level: f64,
}

impl ListenerNotification {
    pub fn new(listener: Identifier, classification: Classification) -> Self {
        Self {
            listener,
            status: classification.status,
            level: classification.level,
        }
    }

    pub fn listener(&self) -> &Identifier {
        &self.listener
    }

    pub fn status(&self) -> SignalStatus {
        self.status
    }

    pub fn level(&self) -> f64 {
        self.level
    }
}

impl fmt::Display for ListenerNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.listener, NOTIFICATION_KIND, self.status, self.level
        )
    }
}

impl FromStr for ListenerNotification {
    type Err = NotificationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.splitn(4, ':').collect();
        let [listener, kind, status, level] = fields.as_slice() else {
            return Err(NotificationParseError::FieldCount(s.to_string()));
        };

        let listener = Identifier::new(listener)?;

        if *kind != NOTIFICATION_KIND {
            return Err(NotificationParseError::Kind(kind.to_string()));
        }

        let status = match *status {
            "PRESENT" => SignalStatus::Present,
            "ABSENT" => SignalStatus::Absent,
            other => return Err(NotificationParseError::Status(other.to_string())),
        };

        let level = level
            .parse::<f64>()
            .ok()
            .filter(|l| l.is_finite())
            .ok_or_else(|| NotificationParseError::Level(level.to_string()))?;

        Ok(Self {
            listener,
            status,
            level,
        })
    }
}

/// Periodic classification loop of one listener.
///
/// Each tick pulls the listener's spectrum slice, optionally forwards it to the listener's tap,
/// classifies it and offers the notification to the owning source without waiting for room in the
/// channel. Failed cycles are skipped, except when the frontend panicked while serving the
/// listener: the loop then ends and the owning source marks the listener inoperative.
pub(crate) struct ClassifierTask {
    listener: Identifier,
    threshold: SignalThreshold,
    period: time::Duration,
    frontend: WrappedFrontend,
    notification_tx: mpsc::Sender<String>,
    tap: Option<DataTap>,
    log_ctx: LogContext,
}

impl ClassifierTask {
    pub fn new(
        listener: Identifier,
        threshold: SignalThreshold,
        period: time::Duration,
        frontend: WrappedFrontend,
        notification_tx: mpsc::Sender<String>,
        tap: Option<DataTap>,
        log_ctx: LogContext,
    ) -> Self {
        Self {
            listener,
            threshold,
            period,
            frontend,
            notification_tx,
            tap,
            log_ctx,
        }
    }

    pub fn spawn(self, shutdown_tx: &broadcast::Sender<()>) -> AbortOnDropHandle<()> {
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(self.run(shutdown_rx)).into()
    }

    async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::debug!(
            "{} CLASSIFIER_STARTED period_ms={} threshold={}",
            self.log_ctx,
            self.period.as_millis(),
            self.threshold
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.iteration().await.is_break() {
                        break;
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        log::debug!("{} CLASSIFIER_STOPPED", self.log_ctx);
    }

    async fn sample(&self) -> Result<ListenerNotification, ClassifierError> {
        let slice: SpectrumSlice = self.frontend.listener_spectrum(&self.listener).await?;

        let classification = classify(slice.bins(), self.threshold)?;

        if let Some(tap) = &self.tap {
            tap.update_value(slice);
        }

        Ok(ListenerNotification::new(
            self.listener.clone(),
            classification,
        ))
    }

    async fn iteration(&self) -> ControlFlow<()> {
        let notification = match self.sample().await {
            Ok(notification) => notification,
            Err(ClassifierError::SpectrumUnavailable(e @ FrontendError::Panicked { .. })) => {
                // The listener's channel in the frontend can't be trusted anymore
                log::error!("{} CLASSIFIER_FAILED error={}", self.log_ctx, e);
                return ControlFlow::Break(());
            }
            Err(e) => {
                log::warn!("{} CLASSIFY_SKIPPED error={}", self.log_ctx, e);
                return ControlFlow::Continue(());
            }
        };

        log::trace!("{} CLASSIFIED {}", self.log_ctx, notification);

        match self.notification_tx.try_send(notification.to_string()) {
            Ok(()) => ControlFlow::Continue(()),
            Err(TrySendError::Full(_)) => {
                log::warn!("{} NOTIFICATION_DROPPED reason=channel_full", self.log_ctx);
                ControlFlow::Continue(())
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("{} NOTIFICATION_CHANNEL_CLOSED", self.log_ctx);
                ControlFlow::Break(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::{
        frontend::{FrontendResult, ListenerTuning, RadioFrontend},
        shared::FrequencyRange,
    };

    use super::*;

    fn threshold(v: f64) -> SignalThreshold {
        SignalThreshold::try_from(v).unwrap()
    }

    /// 100-bin slice with a noise floor of -110 dBm and the central 10 bins at `peak`.
    fn peaked_slice(peak: f32) -> Vec<f32> {
        let mut bins = vec![-110.0; 100];
        for b in &mut bins[45..55] {
            *b = peak;
        }
        bins
    }

    #[test]
    fn mean_at_threshold_is_present() {
        let c = classify(&peaked_slice(-70.0), threshold(-70.0)).unwrap();
        assert_eq!(c.status(), SignalStatus::Present);
        assert_eq!(c.level(), -70.0);

        let c = classify(&peaked_slice(-71.0), threshold(-70.0)).unwrap();
        assert_eq!(c.status(), SignalStatus::Absent);
        assert_eq!(c.level(), -71.0);
    }

    #[test]
    fn only_central_window_is_averaged() {
        let mut bins = peaked_slice(-60.0);
        bins[0] = 0.0;
        bins[99] = 0.0;
        assert_eq!(central_mean(&bins).unwrap(), -60.0);

        // Short slices still average at least one bin
        assert_eq!(central_mean(&[-90.0, -50.0, -90.0]).unwrap(), -50.0);
    }

    #[test]
    fn malformed_slices_are_errors() {
        assert!(matches!(central_mean(&[]), Err(ClassifierError::EmptySlice)));
        assert!(matches!(
            central_mean(&[-80.0, f32::NAN, -80.0]),
            Err(ClassifierError::NonFiniteBin { index: 1 })
        ));
    }

    #[test]
    fn threshold_must_be_negative() {
        assert!(SignalThreshold::try_from(-0.5).is_ok());
        assert!(SignalThreshold::try_from(0.0).is_err());
        assert!(SignalThreshold::try_from(3.0).is_err());
        assert!(SignalThreshold::try_from(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn notification_format_and_parse() {
        let c = classify(&peaked_slice(-65.0), threshold(-70.0)).unwrap();
        let n = ListenerNotification::new(Identifier::new("L0").unwrap(), c);
        assert_eq!(n.to_string(), "l0:SIG_STATUS:PRESENT:-65");

        let parsed: ListenerNotification = "l0:SIG_STATUS:ABSENT:-81.25".parse().unwrap();
        assert_eq!(parsed.listener().as_str(), "l0");
        assert_eq!(parsed.status(), SignalStatus::Absent);
        assert_eq!(parsed.level(), -81.25);
    }

    #[test]
    fn malformed_notifications_are_rejected() {
        assert!(matches!(
            "l0:SIG_STATUS:PRESENT".parse::<ListenerNotification>(),
            Err(NotificationParseError::FieldCount(_))
        ));
        assert!(matches!(
            "l0:SYS_STATUS:PRESENT:-60".parse::<ListenerNotification>(),
            Err(NotificationParseError::Kind(_))
        ));
        assert!(matches!(
            "l0:SIG_STATUS:INOP:-60".parse::<ListenerNotification>(),
            Err(NotificationParseError::Status(_))
        ));
        assert!(matches!(
            "l0:SIG_STATUS:PRESENT:loud".parse::<ListenerNotification>(),
            Err(NotificationParseError::Level(_))
        ));
        assert!(matches!(
            "l 0:SIG_STATUS:PRESENT:-60".parse::<ListenerNotification>(),
            Err(NotificationParseError::Listener(_))
        ));
    }

    struct Flaky {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RadioFrontend for Flaky {
        async fn start(&self, _listeners: &[ListenerTuning]) -> FrontendResult<()> {
            Ok(())
        }

        async fn stop(&self) -> FrontendResult<()> {
            Ok(())
        }

        async fn set_center_frequency(&self, _hz: u64) -> FrontendResult<()> {
            Ok(())
        }

        async fn listener_spectrum(&self, _listener: &Identifier) -> FrontendResult<SpectrumSlice> {
            // Every other call fails, the rest return a strong carrier
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call % 2 == 0 {
                return Err("overrun".into());
            }
            Ok(SpectrumSlice::new(
                Utc::now(),
                FrequencyRange::new(0, 100).unwrap(),
                peaked_slice(-40.0),
            ))
        }

        async fn source_spectrum(&self) -> FrontendResult<SpectrumSlice> {
            Err("unused".into())
        }
    }

    #[tokio::test]
    async fn task_skips_failed_cycles_and_stops_on_shutdown() {
        let frontend = WrappedFrontend::new(Arc::new(Flaky {
            calls: AtomicUsize::new(0),
        }));
        let (notification_tx, mut notification_rx) = mpsc::channel(16);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let task = ClassifierTask::new(
            Identifier::new("l0").unwrap(),
            threshold(-70.0),
            time::Duration::from_millis(5),
            frontend,
            notification_tx,
            None,
            LogContext::new(),
        );
        let handle = task.spawn(&shutdown_tx);

        for _ in 0..3 {
            let msg = time::timeout(time::Duration::from_secs(1), notification_rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(msg, "l0:SIG_STATUS:PRESENT:-40");
        }

        shutdown_tx.send(()).unwrap();
        time::timeout(time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
