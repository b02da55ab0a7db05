use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use tokio::time;

use crate::{
    frontend::{Demodulation, ListenerTuning},
    shared::{FrequencyRange, Identified, Identifier, Siblings, error::ConfigError},
    signal::SignalThreshold,
};

/// Configuration of a single listener: the frequency it watches and how presence is judged.
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    id: Identifier,
    frequency_hz: u64,
    bandwidth_hz: u64,
    threshold: SignalThreshold,
    demodulation: Demodulation,
    tap_enabled: bool,
}

impl ListenerConfig {
    /// Creates a listener centred on `frequency_hz` with a passband of `bandwidth_hz`.
    ///
    /// Demodulation is disabled and the listener's data tap is off by default.
    pub fn new(
        id: Identifier,
        frequency_hz: u64,
        bandwidth_hz: u64,
        threshold: SignalThreshold,
    ) -> Self {
        Self {
            id,
            frequency_hz,
            bandwidth_hz,
            threshold,
            demodulation: Demodulation::Disabled,
            tap_enabled: false,
        }
    }

    pub fn frequency_hz(&self) -> u64 {
        self.frequency_hz
    }

    pub fn bandwidth_hz(&self) -> u64 {
        self.bandwidth_hz
    }

    /// Returns `[frequency - bandwidth/2, frequency + bandwidth/2]`.
    pub fn passband(&self) -> FrequencyRange {
        FrequencyRange::centered(self.frequency_hz, self.bandwidth_hz)
    }

    pub fn threshold(&self) -> SignalThreshold {
        self.threshold
    }

    pub fn demodulation(&self) -> Demodulation {
        self.demodulation
    }

    pub fn tap_enabled(&self) -> bool {
        self.tap_enabled
    }

    /// Sets the demodulation the frontend runs on this listener's channel.
    ///
    /// Default: [`Demodulation::Disabled`]
    pub fn with_demodulation(mut self, demodulation: Demodulation) -> Self {
        self.demodulation = demodulation;
        self
    }

    /// Enables or disables streaming of this listener's spectrum slices to a data tap.
    ///
    /// Default: `false`
    pub fn with_tap(mut self, enabled: bool) -> Self {
        self.tap_enabled = enabled;
        self
    }

    pub(crate) fn tuning(&self) -> ListenerTuning {
        ListenerTuning {
            id: self.id.clone(),
            passband: self.passband(),
            demodulation: self.demodulation,
        }
    }
}

impl Identified for ListenerConfig {
    const KIND: &'static str = "listener";

    fn id(&self) -> &Identifier {
        &self.id
    }
}

/// Configuration of a radio source and the listeners it serves.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    id: Identifier,
    capability: FrequencyRange,
    center_frequency_hz: u64,
    listeners: Siblings<ListenerConfig>,
    classify_interval: time::Duration,
    spectrum_tap_enabled: bool,
    spectrum_tap_interval: time::Duration,
    tap_dir: PathBuf,
    notification_capacity: NonZeroUsize,
    outbound_capacity: NonZeroUsize,
    stop_timeout: time::Duration,
}

impl SourceConfig {
    /// Creates a source able to tune `capability`, initially centred on `center_frequency_hz`.
    pub fn new(
        id: Identifier,
        capability: FrequencyRange,
        center_frequency_hz: u64,
    ) -> Result<Self, ConfigError> {
        if !capability.contains(center_frequency_hz) {
            return Err(ConfigError::CenterOutOfBounds {
                center_hz: center_frequency_hz,
                capability,
            });
        }

        Ok(Self {
            id,
            capability,
            center_frequency_hz,
            listeners: Siblings::new(),
            classify_interval: time::Duration::from_millis(100),
            spectrum_tap_enabled: false,
            spectrum_tap_interval: time::Duration::from_millis(250),
            tap_dir: std::env::temp_dir(),
            notification_capacity: NonZeroUsize::new(256).expect("not zero"),
            outbound_capacity: NonZeroUsize::new(1024).expect("not zero"),
            stop_timeout: time::Duration::from_secs(5),
        })
    }

    /// Adds a listener to this source.
    ///
    /// Fails if the listener's passband falls outside the source capability, or if a listener
    /// with the same identifier was already added.
    pub fn append_listener(&mut self, listener: ListenerConfig) -> Result<(), ConfigError> {
        if listener.bandwidth_hz == 0 {
            return Err(ConfigError::ZeroBandwidth {
                listener: listener.id,
            });
        }

        let passband = listener.passband();
        if !self.capability.contains_range(&passband) {
            return Err(ConfigError::OutOfBoundsFrequency {
                listener: listener.id,
                passband,
                capability: self.capability,
            });
        }

        self.listeners.append(listener)?;
        Ok(())
    }

    /// Consuming variant of [`append_listener`](Self::append_listener).
    pub fn with_listener(mut self, listener: ListenerConfig) -> Result<Self, ConfigError> {
        self.append_listener(listener)?;
        Ok(self)
    }

    pub fn capability(&self) -> FrequencyRange {
        self.capability
    }

    pub fn center_frequency_hz(&self) -> u64 {
        self.center_frequency_hz
    }

    pub fn listeners(&self) -> &Siblings<ListenerConfig> {
        &self.listeners
    }

    /// Returns the period of every listener's classification loop.
    pub fn classify_interval(&self) -> time::Duration {
        self.classify_interval
    }

    /// Returns whether the whole-band spectrum of the source is streamed to a data tap.
    pub fn spectrum_tap_enabled(&self) -> bool {
        self.spectrum_tap_enabled
    }

    /// Returns the period at which the whole-band spectrum is pulled for the source data tap.
    pub fn spectrum_tap_interval(&self) -> time::Duration {
        self.spectrum_tap_interval
    }

    /// Returns the directory where data tap FIFOs are created.
    pub fn tap_dir(&self) -> &Path {
        &self.tap_dir
    }

    pub fn notification_capacity(&self) -> NonZeroUsize {
        self.notification_capacity
    }

    pub fn outbound_capacity(&self) -> NonZeroUsize {
        self.outbound_capacity
    }

    /// Returns how long a stop request waits for the source to wind down before aborting it.
    pub fn stop_timeout(&self) -> time::Duration {
        self.stop_timeout
    }

    /// Moves the hardware centre frequency.
    ///
    /// Default: the value given to [`new`](Self::new)
    pub fn with_center_frequency(mut self, hz: u64) -> Result<Self, ConfigError> {
        if !self.capability.contains(hz) {
            return Err(ConfigError::CenterOutOfBounds {
                center_hz: hz,
                capability: self.capability,
            });
        }
        self.center_frequency_hz = hz;
        Ok(self)
    }

    /// Sets the period of every listener's classification loop.
    ///
    /// Default: `100` milliseconds
    pub fn with_classify_interval(mut self, millis: u64) -> Self {
        self.classify_interval = time::Duration::from_millis(millis.max(1));
        self
    }

    /// Enables or disables the whole-band spectrum data tap.
    ///
    /// Default: `false`
    pub fn with_spectrum_tap(mut self, enabled: bool) -> Self {
        self.spectrum_tap_enabled = enabled;
        self
    }

    /// Sets the period at which the whole-band spectrum is pulled for the source data tap.
    ///
    /// Default: `250` milliseconds
    pub fn with_spectrum_tap_interval(mut self, millis: u64) -> Self {
        self.spectrum_tap_interval = time::Duration::from_millis(millis.max(1));
        self
    }

    /// Sets the directory where data tap FIFOs are created.
    ///
    /// Default: [`std::env::temp_dir`]
    pub fn with_tap_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tap_dir = dir.into();
        self
    }

    /// Sets the capacity of the channel between classifiers and the aggregator. Notifications
    /// that find it full are dropped.
    ///
    /// Default: `256`
    pub fn with_notification_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    /// Sets the capacity of the outbound channel drained by the probe monitor.
    ///
    /// Default: `1024`
    pub fn with_outbound_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Sets how long a stop request waits before aborting the source.
    ///
    /// Default: `5` seconds
    pub fn with_stop_timeout(mut self, secs: u64) -> Self {
        self.stop_timeout = time::Duration::from_secs(secs);
        self
    }
}

impl Identified for SourceConfig {
    const KIND: &'static str = "radio source";

    fn id(&self) -> &Identifier {
        &self.id
    }
}

#[derive(Debug)]
pub(crate) struct SourceControllerConfig {
    stop_timeout: time::Duration,
}

impl SourceControllerConfig {
    pub fn stop_timeout(&self) -> time::Duration {
        self.stop_timeout
    }
}

impl From<&SourceConfig> for SourceControllerConfig {
    fn from(value: &SourceConfig) -> Self {
        Self {
            stop_timeout: value.stop_timeout,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct SourceProcessConfig {
    center_frequency_hz: u64,
    listeners: Vec<ListenerConfig>,
    classify_interval: time::Duration,
    spectrum_tap_enabled: bool,
    spectrum_tap_interval: time::Duration,
    tap_dir: PathBuf,
    notification_capacity: NonZeroUsize,
}

impl SourceProcessConfig {
    pub fn center_frequency_hz(&self) -> u64 {
        self.center_frequency_hz
    }

    pub fn listeners(&self) -> &[ListenerConfig] {
        &self.listeners
    }

    pub fn classify_interval(&self) -> time::Duration {
        self.classify_interval
    }

    pub fn spectrum_tap_enabled(&self) -> bool {
        self.spectrum_tap_enabled
    }

    pub fn spectrum_tap_interval(&self) -> time::Duration {
        self.spectrum_tap_interval
    }

    /// Path of the data tap FIFO for the source (`listener = None`) or one of its listeners.
    pub fn tap_path(
        &self,
        probe: &Identifier,
        source: &Identifier,
        listener: Option<&Identifier>,
    ) -> PathBuf {
        let name = match listener {
            Some(listener) => format!("{probe}.{source}.{listener}.tap"),
            None => format!("{probe}.{source}.tap"),
        };
        self.tap_dir.join(name)
    }

    pub fn notification_capacity(&self) -> NonZeroUsize {
        self.notification_capacity
    }
}

impl From<&SourceConfig> for SourceProcessConfig {
    fn from(value: &SourceConfig) -> Self {
        Self {
            center_frequency_hz: value.center_frequency_hz,
            listeners: value.listeners.iter().cloned().collect(),
            classify_interval: value.classify_interval,
            spectrum_tap_enabled: value.spectrum_tap_enabled,
            spectrum_tap_interval: value.spectrum_tap_interval,
            tap_dir: value.tap_dir.clone(),
            notification_capacity: value.notification_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    fn source() -> SourceConfig {
        SourceConfig::new(
            id("r0"),
            FrequencyRange::new(144_000_000, 146_000_000).unwrap(),
            145_000_000,
        )
        .unwrap()
    }

    fn listener(name: &str, frequency_hz: u64) -> ListenerConfig {
        ListenerConfig::new(
            id(name),
            frequency_hz,
            12_500,
            SignalThreshold::try_from(-70.0).unwrap(),
        )
    }

    #[test]
    fn test_append_listener_checks_bounds_and_uniqueness() {
        let mut config = source();

        config.append_listener(listener("l0", 145_500_000)).unwrap();

        let err = config
            .append_listener(listener("L0", 145_600_000))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateIdentifier(_)));

        // Passband straddles the upper edge of the capability
        let err = config
            .append_listener(listener("l1", 145_999_000))
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfBoundsFrequency { .. }));

        let err = config
            .append_listener(ListenerConfig::new(
                id("l2"),
                145_000_000,
                0,
                SignalThreshold::try_from(-70.0).unwrap(),
            ))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroBandwidth { .. }));

        assert_eq!(config.listeners().len(), 1);
    }

    #[test]
    fn test_center_frequency_must_be_tunable() {
        let capability = FrequencyRange::new(144_000_000, 146_000_000).unwrap();
        assert!(matches!(
            SourceConfig::new(id("r0"), capability, 150_000_000),
            Err(ConfigError::CenterOutOfBounds { .. })
        ));
        assert!(source().with_center_frequency(143_000_000).is_err());
    }

    #[test]
    fn test_tap_paths() {
        let config = source().with_tap_dir("/run/diatomite");
        let process_config = SourceProcessConfig::from(&config);

        assert_eq!(
            process_config.tap_path(&id("p1"), &id("r0"), None),
            PathBuf::from("/run/diatomite/p1.r0.tap")
        );
        assert_eq!(
            process_config.tap_path(&id("p1"), &id("r0"), Some(&id("l0"))),
            PathBuf::from("/run/diatomite/p1.r0.l0.tap")
        );
    }
}
