#![doc = include_str!("../README.md")]

pub mod api;
pub mod envelope;
/// Exports the [`RadioFrontend`] collaborator trait and its companion types.
///
/// [`RadioFrontend`]: crate::frontend::RadioFrontend
pub mod frontend;
pub mod logging;
/// Exports [`ProbeMonitor`] and the controller of a running monitor.
///
/// [`ProbeMonitor`]: crate::probe::ProbeMonitor
pub mod probe;
mod shared;
/// Exports the signal classifier: [`classify`], [`SignalThreshold`] and [`ListenerNotification`].
///
/// [`classify`]: crate::signal::classify
/// [`SignalThreshold`]: crate::signal::SignalThreshold
/// [`ListenerNotification`]: crate::signal::ListenerNotification
pub mod signal;
/// Exports [`SiteEngine`], [`SiteConfig`] and the other types needed to run a whole site.
///
/// [`SiteEngine`]: crate::site::SiteEngine
/// [`SiteConfig`]: crate::site::SiteConfig
pub mod site;
/// Exports [`SourceAggregator`], [`SourceConfig`], [`ListenerConfig`] and the source controller.
///
/// [`SourceAggregator`]: crate::source::SourceAggregator
/// [`SourceConfig`]: crate::source::SourceConfig
/// [`ListenerConfig`]: crate::source::ListenerConfig
pub mod source;
/// Exports [`StateStore`], the [`StateReader`] trait and the state tree nodes.
///
/// [`StateStore`]: crate::store::StateStore
/// [`StateReader`]: crate::store::StateReader
pub mod store;
/// Exports [`DataTap`], the live FIFO broadcaster of the latest sample.
///
/// [`DataTap`]: crate::tap::DataTap
pub mod tap;
mod util;

/// Error types returned by `diatomite`.
pub mod error {
    pub use super::api::error::{ApiError, ErrorBody, ErrorObject, ErrorSource, ReadSurfaceError};
    pub use super::envelope::error::{EnvelopeError, MsgTypeDecodeError};
    pub use super::frontend::error::{
        DemodulationDecodeError, FrontendError, FrontendOperation,
    };
    pub use super::probe::error::{
        ProbeError, ProbeMonitorFatalError, ProbeMonitorRecoverableError,
    };
    pub use super::shared::error::{
        ConfigError, DuplicateIdentifierError, FrequencyRangeValidationError,
        IdentifierValidationError,
    };
    pub use super::signal::error::{
        ClassifierError, NotificationParseError, StatusDecodeError, ThresholdValidationError,
    };
    pub use super::site::error::SiteError;
    pub use super::source::{
        error::SourceError,
        process::error::{SourceProcessFatalError, SourceProcessRecoverableError},
    };
    pub use super::store::error::{QueryError, StoreApplyError, StoreError};
    pub use super::tap::error::TapError;
    pub use super::util::PanicPayload;

    /// Convenience general-purpose Result type alias.
    pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
}

/// Exports identifiers, frequency ranges, samples and histories shared by every component.
pub mod models {
    pub use super::shared::{FrequencyRange, Identified, Identifier, Siblings};
    pub use super::signal::{
        History, SignalHistory, SignalSample, SignalStatus, SpectrumSlice, SystemHistory,
        SystemSample, SystemStatus,
    };
}
