use std::{
    error::Error,
    panic::AssertUnwindSafe,
    sync::Arc,
};

use async_trait::async_trait;
use futures::FutureExt;

use crate::{
    shared::{FrequencyRange, Identifier},
    signal::SpectrumSlice,
};

mod demod;
pub(crate) mod error;
#[cfg(test)]
pub(crate) mod test_util;

pub use demod::Demodulation;

use error::{FrontendError, FrontendOperation};

/// Convenience result type for [`RadioFrontend`] implementations.
pub type FrontendResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Tuning handed to the frontend for each listener it must serve.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerTuning {
    pub id: Identifier,
    pub passband: FrequencyRange,
    pub demodulation: Demodulation,
}

/// Hardware and signal-processing collaborator owned by one radio source.
///
/// Everything below the power spectrum (tuning, filtering, FFT, demodulation) lives behind this
/// trait. The source aggregator drives its lifecycle and the listeners' classifiers poll it for
/// spectrum slices.
///
/// Implementations are shared between the aggregator and its classifier tasks, so every method
/// takes `&self`. Panics are caught and reported as errors.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use chrono::Utc;
/// use diatomite::{
///     frontend::{FrontendResult, ListenerTuning, RadioFrontend},
///     models::{FrequencyRange, Identifier, SpectrumSlice},
/// };
///
/// struct NoiseFloor {
///     range: FrequencyRange,
/// }
///
/// #[async_trait]
/// impl RadioFrontend for NoiseFloor {
///     async fn start(&self, _listeners: &[ListenerTuning]) -> FrontendResult<()> {
///         Ok(())
///     }
///
///     async fn stop(&self) -> FrontendResult<()> {
///         Ok(())
///     }
///
///     async fn set_center_frequency(&self, _hz: u64) -> FrontendResult<()> {
///         Ok(())
///     }
///
///     async fn listener_spectrum(&self, _listener: &Identifier) -> FrontendResult<SpectrumSlice> {
///         Ok(SpectrumSlice::new(Utc::now(), self.range, vec![-110.0; 64]))
///     }
///
///     async fn source_spectrum(&self) -> FrontendResult<SpectrumSlice> {
///         Ok(SpectrumSlice::new(Utc::now(), self.range, vec![-110.0; 1024]))
///     }
/// }
/// ```
#[async_trait]
pub trait RadioFrontend: Send + Sync {
    /// Brings the hardware up and prepares one channel per listener.
    async fn start(&self, listeners: &[ListenerTuning]) -> FrontendResult<()>;

    /// Halts the hardware. Called once, when the owning source shuts down.
    async fn stop(&self) -> FrontendResult<()>;

    /// Retunes the hardware centre frequency, in Hz.
    async fn set_center_frequency(&self, hz: u64) -> FrontendResult<()>;

    /// Latest power spectrum slice around the given listener's passband.
    async fn listener_spectrum(&self, listener: &Identifier) -> FrontendResult<SpectrumSlice>;

    /// Latest power spectrum across the whole tuned bandwidth of the source.
    async fn source_spectrum(&self) -> FrontendResult<SpectrumSlice>;
}

/// Panic-protected handle to a [`RadioFrontend`].
#[derive(Clone)]
pub(crate) struct WrappedFrontend(Arc<dyn RadioFrontend>);

impl WrappedFrontend {
    pub fn new(frontend: Arc<dyn RadioFrontend>) -> Self {
        Self(frontend)
    }

    async fn guard<T, F>(operation: FrontendOperation, fut: F) -> Result<T, FrontendError>
    where
        F: Future<Output = FrontendResult<T>> + Send,
    {
        FutureExt::catch_unwind(AssertUnwindSafe(fut))
            .await
            .map_err(|e| FrontendError::Panicked {
                operation,
                payload: e.into(),
            })?
            .map_err(|e| FrontendError::Failed {
                operation,
                message: e.to_string(),
            })
    }

    pub async fn start(&self, listeners: &[ListenerTuning]) -> Result<(), FrontendError> {
        Self::guard(FrontendOperation::Start, self.0.start(listeners)).await
    }

    pub async fn stop(&self) -> Result<(), FrontendError> {
        Self::guard(FrontendOperation::Stop, self.0.stop()).await
    }

    pub async fn set_center_frequency(&self, hz: u64) -> Result<(), FrontendError> {
        Self::guard(
            FrontendOperation::SetCenterFrequency,
            self.0.set_center_frequency(hz),
        )
        .await
    }

    pub async fn listener_spectrum(
        &self,
        listener: &Identifier,
    ) -> Result<SpectrumSlice, FrontendError> {
        Self::guard(
            FrontendOperation::ListenerSpectrum,
            self.0.listener_spectrum(listener),
        )
        .await
    }

    pub async fn source_spectrum(&self) -> Result<SpectrumSlice, FrontendError> {
        Self::guard(FrontendOperation::SourceSpectrum, self.0.source_spectrum()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Faulty;

    #[async_trait]
    impl RadioFrontend for Faulty {
        async fn start(&self, _listeners: &[ListenerTuning]) -> FrontendResult<()> {
            Err("device not found".into())
        }

        async fn stop(&self) -> FrontendResult<()> {
            Ok(())
        }

        async fn set_center_frequency(&self, _hz: u64) -> FrontendResult<()> {
            panic!("tuner exploded")
        }

        async fn listener_spectrum(&self, _listener: &Identifier) -> FrontendResult<SpectrumSlice> {
            Err("no samples".into())
        }

        async fn source_spectrum(&self) -> FrontendResult<SpectrumSlice> {
            Err("no samples".into())
        }
    }

    #[tokio::test]
    async fn errors_and_panics_are_contained() {
        let frontend = WrappedFrontend::new(Arc::new(Faulty));

        let err = frontend.start(&[]).await.unwrap_err();
        assert!(matches!(
            err,
            FrontendError::Failed {
                operation: FrontendOperation::Start,
                ..
            }
        ));
        assert!(err.to_string().contains("device not found"));

        let err = frontend.set_center_frequency(100).await.unwrap_err();
        assert!(matches!(
            err,
            FrontendError::Panicked {
                operation: FrontendOperation::SetCenterFrequency,
                ..
            }
        ));
        assert!(err.to_string().contains("tuner exploded"));

        assert!(frontend.stop().await.is_ok());
    }
}
