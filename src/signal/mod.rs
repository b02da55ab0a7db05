mod classifier;
pub(crate) mod error;
mod spectrum;
mod state;

pub(crate) use classifier::ClassifierTask;
pub use classifier::{
    CENTRAL_FRACTION, Classification, ListenerNotification, SignalThreshold, central_mean,
    classify,
};
pub use spectrum::SpectrumSlice;
pub use state::{
    History, SignalHistory, SignalSample, SignalStatus, SystemHistory, SystemSample, SystemStatus,
};
