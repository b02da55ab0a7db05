mod config;
mod engine;
pub(crate) mod error;
pub(crate) mod process;
mod state;

pub use config::{ListenerConfig, SourceConfig};
pub use engine::{SourceAggregator, SourceController, SourceOutbound};
pub use state::SourceStatusReceiver;
