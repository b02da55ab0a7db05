use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StatusDecodeError;

/// Signal-content status of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum SignalStatus {
    PreInit,
    Init,
    Start,
    Present,
    Absent,
    Shutdown,
    /// The listener can no longer produce classifications.
    Inop,
}

impl SignalStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PreInit => "PRE_INIT",
            Self::Init => "INIT",
            Self::Start => "START",
            Self::Present => "PRESENT",
            Self::Absent => "ABSENT",
            Self::Shutdown => "SHUTDOWN",
            Self::Inop => "INOP",
        }
    }

    /// Decodes a status from its wire name. Unknown names are rejected.
    pub fn from_name(name: &str) -> Result<Self, StatusDecodeError> {
        match name {
            "PRE_INIT" => Ok(Self::PreInit),
            "INIT" => Ok(Self::Init),
            "START" => Ok(Self::Start),
            "PRESENT" => Ok(Self::Present),
            "ABSENT" => Ok(Self::Absent),
            "SHUTDOWN" => Ok(Self::Shutdown),
            "INOP" => Ok(Self::Inop),
            other => Err(StatusDecodeError::UnknownSignalStatus(other.to_string())),
        }
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SignalStatus> for &'static str {
    fn from(value: SignalStatus) -> Self {
        value.as_str()
    }
}

impl TryFrom<String> for SignalStatus {
    type Error = StatusDecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_name(&value)
    }
}

/// Operational (liveness) status of a source or listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum SystemStatus {
    PreInit,
    Init,
    Start,
    Run,
    Shutdown,
    Stop,
    /// The component could not start, or died, and is not running.
    Failed,
}

impl SystemStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PreInit => "PRE_INIT",
            Self::Init => "INIT",
            Self::Start => "START",
            Self::Run => "RUN",
            Self::Shutdown => "SHUTDOWN",
            Self::Stop => "STOP",
            Self::Failed => "FAILED",
        }
    }

    /// Decodes a status from its wire name. Unknown names are rejected.
    pub fn from_name(name: &str) -> Result<Self, StatusDecodeError> {
        match name {
            "PRE_INIT" => Ok(Self::PreInit),
            "INIT" => Ok(Self::Init),
            "START" => Ok(Self::Start),
            "RUN" => Ok(Self::Run),
            "SHUTDOWN" => Ok(Self::Shutdown),
            "STOP" => Ok(Self::Stop),
            "FAILED" => Ok(Self::Failed),
            other => Err(StatusDecodeError::UnknownSystemStatus(other.to_string())),
        }
    }

    /// Returns `true` once the component has stopped, either cleanly or through a failure.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stop | Self::Failed)
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SystemStatus> for &'static str {
    fn from(value: SystemStatus) -> Self {
        value.as_str()
    }
}

impl TryFrom<String> for SystemStatus {
    type Error = StatusDecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_name(&value)
    }
}

/// Immutable signal observation: status, level in dBm and the time it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSample {
    status: SignalStatus,
    level: f64,
    timestamp: DateTime<Utc>,
}

impl SignalSample {
    pub fn new(status: SignalStatus, level: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            status,
            level,
            timestamp,
        }
    }

    /// Sample with no measured level, used for lifecycle markers.
    pub fn marker(status: SignalStatus, timestamp: DateTime<Utc>) -> Self {
        Self::new(status, 0.0, timestamp)
    }

    pub fn status(&self) -> SignalStatus {
        self.status
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Display for SignalSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} dBm) at {}",
            self.status,
            self.level,
            self.timestamp.to_rfc3339()
        )
    }
}

/// Immutable operational status observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSample {
    status: SystemStatus,
    timestamp: DateTime<Utc>,
}

impl SystemSample {
    pub fn new(status: SystemStatus, timestamp: DateTime<Utc>) -> Self {
        Self { status, timestamp }
    }

    pub fn now(status: SystemStatus) -> Self {
        Self::new(status, Utc::now())
    }

    pub fn status(&self) -> SystemStatus {
        self.status
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Display for SystemSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.status, self.timestamp.to_rfc3339())
    }
}

/// Current and previous value of a sampled quantity.
///
/// `previous` holds what `current` was right before the most recent [`replace`](Self::replace).
/// [`refresh`](Self::refresh) updates `current` in place and leaves `previous` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History<T> {
    current: T,
    previous: T,
}

impl<T: Clone> History<T> {
    /// Creates a history with both slots set to `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            previous: initial.clone(),
            current: initial,
        }
    }

    /// Records a transition: `previous` takes the old `current`.
    pub fn replace(&mut self, sample: T) {
        self.previous = std::mem::replace(&mut self.current, sample);
    }

    /// Overwrites `current` without declaring a transition.
    pub fn refresh(&mut self, sample: T) {
        self.current = sample;
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn previous(&self) -> &T {
        &self.previous
    }
}

pub type SignalHistory = History<SignalSample>;

pub type SystemHistory = History<SystemSample>;

impl SignalHistory {
    /// History of a listener constructed at `timestamp`.
    pub fn pre_init(timestamp: DateTime<Utc>) -> Self {
        Self::new(SignalSample::marker(SignalStatus::PreInit, timestamp))
    }
}

impl SystemHistory {
    /// History of a source or listener constructed at `timestamp`.
    pub fn pre_init(timestamp: DateTime<Utc>) -> Self {
        Self::new(SystemSample::new(SystemStatus::PreInit, timestamp))
    }
}
