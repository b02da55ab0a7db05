//! Addressed, nestable status messages exchanged between the tiers of the hierarchy.
//!
//! Each hop wraps the message it received into exactly one new [`Envelope`], carrying the inner
//! envelope verbatim as its serialized payload:
//!
//! ```text
//! site tier      { msg_type, id: <probe>, site: <site>, payload: <source tier> }
//! source tier    { msg_type, id: <source>, payload: <listener tier> | <system sample> }
//! listener tier  { msg_type, id: <listener>, payload: <signal sample> | <system sample> }
//! ```
//!
//! The module is pure data transformation and performs no I/O.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    shared::Identifier,
    signal::{SignalSample, SystemSample},
};

pub(crate) mod error;

use error::{EnvelopeError, MsgTypeDecodeError, Result};

/// Closed set of envelope type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum MsgType {
    /// In-place refresh of a listener's signal state.
    SignalState,
    /// Transition of a listener's signal state.
    SignalStatusChange,
    /// Transition of a radio source's operational state.
    ReceiverSysStateChange,
    /// Transition of a listener's operational state.
    ListenerSysStateChange,
}

impl MsgType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SignalState => "SIGNAL_STATE",
            Self::SignalStatusChange => "SIGNAL_STATUS_CHANGE",
            Self::ReceiverSysStateChange => "RECEIVER_SYS_STATE_CHANGE",
            Self::ListenerSysStateChange => "LISTENER_SYS_STATE_CHANGE",
        }
    }

    pub fn from_name(name: &str) -> std::result::Result<Self, MsgTypeDecodeError> {
        match name {
            "SIGNAL_STATE" => Ok(Self::SignalState),
            "SIGNAL_STATUS_CHANGE" => Ok(Self::SignalStatusChange),
            "RECEIVER_SYS_STATE_CHANGE" => Ok(Self::ReceiverSysStateChange),
            "LISTENER_SYS_STATE_CHANGE" => Ok(Self::ListenerSysStateChange),
            other => Err(MsgTypeDecodeError(other.to_string())),
        }
    }

    /// Whether envelopes of this type originate at a listener.
    pub const fn is_listener_scoped(&self) -> bool {
        !matches!(self, Self::ReceiverSysStateChange)
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MsgType> for &'static str {
    fn from(value: MsgType) -> Self {
        value.as_str()
    }
}

impl TryFrom<String> for MsgType {
    type Error = MsgTypeDecodeError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::from_name(&value)
    }
}

/// One tier of an addressed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    msg_type: MsgType,
    id: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    site: Option<Identifier>,
    payload: String,
}

impl Envelope {
    pub fn wrap(msg_type: MsgType, id: Identifier, payload: impl Into<String>) -> Self {
        Self {
            msg_type,
            id,
            site: None,
            payload: payload.into(),
        }
    }

    /// Wraps `payload` into the top tier, addressed by both the probe and its owning site.
    pub fn wrap_site(
        msg_type: MsgType,
        site: Identifier,
        probe: Identifier,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            msg_type,
            id: probe,
            site: Some(site),
            payload: payload.into(),
        }
    }

    /// Wraps a serializable value, such as a [`SignalSample`], as the payload.
    pub fn wrap_value<T: Serialize>(msg_type: MsgType, id: Identifier, value: &T) -> Result<Self> {
        let payload = serde_json::to_string(value).map_err(EnvelopeError::Encode)?;
        Ok(Self::wrap(msg_type, id, payload))
    }

    /// Wraps another envelope, embedding its serialized form as the payload.
    pub fn wrap_envelope(msg_type: MsgType, id: Identifier, inner: &Envelope) -> Result<Self> {
        Ok(Self::wrap(msg_type, id, inner.encode()?))
    }

    pub fn unwrap(self) -> (MsgType, Identifier, String) {
        (self.msg_type, self.id, self.payload)
    }

    pub fn msg_type(&self) -> MsgType {
        self.msg_type
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn site(&self) -> Option<&Identifier> {
        self.site.as_ref()
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Decodes the payload as a nested envelope.
    pub fn inner(&self) -> Result<Envelope> {
        Self::decode(&self.payload)
    }

    /// Decodes the payload as a raw value.
    pub fn payload_value<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.payload).map_err(|source| EnvelopeError::Payload {
            msg_type: self.msg_type,
            source,
        })
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(EnvelopeError::Encode)
    }

    /// Decodes one tier. Unknown type tags, invalid ids and unknown fields are errors.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(EnvelopeError::Malformed)
    }
}

/// Builds the encoded source-tier envelope for an update produced by a radio source.
///
/// Listener-scoped messages are wrapped twice, first by the listener id and then by the source id.
/// Source-scoped messages carry the payload directly in the source tier.
pub(crate) fn encode_source_update<T: Serialize>(
    msg_type: MsgType,
    source: &Identifier,
    listener: Option<&Identifier>,
    payload: &T,
) -> Result<String> {
    let envelope = match listener {
        Some(listener) => {
            let inner = Envelope::wrap_value(msg_type, listener.clone(), payload)?;
            Envelope::wrap_envelope(msg_type, source.clone(), &inner)?
        }
        None => Envelope::wrap_value(msg_type, source.clone(), payload)?,
    };

    envelope.encode()
}

/// Full address of a state-tree leaf, as recovered from an envelope chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdatePath {
    pub site: Identifier,
    pub probe: Identifier,
    pub source: Identifier,
    /// `None` for source-scoped updates.
    pub listener: Option<Identifier>,
}

impl fmt::Display for UpdatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.site, self.probe, self.source)?;
        if let Some(listener) = &self.listener {
            write!(f, "/{listener}")?;
        }
        Ok(())
    }
}

/// Innermost payload of an envelope chain.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePayload {
    Signal(SignalSample),
    System(SystemSample),
}

/// Fully unwrapped site-tier message.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedUpdate {
    path: UpdatePath,
    msg_type: MsgType,
    payload: UpdatePayload,
}

impl RoutedUpdate {
    /// Unwraps a site-tier envelope down to its innermost payload.
    ///
    /// Every tier must carry the same type tag. Listener-scoped types must nest a listener tier
    /// below the source tier; `RECEIVER_SYS_STATE_CHANGE` carries its payload in the source tier.
    pub fn decode_chain(text: &str) -> Result<Self> {
        let site_tier = Envelope::decode(text)?;
        let msg_type = site_tier.msg_type;

        let site = site_tier
            .site
            .clone()
            .ok_or_else(|| EnvelopeError::MissingSite(site_tier.id.clone()))?;

        let source_tier = Self::lower_tier(&site_tier)?;

        let (listener, payload_tier) = if msg_type.is_listener_scoped() {
            let listener_tier = Self::lower_tier(&source_tier)?;
            (Some(listener_tier.id.clone()), listener_tier)
        } else {
            (None, source_tier.clone())
        };

        let payload = match msg_type {
            MsgType::SignalState | MsgType::SignalStatusChange => {
                UpdatePayload::Signal(payload_tier.payload_value()?)
            }
            MsgType::ReceiverSysStateChange | MsgType::ListenerSysStateChange => {
                UpdatePayload::System(payload_tier.payload_value()?)
            }
        };

        Ok(Self {
            path: UpdatePath {
                site,
                probe: site_tier.id,
                source: source_tier.id,
                listener,
            },
            msg_type,
            payload,
        })
    }

    fn lower_tier(outer: &Envelope) -> Result<Envelope> {
        let inner = outer.inner()?;

        if inner.site.is_some() {
            return Err(EnvelopeError::UnexpectedSite(inner.id));
        }

        if inner.msg_type != outer.msg_type {
            return Err(EnvelopeError::TierMismatch {
                outer: outer.msg_type,
                inner: inner.msg_type,
            });
        }

        Ok(inner)
    }

    pub fn path(&self) -> &UpdatePath {
        &self.path
    }

    pub fn msg_type(&self) -> MsgType {
        self.msg_type
    }

    pub fn payload(&self) -> &UpdatePayload {
        &self.payload
    }

    pub fn into_parts(self) -> (UpdatePath, MsgType, UpdatePayload) {
        (self.path, self.msg_type, self.payload)
    }
}
