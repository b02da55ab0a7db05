use std::result;

use thiserror::Error;

use crate::shared::Identifier;

use super::MsgType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown message type `{0}`")]
pub struct MsgTypeDecodeError(pub String);

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Failed to encode envelope: {0}")]
    Encode(serde_json::Error),

    #[error("Malformed envelope: {0}")]
    Malformed(serde_json::Error),

    #[error("Malformed {msg_type} payload: {source}")]
    Payload {
        msg_type: MsgType,
        source: serde_json::Error,
    },

    #[error("Site-tier envelope from probe `{0}` carries no site id")]
    MissingSite(Identifier),

    #[error("Envelope from `{0}` carries a site id below the site tier")]
    UnexpectedSite(Identifier),

    #[error("{outer} envelope wraps a {inner} envelope")]
    TierMismatch { outer: MsgType, inner: MsgType },
}

pub(crate) type Result<T> = result::Result<T, EnvelopeError>;
