//! Kind-specific payloads.
//!
//! `Payload` is the sum type over the six shapes; `registration` and `ack`
//! carry nothing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::kind::Kind;

/// Code and human-readable description of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub description: String,
}

/// Id assigned to a newly connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionPayload {
    pub client_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendPayload {
    pub receiver_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivePayload {
    pub sender_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Error(ErrorPayload),
    Registration,
    Connection(ConnectionPayload),
    Send(SendPayload),
    Receive(ReceivePayload),
    Ack,
}

impl Payload {
    pub fn kind(&self) -> Kind {
        match self {
            Payload::Error(_) => Kind::Error,
            Payload::Registration => Kind::Registration,
            Payload::Connection(_) => Kind::Connection,
            Payload::Send(_) => Kind::Send,
            Payload::Receive(_) => Kind::Receive,
            Payload::Ack => Kind::Ack,
        }
    }

    /// Parse `data` into the shape required by `kind`.
    ///
    /// Payload-less kinds ignore whatever `data` holds.
    pub(crate) fn parse(
        kind: Kind,
        data: Option<serde_json::Value>,
    ) -> Result<Self, serde_json::Error> {
        let data = data.unwrap_or(serde_json::Value::Null);
        Ok(match kind {
            Kind::Error => Payload::Error(serde_json::from_value(data)?),
            Kind::Registration => Payload::Registration,
            Kind::Connection => Payload::Connection(serde_json::from_value(data)?),
            Kind::Send => Payload::Send(serde_json::from_value(data)?),
            Kind::Receive => Payload::Receive(serde_json::from_value(data)?),
            Kind::Ack => Payload::Ack,
        })
    }

    pub(crate) fn to_value(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
        Ok(match self {
            Payload::Error(p) => Some(serde_json::to_value(p)?),
            Payload::Connection(p) => Some(serde_json::to_value(p)?),
            Payload::Send(p) => Some(serde_json::to_value(p)?),
            Payload::Receive(p) => Some(serde_json::to_value(p)?),
            Payload::Registration | Payload::Ack => None,
        })
    }
}

/// Error codes the server reports to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The inbound frame could not be read as an envelope.
    Syntax,
    /// `client_id` of a `send` is not the session's id.
    ClientId,
    /// `data` does not match `kind`.
    Invalid,
    /// Publishing to the distribution medium failed.
    Broker,
    /// Unknown kind, or a kind clients may not send.
    Kind,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Syntax => "ESYNTAX",
            ErrorCode::ClientId => "ECID",
            ErrorCode::Invalid => "EINVAL",
            ErrorCode::Broker => "EBROKER",
            ErrorCode::Kind => "EKIND",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::Syntax => "Unable to process the message due to a syntax error.",
            ErrorCode::ClientId => "The submitted client ID doesn't match the current session.",
            ErrorCode::Invalid => "The data payload doesn't match the given kind.",
            ErrorCode::Broker => "Unable to send the message to the recipient.",
            ErrorCode::Kind => "Invalid message kind received.",
        }
    }
}

impl From<ErrorCode> for ErrorPayload {
    fn from(code: ErrorCode) -> Self {
        ErrorPayload {
            code: code.as_str().to_string(),
            description: code.description().to_string(),
        }
    }
}
