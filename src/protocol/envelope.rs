use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::kind::Kind;
use super::payload::{ConnectionPayload, ErrorPayload, Payload, ReceivePayload, SendPayload};
use crate::utils::error::DecodeError;

/// The unit exchanged with a client.
///
/// `id` correlates a reply with its request: replies reuse the id of the
/// message they answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub client_id: Uuid,
    pub id: Uuid,
    pub payload: Payload,
}

/// Header read during the first decoding step; `data` stays untyped.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    client_id: Uuid,
    #[serde(default)]
    id: Uuid,
    kind: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct WireEnvelope<'a> {
    client_id: Uuid,
    id: Uuid,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

/// Decode one frame into an envelope.
///
/// Fails when the frame is not JSON, when `kind` is unknown, or when `data`
/// does not match the shape `kind` requires.
pub fn decode(bytes: &[u8]) -> Result<Envelope, DecodeError> {
    let raw: RawEnvelope = serde_json::from_slice(bytes).map_err(DecodeError::Syntax)?;

    let kind: Kind = raw.kind.parse().map_err(|kind| DecodeError::UnknownKind {
        message_id: raw.id,
        kind,
    })?;

    let payload =
        Payload::parse(kind, raw.data).map_err(|source| DecodeError::InvalidPayload {
            message_id: raw.id,
            kind: kind.as_str(),
            source,
        })?;

    Ok(Envelope {
        client_id: raw.client_id,
        id: raw.id,
        payload,
    })
}

/// Encode an envelope as a JSON text frame.
pub fn encode(envelope: &Envelope) -> Result<String, serde_json::Error> {
    let wire = WireEnvelope {
        client_id: envelope.client_id,
        id: envelope.id,
        kind: envelope.kind().as_str(),
        data: envelope.payload.to_value()?,
    };
    serde_json::to_string(&wire)
}

/// Reuse `message_id` when one is supplied, otherwise mint a fresh one.
fn resolve_id(message_id: Option<Uuid>) -> Uuid {
    match message_id {
        Some(id) if !id.is_nil() => id,
        _ => Uuid::new_v4(),
    }
}

impl Envelope {
    pub fn new(message_id: Option<Uuid>, client_id: Uuid, payload: Payload) -> Self {
        Self {
            client_id,
            id: resolve_id(message_id),
            payload,
        }
    }

    pub fn error(message_id: Option<Uuid>, client_id: Uuid, payload: ErrorPayload) -> Self {
        Self::new(message_id, client_id, Payload::Error(payload))
    }

    pub fn registration(message_id: Option<Uuid>, client_id: Uuid) -> Self {
        Self::new(message_id, client_id, Payload::Registration)
    }

    pub fn connection(
        message_id: Option<Uuid>,
        client_id: Uuid,
        payload: ConnectionPayload,
    ) -> Self {
        Self::new(message_id, client_id, Payload::Connection(payload))
    }

    pub fn send(message_id: Option<Uuid>, client_id: Uuid, payload: SendPayload) -> Self {
        Self::new(message_id, client_id, Payload::Send(payload))
    }

    pub fn receive(message_id: Option<Uuid>, client_id: Uuid, payload: ReceivePayload) -> Self {
        Self::new(message_id, client_id, Payload::Receive(payload))
    }

    pub fn ack(message_id: Option<Uuid>, client_id: Uuid) -> Self {
        Self::new(message_id, client_id, Payload::Ack)
    }

    pub fn kind(&self) -> Kind {
        self.payload.kind()
    }
}
