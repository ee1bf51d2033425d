//! The `error` module defines the error types used within `relaymesh`.
//!
//! Codec failures, distribution medium failures and server failures are kept
//! apart so each layer can decide what is recoverable: a `DecodeError` is
//! reported back to the peer, a `BrokerError` from `send` becomes an `EBROKER`
//! reply, and a `ServerError` ends the process.

use thiserror::Error;
use uuid::Uuid;

/// Failure to turn inbound bytes into an `Envelope`.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input is not a JSON envelope (bad JSON, missing or malformed ids).
    #[error("malformed envelope: {0}")]
    Syntax(#[source] serde_json::Error),

    /// The envelope parsed but its `kind` is not one of the known kinds.
    #[error("unknown message kind `{kind}`")]
    UnknownKind { message_id: Uuid, kind: String },

    /// The `data` field does not have the shape required by `kind`.
    #[error("payload does not match kind `{kind}`: {source}")]
    InvalidPayload {
        message_id: Uuid,
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Id of the offending message when the envelope header could be read.
    pub fn message_id(&self) -> Option<Uuid> {
        match self {
            DecodeError::Syntax(_) => None,
            DecodeError::UnknownKind { message_id, .. }
            | DecodeError::InvalidPayload { message_id, .. } => Some(*message_id),
        }
    }
}

/// Failure talking to the distribution medium.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to encode relay message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("distribution medium unavailable: {0}")]
    Unavailable(String),

    #[error("subscription to `{0}` was torn down by the medium")]
    SubscriptionClosed(String),
}

/// Failure that stops the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("relay poll loop failed: {0}")]
    PollFailed(#[source] BrokerError),

    #[error("relay poll loop stopped unexpectedly")]
    PollStopped,
}

/// Failure in the command-line client and stress generator.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("server sent an unreadable envelope: {0}")]
    Decode(#[from] DecodeError),

    #[error("server closed the connection")]
    Closed,

    #[error("server rejected message: {code} {description}")]
    Rejected { code: String, description: String },

    #[error("unexpected `{0}` message from server")]
    Unexpected(String),
}
