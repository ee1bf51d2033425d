//! Relay messages
//!
//! `RelayMessage` is what brokers exchange over the distribution medium. It is
//! distinct from the client-facing `Envelope`: only the recipient matters for
//! routing, and it selects the channel the message is published on. The
//! sender travels as opaque payload.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub text: String,
}

impl RelayMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
