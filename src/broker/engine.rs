//! Broker engine
//!
//! The broker bridges sessions connected to this process and the
//! distribution medium shared by every node:
//! - `register`/`unregister` maintain the local registry of sessions, keyed
//!   by client id. The registry holds handles only; sessions are owned by
//!   their connection task.
//! - `send` publishes a relay message on the recipient's channel. It never
//!   short-cuts to a local session, so same-node and cross-node recipients
//!   see the same delivery path.
//! - `poll` listens on every recipient channel and hands each message to the
//!   matching local session, if any.
//!
//! Concurrency notes:
//! - The registry is a `DashMap`, so sessions registering, unregistering and
//!   the poll loop's lookups never contend on one global lock.
//! - Delivery into a session's bounded outbound queue happens on its own
//!   task, so one stalled session cannot hold up the poll loop.

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::medium::Medium;
use super::message::RelayMessage;
use crate::protocol::{Envelope, ReceivePayload};
use crate::session::SessionHandle;
use crate::utils::error::BrokerError;

pub struct Broker {
    sessions: DashMap<String, SessionHandle>,
    medium: Arc<dyn Medium>,
    channel_prefix: String,
}

impl Broker {
    pub fn new(medium: Arc<dyn Medium>, channel_prefix: impl Into<String>) -> Self {
        Self {
            sessions: DashMap::new(),
            medium,
            channel_prefix: channel_prefix.into(),
        }
    }

    /// Add a session to the local registry. Registering the same id twice
    /// replaces the previous handle.
    pub fn register(&self, session: SessionHandle) {
        debug!(client = %session.id(), "registered session");
        self.sessions.insert(session.id().to_string(), session);
    }

    /// Remove a session from the local registry. Unknown sessions are ignored.
    pub fn unregister(&self, session: &SessionHandle) {
        if self.sessions.remove(&session.id().to_string()).is_some() {
            debug!(client = %session.id(), "unregistered session");
        }
    }

    pub fn is_registered(&self, id: Uuid) -> bool {
        self.sessions.contains_key(&id.to_string())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Channel carrying relay messages addressed to `recipient_id`.
    pub fn channel_for(&self, recipient_id: Uuid) -> String {
        format!("{}{}", self.channel_prefix, recipient_id)
    }

    /// Pattern covering every recipient channel.
    pub fn channel_pattern(&self) -> String {
        format!("{}*", self.channel_prefix)
    }

    /// Publish `message` on the channel of `recipient_id`.
    ///
    /// Failures are returned to the caller and not retried.
    pub async fn send(&self, recipient_id: Uuid, message: &RelayMessage) -> Result<(), BrokerError> {
        let payload = message.to_bytes()?;
        self.medium
            .publish(&self.channel_for(recipient_id), payload)
            .await
    }

    /// Deliver relay messages to local sessions until `shutdown` fires.
    ///
    /// Returns `Ok` after unsubscribing when cancelled. Losing the
    /// subscription is fatal and returned as an error; undecodable messages
    /// are logged and skipped.
    pub async fn poll(&self, shutdown: CancellationToken) -> Result<(), BrokerError> {
        let pattern = self.channel_pattern();
        let mut subscription = self.medium.subscribe(&pattern).await?;
        info!(pattern = %pattern, "broker polling relay channels");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    subscription.unsubscribe().await?;
                    info!(pattern = %pattern, "broker poll stopped");
                    return Ok(());
                }
                received = subscription.next_message() => match received {
                    Some(bytes) => self.deliver(&bytes),
                    None => {
                        error!(pattern = %pattern, "relay subscription lost");
                        return Err(BrokerError::SubscriptionClosed(pattern));
                    }
                },
            }
        }
    }

    fn deliver(&self, bytes: &[u8]) {
        let message = match RelayMessage::from_bytes(bytes) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "skipping undecodable relay message");
                return;
            }
        };

        // Clone the handle out so no registry shard stays locked while sending.
        let Some(session) = self
            .sessions
            .get(&message.recipient_id.to_string())
            .map(|entry| entry.value().clone())
        else {
            debug!(recipient = %message.recipient_id, "recipient not connected to this node");
            return;
        };

        let envelope = Envelope::receive(
            None,
            message.recipient_id,
            ReceivePayload {
                sender_id: message.sender_id,
                text: message.text,
            },
        );
        tokio::spawn(async move {
            if !session.enqueue(envelope).await {
                debug!(client = %session.id(), "session closed before delivery");
            }
        });
    }
}
