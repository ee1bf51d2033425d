//! Distribution medium
//!
//! The broker only needs two operations from the publish/subscribe backend:
//! publish bytes on a named channel, and subscribe to a glob pattern of
//! channels. `MemoryMedium` implements them in-process for single-node runs
//! and tests; `RedisMedium` bridges several nodes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::utils::error::BrokerError;

#[async_trait]
pub trait Medium: Send + Sync {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Open a dedicated subscription to every channel matching `pattern`.
    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>, BrokerError>;
}

#[async_trait]
pub trait Subscription: Send {
    /// Next payload, or `None` once the medium tore the subscription down.
    async fn next_message(&mut self) -> Option<Vec<u8>>;

    async fn unsubscribe(self: Box<Self>) -> Result<(), BrokerError>;
}

/// Redis-style glob matching restricted to exact names and a trailing `*`.
pub fn channel_matches(pattern: &str, channel: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => channel.starts_with(prefix),
        None => pattern == channel,
    }
}

const MEMORY_CAPACITY: usize = 1024;

/// In-process medium backed by a `broadcast` channel.
///
/// Every subscription sees every publish and filters by pattern. Closing the
/// medium ends all subscriptions, like a dropped Redis connection.
#[derive(Clone)]
pub struct MemoryMedium {
    sender: broadcast::Sender<(String, Vec<u8>)>,
    closed: CancellationToken,
    subscriptions: Arc<AtomicUsize>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(MEMORY_CAPACITY);
        Self {
            sender,
            closed: CancellationToken::new(),
            subscriptions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Subscriptions opened and not yet unsubscribed.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Medium for MemoryMedium {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        if self.closed.is_cancelled() {
            return Err(BrokerError::Unavailable("memory medium closed".to_string()));
        }
        // No receivers is not an error: nobody is listening on any node.
        let _ = self.sender.send((channel.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>, BrokerError> {
        if self.closed.is_cancelled() {
            return Err(BrokerError::Unavailable("memory medium closed".to_string()));
        }
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySubscription {
            pattern: pattern.to_string(),
            receiver: self.sender.subscribe(),
            closed: self.closed.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
        }))
    }
}

struct MemorySubscription {
    pattern: String,
    receiver: broadcast::Receiver<(String, Vec<u8>)>,
    closed: CancellationToken,
    subscriptions: Arc<AtomicUsize>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next_message(&mut self) -> Option<Vec<u8>> {
        loop {
            tokio::select! {
                _ = self.closed.cancelled() => return None,
                received = self.receiver.recv() => match received {
                    Ok((channel, payload)) if channel_matches(&self.pattern, &channel) => {
                        return Some(payload);
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(pattern = %self.pattern, skipped, "subscription lagged, relay messages dropped");
                    }
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    }

    async fn unsubscribe(self: Box<Self>) -> Result<(), BrokerError> {
        self.subscriptions.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
