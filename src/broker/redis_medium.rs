//! Redis-backed distribution medium.
//!
//! Publishing goes through one multiplexed connection shared by every caller.
//! Each subscription gets its own connection, since a connection in
//! subscriber mode cannot issue other commands.

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::{MultiplexedConnection, PubSub};
use tracing::{debug, info};

use super::medium::{Medium, Subscription};
use crate::utils::error::BrokerError;

pub struct RedisMedium {
    client: redis::Client,
    publisher: MultiplexedConnection,
}

impl RedisMedium {
    /// Open the publishing connection to the server at `url`.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url)?;
        let publisher = client.get_multiplexed_async_connection().await?;
        info!("connected to redis");
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl Medium for RedisMedium {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(channel, payload).await?;
        debug!(channel, receivers, "published relay message");
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>, BrokerError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(pattern).await?;
        info!(pattern, "subscribed to relay channels");
        Ok(Box::new(RedisSubscription {
            pubsub,
            pattern: pattern.to_string(),
        }))
    }
}

struct RedisSubscription {
    pubsub: PubSub,
    pattern: String,
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn next_message(&mut self) -> Option<Vec<u8>> {
        let mut messages = std::pin::pin!(self.pubsub.on_message());
        let msg = messages.next().await?;
        debug!(channel = msg.get_channel_name(), "received pmessage");
        Some(msg.get_payload_bytes().to_vec())
    }

    async fn unsubscribe(mut self: Box<Self>) -> Result<(), BrokerError> {
        let pattern = self.pattern.clone();
        self.pubsub.punsubscribe(&pattern).await?;
        info!(pattern = %pattern, "unsubscribed from relay channels");
        Ok(())
    }
}
