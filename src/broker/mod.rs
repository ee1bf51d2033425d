//! The broker crate area contains the relay between local sessions and the
//! distribution medium shared by every server process.
//!
//! Public types:
//! - `Broker`: session registry, `send` and the `poll` delivery loop.
//! - `RelayMessage`: the unit published between nodes.
//! - `Medium`/`Subscription`: the publish/subscribe seam, implemented by
//!   `RedisMedium` and `MemoryMedium`.

pub mod engine;
pub mod medium;
pub mod message;
pub mod redis_medium;

pub use engine::Broker;
pub use medium::{MemoryMedium, Medium, Subscription};
pub use message::RelayMessage;
pub use redis_medium::RedisMedium;

#[cfg(test)]
mod tests;
