//! # relaymesh
//!
//! `relaymesh` relays short text messages between WebSocket clients that may
//! be connected to different server processes. Every node publishes outgoing
//! messages on a shared publish/subscribe medium (Redis) and delivers the ones
//! addressed to its own clients.
//!
//! ## Core Modules
//!
//! - `protocol`: the JSON envelope exchanged with clients.
//! - `session`: one connected client, its queues and idle deadline.
//! - `broker`: the local session registry and the relay over the medium.
//! - `transport`: the WebSocket server that ties sessions to the broker.
//! - `client`: a protocol client plus the demo and stress commands.
//! - `config`: layered settings from file and environment.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod utils;
