//! The `client` module is the other end of the relay protocol.
//!
//! `RelayClient` wraps one WebSocket connection to a relay node. The `demo`
//! and `stress` modules build the `client` and `stress` subcommands on top
//! of it.

pub mod connection;
pub mod demo;
pub mod stress;

pub use connection::RelayClient;
pub use demo::run_client;
pub use stress::{StressReport, run_stress};

#[cfg(test)]
mod tests;
