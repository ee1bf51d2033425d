//! The `transport` module is responsible for handling network communication
//! with clients via WebSockets.
//!
//! It accepts connections, performs the upgrade handshake, and owns each
//! session's lifecycle: create, register with the broker, run, unregister.
//! It also supervises the broker's poll loop for the lifetime of the server.

pub mod websocket;

pub use websocket::{run_until, start_websocket_server};
