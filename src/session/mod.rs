//! The `session` module owns the server side of one live connection.
//!
//! A `Session` is created when a connection is accepted and dropped when it
//! ends. While it runs, a reader task decodes frames into the inbound queue
//! and the dispatch loop races three events: an inbound envelope, an
//! outbound envelope ready to write, and the idle deadline. The broker only
//! ever sees a `SessionHandle`, which can enqueue outbound envelopes.

pub mod handle;
pub mod lifecycle;

pub use handle::SessionHandle;
pub use lifecycle::{Session, SessionEnd, SessionState};
