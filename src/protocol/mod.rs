//! The `protocol` module defines the messages exchanged between clients and
//! the server.
//!
//! Every frame is a JSON `Envelope`:
//!
//! ```json
//! {"client_id": "<uuid>", "id": "<uuid>", "kind": "send",
//!  "data": {"receiver_id": "<uuid>", "text": "hi"}}
//! ```
//!
//! The shape of `data` depends on `kind`. Decoding is done in two steps: the
//! header is read first, then `data` is parsed into the payload selected by
//! the kind. The module knows nothing about sessions or the broker.

pub mod envelope;
pub mod kind;
pub mod payload;

pub use envelope::{Envelope, decode, encode};
pub use kind::Kind;
pub use payload::{
    ConnectionPayload, ErrorCode, ErrorPayload, Payload, ReceivePayload, SendPayload,
};
