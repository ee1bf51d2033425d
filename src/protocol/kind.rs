use std::fmt;
use std::str::FromStr;

/// Discriminant carried in the `kind` field of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Sent by either side when a request could not be processed.
    Error,
    /// Sent by a client to learn its id.
    Registration,
    /// Sent by the server with the client's id.
    Connection,
    /// Sent by a client to relay text to another client.
    Send,
    /// Sent by the server when another client relayed text to this one.
    Receive,
    /// Sent by the server once a `send` was handed to the broker.
    Ack,
}

impl Kind {
    pub const ALL: [Kind; 6] = [
        Kind::Error,
        Kind::Registration,
        Kind::Connection,
        Kind::Send,
        Kind::Receive,
        Kind::Ack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Error => "error",
            Kind::Registration => "registration",
            Kind::Connection => "connection",
            Kind::Send => "send",
            Kind::Receive => "receive",
            Kind::Ack => "ack",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}
