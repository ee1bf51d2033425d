//! Session lifecycle
//!
//! `Active` (created, not yet running) → `Running` (reader and dispatch loop
//! live) → `Closing` (reader stopped, queues being drained) → `Closed`.
//!
//! A malformed frame never ends a session: the reader answers it with an
//! `error` envelope and keeps reading. The session ends when the peer closes
//! the connection, when a write fails, or when the idle deadline elapses.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use tungstenite::Error as WsError;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use super::handle::SessionHandle;
use crate::broker::{Broker, RelayMessage};
use crate::protocol::{self, ConnectionPayload, Envelope, ErrorCode, Payload};
use crate::utils::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Running,
    Closing,
    Closed,
}

/// Why a session stopped running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed the connection or the transport stopped yielding frames.
    PeerClosed,
    /// No traffic in either direction for the idle timeout.
    IdleTimeout,
    /// Writing to the transport failed.
    WriteFailed,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionEnd::PeerClosed => "peer closed",
            SessionEnd::IdleTimeout => "idle timeout",
            SessionEnd::WriteFailed => "write failed",
        })
    }
}

pub struct Session {
    id: Uuid,
    broker: Arc<Broker>,
    state: SessionState,
    idle_timeout: Duration,
    queue_capacity: usize,
    outbound_tx: mpsc::Sender<Envelope>,
    outbound_rx: mpsc::Receiver<Envelope>,
}

impl Session {
    /// Create a session with a fresh id and empty queues of `queue_capacity`.
    pub fn new(broker: Arc<Broker>, idle_timeout: Duration, queue_capacity: usize) -> Self {
        let queue_capacity = queue_capacity.max(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(queue_capacity);
        Self {
            id: Uuid::new_v4(),
            broker,
            state: SessionState::Active,
            idle_timeout,
            queue_capacity,
            outbound_tx,
            outbound_rx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.id, self.outbound_tx.clone())
    }

    /// Queue a `connection` envelope announcing the session id.
    pub fn greet(&self) -> bool {
        let greeting = Envelope::connection(
            None,
            self.id,
            ConnectionPayload {
                client_id: self.id,
            },
        );
        self.outbound_tx.try_send(greeting).is_ok()
    }

    /// Apply the request/response rules to one inbound envelope.
    ///
    /// Returns the reply to send back, if any. Replies reuse the request id.
    pub async fn handle_message(&self, message: &Envelope) -> Option<Envelope> {
        match &message.payload {
            Payload::Error(_) | Payload::Ack => None,
            Payload::Registration => Some(Envelope::connection(
                Some(message.id),
                self.id,
                ConnectionPayload {
                    client_id: self.id,
                },
            )),
            Payload::Send(payload) => {
                if message.client_id != self.id {
                    return Some(Envelope::error(
                        Some(message.id),
                        self.id,
                        ErrorCode::ClientId.into(),
                    ));
                }
                let relay = RelayMessage {
                    sender_id: self.id,
                    recipient_id: payload.receiver_id,
                    text: payload.text.clone(),
                };
                match self.broker.send(payload.receiver_id, &relay).await {
                    Ok(()) => Some(Envelope::ack(Some(message.id), self.id)),
                    Err(e) => {
                        warn!(client = %self.id, recipient = %payload.receiver_id, error = %e, "relay publish failed");
                        Some(Envelope::error(
                            Some(message.id),
                            self.id,
                            ErrorCode::Broker.into(),
                        ))
                    }
                }
            }
            Payload::Connection(_) | Payload::Receive(_) => Some(Envelope::error(
                Some(message.id),
                self.id,
                ErrorCode::Kind.into(),
            )),
        }
    }

    /// Serve the connection until it ends, then drain and discard the queues.
    ///
    /// `stream` is consumed by a separate reader task. A session runs once:
    /// calling `run` again returns `None` without touching the transport.
    pub async fn run<S, R>(&mut self, mut sink: S, stream: R) -> Option<SessionEnd>
    where
        S: Sink<WsMessage> + Unpin,
        S::Error: fmt::Display,
        R: Stream<Item = Result<WsMessage, WsError>> + Send + Unpin + 'static,
    {
        if self.state != SessionState::Active {
            warn!(client = %self.id, state = ?self.state, "session already ran");
            return None;
        }
        self.state = SessionState::Running;

        let (inbound_tx, mut inbound_rx) = mpsc::channel(self.queue_capacity);
        let reader = tokio::spawn(read_frames(
            self.id,
            stream,
            inbound_tx,
            self.outbound_tx.clone(),
        ));

        let idle = tokio::time::sleep(self.idle_timeout);
        tokio::pin!(idle);

        let end = loop {
            tokio::select! {
                inbound = inbound_rx.recv() => {
                    let Some(message) = inbound else {
                        break SessionEnd::PeerClosed;
                    };
                    idle.as_mut().reset(Instant::now() + self.idle_timeout);
                    info!(client = %self.id, kind = %message.kind(), "received message");
                    if let Some(reply) = self.handle_message(&message).await {
                        let outbound = self.outbound_tx.clone();
                        tokio::spawn(async move {
                            let _ = outbound.send(reply).await;
                        });
                    }
                }
                Some(outbound) = self.outbound_rx.recv() => {
                    idle.as_mut().reset(Instant::now() + self.idle_timeout);
                    if !self.write(&mut sink, &outbound).await {
                        break SessionEnd::WriteFailed;
                    }
                }
                _ = &mut idle => {
                    info!(client = %self.id, "connection timeout");
                    break SessionEnd::IdleTimeout;
                }
            }
        };

        self.state = SessionState::Closing;
        reader.abort();
        if end != SessionEnd::WriteFailed {
            match tokio::time::timeout(self.idle_timeout, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(client = %self.id, error = %e, "closing transport failed"),
                Err(_) => debug!(client = %self.id, "closing transport timed out"),
            }
        }
        self.outbound_rx.close();
        while self.outbound_rx.try_recv().is_ok() {}
        self.state = SessionState::Closed;
        Some(end)
    }

    /// Write one envelope; `false` means the transport is dead.
    ///
    /// A write that makes no progress for the idle timeout counts as dead.
    async fn write<S>(&self, sink: &mut S, envelope: &Envelope) -> bool
    where
        S: Sink<WsMessage> + Unpin,
        S::Error: fmt::Display,
    {
        let text = match protocol::encode(envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!(client = %self.id, kind = %envelope.kind(), error = %e, "failed to encode envelope");
                return true;
            }
        };
        info!(client = %self.id, kind = %envelope.kind(), "sending message");
        match tokio::time::timeout(self.idle_timeout, sink.send(WsMessage::text(text))).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(client = %self.id, error = %e, "write to transport failed");
                false
            }
            Err(_) => {
                warn!(client = %self.id, "write to transport stalled");
                false
            }
        }
    }
}

/// Reply sent for a frame that could not be decoded.
fn rejection(client_id: Uuid, err: &DecodeError) -> Envelope {
    let code = match err {
        DecodeError::Syntax(_) => ErrorCode::Syntax,
        DecodeError::UnknownKind { .. } => ErrorCode::Kind,
        DecodeError::InvalidPayload { .. } => ErrorCode::Invalid,
    };
    Envelope::error(err.message_id(), client_id, code.into())
}

/// Read path: decode frames into `inbound` until the peer goes away.
///
/// Dropping `inbound` on exit tells the dispatch loop the peer is gone.
async fn read_frames<R>(
    client_id: Uuid,
    mut stream: R,
    inbound: mpsc::Sender<Envelope>,
    outbound: mpsc::Sender<Envelope>,
) where
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        let decoded = match frame {
            Ok(WsMessage::Text(text)) => protocol::decode(text.as_bytes()),
            Ok(WsMessage::Binary(data)) => protocol::decode(&data),
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(WsError::Capacity(e)) => {
                warn!(client = %client_id, error = %e, "oversized frame");
                let reply = Envelope::error(None, client_id, ErrorCode::Syntax.into());
                if outbound.send(reply).await.is_err() {
                    break;
                }
                continue;
            }
            Err(e) => {
                debug!(client = %client_id, error = %e, "transport read failed");
                break;
            }
        };

        match decoded {
            Ok(envelope) => {
                if inbound.send(envelope).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(client = %client_id, error = %e, "rejecting inbound message");
                if outbound.send(rejection(client_id, &e)).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!(client = %client_id, "read path finished");
}
