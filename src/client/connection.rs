use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::protocol::{self, Envelope, Payload, SendPayload};
use crate::utils::error::ClientError;

/// A single connection to a relay node.
pub struct RelayClient {
    id: Uuid,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RelayClient {
    /// Connect to `url` and wait for the greeting that carries our id.
    ///
    /// The url must not disable the greeting.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (ws, _) = connect_async(url).await?;
        let mut client = Self { id: Uuid::nil(), ws };

        let greeting = client.recv().await?;
        match greeting.payload {
            Payload::Connection(payload) => client.id = payload.client_id,
            other => return Err(ClientError::Unexpected(other.kind().to_string())),
        }
        debug!(client = %client.id, "connected to relay");
        Ok(client)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Write one envelope as a text frame.
    pub async fn send_envelope(&mut self, envelope: &Envelope) -> Result<(), ClientError> {
        let text = protocol::encode(envelope)?;
        self.ws.send(WsMessage::text(text)).await?;
        Ok(())
    }

    /// Ask the server to confirm our id and return the id it reports.
    pub async fn register(&mut self) -> Result<Uuid, ClientError> {
        let request = Envelope::registration(None, self.id);
        self.send_envelope(&request).await?;
        loop {
            let reply = self.recv().await?;
            if reply.id != request.id {
                continue;
            }
            return match reply.payload {
                Payload::Connection(payload) => Ok(payload.client_id),
                other => Err(unexpected(other)),
            };
        }
    }

    /// Send `text` to `to` and return the message id used.
    ///
    /// Does not wait for the ack; see `send_and_confirm`.
    pub async fn send_text(&mut self, to: Uuid, text: &str) -> Result<Uuid, ClientError> {
        let envelope = Envelope::send(
            None,
            self.id,
            SendPayload {
                receiver_id: to,
                text: text.to_string(),
            },
        );
        self.send_envelope(&envelope).await?;
        Ok(envelope.id)
    }

    /// Send `text` to `to` and wait for the matching ack.
    ///
    /// Messages that arrive in the meantime are returned alongside.
    pub async fn send_and_confirm(
        &mut self,
        to: Uuid,
        text: &str,
    ) -> Result<Vec<Envelope>, ClientError> {
        let id = self.send_text(to, text).await?;
        let mut others = Vec::new();
        loop {
            let reply = self.recv().await?;
            if reply.id != id {
                others.push(reply);
                continue;
            }
            return match reply.payload {
                Payload::Ack => Ok(others),
                other => Err(unexpected(other)),
            };
        }
    }

    /// Next envelope from the server, skipping control frames.
    pub async fn recv(&mut self) -> Result<Envelope, ClientError> {
        loop {
            let frame = self.ws.next().await.ok_or(ClientError::Closed)??;
            match frame {
                WsMessage::Text(_) | WsMessage::Binary(_) => {
                    return Ok(protocol::decode(&frame.into_data())?);
                }
                WsMessage::Close(_) => return Err(ClientError::Closed),
                _ => continue,
            }
        }
    }

    /// Next `receive` envelope, as `(sender, text)`.
    pub async fn recv_text(&mut self) -> Result<(Uuid, String), ClientError> {
        loop {
            let envelope = self.recv().await?;
            match envelope.payload {
                Payload::Receive(payload) => return Ok((payload.sender_id, payload.text)),
                Payload::Ack => continue,
                other => return Err(unexpected(other)),
            }
        }
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.ws.close(None).await?;
        Ok(())
    }
}

fn unexpected(payload: Payload) -> ClientError {
    match payload {
        Payload::Error(error) => ClientError::Rejected {
            code: error.code,
            description: error.description,
        },
        other => ClientError::Unexpected(other.kind().to_string()),
    }
}
