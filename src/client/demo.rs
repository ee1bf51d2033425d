//! One-shot client: connect, register, send a single message.

use tracing::info;
use uuid::Uuid;

use super::connection::RelayClient;
use crate::protocol::Payload;
use crate::utils::error::ClientError;

/// What a `run_client` call observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoOutcome {
    pub client_id: Uuid,
    pub recipient_id: Uuid,
    /// The message that came back when sending to ourselves.
    pub echoed: Option<String>,
}

/// Connect to `url`, send `text` to `to` (or to ourselves) and wait for the
/// ack. When sending to ourselves, also wait for the relayed copy.
pub async fn run_client(
    url: &str,
    to: Option<Uuid>,
    text: &str,
) -> Result<DemoOutcome, ClientError> {
    let mut client = RelayClient::connect(url).await?;
    let client_id = client.register().await?;
    println!("connected as {client_id}");

    let recipient_id = to.unwrap_or(client_id);
    let mut received = client.send_and_confirm(recipient_id, text).await?;
    println!("delivered to {recipient_id}");

    let mut echoed = None;
    if recipient_id == client_id {
        let (sender, text) = match received.pop() {
            Some(envelope) => match envelope.payload {
                Payload::Receive(payload) => (payload.sender_id, payload.text),
                other => return Err(ClientError::Unexpected(other.kind().to_string())),
            },
            None => client.recv_text().await?,
        };
        println!("{sender}: {text}");
        echoed = Some(text);
    }

    info!(client = %client_id, "demo client done");
    client.close().await?;

    Ok(DemoOutcome {
        client_id,
        recipient_id,
        echoed,
    })
}
