use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::Envelope;

/// Non-owning reference to a running session, kept in the broker registry.
///
/// Cloning is cheap; every clone feeds the same bounded outbound queue.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    outbound: mpsc::Sender<Envelope>,
}

impl SessionHandle {
    pub fn new(id: Uuid, outbound: mpsc::Sender<Envelope>) -> Self {
        Self { id, outbound }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue `envelope` for writing, waiting while the queue is full.
    ///
    /// Returns `false` once the session has shut down.
    pub async fn enqueue(&self, envelope: Envelope) -> bool {
        self.outbound.send(envelope).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}
