//! Load generator: many connections sending to each other on a timer.

use std::time::Duration;

use rand::seq::IndexedRandom;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::connection::RelayClient;
use crate::protocol::Payload;
use crate::utils::error::ClientError;

/// Totals across all stress connections.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StressReport {
    pub connections: usize,
    pub sent: u64,
    pub acked: u64,
    pub received: u64,
    pub failed: u64,
}

impl StressReport {
    fn absorb(&mut self, other: StressReport) {
        self.sent += other.sent;
        self.acked += other.acked;
        self.received += other.received;
        self.failed += other.failed;
    }
}

/// Open `connections` clients against `url`; each sends to a random peer
/// every `interval` until `shutdown` fires.
pub async fn run_stress(
    url: &str,
    connections: usize,
    interval: Duration,
    shutdown: CancellationToken,
) -> Result<StressReport, ClientError> {
    let mut clients = Vec::with_capacity(connections);
    for _ in 0..connections {
        clients.push(RelayClient::connect(url).await?);
    }
    let peers: Vec<Uuid> = clients.iter().map(RelayClient::id).collect();
    info!(connections, "stress clients connected");

    let mut tasks = JoinSet::new();
    for client in clients {
        tasks.spawn(drive(client, peers.clone(), interval, shutdown.clone()));
    }

    let mut report = StressReport {
        connections,
        ..StressReport::default()
    };
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(partial) => report.absorb(partial),
            Err(e) => warn!(error = %e, "stress task panicked"),
        }
    }

    info!(
        sent = report.sent,
        acked = report.acked,
        received = report.received,
        failed = report.failed,
        "stress run finished"
    );
    Ok(report)
}

async fn drive(
    mut client: RelayClient,
    peers: Vec<Uuid>,
    interval: Duration,
    shutdown: CancellationToken,
) -> StressReport {
    let mut report = StressReport::default();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let Some(to) = pick(&peers) else { break };
                report.sent += 1;
                match client.send_and_confirm(to, "stress").await {
                    Ok(others) => {
                        report.acked += 1;
                        report.received += others
                            .iter()
                            .filter(|e| matches!(e.payload, Payload::Receive(_)))
                            .count() as u64;
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!(client = %client.id(), error = %e, "stress send failed");
                        if matches!(e, ClientError::Closed | ClientError::WebSocket(_)) {
                            break;
                        }
                    }
                }
            }
        }
    }

    let _ = client.close().await;
    report
}

pub(super) fn pick(peers: &[Uuid]) -> Option<Uuid> {
    peers.choose(&mut rand::rng()).copied()
}

