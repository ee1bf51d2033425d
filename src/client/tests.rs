use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::stress::pick;
use super::{RelayClient, run_client, run_stress};
use crate::broker::{Broker, MemoryMedium};
use crate::config::Settings;
use crate::transport::run_until;
use crate::utils::error::ClientError;

/// Start a node on an ephemeral port and return its relay url.
async fn start_node(shutdown: CancellationToken) -> (String, Arc<Broker>) {
    let settings = Settings::default();
    let path = settings.server.path.clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let medium = MemoryMedium::new();
    let broker = Arc::new(Broker::new(
        Arc::new(medium.clone()),
        settings.broker.channel_prefix.clone(),
    ));
    tokio::spawn(run_until(listener, Arc::clone(&broker), settings, shutdown));

    for _ in 0..100 {
        if medium.subscriptions() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    (format!("ws://{addr}{path}"), broker)
}

#[tokio::test]
async fn test_connect_reads_greeting_and_registers() {
    let shutdown = CancellationToken::new();
    let (url, broker) = start_node(shutdown.clone()).await;

    let mut client = RelayClient::connect(&url).await.unwrap();
    assert!(!client.id().is_nil());
    assert!(broker.is_registered(client.id()));
    assert_eq!(client.register().await.unwrap(), client.id());

    client.close().await.unwrap();
    shutdown.cancel();
}

#[tokio::test]
async fn test_send_to_self_echoes_text() {
    let shutdown = CancellationToken::new();
    let (url, _) = start_node(shutdown.clone()).await;

    let outcome = timeout(Duration::from_secs(2), run_client(&url, None, "hello me"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.recipient_id, outcome.client_id);
    assert_eq!(outcome.echoed.as_deref(), Some("hello me"));

    shutdown.cancel();
}

#[tokio::test]
async fn test_send_to_other_client_is_received() {
    let shutdown = CancellationToken::new();
    let (url, _) = start_node(shutdown.clone()).await;

    let mut bob = RelayClient::connect(&url).await.unwrap();
    let outcome = run_client(&url, Some(bob.id()), "hi bob").await.unwrap();
    assert_eq!(outcome.echoed, None);

    let (sender, text) = timeout(Duration::from_secs(2), bob.recv_text())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sender, outcome.client_id);
    assert_eq!(text, "hi bob");

    shutdown.cancel();
}

#[tokio::test]
async fn test_send_to_unknown_recipient_is_still_acked() {
    let shutdown = CancellationToken::new();
    let (url, _) = start_node(shutdown.clone()).await;

    let outcome = run_client(&url, Some(Uuid::new_v4()), "anyone?").await.unwrap();
    assert_eq!(outcome.echoed, None);

    shutdown.cancel();
}

#[tokio::test]
async fn test_connect_to_wrong_path_fails() {
    let shutdown = CancellationToken::new();
    let (url, _) = start_node(shutdown.clone()).await;
    let wrong = url.replace("/v1/relay", "/nope");

    let result = RelayClient::connect(&wrong).await;
    assert!(matches!(result, Err(ClientError::WebSocket(_))));

    shutdown.cancel();
}

#[tokio::test]
async fn test_stress_run_sends_until_shutdown() {
    let server_shutdown = CancellationToken::new();
    let (url, broker) = start_node(server_shutdown.clone()).await;

    let stop = CancellationToken::new();
    let stopper = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        stopper.cancel();
    });

    let report = timeout(
        Duration::from_secs(3),
        run_stress(&url, 3, Duration::from_millis(20), stop),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.connections, 3);
    assert!(report.sent >= 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.acked, report.sent);

    for _ in 0..100 {
        if broker.session_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(broker.session_count(), 0);

    server_shutdown.cancel();
}

#[test]
fn test_pick_returns_one_of_the_peers() {
    let peers: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    for _ in 0..50 {
        let chosen = pick(&peers).unwrap();
        assert!(peers.contains(&chosen));
    }
    assert_eq!(pick(&[]), None);
}
