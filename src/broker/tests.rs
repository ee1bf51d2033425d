use std::sync::Arc;
use std::time::Duration;

use super::medium::channel_matches;
use super::{Broker, MemoryMedium, Medium, RelayMessage};
use crate::protocol::{Envelope, Kind, Payload, ReceivePayload};
use crate::session::SessionHandle;
use crate::utils::error::BrokerError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const PREFIX: &str = "test:";

fn broker_with_medium() -> (Arc<Broker>, MemoryMedium) {
    let medium = MemoryMedium::new();
    let broker = Arc::new(Broker::new(Arc::new(medium.clone()), PREFIX));
    (broker, medium)
}

fn session(capacity: usize) -> (SessionHandle, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(capacity);
    (SessionHandle::new(Uuid::new_v4(), tx), rx)
}

async fn start_poll(
    broker: &Arc<Broker>,
    medium: &MemoryMedium,
) -> (CancellationToken, JoinHandle<Result<(), BrokerError>>) {
    let token = CancellationToken::new();
    let poll = {
        let broker = Arc::clone(broker);
        let token = token.clone();
        tokio::spawn(async move { broker.poll(token).await })
    };
    // Wait until the poll loop holds its subscription.
    for _ in 0..100 {
        if medium.subscriptions() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(medium.subscriptions(), 1, "poll never subscribed");
    (token, poll)
}

fn relay(sender_id: Uuid, recipient_id: Uuid, text: &str) -> RelayMessage {
    RelayMessage {
        sender_id,
        recipient_id,
        text: text.to_string(),
    }
}

#[test]
fn test_channel_matches() {
    assert!(channel_matches("relay:*", "relay:abc"));
    assert!(channel_matches("relay:*", "relay:"));
    assert!(!channel_matches("relay:*", "other:abc"));
    assert!(channel_matches("relay:abc", "relay:abc"));
    assert!(!channel_matches("relay:abc", "relay:abcd"));
}

#[test]
fn test_broker_register_and_unregister() {
    let (broker, _) = broker_with_medium();
    let (handle, _rx) = session(1);

    broker.register(handle.clone());
    assert!(broker.is_registered(handle.id()));
    assert_eq!(broker.session_count(), 1);

    // Registering the same id again overwrites.
    broker.register(handle.clone());
    assert_eq!(broker.session_count(), 1);

    broker.unregister(&handle);
    assert!(!broker.is_registered(handle.id()));
    assert_eq!(broker.session_count(), 0);
}

#[test]
fn test_unregister_unknown_session_is_a_noop() {
    let (broker, _) = broker_with_medium();
    let (registered, _rx) = session(1);
    let (stranger, _rx2) = session(1);
    broker.register(registered.clone());

    broker.unregister(&stranger);
    assert_eq!(broker.session_count(), 1);
}

#[test]
fn test_channel_names() {
    let (broker, _) = broker_with_medium();
    let id = Uuid::new_v4();
    assert_eq!(broker.channel_for(id), format!("test:{id}"));
    assert_eq!(broker.channel_pattern(), "test:*");
}

#[tokio::test]
async fn test_send_publishes_on_recipient_channel() {
    let (broker, medium) = broker_with_medium();
    let sender = Uuid::new_v4();
    let recipient = Uuid::new_v4();
    let mut subscription = medium.subscribe(&broker.channel_for(recipient)).await.unwrap();

    // Published on another recipient's channel: must not be seen.
    broker
        .send(Uuid::new_v4(), &relay(sender, Uuid::new_v4(), "not for you"))
        .await
        .unwrap();
    broker
        .send(recipient, &relay(sender, recipient, "hi"))
        .await
        .unwrap();

    let bytes = timeout(Duration::from_secs(1), subscription.next_message())
        .await
        .unwrap()
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["sender_id"], sender.to_string());
    assert_eq!(body["recipient_id"], recipient.to_string());
    assert_eq!(body["text"], "hi");
}

#[tokio::test]
async fn test_send_goes_through_medium_even_for_local_recipient() {
    let (broker, medium) = broker_with_medium();
    let (handle, mut rx) = session(4);
    broker.register(handle.clone());

    // Without a poll loop nothing reaches the session.
    broker
        .send(handle.id(), &relay(Uuid::new_v4(), handle.id(), "hi"))
        .await
        .unwrap();
    assert!(
        timeout(Duration::from_millis(100), rx.recv())
            .await
            .is_err()
    );
    assert_eq!(medium.subscriptions(), 0);
}

#[tokio::test]
async fn test_send_fails_when_medium_is_down() {
    let (broker, medium) = broker_with_medium();
    medium.close();
    let recipient = Uuid::new_v4();
    let err = broker
        .send(recipient, &relay(Uuid::new_v4(), recipient, "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Unavailable(_)));
}

#[tokio::test]
async fn test_poll_delivers_to_registered_session() {
    let (broker, medium) = broker_with_medium();
    let (handle, mut rx) = session(4);
    broker.register(handle.clone());
    let (token, poll) = start_poll(&broker, &medium).await;

    let sender = Uuid::new_v4();
    broker
        .send(handle.id(), &relay(sender, handle.id(), "hi"))
        .await
        .unwrap();

    let envelope = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(envelope.kind(), Kind::Receive);
    assert_eq!(envelope.client_id, handle.id());
    assert!(!envelope.id.is_nil());
    assert_eq!(
        envelope.payload,
        Payload::Receive(ReceivePayload {
            sender_id: sender,
            text: "hi".to_string(),
        })
    );

    token.cancel();
    poll.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_poll_drops_messages_for_unknown_recipients() {
    let (broker, medium) = broker_with_medium();
    let (handle, mut rx) = session(4);
    broker.register(handle.clone());
    let (token, poll) = start_poll(&broker, &medium).await;

    let absent = Uuid::new_v4();
    broker
        .send(absent, &relay(Uuid::new_v4(), absent, "nobody home"))
        .await
        .unwrap();

    assert!(
        timeout(Duration::from_millis(100), rx.recv())
            .await
            .is_err()
    );
    assert!(!poll.is_finished());

    token.cancel();
    poll.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_poll_skips_undecodable_messages() {
    let (broker, medium) = broker_with_medium();
    let (handle, mut rx) = session(4);
    broker.register(handle.clone());
    let (token, poll) = start_poll(&broker, &medium).await;

    medium
        .publish(&broker.channel_for(handle.id()), b"{not json".to_vec())
        .await
        .unwrap();
    broker
        .send(handle.id(), &relay(Uuid::new_v4(), handle.id(), "still works"))
        .await
        .unwrap();

    let envelope = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    match envelope.payload {
        Payload::Receive(ReceivePayload { text, .. }) => assert_eq!(text, "still works"),
        other => panic!("Expected a receive payload, got {other:?}"),
    }

    token.cancel();
    poll.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_poll_unsubscribes_on_cancellation() {
    let (broker, medium) = broker_with_medium();
    let (token, poll) = start_poll(&broker, &medium).await;

    token.cancel();
    let result = timeout(Duration::from_secs(1), poll).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(medium.subscriptions(), 0);
}

#[tokio::test]
async fn test_poll_fails_when_subscription_is_lost() {
    let (broker, medium) = broker_with_medium();
    let (_token, poll) = start_poll(&broker, &medium).await;

    medium.close();
    let result = timeout(Duration::from_secs(1), poll).await.unwrap().unwrap();
    assert!(matches!(result, Err(BrokerError::SubscriptionClosed(p)) if p == "test:*"));
}

#[tokio::test]
async fn test_full_session_queue_does_not_stall_other_sessions() {
    let (broker, medium) = broker_with_medium();
    let (stalled, _stalled_rx) = session(1);
    let (healthy, mut healthy_rx) = session(4);
    broker.register(stalled.clone());
    broker.register(healthy.clone());
    let (token, poll) = start_poll(&broker, &medium).await;

    for i in 0..5 {
        broker
            .send(stalled.id(), &relay(Uuid::new_v4(), stalled.id(), &format!("flood {i}")))
            .await
            .unwrap();
    }
    broker
        .send(healthy.id(), &relay(Uuid::new_v4(), healthy.id(), "hello"))
        .await
        .unwrap();

    let envelope = timeout(Duration::from_secs(1), healthy_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(envelope.kind(), Kind::Receive);

    token.cancel();
    poll.await.unwrap().unwrap();
}
