//! End-to-end queue behaviour against the in-memory store
mod common;

use chrono::Duration;
use common::MemoryQueue;
use messenger_queue::messaging::{Clock, Headers, MessagingError};
use messenger_queue::QueueConfig;

fn headers(pairs: &[(&str, &str)]) -> Headers {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn three_messages_in_send_order() {
    let queue = MemoryQueue::new(QueueConfig::default());
    let connection = &queue.connection;

    let first = connection.send(b"first".to_vec(), &headers(&[("n", "1")]), 0).await.unwrap();
    queue.clock.advance(Duration::milliseconds(1));
    let second = connection.send(b"second".to_vec(), &headers(&[("n", "2")]), 0).await.unwrap();
    queue.clock.advance(Duration::milliseconds(1));
    let third = connection.send(b"third".to_vec(), &headers(&[("n", "3")]), 0).await.unwrap();

    assert_eq!(connection.message_count().await.unwrap(), 3);

    for (expected_id, expected_body, n) in [(first, "first", "1"), (second, "second", "2"), (third, "third", "3")] {
        let message = connection.get().await.unwrap().expect("message");
        assert_eq!(message.id, expected_id);
        assert_eq!(message.body_str(), Some(expected_body));
        assert_eq!(message.header("n"), Some(n));
        assert!(message.is_leased());
        assert!(connection.ack(&message.id).await.unwrap());
    }

    assert!(connection.get().await.unwrap().is_none());
    assert_eq!(connection.message_count().await.unwrap(), 0);
}

#[tokio::test]
async fn leased_message_is_hidden_until_timeout() {
    let queue = MemoryQueue::new(QueueConfig::default().with_redeliver_timeout(10));
    let connection = &queue.connection;

    let id = connection.send(b"job".to_vec(), &Headers::new(), 0).await.unwrap();
    let leased = connection.get().await.unwrap().unwrap();
    assert_eq!(leased.id, id);
    assert_eq!(leased.delivered_at, Some(queue.clock.now()));

    assert_eq!(connection.message_count().await.unwrap(), 0);
    assert!(connection.get().await.unwrap().is_none());

    queue.clock.advance(Duration::seconds(11));
    assert_eq!(connection.message_count().await.unwrap(), 1);
    assert_eq!(connection.get().await.unwrap().unwrap().id, id);
}

#[tokio::test]
async fn delayed_messages_follow_available_at() {
    let queue = MemoryQueue::new(QueueConfig::default());
    let connection = &queue.connection;

    let late = connection.send(b"late".to_vec(), &Headers::new(), 2_000).await.unwrap();
    let early = connection.send(b"early".to_vec(), &Headers::new(), 1_000).await.unwrap();

    assert!(connection.get().await.unwrap().is_none());

    queue.clock.advance(Duration::milliseconds(2_000));
    assert_eq!(connection.get().await.unwrap().unwrap().id, early);
    assert_eq!(connection.get().await.unwrap().unwrap().id, late);
}

#[tokio::test]
async fn queues_share_a_collection_without_interference() {
    let queue = MemoryQueue::new(QueueConfig::default().with_queue_name("emails"));
    let other = queue.sibling(QueueConfig::default().with_queue_name("invoices"));

    let email = queue.connection.send(b"mail".to_vec(), &Headers::new(), 0).await.unwrap();
    other.send(b"invoice".to_vec(), &Headers::new(), 0).await.unwrap();

    assert_eq!(queue.connection.message_count().await.unwrap(), 1);
    assert_eq!(other.message_count().await.unwrap(), 1);

    // Another queue cannot remove the record
    assert!(!other.ack(&email).await.unwrap());
    assert_eq!(queue.connection.get().await.unwrap().unwrap().id, email);
    assert_eq!(queue.store.len("messenger_messages"), Some(2));
}

#[tokio::test]
async fn setup_is_idempotent() {
    let queue = MemoryQueue::new(QueueConfig::default().with_auto_setup(false));
    queue.connection.setup().await.unwrap();
    let id = queue.connection.send(b"kept".to_vec(), &Headers::new(), 0).await.unwrap();

    queue.connection.setup().await.unwrap();

    assert_eq!(queue.connection.find(&id).await.unwrap().unwrap().body_str(), Some("kept"));
}

#[tokio::test]
async fn missing_schema_without_auto_setup() {
    let queue = MemoryQueue::new(QueueConfig::default().with_auto_setup(false));

    let err = queue.connection.send(b"x".to_vec(), &Headers::new(), 0).await.unwrap_err();
    assert!(matches!(err, MessagingError::SchemaMissing { ref collection } if collection == "messenger_messages"));
    assert!(!queue.store.has_collection("messenger_messages"));
}

#[tokio::test]
async fn auto_setup_recovers_from_dropped_collection() {
    let queue = MemoryQueue::new(QueueConfig::default());
    queue.connection.send(b"x".to_vec(), &Headers::new(), 0).await.unwrap();

    queue.store.drop_collection("messenger_messages");

    assert_eq!(queue.connection.message_count().await.unwrap(), 0);
    assert!(queue.store.has_collection("messenger_messages"));
}

#[tokio::test]
async fn redelivered_message_can_be_acked_once() {
    let queue = MemoryQueue::new(QueueConfig::default().with_redeliver_timeout(0));
    let connection = &queue.connection;
    let id = connection.send(b"x".to_vec(), &Headers::new(), 0).await.unwrap();

    connection.get().await.unwrap().unwrap();
    queue.clock.advance(Duration::milliseconds(1));
    let again = connection.get().await.unwrap().unwrap();
    assert_eq!(again.id, id);

    assert!(connection.ack(&id).await.unwrap());
    assert!(!connection.ack(&id).await.unwrap());
}
