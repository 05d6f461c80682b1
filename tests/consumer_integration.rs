mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::MemoryQueue;
use messenger_queue::messaging::{
    ConsumerStats, Headers, PollingConfig, PollingConsumer, ReceivedMessage, Transport,
};
use messenger_queue::QueueConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ChargeCard {
    order_id: u64,
    amount_cents: i64,
}

#[tokio::test]
async fn typed_messages_flow_through_consumer() {
    let queue = MemoryQueue::new(QueueConfig::default().with_queue_name("payments"));
    let transport = Transport::new(Arc::clone(&queue.connection));

    for order_id in 1..=4 {
        transport
            .send(&ChargeCard { order_id, amount_cents: 1_000 }, Headers::new(), 0)
            .await
            .unwrap();
    }
    // Not JSON for ChargeCard: removed by the consumer's handler failure path
    queue
        .connection
        .send(b"{\"order_id\":\"bad\"}".to_vec(), &Headers::new(), 0)
        .await
        .unwrap();

    let total = Arc::new(AtomicU64::new(0));
    let (tx, rx) = watch::channel(false);
    let consumer = PollingConsumer::with_config(
        Arc::clone(&queue.connection),
        PollingConfig {
            idle_backoff: Duration::from_millis(1),
            max_idle_backoff: Duration::from_millis(2),
        },
    );

    let sum = Arc::clone(&total);
    let handle = tokio::spawn(async move {
        consumer
            .run(
                move |message| {
                    let sum = Arc::clone(&sum);
                    async move {
                        let charge: ChargeCard = serde_json::from_slice(&message.body)?;
                        sum.fetch_add(charge.amount_cents as u64, Ordering::SeqCst);
                        Ok::<(), anyhow::Error>(())
                    }
                },
                rx,
            )
            .await
    });

    while queue.connection.queue_emptied_at().is_none() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    tx.send(true).unwrap();

    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats, ConsumerStats { processed: 4, failed: 1 });
    assert_eq!(total.load(Ordering::SeqCst), 4_000);
    assert_eq!(transport.message_count().await.unwrap(), 0);
}

#[tokio::test]
async fn transport_redelivers_unacked_message() {
    let queue = MemoryQueue::new(QueueConfig::default().with_redeliver_timeout(5));
    let transport = Transport::new(Arc::clone(&queue.connection));
    let charge = ChargeCard { order_id: 9, amount_cents: 250 };

    let id = transport.send(&charge, Headers::new(), 0).await.unwrap();
    let first: ReceivedMessage<ChargeCard> = transport.get().await.unwrap().unwrap();
    assert_eq!(first.id(), &id);
    assert!(transport.get::<ChargeCard>().await.unwrap().is_none());

    queue.clock.advance(chrono::Duration::seconds(6));
    let second: ReceivedMessage<ChargeCard> = transport.get().await.unwrap().unwrap();
    assert_eq!(second.message, charge);
    assert!(transport.ack(&second).await.unwrap());
}

#[tokio::test]
async fn consumer_stops_when_sender_dropped() {
    let queue = MemoryQueue::new(QueueConfig::default());
    let (tx, rx) = watch::channel(false);
    let consumer = PollingConsumer::new(Arc::clone(&queue.connection));
    drop(tx);

    let stats = tokio::time::timeout(Duration::from_secs(5), consumer.run(|_| async { Ok(()) }, rx))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(stats, ConsumerStats::default());
}
