//! Lease exclusivity under concurrent polling
mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::MemoryQueue;
use futures::future::join_all;
use messenger_queue::messaging::{Headers, MessageId};
use messenger_queue::QueueConfig;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_message_has_exactly_one_winner() {
    let queue = MemoryQueue::new(QueueConfig::default());
    let id = queue.connection.send(b"only".to_vec(), &Headers::new(), 0).await.unwrap();

    let handles = (0..16).map(|_| {
        let connection = Arc::clone(&queue.connection);
        tokio::spawn(async move { connection.get().await.unwrap() })
    });

    let winners: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .filter_map(|result| result.unwrap().map(|message| message.id))
        .collect();

    assert_eq!(winners, vec![id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_message_is_delivered_once() {
    let queue = MemoryQueue::new(QueueConfig::default());
    let mut sent = HashSet::new();
    for i in 0..50 {
        let id = queue
            .connection
            .send(format!("m{i}").into_bytes(), &Headers::new(), 0)
            .await
            .unwrap();
        sent.insert(id);
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let connection = Arc::clone(&queue.connection);
        handles.push(tokio::spawn(async move {
            let mut received: Vec<MessageId> = Vec::new();
            while let Some(message) = connection.get().await.unwrap() {
                received.push(message.id.clone());
                connection.ack(&message.id).await.unwrap();
            }
            received
        }));
    }

    let delivered: Vec<MessageId> = join_all(handles)
        .await
        .into_iter()
        .flat_map(|result| result.unwrap())
        .collect();

    assert_eq!(delivered.len(), sent.len());
    assert_eq!(delivered.into_iter().collect::<HashSet<_>>(), sent);
    assert_eq!(queue.connection.message_count().await.unwrap(), 0);
}
