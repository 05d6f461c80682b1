mod common;

use chrono::Duration;
use common::strategies::*;
use common::{epoch, MemoryQueue};
use messenger_queue::config::is_valid_collection_name;
use messenger_queue::messaging::{Headers, NewMessage, VisibilityFilter};
use messenger_queue::QueueConfig;
use proptest::prelude::*;

proptest! {
    /// Property: generated collection names pass identifier validation
    #[test]
    fn collection_names_are_valid_identifiers(name in collection_name_strategy()) {
        prop_assert!(is_valid_collection_name(&name));
        prop_assert!(QueueConfig::default().with_collection_name(name).validate().is_ok());
    }

    /// Property: available_at is exactly created_at plus the delay
    #[test]
    fn delay_sets_available_at(delay in delay_ms_strategy()) {
        let message = NewMessage::new(b"x".to_vec(), &Headers::new(), "default", epoch(), delay).unwrap();
        prop_assert_eq!(message.available_at - message.created_at, Duration::milliseconds(delay as i64));
    }

    /// Property: a never-delivered message is visible iff its delay has elapsed
    #[test]
    fn undelivered_visibility_tracks_delay(delay in delay_ms_strategy(), elapsed in delay_ms_strategy()) {
        let available_at = epoch() + Duration::milliseconds(delay as i64);
        let now = epoch() + Duration::milliseconds(elapsed as i64);
        let filter = VisibilityFilter::new("default", now, 3600);

        prop_assert_eq!(filter.matches("default", available_at, None), elapsed >= delay);
        prop_assert!(!filter.matches("other", available_at, None));
    }

    /// Property: a leased message becomes visible strictly after the timeout
    #[test]
    fn lease_expires_after_timeout(timeout in 0u64..100_000, elapsed_ms in 0i64..200_000_000) {
        let delivered_at = epoch();
        let now = epoch() + Duration::milliseconds(elapsed_ms);
        let filter = VisibilityFilter::new("default", now, timeout);

        let expected = elapsed_ms > (timeout as i64) * 1000;
        prop_assert_eq!(filter.matches("default", epoch(), Some(delivered_at)), expected);
    }

    /// Property: message_count equals the number of messages get can lease
    #[test]
    fn count_matches_leasable_messages(
        queue_name in queue_name_strategy(),
        delays in prop::collection::vec(0u64..10_000, 0..12),
        elapsed in 0i64..10_000,
    ) {
        let (count, leased) = tokio_test::block_on(async {
            let queue = MemoryQueue::new(QueueConfig::default().with_queue_name(queue_name));
            for delay in &delays {
                queue.connection.send(b"x".to_vec(), &Headers::new(), *delay).await.unwrap();
            }
            queue.clock.advance(Duration::milliseconds(elapsed));

            let count = queue.connection.message_count().await.unwrap();
            let mut leased = 0u64;
            while queue.connection.get().await.unwrap().is_some() {
                leased += 1;
            }
            (count, leased)
        });

        prop_assert_eq!(count, leased);
        prop_assert_eq!(count as usize, delays.iter().filter(|d| **d as i64 <= elapsed).count());
    }
}
