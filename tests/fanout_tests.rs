use std::sync::Arc;
use std::time::Duration;

use chat_fanout::{DeliveryPolicy, KeyedRegistry, RegistryConfig, TeardownPolicy};
use tokio::sync::Barrier;
use tokio::time::timeout;

#[tokio::test]
async fn test_subscribe_publish_resubscribe_scenario() {
    let registry = KeyedRegistry::<String, &'static str>::new();
    let key = "chan-1".to_string();

    let mut sub = registry.subscribe(key.clone()).await.unwrap();
    registry.publish(&key, "m1").await.unwrap();
    registry.publish(&key, "m2").await.unwrap();

    assert_eq!(sub.recv().await, Some("m1"));
    assert_eq!(sub.recv().await, Some("m2"));

    sub.unsubscribe().await;
    registry.publish(&key, "m3").await.unwrap();
    assert_eq!(sub.recv().await, None);

    let mut sub = registry.subscribe(key.clone()).await.unwrap();
    registry.publish(&key, "m4").await.unwrap();

    assert_eq!(sub.recv().await, Some("m4"));
    assert!(sub.try_recv().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_subscriber_sees_every_value_in_order() {
    const SUBSCRIBERS: usize = 16;
    const VALUES: u64 = 500;

    let config = RegistryConfig::default()
        .subscriber_capacity(VALUES as usize)
        .delivery(DeliveryPolicy::Block);
    let registry = KeyedRegistry::<&'static str, u64>::with_config(config);

    let mut subs = Vec::new();
    for _ in 0..SUBSCRIBERS {
        subs.push(registry.subscribe("chan-1").await.unwrap());
    }

    let consumers: Vec<_> = subs
        .into_iter()
        .map(|mut sub| {
            tokio::spawn(async move {
                let mut received = Vec::with_capacity(VALUES as usize);
                while received.len() < VALUES as usize {
                    match sub.recv().await {
                        Some(value) => received.push(value),
                        None => break,
                    }
                }
                sub.unsubscribe().await;
                received
            })
        })
        .collect();

    for value in 0..VALUES {
        registry.publish(&"chan-1", value).await.unwrap();
    }

    for consumer in consumers {
        let received = timeout(Duration::from_secs(10), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, (0..VALUES).collect::<Vec<_>>());
    }

    assert_eq!(registry.topic_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_churn_keeps_counts_consistent() {
    const TASKS: usize = 32;
    const ROUNDS: usize = 50;

    let registry = KeyedRegistry::<&'static str, usize>::with_config(
        RegistryConfig::default().subscriber_capacity(4),
    );
    let barrier = Arc::new(Barrier::new(TASKS + 1));
    let keys = ["chan-1", "chan-2", "chan-3"];

    let mut tasks = Vec::new();
    for t in 0..TASKS {
        let registry = registry.clone();
        let barrier = Arc::clone(&barrier);
        let key = keys[t % keys.len()];

        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            for round in 0..ROUNDS {
                let mut sub = registry.subscribe(key).await.unwrap();
                let _ = registry.publish(&key, round).await;
                let _ = registry.try_publish(&key, round);
                if round % 2 == 0 {
                    sub.unsubscribe().await;
                } else {
                    drop(sub);
                }
            }
        }));
    }

    // Publishers hammering the same keys meanwhile
    let publisher = {
        let registry = registry.clone();
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            for value in 0..2000 {
                let key = keys[value % keys.len()];
                let _ = registry.publish(&key, value).await;
            }
        })
    };

    let all = async {
        for task in tasks {
            task.await.unwrap();
        }
        publisher.await.unwrap();
    };
    timeout(Duration::from_secs(30), all).await.unwrap();

    for key in keys {
        assert_eq!(registry.subscriber_count(&key), 0);
    }
    assert_eq!(registry.topic_count(), 0);
}

#[tokio::test]
async fn test_retained_topics_survive_until_cleanup() {
    let config = RegistryConfig::default()
        .teardown(TeardownPolicy::Retain)
        .idle_topic_timeout(Duration::from_millis(10));
    let registry = KeyedRegistry::<u32, u32>::with_config(config);

    for key in 0..10 {
        let mut sub = registry.subscribe(key).await.unwrap();
        sub.unsubscribe().await;
    }
    assert_eq!(registry.topic_count(), 10);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(registry.cleanup(), 10);
    assert_eq!(registry.topic_count(), 0);
}

#[tokio::test]
async fn test_slow_subscriber_does_not_stall_publisher() {
    let config = RegistryConfig::default()
        .input_capacity(4)
        .subscriber_capacity(2)
        .delivery(DeliveryPolicy::DropNewest);
    let registry = KeyedRegistry::<&'static str, u32>::with_config(config);

    // Never drained
    let _stalled = registry.subscribe("chan-1").await.unwrap();

    let publish_all = async {
        for value in 0..100 {
            registry.publish(&"chan-1", value).await.unwrap();
        }
    };
    timeout(Duration::from_secs(5), publish_all).await.unwrap();

    let processed = async {
        loop {
            let stats = registry.topic_stats(&"chan-1").unwrap();
            if stats.published == 100 {
                return stats;
            }
            tokio::task::yield_now().await;
        }
    };
    let stats = timeout(Duration::from_secs(5), processed).await.unwrap();

    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.dropped, 98);
}
