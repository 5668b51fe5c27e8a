//! StreamConsumer against a real Redis (testcontainers).
//!
//! Run with `cargo test -p stream-worker -- --ignored` (needs Docker).

use redis::AsyncCommands;
use stream_worker::{
    Delivery, MessageQueue, QueueInspector, StreamConsumer, WorkerConfig, JOB_FIELD,
};
use test_utils::{TestNames, TestRedis};

fn config(names: &TestNames) -> WorkerConfig {
    WorkerConfig::new(names.stream("q_mail"), "mail_workers")
        .with_consumer_id("worker-test")
        .with_block_timeout_ms(100)
}

async fn publish(redis: &TestRedis, stream: &str, payload: &str) -> String {
    let mut conn = redis.connection();
    conn.xadd(stream, "*", &[(JOB_FIELD, payload)]).await.unwrap()
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_receive_and_ack() {
    let redis = TestRedis::new().await;
    let names = TestNames::from_test_name("test_receive_and_ack");
    let config = config(&names);
    let consumer = StreamConsumer::new(redis.connection(), config.clone());

    consumer.init().await.unwrap();
    consumer.init().await.unwrap(); // BUSYGROUP is tolerated

    let id = publish(&redis, &config.stream_name, r#"{"type":"user:login"}"#).await;

    let delivery = consumer.receive().await.unwrap().expect("one message");
    assert_eq!(delivery.stream_id, id);
    assert_eq!(delivery.retry_count, 0);
    assert_eq!(delivery.payload.as_deref(), Some(r#"{"type":"user:login"}"#));

    consumer.ack(&delivery).await.unwrap();

    let mut conn = redis.connection();
    let pending: (i64, Option<String>, Option<String>, Option<Vec<(String, i64)>>) =
        redis::cmd("XPENDING")
            .arg(&config.stream_name)
            .arg(&config.consumer_group)
            .query_async(&mut conn)
            .await
            .unwrap();
    assert_eq!(pending.0, 0);

    assert!(consumer.receive().await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_requeue_increments_retry_count() {
    let redis = TestRedis::new().await;
    let names = TestNames::from_test_name("test_requeue_increments_retry_count");
    let config = config(&names);
    let consumer = StreamConsumer::new(redis.connection(), config.clone());
    consumer.init().await.unwrap();

    publish(&redis, &config.stream_name, r#"{"type":"user:login"}"#).await;

    let first = consumer.receive().await.unwrap().unwrap();
    consumer.requeue(&first).await.unwrap();

    let second = consumer.receive().await.unwrap().unwrap();
    assert_ne!(second.stream_id, first.stream_id);
    assert_eq!(second.retry_count, 1);
    assert_eq!(second.payload, first.payload);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_reject_copies_raw_payload_to_dlq() {
    let redis = TestRedis::new().await;
    let names = TestNames::from_test_name("test_reject_copies_raw_payload_to_dlq");
    let config = config(&names);
    let consumer = StreamConsumer::new(redis.connection(), config.clone());
    consumer.init().await.unwrap();

    publish(&redis, &config.stream_name, "{not json").await;

    let delivery = consumer.receive().await.unwrap().unwrap();
    consumer
        .reject(&delivery, "Serialization error: key must be a string")
        .await
        .unwrap();

    let stats = consumer.dlq_stats().await.unwrap();
    assert_eq!(stats.length, 1);
    assert_eq!(stats.stream_name, config.dlq_stream);

    let entries = consumer.dlq_entries(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1.payload, "{not json");
    assert_eq!(entries[0].1.source_id, delivery.stream_id);

    // The original is settled on the source stream.
    assert!(consumer.receive().await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_entry_without_job_field_is_delivered_for_rejection() {
    let redis = TestRedis::new().await;
    let names = TestNames::from_test_name("test_entry_without_job_field");
    let config = config(&names);
    let consumer = StreamConsumer::new(redis.connection(), config.clone());
    consumer.init().await.unwrap();

    let mut conn = redis.connection();
    let _: String = conn
        .xadd(&config.stream_name, "*", &[("other", "value")])
        .await
        .unwrap();

    let delivery: Delivery = consumer.receive().await.unwrap().unwrap();
    assert_eq!(delivery.payload, None);
    consumer.ping().await.unwrap();
}
