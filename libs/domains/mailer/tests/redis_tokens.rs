//! Token store and full pipeline against a real Redis (testcontainers).
//!
//! Run with `cargo test -p domain_mailer -- --ignored` (needs Docker).

use async_trait::async_trait;
use domain_mailer::{
    Catalog, JobRouter, Localizer, LookupError, MailDispatcher, MailStream, RecordingTransport,
    RedisTokenStore, Sender, TemplateEngine, TokenRecorder, TokenStore, TokenTtl, UserData,
    UserDirectory,
};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{
    FailurePolicy, MessageQueue, StreamConsumer, StreamDef, StreamWorker, WorkerConfig, JOB_FIELD,
};
use test_utils::{TestNames, TestRedis};

const VERIFICATION_JOB: &str = r#"{"type":"user:email_verification","receiverId":"u1",
    "data":{"appDomain":"https://x","urlPath":"tok123"}}"#;

struct OneUser;

#[async_trait]
impl UserDirectory for OneUser {
    async fn get_user_data(&self, receiver_id: &str) -> Result<UserData, LookupError> {
        if receiver_id != "u1" {
            return Err(LookupError::NotFound(receiver_id.to_string()));
        }
        Ok(UserData {
            email: "alice@acme.test".to_string(),
            username: "alice".to_string(),
            language: Some("en".to_string()),
        })
    }
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_tokens_are_written_with_ttl() {
    let redis = TestRedis::new().await;
    let store = RedisTokenStore::new(
        redis.connection(),
        TokenTtl {
            confirmation: Duration::from_secs(600),
            reset: Duration::from_secs(60),
        },
    );

    store.add_confirmation_token("tok123", "u1").await.unwrap();
    store.add_reset_password_token("r3s3t", "u2").await.unwrap();

    let mut conn = redis.connection();
    let owner: String = conn.get("confirm:tok123").await.unwrap();
    assert_eq!(owner, "u1");
    let ttl: i64 = conn.ttl("confirm:tok123").await.unwrap();
    assert!(ttl > 500 && ttl <= 600);

    let owner: String = conn.get("reset:r3s3t").await.unwrap();
    assert_eq!(owner, "u2");
    let ttl: i64 = conn.ttl("reset:r3s3t").await.unwrap();
    assert!(ttl > 0 && ttl <= 60);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_verification_job_end_to_end() {
    let redis = TestRedis::new().await;
    let names = TestNames::from_test_name("test_verification_job_end_to_end");
    let config = WorkerConfig::new(
        names.stream(MailStream::STREAM_NAME),
        MailStream::CONSUMER_GROUP,
    )
    .with_consumer_id("worker-test")
    .with_block_timeout_ms(100);

    let transport = Arc::new(RecordingTransport::new());
    let router = JobRouter::new(
        Arc::new(OneUser),
        Arc::new(Localizer::new(Catalog::bundled().unwrap(), "de").unwrap()),
        Arc::new(TemplateEngine::new().unwrap()),
        MailDispatcher::new(transport.clone(), Sender::webpanel("Acme", "noreply@acme.test")),
        TokenRecorder::new(Arc::new(RedisTokenStore::new(
            redis.connection(),
            TokenTtl::default(),
        ))),
        "Acme",
    );

    let queue = Arc::new(StreamConsumer::new(redis.connection(), config.clone()));
    let worker = StreamWorker::new(
        queue.clone(),
        Arc::new(router),
        FailurePolicy::SingleAttempt,
        &config.stream_name,
    );
    queue.init().await.unwrap();

    let mut conn = redis.connection();
    let _: String = conn
        .xadd(
            &config.stream_name,
            "*",
            &[(
                JOB_FIELD,
                VERIFICATION_JOB,
            )],
        )
        .await
        .unwrap();

    let delivery = queue.receive().await.unwrap().expect("one message");
    worker.handle(delivery).await;

    let sent = transport.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("/api/v1/register/tok123"));

    let owner: String = conn.get("confirm:tok123").await.unwrap();
    assert_eq!(owner, "u1");
}
