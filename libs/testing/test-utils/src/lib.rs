//! Shared test utilities
//!
//! - `TestRedis`: Redis container with automatic cleanup
//! - `TestNames`: deterministic, per-test key and stream names
//!
//! Container-backed tests need Docker and are marked `#[ignore]`:
//!
//! ```rust,ignore
//! use test_utils::{TestNames, TestRedis};
//!
//! #[tokio::test]
//! #[ignore]
//! async fn my_redis_test() {
//!     let redis = TestRedis::new().await;
//!     let names = TestNames::from_test_name("my_redis_test");
//!     let stream = names.stream("q_mail");
//! }
//! ```

mod redis;

pub use redis::TestRedis;

/// Derives names from the test name so tests sharing a container never
/// touch each other's keys.
pub struct TestNames {
    seed: u64,
}

impl TestNames {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// e.g. `test-q_mail-1234`
    pub fn stream(&self, base: &str) -> String {
        format!("test-{}-{}", base, self.seed)
    }

    /// e.g. `test-1234:confirm:`
    pub fn key_prefix(&self, base: &str) -> String {
        format!("test-{}:{}:", self.seed, base)
    }
}
