//! A raw stream entry as handed out by a [`MessageQueue`](crate::MessageQueue).

use crate::error::StreamError;
use crate::registry::StreamJob;

/// Field holding the JSON job payload.
pub const JOB_FIELD: &str = "job";

/// Field holding how many times the payload was re-published.
pub const RETRY_COUNT_FIELD: &str = "retry_count";

/// One message taken off the queue, not yet parsed.
///
/// The payload is kept verbatim so a rejected message lands in the DLQ
/// exactly as it was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Redis stream entry ID (e.g. "1234567890123-0")
    pub stream_id: String,

    /// Contents of the `job` field, `None` when the field is absent
    pub payload: Option<String>,

    /// Re-publish count, 0 on first delivery
    pub retry_count: u32,
}

impl Delivery {
    pub fn new(stream_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            payload: Some(payload.into()),
            retry_count: 0,
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Build a delivery from the field/value pairs of a stream entry.
    ///
    /// A missing or unparsable `retry_count` counts as 0.
    pub fn from_fields(stream_id: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        let mut payload = None;
        let mut retry_count = 0;

        for (key, value) in fields {
            match key.as_str() {
                JOB_FIELD => payload = Some(value),
                RETRY_COUNT_FIELD => retry_count = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        Self {
            stream_id: stream_id.into(),
            payload,
            retry_count,
        }
    }

    /// Deserialize the payload into a job.
    pub fn parse<J: StreamJob>(&self) -> Result<J, StreamError> {
        let payload = self.payload.as_deref().ok_or_else(|| {
            StreamError::Serialization(format!("missing '{}' field", JOB_FIELD))
        })?;
        Ok(serde_json::from_str(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Ping {
        id: String,
    }

    impl StreamJob for Ping {
        fn job_id(&self) -> String {
            self.id.clone()
        }
    }

    #[test]
    fn test_from_fields_reads_job_and_retry_count() {
        let delivery = Delivery::from_fields(
            "1700000000000-0",
            vec![
                ("job".to_string(), r#"{"id":"a"}"#.to_string()),
                ("retry_count".to_string(), "2".to_string()),
                ("origin".to_string(), "api".to_string()),
            ],
        );

        assert_eq!(delivery.payload.as_deref(), Some(r#"{"id":"a"}"#));
        assert_eq!(delivery.retry_count, 2);
        assert_eq!(delivery.parse::<Ping>().unwrap().job_id(), "a");
    }

    #[test]
    fn test_missing_job_field_is_serialization_error() {
        let delivery = Delivery::from_fields("1-0", vec![("other".into(), "x".into())]);
        assert_eq!(delivery.payload, None);
        assert!(matches!(
            delivery.parse::<Ping>(),
            Err(StreamError::Serialization(msg)) if msg.contains("job")
        ));
    }

    #[test]
    fn test_wrong_shape_is_serialization_error() {
        let delivery = Delivery::new("1-0", r#"{"name":"no id here"}"#);
        assert!(matches!(delivery.parse::<Ping>(), Err(StreamError::Serialization(_))));
    }
}
