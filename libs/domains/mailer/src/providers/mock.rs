//! Recording transport for tests and dry runs.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{MailTransport, OutgoingMail, SentMail};
use crate::error::DispatchError;

/// Captures every mail instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
    failure: Option<FailureMode>,
}

#[derive(Clone)]
enum FailureMode {
    Transient(String),
    Rejected(String),
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose sends fail with a transient transport error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(FailureMode::Transient(message.into())),
            ..Self::default()
        }
    }

    /// A transport whose server permanently rejects every message.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            failure: Some(FailureMode::Rejected(message.into())),
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent.lock().await.iter().any(|m| m.to == address)
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<SentMail, DispatchError> {
        match &self.failure {
            Some(FailureMode::Transient(message)) => {
                return Err(DispatchError::Transport(message.clone()));
            }
            Some(FailureMode::Rejected(message)) => {
                return Err(DispatchError::Rejected(message.clone()));
            }
            None => {}
        }

        let mut sent = self.sent.lock().await;
        sent.push(mail.clone());

        Ok(SentMail {
            message_id: Some(format!("recorded-{}", sent.len())),
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> OutgoingMail {
        OutgoingMail {
            from: "Acme <noreply@acme.test>".to_string(),
            to: "alice@acme.test".to_string(),
            subject: "Hi".to_string(),
            body: "Body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_records_sent_mail() {
        let transport = RecordingTransport::new();

        let sent = transport.send(&mail()).await.unwrap();

        assert_eq!(sent.message_id.as_deref(), Some("recorded-1"));
        assert_eq!(transport.sent_count().await, 1);
        assert!(transport.was_sent_to("alice@acme.test").await);
    }

    #[tokio::test]
    async fn test_failure_modes() {
        let err = RecordingTransport::failing("connection reset")
            .send(&mail())
            .await
            .unwrap_err();
        assert!(!err.is_permanent());

        let rejecting = RecordingTransport::rejecting("550 no such user");
        let err = rejecting.send(&mail()).await.unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(rejecting.sent_count().await, 0);
    }
}
