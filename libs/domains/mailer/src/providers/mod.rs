//! Outbound mail transports.
//!
//! [`MailTransport`] is the seam between the dispatcher and the wire:
//! [`SmtpTransport`] in production, [`RecordingTransport`] in tests.

mod mock;
mod smtp;

pub use mock::RecordingTransport;
pub use smtp::{SmtpConfig, SmtpTls, SmtpTransport};

use async_trait::async_trait;

use crate::error::DispatchError;

/// A plain-text message with resolved addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Mailbox string, e.g. `Acme - Webpanel <noreply@acme.test>`.
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Result of an accepted send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentMail {
    /// Server response text, usually containing the queue ID.
    pub message_id: Option<String>,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<SentMail, DispatchError>;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}
