//! Sends rendered messages through a [`MailTransport`].

use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::error::DispatchError;
use crate::models::RenderedMessage;
use crate::providers::{MailTransport, OutgoingMail, SentMail};

/// The `From` mailbox of every outgoing mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub name: String,
    pub email: String,
}

impl Sender {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// `"{company} - Webpanel <{email}>"`
    pub fn webpanel(company_name: &str, email: impl Into<String>) -> Self {
        Self::new(format!("{} - Webpanel", company_name), email)
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// Wraps the transport with the sender identity. Does not retry.
#[derive(Clone)]
pub struct MailDispatcher {
    transport: Arc<dyn MailTransport>,
    sender: Sender,
}

impl MailDispatcher {
    pub fn new(transport: Arc<dyn MailTransport>, sender: Sender) -> Self {
        Self { transport, sender }
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub async fn send(
        &self,
        to: &str,
        message: &RenderedMessage,
    ) -> Result<SentMail, DispatchError> {
        let mail = OutgoingMail {
            from: self.sender.to_string(),
            to: to.to_string(),
            subject: message.subject.clone(),
            body: message.body.clone(),
        };

        let sent = self.transport.send(&mail).await?;

        info!(
            to,
            transport = self.transport.name(),
            message_id = ?sent.message_id,
            "Mail sent"
        );

        Ok(sent)
    }
}
