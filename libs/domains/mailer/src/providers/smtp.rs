//! SMTP transport using lettre.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{MailTransport, OutgoingMail, SentMail};
use crate::error::DispatchError;

/// How the connection to the SMTP server is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SmtpTls {
    /// TLS from the first byte (SMTPS, usually port 465).
    #[default]
    Implicit,
    /// Plain connection upgraded with STARTTLS (usually port 587).
    StartTls,
    /// No encryption; local catchers like Mailpit only.
    None,
}

impl FromStr for SmtpTls {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "implicit" | "tls" | "true" => Ok(SmtpTls::Implicit),
            "starttls" => Ok(SmtpTls::StartTls),
            "none" | "false" => Ok(SmtpTls::None),
            other => Err(format!(
                "unknown TLS mode '{}', expected implicit, starttls or none",
                other
            )),
        }
    }
}

impl fmt::Display for SmtpTls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SmtpTls::Implicit => "implicit",
            SmtpTls::StartTls => "starttls",
            SmtpTls::None => "none",
        })
    }
}

/// SMTP connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: SmtpTls,
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            tls: SmtpTls::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_tls(mut self, tls: SmtpTls) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Production [`MailTransport`].
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpTransport {
    /// Build the transport. No connection is opened until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self, DispatchError> {
        let mut builder = match config.tls {
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?,
            SmtpTls::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            }
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };

        builder = builder.port(config.port).timeout(Some(config.timeout));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!(
            host = %config.host,
            port = config.port,
            tls = %config.tls,
            "SMTP transport configured"
        );

        Ok(Self {
            transport: builder.build(),
            host: config.host.clone(),
        })
    }

    fn build_message(mail: &OutgoingMail) -> Result<Message, DispatchError> {
        let from = parse_mailbox(&mail.from)?;
        let to = parse_mailbox(&mail.to)?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(&mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| DispatchError::Message(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DispatchError> {
    address.parse().map_err(|e: lettre::address::AddressError| DispatchError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<SentMail, DispatchError> {
        debug!(to = %mail.to, subject = %mail.subject, host = %self.host, "Sending mail via SMTP");

        let message = Self::build_message(mail)?;

        let response = self.transport.send(message).await.map_err(|e| {
            error!(to = %mail.to, error = %e, "SMTP send failed");
            DispatchError::from(e)
        })?;

        let message_id = response.message().next().map(str::to_string);

        Ok(SentMail { message_id })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: &str) -> OutgoingMail {
        OutgoingMail {
            from: "Acme - Webpanel <noreply@acme.test>".to_string(),
            to: to.to_string(),
            subject: "Acme - Confirm your registration".to_string(),
            body: "Hello alice,".to_string(),
        }
    }

    #[test]
    fn test_tls_mode_parsing() {
        assert_eq!("implicit".parse::<SmtpTls>().unwrap(), SmtpTls::Implicit);
        assert_eq!("STARTTLS".parse::<SmtpTls>().unwrap(), SmtpTls::StartTls);
        assert_eq!("none".parse::<SmtpTls>().unwrap(), SmtpTls::None);
        assert!("ssl3".parse::<SmtpTls>().is_err());
        assert_eq!(SmtpTls::default(), SmtpTls::Implicit);
    }

    #[test]
    fn test_config_builders() {
        let config = SmtpConfig::new("smtp.acme.test", 587)
            .with_tls(SmtpTls::StartTls)
            .with_credentials("user", "pass")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.port, 587);
        assert_eq!(config.tls, SmtpTls::StartTls);
        assert_eq!(config.username.as_deref(), Some("user"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_build_message() {
        let message = SmtpTransport::build_message(&mail("alice@acme.test")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("To: alice@acme.test"));
        assert!(raw.contains("Subject: Acme - Confirm your registration"));
        assert!(raw.contains("Content-Type: text/plain"));
    }

    #[test]
    fn test_invalid_recipient_is_permanent() {
        let err = SmtpTransport::build_message(&mail("not-an-address")).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::InvalidAddress { ref address, .. } if address == "not-an-address"
        ));
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_new_does_not_connect() {
        let transport = SmtpTransport::new(
            &SmtpConfig::new("localhost", 1025).with_tls(SmtpTls::None),
        )
        .unwrap();
        assert_eq!(transport.name(), "smtp");
    }
}
