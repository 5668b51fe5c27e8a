//! Data models for the mailer domain.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use stream_worker::StreamJob;

// ============================================================================
// Mail jobs (queue payload)
// ============================================================================

/// Kind of mail a job asks for.
///
/// Tags without the `user:` prefix are accepted as aliases. Any other tag
/// parses into [`JobKind::Unknown`] so the router, not the parser, rejects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    EmailVerification,
    Login,
    ResetPassword,
    Unknown(String),
}

impl JobKind {
    pub fn as_str(&self) -> &str {
        match self {
            JobKind::EmailVerification => "user:email_verification",
            JobKind::Login => "user:login",
            JobKind::ResetPassword => "user:reset_password",
            JobKind::Unknown(tag) => tag,
        }
    }
}

impl From<&str> for JobKind {
    fn from(tag: &str) -> Self {
        match tag.strip_prefix("user:").unwrap_or(tag) {
            "email_verification" => JobKind::EmailVerification,
            "login" => JobKind::Login,
            "reset_password" => JobKind::ResetPassword,
            _ => JobKind::Unknown(tag.to_string()),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(JobKind::from(tag.as_str()))
    }
}

/// Job-specific payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobData {
    /// Base URL of the web app, e.g. `https://panel.example.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_domain: Option<String>,

    /// Token embedded in the link and recorded after sending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,

    /// Keys this worker does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An email job as published by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailJob {
    #[serde(rename = "type")]
    pub kind: JobKind,

    /// User the mail goes to. Accepted as a JSON string or integer.
    #[serde(deserialize_with = "string_or_number")]
    pub receiver_id: String,

    #[serde(default)]
    pub data: Option<JobData>,
}

impl MailJob {
    pub fn new(kind: JobKind, receiver_id: impl Into<String>) -> Self {
        Self {
            kind,
            receiver_id: receiver_id.into(),
            data: None,
        }
    }

    /// Attach the link parts used by verification and reset mails.
    pub fn with_link(mut self, app_domain: impl Into<String>, url_path: impl Into<String>) -> Self {
        let data = self.data.get_or_insert_with(JobData::default);
        data.app_domain = Some(app_domain.into());
        data.url_path = Some(url_path.into());
        self
    }

    pub fn app_domain(&self) -> Option<&str> {
        self.data.as_ref()?.app_domain.as_deref()
    }

    pub fn url_path(&self) -> Option<&str> {
        self.data.as_ref()?.url_path.as_deref()
    }
}

impl StreamJob for MailJob {
    fn job_id(&self) -> String {
        format!("{}:{}", self.kind, self.receiver_id)
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "receiverId must be a string or number, got {}",
            other
        ))),
    }
}

// ============================================================================
// Recipient and message
// ============================================================================

/// Recipient details from the user directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    pub email: String,
    pub username: String,
    /// Preferred language tag, e.g. `en` or `de-AT`.
    pub language: Option<String>,
}

/// A finished message, ready for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}
